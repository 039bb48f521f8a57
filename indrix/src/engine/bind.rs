//! Binding a query tree to one segment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::node::{
    BandScorer, CombineRule, CombineScorer, LeafScorer, NotScorer, ScoreIfNotScorer,
    ScoreIfScorer, ScoreNode,
};
use crate::postings::{
    BoxedPostings, CollectionStatistics, EmptyPostings, FieldNorms, TermPostingSource,
};
use crate::proximity::{self, ProximityOperator, VirtualPostingList};
use crate::query::ast::{Clause, OperatorKind, QueryNode, Requirement, Term};
use crate::query::QueryError;
use crate::scoring::language_model::{LanguageModel, TermWeight};
use crate::Result;

/// Builds [`ScoreNode`] trees over one [`TermPostingSource`], caching per-field statistics and
/// norms.
pub(crate) struct Binder<'s> {
    source: &'s dyn TermPostingSource,
    model: LanguageModel,
    norms: HashMap<String, Arc<FieldNorms>>,
    collection: HashMap<String, CollectionStatistics>,
    proximity_time: Duration,
    virtual_lists: usize,
}

impl<'s> Binder<'s> {
    pub fn new(source: &'s dyn TermPostingSource, model: LanguageModel) -> Self {
        Self {
            source,
            model,
            norms: HashMap::new(),
            collection: HashMap::new(),
            proximity_time: Duration::ZERO,
            virtual_lists: 0,
        }
    }

    /// Time spent materializing virtual posting lists.
    pub fn proximity_time(&self) -> Duration {
        self.proximity_time
    }

    pub fn virtual_lists(&self) -> usize {
        self.virtual_lists
    }

    pub fn bind(&mut self, node: &QueryNode) -> Result<ScoreNode<'s>> {
        match node {
            QueryNode::Term(term) => self.bind_term(term),
            QueryNode::Operator { kind, clauses } => self.bind_operator(*kind, clauses),
        }
    }

    /// A term in a field without tokens has no collection model to smooth against and binds to
    /// [`ScoreNode::Empty`].
    fn bind_term(&mut self, term: &Term) -> Result<ScoreNode<'s>> {
        let collection = self.collection_statistics(&term.field)?;
        if collection.sum_total_term_freq == 0 {
            debug!(field = %term.field, term = %term.text, "field has no tokens, term dropped");
            return Ok(ScoreNode::Empty);
        }
        let postings = self.source.postings(term)?;
        let statistics = self.source.term_statistics(term)?;
        let weight = TermWeight::new(self.model, &collection, &statistics);
        let norms = self.norms(&term.field)?;
        Ok(ScoreNode::Leaf(LeafScorer::new(postings, weight, norms)))
    }

    fn bind_operator(&mut self, kind: OperatorKind, clauses: &[Clause]) -> Result<ScoreNode<'s>> {
        match kind {
            OperatorKind::And | OperatorKind::WAnd => self.bind_combine(CombineRule::And, clauses),
            OperatorKind::WSum => self.bind_combine(CombineRule::WSum, clauses),
            OperatorKind::Or => self.bind_combine(CombineRule::Or, clauses),
            OperatorKind::Max => self.bind_combine(CombineRule::Max, clauses),
            OperatorKind::Not => match clauses {
                [] => Ok(ScoreNode::Empty),
                [clause] => {
                    let child = self.bind(&clause.node)?;
                    if child.is_empty() {
                        Ok(ScoreNode::Empty)
                    } else {
                        Ok(ScoreNode::Not(NotScorer::new(child)))
                    }
                }
                _ => Err(QueryError::InvalidQuery(format!(
                    "#not takes a single argument, got {}",
                    clauses.len()
                ))
                .into()),
            },
            OperatorKind::ScoreIf => self.bind_conditional(kind, clauses, Requirement::Must),
            OperatorKind::ScoreIfNot => {
                self.bind_conditional(kind, clauses, Requirement::MustNot)
            }
            OperatorKind::Near(distance) => {
                self.bind_proximity(ProximityOperator::Ordered(distance), clauses)
            }
            OperatorKind::Window(width) => {
                self.bind_proximity(ProximityOperator::Unordered(width), clauses)
            }
            OperatorKind::Band => self.bind_proximity(ProximityOperator::Band, clauses),
            OperatorKind::Synonym => self.bind_proximity(ProximityOperator::Synonym, clauses),
        }
    }

    /// Children that match nothing carry no evidence and are left out.
    fn bind_combine<'c>(
        &mut self,
        rule: CombineRule,
        clauses: impl IntoIterator<Item = &'c Clause>,
    ) -> Result<ScoreNode<'s>> {
        let mut children = Vec::new();
        let mut weights = Vec::new();
        for clause in clauses {
            let child = self.bind(&clause.node)?;
            if child.is_empty() {
                continue;
            }
            children.push(child);
            weights.push(clause.weight);
        }
        if children.is_empty() {
            return Ok(ScoreNode::Empty);
        }
        Ok(ScoreNode::Combine(CombineScorer::new(rule, children, weights)))
    }

    /// SCOREIF / SCOREIFNOT: clauses with `condition` filter, the rest are scored. Several
    /// scored clauses are combined with AND.
    fn bind_conditional(
        &mut self,
        kind: OperatorKind,
        clauses: &[Clause],
        condition: Requirement,
    ) -> Result<ScoreNode<'s>> {
        let (conditions, scored): (Vec<&Clause>, Vec<&Clause>) = clauses
            .iter()
            .partition(|clause| clause.requirement == condition);

        let query = match scored.as_slice() {
            [] => {
                debug!(operator = %kind, "conditional operator has nothing to score");
                return Ok(ScoreNode::Empty);
            }
            [clause] => self.bind(&clause.node)?,
            _ => self.bind_combine(CombineRule::And, scored.iter().copied())?,
        };
        if query.is_empty() {
            return Ok(ScoreNode::Empty);
        }

        let mut filters = Vec::with_capacity(conditions.len());
        for clause in conditions {
            let filter = self.bind(&clause.node)?;
            if !filter.is_empty() {
                filters.push(filter);
            }
        }
        if filters.is_empty() {
            return Ok(query);
        }

        Ok(match kind {
            OperatorKind::ScoreIfNot => ScoreNode::ScoreIfNot(ScoreIfNotScorer::new(filters, query)),
            _ => ScoreNode::ScoreIf(ScoreIfScorer::new(filters, query)),
        })
    }

    /// Proximity operators score like a term whose postings are the operator's matches. An
    /// operator left without terms, or living in a field without tokens, binds to
    /// [`ScoreNode::Empty`].
    fn bind_proximity(
        &mut self,
        operator: ProximityOperator,
        clauses: &[Clause],
    ) -> Result<ScoreNode<'s>> {
        let operands = live_operands(clauses);
        if operands.is_empty() {
            debug!(%operator, "proximity operator has no terms, dropped");
            return Ok(ScoreNode::Empty);
        }
        let field = proximity_field(&operands);
        let collection = self.collection_statistics(&field)?;
        if collection.sum_total_term_freq == 0 {
            debug!(%operator, %field, "field has no tokens, proximity operator dropped");
            return Ok(ScoreNode::Empty);
        }

        let list = self.build_virtual_list(operator, &field, &operands)?;
        if operator == ProximityOperator::Band {
            return Ok(ScoreNode::Band(BandScorer::new(Box::new(list.postings()))));
        }
        let norms = self.norms(&field)?;
        let weight = TermWeight::new(self.model, &collection, &list.term_statistics());
        Ok(ScoreNode::Leaf(LeafScorer::new(
            Box::new(list.postings()),
            weight,
            norms,
        )))
    }

    fn build_virtual_list(
        &mut self,
        operator: ProximityOperator,
        field: &str,
        operands: &[&Clause],
    ) -> Result<Arc<VirtualPostingList>> {
        let mut children = Vec::with_capacity(operands.len());
        for clause in operands {
            children.push(self.positional_postings(&clause.node)?);
        }

        let started = Instant::now();
        let list = Arc::new(proximity::build(operator, field, children));
        self.proximity_time += started.elapsed();
        self.virtual_lists += 1;
        Ok(list)
    }

    /// Positional postings of a proximity operand: a term or a nested proximity operator.
    fn positional_postings(&mut self, node: &QueryNode) -> Result<BoxedPostings<'s>> {
        match node {
            QueryNode::Term(term) => self.source.postings(term),
            QueryNode::Operator { kind, clauses } => match ProximityOperator::from_kind(*kind) {
                Some(operator) => {
                    let operands = live_operands(clauses);
                    if operands.is_empty() {
                        return Ok(Box::new(EmptyPostings));
                    }
                    let field = proximity_field(&operands);
                    let list = self.build_virtual_list(operator, &field, &operands)?;
                    Ok(Box::new(list.postings()))
                }
                None => Err(QueryError::InvalidQuery(format!(
                    "#{} cannot be nested in a proximity operator",
                    kind
                ))
                .into()),
            },
        }
    }

    fn collection_statistics(&mut self, field: &str) -> Result<CollectionStatistics> {
        if let Some(statistics) = self.collection.get(field) {
            return Ok(*statistics);
        }
        let statistics = self.source.collection_statistics(field)?;
        self.collection.insert(field.to_string(), statistics);
        Ok(statistics)
    }

    fn norms(&mut self, field: &str) -> Result<Arc<FieldNorms>> {
        if let Some(norms) = self.norms.get(field) {
            return Ok(Arc::clone(norms));
        }
        let norms = Arc::new(self.source.field_norms(field)?);
        self.norms.insert(field.to_string(), Arc::clone(&norms));
        Ok(norms)
    }
}

/// Operands that still hold a term after analysis. A nested operator whose terms were all
/// removed (`#syn(the of)`) constrains nothing.
fn live_operands(clauses: &[Clause]) -> Vec<&Clause> {
    clauses
        .iter()
        .filter(|clause| !clause.node.terms().is_empty())
        .collect()
}

/// A proximity operator lives in the field of its first term.
fn proximity_field(operands: &[&Clause]) -> String {
    operands
        .iter()
        .find_map(|clause| clause.node.terms().first().map(|term| term.field.clone()))
        .unwrap_or_default()
}
