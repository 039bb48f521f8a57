//! Bound scoring nodes.
//!
//! A [`ScoreNode`] tree is one query bound to one segment. Every node is a forward-only cursor
//! over the documents it matches and can score any document: [`ScoreNode::score`] for the
//! document it is positioned on, [`ScoreNode::smoothing_score`] for documents it has no
//! posting in. Operators only ever read their children through [`ScoreNode::score_at`], so
//! nodes compose to any depth.

use std::sync::Arc;

use super::union::{DocCursor, DocUnion};
use crate::postings::{BoxedPostings, DocId, FieldNorms, PostingIterator, TERMINATED};
use crate::scoring::combine;
use crate::scoring::language_model::TermWeight;
use crate::scoring::{Score, NEG_INFINITY};

/// Belief BAND assigns to every document it matches.
pub const BAND_BELIEF: Score = 1.0;

pub enum ScoreNode<'s> {
    /// A term, or a proximity operator scored as a term over its virtual postings.
    Leaf(LeafScorer<'s>),
    Band(BandScorer<'s>),
    Combine(CombineScorer<'s>),
    Not(NotScorer<'s>),
    ScoreIf(ScoreIfScorer<'s>),
    ScoreIfNot(ScoreIfNotScorer<'s>),
    /// Matches nothing and carries no evidence.
    Empty,
}

impl<'s> ScoreNode<'s> {
    pub fn doc(&self) -> DocId {
        match self {
            ScoreNode::Leaf(leaf) => leaf.postings.doc(),
            ScoreNode::Band(band) => band.postings.doc(),
            ScoreNode::Combine(scorer) => scorer.union.doc(),
            ScoreNode::Not(not) => not.child.doc(),
            ScoreNode::ScoreIf(scoreif) => scoreif.doc,
            ScoreNode::ScoreIfNot(scoreifnot) => scoreifnot.doc,
            ScoreNode::Empty => TERMINATED,
        }
    }

    pub fn advance(&mut self) -> DocId {
        match self {
            ScoreNode::Leaf(leaf) => leaf.postings.advance(),
            ScoreNode::Band(band) => band.postings.advance(),
            ScoreNode::Combine(scorer) => scorer.union.advance(&mut scorer.children),
            ScoreNode::Not(not) => not.child.advance(),
            ScoreNode::ScoreIf(scoreif) => scoreif.advance(),
            ScoreNode::ScoreIfNot(scoreifnot) => scoreifnot.advance(),
            ScoreNode::Empty => TERMINATED,
        }
    }

    pub fn seek(&mut self, target: DocId) -> DocId {
        match self {
            ScoreNode::Leaf(leaf) => leaf.postings.seek(target),
            ScoreNode::Band(band) => band.postings.seek(target),
            ScoreNode::Combine(scorer) => scorer.union.seek(&mut scorer.children, target),
            ScoreNode::Not(not) => not.child.seek(target),
            ScoreNode::ScoreIf(scoreif) => scoreif.seek(target),
            ScoreNode::ScoreIfNot(scoreifnot) => scoreifnot.seek(target),
            ScoreNode::Empty => TERMINATED,
        }
    }

    /// Score of the current document. Only meaningful while positioned on a document.
    pub fn score(&self) -> Score {
        match self {
            ScoreNode::Leaf(leaf) => leaf.score(),
            ScoreNode::Band(_) => BAND_BELIEF,
            ScoreNode::Combine(scorer) => scorer.combine_at(self.doc()),
            ScoreNode::Not(not) => combine::not(not.child.score()),
            ScoreNode::ScoreIf(scoreif) => scoreif.query.score(),
            ScoreNode::ScoreIfNot(scoreifnot) => scoreifnot.query.score(),
            ScoreNode::Empty => NEG_INFINITY,
        }
    }

    /// Estimated score of `doc` for a node that has no posting in it. Total over all
    /// documents.
    pub fn smoothing_score(&self, doc: DocId) -> Score {
        match self {
            ScoreNode::Leaf(leaf) => leaf.smoothing_score(doc),
            ScoreNode::Band(_) => NEG_INFINITY,
            ScoreNode::Combine(scorer) => scorer.combine_at(doc),
            ScoreNode::Not(not) => combine::not(not.child.score_at(doc)),
            ScoreNode::ScoreIf(scoreif) => scoreif.query.smoothing_score(doc),
            ScoreNode::ScoreIfNot(scoreifnot) => scoreifnot.query.smoothing_score(doc),
            ScoreNode::Empty => NEG_INFINITY,
        }
    }

    /// [`score`](Self::score) when positioned on `doc`, otherwise
    /// [`smoothing_score`](Self::smoothing_score).
    pub fn score_at(&self, doc: DocId) -> Score {
        if self.doc() == doc {
            self.score()
        } else {
            self.smoothing_score(doc)
        }
    }

    /// Estimated number of matching documents.
    pub fn cost(&self) -> u64 {
        match self {
            ScoreNode::Leaf(leaf) => leaf.postings.cost(),
            ScoreNode::Band(band) => band.postings.cost(),
            ScoreNode::Combine(scorer) => scorer.children.iter().map(ScoreNode::cost).sum(),
            ScoreNode::Not(not) => not.child.cost(),
            ScoreNode::ScoreIf(scoreif) => scoreif
                .required
                .iter()
                .map(ScoreNode::cost)
                .fold(scoreif.query.cost(), u64::min),
            ScoreNode::ScoreIfNot(scoreifnot) => scoreifnot.query.cost(),
            ScoreNode::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ScoreNode::Empty)
    }
}

impl DocCursor for ScoreNode<'_> {
    fn doc(&self) -> DocId {
        ScoreNode::doc(self)
    }

    fn advance(&mut self) -> DocId {
        ScoreNode::advance(self)
    }

    fn seek(&mut self, target: DocId) -> DocId {
        ScoreNode::seek(self, target)
    }
}

/// Language-model scoring over a posting cursor.
pub struct LeafScorer<'s> {
    postings: BoxedPostings<'s>,
    weight: TermWeight,
    norms: Arc<FieldNorms>,
}

impl<'s> LeafScorer<'s> {
    pub fn new(postings: BoxedPostings<'s>, weight: TermWeight, norms: Arc<FieldNorms>) -> Self {
        Self {
            postings,
            weight,
            norms,
        }
    }

    fn score(&self) -> Score {
        let doc = self.postings.doc();
        self.weight
            .score(self.postings.freq(), self.norms.norm_value(doc))
    }

    fn smoothing_score(&self, doc: DocId) -> Score {
        self.weight.smoothing_score(self.norms.norm_value(doc))
    }
}

/// Presence filter: a constant belief where all children co-occur, `-inf` elsewhere.
pub struct BandScorer<'s> {
    postings: BoxedPostings<'s>,
}

impl<'s> BandScorer<'s> {
    pub fn new(postings: BoxedPostings<'s>) -> Self {
        Self { postings }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineRule {
    /// Weighted log-domain mean, shared by AND and WAND.
    And,
    WSum,
    Or,
    Max,
}

/// Belief combination over the union of the children's documents.
pub struct CombineScorer<'s> {
    rule: CombineRule,
    children: Vec<ScoreNode<'s>>,
    weights: Vec<f64>,
    union: DocUnion,
}

impl<'s> CombineScorer<'s> {
    pub fn new(rule: CombineRule, children: Vec<ScoreNode<'s>>, weights: Vec<f64>) -> Self {
        debug_assert_eq!(children.len(), weights.len());
        let union = DocUnion::new(&children);
        Self {
            rule,
            children,
            weights,
            union,
        }
    }

    fn combine_at(&self, doc: DocId) -> Score {
        let weighted = self
            .weights
            .iter()
            .zip(&self.children)
            .map(|(&weight, child)| (weight, child.score_at(doc)));
        match self.rule {
            CombineRule::And => combine::weighted_and(weighted),
            CombineRule::WSum => combine::weighted_sum(weighted),
            CombineRule::Or => combine::or(weighted.map(|(_, score)| score)),
            CombineRule::Max => combine::max(weighted.map(|(_, score)| score)),
        }
    }
}

/// Negation of a single child's belief, over the child's documents.
pub struct NotScorer<'s> {
    child: Box<ScoreNode<'s>>,
}

impl<'s> NotScorer<'s> {
    pub fn new(child: ScoreNode<'s>) -> Self {
        Self {
            child: Box::new(child),
        }
    }
}

/// The query child's score, restricted to documents every required child matches.
pub struct ScoreIfScorer<'s> {
    required: Vec<ScoreNode<'s>>,
    query: Box<ScoreNode<'s>>,
    doc: DocId,
}

impl<'s> ScoreIfScorer<'s> {
    pub fn new(required: Vec<ScoreNode<'s>>, query: ScoreNode<'s>) -> Self {
        let mut scorer = Self {
            required,
            query: Box::new(query),
            doc: TERMINATED,
        };
        scorer.align();
        scorer
    }

    /// Leapfrog the query and required cursors to their next common document.
    fn align(&mut self) -> DocId {
        let mut candidate = self.query.doc();
        'candidates: while candidate != TERMINATED {
            for required in self.required.iter_mut() {
                let doc = required.seek(candidate);
                if doc != candidate {
                    candidate = self.query.seek(doc);
                    continue 'candidates;
                }
            }
            break;
        }
        self.doc = candidate;
        candidate
    }

    fn advance(&mut self) -> DocId {
        if self.doc == TERMINATED {
            return TERMINATED;
        }
        self.query.advance();
        self.align()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        if self.doc >= target {
            return self.doc;
        }
        self.query.seek(target);
        self.align()
    }
}

/// The query child's score, except on documents an excluded child matches.
pub struct ScoreIfNotScorer<'s> {
    excluded: Vec<ScoreNode<'s>>,
    query: Box<ScoreNode<'s>>,
    doc: DocId,
}

impl<'s> ScoreIfNotScorer<'s> {
    pub fn new(excluded: Vec<ScoreNode<'s>>, query: ScoreNode<'s>) -> Self {
        let mut scorer = Self {
            excluded,
            query: Box::new(query),
            doc: TERMINATED,
        };
        scorer.align();
        scorer
    }

    fn align(&mut self) -> DocId {
        let mut candidate = self.query.doc();
        while candidate != TERMINATED
            && self
                .excluded
                .iter_mut()
                .any(|excluded| excluded.seek(candidate) == candidate)
        {
            candidate = self.query.advance();
        }
        self.doc = candidate;
        candidate
    }

    fn advance(&mut self) -> DocId {
        if self.doc == TERMINATED {
            return TERMINATED;
        }
        self.query.advance();
        self.align()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        if self.doc >= target {
            return self.doc;
        }
        self.query.seek(target);
        self.align()
    }
}
