//! Document-at-a-time evaluation of query trees.
//!
//! A [`QueryTree`] is bound once per segment into a [`ScoreNode`] tree, which is then walked in
//! increasing docId order. [`QueryEvaluator`] drives a whole query over several segments and
//! keeps the best-scoring documents.

mod bind;
mod node;
mod union;
pub mod telemetry;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::postings::{DocId, TermPostingSource, TERMINATED};
use crate::query::ast::QueryTree;
use crate::query::parser::{IndriParser, DEFAULT_FIELD};
use crate::scoring::language_model::LanguageModel;
use crate::scoring::Score;
use crate::Result;

use bind::Binder;
pub use node::{ScoreNode, BAND_BELIEF};
use telemetry::{log_query_error, log_query_success, QueryMetrics, QueryTelemetry};

/// Score every document of `source` matched by `tree`, in docId order.
pub fn evaluate(
    tree: &QueryTree,
    source: &dyn TermPostingSource,
    model: LanguageModel,
) -> Result<Vec<(DocId, Score)>> {
    Ok(SegmentEvaluation::new(tree, source, model)?.collect())
}

/// Lazy evaluation of one query over one segment.
///
/// Yields `(doc, score)` pairs in strictly increasing docId order. Deleted documents are
/// skipped.
pub struct SegmentEvaluation<'s> {
    root: ScoreNode<'s>,
    source: &'s dyn TermPostingSource,
    started: bool,
    bind_time: Duration,
    proximity_time: Duration,
    virtual_lists: usize,
}

impl<'s> SegmentEvaluation<'s> {
    pub fn new(
        tree: &QueryTree,
        source: &'s dyn TermPostingSource,
        model: LanguageModel,
    ) -> Result<Self> {
        let start = Instant::now();
        let mut binder = Binder::new(source, model);
        let root = binder.bind(tree.root())?;
        let proximity_time = binder.proximity_time();

        Ok(Self {
            root,
            source,
            started: false,
            bind_time: start.elapsed().saturating_sub(proximity_time),
            proximity_time,
            virtual_lists: binder.virtual_lists(),
        })
    }

    /// Time spent binding, excluding virtual posting list construction.
    pub fn bind_time(&self) -> Duration {
        self.bind_time
    }

    pub fn proximity_time(&self) -> Duration {
        self.proximity_time
    }

    /// Number of virtual posting lists materialized for this segment.
    pub fn virtual_lists(&self) -> usize {
        self.virtual_lists
    }

    pub fn root(&self) -> &ScoreNode<'s> {
        &self.root
    }
}

impl Iterator for SegmentEvaluation<'_> {
    type Item = (DocId, Score);

    fn next(&mut self) -> Option<Self::Item> {
        let mut doc = if self.started {
            self.root.advance()
        } else {
            self.started = true;
            self.root.doc()
        };
        while doc != TERMINATED && self.source.is_deleted(doc) {
            doc = self.root.advance();
        }
        if doc == TERMINATED {
            return None;
        }
        Some((doc, self.root.score()))
    }
}

/// A scored document, identified by the segment it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub segment: usize,
    pub doc: DocId,
    pub score: Score,
}

fn rank(a: &ScoredDoc, b: &ScoredDoc) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.segment.cmp(&b.segment))
        .then(a.doc.cmp(&b.doc))
}

/// Heap entry ordered by [`rank`], so the greatest entry is the weakest hit.
#[derive(Debug)]
struct Ranked(ScoredDoc);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank(&self.0, &other.0)
    }
}

/// The `limit` best hits seen so far.
#[derive(Debug)]
struct TopHits {
    heap: BinaryHeap<Ranked>,
    limit: usize,
}

impl TopHits {
    fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit.min(1024)),
            limit,
        }
    }

    fn push(&mut self, hit: ScoredDoc) {
        if self.limit == 0 {
            return;
        }
        if self.heap.len() == self.limit {
            match self.heap.peek() {
                Some(weakest) if rank(&hit, &weakest.0) == Ordering::Less => {
                    self.heap.pop();
                }
                _ => return,
            }
        }
        self.heap.push(Ranked(hit));
    }

    /// Best hit first.
    fn into_sorted(self) -> Vec<ScoredDoc> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.0)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<ScoredDoc>,
    pub metrics: QueryMetrics,
}

/// Parses and evaluates queries with one analyzer and one language model.
#[derive(Debug, Clone)]
pub struct QueryEvaluator {
    analyzer: Analyzer,
    default_field: String,
    model: LanguageModel,
}

impl QueryEvaluator {
    pub fn new(analyzer: Analyzer, model: LanguageModel) -> Self {
        Self {
            analyzer,
            default_field: DEFAULT_FIELD.to_string(),
            model,
        }
    }

    pub fn with_default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = field.into().to_lowercase();
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let analyzer = Analyzer::new(config.analysis.clone())?;
        Ok(Self::new(analyzer, config.scoring.language_model())
            .with_default_field(&config.query.default_field))
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn model(&self) -> LanguageModel {
        self.model
    }

    pub fn parse(&self, query: &str) -> Result<QueryTree> {
        let tree = IndriParser::new(&self.analyzer)
            .with_default_field(&self.default_field)
            .parse(query)?;
        Ok(tree)
    }

    pub fn evaluate_segment<'s>(
        &self,
        tree: &QueryTree,
        source: &'s dyn TermPostingSource,
    ) -> Result<SegmentEvaluation<'s>> {
        SegmentEvaluation::new(tree, source, self.model)
    }

    /// Evaluate `query` over every segment and keep the `limit` best documents, ordered by
    /// descending score, then segment and docId.
    pub fn search(
        &self,
        query: &str,
        sources: &[&dyn TermPostingSource],
        limit: usize,
    ) -> Result<SearchResults> {
        match self.search_inner(query, sources, limit) {
            Ok(results) => {
                log_query_success(query, &results.metrics);
                Ok(results)
            }
            Err(e) => {
                log_query_error(query, &e.to_string());
                Err(e)
            }
        }
    }

    fn search_inner(
        &self,
        query: &str,
        sources: &[&dyn TermPostingSource],
        limit: usize,
    ) -> Result<SearchResults> {
        let mut telemetry = QueryTelemetry::new();
        let tree = self.parse(query)?;
        telemetry.mark_stage("parse");

        let mut top = TopHits::new(limit);
        let mut matched_docs = 0;
        let mut virtual_lists = 0;

        for (segment, source) in sources.iter().enumerate() {
            let evaluation = self.evaluate_segment(&tree, *source)?;
            telemetry.record("bind", evaluation.bind_time());
            telemetry.record("proximity_build", evaluation.proximity_time());
            virtual_lists += evaluation.virtual_lists();

            let eval_start = Instant::now();
            for (doc, score) in evaluation {
                matched_docs += 1;
                top.push(ScoredDoc {
                    segment,
                    doc,
                    score,
                });
            }
            telemetry.record("evaluate", eval_start.elapsed());
            debug!(segment, matched_docs, "Segment evaluated");
        }

        let hits = top.into_sorted();

        let query_type = match tree.root().kind() {
            Some(kind) => kind.to_string(),
            None => "term".to_string(),
        };
        let result_count = hits.len();
        let metrics = telemetry.finish(
            &query_type,
            sources.len(),
            virtual_lists,
            matched_docs,
            result_count,
        );

        Ok(SearchResults { hits, metrics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::memory::MemoryIndex;
    use crate::query::QueryError;
    use crate::Error;

    const CORPUS: [&str; 3] = ["the cat sat", "the dog ran", "cat and dog"];

    fn evaluator() -> QueryEvaluator {
        QueryEvaluator::new(Analyzer::plain(), LanguageModel::dirichlet())
    }

    fn index() -> MemoryIndex {
        MemoryIndex::from_texts(&Analyzer::plain(), "text", &CORPUS)
    }

    #[test]
    fn test_evaluate_in_doc_order() {
        let index = index();
        let evaluator = evaluator();
        let tree = evaluator.parse("#and(cat dog)").unwrap();
        let results = evaluate(&tree, &index, evaluator.model()).unwrap();

        let docs: Vec<DocId> = results.iter().map(|(doc, _)| *doc).collect();
        assert_eq!(docs, vec![0, 1, 2]);
        assert!(results[2].1 > results[0].1);
        assert!(results[2].1 > results[1].1);
    }

    #[test]
    fn test_segment_evaluation_is_lazy_and_fused() {
        let index = index();
        let evaluator = evaluator();
        let tree = evaluator.parse("sat").unwrap();
        let mut evaluation = evaluator.evaluate_segment(&tree, &index).unwrap();

        assert_eq!(evaluation.next().map(|(doc, _)| doc), Some(0));
        assert_eq!(evaluation.next(), None);
        assert_eq!(evaluation.next(), None);
    }

    #[test]
    fn test_search_ranks_across_segments() {
        let first = index();
        let second = MemoryIndex::from_texts(&Analyzer::plain(), "text", &["dog dog cat", "bird"]);
        let evaluator = evaluator();

        let results = evaluator
            .search("#or(cat dog)", &[&first, &second], 10)
            .unwrap();

        assert_eq!(results.hits.len(), 4);
        for pair in results.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(!results
            .hits
            .iter()
            .any(|hit| hit.segment == 1 && hit.doc == 1));
        assert_eq!(results.metrics.segments, 2);
        assert_eq!(results.metrics.matched_docs, 4);
        assert_eq!(results.metrics.query_type, "or");
    }

    #[test]
    fn test_search_respects_limit() {
        let index = index();
        let results = evaluator().search("#or(cat dog)", &[&index], 1).unwrap();
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].doc, 2);
        assert_eq!(results.metrics.result_count, 1);
        assert_eq!(results.metrics.matched_docs, 3);
    }

    #[test]
    fn test_top_hits_keeps_best_in_rank_order() {
        let scores = [-3.0, -1.0, -2.0, -1.0, -5.0, -0.5, -2.0, -4.0];
        let hits: Vec<ScoredDoc> = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| ScoredDoc {
                segment: i % 2,
                doc: (i / 2) as DocId,
                score,
            })
            .collect();

        for limit in [0, 1, 3, 8, 20] {
            let mut top = TopHits::new(limit);
            for hit in hits.iter().rev() {
                top.push(*hit);
            }
            let mut expected = hits.clone();
            expected.sort_by(rank);
            expected.truncate(limit);
            assert_eq!(top.into_sorted(), expected, "limit {}", limit);
        }
    }

    #[test]
    fn test_top_hits_breaks_ties_by_segment_then_doc() {
        let mut top = TopHits::new(2);
        for (segment, doc) in [(1, 0), (0, 5), (0, 2)] {
            top.push(ScoredDoc {
                segment,
                doc,
                score: -1.0,
            });
        }
        let kept: Vec<(usize, DocId)> = top
            .into_sorted()
            .iter()
            .map(|hit| (hit.segment, hit.doc))
            .collect();
        assert_eq!(kept, vec![(0, 2), (0, 5)]);
    }

    #[test]
    fn test_search_counts_virtual_lists() {
        let index = index();
        let results = evaluator()
            .search("#or(#near/1(the cat) #uw3(dog the))", &[&index], 10)
            .unwrap();
        assert_eq!(results.metrics.virtual_lists, 2);
        let docs: Vec<DocId> = results.hits.iter().map(|hit| hit.doc).collect();
        assert_eq!(docs.len(), 2);
        assert!(docs.contains(&0) && docs.contains(&1));
    }

    #[test]
    fn test_search_propagates_parse_errors() {
        let index = index();
        let err = evaluator().search("#and(cat", &[&index], 10).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Parse { .. })));
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.query.default_field = "Body".to_string();
        config.scoring.model = crate::config::ModelKind::JelinekMercer;

        let evaluator = QueryEvaluator::from_config(&config).unwrap();
        assert_eq!(evaluator.model(), LanguageModel::jelinek_mercer());
        let tree = evaluator.parse("cats").unwrap();
        assert_eq!(tree.terms()[0].field, "body");
        assert_eq!(tree.terms()[0].text, "cat");
    }

    #[test]
    fn test_empty_query_tree_yields_nothing() {
        let index = index();
        let results = evaluator().search("#syn(zebra okapi)", &[&index], 10).unwrap();
        assert!(results.hits.is_empty());
        assert_eq!(results.metrics.result_count, 0);
    }
}
