//! Indri-style structured retrieval over positional indexes.
//!
//! A prefix query such as `#wsum(2.0 #near/1(white house) 1.0 #syn(car automobile))` is parsed
//! into a [`QueryTree`], bound per index segment to a tree of scoring nodes, and evaluated
//! document-at-a-time into natural-log beliefs under a language-model smoothing scheme.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod postings;
pub mod proximity;
pub mod query;
pub mod scoring;

pub use analysis::{AnalyzedToken, Analyzer, AnalyzerConfig};
pub use config::Config;
pub use engine::{evaluate, QueryEvaluator, ScoredDoc, SearchResults, SegmentEvaluation};
pub use error::{Error, Result};
pub use postings::{
    memory::MemoryIndex, tantivy_source::TantivySegmentSource, PostingIterator, Span,
    TermPostingSource,
};
pub use query::ast::{Clause, OperatorKind, QueryNode, QueryTree, Requirement, Term};
pub use query::parser::IndriParser;
pub use scoring::{language_model::LanguageModel, Score};

pub use tantivy::{DocId, TERMINATED};
