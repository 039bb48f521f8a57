//! Positional postings and the statistics the scorers consume.
//!
//! A [`TermPostingSource`] is one index segment seen through the interface the engine needs:
//! collection and term statistics, positional posting cursors, and quantized document lengths.

pub mod memory;
pub mod tantivy_source;

use serde::{Deserialize, Serialize};

use crate::query::ast::Term;
use crate::scoring::norm;
use crate::Result;

pub use tantivy::{DocId, TERMINATED};

/// A token range `[start, end]` with an inclusive end. A single term occupies `(p, p)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span ({}, {}) is reversed", start, end);
        Self { start, end }
    }

    pub fn at(position: u32) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Number of tokens between the two spans' extremes.
    pub fn width(&self) -> u32 {
        self.end - self.start
    }
}

/// Per-field statistics across the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    pub doc_count: u64,
    pub sum_total_term_freq: u64,
}

/// Per-term statistics across the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStatistics {
    pub doc_freq: u64,
    pub total_term_freq: u64,
}

/// Forward-only cursor over a term's documents and positions.
///
/// A fresh cursor is already positioned on its first document (or [`TERMINATED`]).
pub trait PostingIterator {
    /// Current document, or [`TERMINATED`] once exhausted.
    fn doc(&self) -> DocId;

    /// Move to the next document.
    fn advance(&mut self) -> DocId;

    /// Move to the first document `>= target`. Never moves backwards.
    fn seek(&mut self, target: DocId) -> DocId {
        let mut doc = self.doc();
        while doc < target {
            doc = self.advance();
        }
        doc
    }

    /// Occurrences in the current document.
    fn freq(&self) -> u32;

    /// Next span in the current document, in increasing start order.
    fn next_position(&mut self) -> Option<Span>;

    /// Estimated number of documents, used to pick the driving cursor of an intersection.
    fn cost(&self) -> u64;
}

impl<P: PostingIterator + ?Sized> PostingIterator for Box<P> {
    fn doc(&self) -> DocId {
        (**self).doc()
    }

    fn advance(&mut self) -> DocId {
        (**self).advance()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        (**self).seek(target)
    }

    fn freq(&self) -> u32 {
        (**self).freq()
    }

    fn next_position(&mut self) -> Option<Span> {
        (**self).next_position()
    }

    fn cost(&self) -> u64 {
        (**self).cost()
    }
}

/// Postings of a term that does not occur.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyPostings;

impl PostingIterator for EmptyPostings {
    fn doc(&self) -> DocId {
        TERMINATED
    }

    fn advance(&mut self) -> DocId {
        TERMINATED
    }

    fn seek(&mut self, _target: DocId) -> DocId {
        TERMINATED
    }

    fn freq(&self) -> u32 {
        0
    }

    fn next_position(&mut self) -> Option<Span> {
        None
    }

    fn cost(&self) -> u64 {
        0
    }
}

pub type BoxedPostings<'a> = Box<dyn PostingIterator + 'a>;

/// Drain the remaining spans of the current document into `out`.
pub fn collect_spans<P: PostingIterator + ?Sized>(postings: &mut P, out: &mut Vec<Span>) {
    out.clear();
    while let Some(span) = postings.next_position() {
        out.push(span);
    }
}

/// Quantized document lengths of one field, indexed by document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNorms {
    norms: Vec<u8>,
}

impl FieldNorms {
    pub fn new(norms: Vec<u8>) -> Self {
        Self { norms }
    }

    pub fn from_lengths(lengths: impl IntoIterator<Item = u32>) -> Self {
        Self {
            norms: lengths.into_iter().map(norm::encode_length).collect(),
        }
    }

    /// Quantized length, zero for documents without the field.
    pub fn norm_value(&self, doc: DocId) -> u8 {
        self.norms.get(doc as usize).copied().unwrap_or(0)
    }

    /// Decoded length of `doc`.
    pub fn length(&self, doc: DocId) -> u32 {
        norm::decode_length(self.norm_value(doc))
    }

    pub fn len(&self) -> usize {
        self.norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }
}

/// One index segment, as consumed by query binding.
///
/// Missing fields and terms are not errors: they yield empty postings and zero statistics.
pub trait TermPostingSource {
    /// One past the largest document id in the segment.
    fn max_doc(&self) -> DocId;

    fn collection_statistics(&self, field: &str) -> Result<CollectionStatistics>;

    fn term_statistics(&self, term: &Term) -> Result<TermStatistics>;

    fn postings<'a>(&'a self, term: &Term) -> Result<BoxedPostings<'a>>;

    fn field_norms(&self, field: &str) -> Result<FieldNorms>;

    /// Deleted documents are skipped by evaluation.
    fn is_deleted(&self, _doc: DocId) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_containment() {
        let outer = Span::new(2, 6);
        assert!(outer.contains(&Span::at(2)));
        assert!(outer.contains(&Span::new(3, 6)));
        assert!(!outer.contains(&Span::new(1, 3)));
        assert!(!Span::at(4).contains(&outer));
        assert_eq!(outer.width(), 4);
    }

    #[test]
    fn test_empty_postings() {
        let mut postings = EmptyPostings;
        assert_eq!(postings.doc(), TERMINATED);
        assert_eq!(postings.seek(5), TERMINATED);
        assert_eq!(postings.next_position(), None);
    }

    #[test]
    fn test_field_norms_out_of_range() {
        let norms = FieldNorms::from_lengths([3, 100]);
        assert_eq!(norms.length(0), 3);
        assert_eq!(norms.length(1), 96);
        assert_eq!(norms.norm_value(7), 0);
        assert_eq!(norms.len(), 2);
    }
}
