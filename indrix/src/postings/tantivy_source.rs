//! Adapter exposing one tantivy segment as a [`TermPostingSource`].
//!
//! Postings and fieldnorms come from the segment; collection and term statistics are computed
//! across every segment of the searcher so that scores are comparable between segments, and
//! memoized in a [`SearcherStatistics`] shared by all sources of one searcher. Fields missing
//! from the schema behave like empty fields.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tantivy::postings::{Postings, SegmentPostings};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{DocSet, Searcher, SegmentReader, Term as TantivyTerm};

use super::{
    BoxedPostings, CollectionStatistics, DocId, EmptyPostings, FieldNorms, PostingIterator, Span,
    TermPostingSource, TermStatistics, TERMINATED,
};
use crate::query::ast::{QueryTree, Term};
use crate::query::QueryError;
use crate::scoring::norm;
use crate::Result;

/// Index-wide statistics of one [`Searcher`], computed once per term or field.
#[derive(Debug, Default)]
pub struct SearcherStatistics {
    terms: RwLock<HashMap<Term, TermStatistics>>,
    fields: RwLock<HashMap<String, CollectionStatistics>>,
}

impl SearcherStatistics {
    /// Number of terms whose statistics have been computed.
    pub fn cached_terms(&self) -> usize {
        self.terms.read().len()
    }

    fn term_or_insert_with(
        &self,
        term: &Term,
        compute: impl FnOnce() -> Result<TermStatistics>,
    ) -> Result<TermStatistics> {
        if let Some(statistics) = self.terms.read().get(term) {
            return Ok(*statistics);
        }
        let statistics = compute()?;
        self.terms.write().insert(term.clone(), statistics);
        Ok(statistics)
    }

    fn field_or_insert_with(
        &self,
        field: &str,
        compute: impl FnOnce() -> Result<CollectionStatistics>,
    ) -> Result<CollectionStatistics> {
        if let Some(statistics) = self.fields.read().get(field) {
            return Ok(*statistics);
        }
        let statistics = compute()?;
        self.fields.write().insert(field.to_string(), statistics);
        Ok(statistics)
    }
}

pub struct TantivySegmentSource<'a> {
    searcher: &'a Searcher,
    segment: &'a SegmentReader,
    statistics: Arc<SearcherStatistics>,
}

impl<'a> TantivySegmentSource<'a> {
    pub fn new(searcher: &'a Searcher, segment_ord: u32) -> Self {
        Self::with_statistics(searcher, segment_ord, Arc::default())
    }

    /// Source sharing an existing statistics memo. `statistics` must belong to `searcher`.
    pub fn with_statistics(
        searcher: &'a Searcher,
        segment_ord: u32,
        statistics: Arc<SearcherStatistics>,
    ) -> Self {
        Self {
            searcher,
            segment: searcher.segment_reader(segment_ord),
            statistics,
        }
    }

    /// One source per segment, in segment order, sharing one statistics memo.
    pub fn segments(searcher: &'a Searcher) -> Vec<Self> {
        let statistics = Arc::new(SearcherStatistics::default());
        (0..searcher.segment_readers().len() as u32)
            .map(|ord| Self::with_statistics(searcher, ord, Arc::clone(&statistics)))
            .collect()
    }

    pub fn statistics(&self) -> &Arc<SearcherStatistics> {
        &self.statistics
    }

    pub fn segment_reader(&self) -> &SegmentReader {
        self.segment
    }

    /// Reject trees that name fields the schema does not have.
    pub fn check_fields(&self, tree: &QueryTree) -> std::result::Result<(), QueryError> {
        for field in tree.fields() {
            if self.field(field).is_none() {
                return Err(QueryError::UnknownField(field.to_string()));
            }
        }
        Ok(())
    }

    fn field(&self, name: &str) -> Option<Field> {
        self.searcher.schema().get_field(name).ok()
    }

    fn term(&self, term: &Term) -> Option<TantivyTerm> {
        self.field(&term.field)
            .map(|field| TantivyTerm::from_field_text(field, &term.text))
    }

    fn compute_collection_statistics(&self, field: &str) -> Result<CollectionStatistics> {
        let Some(field) = self.field(field) else {
            return Ok(CollectionStatistics::default());
        };
        let mut sum_total_term_freq = 0;
        for segment in self.searcher.segment_readers() {
            sum_total_term_freq += segment.inverted_index(field)?.total_num_tokens();
        }
        Ok(CollectionStatistics {
            doc_count: self.searcher.num_docs(),
            sum_total_term_freq,
        })
    }

    /// Decodes the term's postings in every segment, skipping deleted documents.
    fn compute_term_statistics(&self, term: &Term) -> Result<TermStatistics> {
        let Some(tantivy_term) = self.term(term) else {
            return Ok(TermStatistics::default());
        };
        let mut stats = TermStatistics::default();
        for segment in self.searcher.segment_readers() {
            let inverted_index = segment.inverted_index(tantivy_term.field())?;
            let Some(mut postings) =
                inverted_index.read_postings(&tantivy_term, IndexRecordOption::WithFreqs)?
            else {
                continue;
            };
            while postings.doc() != TERMINATED {
                if is_alive(segment, postings.doc()) {
                    stats.doc_freq += 1;
                    stats.total_term_freq += u64::from(postings.term_freq());
                }
                postings.advance();
            }
        }
        Ok(stats)
    }
}

impl TermPostingSource for TantivySegmentSource<'_> {
    fn max_doc(&self) -> DocId {
        self.segment.max_doc()
    }

    fn collection_statistics(&self, field: &str) -> Result<CollectionStatistics> {
        self.statistics
            .field_or_insert_with(field, || self.compute_collection_statistics(field))
    }

    fn term_statistics(&self, term: &Term) -> Result<TermStatistics> {
        self.statistics
            .term_or_insert_with(term, || self.compute_term_statistics(term))
    }

    fn postings<'s>(&'s self, term: &Term) -> Result<BoxedPostings<'s>> {
        let Some(tantivy_term) = self.term(term) else {
            return Ok(Box::new(EmptyPostings));
        };
        let postings = self
            .segment
            .inverted_index(tantivy_term.field())?
            .read_postings(&tantivy_term, IndexRecordOption::WithFreqsAndPositions)?;
        Ok(match postings {
            Some(postings) => Box::new(TantivyPostings::new(postings)),
            None => Box::new(EmptyPostings),
        })
    }

    fn field_norms(&self, field: &str) -> Result<FieldNorms> {
        let Some(field) = self.field(field) else {
            return Ok(FieldNorms::default());
        };
        let reader = self.segment.get_fieldnorms_reader(field)?;
        Ok(FieldNorms::new(
            (0..self.segment.max_doc())
                .map(|doc| norm::encode_length(reader.fieldnorm(doc)))
                .collect(),
        ))
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        !is_alive(self.segment, doc)
    }
}

fn is_alive(segment: &SegmentReader, doc: DocId) -> bool {
    segment
        .alive_bitset()
        .map_or(true, |alive_bitset| alive_bitset.is_alive(doc))
}

/// Positional cursor over tantivy segment postings.
struct TantivyPostings {
    postings: SegmentPostings,
    positions: Vec<u32>,
    loaded: bool,
    cursor: usize,
    exhausted: bool,
}

impl TantivyPostings {
    fn new(postings: SegmentPostings) -> Self {
        Self {
            postings,
            positions: Vec::new(),
            loaded: false,
            cursor: 0,
            exhausted: false,
        }
    }

    fn reset_positions(&mut self) {
        self.loaded = false;
        self.cursor = 0;
    }
}

impl PostingIterator for TantivyPostings {
    fn doc(&self) -> DocId {
        if self.exhausted {
            TERMINATED
        } else {
            self.postings.doc()
        }
    }

    fn advance(&mut self) -> DocId {
        if self.doc() == TERMINATED {
            return TERMINATED;
        }
        self.reset_positions();
        self.postings.advance()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        let current = self.doc();
        if current >= target {
            return current;
        }
        self.reset_positions();
        if target == TERMINATED {
            self.exhausted = true;
            return TERMINATED;
        }
        self.postings.seek(target)
    }

    fn freq(&self) -> u32 {
        if self.doc() == TERMINATED {
            0
        } else {
            self.postings.term_freq()
        }
    }

    fn next_position(&mut self) -> Option<Span> {
        if self.doc() == TERMINATED {
            return None;
        }
        if !self.loaded {
            self.positions.clear();
            self.postings.positions(&mut self.positions);
            self.loaded = true;
        }
        let position = *self.positions.get(self.cursor)?;
        self.cursor += 1;
        Some(Span::at(position))
    }

    fn cost(&self) -> u64 {
        u64::from(self.postings.size_hint())
    }
}
