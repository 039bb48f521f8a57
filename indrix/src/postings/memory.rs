//! Positional index held entirely in memory.

use std::collections::HashMap;

use super::{
    BoxedPostings, CollectionStatistics, DocId, EmptyPostings, FieldNorms, PostingIterator, Span,
    TermPostingSource, TermStatistics, TERMINATED,
};
use crate::analysis::{AnalyzedToken, Analyzer};
use crate::query::ast::Term;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Posting {
    doc: DocId,
    positions: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
struct FieldIndex {
    terms: HashMap<String, Vec<Posting>>,
    lengths: HashMap<DocId, u32>,
    total_tokens: u64,
}

/// A single-segment index built from analyzed text. Documents are numbered from zero in the
/// order they are added.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    fields: HashMap<String, FieldIndex>,
    num_docs: DocId,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// One document per text, all in `field`.
    pub fn from_texts(analyzer: &Analyzer, field: &str, texts: &[&str]) -> Self {
        let mut index = Self::new();
        for text in texts {
            index.add_document(analyzer, &[(field, *text)]);
        }
        index
    }

    /// Add a document and return its id.
    pub fn add_document(&mut self, analyzer: &Analyzer, fields: &[(&str, &str)]) -> DocId {
        let doc = self.num_docs;
        for (field, text) in fields {
            let tokens = analyzer.tokens(text);
            self.add_tokens(doc, field, &tokens);
        }
        self.num_docs += 1;
        doc
    }

    fn add_tokens(&mut self, doc: DocId, field: &str, tokens: &[AnalyzedToken]) {
        let index = self.fields.entry(field.to_string()).or_default();
        *index.lengths.entry(doc).or_default() += tokens.len() as u32;
        index.total_tokens += tokens.len() as u64;

        for token in tokens {
            let postings = index.terms.entry(token.text.clone()).or_default();
            match postings.last_mut() {
                Some(last) if last.doc == doc => last.positions.push(token.position),
                _ => postings.push(Posting {
                    doc,
                    positions: vec![token.position],
                }),
            }
        }
    }

    pub fn num_docs(&self) -> DocId {
        self.num_docs
    }

    fn term_postings(&self, term: &Term) -> &[Posting] {
        self.fields
            .get(&term.field)
            .and_then(|field| field.terms.get(&term.text))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl TermPostingSource for MemoryIndex {
    fn max_doc(&self) -> DocId {
        self.num_docs
    }

    fn collection_statistics(&self, field: &str) -> Result<CollectionStatistics> {
        Ok(self
            .fields
            .get(field)
            .map(|index| CollectionStatistics {
                doc_count: index.lengths.len() as u64,
                sum_total_term_freq: index.total_tokens,
            })
            .unwrap_or_default())
    }

    fn term_statistics(&self, term: &Term) -> Result<TermStatistics> {
        let postings = self.term_postings(term);
        Ok(TermStatistics {
            doc_freq: postings.len() as u64,
            total_term_freq: postings.iter().map(|p| p.positions.len() as u64).sum(),
        })
    }

    fn postings<'a>(&'a self, term: &Term) -> Result<BoxedPostings<'a>> {
        let postings = self.term_postings(term);
        if postings.is_empty() {
            return Ok(Box::new(EmptyPostings));
        }
        Ok(Box::new(MemoryPostings {
            postings,
            index: 0,
            position: 0,
        }))
    }

    fn field_norms(&self, field: &str) -> Result<FieldNorms> {
        let lengths = self.fields.get(field).map(|index| &index.lengths);
        Ok(FieldNorms::from_lengths((0..self.num_docs).map(|doc| {
            lengths
                .and_then(|lengths| lengths.get(&doc).copied())
                .unwrap_or(0)
        })))
    }
}

struct MemoryPostings<'a> {
    postings: &'a [Posting],
    index: usize,
    position: usize,
}

impl PostingIterator for MemoryPostings<'_> {
    fn doc(&self) -> DocId {
        self.postings
            .get(self.index)
            .map(|p| p.doc)
            .unwrap_or(TERMINATED)
    }

    fn advance(&mut self) -> DocId {
        if self.index < self.postings.len() {
            self.index += 1;
        }
        self.position = 0;
        self.doc()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        if self.doc() >= target {
            return self.doc();
        }
        self.index += self.postings[self.index..].partition_point(|p| p.doc < target);
        self.position = 0;
        self.doc()
    }

    fn freq(&self) -> u32 {
        self.postings
            .get(self.index)
            .map(|p| p.positions.len() as u32)
            .unwrap_or(0)
    }

    fn next_position(&mut self) -> Option<Span> {
        let position = *self.postings.get(self.index)?.positions.get(self.position)?;
        self.position += 1;
        Some(Span::at(position))
    }

    fn cost(&self) -> u64 {
        self.postings.len() as u64
    }
}
