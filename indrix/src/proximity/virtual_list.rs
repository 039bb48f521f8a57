use std::collections::BTreeMap;
use std::sync::Arc;

use crate::postings::{DocId, PostingIterator, Span, TermStatistics, TERMINATED};

/// Accumulates spans per document, keeping each document's spans free of containment.
#[derive(Debug, Clone, Default)]
pub struct VirtualPostingListBuilder {
    field: String,
    docs: BTreeMap<DocId, BTreeMap<u32, u32>>,
}

impl VirtualPostingListBuilder {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            docs: BTreeMap::new(),
        }
    }

    /// Record `span` in `doc`. A span inside an existing one is dropped; existing spans inside
    /// the new one are replaced by it.
    ///
    /// Stored spans never contain each other, so their ends grow with their starts: only the
    /// closest span starting at or before `span` can contain it, and the spans it covers form a
    /// prefix of those starting inside it.
    pub fn add_span(&mut self, doc: DocId, span: Span) {
        let spans = self.docs.entry(doc).or_default();
        if let Some((_, &end)) = spans.range(..=span.start).next_back() {
            if end >= span.end {
                return;
            }
        }
        let covered: Vec<u32> = spans
            .range(span.start..=span.end)
            .take_while(|&(_, &end)| end <= span.end)
            .map(|(&start, _)| start)
            .collect();
        for start in covered {
            spans.remove(&start);
        }
        spans.insert(span.start, span.end);
    }

    pub fn build(self) -> VirtualPostingList {
        let mut docs = Vec::with_capacity(self.docs.len());
        let mut offsets = Vec::with_capacity(self.docs.len() + 1);
        let mut spans = Vec::new();
        offsets.push(0);
        for (doc, doc_spans) in self.docs {
            if doc_spans.is_empty() {
                continue;
            }
            docs.push(doc);
            spans.extend(doc_spans.into_iter().map(|(start, end)| Span::new(start, end)));
            offsets.push(spans.len());
        }
        VirtualPostingList {
            field: self.field,
            docs,
            offsets,
            spans,
        }
    }
}

/// Read-only positional postings synthesized for one composite operator in one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPostingList {
    field: String,
    docs: Vec<DocId>,
    // spans of docs[i] are spans[offsets[i]..offsets[i + 1]]
    offsets: Vec<usize>,
    spans: Vec<Span>,
}

impl VirtualPostingList {
    pub fn empty(field: impl Into<String>) -> Self {
        VirtualPostingListBuilder::new(field).build()
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn doc_freq(&self) -> u64 {
        self.docs.len() as u64
    }

    pub fn total_term_freq(&self) -> u64 {
        self.spans.len() as u64
    }

    pub fn term_statistics(&self) -> TermStatistics {
        TermStatistics {
            doc_freq: self.doc_freq(),
            total_term_freq: self.total_term_freq(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn docs(&self) -> &[DocId] {
        &self.docs
    }

    pub fn spans(&self, doc: DocId) -> Option<&[Span]> {
        let index = self.docs.binary_search(&doc).ok()?;
        Some(self.spans_at(index))
    }

    fn spans_at(&self, index: usize) -> &[Span] {
        &self.spans[self.offsets[index]..self.offsets[index + 1]]
    }

    pub fn postings(self: &Arc<Self>) -> VirtualPostings {
        VirtualPostings {
            list: Arc::clone(self),
            index: 0,
            position: 0,
        }
    }
}

/// Cursor over a [`VirtualPostingList`].
#[derive(Debug, Clone)]
pub struct VirtualPostings {
    list: Arc<VirtualPostingList>,
    index: usize,
    position: usize,
}

impl PostingIterator for VirtualPostings {
    fn doc(&self) -> DocId {
        self.list.docs.get(self.index).copied().unwrap_or(TERMINATED)
    }

    fn advance(&mut self) -> DocId {
        if self.index < self.list.docs.len() {
            self.index += 1;
        }
        self.position = 0;
        self.doc()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        if self.doc() >= target {
            return self.doc();
        }
        let remaining = &self.list.docs[self.index..];
        self.index += remaining.partition_point(|&doc| doc < target);
        self.position = 0;
        self.doc()
    }

    fn freq(&self) -> u32 {
        if self.index < self.list.docs.len() {
            self.list.spans_at(self.index).len() as u32
        } else {
            0
        }
    }

    fn next_position(&mut self) -> Option<Span> {
        if self.index >= self.list.docs.len() {
            return None;
        }
        let span = self.list.spans_at(self.index).get(self.position).copied()?;
        self.position += 1;
        Some(span)
    }

    fn cost(&self) -> u64 {
        self.list.doc_freq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_span_drops_contained() {
        let mut builder = VirtualPostingListBuilder::new("text");
        builder.add_span(3, Span::new(2, 6));
        builder.add_span(3, Span::new(3, 4));
        builder.add_span(3, Span::new(2, 6));
        let list = builder.build();
        assert_eq!(list.spans(3), Some(&[Span::new(2, 6)][..]));
        assert_eq!(list.total_term_freq(), 1);
    }

    #[test]
    fn test_add_span_replaces_covered() {
        let mut builder = VirtualPostingListBuilder::new("text");
        builder.add_span(1, Span::at(4));
        builder.add_span(1, Span::at(6));
        builder.add_span(1, Span::at(9));
        builder.add_span(1, Span::new(3, 7));
        let list = builder.build();
        assert_eq!(list.spans(1), Some(&[Span::new(3, 7), Span::at(9)][..]));
    }

    #[test]
    fn test_add_span_checks_nearest_predecessor() {
        let mut builder = VirtualPostingListBuilder::new("text");
        for start in [0, 4, 8, 12] {
            builder.add_span(0, Span::new(start, start + 2));
        }
        // starts after (4, 6) but ends past it, so it stays
        builder.add_span(0, Span::new(5, 7));
        // inside (8, 10), which is not the first span
        builder.add_span(0, Span::new(9, 10));
        // covers (4, 6) and (5, 7) but not (8, 10)
        builder.add_span(0, Span::new(3, 9));
        let list = builder.build();
        assert_eq!(
            list.spans(0),
            Some(&[Span::new(0, 2), Span::new(3, 9), Span::new(8, 10), Span::new(12, 14)][..])
        );
    }

    #[test]
    fn test_statistics() {
        let mut builder = VirtualPostingListBuilder::new("text");
        builder.add_span(0, Span::at(1));
        builder.add_span(0, Span::at(5));
        builder.add_span(7, Span::new(0, 2));
        let list = builder.build();
        assert_eq!(list.doc_freq(), 2);
        assert_eq!(list.total_term_freq(), 3);
        assert_eq!(list.docs(), &[0, 7]);
        assert_eq!(list.spans(4), None);
    }

    #[test]
    fn test_cursor() {
        let mut builder = VirtualPostingListBuilder::new("text");
        for doc in [2, 5, 9] {
            builder.add_span(doc, Span::at(doc));
            builder.add_span(doc, Span::at(doc + 10));
        }
        let list = Arc::new(builder.build());
        let mut cursor = list.postings();
        assert_eq!(cursor.doc(), 2);
        assert_eq!(cursor.freq(), 2);
        assert_eq!(cursor.next_position(), Some(Span::at(2)));
        assert_eq!(cursor.next_position(), Some(Span::at(12)));
        assert_eq!(cursor.next_position(), None);
        assert_eq!(cursor.seek(3), 5);
        assert_eq!(cursor.seek(5), 5);
        assert_eq!(cursor.next_position(), Some(Span::at(5)));
        assert_eq!(cursor.advance(), 9);
        assert_eq!(cursor.advance(), TERMINATED);
        assert_eq!(cursor.advance(), TERMINATED);
        assert_eq!(cursor.freq(), 0);
        assert_eq!(cursor.cost(), 3);
    }

    #[test]
    fn test_empty_list() {
        let list = Arc::new(VirtualPostingList::empty("text"));
        assert!(list.is_empty());
        let mut cursor = list.postings();
        assert_eq!(cursor.doc(), TERMINATED);
        assert_eq!(cursor.seek(TERMINATED), TERMINATED);
    }
}
