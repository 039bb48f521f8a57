use super::{VirtualPostingList, VirtualPostingListBuilder};
use crate::postings::{BoxedPostings, PostingIterator, TERMINATED};

/// SYNONYM: the union of the children's postings, as if they were one term.
///
/// A document holding several synonyms counts once towards the list's document frequency.
pub fn build_synonym(field: &str, children: Vec<BoxedPostings<'_>>) -> VirtualPostingList {
    let mut builder = VirtualPostingListBuilder::new(field);
    for mut child in children {
        let mut doc = child.doc();
        while doc != TERMINATED {
            while let Some(span) = child.next_position() {
                builder.add_span(doc, span);
            }
            doc = child.advance();
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::postings;
    use super::*;
    use crate::analysis::Analyzer;
    use crate::postings::memory::MemoryIndex;
    use crate::postings::Span;

    #[test]
    fn test_synonym_statistics_are_a_union() {
        let index = MemoryIndex::from_texts(
            &Analyzer::plain(),
            "text",
            &["run fast", "running late", "run running", "walk"],
        );
        let list = build_synonym("text", postings(&index, &["run", "running"]));
        assert_eq!(list.doc_freq(), 3);
        assert_eq!(list.total_term_freq(), 4);
        assert_eq!(list.docs(), &[0, 1, 2]);
        assert_eq!(list.spans(2), Some(&[Span::at(0), Span::at(1)][..]));
    }

    #[test]
    fn test_synonym_of_nothing() {
        let index = MemoryIndex::from_texts(&Analyzer::plain(), "text", &["a"]);
        let list = build_synonym("text", postings(&index, &["x", "y"]));
        assert!(list.is_empty());
        assert_eq!(list.field(), "text");
    }
}
