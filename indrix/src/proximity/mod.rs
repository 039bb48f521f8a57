//! Synthesized positional postings for composite conditions.
//!
//! NEAR, WINDOW, BAND and SYNONYM are evaluated by merging their children's positional
//! postings into a [`VirtualPostingList`] before scoring starts. The list is then read through
//! [`VirtualPostings`] exactly like a real term's postings.

mod ordered;
mod synonym;
mod unordered;
mod virtual_list;

pub use ordered::{build_ordered, ordered_matches};
pub use synonym::build_synonym;
pub use unordered::{build_band, build_unordered, unordered_matches};
pub use virtual_list::{VirtualPostingList, VirtualPostingListBuilder, VirtualPostings};

use std::fmt;

use tracing::debug;

use crate::postings::{collect_spans, BoxedPostings, DocId, PostingIterator, Span, TERMINATED};
use crate::query::ast::OperatorKind;

/// Composite operators that materialize a virtual posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityOperator {
    /// Children in order, each within `distance` tokens of the previous one.
    Ordered(u32),
    /// All children inside a span of at most `width` tokens, in any order.
    Unordered(u32),
    /// All children anywhere in the document.
    Band,
    Synonym,
}

impl ProximityOperator {
    pub fn from_kind(kind: OperatorKind) -> Option<Self> {
        match kind {
            OperatorKind::Near(distance) => Some(Self::Ordered(distance)),
            OperatorKind::Window(width) => Some(Self::Unordered(width)),
            OperatorKind::Band => Some(Self::Band),
            OperatorKind::Synonym => Some(Self::Synonym),
            _ => None,
        }
    }
}

impl fmt::Display for ProximityOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordered(distance) => write!(f, "near/{}", distance),
            Self::Unordered(width) => write!(f, "uw{}", width),
            Self::Band => write!(f, "band"),
            Self::Synonym => write!(f, "syn"),
        }
    }
}

/// Materialize the list for `operator` over `children`.
pub fn build(
    operator: ProximityOperator,
    field: &str,
    children: Vec<BoxedPostings<'_>>,
) -> VirtualPostingList {
    let list = match operator {
        ProximityOperator::Ordered(distance) => build_ordered(field, children, distance),
        ProximityOperator::Unordered(width) => build_unordered(field, children, width),
        ProximityOperator::Band => build_band(field, children),
        ProximityOperator::Synonym => build_synonym(field, children),
    };
    debug!(
        operator = %operator,
        field = %field,
        doc_freq = list.doc_freq(),
        total_term_freq = list.total_term_freq(),
        "built virtual posting list"
    );
    list
}

/// Visit every document all `children` contain, with each child's spans in that document.
///
/// The cheapest child drives the loop; the others seek to its candidates.
pub(crate) fn for_each_common_doc<F>(children: &mut [BoxedPostings<'_>], mut on_doc: F)
where
    F: FnMut(DocId, &[Vec<Span>]),
{
    if children.is_empty() {
        return;
    }
    let primary = children
        .iter()
        .enumerate()
        .min_by_key(|(_, child)| child.cost())
        .map(|(index, _)| index)
        .unwrap_or(0);

    let mut spans = vec![Vec::new(); children.len()];
    let mut candidate = children[primary].doc();
    'docs: while candidate != TERMINATED {
        for index in 0..children.len() {
            if index == primary {
                continue;
            }
            let doc = children[index].seek(candidate);
            if doc != candidate {
                candidate = children[primary].seek(doc);
                continue 'docs;
            }
        }
        for (child, out) in children.iter_mut().zip(spans.iter_mut()) {
            collect_spans(child, out);
        }
        on_doc(candidate, &spans);
        candidate = children[primary].advance();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::postings;
    use super::*;
    use crate::analysis::Analyzer;
    use crate::postings::memory::MemoryIndex;

    #[test]
    fn test_common_docs_skip_partial_matches() {
        let index = MemoryIndex::from_texts(
            &Analyzer::plain(),
            "text",
            &["a b", "a", "b", "b a a", "c"],
        );
        let mut children = postings(&index, &["a", "b"]);
        let mut seen = Vec::new();
        for_each_common_doc(&mut children, |doc, spans| {
            seen.push((doc, spans[0].len(), spans[1].len()));
        });
        assert_eq!(seen, vec![(0, 1, 1), (3, 2, 1)]);
    }

    #[test]
    fn test_common_docs_with_missing_term() {
        let index = MemoryIndex::from_texts(&Analyzer::plain(), "text", &["a b"]);
        let mut children = postings(&index, &["a", "zzz"]);
        let mut calls = 0;
        for_each_common_doc(&mut children, |_, _| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_build_dispatch() {
        let index = MemoryIndex::from_texts(&Analyzer::plain(), "text", &["b x a"]);
        let near = build(ProximityOperator::Ordered(1), "text", postings(&index, &["a", "b"]));
        let window = build(
            ProximityOperator::Unordered(2),
            "text",
            postings(&index, &["a", "b"]),
        );
        assert!(near.is_empty());
        assert_eq!(window.spans(0), Some(&[Span::new(0, 2)][..]));
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(
            ProximityOperator::from_kind(OperatorKind::Near(3)),
            Some(ProximityOperator::Ordered(3))
        );
        assert_eq!(ProximityOperator::from_kind(OperatorKind::And), None);
    }
}
