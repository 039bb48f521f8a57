use super::{for_each_common_doc, VirtualPostingList, VirtualPostingListBuilder};
use crate::postings::{BoxedPostings, Span};

/// NEAR/`distance`: children in the given order, each starting at most `distance` tokens after
/// the previous one ends.
pub fn build_ordered(
    field: &str,
    mut children: Vec<BoxedPostings<'_>>,
    distance: u32,
) -> VirtualPostingList {
    let mut builder = VirtualPostingListBuilder::new(field);
    for_each_common_doc(&mut children, |doc, spans| {
        for span in ordered_matches(spans, distance) {
            builder.add_span(doc, span);
        }
    });
    builder.build()
}

/// Greedy left-to-right ordered matches within one document.
///
/// `spans[i]` holds child `i`'s spans sorted by start. Each match runs from the first child's
/// start to the last child's end, and matches never overlap.
pub fn ordered_matches(spans: &[Vec<Span>], distance: u32) -> Vec<Span> {
    let mut matches = Vec::new();
    let Some((first, rest)) = spans.split_first() else {
        return matches;
    };
    // cursors only move forward: a later anchor never needs an earlier follower
    let mut cursors = vec![0usize; rest.len()];
    let mut last_end: Option<u32> = None;

    'anchors: for anchor in first {
        if last_end.is_some_and(|end| anchor.start <= end) {
            continue;
        }
        let mut previous = *anchor;
        for (child, cursor) in rest.iter().zip(cursors.iter_mut()) {
            while *cursor < child.len() && child[*cursor].start <= previous.end {
                *cursor += 1;
            }
            let Some(next) = child.get(*cursor) else {
                break 'anchors;
            };
            if next.start - previous.end > distance {
                continue 'anchors;
            }
            previous = *next;
        }
        matches.push(Span::new(anchor.start, previous.end));
        last_end = Some(previous.end);
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::super::test_support::postings;
    use super::*;
    use crate::analysis::Analyzer;
    use crate::postings::memory::MemoryIndex;

    fn terms(positions: &[u32]) -> Vec<Span> {
        positions.iter().map(|&p| Span::at(p)).collect()
    }

    #[test]
    fn test_adjacent_terms() {
        let spans = vec![terms(&[0, 5]), terms(&[1, 9])];
        assert_eq!(ordered_matches(&spans, 1), vec![Span::new(0, 1)]);
    }

    #[test]
    fn test_order_matters() {
        // "b x a"
        let spans = vec![terms(&[2]), terms(&[0])];
        assert!(ordered_matches(&spans, 1).is_empty());
        assert!(ordered_matches(&spans, 10).is_empty());
    }

    #[test]
    fn test_distance_limit() {
        let spans = vec![terms(&[0]), terms(&[3])];
        assert!(ordered_matches(&spans, 2).is_empty());
        assert_eq!(ordered_matches(&spans, 3), vec![Span::new(0, 3)]);
    }

    #[test]
    fn test_three_terms() {
        // quick(1) brown(2) ... fox(4)
        let spans = vec![terms(&[1]), terms(&[2]), terms(&[4])];
        assert_eq!(ordered_matches(&spans, 2), vec![Span::new(1, 4)]);
        assert!(ordered_matches(&spans, 1).is_empty());
    }

    #[test]
    fn test_matches_do_not_overlap() {
        // "a a b b"
        let spans = vec![terms(&[0, 1]), terms(&[2, 3])];
        assert_eq!(ordered_matches(&spans, 2), vec![Span::new(0, 2)]);
        // "a b a b"
        let spans = vec![terms(&[0, 2]), terms(&[1, 3])];
        assert_eq!(
            ordered_matches(&spans, 1),
            vec![Span::new(0, 1), Span::new(2, 3)]
        );
    }

    #[test]
    fn test_later_anchor_matches_after_failed_one() {
        let spans = vec![terms(&[0, 7]), terms(&[8])];
        assert_eq!(ordered_matches(&spans, 1), vec![Span::new(7, 8)]);
    }

    #[test]
    fn test_nested_spans_use_span_ends() {
        let spans = vec![vec![Span::new(0, 2)], terms(&[3])];
        assert_eq!(ordered_matches(&spans, 1), vec![Span::new(0, 3)]);
        let spans = vec![vec![Span::new(0, 2)], terms(&[2])];
        assert!(ordered_matches(&spans, 1).is_empty());
    }

    #[test]
    fn test_single_child_passes_through() {
        let spans = vec![terms(&[3, 8])];
        assert_eq!(ordered_matches(&spans, 1), terms(&[3, 8]));
    }

    #[test]
    fn test_build_over_index() {
        let index = MemoryIndex::from_texts(
            &Analyzer::plain(),
            "text",
            &["white house lawn", "the house is white", "white house and white house"],
        );
        let list = build_ordered("text", postings(&index, &["white", "house"]), 1);
        assert_eq!(list.docs(), &[0, 2]);
        assert_eq!(list.spans(2), Some(&[Span::new(0, 1), Span::new(3, 4)][..]));
        assert_eq!(list.total_term_freq(), 3);
    }
}
