use super::{for_each_common_doc, VirtualPostingList, VirtualPostingListBuilder};
use crate::postings::{BoxedPostings, Span};

/// WINDOW/`width`: every child inside a span no wider than `width` tokens, in any order.
pub fn build_unordered(
    field: &str,
    children: Vec<BoxedPostings<'_>>,
    width: u32,
) -> VirtualPostingList {
    build_windows(field, children, Some(width))
}

/// BAND: every child somewhere in the document.
pub fn build_band(field: &str, children: Vec<BoxedPostings<'_>>) -> VirtualPostingList {
    build_windows(field, children, None)
}

fn build_windows(
    field: &str,
    mut children: Vec<BoxedPostings<'_>>,
    width: Option<u32>,
) -> VirtualPostingList {
    let mut builder = VirtualPostingListBuilder::new(field);
    for_each_common_doc(&mut children, |doc, spans| {
        for span in unordered_matches(spans, width) {
            builder.add_span(doc, span);
        }
    });
    builder.build()
}

/// Greedy unordered matches within one document.
///
/// All spans are pooled and sorted by start. From each start the window grows until it holds
/// one span of every child; it matches when its width is within `width` (unbounded when
/// `None`). Scanning resumes after the last span used.
pub fn unordered_matches(spans: &[Vec<Span>], width: Option<u32>) -> Vec<Span> {
    let children = spans.len();
    let mut matches = Vec::new();
    if children == 0 {
        return matches;
    }

    let mut pooled: Vec<(Span, usize)> = spans
        .iter()
        .enumerate()
        .flat_map(|(child, child_spans)| child_spans.iter().map(move |span| (*span, child)))
        .collect();
    pooled.sort_unstable();

    let mut seen = vec![false; children];
    let mut used = Vec::with_capacity(children);
    let mut i = 0;
    while i < pooled.len() {
        let (first, _) = pooled[i];
        if width.is_some_and(|width| first.width() > width) {
            i += 1;
            continue;
        }
        seen.fill(false);
        used.clear();
        let start = first.start;
        let mut end = start;
        let mut covered = 0;
        let mut matched_through = None;

        for (j, &(span, child)) in pooled.iter().enumerate().skip(i) {
            if width.is_some_and(|width| span.start - start > width) {
                break;
            }
            // one occurrence cannot stand in for two children
            if seen[child] || used.contains(&span) {
                continue;
            }
            if width.is_some_and(|width| span.end.max(end) - start > width) {
                continue;
            }
            seen[child] = true;
            used.push(span);
            end = end.max(span.end);
            covered += 1;
            if covered == children {
                matched_through = Some(j);
                break;
            }
        }

        match matched_through {
            Some(j) => {
                matches.push(Span::new(start, end));
                i = j + 1;
                while i < pooled.len() && pooled[i].0.start <= end {
                    i += 1;
                }
            }
            None => i += 1,
        }
    }
    matches
}
