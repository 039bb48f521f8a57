//! Document-order merge over child cursors.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::postings::{DocId, TERMINATED};

/// Cursor interface the merge drives.
pub(crate) trait DocCursor {
    fn doc(&self) -> DocId;
    fn advance(&mut self) -> DocId;
    fn seek(&mut self, target: DocId) -> DocId;
}

/// Min-heap of `(doc, child index)` over an arena of children.
///
/// Every live child is in the heap exactly once, keyed by its current document. Children the
/// heap does not hold are exhausted.
#[derive(Debug, Clone)]
pub(crate) struct DocUnion {
    heap: BinaryHeap<Reverse<(DocId, usize)>>,
    doc: DocId,
}

impl DocUnion {
    pub fn new<C: DocCursor>(children: &[C]) -> Self {
        let heap: BinaryHeap<_> = children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.doc() != TERMINATED)
            .map(|(index, child)| Reverse((child.doc(), index)))
            .collect();
        let mut union = Self {
            heap,
            doc: TERMINATED,
        };
        union.refresh();
        union
    }

    pub fn doc(&self) -> DocId {
        self.doc
    }

    fn refresh(&mut self) {
        self.doc = self
            .heap
            .peek()
            .map_or(TERMINATED, |Reverse((doc, _))| *doc);
    }

    /// Move every child on the current document forward.
    pub fn advance<C: DocCursor>(&mut self, children: &mut [C]) -> DocId {
        let current = self.doc;
        if current == TERMINATED {
            return TERMINATED;
        }
        while let Some(&Reverse((doc, index))) = self.heap.peek() {
            if doc != current {
                break;
            }
            self.heap.pop();
            let next = children[index].advance();
            if next != TERMINATED {
                self.heap.push(Reverse((next, index)));
            }
        }
        self.refresh();
        self.doc
    }

    /// Move every child behind `target` to its first document `>= target`.
    pub fn seek<C: DocCursor>(&mut self, children: &mut [C], target: DocId) -> DocId {
        if self.doc >= target {
            return self.doc;
        }
        while let Some(&Reverse((doc, index))) = self.heap.peek() {
            if doc >= target {
                break;
            }
            self.heap.pop();
            let next = children[index].seek(target);
            if next != TERMINATED {
                self.heap.push(Reverse((next, index)));
            }
        }
        self.refresh();
        self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecCursor {
        docs: Vec<DocId>,
        index: usize,
    }

    impl VecCursor {
        fn new(docs: &[DocId]) -> Self {
            Self {
                docs: docs.to_vec(),
                index: 0,
            }
        }
    }

    impl DocCursor for VecCursor {
        fn doc(&self) -> DocId {
            self.docs.get(self.index).copied().unwrap_or(TERMINATED)
        }

        fn advance(&mut self) -> DocId {
            self.index += 1;
            self.doc()
        }

        fn seek(&mut self, target: DocId) -> DocId {
            while self.doc() < target {
                self.index += 1;
            }
            self.doc()
        }
    }

    fn drain(union: &mut DocUnion, children: &mut [VecCursor]) -> Vec<DocId> {
        let mut docs = Vec::new();
        let mut doc = union.doc();
        while doc != TERMINATED {
            docs.push(doc);
            doc = union.advance(children);
        }
        docs
    }

    #[test]
    fn test_union_is_sorted_and_deduplicated() {
        let mut children = vec![
            VecCursor::new(&[1, 4, 9]),
            VecCursor::new(&[]),
            VecCursor::new(&[0, 4, 5]),
        ];
        let mut union = DocUnion::new(&children);
        assert_eq!(drain(&mut union, &mut children), vec![0, 1, 4, 5, 9]);
        // all children on the shared doc moved past it
        assert_eq!(children[0].doc(), TERMINATED);
        assert_eq!(children[2].doc(), TERMINATED);
    }

    #[test]
    fn test_seek() {
        let mut children = vec![VecCursor::new(&[1, 4, 9]), VecCursor::new(&[2, 7])];
        let mut union = DocUnion::new(&children);
        assert_eq!(union.seek(&mut children, 5), 7);
        assert_eq!(union.seek(&mut children, 3), 7);
        assert_eq!(union.advance(&mut children), 9);
        assert_eq!(union.seek(&mut children, TERMINATED), TERMINATED);
    }

    #[test]
    fn test_empty_union() {
        let children: Vec<VecCursor> = Vec::new();
        assert_eq!(DocUnion::new(&children).doc(), TERMINATED);
    }
}
