//! k-way merge of per-genome variant streams into ordered groups.
//!
//! Each source yields its variants ascending by meta-genome position. An
//! [`AlignedWindow`] keeps one cursor per source and a binary heap holding
//! each cursor's next variant, so only as much of every stream is read as
//! the next group needs.
//!
//! # Ordering
//!
//! - groups ascend by meta-genome position
//! - inside a group: reference start ascending, then longer variants first,
//!   then source index and position within the source
//!
//! # Example
//!
//! ```
//! use genotrack::context::ProjectContext;
//! use genotrack::coords::GenomeRegistry;
//! use genotrack::variants::{Variant, VariantAligner, VariantRecord};
//!
//! # fn main() -> genotrack::Result<()> {
//! let ctx = ProjectContext::from_pairs([("chr1", 1000)])?;
//! let registry = GenomeRegistry::new(&ctx);
//! let t = registry.transformer();
//!
//! let g1 = vec![Variant::positioned(VariantRecord::new(500, 1, 1, "snv"), 1, 0, "chr1", &t)?];
//! let g2 = vec![Variant::positioned(VariantRecord::new(500, 4, 0, "del"), 2, 0, "chr1", &t)?];
//!
//! let aligner = VariantAligner::new(vec![g1, g2]);
//! for group in aligner.align_window(0, 999)? {
//!     let group = group?;
//!     assert_eq!(group.variants()[0].length(), 4);
//! }
//! # Ok(())
//! # }
//! ```

use crate::context::{AlwaysContinue, ContinueCheck};
use crate::error::{GenotrackError, Result};
use crate::variants::record::Variant;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::{debug, info_span, trace, Span};

/// A genome's variants, ascending by meta-genome position.
///
/// Every call to [`variants_from`](Self::variants_from) starts a fresh pass,
/// which is what makes windows restartable.
pub trait VariantSource {
    /// Iterator over one pass
    type Iter<'s>: Iterator<Item = Result<Variant>>
    where
        Self: 's;

    /// Variants whose meta position is at least `meta_start`.
    ///
    /// Sources may start earlier; the aligner skips what lies before.
    fn variants_from(&self, meta_start: u64) -> Self::Iter<'_>;
}

impl VariantSource for Vec<Variant> {
    type Iter<'s> = std::iter::Map<std::iter::Cloned<std::slice::Iter<'s, Variant>>, fn(Variant) -> Result<Variant>>;

    fn variants_from(&self, meta_start: u64) -> Self::Iter<'_> {
        let first = self.partition_point(|v| v.meta_genome_position() < meta_start);
        self[first..]
            .iter()
            .cloned()
            .map(Ok as fn(Variant) -> Result<Variant>)
    }
}

/// Variants sharing one meta-genome position, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantGroup {
    meta_genome_position: u64,
    variants: Vec<Variant>,
}

impl VariantGroup {
    /// Shared meta-genome position
    pub fn meta_genome_position(&self) -> u64 {
        self.meta_genome_position
    }

    /// The variants, ordered
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Number of variants
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the group is empty (never true for emitted groups)
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Take the variants
    pub fn into_variants(self) -> Vec<Variant> {
        self.variants
    }
}

/// Merges per-genome sources.
pub struct VariantAligner<S, C = AlwaysContinue> {
    sources: Vec<S>,
    check: C,
}

impl<S: VariantSource> VariantAligner<S> {
    /// Aligner over `sources`; their index is the stable tie-break
    pub fn new(sources: Vec<S>) -> Self {
        VariantAligner {
            sources,
            check: AlwaysContinue,
        }
    }
}

impl<S: VariantSource, C: ContinueCheck> VariantAligner<S, C> {
    /// Poll `check` before each emitted group
    pub fn with_continue_check<C2: ContinueCheck>(self, check: C2) -> VariantAligner<S, C2> {
        VariantAligner {
            sources: self.sources,
            check,
        }
    }

    /// Number of sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Groups with meta positions in `[meta_start, meta_end]`.
    ///
    /// Each call opens fresh cursors on every source.
    pub fn align_window(&self, meta_start: u64, meta_end: u64) -> Result<AlignedWindow<'_, S, C>> {
        if meta_start > meta_end {
            return Err(GenotrackError::InvalidRange(format!(
                "meta window start ({}) > end ({})",
                meta_start, meta_end
            )));
        }

        let span = info_span!("align_window", meta_start, meta_end, sources = self.sources.len());
        let cursors = self
            .sources
            .iter()
            .map(|source| Cursor {
                iter: source.variants_from(meta_start),
                last: None,
                seq: 0,
            })
            .collect();

        Ok(AlignedWindow {
            cursors,
            heap: BinaryHeap::new(),
            primed: false,
            done: false,
            meta_start,
            meta_end,
            emitted: 0,
            check: &self.check,
            span,
        })
    }
}

struct Cursor<I> {
    iter: I,
    /// Meta position of the last variant taken
    last: Option<u64>,
    /// Variants taken so far
    seq: u64,
}

/// Heap entry; ordered by the group ordering rule
struct Pending {
    variant: Variant,
    stream: usize,
    seq: u64,
}

impl Pending {
    fn key(&self) -> (u64, u64, Reverse<u64>, usize, u64) {
        (
            self.variant.meta_genome_position(),
            self.variant.start_reference_position(),
            Reverse(self.variant.length()),
            self.stream,
            self.seq,
        )
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Lazy sequence of [`VariantGroup`]s for one window.
///
/// Ends after the first error. Dropping it releases every cursor.
pub struct AlignedWindow<'a, S: VariantSource + 'a, C> {
    cursors: Vec<Cursor<S::Iter<'a>>>,
    heap: BinaryHeap<Reverse<Pending>>,
    primed: bool,
    done: bool,
    meta_start: u64,
    meta_end: u64,
    emitted: u64,
    check: &'a C,
    span: Span,
}

impl<'a, S: VariantSource + 'a, C: ContinueCheck> AlignedWindow<'a, S, C> {
    /// Pull the next in-window variant of `stream` into the heap
    fn advance(&mut self, stream: usize) -> Result<()> {
        let cursor = &mut self.cursors[stream];
        loop {
            let variant = match cursor.iter.next() {
                None => return Ok(()),
                Some(variant) => variant?,
            };

            let meta = variant.meta_genome_position();
            if let Some(previous) = cursor.last {
                if meta < previous {
                    return Err(GenotrackError::StreamOrderViolation {
                        genome: variant.genome(),
                        previous,
                        found: meta,
                    });
                }
            }
            cursor.last = Some(meta);
            if meta < self.meta_start {
                continue;
            }

            let seq = cursor.seq;
            cursor.seq += 1;
            self.heap.push(Reverse(Pending {
                variant,
                stream,
                seq,
            }));
            return Ok(());
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.heap.clear();
        self.cursors.clear();
    }

    fn next_group(&mut self) -> Result<Option<VariantGroup>> {
        if !self.primed {
            self.primed = true;
            for stream in 0..self.cursors.len() {
                self.advance(stream)?;
            }
        }

        let meta = match self.heap.peek() {
            Some(Reverse(first)) => first.variant.meta_genome_position(),
            None => return Ok(None),
        };
        if meta > self.meta_end {
            return Ok(None);
        }

        let mut variants = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.variant.meta_genome_position() != meta {
                break;
            }
            if let Some(Reverse(pending)) = self.heap.pop() {
                variants.push(pending.variant);
                self.advance(pending.stream)?;
            }
        }

        Ok(Some(VariantGroup {
            meta_genome_position: meta,
            variants,
        }))
    }
}

impl<'a, S: VariantSource + 'a, C: ContinueCheck> Iterator for AlignedWindow<'a, S, C> {
    type Item = Result<VariantGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let span = self.span.clone();
        let _enter = span.enter();

        if !self.check.should_continue() {
            debug!(emitted = self.emitted, "window cancelled");
            self.finish();
            return Some(Err(GenotrackError::Cancelled));
        }

        match self.next_group() {
            Ok(Some(group)) => {
                self.emitted += 1;
                trace!(meta = group.meta_genome_position, size = group.len(), "group");
                Some(Ok(group))
            }
            Ok(None) => {
                debug!(emitted = self.emitted, "window complete");
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProjectContext;
    use crate::coords::GenomeRegistry;
    use crate::variants::record::VariantRecord;
    use std::cell::Cell;

    fn variants(genome: u32, specs: &[(u64, u64)]) -> Vec<Variant> {
        let ctx = ProjectContext::from_pairs([("chr1", 10_000)]).unwrap();
        let t = GenomeRegistry::new(&ctx).transformer();
        specs
            .iter()
            .map(|&(pos, len)| {
                let record = VariantRecord::new(pos, len, 1, format!("g{}:{}", genome, pos));
                Variant::positioned(record, genome, 0, "chr1", &t).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_groups_and_order() {
        let aligner = VariantAligner::new(vec![
            variants(1, &[(100, 1), (500, 1)]),
            variants(2, &[(500, 4), (700, 1)]),
        ]);
        let groups: Vec<VariantGroup> = aligner
            .align_window(0, 9_999)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let positions: Vec<u64> = groups.iter().map(|g| g.meta_genome_position()).collect();
        assert_eq!(positions, vec![100, 500, 700]);
        let at_500: Vec<u64> = groups[1].variants().iter().map(|v| v.length()).collect();
        assert_eq!(at_500, vec![4, 1]);
    }

    #[test]
    fn test_equal_variants_keep_source_order() {
        let aligner = VariantAligner::new(vec![
            variants(9, &[(50, 2)]),
            variants(3, &[(50, 2)]),
            variants(5, &[(50, 2), (50, 2)]),
        ]);
        let group = aligner.align_window(0, 100).unwrap().next().unwrap().unwrap();
        let genomes: Vec<u32> = group.variants().iter().map(|v| v.genome()).collect();
        assert_eq!(genomes, vec![9, 3, 5, 5]);
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let aligner = VariantAligner::new(vec![variants(1, &[(10, 1), (20, 1), (30, 1), (40, 1)])]);
        let positions: Vec<u64> = aligner
            .align_window(20, 30)
            .unwrap()
            .map(|g| g.unwrap().meta_genome_position())
            .collect();
        assert_eq!(positions, vec![20, 30]);
        assert!(aligner.align_window(30, 20).is_err());
    }

    #[test]
    fn test_restartable() {
        let aligner = VariantAligner::new(vec![variants(1, &[(10, 1), (20, 1)])]);
        assert_eq!(aligner.align_window(0, 100).unwrap().count(), 2);
        assert_eq!(aligner.align_window(0, 100).unwrap().count(), 2);
    }

    #[test]
    fn test_order_violation_ends_window() {
        let aligner = VariantAligner::new(vec![variants(4, &[(50, 1), (30, 1)])]);
        let mut window = aligner.align_window(0, 100).unwrap();
        match window.next() {
            Some(Err(GenotrackError::StreamOrderViolation {
                genome,
                previous,
                found,
            })) => assert_eq!((genome, previous, found), (4, 50, 30)),
            other => panic!("expected order violation, got {:?}", other),
        }
        assert!(window.next().is_none());
    }

    #[test]
    fn test_cancel_between_groups() {
        let polls = Cell::new(0);
        let check = || {
            polls.set(polls.get() + 1);
            polls.get() <= 1
        };
        let aligner = VariantAligner::new(vec![variants(1, &[(10, 1), (20, 1), (30, 1)])])
            .with_continue_check(check);
        let mut window = aligner.align_window(0, 100).unwrap();

        assert!(window.next().unwrap().is_ok());
        assert!(matches!(window.next(), Some(Err(GenotrackError::Cancelled))));
        assert!(window.next().is_none());
    }
}
