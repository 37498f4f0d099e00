//! Indel shift tables.
//!
//! A [`CoordinateShift`] lists where one genome/allele's indels make its
//! coordinates diverge from the reference. Lookups go through precomputed
//! tables holding running totals, so each conversion is one binary search.

use crate::error::{GenotrackError, Result};
use crate::variants::VariantRecord;
use std::collections::BTreeMap;

/// One indel: `delta > 0` inserts bases before `reference_position`,
/// `delta < 0` deletes `-delta` bases starting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftEntry {
    /// 0-based reference position
    pub reference_position: u64,
    /// Inserted (positive) or deleted (negative) base count
    pub delta: i64,
}

impl ShiftEntry {
    fn deleted(&self) -> u64 {
        if self.delta < 0 {
            self.delta.unsigned_abs()
        } else {
            0
        }
    }
}

/// Sorted indel entries of one genome/allele on one chromosome.
///
/// Reference positions are strictly increasing and no entry starts inside
/// the span of a preceding deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateShift {
    entries: Vec<ShiftEntry>,
}

impl CoordinateShift {
    /// Build from `(reference_position, delta)` pairs in ascending order.
    ///
    /// Zero deltas are dropped.
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, i64)>,
    {
        let mut shift = CoordinateShift::default();
        for (reference_position, delta) in entries {
            shift.push(ShiftEntry {
                reference_position,
                delta,
            })?;
        }
        Ok(shift)
    }

    /// Derive the shift of a genome from its variant records.
    ///
    /// The first `min(length, allele_length)` bases of a record are a
    /// substitution; the rest is an insertion after the replaced bases or a
    /// deletion following the kept ones.
    pub fn from_records(records: &[VariantRecord]) -> Result<Self> {
        let mut entries: Vec<ShiftEntry> = records
            .iter()
            .filter_map(|record| {
                let delta = record.shift_delta();
                let reference_position = if delta > 0 {
                    record.reference_position + record.length
                } else {
                    record.reference_position + record.allele_length
                };
                (delta != 0).then_some(ShiftEntry {
                    reference_position,
                    delta,
                })
            })
            .collect();
        entries.sort_by_key(|e| e.reference_position);

        let mut shift = CoordinateShift::default();
        for entry in entries {
            shift.push(entry)?;
        }
        Ok(shift)
    }

    fn push(&mut self, entry: ShiftEntry) -> Result<()> {
        if entry.delta == 0 {
            return Ok(());
        }
        if let Some(last) = self.entries.last() {
            if entry.reference_position <= last.reference_position {
                return Err(GenotrackError::invalid_input(format!(
                    "shift entries not strictly increasing: {} after {}",
                    entry.reference_position, last.reference_position
                )));
            }
            let deletion_end = last.reference_position + last.deleted();
            if entry.reference_position < deletion_end {
                return Err(GenotrackError::invalid_input(format!(
                    "indel at {} inside deletion [{}, {})",
                    entry.reference_position, last.reference_position, deletion_end
                )));
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    /// The entries in reference order
    pub fn entries(&self) -> &[ShiftEntry] {
        &self.entries
    }

    /// Whether the genome has no indels here
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reference position just past the last affected base
    pub(crate) fn reference_extent(&self) -> u64 {
        self.entries
            .last()
            .map(|e| e.reference_position + e.deleted())
            .unwrap_or(0)
    }
}

/// Where a position of a widened axis lands on the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Located {
    /// A reference base
    Base(u64),
    /// Base `offset` of the sequence inserted before reference base `before`
    Inserted { before: u64, offset: u64 },
}

#[derive(Debug, Clone, Copy)]
struct TableEntry {
    reference: u64,
    delta: i64,
    /// Sum of the deltas of all earlier entries
    cum_before: i64,
    /// First allele position at or after this entry's effect
    allele_start: u64,
}

impl TableEntry {
    fn cum_through(&self) -> i64 {
        self.cum_before + self.delta
    }
}

/// Lookup table for one genome/allele.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShiftTable {
    entries: Vec<TableEntry>,
}

impl ShiftTable {
    pub(crate) fn new(shift: &CoordinateShift) -> Self {
        let mut cum = 0i64;
        let entries = shift
            .entries
            .iter()
            .map(|e| {
                let entry = TableEntry {
                    reference: e.reference_position,
                    delta: e.delta,
                    cum_before: cum,
                    allele_start: e.reference_position.saturating_add_signed(cum),
                };
                cum += e.delta;
                entry
            })
            .collect();
        ShiftTable { entries }
    }

    /// Insertions of this allele as `(reference_position, length)`
    pub(crate) fn insertions(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries
            .iter()
            .filter(|e| e.delta > 0)
            .map(|e| (e.reference, e.delta.unsigned_abs()))
    }

    /// Allele position of a reference base.
    ///
    /// A base inside a deletion resolves to the deletion start in allele
    /// coordinates.
    pub(crate) fn to_allele(&self, reference: u64) -> u64 {
        let idx = self.entries.partition_point(|e| e.reference <= reference);
        if idx == 0 {
            return reference;
        }
        let e = &self.entries[idx - 1];
        if e.delta < 0 && reference < e.reference + e.delta.unsigned_abs() {
            return e.allele_start;
        }
        reference.saturating_add_signed(e.cum_through())
    }

    /// Reference location of an allele position
    pub(crate) fn locate(&self, allele: u64) -> Located {
        // After a deletion directly followed by an insertion both entries
        // share an allele start; the later one is the right match.
        let idx = self.entries.partition_point(|e| e.allele_start <= allele);
        if idx == 0 {
            return Located::Base(allele);
        }
        let e = &self.entries[idx - 1];
        if e.delta > 0 && allele < e.allele_start + e.delta.unsigned_abs() {
            return Located::Inserted {
                before: e.reference,
                offset: allele - e.allele_start,
            };
        }
        Located::Base(allele.saturating_add_signed(-e.cum_through()))
    }

    /// Allele start and length of this allele's insertion before `reference`
    pub(crate) fn insertion_at(&self, reference: u64) -> Option<(u64, u64)> {
        let idx = self.entries.partition_point(|e| e.reference < reference);
        self.entries
            .get(idx)
            .filter(|e| e.reference == reference && e.delta > 0)
            .map(|e| (e.allele_start, e.delta.unsigned_abs()))
    }
}

#[derive(Debug, Clone, Copy)]
struct UnionEntry {
    reference: u64,
    length: u64,
    cum_before: u64,
    meta_start: u64,
}

/// Union of all insertions on a chromosome, longest per position.
#[derive(Debug, Clone, Default)]
pub(crate) struct UnionTable {
    entries: Vec<UnionEntry>,
}

impl UnionTable {
    pub(crate) fn new<'t, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'t ShiftTable>,
    {
        let mut longest: BTreeMap<u64, u64> = BTreeMap::new();
        for table in tables {
            for (reference, length) in table.insertions() {
                let slot = longest.entry(reference).or_insert(0);
                *slot = (*slot).max(length);
            }
        }

        let mut cum = 0u64;
        let entries = longest
            .into_iter()
            .map(|(reference, length)| {
                let entry = UnionEntry {
                    reference,
                    length,
                    cum_before: cum,
                    meta_start: reference + cum,
                };
                cum += length;
                entry
            })
            .collect();
        UnionTable { entries }
    }

    /// Total inserted length
    pub(crate) fn total(&self) -> u64 {
        self.entries
            .last()
            .map(|e| e.cum_before + e.length)
            .unwrap_or(0)
    }

    /// Meta position of a reference base
    pub(crate) fn to_meta(&self, reference: u64) -> u64 {
        let idx = self.entries.partition_point(|e| e.reference <= reference);
        match idx.checked_sub(1).map(|i| &self.entries[i]) {
            Some(e) => reference + e.cum_before + e.length,
            None => reference,
        }
    }

    /// Meta position of the first base inserted before `reference`
    pub(crate) fn insertion_start(&self, reference: u64) -> Option<u64> {
        let idx = self.entries.partition_point(|e| e.reference < reference);
        self.entries
            .get(idx)
            .filter(|e| e.reference == reference)
            .map(|e| e.meta_start)
    }

    /// Reference location of a meta position
    pub(crate) fn locate(&self, meta: u64) -> Located {
        let idx = self.entries.partition_point(|e| e.meta_start <= meta);
        if idx == 0 {
            return Located::Base(meta);
        }
        let e = &self.entries[idx - 1];
        if meta < e.meta_start + e.length {
            return Located::Inserted {
                before: e.reference,
                offset: meta - e.meta_start,
            };
        }
        Located::Base(meta - e.cum_before - e.length)
    }
}
