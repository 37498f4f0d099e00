//! BGZF virtual file offsets and offset ranges.
//!
//! A virtual offset addresses one byte inside a block-compressed file:
//! - Bits 63-16: compressed offset of the block start
//! - Bits 15-0: byte offset within the decompressed block
//!
//! Ordering of the packed value is the lexicographic ordering of
//! `(block_address, within_block_offset)`, so offsets can be compared directly.
//!
//! # Signed words
//!
//! Index files store offsets as 64-bit words. Consumers that only have
//! signed 64-bit integers must compare them with [`unsigned_lt`], which
//! recovers unsigned ordering with a sign-flip:
//!
//! ```
//! use genotrack::io::virtual_offset::unsigned_lt;
//!
//! // 0x8000_0000_0000_0000 is larger than 1 when read as unsigned
//! assert!(unsigned_lt(1, i64::MIN));
//! assert!(!unsigned_lt(i64::MIN, 1));
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Largest compressed address representable in a virtual offset (48 bits).
pub const MAX_BLOCK_ADDRESS: u64 = (1 << 48) - 1;

/// Virtual file offset in BGZF format.
///
/// # Example
///
/// ```
/// # use genotrack::io::VirtualOffset;
/// let offset = VirtualOffset::new(1024, 512);
/// assert_eq!(offset.block_address(), 1024);
/// assert_eq!(offset.within_block_offset(), 512);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Create a virtual offset from a block address and an in-block offset.
    ///
    /// Addresses above 48 bits are truncated; BGZF files cannot reach them.
    pub fn new(block_address: u64, within_block_offset: u16) -> Self {
        VirtualOffset(((block_address & MAX_BLOCK_ADDRESS) << 16) | within_block_offset as u64)
    }

    /// Create from raw 64-bit value.
    pub fn from_raw(value: u64) -> Self {
        VirtualOffset(value)
    }

    /// Get raw 64-bit value.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Create from a signed 64-bit word holding the same bits.
    pub fn from_signed(word: i64) -> Self {
        VirtualOffset(word as u64)
    }

    /// The same bits as a signed 64-bit word.
    pub fn as_signed(self) -> i64 {
        self.0 as i64
    }

    /// Compressed file offset of the block (high 48 bits).
    pub fn block_address(self) -> u64 {
        self.0 >> 16
    }

    /// Offset within the decompressed block (low 16 bits).
    pub fn within_block_offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_address(), self.within_block_offset())
    }
}

/// Unsigned `a < b` for two 64-bit words stored as signed integers.
///
/// Flipping the result once for each negative operand turns signed order
/// into unsigned order: `(a < b) ^ (a < 0) ^ (b < 0)`.
pub fn unsigned_lt(a: i64, b: i64) -> bool {
    (a < b) ^ (a < 0) ^ (b < 0)
}

/// Unsigned three-way comparison of two signed words.
pub fn unsigned_cmp(a: i64, b: i64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if unsigned_lt(a, b) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// A half-open range `[begin, end)` of virtual offsets covering a run of records.
///
/// Pairs are ordered by `begin` (then `end`), using unsigned comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalPair {
    /// Virtual offset of the first byte of the run
    pub begin: VirtualOffset,
    /// Virtual offset just past the last byte of the run
    pub end: VirtualOffset,
}

impl IntervalPair {
    /// Create a new interval pair.
    pub fn new(begin: VirtualOffset, end: VirtualOffset) -> Self {
        IntervalPair { begin, end }
    }

    /// Whether `offset` lies inside `[begin, end)`.
    pub fn contains(&self, offset: VirtualOffset) -> bool {
        self.begin <= offset && offset < self.end
    }
}

impl Ord for IntervalPair {
    fn cmp(&self, other: &Self) -> Ordering {
        unsigned_cmp(self.begin.as_signed(), other.begin.as_signed())
            .then_with(|| unsigned_cmp(self.end.as_signed(), other.end.as_signed()))
    }
}

impl PartialOrd for IntervalPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
