//! UCSC/tabix hierarchical binning scheme.
//!
//! 37,449 bins over 512 Mbp in six levels, each 8× finer than the last:
//! - Level 0: 1 bin (512 Mbp)
//! - Level 1: 8 bins (64 Mbp each)
//! - Level 2: 64 bins (8 Mbp each)
//! - Level 3: 512 bins (1 Mbp each)
//! - Level 4: 4096 bins (128 Kbp each)
//! - Level 5: 32768 bins (16 Kbp each)
//!
//! A record is filed under the smallest bin that fully contains it.

/// log2 of the finest bin size (16 Kbp), also the linear index tile size
pub const MIN_SHIFT: u32 = 14;

/// Number of levels below the root bin
pub const DEPTH: u32 = 5;

/// First coordinate the scheme cannot address (2^29)
pub const MAX_COORDINATE: u64 = 1 << (MIN_SHIFT + 3 * DEPTH);

/// Linear index tile size in bases
pub const TILE_SIZE: u64 = 1 << MIN_SHIFT;

/// Total number of bins (ids `0..BIN_COUNT`)
pub const BIN_COUNT: u32 = ((1 << (3 * (DEPTH + 1))) - 1) / 7;

/// Id of the first bin at `level`
fn level_offset(level: u32) -> u32 {
    ((1 << (3 * level)) - 1) / 7
}

/// Bit shift of bin size at `level`
fn level_shift(level: u32) -> u32 {
    MIN_SHIFT + 3 * (DEPTH - level)
}

/// Smallest bin fully containing the half-open interval `[start, end)`.
///
/// Empty intervals are treated as covering one base.
pub fn bin_for_interval(start: u64, end: u64) -> u32 {
    let last = end.max(start + 1) - 1;

    for level in (1..=DEPTH).rev() {
        let shift = level_shift(level);
        if start >> shift == last >> shift {
            return level_offset(level) + (start >> shift) as u32;
        }
    }
    0
}

/// All bins that may hold records overlapping the inclusive range
/// `[start, end]`, coarsest level first.
pub fn candidate_bins(start: u64, end: u64) -> Vec<u32> {
    let mut bins = Vec::new();

    for level in 0..=DEPTH {
        let offset = level_offset(level);
        let shift = level_shift(level);
        let first = offset + (start >> shift) as u32;
        let last = offset + (end >> shift) as u32;
        bins.extend(first..=last);
    }

    bins
}

/// Level of a bin id
pub fn bin_level(bin: u32) -> u32 {
    (0..=DEPTH)
        .rev()
        .find(|&level| bin >= level_offset(level))
        .unwrap_or(0)
}

/// Half-open coordinate range covered by a bin
pub fn bin_range(bin: u32) -> (u64, u64) {
    let level = bin_level(bin);
    let shift = level_shift(level);
    let start = ((bin - level_offset(level)) as u64) << shift;
    (start, start + (1u64 << shift))
}

/// Linear index tile containing a coordinate
pub fn tile_of(position: u64) -> usize {
    (position >> MIN_SHIFT) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bin_count() {
        assert_eq!(BIN_COUNT, 37449);
        assert_eq!(MAX_COORDINATE, 512 * 1024 * 1024);
    }

    #[test]
    fn test_bin_for_interval_levels() {
        // Fits in one 16 Kbp bin
        assert_eq!(bin_for_interval(0, 100), 4681);
        assert_eq!(bin_for_interval(16384, 16385), 4682);
        // Crosses a 16 Kbp boundary, fits in 128 Kbp bin
        assert_eq!(bin_for_interval(16000, 17000), 585);
        // Spans everything
        assert_eq!(bin_for_interval(0, MAX_COORDINATE), 0);
    }

    #[test]
    fn test_empty_interval_gets_finest_bin() {
        assert_eq!(bin_for_interval(500, 500), bin_for_interval(500, 501));
    }

    #[test]
    fn test_candidate_bins_single_point() {
        let bins = candidate_bins(1000, 1000);
        assert_eq!(bins, vec![0, 1, 9, 73, 585, 4681]);
    }

    #[test]
    fn test_candidate_bins_sorted() {
        let bins = candidate_bins(1000, 100_000);
        assert!(bins.contains(&0));
        assert!(bins.len() > 6);
        for pair in bins.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_bin_range() {
        assert_eq!(bin_range(0), (0, MAX_COORDINATE));
        assert_eq!(bin_range(4681), (0, TILE_SIZE));
        assert_eq!(bin_range(586), (1 << 17, 2 << 17));
    }

    proptest! {
        #[test]
        fn prop_record_bin_is_a_candidate(
            start in 0u64..MAX_COORDINATE - 100_000,
            len in 0u64..100_000,
            q_start in 0u64..MAX_COORDINATE - 1,
        ) {
            let end = start + len;
            let bin = bin_for_interval(start, end);
            let (lo, hi) = bin_range(bin);
            prop_assert!(lo <= start && end.max(start + 1) <= hi);

            // Any query touching the record must visit its bin
            let q_end = q_start.max(start);
            if q_start <= end.max(start + 1) - 1 {
                prop_assert!(candidate_bins(q_start, q_end).contains(&bin));
            }
        }
    }
}
