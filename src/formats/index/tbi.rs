//! Tabix binning index: in-memory representation, queries and persistence.
//!
//! # Format
//!
//! The index is stored in the TBI layout, BGZF-compressed:
//!
//! ## Header
//! - Magic: "TBI\1" (4 bytes)
//! - n_ref: Number of reference sequences (int32)
//! - format: File format (int32: 0=generic, 1=SAM, 2=VCF; bit 16 = 0-based)
//! - col_seq, col_beg, col_end: 1-based columns (int32, col_end 0 if absent)
//! - meta: Comment character for header lines (int32)
//! - skip: Number of lines to skip (int32)
//! - l_nm + names: Concatenated null-terminated sequence names
//!
//! ## Index Data (per reference)
//! - n_bin, then per bin: bin id (uint32), n_chunk, chunk begin/end (uint64)
//! - n_intv, then the linear index (uint64 per 16 Kbp tile)
//!
//! Bins are written in ascending id order so the same input always
//! produces the same bytes.
//!
//! # Example
//!
//! ```no_run
//! use genotrack::formats::index::TabixIndex;
//!
//! # fn main() -> genotrack::Result<()> {
//! let index = TabixIndex::from_path("features.bed.gz.tbi")?;
//! for pair in index.query_interval("chr1", 1_000_000, 2_000_000)? {
//!     println!("scan {} .. {}", pair.begin, pair.end);
//! }
//! # Ok(())
//! # }
//! ```

use crate::context::{AlwaysContinue, ContinueCheck, ProjectContext};
use crate::error::{GenotrackError, Result};
use crate::formats::index::bins::{candidate_bins, tile_of, MAX_COORDINATE};
use crate::io::compression::{compress_bgzf, decompress_bgzf};
use crate::io::virtual_offset::{unsigned_lt, IntervalPair, VirtualOffset};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// TBI file format magic string
const TBI_MAGIC: &[u8; 4] = b"TBI\x01";

/// Format flag marking 0-based, half-open coordinates (BED)
const ZERO_BASED_FLAG: i32 = 0x10000;

/// File format types recognized by tabix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabixFormat {
    /// Generic tab-delimited file
    Generic = 0,
    /// SAM format
    Sam = 1,
    /// VCF format
    Vcf = 2,
}

impl TabixFormat {
    /// Parse format from integer
    fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(TabixFormat::Generic),
            1 => Ok(TabixFormat::Sam),
            2 => Ok(TabixFormat::Vcf),
            _ => Err(GenotrackError::invalid_input(format!(
                "Unknown TBI format code: {}",
                value
            ))),
        }
    }
}

/// Column layout and header conventions of the indexed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabixConfig {
    /// File format type
    pub format: TabixFormat,
    /// Coordinates are 0-based half-open (BED) rather than 1-based
    pub zero_based: bool,
    /// Column for sequence name (1-based)
    pub col_seq: usize,
    /// Column for start position (1-based)
    pub col_beg: usize,
    /// Column for end position (1-based, 0 if absent)
    pub col_end: usize,
    /// Comment character for header lines
    pub meta_char: char,
    /// Number of leading lines to skip
    pub skip_lines: u32,
}

impl TabixConfig {
    /// BED: 0-based, columns 1/2/3
    pub fn bed() -> Self {
        TabixConfig {
            format: TabixFormat::Generic,
            zero_based: true,
            col_seq: 1,
            col_beg: 2,
            col_end: 3,
            meta_char: '#',
            skip_lines: 0,
        }
    }

    /// VCF: 1-based, end derived from REF
    pub fn vcf() -> Self {
        TabixConfig {
            format: TabixFormat::Vcf,
            zero_based: false,
            col_seq: 1,
            col_beg: 2,
            col_end: 0,
            meta_char: '#',
            skip_lines: 0,
        }
    }

    /// GFF/GTF: 1-based inclusive, columns 1/4/5
    pub fn gff() -> Self {
        TabixConfig {
            format: TabixFormat::Generic,
            zero_based: false,
            col_seq: 1,
            col_beg: 4,
            col_end: 5,
            meta_char: '#',
            skip_lines: 0,
        }
    }

    fn format_word(&self) -> i32 {
        let flag = if self.zero_based { ZERO_BASED_FLAG } else { 0 };
        self.format as i32 | flag
    }
}

impl Default for TabixConfig {
    fn default() -> Self {
        Self::bed()
    }
}

/// Binning and linear index for one reference sequence.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    /// Reference sequence name
    pub name: String,
    /// Bin id to its offset ranges
    bins: HashMap<u32, Vec<IntervalPair>>,
    /// Minimum record offset per 16 Kbp tile
    linear: Vec<VirtualOffset>,
}

impl ReferenceIndex {
    pub(crate) fn new(
        name: String,
        bins: HashMap<u32, Vec<IntervalPair>>,
        linear: Vec<VirtualOffset>,
    ) -> Self {
        ReferenceIndex { name, bins, linear }
    }

    /// Offset ranges stored under a bin
    pub fn bin(&self, bin_id: u32) -> Option<&[IntervalPair]> {
        self.bins.get(&bin_id).map(Vec::as_slice)
    }

    /// Number of non-empty bins
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Bin ids in ascending order
    pub fn bin_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.bins.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The linear index
    pub fn linear_index(&self) -> &[VirtualOffset] {
        &self.linear
    }

    /// Lower bound on the offset of any record overlapping `start` or later.
    ///
    /// Positions past the indexed tiles get no bound.
    pub fn min_offset(&self, start: u64) -> VirtualOffset {
        self.linear
            .get(tile_of(start))
            .copied()
            .unwrap_or_default()
    }
}

/// Tabix index over a block-compressed, coordinate-sorted file.
#[derive(Debug, Clone)]
pub struct TabixIndex {
    config: TabixConfig,
    references: Vec<ReferenceIndex>,
    ref_map: HashMap<String, usize>,
}

impl TabixIndex {
    pub(crate) fn from_parts(config: TabixConfig, references: Vec<ReferenceIndex>) -> Self {
        let ref_map = references
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.name.clone(), idx))
            .collect();
        TabixIndex {
            config,
            references,
            ref_map,
        }
    }

    /// Load an index file, BGZF-compressed or raw.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Parse an index from BGZF-compressed or raw TBI bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            let raw = decompress_bgzf(bytes)?;
            Self::parse(&mut raw.as_slice())
        } else {
            Self::parse(&mut &bytes[..])
        }
    }

    /// Parse raw TBI data from a reader
    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != TBI_MAGIC {
            return Err(GenotrackError::invalid_input(format!(
                "Invalid TBI magic: expected {:?}, got {:?}",
                TBI_MAGIC, magic
            )));
        }

        let n_ref = read_count(reader, "reference")?;
        let format_word = read_i32(reader)?;
        let format = TabixFormat::from_i32(format_word & 0xFFFF)?;
        let col_seq = read_count(reader, "col_seq")?;
        let col_beg = read_count(reader, "col_beg")?;
        let col_end = read_count(reader, "col_end")?;
        let meta = read_i32(reader)?;
        let skip = read_count(reader, "skip")?;
        let l_nm = read_count(reader, "name length")?;

        let mut names_buf = vec![0u8; l_nm];
        reader.read_exact(&mut names_buf)?;
        let names = parse_sequence_names(&names_buf)?;

        if names.len() != n_ref {
            return Err(GenotrackError::invalid_input(format!(
                "TBI header claims {} references but got {} names",
                n_ref,
                names.len()
            )));
        }

        let config = TabixConfig {
            format,
            zero_based: format_word & ZERO_BASED_FLAG != 0,
            col_seq,
            col_beg,
            col_end,
            meta_char: (meta as u8) as char,
            skip_lines: skip as u32,
        };

        let mut references = Vec::with_capacity(n_ref);
        for name in names {
            references.push(read_reference(reader, name)?);
        }

        Ok(Self::from_parts(config, references))
    }

    /// Serialize to raw (uncompressed) TBI bytes
    pub fn write_raw<W: Write>(&self, writer: &mut W) -> Result<()> {
        let cfg = &self.config;

        let mut names = Vec::new();
        for reference in &self.references {
            names.extend_from_slice(reference.name.as_bytes());
            names.push(0);
        }

        writer.write_all(TBI_MAGIC)?;
        write_i32(writer, self.references.len())?;
        writer.write_all(&cfg.format_word().to_le_bytes())?;
        write_i32(writer, cfg.col_seq)?;
        write_i32(writer, cfg.col_beg)?;
        write_i32(writer, cfg.col_end)?;
        writer.write_all(&(cfg.meta_char as u32 as i32).to_le_bytes())?;
        write_i32(writer, cfg.skip_lines as usize)?;
        write_i32(writer, names.len())?;
        writer.write_all(&names)?;

        for reference in &self.references {
            write_i32(writer, reference.bins.len())?;
            for bin_id in reference.bin_ids() {
                let pairs = &reference.bins[&bin_id];
                writer.write_all(&bin_id.to_le_bytes())?;
                write_i32(writer, pairs.len())?;
                for pair in pairs {
                    writer.write_all(&pair.begin.as_raw().to_le_bytes())?;
                    writer.write_all(&pair.end.as_raw().to_le_bytes())?;
                }
            }

            write_i32(writer, reference.linear.len())?;
            for offset in &reference.linear {
                writer.write_all(&offset.as_raw().to_le_bytes())?;
            }
        }

        Ok(())
    }

    /// Serialize to BGZF-compressed TBI bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        self.write_raw(&mut raw)?;
        Ok(compress_bgzf(&raw)?)
    }

    /// Publish the index at `path` atomically.
    ///
    /// Data goes to a temporary file in the destination directory which is
    /// then renamed over `path`; readers never see a partial index.
    pub fn write_atomic<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| GenotrackError::Io(e.error))?;

        info!(
            path = %path.display(),
            references = self.references.len(),
            bytes = bytes.len(),
            "published index"
        );
        Ok(())
    }

    /// Column layout of the indexed file
    pub fn config(&self) -> &TabixConfig {
        &self.config
    }

    /// Get all references
    pub fn references(&self) -> &[ReferenceIndex] {
        &self.references
    }

    /// Get reference by name
    pub fn get_reference(&self, name: &str) -> Option<&ReferenceIndex> {
        self.ref_map.get(name).map(|&idx| &self.references[idx])
    }

    /// Candidate offset ranges for records overlapping `[start, end]`.
    ///
    /// Both ends are inclusive and 0-based. Ranges may contain records
    /// outside the query but never miss one inside it. A chromosome absent
    /// from the index yields no ranges.
    pub fn query_interval(&self, chrom: &str, start: u64, end: u64) -> Result<Vec<IntervalPair>> {
        self.query_with(chrom, start, end, &AlwaysContinue)
    }

    /// [`query_interval`](Self::query_interval) after validating the range
    /// against the project's chromosome lengths.
    pub fn query_in(
        &self,
        context: &ProjectContext,
        chrom: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<IntervalPair>> {
        context.validate_range(chrom, start, end)?;
        self.query_interval(chrom, start, end)
    }

    /// Query with a continue check polled between bin scans.
    pub fn query_with<C: ContinueCheck + ?Sized>(
        &self,
        chrom: &str,
        start: u64,
        end: u64,
        check: &C,
    ) -> Result<Vec<IntervalPair>> {
        if start > end {
            return Err(GenotrackError::InvalidRange(format!(
                "start ({}) > end ({})",
                start, end
            )));
        }
        if end >= MAX_COORDINATE {
            return Err(GenotrackError::InvalidRange(format!(
                "end ({}) beyond binning limit {}",
                end, MAX_COORDINATE
            )));
        }

        let reference = match self.get_reference(chrom) {
            Some(reference) => reference,
            None => {
                debug!(chrom, "chromosome not in index");
                return Ok(Vec::new());
            }
        };

        let mut pairs = Vec::new();
        for bin_id in candidate_bins(start, end) {
            if !check.should_continue() {
                return Err(GenotrackError::Cancelled);
            }
            if let Some(bin) = reference.bins.get(&bin_id) {
                pairs.extend_from_slice(bin);
            }
        }

        pairs.sort();
        let mut merged = merge_pairs(&pairs);

        let min_offset = reference.min_offset(start);
        merged.retain(|pair| pair.end >= min_offset);

        debug!(
            chrom,
            start,
            end,
            collected = pairs.len(),
            ranges = merged.len(),
            "index query"
        );
        Ok(merged)
    }
}

/// Coalesce sorted ranges reachable in one forward scan.
///
/// A range is merged into the previous one when it begins in the block
/// where the previous one ends, or earlier.
pub(crate) fn merge_pairs(sorted: &[IntervalPair]) -> Vec<IntervalPair> {
    let mut merged: Vec<IntervalPair> = Vec::new();

    for pair in sorted {
        match merged.last_mut() {
            Some(current) if pair.begin.block_address() <= current.end.block_address() => {
                if pair.end > current.end {
                    current.end = pair.end;
                }
            }
            _ => merged.push(*pair),
        }
    }

    merged
}

/// Parse null-terminated sequence names from buffer
fn parse_sequence_names(buf: &[u8]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut start = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if byte == 0 {
            if i > start {
                let name = std::str::from_utf8(&buf[start..i])
                    .map_err(|e| {
                        GenotrackError::invalid_input(format!(
                            "Invalid UTF-8 in sequence name: {}",
                            e
                        ))
                    })?
                    .to_string();
                names.push(name);
            }
            start = i + 1;
        }
    }

    Ok(names)
}

fn read_reference<R: Read>(reader: &mut R, name: String) -> Result<ReferenceIndex> {
    let n_bin = read_count(reader, "bin")?;
    let mut bins = HashMap::with_capacity(n_bin);

    for _ in 0..n_bin {
        let bin_id = read_u32(reader)?;
        let n_chunk = read_count(reader, "chunk")?;

        let mut pairs = Vec::with_capacity(n_chunk);
        for _ in 0..n_chunk {
            let begin = VirtualOffset::from_raw(read_u64(reader)?);
            let end = VirtualOffset::from_raw(read_u64(reader)?);
            pairs.push(IntervalPair::new(begin, end));
        }
        bins.insert(bin_id, pairs);
    }

    let n_intv = read_count(reader, "interval")?;
    let mut linear = Vec::with_capacity(n_intv);
    let mut previous: i64 = 0;

    for tile in 0..n_intv {
        // Words are checked as signed values with unsigned ordering
        let word = read_u64(reader)? as i64;
        if word != 0 && unsigned_lt(word, previous) {
            return Err(GenotrackError::invalid_input(format!(
                "linear index of '{}' decreases at tile {}",
                name, tile
            )));
        }
        if word != 0 {
            previous = word;
        }
        linear.push(VirtualOffset::from_signed(word));
    }

    Ok(ReferenceIndex::new(name, bins, linear))
}

// Helper functions for binary data (little-endian)

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = read_i32(reader)?;
    usize::try_from(value)
        .map_err(|_| GenotrackError::invalid_input(format!("Invalid {} count: {}", what, value)))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn write_i32<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    let value = i32::try_from(value)
        .map_err(|_| GenotrackError::invalid_input(format!("{} does not fit in int32", value)))?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}
