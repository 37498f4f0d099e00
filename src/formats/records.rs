//! Interval records read from block-compressed tab-delimited files.
//!
//! A [`RecordFormat`] knows how to pull the chromosome and interval out of a
//! line (BED, VCF, GFF or a generic column layout). [`TabularRecordReader`]
//! pairs a format with a [`BgzfReader`] and reports each record together with
//! the virtual offsets it spans, which is what index construction needs.
//!
//! Formats are chosen statically through the type parameter; there is no
//! runtime format detection.
//!
//! # Coordinates
//!
//! Every record is reported as a **0-based, half-open** interval regardless
//! of the file convention:
//! - BED is already 0-based half-open
//! - GFF and generic 1-based files have their start shifted down by one
//! - VCF records end at `POS + len(REF) - 1` (or `INFO/END` when larger)
//!
//! # Example
//!
//! ```no_run
//! use genotrack::formats::records::{Bed, RecordReader, TabularRecordReader};
//! use genotrack::io::BgzfReader;
//!
//! # fn main() -> genotrack::Result<()> {
//! let mut records = TabularRecordReader::new(BgzfReader::from_path("peaks.bed.gz")?, Bed);
//! while let Some(record) = records.read_record()? {
//!     println!("{}:{}-{} at {}", record.chrom, record.start, record.end, record.begin_offset);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{GenotrackError, Result};
use crate::formats::index::tbi::{TabixConfig, TabixFormat};
use crate::io::bgzf::BgzfReader;
use crate::io::virtual_offset::VirtualOffset;
use std::io::{Read, Seek};

/// One record and where it lives in the compressed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    /// Chromosome or contig name
    pub chrom: String,
    /// Start position (0-based, inclusive)
    pub start: u64,
    /// End position (0-based, exclusive)
    pub end: u64,
    /// Virtual offset of the first byte of the line
    pub begin_offset: VirtualOffset,
    /// Virtual offset just past the line terminator
    pub end_offset: VirtualOffset,
    /// The raw line without its terminator
    pub line: String,
}

impl IndexedRecord {
    /// Whether the record touches the inclusive range `[start, end]`.
    ///
    /// Empty records (insertion points) count as covering one base.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        interval_overlaps(self.start, self.end, start, end)
    }
}

pub(crate) fn interval_overlaps(rec_start: u64, rec_end: u64, start: u64, end: u64) -> bool {
    rec_start <= end && rec_end.max(rec_start + 1) > start
}

/// Chromosome and interval extracted from one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInterval<'l> {
    /// Chromosome name, borrowed from the line
    pub chrom: &'l str,
    /// Start position (0-based, inclusive)
    pub start: u64,
    /// End position (0-based, exclusive)
    pub end: u64,
}

/// Per-format interval extraction.
pub trait RecordFormat {
    /// Column layout written to the index header
    fn config(&self) -> TabixConfig;

    /// Extract the interval of a data line.
    ///
    /// Header and comment lines are filtered by the caller. The error is a
    /// message; callers attach the line number.
    fn parse_interval<'l>(&self, line: &'l str) -> std::result::Result<LineInterval<'l>, String> {
        parse_columns(&self.config(), line)
    }
}

/// BED: `chrom start end ...`, 0-based half-open
#[derive(Debug, Clone, Copy, Default)]
pub struct Bed;

/// VCF: `CHROM POS ID REF ...`, 1-based
#[derive(Debug, Clone, Copy, Default)]
pub struct Vcf;

/// GFF3/GTF: columns 1, 4 and 5, 1-based inclusive
#[derive(Debug, Clone, Copy, Default)]
pub struct Gff;

/// Any tab-delimited layout described by a [`TabixConfig`]
#[derive(Debug, Clone)]
pub struct Generic(pub TabixConfig);

impl RecordFormat for Bed {
    fn config(&self) -> TabixConfig {
        TabixConfig::bed()
    }
}

impl RecordFormat for Vcf {
    fn config(&self) -> TabixConfig {
        TabixConfig::vcf()
    }
}

impl RecordFormat for Gff {
    fn config(&self) -> TabixConfig {
        TabixConfig::gff()
    }
}

impl RecordFormat for Generic {
    fn config(&self) -> TabixConfig {
        self.0.clone()
    }
}

fn column<'l>(fields: &[&'l str], col: usize, what: &str) -> std::result::Result<&'l str, String> {
    col.checked_sub(1)
        .and_then(|idx| fields.get(idx).copied())
        .ok_or_else(|| format!("missing {} column {} ({} fields)", what, col, fields.len()))
}

fn number(field: &str, what: &str) -> std::result::Result<u64, String> {
    field
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid {} '{}': {}", what, field, e))
}

fn parse_columns<'l>(cfg: &TabixConfig, line: &'l str) -> std::result::Result<LineInterval<'l>, String> {
    let fields: Vec<&str> = line.split('\t').collect();

    let chrom = column(&fields, cfg.col_seq, "sequence")?;
    if chrom.is_empty() {
        return Err("empty sequence name".to_string());
    }

    let raw_start = number(column(&fields, cfg.col_beg, "start")?, "start")?;
    let start = if cfg.zero_based {
        raw_start
    } else {
        raw_start
            .checked_sub(1)
            .ok_or_else(|| "1-based start position is 0".to_string())?
    };

    let end = if cfg.col_end > 0 {
        // 0-based exclusive and 1-based inclusive ends have the same value
        number(column(&fields, cfg.col_end, "end")?, "end")?
    } else if cfg.format == TabixFormat::Vcf {
        vcf_end(&fields, start)?
    } else {
        start + 1
    };

    if end < start {
        return Err(format!("end {} before start {}", end, start));
    }

    Ok(LineInterval { chrom, start, end })
}

/// Exclusive end of a VCF record: REF span, or `INFO/END` when it reaches further.
fn vcf_end(fields: &[&str], start: u64) -> std::result::Result<u64, String> {
    let reference = column(fields, 4, "REF")?;
    let mut end = start + (reference.len() as u64).max(1);

    if let Some(info) = fields.get(7) {
        let info_end = info
            .split(';')
            .find_map(|entry| entry.strip_prefix("END="))
            .map(|value| number(value, "INFO/END"))
            .transpose()?;
        if let Some(info_end) = info_end {
            end = end.max(info_end);
        }
    }

    Ok(end)
}

/// Sequential record source.
pub trait RecordReader {
    /// Next data record, or `None` at end of stream
    fn read_record(&mut self) -> Result<Option<IndexedRecord>>;

    /// Chromosome of the most recently read record
    fn current_chromosome(&self) -> Option<&str>;
}

/// Reads [`IndexedRecord`]s from a BGZF stream with a static format.
pub struct TabularRecordReader<R, F> {
    reader: BgzfReader<R>,
    format: F,
    config: TabixConfig,
    line: String,
    line_number: u64,
    current_chrom: Option<String>,
}

impl<R: Read + Seek, F: RecordFormat> TabularRecordReader<R, F> {
    /// Read records from the start of `reader`
    pub fn new(reader: BgzfReader<R>, format: F) -> Self {
        let config = format.config();
        TabularRecordReader {
            reader,
            format,
            config,
            line: String::with_capacity(1024),
            line_number: 0,
            current_chrom: None,
        }
    }

    /// Returns the current line number (1-based).
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// The record format
    pub fn format(&self) -> &F {
        &self.format
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> BgzfReader<R> {
        self.reader
    }

    fn is_header(&self) -> bool {
        self.line_number <= self.config.skip_lines as u64
            || self.line.is_empty()
            || self.line.starts_with(self.config.meta_char)
    }
}

impl<R: Read + Seek, F: RecordFormat> RecordReader for TabularRecordReader<R, F> {
    fn read_record(&mut self) -> Result<Option<IndexedRecord>> {
        loop {
            let begin_offset = self.reader.virtual_offset();
            if self.reader.read_line(&mut self.line)?.is_none() {
                return Ok(None);
            }
            self.line_number += 1;

            if self.is_header() {
                continue;
            }

            let end_offset = self.reader.virtual_offset();
            let interval = self
                .format
                .parse_interval(&self.line)
                .map_err(|msg| GenotrackError::parse(self.line_number, msg))?;

            if self.current_chrom.as_deref() != Some(interval.chrom) {
                self.current_chrom = Some(interval.chrom.to_string());
            }

            return Ok(Some(IndexedRecord {
                chrom: interval.chrom.to_string(),
                start: interval.start,
                end: interval.end,
                begin_offset,
                end_offset,
                line: self.line.clone(),
            }));
        }
    }

    fn current_chromosome(&self) -> Option<&str> {
        self.current_chrom.as_deref()
    }
}

impl<R: Read + Seek, F: RecordFormat> Iterator for TabularRecordReader<R, F> {
    type Item = Result<IndexedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
