//! Region queries that return records rather than offset ranges.
//!
//! [`IndexedReader`] asks the index for candidate ranges, seeks to each one
//! and scans forward, keeping only records that really overlap the query.

use crate::context::{AlwaysContinue, ContinueCheck};
use crate::error::{GenotrackError, Result};
use crate::formats::index::tbi::TabixIndex;
use crate::formats::records::{interval_overlaps, IndexedRecord, RecordFormat};
use crate::io::bgzf::BgzfReader;
use std::io::{Read, Seek};
use tracing::debug;

/// Record-level queries over an indexed BGZF file.
///
/// Holds its own [`BgzfReader`]; open one per thread.
pub struct IndexedReader<'a, R, F> {
    reader: BgzfReader<R>,
    index: &'a TabixIndex,
    format: F,
    meta_char: char,
    line: String,
}

impl<'a, R: Read + Seek, F: RecordFormat> IndexedReader<'a, R, F> {
    /// Combine a reader, its index and the record format
    pub fn new(reader: BgzfReader<R>, index: &'a TabixIndex, format: F) -> Self {
        let meta_char = index.config().meta_char;
        IndexedReader {
            reader,
            index,
            format,
            meta_char,
            line: String::with_capacity(1024),
        }
    }

    /// Records overlapping the inclusive range `[start, end]`, in file order.
    pub fn query(&mut self, chrom: &str, start: u64, end: u64) -> Result<Vec<IndexedRecord>> {
        self.query_with(chrom, start, end, &AlwaysContinue)
    }

    /// [`query`](Self::query) with a continue check polled between ranges.
    ///
    /// On cancellation the block buffer is released.
    pub fn query_with<C: ContinueCheck + ?Sized>(
        &mut self,
        chrom: &str,
        start: u64,
        end: u64,
        check: &C,
    ) -> Result<Vec<IndexedRecord>> {
        let pairs = self.index.query_with(chrom, start, end, check)?;
        let mut records = Vec::new();
        let mut scanned = 0usize;

        for pair in &pairs {
            if !check.should_continue() {
                self.reader.release_buffer();
                return Err(GenotrackError::Cancelled);
            }

            self.reader.seek(pair.begin)?;
            loop {
                let begin_offset = self.reader.virtual_offset();
                if begin_offset >= pair.end {
                    break;
                }
                if self.reader.read_line(&mut self.line)?.is_none() {
                    break;
                }
                if self.line.is_empty() || self.line.starts_with(self.meta_char) {
                    continue;
                }
                scanned += 1;

                let interval = self.format.parse_interval(&self.line).map_err(|msg| {
                    GenotrackError::invalid_input(format!("record at {}: {}", begin_offset, msg))
                })?;
                if interval.chrom != chrom {
                    continue;
                }
                // Sorted input: nothing further in this range can overlap
                if interval.start > end {
                    break;
                }
                if interval_overlaps(interval.start, interval.end, start, end) {
                    records.push(IndexedRecord {
                        chrom: interval.chrom.to_string(),
                        start: interval.start,
                        end: interval.end,
                        begin_offset,
                        end_offset: self.reader.virtual_offset(),
                        line: self.line.clone(),
                    });
                }
            }
        }

        debug!(
            chrom,
            start,
            end,
            ranges = pairs.len(),
            scanned,
            hits = records.len(),
            "record query"
        );
        Ok(records)
    }

    /// The index in use
    pub fn index(&self) -> &TabixIndex {
        self.index
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> BgzfReader<R> {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::index::builder::IndexBuilder;
    use crate::formats::index::tbi::TabixConfig;
    use crate::formats::records::{Bed, RecordReader, TabularRecordReader};
    use crate::io::compression::BgzfWriter;
    use std::io::{Cursor, Write};

    fn indexed(lines: &[&str]) -> (Vec<u8>, TabixIndex) {
        let mut writer = BgzfWriter::new(Vec::new());
        for (i, line) in lines.iter().enumerate() {
            writeln!(writer, "{}", line).unwrap();
            // Small blocks so queries cross block boundaries
            if i % 2 == 1 {
                writer.flush_block().unwrap();
            }
        }
        let data = writer.finish().unwrap();

        let mut records =
            TabularRecordReader::new(BgzfReader::new(Cursor::new(data.clone())).unwrap(), Bed);
        let mut builder = IndexBuilder::new(TabixConfig::bed());
        builder.index_records(&mut records, &AlwaysContinue).unwrap();
        assert!(records.read_record().unwrap().is_none());
        (data, builder.finish())
    }

    #[test]
    fn test_query_filters_false_positives() {
        let (data, index) = indexed(&[
            "chr1\t0\t100",
            "chr1\t150\t300",
            "chr1\t500\t600",
            "chr1\t700\t800",
            "chr2\t0\t50",
        ]);
        let mut reader =
            IndexedReader::new(BgzfReader::new(Cursor::new(data)).unwrap(), &index, Bed);

        let hits = reader.query("chr1", 250, 550).unwrap();
        let lines: Vec<&str> = hits.iter().map(|r| r.line.as_str()).collect();
        assert_eq!(lines, vec!["chr1\t150\t300", "chr1\t500\t600"]);

        let hits = reader.query("chr2", 0, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(reader.query("chr3", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_query_cancelled_releases() {
        let (data, index) = indexed(&["chr1\t0\t100", "chr1\t150\t300"]);
        let mut reader =
            IndexedReader::new(BgzfReader::new(Cursor::new(data)).unwrap(), &index, Bed);
        let err = reader.query_with("chr1", 0, 200, &|| false).unwrap_err();
        assert!(matches!(err, GenotrackError::Cancelled));
    }
}
