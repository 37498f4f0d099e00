//! Single-pass tabix index construction.
//!
//! Records are fed in file order. Each one is filed under the smallest bin
//! containing it, and every 16 Kbp tile it touches remembers the first
//! record offset seen there. Input must be sorted by start within a
//! chromosome, and each chromosome must form one contiguous block.
//!
//! # Example
//!
//! ```no_run
//! use genotrack::formats::index::builder::build_index;
//! use genotrack::formats::records::Vcf;
//!
//! # fn main() -> genotrack::Result<()> {
//! let index = build_index("calls.vcf.gz", Vcf, None)?;
//! index.write_atomic("calls.vcf.gz.tbi")?;
//! # Ok(())
//! # }
//! ```

use crate::context::{AlwaysContinue, ContinueCheck, ProjectContext};
use crate::error::{GenotrackError, Result};
use crate::formats::index::bins::{bin_for_interval, tile_of, MAX_COORDINATE};
use crate::formats::index::tbi::{ReferenceIndex, TabixConfig, TabixIndex};
use crate::formats::records::{RecordFormat, RecordReader, TabularRecordReader};
use crate::io::bgzf::BgzfReader;
use crate::io::virtual_offset::{IntervalPair, VirtualOffset};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};

/// Index state for the chromosome being built
struct PendingReference {
    name: String,
    bins: HashMap<u32, Vec<IntervalPair>>,
    linear: Vec<Option<VirtualOffset>>,
    last_start: u64,
}

impl PendingReference {
    fn new(name: &str) -> Self {
        PendingReference {
            name: name.to_string(),
            bins: HashMap::new(),
            linear: Vec::new(),
            last_start: 0,
        }
    }

    fn finish(self) -> ReferenceIndex {
        // Tiles no record touches take the next tile's offset
        let mut linear = vec![VirtualOffset::default(); self.linear.len()];
        let mut next = VirtualOffset::default();
        for (slot, entry) in linear.iter_mut().zip(self.linear.iter()).rev() {
            if let Some(offset) = entry {
                next = *offset;
            }
            *slot = next;
        }
        ReferenceIndex::new(self.name, self.bins, linear)
    }
}

/// Accumulates records into a [`TabixIndex`].
pub struct IndexBuilder<'a> {
    config: TabixConfig,
    context: Option<&'a ProjectContext>,
    references: Vec<ReferenceIndex>,
    seen: HashSet<String>,
    pending: Option<PendingReference>,
    records: u64,
}

impl<'a> IndexBuilder<'a> {
    /// Start an index with the given header layout
    pub fn new(config: TabixConfig) -> Self {
        IndexBuilder {
            config,
            context: None,
            references: Vec::new(),
            seen: HashSet::new(),
            pending: None,
            records: 0,
        }
    }

    /// Validate chromosomes and lengths against a project context
    pub fn with_context(mut self, context: &'a ProjectContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Number of records added so far
    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Add one record spanning `[begin, end_offset)` in the compressed file.
    ///
    /// `start`/`end` are 0-based half-open.
    pub fn add_record(
        &mut self,
        chrom: &str,
        start: u64,
        end: u64,
        begin: VirtualOffset,
        end_offset: VirtualOffset,
    ) -> Result<()> {
        if end < start {
            return Err(GenotrackError::invalid_input(format!(
                "{}:{}-{}: end before start",
                chrom, start, end
            )));
        }
        if start >= MAX_COORDINATE || end > MAX_COORDINATE {
            return Err(GenotrackError::InvalidRange(format!(
                "{}:{}-{} beyond binning limit {}",
                chrom, start, end, MAX_COORDINATE
            )));
        }
        if let Some(ctx) = self.context {
            let length = ctx.chromosome_length(chrom).ok_or_else(|| {
                GenotrackError::invalid_input(format!("unknown chromosome '{}'", chrom))
            })?;
            if end > length {
                return Err(GenotrackError::InvalidRange(format!(
                    "{}:{}-{} extends past chromosome length {}",
                    chrom, start, end, length
                )));
            }
        }

        let same_reference = matches!(&self.pending, Some(p) if p.name == chrom);
        if !same_reference {
            if self.seen.contains(chrom) {
                return Err(GenotrackError::invalid_input(format!(
                    "records for '{}' are not contiguous",
                    chrom
                )));
            }
            if let Some(done) = self.pending.take() {
                self.references.push(done.finish());
            }
            self.seen.insert(chrom.to_string());
            self.pending = Some(PendingReference::new(chrom));
        }

        let pending = match self.pending.as_mut() {
            Some(pending) => pending,
            None => return Err(GenotrackError::invalid_input("no reference in progress")),
        };

        if start < pending.last_start {
            return Err(GenotrackError::invalid_input(format!(
                "unsorted input: {}:{} after {}:{}",
                chrom, start, chrom, pending.last_start
            )));
        }
        pending.last_start = start;

        let pairs = pending.bins.entry(bin_for_interval(start, end)).or_default();
        match pairs.last_mut() {
            Some(last) if last.end == begin => last.end = end_offset,
            _ => pairs.push(IntervalPair::new(begin, end_offset)),
        }

        let first_tile = tile_of(start);
        let last_tile = tile_of(end.max(start + 1) - 1);
        if pending.linear.len() <= last_tile {
            pending.linear.resize(last_tile + 1, None);
        }
        for slot in &mut pending.linear[first_tile..=last_tile] {
            if slot.is_none() {
                *slot = Some(begin);
            }
        }

        self.records += 1;
        Ok(())
    }

    /// Drain a record reader into the index, polling `check` between records.
    pub fn index_records<RR, C>(&mut self, reader: &mut RR, check: &C) -> Result<u64>
    where
        RR: RecordReader,
        C: ContinueCheck + ?Sized,
    {
        let mut added = 0;
        while let Some(record) = reader.read_record()? {
            if !check.should_continue() {
                return Err(GenotrackError::Cancelled);
            }
            self.add_record(
                &record.chrom,
                record.start,
                record.end,
                record.begin_offset,
                record.end_offset,
            )?;
            added += 1;
        }
        Ok(added)
    }

    /// Finish the last chromosome and produce the index
    pub fn finish(mut self) -> TabixIndex {
        if let Some(done) = self.pending.take() {
            self.references.push(done.finish());
        }

        info!(
            records = self.records,
            references = self.references.len(),
            "built index"
        );
        TabixIndex::from_parts(self.config, self.references)
    }
}

/// Build an index for a BGZF-compressed file.
pub fn build_index<P, F>(path: P, format: F, context: Option<&ProjectContext>) -> Result<TabixIndex>
where
    P: AsRef<Path>,
    F: RecordFormat,
{
    build_index_with(path, format, context, &AlwaysContinue)
}

/// [`build_index`] with a continue check polled between records.
pub fn build_index_with<P, F, C>(
    path: P,
    format: F,
    context: Option<&ProjectContext>,
    check: &C,
) -> Result<TabixIndex>
where
    P: AsRef<Path>,
    F: RecordFormat,
    C: ContinueCheck + ?Sized,
{
    let path = path.as_ref();
    let span = info_span!("build_index", path = %path.display());
    let _guard = span.enter();

    let mut builder = IndexBuilder::new(format.config());
    if let Some(ctx) = context {
        builder = builder.with_context(ctx);
    }

    let mut records = TabularRecordReader::new(BgzfReader::from_path(path)?, format);
    let added = builder.index_records(&mut records, check)?;
    debug!(added, "indexed records");

    Ok(builder.finish())
}

/// Build the index for `path` and publish it next to it as `<path>.tbi`.
///
/// A failed build leaves no index file behind.
pub fn write_index<P, F>(path: P, format: F, context: Option<&ProjectContext>) -> Result<PathBuf>
where
    P: AsRef<Path>,
    F: RecordFormat,
{
    let path = path.as_ref();
    let index = build_index(path, format, context)?;

    let mut index_path = path.as_os_str().to_owned();
    index_path.push(".tbi");
    let index_path = PathBuf::from(index_path);

    index.write_atomic(&index_path)?;
    Ok(index_path)
}
