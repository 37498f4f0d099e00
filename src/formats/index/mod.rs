//! Tabix binning index for block-compressed, coordinate-sorted files
//!
//! - [`bins`]: the hierarchical binning scheme (6 levels, 16 Kbp to 512 Mbp)
//! - [`tbi`]: [`TabixIndex`] with queries and TBI persistence
//! - [`builder`]: single-pass [`IndexBuilder`]
//! - [`query`]: [`IndexedReader`], record-level region queries
//!
//! # Overview
//!
//! A query for `[start, end]` returns the virtual-offset ranges that must be
//! scanned. Ranges may hold records outside the query (false positives) but
//! never miss an overlapping record.
//!
//! # Example
//!
//! ```no_run
//! use genotrack::formats::index::{IndexedReader, TabixIndex};
//! use genotrack::formats::records::Bed;
//! use genotrack::io::BgzfReader;
//!
//! # fn main() -> genotrack::Result<()> {
//! let index = TabixIndex::from_path("peaks.bed.gz.tbi")?;
//! let mut reader = IndexedReader::new(BgzfReader::from_path("peaks.bed.gz")?, &index, Bed);
//!
//! for record in reader.query("chr1", 1_000_000, 2_000_000)? {
//!     println!("{}", record.line);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bins;
pub mod builder;
pub mod query;
pub mod tbi;

pub use builder::{build_index, build_index_with, write_index, IndexBuilder};
pub use query::IndexedReader;
pub use tbi::{ReferenceIndex, TabixConfig, TabixFormat, TabixIndex};
