//! genotrack: indexed interval retrieval and multi-genome variant alignment
//!
//! # Overview
//!
//! genotrack is the engine under a genome browser. It answers two questions:
//! which records of a large block-compressed annotation file overlap a
//! region, and where do variants from several genomes sit relative to each
//! other once their insertions and deletions are accounted for.
//!
//! ## Key Features
//!
//! - **BGZF random access**: one decompressed block in memory, seek by
//!   virtual offset
//! - **Tabix binning index**: build, persist atomically, query without false
//!   negatives
//! - **Coordinate spaces**: reference, meta-genome and per-allele axes with
//!   O(log k) conversions
//! - **Variant alignment**: deterministic k-way merge of per-genome streams
//!
//! ## Quick Start
//!
//! ```no_run
//! use genotrack::formats::index::{build_index, IndexedReader};
//! use genotrack::formats::records::Bed;
//! use genotrack::io::BgzfReader;
//!
//! # fn main() -> genotrack::Result<()> {
//! let index = build_index("peaks.bed.gz", Bed, None)?;
//! index.write_atomic("peaks.bed.gz.tbi")?;
//!
//! let mut reader = IndexedReader::new(BgzfReader::from_path("peaks.bed.gz")?, &index, Bed);
//! for record in reader.query("chr1", 10_000, 20_000)? {
//!     println!("{}", record.line);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`io`]: BGZF reader, writer and virtual offsets
//! - [`formats`]: record formats, tabix index and region strings
//! - [`coords`]: coordinate spaces, shift tables and transformers
//! - [`variants`]: variant records and the cross-genome aligner
//! - [`context`]: per-project chromosome table and cancellation hook
//!
//! ## Threads
//!
//! Nothing here spawns threads. Readers are per-thread; transformers are
//! immutable and shared through `Arc`. Long operations accept a
//! [`ContinueCheck`](context::ContinueCheck) for cooperative cancellation.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod context;
pub mod coords;
pub mod error;
pub mod formats;
pub mod io;
pub mod variants;

// Re-export commonly used types
pub use context::{ContinueCheck, ProjectContext};
pub use coords::{CoordinateSpace, CoordinateTransformer, GenomeRegistry, Position};
pub use error::{GenotrackError, Result};
pub use formats::{IndexedReader, Region, TabixIndex};
pub use io::{BgzfReader, BgzfWriter, IntervalPair, VirtualOffset};
pub use variants::{Variant, VariantAligner, VariantGroup, VariantRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
