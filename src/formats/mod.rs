//! Tab-delimited interval files and their index.
//!
//! - [`records`]: per-format interval extraction and [`RecordReader`]
//! - [`index`]: tabix binning index, builder and record queries
//! - [`region`]: `chr:start-end` region strings
//!
//! # Design Principles
//!
//! - Formats are selected statically through a type parameter
//! - All positions leaving this module are 0-based
//! - No `panic!` in library code (all errors use `Result`)

pub mod index;
pub mod records;
pub mod region;

pub use index::{IndexBuilder, IndexedReader, TabixConfig, TabixIndex};
pub use records::{Bed, Generic, Gff, IndexedRecord, RecordFormat, RecordReader, TabularRecordReader, Vcf};
pub use region::Region;
