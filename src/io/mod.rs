//! I/O module: block-compressed (BGZF) reading and writing
//!
//! - [`compression`]: BGZF block codec and [`BgzfWriter`]
//! - [`bgzf`]: seekable [`BgzfReader`] with one-block buffering
//! - [`virtual_offset`]: [`VirtualOffset`] cursors and [`IntervalPair`] ranges

pub mod bgzf;
pub mod compression;
pub mod virtual_offset;

pub use bgzf::BgzfReader;
pub use compression::{compress_bgzf, decompress_bgzf, BgzfWriter};
pub use virtual_offset::{IntervalPair, VirtualOffset};
