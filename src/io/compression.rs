//! BGZF block codec and block-compressed writer.
//!
//! # Block Structure
//!
//! Each BGZF block is a complete gzip member with a `BC` extra subfield:
//! - Bytes 0-1: Gzip magic (31, 139)
//! - Byte 2: CM=8 (deflate)
//! - Byte 3: FLG, FEXTRA (0x04) must be set
//! - Bytes 4-9: MTIME, XFL, OS
//! - Bytes 10-11: XLEN (extra field length)
//! - Extra subfields, including SI1=66 ('B'), SI2=67 ('C'), SLEN=2, BSIZE
//!   (little-endian u16, total block size - 1)
//! - Raw deflate data
//! - CRC32 and ISIZE of the uncompressed data
//!
//! Every block decompresses to at most 64 KB. A file ends with the
//! 28-byte empty EOF marker block.

use crate::error::{GenotrackError, Result};
use crate::io::virtual_offset::VirtualOffset;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Maximum uncompressed size of one block (SAM/BGZF format)
pub const MAX_BLOCK_DATA: usize = 64 * 1024;

/// Uncompressed bytes per block written by [`BgzfWriter`]
///
/// Leaves headroom so the compressed block stays under 64 KB even for
/// incompressible data.
pub const BGZF_BLOCK_SIZE: usize = 60 * 1024;

/// Fixed gzip header bytes preceding the extra field
const FIXED_HEADER_LEN: usize = 12;

/// CRC32 + ISIZE
const FOOTER_LEN: usize = 8;

/// Standard 28-byte BGZF end-of-file marker (an empty block)
pub const BGZF_EOF_MARKER: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, // Header (10 bytes)
    6, 0, 66, 67, 2, 0, 27, 0, // Extra field with BSIZE=27 (8 bytes)
    3, 0, // Empty deflate block (2 bytes)
    0, 0, 0, 0, // CRC32 (4 bytes)
    0, 0, 0, 0, // ISIZE=0 (4 bytes)
];

/// Parsed block header: total compressed size and extra field length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    /// Total compressed block size in bytes (BSIZE + 1)
    pub block_size: usize,
    /// Length of the extra field
    pub xlen: usize,
}

/// A decompressed block
#[derive(Debug, Clone)]
pub(crate) struct Block {
    /// Decompressed payload
    pub data: Vec<u8>,
    /// Size of the block in the compressed file
    pub compressed_size: usize,
}

/// Read until `buf` is full or the reader is exhausted.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Find BSIZE in the extra subfields
fn find_bsize(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let si1 = extra[pos];
        let si2 = extra[pos + 1];
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;

        if si1 == 66 && si2 == 67 && slen == 2 {
            if pos + 6 > extra.len() {
                return None;
            }
            return Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]));
        }

        pos += 4 + slen;
    }
    None
}

/// Read and validate a block header, returning `None` at a clean end of file.
///
/// On success the reader is positioned at the start of the deflate data.
/// `offset` is the compressed address of the block, used in error reports.
pub(crate) fn read_block_header<R: Read>(
    reader: &mut R,
    offset: u64,
) -> Result<Option<(BlockHeader, Vec<u8>)>> {
    let mut fixed = [0u8; FIXED_HEADER_LEN];
    let n = read_fully(reader, &mut fixed)?;
    if n == 0 {
        return Ok(None);
    }
    if n < FIXED_HEADER_LEN {
        return Err(GenotrackError::corrupt_block(
            offset,
            format!("truncated header ({} of {} bytes)", n, FIXED_HEADER_LEN),
        ));
    }

    if fixed[0] != 31 || fixed[1] != 139 {
        return Err(GenotrackError::corrupt_block(
            offset,
            format!("invalid gzip magic [{}, {}]", fixed[0], fixed[1]),
        ));
    }
    if fixed[2] != 8 {
        return Err(GenotrackError::corrupt_block(
            offset,
            format!("unsupported compression method {}", fixed[2]),
        ));
    }
    if fixed[3] & 0x04 == 0 {
        return Err(GenotrackError::corrupt_block(offset, "FEXTRA flag not set"));
    }

    let xlen = u16::from_le_bytes([fixed[10], fixed[11]]) as usize;
    let mut extra = vec![0u8; xlen];
    if read_fully(reader, &mut extra)? < xlen {
        return Err(GenotrackError::corrupt_block(offset, "truncated extra field"));
    }

    let bsize = find_bsize(&extra)
        .ok_or_else(|| GenotrackError::corrupt_block(offset, "missing BC subfield"))?;
    let block_size = bsize as usize + 1;

    if block_size < FIXED_HEADER_LEN + xlen + FOOTER_LEN {
        return Err(GenotrackError::corrupt_block(
            offset,
            format!("block size {} smaller than its header", block_size),
        ));
    }

    Ok(Some((BlockHeader { block_size, xlen }, extra)))
}

/// Read and decompress one block, returning `None` at a clean end of file.
pub(crate) fn read_block<R: Read>(reader: &mut R, offset: u64) -> Result<Option<Block>> {
    let header = match read_block_header(reader, offset)? {
        Some((header, _)) => header,
        None => return Ok(None),
    };

    let remaining = header.block_size - FIXED_HEADER_LEN - header.xlen;
    let mut rest = vec![0u8; remaining];
    let n = read_fully(reader, &mut rest)?;
    if n < remaining {
        return Err(GenotrackError::corrupt_block(
            offset,
            format!("truncated block ({} of {} bytes)", n, remaining),
        ));
    }

    let cdata_len = remaining - FOOTER_LEN;
    let crc = u32::from_le_bytes([
        rest[cdata_len],
        rest[cdata_len + 1],
        rest[cdata_len + 2],
        rest[cdata_len + 3],
    ]);
    let isize = u32::from_le_bytes([
        rest[cdata_len + 4],
        rest[cdata_len + 5],
        rest[cdata_len + 6],
        rest[cdata_len + 7],
    ]) as usize;

    if isize > MAX_BLOCK_DATA {
        return Err(GenotrackError::corrupt_block(
            offset,
            format!("ISIZE {} exceeds {} bytes", isize, MAX_BLOCK_DATA),
        ));
    }

    let mut data = Vec::with_capacity(isize);
    DeflateDecoder::new(&rest[..cdata_len])
        .take(MAX_BLOCK_DATA as u64 + 1)
        .read_to_end(&mut data)
        .map_err(|e| GenotrackError::corrupt_block(offset, format!("inflate failed: {}", e)))?;

    if data.len() != isize {
        return Err(GenotrackError::corrupt_block(
            offset,
            format!("ISIZE {} but inflated {} bytes", isize, data.len()),
        ));
    }
    if crc32fast::hash(&data) != crc {
        return Err(GenotrackError::corrupt_block(offset, "CRC32 mismatch"));
    }

    Ok(Some(Block {
        data,
        compressed_size: header.block_size,
    }))
}

/// Compress a single block to BGZF format
///
/// Header: ID1=31, ID2=139, CM=8, FLG=4, MTIME=0, XFL=0, OS=255, XLEN=6,
/// then the `BC` subfield. MTIME is always zero so output is reproducible.
pub(crate) fn compress_block(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
    deflate.write_all(data)?;
    let deflated = deflate.finish()?;

    let crc = crc32fast::hash(data);
    let isize = data.len() as u32;

    let mut block = Vec::with_capacity(deflated.len() + 26);
    block.extend_from_slice(&[31, 139, 8, 4, 0, 0, 0, 0, 0, 255]);
    block.extend_from_slice(&6u16.to_le_bytes()); // XLEN=6
    block.push(66); // SI1='B'
    block.push(67); // SI2='C'
    block.extend_from_slice(&2u16.to_le_bytes()); // SLEN=2

    let bsize_pos = block.len();
    block.extend_from_slice(&0u16.to_le_bytes());

    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc.to_le_bytes());
    block.extend_from_slice(&isize.to_le_bytes());

    let bsize = u16::try_from(block.len() - 1).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("compressed block of {} bytes exceeds BGZF limit", block.len()),
        )
    })?;
    block[bsize_pos..bsize_pos + 2].copy_from_slice(&bsize.to_le_bytes());

    Ok(block)
}

/// Block-compressed (BGZF) writer
///
/// Buffers up to [`BGZF_BLOCK_SIZE`] bytes, then emits one block. Reports the
/// virtual offset of the next byte so callers can record where each record
/// lands while writing.
///
/// # Example
///
/// ```
/// use genotrack::io::BgzfWriter;
/// use std::io::Write;
///
/// # fn main() -> std::io::Result<()> {
/// let mut writer = BgzfWriter::new(Vec::new());
/// let start = writer.virtual_offset();
/// writer.write_all(b"chr1\t100\t200\n")?;
/// let bytes = writer.finish()?;
/// assert_eq!(start.as_raw(), 0);
/// assert!(bytes.ends_with(&genotrack::io::compression::BGZF_EOF_MARKER));
/// # Ok(())
/// # }
/// ```
pub struct BgzfWriter<W: Write> {
    /// Underlying writer for compressed output
    inner: W,
    /// Uncompressed block being filled
    current_block: Vec<u8>,
    /// Compressed bytes written so far (address of the next block)
    compressed_offset: u64,
}

impl<W: Write> BgzfWriter<W> {
    /// Create a new BGZF writer
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            current_block: Vec::with_capacity(BGZF_BLOCK_SIZE),
            compressed_offset: 0,
        }
    }

    /// Virtual offset at which the next written byte will be found
    pub fn virtual_offset(&self) -> VirtualOffset {
        // current_block never reaches 64 KB, the in-block offset fits in u16
        VirtualOffset::new(self.compressed_offset, self.current_block.len() as u16)
    }

    /// Compress and emit the pending data as one block, even if not full
    pub fn flush_block(&mut self) -> io::Result<()> {
        if self.current_block.is_empty() {
            return Ok(());
        }
        let block = compress_block(&self.current_block)?;
        self.inner.write_all(&block)?;
        self.compressed_offset += block.len() as u64;
        self.current_block.clear();
        Ok(())
    }

    /// Flush remaining data, write the EOF marker and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_block()?;
        self.inner.write_all(&BGZF_EOF_MARKER)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut remaining = buf;

        while !remaining.is_empty() {
            let space_in_block = BGZF_BLOCK_SIZE - self.current_block.len();
            let to_copy = remaining.len().min(space_in_block);

            self.current_block.extend_from_slice(&remaining[..to_copy]);
            remaining = &remaining[to_copy..];

            if self.current_block.len() >= BGZF_BLOCK_SIZE {
                self.flush_block()?;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decompress a whole BGZF byte stream
///
/// Used for small payloads such as index files; large data files should go
/// through [`crate::io::BgzfReader`].
pub fn decompress_bgzf(data: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = io::Cursor::new(data);
    let mut output = Vec::new();
    loop {
        let offset = cursor.position();
        match read_block(&mut cursor, offset)? {
            Some(block) => output.extend_from_slice(&block.data),
            None => break,
        }
    }
    Ok(output)
}

/// Compress a byte slice into a complete BGZF stream with EOF marker
pub fn compress_bgzf(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut writer = BgzfWriter::new(Vec::new());
    writer.write_all(data)?;
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_round_trip() {
        let payload = b"chr1\t100\t200\tgene\n".repeat(50);
        let block = compress_block(&payload).unwrap();

        // BSIZE matches actual size
        let bsize = u16::from_le_bytes([block[16], block[17]]) as usize;
        assert_eq!(bsize + 1, block.len());

        let decoded = read_block(&mut io::Cursor::new(&block), 0).unwrap().unwrap();
        assert_eq!(decoded.data, payload);
        assert_eq!(decoded.compressed_size, block.len());
    }

    #[test]
    fn test_eof_marker_is_empty_block() {
        let block = read_block(&mut io::Cursor::new(&BGZF_EOF_MARKER[..]), 0)
            .unwrap()
            .unwrap();
        assert!(block.data.is_empty());
        assert_eq!(block.compressed_size, 28);
    }

    #[test]
    fn test_clean_eof() {
        let empty: &[u8] = &[];
        assert!(read_block(&mut io::Cursor::new(empty), 0).unwrap().is_none());
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut block = compress_block(b"hello").unwrap();
        block[0] = 0;
        let err = read_block(&mut io::Cursor::new(&block), 0).unwrap_err();
        assert!(matches!(err, GenotrackError::CorruptBlock { .. }));
    }

    #[test]
    fn test_crc_mismatch_is_corrupt() {
        let mut block = compress_block(b"hello world").unwrap();
        let crc_pos = block.len() - 8;
        block[crc_pos] ^= 0xFF;
        let err = read_block(&mut io::Cursor::new(&block), 0).unwrap_err();
        assert!(err.to_string().contains("CRC32"));
    }

    #[test]
    fn test_truncated_block_is_corrupt() {
        let block = compress_block(b"some data that will be cut").unwrap();
        let cut = &block[..block.len() - 3];
        let err = read_block(&mut io::Cursor::new(cut), 0).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_writer_splits_blocks() {
        let data = vec![b'A'; BGZF_BLOCK_SIZE * 2 + 100];
        let compressed = compress_bgzf(&data).unwrap();
        assert_eq!(decompress_bgzf(&compressed).unwrap(), data);
    }

    #[test]
    fn test_writer_virtual_offsets() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(b"abc").unwrap();
        assert_eq!(writer.virtual_offset(), VirtualOffset::new(0, 3));

        writer.flush_block().unwrap();
        let after = writer.virtual_offset();
        assert!(after.block_address() > 0);
        assert_eq!(after.within_block_offset(), 0);
    }

    #[test]
    fn test_writer_is_deterministic() {
        let data = b"deterministic output\n".repeat(1000);
        assert_eq!(compress_bgzf(&data).unwrap(), compress_bgzf(&data).unwrap());
    }
}
