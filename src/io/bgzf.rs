//! Seekable BGZF reader.
//!
//! Presents a block-compressed file as a byte stream addressable by
//! [`VirtualOffset`]. At most one decompressed block is held in memory; a
//! seek discards it and the target block is fetched lazily on the next read.
//!
//! # Usage
//!
//! ```no_run
//! use genotrack::io::{BgzfReader, VirtualOffset};
//!
//! # fn main() -> genotrack::Result<()> {
//! let mut reader = BgzfReader::from_path("features.bed.gz")?;
//! let mut line = String::new();
//!
//! reader.seek(VirtualOffset::new(0, 0))?;
//! while reader.read_line(&mut line)?.is_some() {
//!     println!("{}", line);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{GenotrackError, Result};
use crate::io::compression::{read_block, read_block_header};
use crate::io::virtual_offset::VirtualOffset;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{trace, warn};

/// Random-access reader over a BGZF file.
///
/// Not meant to be shared between threads: open one reader per thread over
/// the same file instead.
pub struct BgzfReader<R> {
    /// Underlying compressed stream, positioned at the next block to load
    inner: R,
    /// Decompressed data of the current block
    block: Vec<u8>,
    /// Read position within `block`
    block_pos: usize,
    /// Compressed address of the current (or next to load) block
    block_address: u64,
    /// Compressed address of the block following the loaded one
    next_block_address: u64,
    /// Whether `block` holds the block at `block_address`
    loaded: bool,
    /// Reached the physical end of the file
    eof: bool,
    /// Decompressed size of the last block loaded
    last_block_len: Option<usize>,
    /// `inner` is past `block_address` and must seek back before the next load
    reseek: bool,
    /// Reusable line buffer
    line_buf: Vec<u8>,
}

impl BgzfReader<BufReader<File>> {
    /// Open a BGZF file from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Create a reader starting at the inner stream's current position,
    /// which must be a block boundary.
    pub fn new(mut inner: R) -> Result<Self> {
        let start = inner.stream_position()?;
        Ok(Self {
            inner,
            block: Vec::new(),
            block_pos: 0,
            block_address: start,
            next_block_address: start,
            loaded: false,
            eof: false,
            last_block_len: None,
            reseek: false,
            line_buf: Vec::with_capacity(512),
        })
    }

    /// Position the stream at `offset`.
    ///
    /// The block address must point at a BGZF block header, otherwise
    /// [`GenotrackError::InvalidOffset`] is returned. An in-block offset past
    /// the end of the block is reported on the next read.
    pub fn seek(&mut self, offset: VirtualOffset) -> Result<()> {
        let address = offset.block_address();

        self.inner.seek(SeekFrom::Start(address))?;
        match read_block_header(&mut self.inner, address) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(GenotrackError::InvalidOffset {
                    offset: offset.as_raw(),
                    reason: "block address is at or past end of file".to_string(),
                })
            }
            Err(GenotrackError::CorruptBlock { reason, .. }) => {
                return Err(GenotrackError::InvalidOffset {
                    offset: offset.as_raw(),
                    reason: format!("not a block boundary ({})", reason),
                })
            }
            Err(e) => return Err(e),
        }
        self.inner.seek(SeekFrom::Start(address))?;

        self.block.clear();
        self.loaded = false;
        self.reseek = false;
        self.eof = false;
        self.block_address = address;
        self.next_block_address = address;
        self.block_pos = offset.within_block_offset() as usize;
        Ok(())
    }

    /// Virtual offset of the next byte to be read.
    ///
    /// When the current block is exhausted this is the start of the next
    /// block, so offsets taken between records are always valid seek targets.
    pub fn virtual_offset(&self) -> VirtualOffset {
        if self.loaded && self.block_pos >= self.block.len() {
            VirtualOffset::new(self.next_block_address, 0)
        } else {
            VirtualOffset::new(self.block_address, self.block_pos as u16)
        }
    }

    /// Make sure unread data is buffered; `false` at end of stream.
    fn fill(&mut self) -> Result<bool> {
        loop {
            if self.loaded {
                if self.block_pos < self.block.len() {
                    return Ok(true);
                }
                self.block_address = self.next_block_address;
                self.block_pos = 0;
                self.loaded = false;
            }

            if self.eof {
                return Ok(false);
            }

            if self.reseek {
                self.inner.seek(SeekFrom::Start(self.block_address))?;
                self.reseek = false;
            }

            match read_block(&mut self.inner, self.block_address)? {
                None => {
                    // The EOF marker is an empty block
                    if matches!(self.last_block_len, Some(len) if len > 0) {
                        warn!(address = self.block_address, "BGZF stream ends without EOF marker");
                    }
                    self.eof = true;
                    return Ok(false);
                }
                Some(block) => {
                    if self.block_pos > block.data.len() {
                        return Err(GenotrackError::InvalidOffset {
                            offset: VirtualOffset::new(self.block_address, self.block_pos as u16)
                                .as_raw(),
                            reason: format!(
                                "in-block offset {} past block length {}",
                                self.block_pos,
                                block.data.len()
                            ),
                        });
                    }
                    trace!(
                        address = self.block_address,
                        size = block.data.len(),
                        "loaded BGZF block"
                    );
                    self.next_block_address = self.block_address + block.compressed_size as u64;
                    self.last_block_len = Some(block.data.len());
                    self.block = block.data;
                    self.loaded = true;
                }
            }
        }
    }

    /// Read one line into `buf`, replacing its contents.
    ///
    /// The line terminator (`\n` or `\r\n`) is stripped. Returns the number of
    /// bytes consumed including the terminator, or `None` at end of stream.
    pub fn read_line(&mut self, buf: &mut String) -> Result<Option<usize>> {
        buf.clear();
        let mut bytes = std::mem::take(&mut self.line_buf);
        bytes.clear();
        let mut consumed = 0;

        while self.fill()? {
            let available = &self.block[self.block_pos..];
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    bytes.extend_from_slice(&available[..i]);
                    self.block_pos += i + 1;
                    consumed += i + 1;
                    break;
                }
                None => {
                    bytes.extend_from_slice(available);
                    consumed += available.len();
                    self.block_pos = self.block.len();
                }
            }
        }

        if consumed == 0 {
            self.line_buf = bytes;
            return Ok(None);
        }

        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = std::str::from_utf8(&bytes)
            .map_err(|e| GenotrackError::invalid_input(format!("line is not UTF-8: {}", e)))?;
        buf.push_str(line);
        self.line_buf = bytes;

        Ok(Some(consumed))
    }

    /// Read up to `n` bytes.
    ///
    /// Returns fewer bytes only when the stream ends, and `None` when no byte
    /// at all is left.
    pub fn read_bytes(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        let mut out = Vec::with_capacity(n);

        while out.len() < n && self.fill()? {
            let available = &self.block[self.block_pos..];
            let take = available.len().min(n - out.len());
            out.extend_from_slice(&available[..take]);
            self.block_pos += take;
        }

        if out.is_empty() && n > 0 {
            Ok(None)
        } else {
            Ok(Some(out))
        }
    }

    /// Drop the buffered block, e.g. when a scan is abandoned.
    ///
    /// The read position is kept; the block is fetched again on the next read.
    pub fn release_buffer(&mut self) {
        if self.loaded {
            if self.block_pos >= self.block.len() {
                // `inner` already sits at the next block
                self.block_address = self.next_block_address;
                self.block_pos = 0;
            } else {
                self.reseek = true;
            }
        }
        self.block = Vec::new();
        self.loaded = false;
    }

    /// Get a reference to the underlying reader
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the reader and return the underlying stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let has_data = self
            .fill()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if !has_data {
            return Ok(0);
        }

        let available = &self.block[self.block_pos..];
        let to_copy = available.len().min(buf.len());
        buf[..to_copy].copy_from_slice(&available[..to_copy]);
        self.block_pos += to_copy;
        Ok(to_copy)
    }
}
