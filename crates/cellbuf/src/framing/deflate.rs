//! Incremental deflate/inflate, writing decompressed or compressed bytes
//! into a `CellBuf` as they become available.
//!
//! The original contiguous-staging trick for writing across the ring's
//! wrap point is unnecessary here (see `DESIGN.md`'s Open Question
//! resolution): `CellBuf::write` already grows and copies as needed, so
//! this module just loops `flate2` over a fixed scratch chunk and appends
//! each chunk in turn.

use crate::ring::CellBuf;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use relay_error::{Error, Result};

const CHUNK: usize = 4096;

/// Incremental zlib compressor, appending output into a `CellBuf`.
pub struct Deflater {
    inner: Compress,
}

impl Deflater {
    pub fn new(level: Compression) -> Self {
        Deflater {
            inner: Compress::new(level, true),
        }
    }

    /// Compress all of `input`, appending the compressed stream to `out`.
    /// `finish` ends the stream (a final empty-input call with
    /// `finish = true` flushes any trailing bytes).
    pub fn step(&mut self, input: &[u8], out: &mut CellBuf, finish: bool) -> Result<bool> {
        let flush = if finish { FlushCompress::Finish } else { FlushCompress::None };
        let mut scratch = [0u8; CHUNK];
        let mut offset = 0usize;
        loop {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .compress(&input[offset..], &mut scratch, flush)
                .map_err(|_| Error::Protocol("deflate compression failure"))?;
            let produced = (self.inner.total_out() - before_out) as usize;
            if produced > 0 {
                out.write(&scratch[..produced])?;
            }
            offset += (self.inner.total_in() - before_in) as usize;
            match status {
                Status::StreamEnd => return Ok(true),
                Status::Ok if offset >= input.len() && produced == 0 => return Ok(false),
                Status::Ok => continue,
                Status::BufError if produced == 0 && offset >= input.len() => return Ok(false),
                Status::BufError => continue,
            }
        }
    }
}

/// Incremental zlib decompressor, appending output into a `CellBuf`.
pub struct Inflater {
    inner: Decompress,
}

impl Inflater {
    pub fn new() -> Self {
        Inflater {
            inner: Decompress::new(true),
        }
    }

    /// Decompress all of `input`, appending the plaintext to `out`.
    /// Returns `true` once the stream has signaled its end.
    pub fn step(&mut self, input: &[u8], out: &mut CellBuf) -> Result<bool> {
        let mut scratch = [0u8; CHUNK];
        let mut offset = 0usize;
        loop {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .decompress(&input[offset..], &mut scratch, FlushDecompress::None)
                .map_err(|_| Error::Protocol("inflate decompression failure"))?;
            let produced = (self.inner.total_out() - before_out) as usize;
            if produced > 0 {
                out.write(&scratch[..produced])?;
            }
            offset += (self.inner.total_in() - before_in) as usize;
            match status {
                Status::StreamEnd => return Ok(true),
                Status::Ok if offset >= input.len() && produced == 0 => return Ok(false),
                Status::Ok => continue,
                Status::BufError if produced == 0 && offset >= input.len() => return Ok(false),
                Status::BufError => continue,
            }
        }
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}
