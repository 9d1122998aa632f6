#![forbid(unsafe_code)]

use std::io::{self, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};

////////////////////////////////////////////////////////////////////////////////

pub const LINE_WIDTH: usize = 72;

/// Input bytes that encode to exactly one full line.
const LINE_BYTES: usize = LINE_WIDTH / 4 * 3;

/// Base64-encodes everything written to it as lines of `LINE_WIDTH` characters.
/// Line breaks fall on the same offsets no matter how the input is split across writes.
pub struct Base64LineWriter<T> {
    inner: T,
    pending: Vec<u8>,
    byte_count: usize,
    line_count: usize,
}

impl<T: Write> Write for Base64LineWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;

        if !self.pending.is_empty() {
            let take = (LINE_BYTES - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() < LINE_BYTES {
                self.byte_count += buf.len();
                return Ok(buf.len());
            }
            write_line(&mut self.inner, &self.pending)?;
            self.line_count += 1;
            self.pending.clear();
        }

        let mut lines = rest.chunks_exact(LINE_BYTES);
        for line in &mut lines {
            write_line(&mut self.inner, line)?;
            self.line_count += 1;
        }
        self.pending.extend_from_slice(lines.remainder());

        self.byte_count += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: Write> Base64LineWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(LINE_BYTES),
            byte_count: 0,
            line_count: 0,
        }
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Writes the last, possibly short, line and returns the inner writer.
    pub fn finish(mut self) -> io::Result<T> {
        if !self.pending.is_empty() {
            write_line(&mut self.inner, &self.pending)?;
            self.line_count += 1;
            self.pending.clear();
        }
        Ok(self.inner)
    }
}

fn write_line<W: Write>(output: &mut W, bytes: &[u8]) -> io::Result<()> {
    output.write_all(STANDARD.encode(bytes).as_bytes())?;
    output.write_all(b"\n")
}

////////////////////////////////////////////////////////////////////////////////
