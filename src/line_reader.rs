#![forbid(unsafe_code)]

use std::io::{BufRead, Read};

use crate::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////

pub const MAX_LINE_LENGTH: usize = 1 << 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// 1-based.
    pub number: usize,
    pub text: String,
}

impl Line {
    pub fn is_section_end(&self) -> bool {
        self.text.starts_with("--")
    }

    pub fn is_ignorable(&self) -> bool {
        self.text.starts_with('#') || self.text.trim().is_empty()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Reads a text document line by line, keeping count for error messages.
pub struct LineReader<T> {
    stream: T,
    line_count: usize,
}

impl<T: BufRead> LineReader<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            line_count: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Returns the next line without its terminator, or `None` at end of input.
    pub fn next_line(&mut self) -> Result<Option<Line>> {
        let mut bytes: Vec<u8> = vec![];
        self.stream
            .by_ref()
            .take(MAX_LINE_LENGTH as u64 + 1)
            .read_until(b'\n', &mut bytes)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        self.line_count += 1;

        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        } else if bytes.len() > MAX_LINE_LENGTH {
            return Err(Error::malformed(
                self.line_count,
                format!("line longer than {} bytes", MAX_LINE_LENGTH),
            ));
        }

        let text = String::from_utf8(bytes)
            .map_err(|_| Error::malformed(self.line_count, "line is not valid UTF-8"))?;
        Ok(Some(Line {
            number: self.line_count,
            text,
        }))
    }
}

////////////////////////////////////////////////////////////////////////////////
