#![forbid(unsafe_code)]

//! Compressed payload between header and footer.
//!
//! Binary input gives no length for the payload, it simply ends 8 bytes
//! before the stream does. The encoder reads fixed-size chunks and holds the
//! last full chunk back until the next read, so when the input runs out the
//! footer is always inside `previous + current`. Only the first member of a
//! stream is understood: trailing members end up in the payload and their
//! last 8 bytes are taken as the footer.

use std::io::{self, BufRead, Read, Write};
use std::mem;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::*;

use crate::error::{Error, Result};
use crate::footer::{GzipFooter, FOOTER_SIZE};
use crate::gzip::read_gzip_footer;
use crate::line_reader::LineReader;
use crate::line_writer::Base64LineWriter;

////////////////////////////////////////////////////////////////////////////////

pub const CHUNK_SIZE: usize = 4096;

/// Fills `buf` unless the input ends first. Returns the number of bytes read.
fn read_chunk<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Writes the payload as wrapped base64 lines and returns the footer that followed it.
pub fn encode_payload<R: Read, W: Write>(input: &mut R, output: &mut W) -> Result<GzipFooter> {
    let mut lines = Base64LineWriter::new(output);
    let mut previous = Vec::with_capacity(CHUNK_SIZE);
    let mut current = vec![0; CHUNK_SIZE];

    loop {
        let read = read_chunk(input, &mut current)?;
        if read < CHUNK_SIZE {
            current.truncate(read);
            break;
        }
        lines.write_all(&previous)?;
        mem::swap(&mut previous, &mut current);
        current.resize(CHUNK_SIZE, 0);
    }

    let mut tail = previous;
    tail.extend_from_slice(&current);
    if tail.len() < FOOTER_SIZE {
        return Err(Error::TruncatedInput("footer"));
    }

    let (data, mut footer) = tail.split_at(tail.len() - FOOTER_SIZE);
    lines.write_all(data)?;
    debug!(
        "encoded {} payload bytes into {} lines",
        lines.byte_count(),
        lines.line_count()
    );
    lines.finish()?;

    read_gzip_footer(&mut footer)
}

/// Writes the bytes of every base64 line up to the next section delimiter.
pub fn decode_payload<R: BufRead, W: Write>(
    lines: &mut LineReader<R>,
    output: &mut W,
) -> Result<usize> {
    let mut byte_count = 0;
    loop {
        let line = lines
            .next_line()?
            .ok_or(Error::TruncatedInput("payload section"))?;
        if line.is_section_end() {
            break;
        }

        let encoded = line.text.trim();
        if encoded.is_empty() {
            continue;
        }
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|err| Error::malformed(line.number, format!("invalid base64: {}", err)))?;
        output.write_all(&bytes)?;
        byte_count += bytes.len();
    }
    debug!("decoded {} payload bytes", byte_count);
    Ok(byte_count)
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_writer::LINE_WIDTH;

    /// Hands out one byte per `read` call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7919 % 251) as u8).collect()
    }

    fn with_footer(payload: &[u8]) -> Vec<u8> {
        let mut data = payload.to_vec();
        data.extend_from_slice(&[0x78, 0x56, 0x34, 0x12, 0x10, 0, 0, 0]);
        data
    }

    fn encode(input: impl Read) -> Result<(String, GzipFooter)> {
        let mut input = input;
        let mut output: Vec<u8> = vec![];
        let footer = encode_payload(&mut input, &mut output)?;
        Ok((String::from_utf8(output).unwrap(), footer))
    }

    #[test]
    fn chunk_boundaries() -> Result<()> {
        let expected_footer = GzipFooter {
            data_crc32: 0x12345678,
            data_size: 16,
        };
        for len in [
            0,
            1,
            CHUNK_SIZE - FOOTER_SIZE - 1,
            CHUNK_SIZE - FOOTER_SIZE,
            CHUNK_SIZE - FOOTER_SIZE + 1,
            CHUNK_SIZE,
            2 * CHUNK_SIZE - FOOTER_SIZE,
            2 * CHUNK_SIZE,
            3 * CHUNK_SIZE + 123,
        ] {
            let payload = sample(len);
            let input = with_footer(&payload);

            let (text, footer) = encode(input.as_slice())?;
            assert_eq!(footer, expected_footer, "len {}", len);
            let joined: String = text.lines().collect();
            assert_eq!(joined, STANDARD.encode(&payload), "len {}", len);
            assert!(text.lines().all(|line| line.len() <= LINE_WIDTH));

            assert_eq!(encode(Trickle(&input))?, (text, footer), "len {}", len);
        }
        Ok(())
    }

    #[test]
    fn footer_only() -> Result<()> {
        let (text, footer) = encode(&[1u8, 0, 0, 0, 2, 0, 0, 0][..])?;
        assert_eq!(text, "");
        assert_eq!(
            footer,
            GzipFooter {
                data_crc32: 1,
                data_size: 2
            }
        );
        Ok(())
    }

    #[test]
    fn shorter_than_footer() {
        assert!(matches!(
            encode(&[1u8, 2, 3, 4, 5, 6, 7][..]),
            Err(Error::TruncatedInput("footer"))
        ));
        assert!(matches!(
            encode(io::empty()),
            Err(Error::TruncatedInput("footer"))
        ));
    }

    #[test]
    fn decode_until_delimiter() -> Result<()> {
        let payload = sample(200);
        let (text, _) = encode(with_footer(&payload).as_slice())?;
        let document = format!("{}\n----\ncrc32 = 1\n", text);

        let mut lines = LineReader::new(document.as_bytes());
        let mut output: Vec<u8> = vec![];
        assert_eq!(decode_payload(&mut lines, &mut output)?, payload.len());
        assert_eq!(output, payload);
        assert_eq!(lines.next_line()?.unwrap().text, "crc32 = 1");
        Ok(())
    }

    #[test]
    fn decode_errors() {
        let mut output: Vec<u8> = vec![];

        let mut lines = LineReader::new("AAAA\nnot base64!\n----\n".as_bytes());
        assert!(matches!(
            decode_payload(&mut lines, &mut output),
            Err(Error::MalformedText { line: 2, .. })
        ));

        let mut lines = LineReader::new("AAAA\n".as_bytes());
        assert!(matches!(
            decode_payload(&mut lines, &mut output),
            Err(Error::TruncatedInput("payload section"))
        ));
    }
}
