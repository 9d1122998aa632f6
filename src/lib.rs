#![forbid(unsafe_code)]

//! Converts a gzip file into an annotated, editable text document and back.
//!
//! The text form has three sections separated by `----` lines: the header
//! fields as `key = value` lines, the compressed payload as base64, and the
//! footer fields. The payload itself is never decompressed.

use std::io::{BufRead, Write};

use log::*;

pub mod codec;
pub mod error;
pub mod footer;
pub mod gzip;
pub mod header;
pub mod line_reader;
pub mod line_writer;
pub mod payload;
pub mod schema;
pub mod text;

pub use error::{Error, RangeError, Result, ValidationError};
pub use footer::GzipFooter;
pub use header::{CompressionMethod, Flags, GzipHeader};

use crate::line_reader::LineReader;
use crate::text::SECTION_DELIMITER;

/// Binary gzip to annotated text.
pub fn encode<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<()> {
    info!("parsing gzip header");
    let header = gzip::read_gzip_header(&mut input)?;
    header.validate()?;
    text::write_text_header(&mut output, &header)?;
    writeln!(output, "{}", SECTION_DELIMITER)?;

    info!("transcoding payload");
    let footer = payload::encode_payload(&mut input, &mut output)?;
    writeln!(output, "{}", SECTION_DELIMITER)?;

    info!("writing footer");
    text::write_text_footer(&mut output, &footer)?;
    output.flush()?;
    Ok(())
}

/// Annotated text back to binary gzip.
pub fn decode<R: BufRead, W: Write>(input: R, mut output: W) -> Result<()> {
    let mut lines = LineReader::new(input);

    info!("parsing text header");
    let header = text::read_text_header(&mut lines)?;
    header.validate()?;
    gzip::write_gzip_header(&mut output, &header)?;

    info!("transcoding payload");
    payload::decode_payload(&mut lines, &mut output)?;

    info!("parsing text footer");
    let footer = text::read_text_footer(&mut lines)?;
    gzip::write_gzip_footer(&mut output, &footer)?;
    output.flush()?;
    debug!("read {} lines", lines.line_count());
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
