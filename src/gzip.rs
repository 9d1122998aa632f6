#![forbid(unsafe_code)]

use std::io::{BufRead, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::*;

use crate::codec::{crc16, latin1_decode, latin1_encode, read_uint, write_uint, Width};
use crate::error::{Error, Result, ValidationError};
use crate::footer::GzipFooter;
use crate::header::{Flags, GzipHeader, ID1, ID2};
use crate::schema::MAX_STRING_LENGTH;

////////////////////////////////////////////////////////////////////////////////

/// Two subfield id bytes and the 16-bit subfield length.
const SUBFIELD_HEADER_SIZE: usize = 4;

pub fn read_gzip_header<R: BufRead>(reader: &mut R) -> Result<GzipHeader> {
    for (offset, expected) in [ID1, ID2].into_iter().enumerate() {
        let found = reader.read_u8().map_err(Error::truncated("magic bytes"))?;
        if found != expected {
            return Err(Error::BadMagic { offset, found });
        }
    }

    let mut header = GzipHeader {
        compression_method: reader
            .read_u8()
            .map_err(Error::truncated("compression method"))?
            .into(),
        ..Default::default()
    };
    debug!("CM:\t{:?}", header.compression_method);

    header.flags = Flags(reader.read_u8().map_err(Error::truncated("flags"))?);
    debug!("FLG:\t{:#010b}", header.flags.0);

    header.modification_time =
        read_uint(reader, Width::U32).map_err(Error::truncated("modification time"))?;
    header.extra_flags = reader.read_u8().map_err(Error::truncated("extra flags"))?;
    header.os = reader.read_u8().map_err(Error::truncated("operating system"))?;
    debug!("MTIME:\t{}", header.modification_time);
    debug!("XFL:\t{}", header.extra_flags);
    debug!("OS:\t{}", header.os);

    if header.flags.has_extra() {
        let (si1, si2, data) = read_extra(reader)?;
        debug!("EXTRA:\t{} {} ({} bytes)", si1, si2, data.len());
        header.extra_subfield_id1 = Some(si1);
        header.extra_subfield_id2 = Some(si2);
        header.extra_data = Some(data);
    }

    if header.flags.has_name() {
        header.name = Some(read_latin1_string(reader, "name")?);
        debug!("NAME:\t{:?}", header.name);
    }

    if header.flags.has_comment() {
        header.comment = Some(read_latin1_string(reader, "comment")?);
        debug!("COMMENT:\t{:?}", header.comment);
    }

    if header.flags.has_crc() {
        let stored = read_uint(reader, Width::U16).map_err(Error::truncated("header crc16"))? as u16;
        let computed = crc16(&encode_fields(&header)?);
        debug!("CRC:\t{:#06x}", stored);
        if stored != computed {
            warn!(
                "header crc16 mismatch: stored {:#06x}, computed {:#06x}",
                stored, computed
            );
        }
        header.header_crc16 = Some(stored);
    }

    Ok(header)
}

fn read_extra<R: Read>(reader: &mut R) -> Result<(u8, u8, Vec<u8>)> {
    let xlen = read_uint(reader, Width::U16).map_err(Error::truncated("extra field length"))? as usize;
    if xlen < SUBFIELD_HEADER_SIZE {
        return Err(Error::UnsupportedExtraField(format!(
            "{} bytes cannot hold a subfield header",
            xlen
        )));
    }

    let si1 = reader.read_u8().map_err(Error::truncated("extra subfield id"))?;
    let si2 = reader.read_u8().map_err(Error::truncated("extra subfield id"))?;
    let len = read_uint(reader, Width::U16).map_err(Error::truncated("extra subfield length"))? as usize;
    if len != xlen - SUBFIELD_HEADER_SIZE {
        return Err(Error::UnsupportedExtraField(format!(
            "subfield length {} does not fill the {} byte extra field, only a single subfield is supported",
            len, xlen
        )));
    }

    let mut data = vec![0; len];
    reader
        .read_exact(&mut data)
        .map_err(Error::truncated("extra subfield data"))?;
    Ok((si1, si2, data))
}

fn read_latin1_string<R: BufRead>(reader: &mut R, what: &'static str) -> Result<String> {
    let mut bytes: Vec<u8> = vec![];
    reader
        .by_ref()
        .take(MAX_STRING_LENGTH as u64 + 1)
        .read_until(0, &mut bytes)?;
    if bytes.pop() != Some(0) {
        return Err(Error::TruncatedInput(what));
    }
    Ok(latin1_decode(&bytes))
}

////////////////////////////////////////////////////////////////////////////////

fn put_uint(bytes: &mut Vec<u8>, width: Width, value: u64, field: &'static str) -> Result<()> {
    let encoded = write_uint(width, value).map_err(|source| Error::Range { field, source })?;
    bytes.extend_from_slice(&encoded);
    Ok(())
}

fn put_latin1(bytes: &mut Vec<u8>, value: &str, field: &'static str) -> Result<()> {
    let encoded =
        latin1_encode(value).map_err(|ch| ValidationError::Unencodable { field, ch })?;
    bytes.extend_from_slice(&encoded);
    bytes.push(0);
    Ok(())
}

/// Serializes every header field that precedes the header CRC-16.
fn encode_fields(header: &GzipHeader) -> Result<Vec<u8>> {
    let mut bytes = vec![
        header.id1,
        header.id2,
        header.compression_method.into(),
        header.flags.0,
    ];
    put_uint(&mut bytes, Width::U32, header.modification_time.into(), "mtime")?;
    bytes.push(header.extra_flags);
    bytes.push(header.os);

    if let (Some(si1), Some(si2), Some(data)) = (
        header.extra_subfield_id1,
        header.extra_subfield_id2,
        &header.extra_data,
    ) {
        let len = data.len() as u64;
        put_uint(&mut bytes, Width::U16, len + SUBFIELD_HEADER_SIZE as u64, "extdata")?;
        bytes.push(si1);
        bytes.push(si2);
        put_uint(&mut bytes, Width::U16, len, "extdata")?;
        bytes.extend_from_slice(data);
    }

    if let Some(name) = &header.name {
        put_latin1(&mut bytes, name, "name")?;
    }

    if let Some(comment) = &header.comment {
        put_latin1(&mut bytes, comment, "comment")?;
    }

    Ok(bytes)
}

pub fn write_gzip_header<W: Write>(writer: &mut W, header: &GzipHeader) -> Result<()> {
    header.validate()?;

    let mut bytes = encode_fields(header)?;
    if header.flags.has_crc() {
        let crc = match header.header_crc16 {
            Some(crc) => crc,
            None => {
                let crc = crc16(&bytes);
                debug!("computed header crc16 {:#06x}", crc);
                crc
            }
        };
        bytes.write_u16::<LittleEndian>(crc)?;
    }

    writer.write_all(&bytes)?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

pub fn read_gzip_footer<R: Read>(reader: &mut R) -> Result<GzipFooter> {
    let data_crc32 = read_uint(reader, Width::U32).map_err(Error::truncated("footer crc32"))?;
    let data_size = read_uint(reader, Width::U32).map_err(Error::truncated("footer isize"))?;
    debug!("CRC32:\t{:#010x}", data_crc32);
    debug!("ISIZE:\t{}", data_size);
    Ok(GzipFooter {
        data_crc32,
        data_size,
    })
}

pub fn write_gzip_footer<W: Write>(writer: &mut W, footer: &GzipFooter) -> Result<()> {
    writer.write_u32::<LittleEndian>(footer.data_crc32)?;
    writer.write_u32::<LittleEndian>(footer.data_size)?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
