#![forbid(unsafe_code)]

use std::io::{self, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use crc::{Crc, CRC_32_ISO_HDLC};
use thiserror::Error;

use crate::error::RangeError;

////////////////////////////////////////////////////////////////////////////////

static CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    U8,
    U16,
    U32,
}

impl Width {
    pub fn bits(self) -> u32 {
        match self {
            Width::U8 => 8,
            Width::U16 => 16,
            Width::U32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }
}

/// Checks that `value` fits in an unsigned integer of `bits` bits (at most 32).
pub fn check_width(bits: u32, value: u64) -> Result<u32, RangeError> {
    if bits > 32 || value >> bits != 0 {
        return Err(RangeError { value, bits });
    }
    Ok(value as u32)
}

pub fn read_uint<R: Read>(reader: &mut R, width: Width) -> io::Result<u32> {
    match width {
        Width::U8 => reader.read_u8().map(u32::from),
        Width::U16 => reader.read_u16::<LittleEndian>().map(u32::from),
        Width::U32 => reader.read_u32::<LittleEndian>(),
    }
}

pub fn write_uint(width: Width, value: u64) -> Result<Vec<u8>, RangeError> {
    let value = check_width(width.bits(), value)?;
    let mut bytes = vec![0; width.bytes()];
    match width {
        Width::U8 => bytes[0] = value as u8,
        Width::U16 => LittleEndian::write_u16(&mut bytes, value as u16),
        Width::U32 => LittleEndian::write_u32(&mut bytes, value),
    }
    Ok(bytes)
}

/// Low 16 bits of the CRC-32 of `bytes`, as stored in the FHCRC header field.
pub fn crc16(bytes: &[u8]) -> u16 {
    (CRC.checksum(bytes) & 0xffff) as u16
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LiteralError {
    #[error("value is not enclosed in double quotes")]
    NotQuoted,
    #[error("invalid hex byte `{0}`")]
    InvalidHex(String),
}

fn strip_quotes(literal: &str) -> Result<&str, LiteralError> {
    literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or(LiteralError::NotQuoted)
}

pub fn quote_string(value: &str) -> String {
    format!("\"{}\"", value)
}

/// Strips the surrounding quotes. Backslashes are dropped, not interpreted.
pub fn unquote_string(literal: &str) -> Result<String, LiteralError> {
    Ok(strip_quotes(literal)?
        .chars()
        .filter(|&c| c != '\\')
        .collect())
}

pub fn quote_hex(bytes: &[u8]) -> String {
    let pairs: Vec<String> = bytes.iter().map(|byte| format!("{:02x}", byte)).collect();
    quote_string(&pairs.join(" "))
}

pub fn unquote_hex(literal: &str) -> Result<Vec<u8>, LiteralError> {
    let mut bytes: Vec<u8> = vec![];
    for token in strip_quotes(literal)?.split_whitespace() {
        if token.len() % 2 != 0 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LiteralError::InvalidHex(token.to_owned()));
        }
        for i in (0..token.len()).step_by(2) {
            let pair = &token[i..i + 2];
            let byte = u8::from_str_radix(pair, 16)
                .map_err(|_| LiteralError::InvalidHex(pair.to_owned()))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}

////////////////////////////////////////////////////////////////////////////////

/// Encodes `value` one byte per character, failing on the first character above U+00FF.
pub fn latin1_encode(value: &str) -> Result<Vec<u8>, char> {
    value.chars().map(|c| u8::try_from(c).map_err(|_| c)).collect()
}

pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

////////////////////////////////////////////////////////////////////////////////
