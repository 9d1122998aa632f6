#![forbid(unsafe_code)]

//! Field table shared by the binary and text codecs.
//!
//! Every key the text format knows, its value kind and width, and the flag bit
//! that gates its presence are listed here once. Order is the canonical order
//! used when writing.

use std::fmt;

use crate::codec::{quote_hex, quote_string, Width};
use crate::header::{FCOMMENT_OFFSET, FEXTRA_OFFSET, FHCRC_OFFSET, FNAME_OFFSET, FTEXT_OFFSET};

////////////////////////////////////////////////////////////////////////////////

pub const MAX_STRING_LENGTH: usize = 1 << 20;

/// XLEN covers the two subfield ids and the subfield length as well as the data.
pub const MAX_EXTRA_DATA_LENGTH: usize = u16::MAX as usize - 4;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderField {
    Id1,
    Id2,
    Cm,
    FText,
    FHcrc,
    FExtra,
    FName,
    FComment,
    MTime,
    Xfl,
    Os,
    ExtSi1,
    ExtSi2,
    ExtData,
    Name,
    Comment,
    Crc16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FooterField {
    Crc32,
    ISize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// One bit of FLG, written as `0` or `1`.
    Flag(u8),
    Uint(Width),
    Latin1 { max_len: usize },
    Bytes { max_len: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Condition {
    pub flag: &'static str,
    pub offset: u8,
    /// The field may be left out while its flag is set; the writer computes it.
    pub derivable: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec<F> {
    pub field: F,
    pub key: &'static str,
    pub kind: FieldKind,
    pub condition: Option<Condition>,
}

const fn plain<F>(field: F, key: &'static str, kind: FieldKind) -> FieldSpec<F> {
    FieldSpec {
        field,
        key,
        kind,
        condition: None,
    }
}

const fn gated<F>(
    field: F,
    key: &'static str,
    kind: FieldKind,
    flag: &'static str,
    offset: u8,
    derivable: bool,
) -> FieldSpec<F> {
    FieldSpec {
        field,
        key,
        kind,
        condition: Some(Condition {
            flag,
            offset,
            derivable,
        }),
    }
}

pub static HEADER_FIELDS: [FieldSpec<HeaderField>; 17] = [
    plain(HeaderField::Id1, "id1", FieldKind::Uint(Width::U8)),
    plain(HeaderField::Id2, "id2", FieldKind::Uint(Width::U8)),
    plain(HeaderField::Cm, "cm", FieldKind::Uint(Width::U8)),
    plain(HeaderField::FText, "ftext", FieldKind::Flag(FTEXT_OFFSET)),
    plain(HeaderField::FHcrc, "fhcrc", FieldKind::Flag(FHCRC_OFFSET)),
    plain(HeaderField::FExtra, "fextra", FieldKind::Flag(FEXTRA_OFFSET)),
    plain(HeaderField::FName, "fname", FieldKind::Flag(FNAME_OFFSET)),
    plain(HeaderField::FComment, "fcomment", FieldKind::Flag(FCOMMENT_OFFSET)),
    plain(HeaderField::MTime, "mtime", FieldKind::Uint(Width::U32)),
    plain(HeaderField::Xfl, "xfl", FieldKind::Uint(Width::U8)),
    plain(HeaderField::Os, "os", FieldKind::Uint(Width::U8)),
    gated(
        HeaderField::ExtSi1,
        "extsi1",
        FieldKind::Uint(Width::U8),
        "fextra",
        FEXTRA_OFFSET,
        false,
    ),
    gated(
        HeaderField::ExtSi2,
        "extsi2",
        FieldKind::Uint(Width::U8),
        "fextra",
        FEXTRA_OFFSET,
        false,
    ),
    gated(
        HeaderField::ExtData,
        "extdata",
        FieldKind::Bytes {
            max_len: MAX_EXTRA_DATA_LENGTH,
        },
        "fextra",
        FEXTRA_OFFSET,
        false,
    ),
    gated(
        HeaderField::Name,
        "name",
        FieldKind::Latin1 {
            max_len: MAX_STRING_LENGTH,
        },
        "fname",
        FNAME_OFFSET,
        false,
    ),
    gated(
        HeaderField::Comment,
        "comment",
        FieldKind::Latin1 {
            max_len: MAX_STRING_LENGTH,
        },
        "fcomment",
        FCOMMENT_OFFSET,
        false,
    ),
    gated(
        HeaderField::Crc16,
        "crc16",
        FieldKind::Uint(Width::U16),
        "fhcrc",
        FHCRC_OFFSET,
        true,
    ),
];

pub static FOOTER_FIELDS: [FieldSpec<FooterField>; 2] = [
    plain(FooterField::Crc32, "crc32", FieldKind::Uint(Width::U32)),
    plain(FooterField::ISize, "isize", FieldKind::Uint(Width::U32)),
];

pub fn lookup<F>(table: &'static [FieldSpec<F>], key: &str) -> Option<&'static FieldSpec<F>> {
    table.iter().find(|spec| spec.key == key)
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Uint(u32),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Uint(value) => write!(f, "{}", value),
            FieldValue::Text(text) => f.write_str(&quote_string(text)),
            FieldValue::Bytes(bytes) => f.write_str(&quote_hex(bytes)),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
