#![forbid(unsafe_code)]

use crate::codec::latin1_encode;
use crate::error::ValidationError;
use crate::schema::{FieldKind, FieldValue, HeaderField, HEADER_FIELDS};

////////////////////////////////////////////////////////////////////////////////

pub const ID1: u8 = 0x1f;
pub const ID2: u8 = 0x8b;

pub const CM_DEFLATE: u8 = 8;

pub const OS_UNKNOWN: u8 = 255;

pub const FTEXT_OFFSET: u8 = 0;
pub const FHCRC_OFFSET: u8 = 1;
pub const FEXTRA_OFFSET: u8 = 2;
pub const FNAME_OFFSET: u8 = 3;
pub const FCOMMENT_OFFSET: u8 = 4;

const FRESERVED_MASK: u8 = 0b1110_0000;

////////////////////////////////////////////////////////////////////////////////

/// Gzip member header. Optional slots must be filled exactly when their flag bit is set;
/// `validate` is the only place that enforces it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GzipHeader {
    pub id1: u8,
    pub id2: u8,
    pub compression_method: CompressionMethod,
    pub flags: Flags,
    pub modification_time: u32,
    pub extra_flags: u8,
    pub os: u8,
    pub extra_subfield_id1: Option<u8>,
    pub extra_subfield_id2: Option<u8>,
    pub extra_data: Option<Vec<u8>>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub header_crc16: Option<u16>,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            id1: ID1,
            id2: ID2,
            compression_method: CompressionMethod::Deflate,
            flags: Flags::default(),
            modification_time: 0,
            extra_flags: 0,
            os: OS_UNKNOWN,
            extra_subfield_id1: None,
            extra_subfield_id2: None,
            extra_data: None,
            name: None,
            comment: None,
            header_crc16: None,
        }
    }
}

impl GzipHeader {
    pub fn get(&self, field: HeaderField) -> Option<FieldValue> {
        let uint = |value: u8| Some(FieldValue::Uint(value.into()));
        let flag = |offset: u8| Some(FieldValue::Uint(self.flags.bit(offset).into()));
        match field {
            HeaderField::Id1 => uint(self.id1),
            HeaderField::Id2 => uint(self.id2),
            HeaderField::Cm => uint(self.compression_method.into()),
            HeaderField::FText => flag(FTEXT_OFFSET),
            HeaderField::FHcrc => flag(FHCRC_OFFSET),
            HeaderField::FExtra => flag(FEXTRA_OFFSET),
            HeaderField::FName => flag(FNAME_OFFSET),
            HeaderField::FComment => flag(FCOMMENT_OFFSET),
            HeaderField::MTime => Some(FieldValue::Uint(self.modification_time)),
            HeaderField::Xfl => uint(self.extra_flags),
            HeaderField::Os => uint(self.os),
            HeaderField::ExtSi1 => self.extra_subfield_id1.and_then(uint),
            HeaderField::ExtSi2 => self.extra_subfield_id2.and_then(uint),
            HeaderField::ExtData => self.extra_data.clone().map(FieldValue::Bytes),
            HeaderField::Name => self.name.clone().map(FieldValue::Text),
            HeaderField::Comment => self.comment.clone().map(FieldValue::Text),
            HeaderField::Crc16 => self
                .header_crc16
                .map(|crc| FieldValue::Uint(crc.into())),
        }
    }

    /// Stores a value already range-checked against the field's schema entry.
    pub fn set(&mut self, field: HeaderField, value: FieldValue) {
        match (field, value) {
            (HeaderField::Id1, FieldValue::Uint(v)) => self.id1 = v as u8,
            (HeaderField::Id2, FieldValue::Uint(v)) => self.id2 = v as u8,
            (HeaderField::Cm, FieldValue::Uint(v)) => self.compression_method = (v as u8).into(),
            (HeaderField::FText, FieldValue::Uint(v)) => self.flags.set_bit(FTEXT_OFFSET, v != 0),
            (HeaderField::FHcrc, FieldValue::Uint(v)) => self.flags.set_bit(FHCRC_OFFSET, v != 0),
            (HeaderField::FExtra, FieldValue::Uint(v)) => {
                self.flags.set_bit(FEXTRA_OFFSET, v != 0)
            }
            (HeaderField::FName, FieldValue::Uint(v)) => self.flags.set_bit(FNAME_OFFSET, v != 0),
            (HeaderField::FComment, FieldValue::Uint(v)) => {
                self.flags.set_bit(FCOMMENT_OFFSET, v != 0)
            }
            (HeaderField::MTime, FieldValue::Uint(v)) => self.modification_time = v,
            (HeaderField::Xfl, FieldValue::Uint(v)) => self.extra_flags = v as u8,
            (HeaderField::Os, FieldValue::Uint(v)) => self.os = v as u8,
            (HeaderField::ExtSi1, FieldValue::Uint(v)) => self.extra_subfield_id1 = Some(v as u8),
            (HeaderField::ExtSi2, FieldValue::Uint(v)) => self.extra_subfield_id2 = Some(v as u8),
            (HeaderField::ExtData, FieldValue::Bytes(data)) => self.extra_data = Some(data),
            (HeaderField::Name, FieldValue::Text(name)) => self.name = Some(name),
            (HeaderField::Comment, FieldValue::Text(comment)) => self.comment = Some(comment),
            (HeaderField::Crc16, FieldValue::Uint(v)) => self.header_crc16 = Some(v as u16),
            (field, value) => unreachable!("{:?} cannot hold {:?}", field, value),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id1 != ID1 || self.id2 != ID2 {
            return Err(ValidationError::BadMagic {
                id1: self.id1,
                id2: self.id2,
            });
        }
        if let CompressionMethod::Unknown(method) = self.compression_method {
            return Err(ValidationError::UnsupportedMethod(method));
        }
        if self.flags.reserved() != 0 {
            return Err(ValidationError::ReservedFlags(self.flags.reserved()));
        }

        for spec in HEADER_FIELDS.iter() {
            let value = self.get(spec.field);

            if let Some(condition) = spec.condition {
                match (self.flags.bit(condition.offset), value.is_some()) {
                    (true, false) if !condition.derivable => {
                        return Err(ValidationError::MissingField {
                            field: spec.key,
                            flag: condition.flag,
                        });
                    }
                    (false, true) => {
                        return Err(ValidationError::UnexpectedField {
                            field: spec.key,
                            flag: condition.flag,
                        });
                    }
                    _ => {}
                }
            }

            match (spec.kind, value) {
                (FieldKind::Latin1 { max_len }, Some(FieldValue::Text(text))) => {
                    if let Some(ch) = text.chars().find(|&ch| ch == '\0') {
                        return Err(ValidationError::Unencodable { field: spec.key, ch });
                    }
                    if text.contains(['\n', '\r']) {
                        return Err(ValidationError::LineBreak { field: spec.key });
                    }
                    let bytes = latin1_encode(&text)
                        .map_err(|ch| ValidationError::Unencodable { field: spec.key, ch })?;
                    if bytes.len() > max_len {
                        return Err(ValidationError::FieldTooLong {
                            field: spec.key,
                            len: bytes.len(),
                            max: max_len,
                        });
                    }
                }
                (FieldKind::Bytes { max_len }, Some(FieldValue::Bytes(bytes))) => {
                    if bytes.len() > max_len {
                        return Err(ValidationError::FieldTooLong {
                            field: spec.key,
                            len: bytes.len(),
                            max: max_len,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMethod {
    Deflate,
    Unknown(u8),
}

impl From<u8> for CompressionMethod {
    fn from(value: u8) -> Self {
        match value {
            CM_DEFLATE => Self::Deflate,
            x => Self::Unknown(x),
        }
    }
}

impl From<CompressionMethod> for u8 {
    fn from(method: CompressionMethod) -> u8 {
        match method {
            CompressionMethod::Deflate => CM_DEFLATE,
            CompressionMethod::Unknown(x) => x,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(pub u8);

impl Flags {
    pub fn bit(&self, n: u8) -> bool {
        (self.0 >> n) & 1 != 0
    }

    pub fn set_bit(&mut self, n: u8, value: bool) {
        if value {
            self.0 |= 1 << n;
        } else {
            self.0 &= !(1 << n);
        }
    }

    pub fn is_text(&self) -> bool {
        self.bit(FTEXT_OFFSET)
    }

    pub fn has_crc(&self) -> bool {
        self.bit(FHCRC_OFFSET)
    }

    pub fn has_extra(&self) -> bool {
        self.bit(FEXTRA_OFFSET)
    }

    pub fn has_name(&self) -> bool {
        self.bit(FNAME_OFFSET)
    }

    pub fn has_comment(&self) -> bool {
        self.bit(FCOMMENT_OFFSET)
    }

    pub fn reserved(&self) -> u8 {
        self.0 & FRESERVED_MASK
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONAL_FLAGS: [u8; 4] = [FEXTRA_OFFSET, FNAME_OFFSET, FCOMMENT_OFFSET, FHCRC_OFFSET];

    fn header_with_flags(offsets: &[u8]) -> GzipHeader {
        let mut header = GzipHeader::default();
        for &offset in offsets {
            header.flags.set_bit(offset, true);
            match offset {
                FEXTRA_OFFSET => {
                    header.extra_subfield_id1 = Some(b'A');
                    header.extra_subfield_id2 = Some(b'P');
                    header.extra_data = Some(vec![1, 2, 3]);
                }
                FNAME_OFFSET => header.name = Some("hello.txt".to_owned()),
                FCOMMENT_OFFSET => header.comment = Some("caf\u{e9}".to_owned()),
                FHCRC_OFFSET => header.header_crc16 = Some(0x1234),
                _ => unreachable!(),
            }
        }
        header
    }

    fn subsets() -> impl Iterator<Item = Vec<u8>> {
        (0..16u8).map(|mask| {
            OPTIONAL_FLAGS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask >> i & 1 != 0)
                .map(|(_, &offset)| offset)
                .collect()
        })
    }

    #[test]
    fn every_flag_subset_validates() {
        for offsets in subsets() {
            assert_eq!(header_with_flags(&offsets).validate(), Ok(()), "{:?}", offsets);
        }
    }

    #[test]
    fn flag_without_field() {
        for offsets in subsets() {
            for &offset in offsets.iter().filter(|&&o| o != FHCRC_OFFSET) {
                let mut header = header_with_flags(&offsets);
                match offset {
                    FEXTRA_OFFSET => header.extra_data = None,
                    FNAME_OFFSET => header.name = None,
                    FCOMMENT_OFFSET => header.comment = None,
                    _ => unreachable!(),
                }
                assert!(
                    matches!(header.validate(), Err(ValidationError::MissingField { .. })),
                    "{:?} without field {}",
                    offsets,
                    offset
                );
            }
        }
    }

    #[test]
    fn field_without_flag() {
        for offsets in subsets() {
            for &offset in offsets.iter() {
                let mut header = header_with_flags(&offsets);
                header.flags.set_bit(offset, false);
                assert!(
                    matches!(header.validate(), Err(ValidationError::UnexpectedField { .. })),
                    "{:?} without flag {}",
                    offsets,
                    offset
                );
            }
        }
    }

    #[test]
    fn crc16_may_be_left_for_the_writer() {
        let mut header = header_with_flags(&[FHCRC_OFFSET]);
        header.header_crc16 = None;
        assert_eq!(header.validate(), Ok(()));
    }

    #[test]
    fn partial_extra_field() {
        let mut header = header_with_flags(&[FEXTRA_OFFSET]);
        header.extra_subfield_id2 = None;
        assert_eq!(
            header.validate(),
            Err(ValidationError::MissingField {
                field: "extsi2",
                flag: "fextra"
            })
        );
    }

    #[test]
    fn fixed_fields() {
        let header = GzipHeader {
            compression_method: CompressionMethod::Unknown(7),
            ..Default::default()
        };
        assert_eq!(header.validate(), Err(ValidationError::UnsupportedMethod(7)));

        let header = GzipHeader {
            flags: Flags(0b0010_0001),
            ..Default::default()
        };
        assert_eq!(header.validate(), Err(ValidationError::ReservedFlags(0b0010_0000)));

        let header = GzipHeader {
            id2: 0x8c,
            ..Default::default()
        };
        assert_eq!(
            header.validate(),
            Err(ValidationError::BadMagic { id1: 0x1f, id2: 0x8c })
        );
    }

    #[test]
    fn unencodable_strings() {
        let mut header = header_with_flags(&[FNAME_OFFSET]);
        header.name = Some("\u{20ac}.txt".to_owned());
        assert_eq!(
            header.validate(),
            Err(ValidationError::Unencodable {
                field: "name",
                ch: '\u{20ac}'
            })
        );

        header.name = Some("a\0b".to_owned());
        assert!(matches!(
            header.validate(),
            Err(ValidationError::Unencodable { ch: '\0', .. })
        ));
    }

    #[test]
    fn line_breaks_in_strings() {
        let mut header = header_with_flags(&[FCOMMENT_OFFSET]);
        header.comment = Some("line one\nline two".to_owned());
        assert_eq!(
            header.validate(),
            Err(ValidationError::LineBreak { field: "comment" })
        );

        header.comment = Some("dos\r".to_owned());
        assert_eq!(
            header.validate(),
            Err(ValidationError::LineBreak { field: "comment" })
        );
    }

    #[test]
    fn oversized_extra_data() {
        let mut header = header_with_flags(&[FEXTRA_OFFSET]);
        header.extra_data = Some(vec![0; u16::MAX as usize]);
        assert!(matches!(
            header.validate(),
            Err(ValidationError::FieldTooLong { field: "extdata", .. })
        ));
    }

    #[test]
    fn get_and_set() {
        let mut header = GzipHeader::default();
        header.set(HeaderField::FName, FieldValue::Uint(1));
        header.set(HeaderField::Name, FieldValue::Text("x".to_owned()));
        header.set(HeaderField::Cm, FieldValue::Uint(9));
        assert!(header.flags.has_name());
        assert_eq!(header.get(HeaderField::FName), Some(FieldValue::Uint(1)));
        assert_eq!(header.get(HeaderField::Name), Some(FieldValue::Text("x".to_owned())));
        assert_eq!(header.get(HeaderField::Comment), None);
        assert_eq!(header.compression_method, CompressionMethod::Unknown(9));
        assert_eq!(header.get(HeaderField::Os), Some(FieldValue::Uint(255)));
    }
}
