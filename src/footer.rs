#![forbid(unsafe_code)]

use crate::schema::{FieldValue, FooterField};

////////////////////////////////////////////////////////////////////////////////

pub const FOOTER_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GzipFooter {
    pub data_crc32: u32,
    /// Uncompressed size modulo 2^32 (ISIZE).
    pub data_size: u32,
}

impl GzipFooter {
    pub fn get(&self, field: FooterField) -> FieldValue {
        match field {
            FooterField::Crc32 => FieldValue::Uint(self.data_crc32),
            FooterField::ISize => FieldValue::Uint(self.data_size),
        }
    }

    pub fn set(&mut self, field: FooterField, value: FieldValue) {
        match (field, value) {
            (FooterField::Crc32, FieldValue::Uint(v)) => self.data_crc32 = v,
            (FooterField::ISize, FieldValue::Uint(v)) => self.data_size = v,
            (field, value) => unreachable!("{:?} cannot hold {:?}", field, value),
        }
    }
}
