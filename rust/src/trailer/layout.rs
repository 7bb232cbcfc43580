//! Fixed layout of the package trailer. Every field lives at a negative
//! offset from end of file; the parser iterates [`TRAILER_LAYOUT`] and the
//! writer looks its target up in the same table.

use serde::Serialize;

/// Width of a regular trailer field.
pub const FIELD_LEN: usize = 10;

/// Width of the package name field.
pub const NAME_LEN: usize = 20;

/// Upper bound for a single field read.
pub const MAX_READ_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Model,
    Reserved,
    AuthEncrypt,
    Encrypt,
    FwVersion,
    Name,
    Version,
    Flag,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Model => "model",
            Field::Reserved => "reserved",
            Field::AuthEncrypt => "auth_encrypt",
            Field::Encrypt => "encrypt",
            Field::FwVersion => "fw_version",
            Field::Name => "name",
            Field::Version => "version",
            Field::Flag => "flag",
        }
    }

    /// Table entry for this field. Variants are declared in table order.
    pub const fn spec(self) -> FieldSpec {
        TRAILER_LAYOUT[self as usize]
    }
}

/// Location of one field: signed offset from end of file plus width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: Field,
    pub offset: i64,
    pub len: usize,
}

pub const TRAILER_LAYOUT: [FieldSpec; 8] = [
    FieldSpec { field: Field::Model, offset: -100, len: FIELD_LEN },
    FieldSpec { field: Field::Reserved, offset: -80, len: FIELD_LEN },
    FieldSpec { field: Field::AuthEncrypt, offset: -70, len: FIELD_LEN },
    FieldSpec { field: Field::Encrypt, offset: -60, len: FIELD_LEN },
    FieldSpec { field: Field::FwVersion, offset: -50, len: FIELD_LEN },
    FieldSpec { field: Field::Name, offset: -40, len: NAME_LEN },
    FieldSpec { field: Field::Version, offset: -20, len: FIELD_LEN },
    FieldSpec { field: Field::Flag, offset: -10, len: FIELD_LEN },
];

/// Decoded trailer. Text is whatever precedes the first NUL of each field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrailerFields {
    pub model: String,
    pub reserved: String,
    pub auth_encrypt: String,
    pub encrypt: String,
    pub fw_version: String,
    pub name: String,
    pub version: String,
    pub flag: String,
}

impl TrailerFields {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Model => &self.model,
            Field::Reserved => &self.reserved,
            Field::AuthEncrypt => &self.auth_encrypt,
            Field::Encrypt => &self.encrypt,
            Field::FwVersion => &self.fw_version,
            Field::Name => &self.name,
            Field::Version => &self.version,
            Field::Flag => &self.flag,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Model => &mut self.model,
            Field::Reserved => &mut self.reserved,
            Field::AuthEncrypt => &mut self.auth_encrypt,
            Field::Encrypt => &mut self.encrypt,
            Field::FwVersion => &mut self.fw_version,
            Field::Name => &mut self.name,
            Field::Version => &mut self.version,
            Field::Flag => &mut self.flag,
        };
        *slot = value;
    }
}

/// Interprets raw field bytes as a NUL-terminated string.
pub fn field_text(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
