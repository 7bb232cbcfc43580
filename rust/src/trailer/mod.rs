//! Trailer codec. `layout` owns the field table, `tag` the size-derived
//! value, and `codec` the file I/O that ties them together.

pub mod codec;
pub mod layout;
pub mod tag;

pub use codec::{
    has_magic, inspect, parse_trailer, read_field, seal, sha256_file, verify, write_tag,
    ErrorKind, Inspection, SealReport, TrailerError, Verification,
};
pub use layout::{Field, TrailerFields};
pub use tag::{compute_tag, Tag, TagError};
