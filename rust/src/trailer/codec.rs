//! File-level trailer operations: field reads, magic detection, trailer
//! parsing, and the in-place tag write. Every call opens and drops its own
//! descriptor, so a failed validation step never holds the file open.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Profile;

use super::layout::{field_text, Field, TrailerFields, FIELD_LEN, MAX_READ_LEN, TRAILER_LAYOUT};
use super::tag::{compute_tag, Tag, TagError};

/// Broad failure classes surfaced to the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is not a valid trailer-bearing package. Nothing was written.
    Format,
    /// Opening, seeking, or writing failed during the mutation phase.
    Io,
}

#[derive(Debug, Error)]
pub enum TrailerError {
    #[error("unable to stat {path}: {source}")]
    Stat { path: String, source: io::Error },
    #[error("{0} is not a regular file")]
    NotRegularFile(String),
    #[error("no accepted magic token at end of file")]
    MissingMagic,
    #[error("trailer field `{field}` unreadable: {source}")]
    Field {
        field: &'static str,
        source: io::Error,
    },
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error("unable to open {path} for update: {source}")]
    Open { path: String, source: io::Error },
    #[error("tag write failed: {0}")]
    Write(io::Error),
    #[error("unable to hash {path}: {source}")]
    Digest { path: String, source: io::Error },
}

impl TrailerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrailerError::Stat { .. }
            | TrailerError::NotRegularFile(_)
            | TrailerError::MissingMagic
            | TrailerError::Field { .. }
            | TrailerError::Tag(_) => ErrorKind::Format,
            TrailerError::Open { .. } | TrailerError::Write(_) | TrailerError::Digest { .. } => {
                ErrorKind::Io
            }
        }
    }
}

/// Result of validating a package without touching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub size: u64,
    pub magic: String,
    pub fields: TrailerFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealReport {
    pub size: u64,
    pub magic: String,
    pub tag: Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub expected: Tag,
    pub stored: String,
}

impl Verification {
    pub fn matches(&self) -> bool {
        self.stored == self.expected.as_str()
    }
}

fn seek_target(offset: i64) -> SeekFrom {
    if offset >= 0 {
        SeekFrom::Start(offset.unsigned_abs())
    } else {
        SeekFrom::End(offset)
    }
}

fn read_raw(path: &Path, offset: i64, length: usize) -> io::Result<Vec<u8>> {
    let len = length.min(MAX_READ_LEN);
    let mut file = File::open(path)?;
    file.seek(seek_target(offset))?;

    let mut buf = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Reads up to `length` bytes (capped at 256) at `offset` and returns them as
/// a NUL-terminated string. Non-negative offsets count from the start of the
/// file, negative ones from the end. Short reads are not an error; seeking
/// before the start of the file is.
pub fn read_field(path: &Path, offset: i64, length: usize) -> io::Result<String> {
    read_raw(path, offset, length).map(|raw| field_text(&raw))
}

/// True when the last ten bytes of the file begin with `magic`.
pub fn has_magic(path: &Path, magic: &str) -> bool {
    let magic = magic.as_bytes();
    if magic.is_empty() || magic.len() > FIELD_LEN {
        return false;
    }

    match read_raw(path, Field::Flag.spec().offset, FIELD_LEN) {
        Ok(raw) => raw.len() >= magic.len() && &raw[..magic.len()] == magic,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "flag window unreadable");
            false
        }
    }
}

/// Reads every field in the layout table. Any failed read fails the whole
/// parse.
pub fn parse_trailer(path: &Path) -> Result<TrailerFields, TrailerError> {
    let mut fields = TrailerFields::default();
    for spec in TRAILER_LAYOUT {
        let text = read_field(path, spec.offset, spec.len).map_err(|source| {
            TrailerError::Field {
                field: spec.field.as_str(),
                source,
            }
        })?;
        fields.set(spec.field, text);
    }
    Ok(fields)
}

/// Validates a package: regular file, accepted magic, readable trailer.
pub fn inspect(path: &Path, profile: &Profile) -> Result<Inspection, TrailerError> {
    let meta = fs::symlink_metadata(path).map_err(|source| TrailerError::Stat {
        path: path.display().to_string(),
        source,
    })?;
    if !meta.file_type().is_file() {
        warn!(path = %path.display(), "refusing non-regular file");
        return Err(TrailerError::NotRegularFile(path.display().to_string()));
    }

    let magic = profile
        .magic_tokens
        .iter()
        .find(|token| has_magic(path, token))
        .cloned()
        .ok_or_else(|| {
            warn!(path = %path.display(), "no accepted magic token");
            TrailerError::MissingMagic
        })?;

    let fields = parse_trailer(path)?;
    debug!(
        path = %path.display(),
        size = meta.len(),
        magic = %magic,
        name = %fields.name,
        version = %fields.version,
        "trailer parsed"
    );

    Ok(Inspection {
        size: meta.len(),
        magic,
        fields,
    })
}

/// Overwrites the `encrypt` field with `tag`. The file is neither created
/// nor truncated; a failure mid-write can leave the field partially updated.
pub fn write_tag(path: &Path, tag: &Tag) -> Result<(), TrailerError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| TrailerError::Open {
            path: path.display().to_string(),
            source,
        })?;

    file.seek(SeekFrom::End(Field::Encrypt.spec().offset))
        .map_err(TrailerError::Write)?;
    file.write_all(tag.as_bytes()).map_err(TrailerError::Write)?;
    file.flush().map_err(TrailerError::Write)?;
    Ok(())
}

/// Validates the package, derives its tag from the current size, and writes
/// it into the trailer.
pub fn seal(path: &Path, profile: &Profile) -> Result<SealReport, TrailerError> {
    let inspection = inspect(path, profile)?;
    let tag = compute_tag(inspection.size, profile.key, profile.bias)?;
    write_tag(path, &tag)?;
    info!(path = %path.display(), size = inspection.size, tag = %tag, "tag written");

    Ok(SealReport {
        size: inspection.size,
        magic: inspection.magic,
        tag,
    })
}

/// Compares the stored tag with the one the current size produces.
pub fn verify(path: &Path, profile: &Profile) -> Result<Verification, TrailerError> {
    let inspection = inspect(path, profile)?;
    let expected = compute_tag(inspection.size, profile.key, profile.bias)?;
    Ok(Verification {
        expected,
        stored: inspection.fields.get(Field::Encrypt).to_string(),
    })
}

/// Streams the file through SHA-256 and returns the lowercase hex digest.
pub fn sha256_file(path: &Path) -> Result<String, TrailerError> {
    let digest_err = |source: io::Error| TrailerError::Digest {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(digest_err)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = reader.read(&mut buffer).map_err(digest_err)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect())
}
