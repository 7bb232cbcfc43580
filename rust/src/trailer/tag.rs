//! Size tag written into the `encrypt` field. Despite the field name this is
//! not encryption: the tag is `size * key + bias` rendered in decimal and cut
//! to ten characters.

use std::fmt::{self, Display};

use thiserror::Error;

use super::layout::FIELD_LEN;

/// Number of characters in a tag.
pub const TAG_LEN: usize = FIELD_LEN;

/// Multiplier applied to the file size.
pub const DEFAULT_KEY: u64 = 3589;

/// Offset added after multiplying. Keeps every tag at ten digits or more.
pub const DEFAULT_BIAS: u64 = 1_000_000_000;

/// Smallest bias that guarantees a full-width tag.
pub const MIN_BIAS: u64 = 1_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("file size {size} is too large to derive a tag")]
    Overflow { size: u64 },
    #[error("derived value {value} has fewer than ten digits")]
    TooShort { value: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag([u8; TAG_LEN]);

impl Tag {
    pub fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Built only from ASCII digits.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives the tag for a file of `size` bytes.
///
/// Values wider than ten digits are truncated, not rounded, which is what
/// readers of the format compare against. Arithmetic overflow is refused
/// instead of wrapping.
pub fn compute_tag(size: u64, key: u64, bias: u64) -> Result<Tag, TagError> {
    let value = size
        .checked_mul(key)
        .and_then(|product| product.checked_add(bias))
        .ok_or(TagError::Overflow { size })?;

    let digits = value.to_string();
    if digits.len() < TAG_LEN {
        return Err(TagError::TooShort { value });
    }

    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&digits.as_bytes()[..TAG_LEN]);
    Ok(Tag(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_tag(size: u64) -> Result<Tag, TagError> {
        compute_tag(size, DEFAULT_KEY, DEFAULT_BIAS)
    }

    #[test]
    fn empty_file_yields_bias() {
        assert_eq!(default_tag(0).unwrap().as_str(), "1000000000");
    }

    #[test]
    fn small_sizes_stay_ten_digits() {
        // 1024 * 3589 + 1_000_000_000 = 1_003_675_136
        assert_eq!(default_tag(1024).unwrap().as_str(), "1003675136");
    }

    #[test]
    fn wide_values_are_truncated() {
        // 2_000_000_000 * 3589 + 1_000_000_000 = 7_179_000_000_000
        assert_eq!(default_tag(2_000_000_000).unwrap().as_str(), "7179000000");
        // 3_000_000_000 * 3589 + 1_000_000_000 = 10_768_000_000_000
        assert_eq!(default_tag(3_000_000_000).unwrap().as_str(), "1076800000");
    }

    #[test]
    fn same_size_same_tag() {
        let first = default_tag(123_456_789).unwrap();
        let second = default_tag(123_456_789).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, default_tag(123_456_790).unwrap());
    }

    #[test]
    fn overflow_is_rejected() {
        assert_eq!(
            default_tag(u64::MAX / 2),
            Err(TagError::Overflow { size: u64::MAX / 2 })
        );
        assert!(compute_tag(u64::MAX - 1, 1, 2).is_err());
    }

    #[test]
    fn short_values_are_rejected() {
        assert_eq!(
            compute_tag(10, 1, 5),
            Err(TagError::TooShort { value: 15 })
        );
    }

    #[test]
    fn display_matches_bytes() {
        let tag = default_tag(42).unwrap();
        assert_eq!(tag.to_string().as_bytes(), tag.as_bytes());
    }
}
