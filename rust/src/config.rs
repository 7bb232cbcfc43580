//! Profile loader. A profile carries the constants the trailer codec runs
//! with; the built-in default matches QNAP packages, and a JSON file can
//! override any subset of it.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::trailer::layout::FIELD_LEN;
use crate::trailer::tag::{DEFAULT_BIAS, DEFAULT_KEY, MIN_BIAS};

/// Marker closing a regular QPKG package.
pub const QPKG_MAGIC: &str = "QNAPQPKG";

/// Marker closing a QFIX hotfix package.
pub const QFIX_MAGIC: &str = "QNAPQFIX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile unreadable: {0}")]
    Io(String),
    #[error("profile parse failed: {0}")]
    Parse(String),
    #[error("invalid profile: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    /// Used in diagnostics, e.g. "Invalid QPKG format".
    #[serde(rename = "formatName")]
    pub format_name: String,
    /// Accepted end-of-file markers, compared over their own length.
    #[serde(rename = "magicTokens")]
    pub magic_tokens: Vec<String>,
    pub key: u64,
    pub bias: u64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            format_name: "QPKG".to_string(),
            magic_tokens: vec![QPKG_MAGIC.to_string(), QFIX_MAGIC.to_string()],
            key: DEFAULT_KEY,
            bias: DEFAULT_BIAS,
        }
    }
}

impl Profile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.magic_tokens.is_empty() {
            return Err(ConfigError::Invalid("at least one magic token is required".into()));
        }
        for token in &self.magic_tokens {
            if token.is_empty() || token.len() > FIELD_LEN {
                return Err(ConfigError::Invalid(format!(
                    "magic token {token:?} must be 1 to {FIELD_LEN} bytes"
                )));
            }
        }
        if self.bias < MIN_BIAS {
            return Err(ConfigError::Invalid(format!(
                "bias {} is below {MIN_BIAS}; tags would be short",
                self.bias
            )));
        }
        Ok(())
    }
}

/// Reads a JSON profile and validates it. Keys left out keep their
/// default values.
pub fn load_profile(path: impl AsRef<Path>) -> Result<Profile, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
    let profile: Profile =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;
    profile.validate()?;
    Ok(profile)
}
