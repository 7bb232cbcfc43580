//! Command-line surface. Parsing, error-to-exit-code mapping, and the three
//! run modes (tag, `--info`, `--verify`) live here so they can be tested
//! without spawning the binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, CommandFactory, Parser};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::config::{load_profile, ConfigError, Profile};
use crate::trailer::{
    compute_tag, inspect, seal, sha256_file, verify, ErrorKind, SealReport, TrailerError,
    Verification,
};

#[derive(Debug, Parser)]
#[command(
    name = "qpkg_encrypt",
    version,
    about = "Write the size tag into a QPKG trailer",
    after_help = "Put `--` before a filename that starts with `-`."
)]
pub struct Cli {
    /// Package file to update (`-- <FILENAME>` if it starts with `-`)
    pub filename: PathBuf,

    /// Print the parsed trailer as JSON instead of writing the tag
    #[arg(long, conflicts_with = "verify")]
    pub info: bool,

    /// Check the stored tag against the file size instead of writing it
    #[arg(long)]
    pub verify: bool,

    /// JSON profile overriding format name, magic tokens, key, and bias
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{path}: {source}")]
    NotFound { path: String, source: io::Error },
    #[error("{path}: Invalid {format} format")]
    Invalid {
        path: String,
        format: String,
        source: TrailerError,
    },
    #[error("{path}: Invalid {format} format")]
    Io {
        path: String,
        format: String,
        source: TrailerError,
    },
    #[error("{path}: stored tag {stored:?} does not match expected {expected}")]
    TagMismatch {
        path: String,
        stored: String,
        expected: String,
    },
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 1,
            AppError::NotFound { .. } => 2,
            AppError::Invalid { .. } | AppError::Io { .. } => 3,
            AppError::TagMismatch { .. } => 4,
        }
    }

    fn from_trailer(path: &Path, profile: &Profile, source: TrailerError) -> Self {
        let path = path.display().to_string();
        match source.kind() {
            ErrorKind::Format => AppError::Invalid {
                path,
                format: profile.format_name.clone(),
                source,
            },
            ErrorKind::Io => {
                warn!(path = %path, error = %source, "package update failed");
                AppError::Io {
                    path,
                    format: profile.format_name.clone(),
                    source,
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Sealed(SealReport),
    Info(serde_json::Value),
    Verified(Verification),
}

/// Exit code for malformed invocations.
pub const USAGE_EXIT: u8 = 1;

/// One-line usage text printed on bad invocations.
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}

/// Runs the mode selected by `cli` against its target file.
pub fn execute(cli: &Cli) -> Result<Outcome, AppError> {
    let profile = match &cli.profile {
        Some(path) => load_profile(path)?,
        None => Profile::default(),
    };

    let path = cli.filename.as_path();
    if let Err(source) = fs::metadata(path) {
        return Err(AppError::NotFound {
            path: path.display().to_string(),
            source,
        });
    }

    let wrap = |source: TrailerError| AppError::from_trailer(path, &profile, source);

    if cli.info {
        let inspection = inspect(path, &profile).map_err(wrap)?;
        let expected = compute_tag(inspection.size, profile.key, profile.bias)
            .map_err(|e| wrap(e.into()))?;
        let digest = sha256_file(path).map_err(wrap)?;
        return Ok(Outcome::Info(json!({
            "file": path.display().to_string(),
            "size": inspection.size,
            "magic": inspection.magic,
            "fields": inspection.fields,
            "expectedTag": expected.to_string(),
            "sha256": digest,
        })));
    }

    if cli.verify {
        let verification = verify(path, &profile).map_err(wrap)?;
        if !verification.matches() {
            return Err(AppError::TagMismatch {
                path: path.display().to_string(),
                stored: verification.stored,
                expected: verification.expected.to_string(),
            });
        }
        return Ok(Outcome::Verified(verification));
    }

    seal(path, &profile).map(Outcome::Sealed).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trailer::Field;
    use tempfile::{tempdir, NamedTempFile};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("qpkg_encrypt").chain(args.iter().copied()))
    }

    fn package(magic: &[u8]) -> NamedTempFile {
        let mut bytes = vec![0u8; 300];
        let len = bytes.len();
        bytes[len - 10..len - 10 + magic.len()].copy_from_slice(magic);
        bytes[len - 40..len - 35].copy_from_slice(b"Plex1");
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), bytes).unwrap();
        file
    }

    fn cli_for(path: &Path) -> Cli {
        parse(&[path.to_str().unwrap()]).unwrap()
    }

    #[test]
    fn positional_count_is_enforced() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.qpkg", "b.qpkg"]).is_err());
        let cli = parse(&["a.qpkg"]).unwrap();
        assert_eq!(cli.filename, PathBuf::from("a.qpkg"));
        assert!(!cli.info && !cli.verify);
    }

    #[test]
    fn info_and_verify_conflict() {
        assert!(parse(&["--info", "--verify", "a.qpkg"]).is_err());
    }

    #[test]
    fn verbosity_counts() {
        assert_eq!(parse(&["-vv", "a.qpkg"]).unwrap().verbose, 2);
    }

    #[test]
    fn usage_names_the_binary() {
        assert!(usage().contains("qpkg_encrypt"));
    }

    #[test]
    fn leading_dash_filename_after_separator() {
        assert!(parse(&["-pkg.qpkg"]).is_err());
        let cli = parse(&["--", "-pkg.qpkg"]).unwrap();
        assert_eq!(cli.filename, PathBuf::from("-pkg.qpkg"));
    }

    #[test]
    fn update_failure_reports_invalid_format() {
        let source = TrailerError::Open {
            path: "busy.qpkg".to_string(),
            source: io::Error::from_raw_os_error(26),
        };
        let err = AppError::from_trailer(Path::new("busy.qpkg"), &Profile::default(), source);
        assert!(matches!(err, AppError::Io { .. }));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "busy.qpkg: Invalid QPKG format");
    }

    #[test]
    fn missing_file_exits_two() {
        let dir = tempdir().unwrap();
        let cli = cli_for(&dir.path().join("nope.qpkg"));
        let err = execute(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("nope.qpkg: "));
    }

    #[test]
    fn invalid_package_exits_three() {
        let file = package(b"NOTAQPKG");
        let err = execute(&cli_for(file.path())).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.to_string(),
            format!("{}: Invalid QPKG format", file.path().display())
        );
    }

    #[test]
    fn valid_package_is_sealed() {
        let file = package(b"QNAPQPKG");
        match execute(&cli_for(file.path())).unwrap() {
            Outcome::Sealed(report) => assert_eq!(report.tag.as_str(), "1001076700"),
            other => panic!("unexpected outcome {other:?}"),
        }
        let bytes = fs::read(file.path()).unwrap();
        let start = bytes.len() - Field::Encrypt.spec().offset.unsigned_abs() as usize;
        assert_eq!(&bytes[start..start + 10], b"1001076700");
    }

    #[test]
    fn verify_reports_mismatch_then_match() {
        let file = package(b"QNAPQFIX");
        let path = file.path().to_str().unwrap();

        let err = execute(&parse(&["--verify", path]).unwrap()).unwrap_err();
        assert_eq!(err.exit_code(), 4);

        execute(&cli_for(file.path())).unwrap();
        assert!(matches!(
            execute(&parse(&["--verify", path]).unwrap()).unwrap(),
            Outcome::Verified(_)
        ));
    }

    #[test]
    fn info_does_not_write() {
        let file = package(b"QNAPQPKG");
        let before = fs::read(file.path()).unwrap();
        let path = file.path().to_str().unwrap();

        match execute(&parse(&["--info", path]).unwrap()).unwrap() {
            Outcome::Info(value) => {
                assert_eq!(value["size"], 300);
                assert_eq!(value["magic"], "QNAPQPKG");
                assert_eq!(value["fields"]["name"], "Plex1");
                assert_eq!(value["expectedTag"], "1001076700");
                assert_eq!(value["sha256"].as_str().unwrap().len(), 64);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(fs::read(file.path()).unwrap(), before);
    }

    #[test]
    fn bad_profile_exits_one() {
        let file = package(b"QNAPQPKG");
        let profile = NamedTempFile::new().unwrap();
        fs::write(profile.path(), "{ not json").unwrap();

        let cli = parse(&[
            "--profile",
            profile.path().to_str().unwrap(),
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        let err = execute(&cli).unwrap_err();
        assert_eq!(err.exit_code(), USAGE_EXIT);
    }

    #[test]
    fn profile_format_name_in_message() {
        let file = package(b"QNAPQPKG");
        let profile = NamedTempFile::new().unwrap();
        fs::write(
            profile.path(),
            r#"{ "formatName": "QFIX", "magicTokens": ["QNAPQFIX"] }"#,
        )
        .unwrap();

        let cli = parse(&[
            "--profile",
            profile.path().to_str().unwrap(),
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        let err = execute(&cli).unwrap_err();
        assert!(err.to_string().ends_with("Invalid QFIX format"));
    }
}
