use std::fmt;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse TOML config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("config is for pipeline `{found}` but `{expected}` was requested")]
    PipelineMismatch { expected: String, found: String },

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("file not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("file size out of range: {path} ({size} bytes {bound})")]
    SizeOutOfRange {
        path: Utf8PathBuf,
        size: u64,
        bound: SizeBound,
    },

    #[error("{algorithm} mismatch for {path}: {actual} != {expected}")]
    ChecksumMismatch {
        path: Utf8PathBuf,
        algorithm: HashAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("failed to extract {archive}: {message}")]
    Extraction {
        archive: Utf8PathBuf,
        message: String,
    },

    #[error(
        "extraction sanity check failed under {root}; missing: {}",
        .missing.join(", ")
    )]
    StructuralMismatch {
        root: Utf8PathBuf,
        missing: Vec<String>,
    },

    #[error("download request failed: {0}")]
    Http(String),

    #[error("server returned status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("no provenance recorded for pipeline {0}")]
    ProvenanceNotFound(String),
}

impl IngestError {
    /// Errors raised by the integrity verifier.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            IngestError::NotFound(_)
                | IngestError::SizeOutOfRange { .. }
                | IngestError::ChecksumMismatch { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBound {
    Min(u64),
    Max(u64),
}

impl fmt::Display for SizeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeBound::Min(min) => write!(f, "< {min}"),
            SizeBound::Max(max) => write!(f, "> {max}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Md5,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "SHA256"),
            HashAlgorithm::Md5 => write!(f, "MD5"),
        }
    }
}
