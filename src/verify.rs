//! Streaming file digests and the integrity checks applied to downloads.

use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::{HashAlgorithm, IngestError, SizeBound};

/// Dataset archives run to hundreds of megabytes; hash them in 1 MiB reads.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Optional constraints on a downloaded file. `None` means "not checked".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationSpec {
    pub min_bytes: Option<u64>,
    pub max_bytes: Option<u64>,
    pub sha256: Option<String>,
    pub md5: Option<String>,
}

impl VerificationSpec {
    pub fn is_empty(&self) -> bool {
        self.min_bytes.is_none()
            && self.max_bytes.is_none()
            && self.sha256.is_none()
            && self.md5.is_none()
    }
}

pub fn sha256_file(path: &Utf8Path) -> Result<String, IngestError> {
    digest_file::<Sha256>(path)
}

pub fn md5_file(path: &Utf8Path) -> Result<String, IngestError> {
    digest_file::<Md5>(path)
}

fn digest_file<D: Digest>(path: &Utf8Path) -> Result<String, IngestError> {
    let mut file = File::open(path.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("open {path}: {err}")))?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| IngestError::Filesystem(format!("read {path}: {err}")))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Checks existence, size bounds and any supplied digests, in that order.
pub fn verify_file(path: &Utf8Path, spec: &VerificationSpec) -> Result<(), IngestError> {
    let metadata = match path.as_std_path().metadata() {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(IngestError::NotFound(path.to_path_buf())),
    };

    let size = metadata.len();
    if let Some(min) = spec.min_bytes {
        if size < min {
            return Err(IngestError::SizeOutOfRange {
                path: path.to_path_buf(),
                size,
                bound: SizeBound::Min(min),
            });
        }
    }
    if let Some(max) = spec.max_bytes {
        if size > max {
            return Err(IngestError::SizeOutOfRange {
                path: path.to_path_buf(),
                size,
                bound: SizeBound::Max(max),
            });
        }
    }

    if let Some(expected) = &spec.sha256 {
        check_digest(path, HashAlgorithm::Sha256, expected, sha256_file(path)?)?;
    }
    if let Some(expected) = &spec.md5 {
        check_digest(path, HashAlgorithm::Md5, expected, md5_file(path)?)?;
    }
    Ok(())
}

fn check_digest(
    path: &Utf8Path,
    algorithm: HashAlgorithm,
    expected: &str,
    actual: String,
) -> Result<(), IngestError> {
    if actual.eq_ignore_ascii_case(expected.trim()) {
        return Ok(());
    }
    Err(IngestError::ChecksumMismatch {
        path: path.to_path_buf(),
        algorithm,
        expected: expected.to_string(),
        actual,
    })
}
