//! Audit manifest of everything a pipeline run downloaded, extracted or
//! generated.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::PipelineName;
use crate::error::IngestError;
use crate::store::to_canonical_json;
use crate::verify::sha256_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Download,
    Extract,
    Generated,
}

/// What was found at `dst` when the record was taken. Directories carry no
/// size or hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Content {
    File { bytes: u64, sha256: String },
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFile {
    pub src: String,
    pub dst: String,
    pub method: Method,
    #[serde(flatten)]
    pub content: Content,
}

/// Builds a record for `dst`, which must exist right now.
pub fn artifact_record(
    src: impl Into<String>,
    dst: &Utf8Path,
    method: Method,
) -> Result<CachedFile, IngestError> {
    let metadata = dst
        .as_std_path()
        .metadata()
        .map_err(|_| IngestError::NotFound(dst.to_path_buf()))?;
    let content = if metadata.is_dir() {
        Content::Directory
    } else {
        Content::File {
            bytes: metadata.len(),
            sha256: sha256_file(dst)?,
        }
    };
    Ok(CachedFile {
        src: src.into(),
        dst: dst.to_string(),
        method,
        content,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub pipeline: PipelineName,
    pub created_at: String,
    pub cache_root: String,
    pub files: Vec<CachedFile>,
}

impl ProvenanceRecord {
    pub fn new(pipeline: PipelineName, cache_root: &Utf8Path, files: Vec<CachedFile>) -> Self {
        Self {
            pipeline,
            created_at: iso_timestamp(),
            cache_root: cache_root.to_string(),
            files,
        }
    }

    pub fn to_canonical_json(&self) -> Result<String, IngestError> {
        to_canonical_json(self)
    }

    /// Create-or-overwrite. Not atomic: this is the last step of a run and a
    /// failure here surfaces directly to the caller.
    pub fn write(&self, path: &Utf8Path) -> Result<(), IngestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| IngestError::Filesystem(format!("create {parent}: {err}")))?;
        }
        fs::write(path.as_std_path(), self.to_canonical_json()?)
            .map_err(|err| IngestError::Filesystem(format!("write {path}: {err}")))
    }

    pub fn read(path: &Utf8Path) -> Result<Self, IngestError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| IngestError::NotFound(path.to_path_buf()))?;
        serde_json::from_str(&content)
            .map_err(|err| IngestError::Filesystem(format!("parse {path}: {err}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Ok,
    Missing,
    Modified,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Ok => "ok",
            AuditStatus::Missing => "missing",
            AuditStatus::Modified => "modified",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub dst: String,
    pub method: Method,
    pub status: AuditStatus,
}

/// Re-checks every recorded artifact against what is on disk now.
pub fn audit(record: &ProvenanceRecord) -> Result<Vec<AuditEntry>, IngestError> {
    record
        .files
        .iter()
        .map(|file| -> Result<AuditEntry, IngestError> {
            let path = Utf8PathBuf::from(&file.dst);
            let status = match (&file.content, path.as_std_path().metadata()) {
                (_, Err(_)) => AuditStatus::Missing,
                (Content::Directory, Ok(meta)) if meta.is_dir() => AuditStatus::Ok,
                (Content::Directory, Ok(_)) => AuditStatus::Modified,
                (Content::File { bytes, sha256 }, Ok(meta)) => {
                    if meta.is_file() && meta.len() == *bytes && sha256_file(&path)? == *sha256 {
                        AuditStatus::Ok
                    } else {
                        AuditStatus::Modified
                    }
                }
            };
            Ok(AuditEntry {
                dst: file.dst.clone(),
                method: file.method,
                status,
            })
        })
        .collect()
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}
