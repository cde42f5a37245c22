use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{PipelineName, PipelineSpec};
use crate::error::IngestError;

pub const DEFAULT_CACHE_DIRNAME: &str = ".cache";

/// The cache root and every path the pipelines derive from it.
#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    /// Resolves `cache_root` (default `.cache`) against the current directory.
    pub fn new(cache_root: Option<&Utf8Path>) -> Result<Self, IngestError> {
        let relative = cache_root.unwrap_or(Utf8Path::new(DEFAULT_CACHE_DIRNAME));
        let absolute = std::path::absolute(relative.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("resolve {relative}: {err}")))?;
        let cache_root = Utf8PathBuf::from_path_buf(absolute)
            .map_err(|_| IngestError::Filesystem("invalid cache root path".to_string()))?;
        Ok(Self { cache_root })
    }

    pub fn new_with_root(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn pipeline_dir(&self, name: PipelineName) -> Utf8PathBuf {
        self.cache_root.join(name.as_str())
    }

    pub fn archive_path(&self, spec: &PipelineSpec) -> Utf8PathBuf {
        self.pipeline_dir(spec.name).join(&spec.archive_filename)
    }

    pub fn raw_dir(&self, spec: &PipelineSpec) -> Utf8PathBuf {
        self.pipeline_dir(spec.name).join(&spec.raw_dirname)
    }

    pub fn extraction_root(&self, spec: &PipelineSpec) -> Utf8PathBuf {
        self.raw_dir(spec).join(&spec.extract.root)
    }

    pub fn generated_path(&self, spec: &PipelineSpec, filename: &str) -> Utf8PathBuf {
        self.pipeline_dir(spec.name).join(filename)
    }

    pub fn provenance_path(&self, spec: &PipelineSpec) -> Utf8PathBuf {
        self.pipeline_dir(spec.name).join(&spec.provenance_filename)
    }

    pub fn ensure_pipeline_dir(&self, name: PipelineName) -> Result<Utf8PathBuf, IngestError> {
        let dir = self.pipeline_dir(name);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(dir)
    }

    pub fn clear_pipeline(&self, name: PipelineName) -> Result<bool, IngestError> {
        let dir = self.pipeline_dir(name);
        if !dir.as_std_path().exists() {
            return Ok(false);
        }
        fs::remove_dir_all(dir.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("remove {dir}: {err}")))?;
        Ok(true)
    }

    pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), IngestError> {
        Self::write_bytes_atomic(path, to_canonical_json(value)?.as_bytes())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), IngestError> {
        let parent = path
            .parent()
            .ok_or_else(|| IngestError::Filesystem(format!("invalid destination {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".zum-ingest")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        std::io::Write::write_all(temp.as_file_mut(), content)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("write {path}: {}", err.error)))?;
        Ok(())
    }
}

/// Pretty JSON with sorted keys at every level and a trailing newline.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, IngestError> {
    // serde_json's Map is a BTreeMap, so routing through Value sorts keys.
    let value =
        serde_json::to_value(value).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    let mut json = serde_json::to_string_pretty(&value)
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    json.push('\n');
    Ok(json)
}
