use std::fs;
use std::path::{Component, Path};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{
    ArchiveFormat, DEFAULT_PROVENANCE_FILENAME, DEFAULT_RAW_DIRNAME, DEFAULT_TIMEOUT, DownloadSpec,
    ExtractSpec, GeneratedMetadata, PipelineName, PipelineSpec, default_user_agent,
};
use crate::error::IngestError;
use crate::layout::ExpectedLayout;
use crate::verify::VerificationSpec;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pipeline: Option<PipelineTable>,
    #[serde(default)]
    pub paths: Option<PathsTable>,
    #[serde(default)]
    pub download: Option<DownloadTable>,
    #[serde(default)]
    pub extract: Option<ExtractTable>,
    #[serde(default)]
    pub layout: LayoutTable,
    #[serde(default)]
    pub generated: Vec<GeneratedTable>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineTable {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathsTable {
    pub archive: Option<String>,
    pub raw_dir: Option<String>,
    pub provenance: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadTable {
    pub url: Option<String>,
    pub sha256: Option<String>,
    pub md5: Option<String>,
    pub min_bytes: Option<u64>,
    pub max_bytes: Option<u64>,
    pub user_agent: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub retries: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractTable {
    pub format: Option<ArchiveFormat>,
    pub root: Option<String>,
    pub sentinel: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutTable {
    #[serde(default)]
    pub dirs: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedTable {
    pub filename: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads a pipeline config and checks it describes `expected`.
    pub fn load(path: &Path, expected: PipelineName) -> Result<PipelineSpec, IngestError> {
        if !path.exists() {
            return Err(IngestError::ConfigRead(path.to_path_buf()));
        }
        let content =
            fs::read_to_string(path).map_err(|_| IngestError::ConfigRead(path.to_path_buf()))?;
        Self::parse(&content, path, expected)
    }

    pub fn parse(
        content: &str,
        path: &Path,
        expected: PipelineName,
    ) -> Result<PipelineSpec, IngestError> {
        let config: Config = toml::from_str(content).map_err(|err| IngestError::ConfigParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::resolve_config(config, path, expected)
    }

    pub fn resolve_config(
        config: Config,
        path: &Path,
        expected: PipelineName,
    ) -> Result<PipelineSpec, IngestError> {
        let ctx = Ctx { path };

        let pipeline = config.pipeline.unwrap_or_default();
        let found = ctx.require(pipeline.name, "name", "pipeline")?;
        if found != expected.as_str() {
            return Err(IngestError::PipelineMismatch {
                expected: expected.to_string(),
                found,
            });
        }

        let paths = config.paths.unwrap_or_default();
        let archive_filename =
            ctx.file_name(ctx.require(paths.archive, "archive", "paths")?, "archive")?;
        let raw_dirname = ctx.file_name(
            paths
                .raw_dir
                .unwrap_or_else(|| DEFAULT_RAW_DIRNAME.to_string()),
            "raw_dir",
        )?;
        let provenance_filename = ctx.file_name(
            paths
                .provenance
                .unwrap_or_else(|| DEFAULT_PROVENANCE_FILENAME.to_string()),
            "provenance",
        )?;

        let download = ctx.download(config.download.unwrap_or_default())?;

        let extract = config.extract.unwrap_or_default();
        let format = extract.format.ok_or_else(|| ctx.missing("format", "extract"))?;
        let root = ctx.relative_path(ctx.require(extract.root, "root", "extract")?, "root")?;
        let sentinel =
            ctx.relative_path(ctx.require(extract.sentinel, "sentinel", "extract")?, "sentinel")?;

        for entry in config.layout.dirs.iter().chain(&config.layout.files) {
            ctx.relative_path(entry.clone(), "layout")?;
        }
        let layout = ExpectedLayout::new()
            .with_dirs(config.layout.dirs)
            .with_files(config.layout.files);

        let generated = config
            .generated
            .into_iter()
            .map(|table| {
                let filename = ctx.file_name(
                    ctx.require(table.filename, "filename", "generated")?,
                    "filename",
                )?;
                if table.labels.is_empty() {
                    return Err(ctx.missing("labels", "generated"));
                }
                Ok(GeneratedMetadata::LabelList {
                    filename,
                    labels: table.labels,
                })
            })
            .collect::<Result<Vec<_>, IngestError>>()?;

        Ok(PipelineSpec {
            name: expected,
            archive_filename,
            raw_dirname,
            provenance_filename,
            download,
            extract: ExtractSpec {
                format,
                root,
                sentinel,
            },
            layout,
            generated,
        })
    }
}

struct Ctx<'a> {
    path: &'a Path,
}

impl Ctx<'_> {
    fn missing(&self, key: &str, table: &str) -> IngestError {
        IngestError::Config(format!(
            "missing or invalid '{key}' in [{table}] table in config: {}",
            self.path.display()
        ))
    }

    fn invalid(&self, key: &str, reason: &str) -> IngestError {
        IngestError::Config(format!(
            "invalid '{key}' ({reason}) in config: {}",
            self.path.display()
        ))
    }

    fn require(
        &self,
        value: Option<String>,
        key: &str,
        table: &str,
    ) -> Result<String, IngestError> {
        match value {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(self.missing(key, table)),
        }
    }

    fn file_name(&self, value: String, key: &str) -> Result<String, IngestError> {
        let is_plain = {
            let mut components = Path::new(&value).components();
            matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            )
        };
        if !is_plain {
            return Err(self.invalid(key, "expected a plain file name"));
        }
        Ok(value)
    }

    fn relative_path(&self, value: String, key: &str) -> Result<String, IngestError> {
        let path = Path::new(&value);
        let is_safe = !value.trim().is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !is_safe {
            return Err(self.invalid(key, "expected a relative path without `..`"));
        }
        Ok(value)
    }

    fn digest(
        &self,
        value: Option<String>,
        key: &str,
        len: usize,
    ) -> Result<Option<String>, IngestError> {
        let Some(value) = value else {
            return Ok(None);
        };
        let value = value.trim().to_ascii_lowercase();
        if value.len() != len || !value.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(self.invalid(key, &format!("expected {len} hex characters")));
        }
        Ok(Some(value))
    }

    fn download(&self, table: DownloadTable) -> Result<DownloadSpec, IngestError> {
        let url = self.require(table.url, "url", "download")?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(self.invalid("url", "expected an http(s) URL"));
        }
        if let (Some(min), Some(max)) = (table.min_bytes, table.max_bytes) {
            if min > max {
                return Err(self.invalid("min_bytes", "greater than max_bytes"));
            }
        }
        let timeout = match table.timeout_seconds {
            Some(0) => return Err(self.invalid("timeout_seconds", "must be positive")),
            Some(seconds) => Duration::from_secs(seconds),
            None => DEFAULT_TIMEOUT,
        };
        let user_agent = match table.user_agent {
            Some(value) => self.require(Some(value), "user_agent", "download")?,
            None => default_user_agent(),
        };

        Ok(DownloadSpec {
            url,
            verification: VerificationSpec {
                min_bytes: table.min_bytes,
                max_bytes: table.max_bytes,
                sha256: self.digest(table.sha256, "sha256", 64)?,
                md5: self.digest(table.md5, "md5", 32)?,
            },
            user_agent,
            timeout,
            retries: table.retries.unwrap_or(0),
        })
    }
}
