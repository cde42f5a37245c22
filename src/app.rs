use std::time::{Duration, Instant};

use serde::Serialize;

use crate::datasets;
use crate::domain::{PipelineName, PipelineSpec};
use crate::download::{DownloadOutcome, DownloadRequest, download_url};
use crate::error::IngestError;
use crate::fs_util::{ExtractOutcome, extract_archive};
use crate::http::Fetcher;
use crate::layout::ensure_layout;
use crate::provenance::{AuditEntry, AuditStatus, CachedFile, Method, ProvenanceRecord};
use crate::provenance::{artifact_record, audit};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub pipeline: PipelineName,
    pub provenance_path: String,
    pub download: DownloadOutcome,
    pub extraction: ExtractOutcome,
    pub files: Vec<CachedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub cache_root: String,
    pub pipelines: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub pipeline: PipelineName,
    pub cache_dir: String,
    pub provenance_path: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoResult {
    pub pipeline: PipelineName,
    pub provenance_path: String,
    pub created_at: String,
    pub cache_root: String,
    pub intact: bool,
    pub files: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub pipeline: PipelineName,
    pub cleared: bool,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub pipeline: PipelineName,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<F: Fetcher> {
    store: Store,
    fetcher: F,
}

impl<F: Fetcher> App<F> {
    pub fn new(store: Store, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Download, extract, validate, generate and record one dataset.
    ///
    /// Every step must succeed; on any error the previous provenance file,
    /// if there is one, is left untouched.
    pub fn ingest(
        &self,
        spec: &PipelineSpec,
        options: &IngestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<IngestResult, IngestError> {
        let emit = |message: String, elapsed: Option<Duration>| {
            sink.event(ProgressEvent {
                pipeline: spec.name,
                message,
                elapsed,
            })
        };
        let _span = tracing::info_span!("ingest", pipeline = %spec.name).entered();

        self.store.ensure_pipeline_dir(spec.name)?;
        let archive_path = self.store.archive_path(spec);
        let raw_dir = self.store.raw_dir(spec);

        emit(format!("Downloading: {}", spec.download.url), None);
        emit(format!("Cache file: {archive_path}"), None);
        let start = Instant::now();
        let download = download_url(
            &self.fetcher,
            &DownloadRequest {
                url: &spec.download.url,
                destination: &archive_path,
                verification: &spec.download.verification,
                user_agent: &spec.download.user_agent,
                timeout: spec.download.timeout,
                force: options.force,
            },
        )?;
        let message = match download {
            DownloadOutcome::CacheHit => "Reusing verified cache file".to_string(),
            DownloadOutcome::Fetched { bytes } => format!("Downloaded {bytes} bytes"),
        };
        emit(message, Some(start.elapsed()));

        emit(format!("Extracting into: {raw_dir}"), None);
        let extraction = extract_archive(
            spec.extract.format,
            &archive_path,
            &raw_dir,
            Some(&spec.extract.sentinel),
        )?;
        let sentinel = raw_dir.join(&spec.extract.sentinel);
        if !sentinel.as_std_path().exists() {
            return Err(IngestError::Extraction {
                archive: archive_path,
                message: format!(
                    "archive did not produce sentinel {}",
                    spec.extract.sentinel
                ),
            });
        }

        let extraction_root = self.store.extraction_root(spec);
        emit(format!("Checking layout under: {extraction_root}"), None);
        ensure_layout(&extraction_root, &spec.layout)?;

        let mut files = vec![
            artifact_record(spec.download.url.as_str(), &archive_path, Method::Download)?,
            artifact_record(archive_path.as_str(), &sentinel, Method::Extract)?,
        ];

        for generated in &spec.generated {
            let path = self.store.generated_path(spec, generated.filename());
            emit(format!("Writing: {path}"), None);
            Store::write_json_atomic(&path, &generated.render())?;
            files.push(artifact_record(
                format!("(generated) {}", generated.filename()),
                &path,
                Method::Generated,
            )?);
        }

        let provenance_path = self.store.provenance_path(spec);
        let record = ProvenanceRecord::new(spec.name, self.store.cache_root(), files);
        record.write(&provenance_path)?;
        tracing::info!(path = %provenance_path, files = record.files.len(), "provenance written");

        Ok(IngestResult {
            pipeline: spec.name,
            provenance_path: provenance_path.to_string(),
            download,
            extraction,
            files: record.files,
        })
    }

    pub fn list(&self) -> Result<ListResult, IngestError> {
        let pipelines = PipelineName::ALL
            .into_iter()
            .map(|name| {
                let spec = datasets::builtin(name);
                let provenance_path = self.store.provenance_path(&spec);
                let record = ProvenanceRecord::read(&provenance_path).ok();
                ListEntry {
                    pipeline: name,
                    cache_dir: self.store.pipeline_dir(name).to_string(),
                    provenance_path: record.as_ref().map(|_| provenance_path.to_string()),
                    created_at: record.map(|record| record.created_at),
                }
            })
            .collect();
        Ok(ListResult {
            cache_root: self.store.cache_root().to_string(),
            pipelines,
        })
    }

    /// Reads the last provenance record and re-audits what it lists.
    pub fn info(&self, name: PipelineName) -> Result<InfoResult, IngestError> {
        self.info_for_spec(&datasets::builtin(name))
    }

    /// Like [`App::info`], for a pipeline whose config moved the provenance file.
    pub fn info_for_spec(&self, spec: &PipelineSpec) -> Result<InfoResult, IngestError> {
        let provenance_path = self.store.provenance_path(spec);
        if !provenance_path.as_std_path().is_file() {
            return Err(IngestError::ProvenanceNotFound(spec.name.to_string()));
        }
        let record = ProvenanceRecord::read(&provenance_path)?;
        let files = audit(&record)?;
        Ok(InfoResult {
            pipeline: record.pipeline,
            provenance_path: provenance_path.to_string(),
            created_at: record.created_at,
            cache_root: record.cache_root,
            intact: files.iter().all(|entry| entry.status == AuditStatus::Ok),
            files,
        })
    }

    pub fn clear(&self, name: PipelineName) -> Result<ClearResult, IngestError> {
        let cleared = self.store.clear_pipeline(name)?;
        Ok(ClearResult {
            pipeline: name,
            cleared,
        })
    }
}
