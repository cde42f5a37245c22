use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::layout::ExpectedLayout;
use crate::verify::VerificationSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PipelineName {
    #[value(name = "asr_commands")]
    AsrCommands,
    #[value(name = "clip_multimodal")]
    ClipMultimodal,
    #[value(name = "sentiment_embeddings")]
    SentimentEmbeddings,
}

impl PipelineName {
    pub const ALL: [PipelineName; 3] = [
        PipelineName::AsrCommands,
        PipelineName::ClipMultimodal,
        PipelineName::SentimentEmbeddings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineName::AsrCommands => "asr_commands",
            PipelineName::ClipMultimodal => "clip_multimodal",
            PipelineName::SentimentEmbeddings => "sentiment_embeddings",
        }
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineName {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        PipelineName::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| IngestError::UnknownPipeline(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Zip => write!(f, "zip"),
            ArchiveFormat::TarGz => write!(f, "tar.gz"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSpec {
    pub url: String,
    pub verification: VerificationSpec,
    pub user_agent: String,
    pub timeout: Duration,
    pub retries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSpec {
    pub format: ArchiveFormat,
    /// Top-level directory the archive unpacks into, relative to the raw dir.
    pub root: String,
    /// Relative to the raw dir; its presence marks a finished extraction.
    pub sentinel: String,
}

/// Small metadata files derived from static configuration, never from the
/// archive contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedMetadata {
    LabelList { filename: String, labels: Vec<String> },
}

impl GeneratedMetadata {
    pub fn filename(&self) -> &str {
        match self {
            GeneratedMetadata::LabelList { filename, .. } => filename,
        }
    }

    pub fn render(&self) -> serde_json::Value {
        match self {
            GeneratedMetadata::LabelList { labels, .. } => {
                serde_json::json!({ "labels": labels })
            }
        }
    }
}

/// Everything the ingestion engine needs to run one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub name: PipelineName,
    pub archive_filename: String,
    pub raw_dirname: String,
    pub provenance_filename: String,
    pub download: DownloadSpec,
    pub extract: ExtractSpec,
    pub layout: ExpectedLayout,
    pub generated: Vec<GeneratedMetadata>,
}

pub const DEFAULT_RAW_DIRNAME: &str = "raw";
pub const DEFAULT_PROVENANCE_FILENAME: &str = "provenance.json";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub fn default_user_agent() -> String {
    format!("zum-ingest/{}", env!("CARGO_PKG_VERSION"))
}
