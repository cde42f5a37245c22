//! Built-in dataset definitions. `configs/*.toml` mirror these values.

use crate::domain::{
    ArchiveFormat, DEFAULT_PROVENANCE_FILENAME, DEFAULT_RAW_DIRNAME, DEFAULT_TIMEOUT, DownloadSpec,
    ExtractSpec, GeneratedMetadata, PipelineName, PipelineSpec, default_user_agent,
};
use crate::layout::ExpectedLayout;
use crate::verify::VerificationSpec;

const MIB: u64 = 1024 * 1024;

/// TensorFlow tutorial subset of Speech Commands.
pub const MINI_SPEECH_COMMANDS_URL: &str =
    "https://storage.googleapis.com/download.tensorflow.org/data/mini_speech_commands.zip";
pub const COMMAND_LABELS: [&str; 8] = ["down", "go", "left", "no", "right", "stop", "up", "yes"];

/// CIFAR-10, python pickle version.
pub const CIFAR10_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-python.tar.gz";
pub const CIFAR10_MD5: &str = "c58f30108f718f92721af3b95e74349a";
/// Class names in label-id order; used as text prompts downstream.
pub const CIFAR10_LABEL_TEXTS: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Stanford Large Movie Review Dataset.
pub const IMDB_URL: &str = "https://ai.stanford.edu/~amaas/data/sentiment/aclImdb_v1.tar.gz";
pub const IMDB_MD5: &str = "7c2ac02c03563afcf9b574c7e56c153a";

pub fn builtin(name: PipelineName) -> PipelineSpec {
    match name {
        PipelineName::AsrCommands => asr_commands(),
        PipelineName::ClipMultimodal => clip_multimodal(),
        PipelineName::SentimentEmbeddings => sentiment_embeddings(),
    }
}

fn asr_commands() -> PipelineSpec {
    PipelineSpec {
        name: PipelineName::AsrCommands,
        archive_filename: "mini_speech_commands.zip".to_string(),
        raw_dirname: DEFAULT_RAW_DIRNAME.to_string(),
        provenance_filename: DEFAULT_PROVENANCE_FILENAME.to_string(),
        download: DownloadSpec {
            url: MINI_SPEECH_COMMANDS_URL.to_string(),
            verification: VerificationSpec {
                min_bytes: Some(10 * MIB),
                max_bytes: Some(500 * MIB),
                ..VerificationSpec::default()
            },
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
        },
        extract: ExtractSpec {
            format: ArchiveFormat::Zip,
            root: "mini_speech_commands".to_string(),
            sentinel: "mini_speech_commands/yes".to_string(),
        },
        layout: ExpectedLayout::new().with_dirs(COMMAND_LABELS),
        generated: vec![GeneratedMetadata::LabelList {
            filename: "labels.json".to_string(),
            labels: COMMAND_LABELS.iter().map(|label| label.to_string()).collect(),
        }],
    }
}

fn clip_multimodal() -> PipelineSpec {
    PipelineSpec {
        name: PipelineName::ClipMultimodal,
        archive_filename: "cifar-10-python.tar.gz".to_string(),
        raw_dirname: DEFAULT_RAW_DIRNAME.to_string(),
        provenance_filename: DEFAULT_PROVENANCE_FILENAME.to_string(),
        download: DownloadSpec {
            url: CIFAR10_URL.to_string(),
            verification: VerificationSpec {
                min_bytes: Some(100 * MIB),
                max_bytes: Some(300 * MIB),
                md5: Some(CIFAR10_MD5.to_string()),
                ..VerificationSpec::default()
            },
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
        },
        extract: ExtractSpec {
            format: ArchiveFormat::TarGz,
            root: "cifar-10-batches-py".to_string(),
            sentinel: "cifar-10-batches-py/batches.meta".to_string(),
        },
        layout: ExpectedLayout::new().with_files([
            "batches.meta",
            "test_batch",
            "data_batch_1",
            "data_batch_2",
            "data_batch_3",
            "data_batch_4",
            "data_batch_5",
        ]),
        generated: vec![GeneratedMetadata::LabelList {
            filename: "label_texts.json".to_string(),
            labels: CIFAR10_LABEL_TEXTS
                .iter()
                .map(|label| label.to_string())
                .collect(),
        }],
    }
}

fn sentiment_embeddings() -> PipelineSpec {
    PipelineSpec {
        name: PipelineName::SentimentEmbeddings,
        archive_filename: "aclImdb_v1.tar.gz".to_string(),
        raw_dirname: DEFAULT_RAW_DIRNAME.to_string(),
        provenance_filename: DEFAULT_PROVENANCE_FILENAME.to_string(),
        download: DownloadSpec {
            url: IMDB_URL.to_string(),
            verification: VerificationSpec {
                min_bytes: Some(50 * MIB),
                max_bytes: Some(500 * MIB),
                md5: Some(IMDB_MD5.to_string()),
                ..VerificationSpec::default()
            },
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
        },
        extract: ExtractSpec {
            format: ArchiveFormat::TarGz,
            root: "aclImdb".to_string(),
            sentinel: "aclImdb/README".to_string(),
        },
        layout: ExpectedLayout::new()
            .with_dirs(["train", "test"])
            .with_files(["README"]),
        generated: Vec::new(),
    }
}
