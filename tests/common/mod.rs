#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Mutex;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;

use zum_ingest::app::{ProgressEvent, ProgressSink};
use zum_ingest::datasets::{self, COMMAND_LABELS};
use zum_ingest::domain::{PipelineName, PipelineSpec};
use zum_ingest::error::IngestError;
use zum_ingest::http::{FetchRequest, Fetcher};
use zum_ingest::verify::VerificationSpec;

/// Archive entry: `None` content marks a directory.
pub type Entry<'a> = (&'a str, Option<&'a [u8]>);

pub fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, path)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn zip_bytes(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        match content {
            Some(bytes) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(bytes).unwrap();
            }
            None => writer.add_directory(*name, options).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn tar_gz_bytes(entries: &[Entry<'_>]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        match content {
            Some(bytes) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(bytes.len() as u64);
                header.set_mode(0o644);
                builder.append_data(&mut header, name, *bytes).unwrap();
            }
            None => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                builder.append_data(&mut header, name, std::io::empty()).unwrap();
            }
        }
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Speech-commands style zip holding every label directory except `skip`.
pub fn commands_zip(skip: &[&str]) -> Vec<u8> {
    let names: Vec<(String, String)> = COMMAND_LABELS
        .iter()
        .filter(|label| !skip.contains(*label))
        .map(|label| {
            (
                format!("mini_speech_commands/{label}/"),
                format!("mini_speech_commands/{label}/0a2b400e_nohash_0.wav"),
            )
        })
        .collect();
    let mut entries: Vec<Entry<'_>> = vec![("mini_speech_commands/", None)];
    for (dir, file) in &names {
        entries.push((dir.as_str(), None));
        entries.push((file.as_str(), Some(b"RIFF....WAVE".as_slice())));
    }
    entries.push(("mini_speech_commands/README.md", Some(b"mini speech commands".as_slice())));
    zip_bytes(&entries)
}

pub fn imdb_tar_gz() -> Vec<u8> {
    tar_gz_bytes(&[
        ("aclImdb/", None),
        ("aclImdb/README", Some(b"Large Movie Review Dataset v1.0".as_slice())),
        ("aclImdb/imdb.vocab", Some(b"the\nand\n".as_slice())),
        ("aclImdb/train/pos/0_9.txt", Some(b"a wonderful film".as_slice())),
        ("aclImdb/test/neg/0_2.txt", Some(b"a dreadful film".as_slice())),
    ])
}

pub fn cifar_tar_gz() -> Vec<u8> {
    let batches = [
        "batches.meta",
        "test_batch",
        "data_batch_1",
        "data_batch_2",
        "data_batch_3",
        "data_batch_4",
        "data_batch_5",
    ];
    let names: Vec<String> = batches
        .iter()
        .map(|batch| format!("cifar-10-batches-py/{batch}"))
        .collect();
    let mut entries: Vec<Entry<'_>> = vec![("cifar-10-batches-py/", None)];
    for name in &names {
        entries.push((name.as_str(), Some(b"\x80\x02}q\x00.".as_slice())));
    }
    tar_gz_bytes(&entries)
}

/// Built-in spec whose integrity check pins `body` instead of the real upstream archive.
pub fn spec_for(name: PipelineName, body: &[u8]) -> PipelineSpec {
    let mut spec = datasets::builtin(name);
    spec.download.verification = VerificationSpec {
        sha256: Some(sha256_hex(body)),
        ..VerificationSpec::default()
    };
    spec
}

/// Serves a fixed body and counts requests.
pub struct StaticFetcher {
    body: Vec<u8>,
    calls: Mutex<usize>,
}

impl StaticFetcher {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(
        &self,
        _request: &FetchRequest<'_>,
        sink: &mut dyn Write,
    ) -> Result<u64, IngestError> {
        *self.calls.lock().unwrap() += 1;
        sink.write_all(&self.body)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(self.body.len() as u64)
    }
}

/// Writes a few bytes, then drops the connection.
pub struct FailingFetcher;

impl Fetcher for FailingFetcher {
    fn fetch(
        &self,
        request: &FetchRequest<'_>,
        sink: &mut dyn Write,
    ) -> Result<u64, IngestError> {
        sink.write_all(b"PK\x03\x04partial")
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Err(IngestError::Http(format!(
            "connection reset while reading {}",
            request.url
        )))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("[{}] {}", event.pipeline, event.message));
    }
}
