mod common;

use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use zum_ingest::app::{App, IngestOptions};
use zum_ingest::datasets::{self, CIFAR10_LABEL_TEXTS, COMMAND_LABELS};
use zum_ingest::domain::{ArchiveFormat, ExtractSpec, PipelineName, PipelineSpec};
use zum_ingest::download::DownloadOutcome;
use zum_ingest::error::{IngestError, SizeBound};
use zum_ingest::fs_util::ExtractOutcome;
use zum_ingest::layout::ExpectedLayout;
use zum_ingest::output::JsonOutput;
use zum_ingest::provenance::{AuditStatus, Content, Method, ProvenanceRecord};
use zum_ingest::store::Store;
use zum_ingest::verify::VerificationSpec;

use common::{
    FailingFetcher, RecordingSink, StaticFetcher, cifar_tar_gz, commands_zip, imdb_tar_gz,
    sha256_hex, spec_for, tar_gz_bytes, utf8_tempdir,
};

fn store_in(dir: &Utf8PathBuf) -> Store {
    Store::new_with_root(dir.join("cache"))
}

#[test]
fn asr_commands_end_to_end() {
    let (_temp, dir) = utf8_tempdir();
    let body = commands_zip(&[]);
    let spec = spec_for(PipelineName::AsrCommands, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body.clone()));

    let result = app
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    assert_eq!(result.download, DownloadOutcome::Fetched { bytes: body.len() as u64 });
    assert_eq!(result.extraction, ExtractOutcome::Extracted);

    let archive = app.store().archive_path(&spec);
    let record = ProvenanceRecord::read(&app.store().provenance_path(&spec)).unwrap();
    assert_eq!(record.pipeline, PipelineName::AsrCommands);
    assert_eq!(record.cache_root, app.store().cache_root().as_str());
    assert_eq!(record.files.len(), 3);

    let download = &record.files[0];
    assert_eq!(download.method, Method::Download);
    assert_eq!(download.src, spec.download.url);
    assert_eq!(download.dst, archive.as_str());
    assert_eq!(
        download.content,
        Content::File {
            bytes: body.len() as u64,
            sha256: sha256_hex(&body),
        }
    );

    let extract = &record.files[1];
    assert_eq!(extract.method, Method::Extract);
    assert_eq!(extract.src, archive.as_str());
    assert!(extract.dst.ends_with("asr_commands/raw/mini_speech_commands/yes"));
    assert_eq!(extract.content, Content::Directory);

    let generated = &record.files[2];
    assert_eq!(generated.method, Method::Generated);
    assert_eq!(generated.src, "(generated) labels.json");
    assert_matches!(generated.content, Content::File { .. });
}

#[test]
fn generated_labels_keep_declared_order() {
    let (_temp, dir) = utf8_tempdir();
    let body = cifar_tar_gz();
    let spec = spec_for(PipelineName::ClipMultimodal, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));

    app.ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    let path = app.store().generated_path(&spec, "label_texts.json");
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.ends_with("]\n}\n"));
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value, serde_json::json!({ "labels": CIFAR10_LABEL_TEXTS }));
}

#[test]
fn asr_labels_file_lists_every_command() {
    let (_temp, dir) = utf8_tempdir();
    let body = commands_zip(&[]);
    let spec = spec_for(PipelineName::AsrCommands, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));

    app.ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    let content = fs::read_to_string(app.store().generated_path(&spec, "labels.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value, serde_json::json!({ "labels": COMMAND_LABELS }));
}

#[test]
fn sentiment_has_no_generated_files() {
    let (_temp, dir) = utf8_tempdir();
    let body = imdb_tar_gz();
    let spec = spec_for(PipelineName::SentimentEmbeddings, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));

    let result = app
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    let methods: Vec<_> = result.files.iter().map(|file| file.method).collect();
    assert_eq!(methods, vec![Method::Download, Method::Extract]);
    assert!(result.files[1].dst.ends_with("raw/aclImdb/README"));
    assert_matches!(result.files[1].content, Content::File { .. });
}

#[test]
fn rerun_reuses_download_and_extraction() {
    let (_temp, dir) = utf8_tempdir();
    let body = imdb_tar_gz();
    let spec = spec_for(PipelineName::SentimentEmbeddings, &body);
    let fetcher = StaticFetcher::new(body);
    let app = App::new(store_in(&dir), fetcher);

    let first = app
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();
    let second = app
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    assert_eq!(second.download, DownloadOutcome::CacheHit);
    assert_eq!(second.extraction, ExtractOutcome::Reused);
    assert_eq!(first.files, second.files);
}

#[test]
fn missing_label_directory_aborts_without_provenance() {
    let (_temp, dir) = utf8_tempdir();
    let body = commands_zip(&["stop"]);
    let spec = spec_for(PipelineName::AsrCommands, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));

    let err = app
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap_err();

    assert_matches!(err, IngestError::StructuralMismatch { ref missing, .. } if missing == &["stop"]);
    assert!(err.to_string().contains("stop"));
    assert!(!app.store().provenance_path(&spec).exists());
    assert!(!app.store().generated_path(&spec, "labels.json").exists());
}

#[test]
fn archive_without_sentinel_is_an_extraction_error() {
    let (_temp, dir) = utf8_tempdir();
    let body = commands_zip(&["yes"]);
    let spec = spec_for(PipelineName::AsrCommands, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));

    let err = app
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap_err();

    assert_matches!(err, IngestError::Extraction { .. });
    assert!(!app.store().provenance_path(&spec).exists());
}

#[test]
fn failed_rerun_keeps_previous_provenance() {
    let (_temp, dir) = utf8_tempdir();
    let body = imdb_tar_gz();
    let spec = spec_for(PipelineName::SentimentEmbeddings, &body);
    let store = store_in(&dir);

    App::new(store.clone(), StaticFetcher::new(body))
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();
    let provenance = store.provenance_path(&spec);
    let before = fs::read_to_string(&provenance).unwrap();

    let err = App::new(store.clone(), FailingFetcher)
        .ingest(&spec, &IngestOptions { force: true }, &JsonOutput)
        .unwrap_err();

    assert_matches!(err, IngestError::Http(_));
    assert_eq!(fs::read_to_string(&provenance).unwrap(), before);
}

#[test]
fn progress_is_reported_per_pipeline() {
    let (_temp, dir) = utf8_tempdir();
    let body = imdb_tar_gz();
    let spec = spec_for(PipelineName::SentimentEmbeddings, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));
    let sink = RecordingSink::default();

    app.ingest(&spec, &IngestOptions::default(), &sink).unwrap();

    let messages = sink.messages();
    assert_eq!(
        messages[0],
        format!("[sentiment_embeddings] Downloading: {}", spec.download.url)
    );
    assert!(messages[1].starts_with("[sentiment_embeddings] Cache file: "));
    assert!(messages.iter().all(|line| line.starts_with("[sentiment_embeddings] ")));
    assert!(messages.iter().any(|line| line.contains("Extracting into: ")));
}

#[test]
fn info_flags_a_modified_archive() {
    let (_temp, dir) = utf8_tempdir();
    let body = imdb_tar_gz();
    let spec = spec_for(PipelineName::SentimentEmbeddings, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));
    app.ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    let clean = app.info(PipelineName::SentimentEmbeddings).unwrap();
    assert!(clean.intact);

    let archive = app.store().archive_path(&spec);
    let mut bytes = fs::read(&archive).unwrap();
    bytes.extend_from_slice(b"trailing junk");
    fs::write(&archive, bytes).unwrap();

    let info = app.info(PipelineName::SentimentEmbeddings).unwrap();
    assert!(!info.intact);
    assert_eq!(info.files[0].status, AuditStatus::Modified);
    assert_eq!(info.files[1].status, AuditStatus::Ok);
}

#[test]
fn list_and_clear() {
    let (_temp, dir) = utf8_tempdir();
    let body = imdb_tar_gz();
    let spec = spec_for(PipelineName::SentimentEmbeddings, &body);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));
    app.ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    let listed = app.list().unwrap();
    let ingested: Vec<_> = listed
        .pipelines
        .iter()
        .filter(|entry| entry.created_at.is_some())
        .map(|entry| entry.pipeline)
        .collect();
    assert_eq!(ingested, vec![PipelineName::SentimentEmbeddings]);

    let cleared = app.clear(PipelineName::SentimentEmbeddings).unwrap();
    assert!(cleared.cleared);
    assert!(!app.store().pipeline_dir(PipelineName::SentimentEmbeddings).exists());
    assert!(app.list().unwrap().pipelines.iter().all(|entry| entry.created_at.is_none()));

    let err = app.info(PipelineName::SentimentEmbeddings).unwrap_err();
    assert_matches!(err, IngestError::ProvenanceNotFound(_));
}

fn corpus_tar_gz() -> Vec<u8> {
    tar_gz_bytes(&[
        ("corpus/", None),
        ("corpus/marker.txt", Some(b"ready".as_slice())),
        ("corpus/train/0.txt", Some(b"some text".as_slice())),
    ])
}

/// Size bounds only, no checksum: the shape of an upstream that publishes no digest.
fn size_bounded_spec(min_bytes: u64, max_bytes: u64) -> PipelineSpec {
    let mut spec = datasets::builtin(PipelineName::SentimentEmbeddings);
    spec.archive_filename = "corpus.tar.gz".to_string();
    spec.download.url = "https://example.test/corpus.tar.gz".to_string();
    spec.download.verification = VerificationSpec {
        min_bytes: Some(min_bytes),
        max_bytes: Some(max_bytes),
        ..VerificationSpec::default()
    };
    spec.extract = ExtractSpec {
        format: ArchiveFormat::TarGz,
        root: "corpus".to_string(),
        sentinel: "corpus/marker.txt".to_string(),
    };
    spec.layout = ExpectedLayout::new()
        .with_dirs(["train"])
        .with_files(["marker.txt"]);
    spec.generated = Vec::new();
    spec
}

#[test]
fn size_bounded_archive_records_download_and_sentinel() {
    let (_temp, dir) = utf8_tempdir();
    let body = corpus_tar_gz();
    let size = body.len() as u64;
    let spec = size_bounded_spec(1, size + 1024);
    let app = App::new(store_in(&dir), StaticFetcher::new(body.clone()));

    app.ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    let record = ProvenanceRecord::read(&app.store().provenance_path(&spec)).unwrap();
    assert_eq!(record.files.len(), 2);

    let download = &record.files[0];
    assert_eq!(download.method, Method::Download);
    assert_eq!(download.src, "https://example.test/corpus.tar.gz");
    assert_eq!(download.dst, app.store().archive_path(&spec).as_str());
    assert_eq!(
        download.content,
        Content::File {
            bytes: size,
            sha256: sha256_hex(&body),
        }
    );

    let extract = &record.files[1];
    assert_eq!(extract.method, Method::Extract);
    assert!(extract.dst.ends_with("raw/corpus/marker.txt"));
    assert_eq!(
        extract.content,
        Content::File {
            bytes: 5,
            sha256: sha256_hex(b"ready"),
        }
    );
}

#[test]
fn archive_below_minimum_size_aborts_without_provenance() {
    let (_temp, dir) = utf8_tempdir();
    let body = corpus_tar_gz();
    let size = body.len() as u64;
    let spec = size_bounded_spec(size + 1, size + 1024);
    let app = App::new(store_in(&dir), StaticFetcher::new(body));

    let err = app
        .ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap_err();

    assert_matches!(
        err,
        IngestError::SizeOutOfRange { size: got, bound: SizeBound::Min(_), .. } if got == size
    );
    assert!(!app.store().provenance_path(&spec).exists());
    assert!(!app.store().raw_dir(&spec).exists());
}

#[test]
fn info_follows_a_custom_provenance_file() {
    let (_temp, dir) = utf8_tempdir();
    let body = imdb_tar_gz();
    let mut spec = spec_for(PipelineName::SentimentEmbeddings, &body);
    spec.provenance_filename = "imdb_provenance.json".to_string();
    let app = App::new(store_in(&dir), StaticFetcher::new(body));
    app.ingest(&spec, &IngestOptions::default(), &JsonOutput)
        .unwrap();

    assert_matches!(
        app.info(PipelineName::SentimentEmbeddings),
        Err(IngestError::ProvenanceNotFound(_))
    );
    let info = app.info_for_spec(&spec).unwrap();
    assert!(info.intact);
    assert!(info.provenance_path.ends_with("imdb_provenance.json"));
}
