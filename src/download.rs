use std::fs;
use std::io::Write;
use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;

use crate::error::IngestError;
use crate::http::{FetchRequest, Fetcher};
use crate::verify::{VerificationSpec, verify_file};

const PARTIAL_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    pub url: &'a str,
    pub destination: &'a Utf8Path,
    pub verification: &'a VerificationSpec,
    pub user_agent: &'a str,
    pub timeout: Duration,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DownloadOutcome {
    /// The destination already verified; no transfer happened.
    #[serde(rename = "cache")]
    CacheHit,
    #[serde(rename = "download")]
    Fetched { bytes: u64 },
}

/// Ensures `destination` holds a verified copy of `url`.
///
/// Bytes are streamed into a temporary sibling and renamed onto the
/// destination only after the transfer completes, so the canonical path never
/// holds a partial file. A verification failure after a fresh transfer is
/// returned as-is; there is no second attempt.
pub fn download_url<F: Fetcher + ?Sized>(
    fetcher: &F,
    request: &DownloadRequest<'_>,
) -> Result<DownloadOutcome, IngestError> {
    let destination = request.destination;
    let parent = destination
        .parent()
        .ok_or_else(|| IngestError::Filesystem(format!("invalid destination {destination}")))?;
    let file_name = destination
        .file_name()
        .ok_or_else(|| IngestError::Filesystem(format!("invalid destination {destination}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("create {parent}: {err}")))?;

    if !request.force && destination.as_std_path().exists() {
        match verify_file(destination, request.verification) {
            Ok(()) => {
                tracing::info!(path = %destination, "cached download verified");
                return Ok(DownloadOutcome::CacheHit);
            }
            Err(err) => {
                tracing::warn!(path = %destination, error = %err, "discarding cached download");
                fs::remove_file(destination.as_std_path()).map_err(|err| {
                    IngestError::Filesystem(format!("remove {destination}: {err}"))
                })?;
            }
        }
    }

    remove_stale_partials(parent, file_name)?;

    let mut partial = tempfile::Builder::new()
        .prefix(&format!("{file_name}."))
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("create temp file in {parent}: {err}")))?;

    tracing::info!(url = request.url, path = %destination, "downloading");
    let bytes = fetcher.fetch(
        &FetchRequest {
            url: request.url,
            user_agent: request.user_agent,
            timeout: request.timeout,
        },
        partial.as_file_mut(),
    )?;
    partial
        .as_file_mut()
        .flush()
        .and_then(|_| partial.as_file().sync_all())
        .map_err(|err| IngestError::Filesystem(format!("flush {}: {err}", partial.path().display())))?;

    partial
        .persist(destination.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("publish {destination}: {}", err.error)))?;
    tracing::debug!(path = %destination, bytes, "download published");

    verify_file(destination, request.verification)?;
    Ok(DownloadOutcome::Fetched { bytes })
}

/// Removes `<file_name>.*.tmp` leftovers from an interrupted earlier run.
fn remove_stale_partials(parent: &Utf8Path, file_name: &str) -> Result<(), IngestError> {
    let prefix = format!("{file_name}.");
    let entries = fs::read_dir(parent.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("read {parent}: {err}")))?;
    for entry in entries {
        let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(&prefix) && name.ends_with(PARTIAL_SUFFIX) && entry.path().is_file() {
            tracing::debug!(path = %entry.path().display(), "removing stale partial download");
            fs::remove_file(entry.path())
                .map_err(|err| IngestError::Filesystem(format!("remove {name}: {err}")))?;
        }
    }
    Ok(())
}
