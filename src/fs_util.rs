use std::fs;
use std::io::{self, BufReader};

use camino::Utf8Path;
use flate2::read::GzDecoder;
use serde::Serialize;
use zip::ZipArchive;

use crate::domain::ArchiveFormat;
use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractOutcome {
    /// The sentinel already existed; nothing was touched.
    Reused,
    Extracted,
}

pub fn extract_archive(
    format: ArchiveFormat,
    archive_path: &Utf8Path,
    target_dir: &Utf8Path,
    sentinel: Option<&str>,
) -> Result<ExtractOutcome, IngestError> {
    if let Some(sentinel) = sentinel {
        if target_dir.join(sentinel).as_std_path().exists() {
            tracing::info!(path = %target_dir, sentinel, "extraction already present");
            return Ok(ExtractOutcome::Reused);
        }
    }

    fs::create_dir_all(target_dir.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("create {target_dir}: {err}")))?;
    tracing::info!(archive = %archive_path, path = %target_dir, %format, "extracting");
    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, target_dir)?,
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, target_dir)?,
    }
    Ok(ExtractOutcome::Extracted)
}

pub fn extract_zip(zip_path: &Utf8Path, target_dir: &Utf8Path) -> Result<(), IngestError> {
    let extraction_error = |message: String| IngestError::Extraction {
        archive: zip_path.to_path_buf(),
        message,
    };
    let file = fs::File::open(zip_path.as_std_path())
        .map_err(|err| extraction_error(format!("open zip: {err}")))?;
    let mut archive = ZipArchive::new(file).map_err(|err| extraction_error(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| extraction_error(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.as_std_path().join(path),
            None => {
                return Err(extraction_error(format!(
                    "zip entry path traversal detected: {}",
                    entry.name()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| IngestError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| IngestError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| extraction_error(err.to_string()))?;
    }
    Ok(())
}

pub fn extract_tar_gz(archive_path: &Utf8Path, target_dir: &Utf8Path) -> Result<(), IngestError> {
    let file = fs::File::open(archive_path.as_std_path()).map_err(|err| IngestError::Extraction {
        archive: archive_path.to_path_buf(),
        message: format!("open tarball: {err}"),
    })?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(target_dir.as_std_path())
        .map_err(|err| IngestError::Extraction {
            archive: archive_path.to_path_buf(),
            message: err.to_string(),
        })
}
