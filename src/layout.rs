use camino::Utf8Path;

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedEntry {
    pub path: String,
    pub kind: EntryKind,
}

/// Known-good shape of an extracted dataset, relative to its extraction root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedLayout {
    pub entries: Vec<ExpectedEntry>,
}

impl ExpectedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(dirs.into_iter().map(|path| ExpectedEntry {
            path: path.into(),
            kind: EntryKind::Dir,
        }));
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(files.into_iter().map(|path| ExpectedEntry {
            path: path.into(),
            kind: EntryKind::File,
        }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every expected entry that is absent or of the wrong kind, in layout order.
pub fn missing_entries(root: &Utf8Path, layout: &ExpectedLayout) -> Vec<String> {
    layout
        .entries
        .iter()
        .filter(|entry| {
            let path = root.join(&entry.path);
            let present = match entry.kind {
                EntryKind::Dir => path.as_std_path().is_dir(),
                EntryKind::File => path.as_std_path().is_file(),
            };
            !present
        })
        .map(|entry| entry.path.clone())
        .collect()
}

pub fn ensure_layout(root: &Utf8Path, layout: &ExpectedLayout) -> Result<(), IngestError> {
    let missing = missing_entries(root, layout);
    if missing.is_empty() {
        return Ok(());
    }
    Err(IngestError::StructuralMismatch {
        root: root.to_path_buf(),
        missing,
    })
}
