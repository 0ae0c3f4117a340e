//! Document sources for indexing and rebuilds.

use crate::loader::SUPPORTED_EXTENSIONS;
use navigator_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A raw file handed to the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// A file of the collection that could not be read.
#[derive(Debug)]
pub struct UnreadableFile {
    /// Display name; lossy when the real name is not valid UTF-8
    pub filename: String,
    pub error: AppError,
}

impl UnreadableFile {
    fn at(path: &Path, error: AppError) -> Self {
        Self {
            filename: display_name(path),
            error,
        }
    }
}

/// Everything a source yielded: readable files and the ones that failed.
#[derive(Debug, Default)]
pub struct SourceListing {
    /// Ordered by filename
    pub files: Vec<SourceFile>,
    pub unreadable: Vec<UnreadableFile>,
}

/// The canonical collection of documents a rebuild starts from.
pub trait DocumentSource: Send + Sync {
    /// All files of the collection.
    ///
    /// A file that cannot be read lands in `unreadable`; an error means the
    /// collection as a whole is unavailable.
    fn list(&self) -> AppResult<SourceListing>;
}

/// Supported paths found under a directory, plus entries the walk could not
/// visit.
#[derive(Debug, Default)]
pub struct DirectoryScan {
    pub paths: Vec<PathBuf>,
    pub unreadable: Vec<UnreadableFile>,
}

/// Files in a directory tree with a supported extension.
///
/// Hidden files and directories are skipped. Filenames are the bare file
/// name, so two files with the same name in different subdirectories address
/// the same document; the one sorted last wins.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree for supported files, sorted.
    ///
    /// Only a root that exists but cannot be read is an error.
    pub fn scan(&self) -> AppResult<DirectoryScan> {
        let mut scan = DirectoryScan::default();
        if !self.root.exists() {
            tracing::debug!("Document directory {:?} does not exist", self.root);
            return Ok(scan);
        }

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(AppError::Knowledge(format!(
                        "Failed to scan {:?}: {}",
                        self.root, e
                    )));
                }
                Err(e) => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    tracing::warn!("Cannot scan {:?}: {}", path, e);
                    let error = AppError::Knowledge(format!("Failed to scan {:?}: {}", path, e));
                    scan.unreadable.push(UnreadableFile::at(&path, error));
                    continue;
                }
            };
            if entry.file_type().is_file() && is_supported(entry.path()) {
                scan.paths.push(entry.into_path());
            }
        }

        Ok(scan)
    }

    fn read(path: &Path) -> AppResult<SourceFile> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Knowledge(format!("Invalid filename: {:?}", path)))?;
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;
        Ok(SourceFile::new(filename, bytes))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Whether the loader knows the file's extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

impl DocumentSource for DirectorySource {
    fn list(&self) -> AppResult<SourceListing> {
        let scan = self.scan()?;
        let mut listing = SourceListing {
            files: Vec::with_capacity(scan.paths.len()),
            unreadable: scan.unreadable,
        };

        for path in scan.paths {
            match Self::read(&path) {
                Ok(file) => listing.files.push(file),
                Err(error) => {
                    tracing::warn!("Cannot read {:?}: {}", path, error);
                    listing.unreadable.push(UnreadableFile::at(&path, error));
                }
            }
        }

        listing.files.sort_by(|a, b| a.filename.cmp(&b.filename));
        tracing::debug!(
            "Listed {} files from {:?} ({} unreadable)",
            listing.files.len(),
            self.root,
            listing.unreadable.len()
        );
        Ok(listing)
    }
}

/// A fixed set of files held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    files: Vec<SourceFile>,
}

impl InMemorySource {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }

    pub fn with(mut self, filename: &str, content: &str) -> Self {
        self.files.push(SourceFile::new(filename, content.as_bytes()));
        self
    }
}

impl DocumentSource for InMemorySource {
    fn list(&self) -> AppResult<SourceListing> {
        let mut files = self.files.clone();
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(SourceListing {
            files,
            unreadable: Vec::new(),
        })
    }
}
