//! File descriptors and the JSON manifest they are read from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One file to download. Identified by its destination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Remote location.
    pub url: String,
    /// Destination file path.
    pub path: PathBuf,
    /// Folder to create before writing; defaults to the parent of `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    /// Caller-defined tag reported with progress (e.g. `"assets"`, `"libraries"`).
    #[serde(rename = "type", default)]
    pub file_type: String,
    /// Expected size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileDescriptor {
    /// Creates a descriptor with no folder override, type or size.
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            folder: None,
            file_type: String::new(),
            size: None,
        }
    }

    /// Sets the type tag.
    #[must_use]
    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    /// Sets the expected size.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the folder created before writing.
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Returns the folder that must exist before the file is written.
    #[must_use]
    pub fn destination_folder(&self) -> Option<&Path> {
        self.folder
            .as_deref()
            .or_else(|| self.path.parent())
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// A list of files to download, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Files in priority order.
    pub files: Vec<FileDescriptor>,
}

impl Manifest {
    /// Parses a manifest from JSON. Accepts either `{"files": [...]}` or a bare array.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a file list.
    pub fn from_json(contents: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Wrapped(Manifest),
            Bare(Vec<FileDescriptor>),
        }

        match serde_json::from_str(contents).map_err(|e| Error::Manifest(e.to_string()))? {
            Repr::Wrapped(manifest) => Ok(manifest),
            Repr::Bare(files) => Ok(Self { files }),
        }
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Sum of the known file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().filter_map(|f| f.size).sum()
    }

    /// Resolves relative destination paths against `root`.
    #[must_use]
    pub fn rooted_at(mut self, root: &Path) -> Self {
        for file in &mut self.files {
            if file.path.is_relative() {
                file.path = root.join(&file.path);
            }
            if let Some(folder) = file.folder.as_mut().filter(|f| f.is_relative()) {
                *folder = root.join(&*folder);
            }
        }
        self
    }
}
