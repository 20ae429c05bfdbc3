//! Resource loader contract and the stock implementations.
//!
//! The compiler never touches the filesystem itself: sources arrive as
//! bytes through a [`ResourceLoader`]. The filesystem loader resolves
//! case-insensitive resource names against an ordered list of search
//! directories; the memory loader backs tests and embedding.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::trace;

/// Resource kinds the compiler requests. Only script source today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Nss,
}

impl ResourceType {
    pub fn extension(self) -> &'static str {
        match self {
            ResourceType::Nss => "nss",
        }
    }
}

/// Failure to produce a resource's bytes.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource '{0}' not found")]
    NotFound(String),
    #[error("error reading '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Locate and return the bytes of a named resource.
///
/// Implementations shared across threads must be thread-safe themselves;
/// the compiler calls `load` synchronously and never retries.
pub trait ResourceLoader {
    fn load(&mut self, name: &str, ty: ResourceType) -> Result<Vec<u8>, ResourceError>;
}

/// Resolves resources against an ordered list of directories.
#[derive(Debug, Default)]
pub struct FileSystemLoader {
    search_paths: Vec<PathBuf>,
}

impl FileSystemLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths: paths,
        }
    }

    /// Append a search directory; earlier directories win.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Replace the search list.
    pub fn set_include_paths(&mut self, paths: Vec<PathBuf>) {
        self.search_paths = paths;
    }
}

impl ResourceLoader for FileSystemLoader {
    fn load(&mut self, name: &str, ty: ResourceType) -> Result<Vec<u8>, ResourceError> {
        let file_name = format!("{}.{}", name, ty.extension());
        for dir in &self.search_paths {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                trace!(path = %candidate.display(), "resource hit");
                return fs::read(&candidate).map_err(|source| ResourceError::Io {
                    name: name.to_string(),
                    source,
                });
            }
            // Resource names are case-insensitive; the filesystem may
            // not be.
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let stem_matches = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case(name));
                let ext_matches = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case(ty.extension()));
                if stem_matches && ext_matches {
                    trace!(path = %path.display(), "resource hit");
                    return fs::read(&path).map_err(|source| ResourceError::Io {
                        name: name.to_string(),
                        source,
                    });
                }
            }
        }
        Err(ResourceError::NotFound(name.to_string()))
    }
}

/// In-memory loader keyed by lowercased resource name.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.to_ascii_lowercase(), bytes.into());
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&mut self, name: &str, _ty: ResourceType) -> Result<Vec<u8>, ResourceError> {
        self.files
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))
    }
}
