//! mw-cache
//!
//! Snapshot cache: one pretty-printed JSON document per source (per
//! visibility partition where the source has them), with sorted keys so
//! successive runs diff cleanly.
//!
//! Layout under the cache root:
//! - `{source}.json` for single-view sources;
//! - `{source}_all.json` + `{source}_public.json` for partitioned sources.
//!
//! Writes overwrite unconditionally and remove the other layout's documents,
//! so a write fully replaces the source's previous entry. Reads deserialize
//! the whole document.
//! This is a replay/debug convenience, never a store of record.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use mw_model::{Catalog, PartitionedCatalog, Visibility};

#[derive(Debug)]
pub enum CacheError {
    Io { path: PathBuf, message: String },
    Json { path: PathBuf, message: String },
    /// A partitioned source is missing one of its two documents.
    Incomplete { source: String, missing: PathBuf },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io { path, message } => {
                write!(f, "cache io error at {}: {message}", path.display())
            }
            CacheError::Json { path, message } => {
                write!(f, "cache document {} is invalid: {message}", path.display())
            }
            CacheError::Incomplete { source, missing } => write!(
                f,
                "cache for {source} is incomplete: {} not found",
                missing.display()
            ),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug, Clone)]
pub struct SnapshotCache {
    root: PathBuf,
}

impl SnapshotCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document path for `source`, optionally for one partition.
    pub fn path_for(&self, source: &str, partition: Option<Visibility>) -> PathBuf {
        let stem = file_stem(source);
        let file = match partition {
            None => format!("{stem}.json"),
            Some(v) => format!("{stem}_{}.json", v.as_str()),
        };
        self.root.join(file)
    }

    /// Every document name `source` may occupy under the root, whichever layout.
    ///
    /// Two sources whose sets intersect would overwrite each other.
    pub fn document_names(source: &str) -> [String; 3] {
        let stem = file_stem(source);
        [
            format!("{stem}.json"),
            format!("{stem}_{}.json", Visibility::All.as_str()),
            format!("{stem}_{}.json", Visibility::Public.as_str()),
        ]
    }

    /// Persist every partition of `catalog`; returns the written paths.
    pub fn write(&self, catalog: &PartitionedCatalog) -> Result<Vec<PathBuf>, CacheError> {
        fs::create_dir_all(&self.root).map_err(|e| CacheError::Io {
            path: self.root.clone(),
            message: e.to_string(),
        })?;

        let mut written = Vec::new();
        match &catalog.public {
            Some(public) => {
                let all_path = self.path_for(&catalog.source, Some(Visibility::All));
                write_document(&all_path, &catalog.all)?;
                written.push(all_path);

                let public_path = self.path_for(&catalog.source, Some(Visibility::Public));
                write_document(&public_path, public)?;
                written.push(public_path);

                remove_stale(&self.path_for(&catalog.source, None))?;
            }
            None => {
                let path = self.path_for(&catalog.source, None);
                write_document(&path, &catalog.all)?;
                written.push(path);

                remove_stale(&self.path_for(&catalog.source, Some(Visibility::All)))?;
                remove_stale(&self.path_for(&catalog.source, Some(Visibility::Public)))?;
            }
        }
        Ok(written)
    }

    /// Load the catalog(s) previously written for `source`.
    pub fn read(&self, source: &str) -> Result<PartitionedCatalog, CacheError> {
        let all_path = self.path_for(source, Some(Visibility::All));
        if all_path.exists() {
            let public_path = self.path_for(source, Some(Visibility::Public));
            if !public_path.exists() {
                return Err(CacheError::Incomplete {
                    source: source.to_string(),
                    missing: public_path,
                });
            }
            let all = read_document(&all_path)?;
            let public = read_document(&public_path)?;
            return Ok(PartitionedCatalog::partitioned(source, all, public));
        }

        let path = self.path_for(source, None);
        let all = read_document(&path)?;
        Ok(PartitionedCatalog::single(source, all))
    }
}

/// `Gerrit` -> `gerrit`, `My Mirror` -> `my_mirror`.
fn file_stem(source: &str) -> String {
    source
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn write_document(path: &Path, catalog: &Catalog) -> Result<(), CacheError> {
    let mut json = serde_json::to_string_pretty(catalog).map_err(|e| CacheError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    json.push('\n');
    fs::write(path, json).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn remove_stale(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn read_document(path: &Path) -> Result<Catalog, CacheError> {
    let raw = fs::read_to_string(path).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| CacheError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
