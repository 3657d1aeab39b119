//! Package discovery.
//!
//! A package root holds one directory per package. Each package directory
//! contains exactly one primary document (by extension) and optionally a
//! sidecar with the same stem:
//!
//! ```text
//! root/
//! ├── docA/
//! │   ├── doc.pdf        primary document
//! │   └── doc.xml        sidecar
//! └── docB/
//!     ├── doc.pdf
//!     └── Thumbs.db      ignored
//! ```
//!
//! Directories are returned in file-name order so repeated runs visit them
//! identically.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::PackagesConfig;

/// Discovery failed; nothing can be imported.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("package root does not exist: {}", .0.display())]
    RootMissing(PathBuf),
    #[error("package root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot read package root: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A single package directory cannot be imported.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("cannot read package directory {}: {source}", .dir.display())]
    Read {
        dir: PathBuf,
        source: walkdir::Error,
    },
    #[error("no .{extension} document in {}", .dir.display())]
    NoDocument { dir: PathBuf, extension: String },
    #[error("more than one .{extension} document in {}: {}", .dir.display(), .candidates.join(", "))]
    AmbiguousDocument {
        dir: PathBuf,
        extension: String,
        candidates: Vec<String>,
    },
}

/// How files inside a package directory are recognized.
#[derive(Debug, Clone)]
pub struct PackageLayout {
    pub document_extension: String,
    pub sidecar_extension: String,
    ignore: GlobSet,
}

impl PackageLayout {
    pub fn from_config(config: &PackagesConfig) -> Result<Self, globset::Error> {
        Ok(Self {
            document_extension: config.document_extension.clone(),
            sidecar_extension: config.sidecar_extension.clone(),
            ignore: build_globset(&config.ignore_globs)?,
        })
    }

    /// Whether a file name is a platform artifact that listings skip.
    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.ignore.is_match(file_name)
    }

    fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.eq_ignore_ascii_case(&self.document_extension))
            .unwrap_or(false)
    }
}

impl Default for PackageLayout {
    fn default() -> Self {
        // The default globs are literal file names and always compile.
        Self::from_config(&PackagesConfig::default()).unwrap_or_else(|_| Self {
            document_extension: "pdf".to_string(),
            sidecar_extension: "xml".to_string(),
            ignore: GlobSet::empty(),
        })
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lists the package directories directly under `root`.
pub fn discover_packages(
    root: &Path,
    layout: &PackageLayout,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::RootMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let mut dirs = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if layout.is_ignored(&entry.file_name().to_string_lossy()) {
            continue;
        }
        dirs.push(entry.into_path());
    }
    Ok(dirs)
}

/// Regular files directly inside `dir`, sorted by name, without ignored ones.
pub fn list_files(dir: &Path, layout: &PackageLayout) -> Result<Vec<PathBuf>, PackageError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|source| PackageError::Read {
            dir: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if layout.is_ignored(&entry.file_name().to_string_lossy()) {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// A resolved package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDirectory {
    pub path: PathBuf,
    /// Directory name.
    pub name: String,
    pub document: PathBuf,
    /// Expected sidecar location; the file may not exist.
    pub sidecar: PathBuf,
}

impl PackageDirectory {
    pub fn open(path: &Path, layout: &PackageLayout) -> Result<Self, PackageError> {
        let files = list_files(path, layout)?;
        let mut documents: Vec<PathBuf> =
            files.into_iter().filter(|f| layout.is_document(f)).collect();

        let document = match documents.len() {
            0 => {
                return Err(PackageError::NoDocument {
                    dir: path.to_path_buf(),
                    extension: layout.document_extension.clone(),
                })
            }
            1 => documents.remove(0),
            _ => {
                return Err(PackageError::AmbiguousDocument {
                    dir: path.to_path_buf(),
                    extension: layout.document_extension.clone(),
                    candidates: documents.iter().map(|d| file_name_of(d)).collect(),
                })
            }
        };

        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sidecar = path.join(format!("{}.{}", stem, layout.sidecar_extension));

        Ok(Self {
            path: path.to_path_buf(),
            name: file_name_of(path),
            document,
            sidecar,
        })
    }

    /// File stem of the primary document.
    pub fn document_stem(&self) -> String {
        self.document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `<directory name>/<document stem>`; the input to record naming.
    pub fn base_name(&self) -> String {
        format!("{}/{}", self.name, self.document_stem())
    }

    pub fn document_file_name(&self) -> String {
        file_name_of(&self.document)
    }

    pub fn sidecar_file_name(&self) -> String {
        file_name_of(&self.sidecar)
    }

    pub fn has_sidecar(&self) -> bool {
        self.sidecar.is_file()
    }
}
