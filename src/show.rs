//! `neat show <path>`: read-only listing of package directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::catalog::record_name;
use crate::config::Config;
use crate::discovery::{
    discover_packages, list_files, PackageDirectory, PackageError, PackageLayout,
};

/// One listed file and the role it plays in its package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub file_name: String,
    pub role: &'static str,
}

/// One listed package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageListing {
    pub name: String,
    /// Catalog name the package would be imported as, if it is importable.
    pub record_name: Option<String>,
    /// Why the package cannot be imported.
    pub problem: Option<String>,
    pub files: Vec<ListedFile>,
}

/// Lists every package directory under `root` with its files.
///
/// A package that cannot be read or resolved is listed with its problem.
pub fn list_packages(root: &Path, layout: &PackageLayout) -> Result<Vec<PackageListing>> {
    let listings = discover_packages(root, layout)?
        .iter()
        .map(|dir| {
            let files = list_files(dir, layout);
            describe_package(dir, files, layout)
        })
        .collect();
    Ok(listings)
}

fn describe_package(
    dir: &Path,
    files: Result<Vec<PathBuf>, PackageError>,
    layout: &PackageLayout,
) -> PackageListing {
    let name = file_name_of(dir);
    let (files, package) = match files {
        Ok(files) => {
            let package = PackageDirectory::open(dir, layout);
            (files, package)
        }
        Err(e) => (Vec::new(), Err(e)),
    };

    let files = files
        .iter()
        .map(|file| {
            let role = match &package {
                Ok(p) if *file == p.document => "document",
                Ok(p) if *file == p.sidecar => "sidecar",
                _ => "other",
            };
            ListedFile {
                file_name: file_name_of(file),
                role,
            }
        })
        .collect();

    let (record_name, problem) = match &package {
        Ok(p) => (Some(record_name(&p.base_name())), None),
        Err(e) => (None, Some(e.to_string())),
    };
    PackageListing {
        name,
        record_name,
        problem,
        files,
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn run_show(config: &Config, root: &Path) -> Result<()> {
    let layout = PackageLayout::from_config(&config.packages)
        .context("Invalid packages.ignore_globs")?;
    let listings = list_packages(root, &layout)?;

    println!("{:<24} {:<24} FILES", "PACKAGE", "RECORD");
    for listing in &listings {
        let record = listing.record_name.as_deref().unwrap_or("-");
        println!("{:<24} {:<24} {}", listing.name, record, listing.files.len());
        for file in &listing.files {
            println!("  {:<10} {}", file.role, file.file_name);
        }
        if let Some(problem) = &listing.problem {
            println!("  ! {}", problem);
        }
    }
    println!("{} packages", listings.len());
    Ok(())
}
