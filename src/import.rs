//! Import orchestration.
//!
//! Drives every discovered package through a fixed sequence:
//!
//! ```text
//! Pending ─▶ Extracting ─▶ Reconciling ─▶ AttachingFiles ─▶ Done
//!    │           │              │                │
//!    └───────────┴──────────────┴────────────────┴──▶ Failed (stage + error)
//! ```
//!
//! A failure ends that package only. The outcome of every package is
//! collected into an [`ImportReport`]; only a discovery failure aborts a run.
//! Nothing is rolled back: a package that fails while attaching keeps its
//! updated dataset, and the next run converges it through the name-keyed
//! upsert.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{self, CatalogApi, CatalogError, UpsertAction, UpsertOptions};
use crate::ckan::CkanApi;
use crate::config::Config;
use crate::discovery::{
    discover_packages, DiscoveryError, PackageDirectory, PackageError, PackageLayout,
};
use crate::extract::{create_extractor, ExtractionError, TextExtractor};
use crate::memory::InMemoryCatalog;
use crate::metadata::{extract_metadata, MetadataFormatError};
use crate::models::{AttachedFile, CatalogRecord, Field};
use crate::tags::build_tags;

/// Processing stage of one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Pending,
    Extracting,
    Reconciling,
    AttachingFiles,
    Done,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStage::Pending => "pending",
            ImportStage::Extracting => "extracting",
            ImportStage::Reconciling => "reconciling",
            ImportStage::AttachingFiles => "attaching files",
            ImportStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Why a single package failed.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error(transparent)]
    Metadata(#[from] MetadataFormatError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug)]
pub struct PackageFailure {
    /// Stage that was running when the error occurred.
    pub stage: ImportStage,
    pub error: ImportError,
}

impl fmt::Display for PackageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

#[derive(Debug)]
pub struct ImportedPackage {
    pub action: UpsertAction,
    pub record: CatalogRecord,
    pub attachments: Vec<AttachedFile>,
}

#[derive(Debug)]
pub struct PackageOutcome {
    pub directory: PathBuf,
    pub result: Result<ImportedPackage, PackageFailure>,
}

impl PackageOutcome {
    pub fn stage(&self) -> ImportStage {
        match &self.result {
            Ok(_) => ImportStage::Done,
            Err(failure) => failure.stage,
        }
    }
}

/// Per-package outcomes of one run, in discovery order.
#[derive(Debug)]
pub struct ImportReport {
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<PackageOutcome>,
}

impl ImportReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&Path, &ImportedPackage)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|p| (o.directory.as_path(), p)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, &PackageFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|f| (o.directory.as_path(), f)))
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Runs packages through extraction, reconciliation, and attachment.
pub struct Importer<'a> {
    catalog: &'a dyn CatalogApi,
    extractor: &'a dyn TextExtractor,
    layout: PackageLayout,
    options: UpsertOptions,
}

impl<'a> Importer<'a> {
    pub fn new(
        catalog: &'a dyn CatalogApi,
        extractor: &'a dyn TextExtractor,
        layout: PackageLayout,
    ) -> Self {
        Self {
            catalog,
            extractor,
            layout,
            options: UpsertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UpsertOptions) -> Self {
        self.options = options;
        self
    }

    /// Imports every package under `root`, at most `limit` of them.
    pub async fn run(
        &self,
        root: &Path,
        limit: Option<usize>,
    ) -> Result<ImportReport, DiscoveryError> {
        let started_at = Utc::now();
        let mut dirs = discover_packages(root, &self.layout)?;
        if let Some(limit) = limit {
            dirs.truncate(limit);
        }
        info!(root = %root.display(), packages = dirs.len(), "discovered packages");

        let mut outcomes = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let result = self.import_package(&dir).await;
            match &result {
                Ok(imported) => info!(
                    package = %dir.display(),
                    name = %imported.record.name,
                    action = %imported.action,
                    attachments = imported.attachments.len(),
                    "package imported"
                ),
                Err(failure) => warn!(
                    package = %dir.display(),
                    stage = %failure.stage,
                    error = %failure.error,
                    "package failed"
                ),
            }
            outcomes.push(PackageOutcome {
                directory: dir,
                result,
            });
        }

        Ok(ImportReport {
            root: root.to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
        })
    }

    /// Imports one package directory. Errors never escape this boundary
    /// other than as a [`PackageFailure`].
    pub async fn import_package(&self, dir: &Path) -> Result<ImportedPackage, PackageFailure> {
        let mut stage = ImportStage::Pending;
        let result = self.drive(dir, &mut stage).await;
        result.map_err(|error| PackageFailure { stage, error })
    }

    async fn drive(
        &self,
        dir: &Path,
        stage: &mut ImportStage,
    ) -> Result<ImportedPackage, ImportError> {
        *stage = ImportStage::Extracting;
        debug!(package = %dir.display(), stage = %stage, "stage");
        let package = PackageDirectory::open(dir, &self.layout)?;
        let mut metadata = extract_metadata(&package.sidecar)?;
        let full_text = self.extractor.extract(&package.document).await?;
        metadata.set(Field::FullText, Some(full_text));
        metadata.tags = build_tags(&metadata);

        *stage = ImportStage::Reconciling;
        debug!(package = %dir.display(), stage = %stage, "stage");
        let upserted =
            catalog::upsert(self.catalog, &package.base_name(), &metadata, &self.options).await?;
        let record_id = upserted.record.id.clone().ok_or_else(|| {
            CatalogError::Decode(format!("dataset {} has no id", upserted.record.name))
        })?;

        *stage = ImportStage::AttachingFiles;
        debug!(package = %dir.display(), stage = %stage, "stage");
        let title = package.document_stem();
        let mut attachments = Vec::new();
        let document_format = self.layout.document_extension.to_uppercase();
        if let Some(file) = catalog::attach_file(
            self.catalog,
            &record_id,
            &package.document_file_name(),
            &title,
            &package.document,
            &document_format,
        )
        .await?
        {
            attachments.push(file);
        }
        let sidecar_format = self.layout.sidecar_extension.to_uppercase();
        if let Some(file) = catalog::attach_file(
            self.catalog,
            &record_id,
            &package.sidecar_file_name(),
            &title,
            &package.sidecar,
            &sidecar_format,
        )
        .await?
        {
            attachments.push(file);
        }

        *stage = ImportStage::Done;
        Ok(ImportedPackage {
            action: upserted.action,
            record: upserted.record,
            attachments,
        })
    }
}

/// `neat import <path>`: runs the pipeline and prints a summary.
///
/// With `dry_run`, datasets are reconciled against an empty in-memory
/// catalog instead of the configured one.
pub async fn run_import(
    config: &Config,
    root: &Path,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let layout = PackageLayout::from_config(&config.packages)
        .context("Invalid packages.ignore_globs")?;
    let extractor = create_extractor(&config.extraction)?;
    let options = UpsertOptions {
        owner_org: config.catalog.as_ref().and_then(|c| c.owner_org.clone()),
    };

    let report = if dry_run {
        let catalog = InMemoryCatalog::new();
        let importer = Importer::new(&catalog, extractor.as_ref(), layout).with_options(options);
        importer.run(root, limit).await?
    } else {
        let catalog_config = config
            .catalog
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("[catalog] is not configured"))?;
        let catalog = CkanApi::new(catalog_config)?;
        let importer = Importer::new(&catalog, extractor.as_ref(), layout).with_options(options);
        importer.run(root, limit).await?
    };

    print_report(&report, dry_run);

    if !report.is_success() {
        bail!(
            "{} of {} packages failed",
            report.failure_count(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn print_report(report: &ImportReport, dry_run: bool) {
    if dry_run {
        println!("import {} (dry-run)", report.root.display());
    } else {
        println!("import {}", report.root.display());
    }
    for (dir, imported) in report.succeeded() {
        println!(
            "  ok      {:<24} {} {} ({} files)",
            dir.display(),
            imported.action,
            imported.record.name,
            imported.attachments.len()
        );
    }
    for (dir, failure) in report.failed() {
        println!("  failed  {:<24} {}", dir.display(), failure);
    }
    let elapsed = report.finished_at - report.started_at;
    println!("  packages: {}", report.outcomes.len());
    println!("  succeeded: {}", report.outcomes.len() - report.failure_count());
    println!("  failed: {}", report.failure_count());
    println!("  elapsed: {}ms", elapsed.num_milliseconds());
}
