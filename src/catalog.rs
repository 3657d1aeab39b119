//! Catalog reconciliation.
//!
//! [`CatalogApi`] is the narrow surface the importer needs from the remote
//! catalog: look a dataset up by name, create it, update it, and attach a
//! file. [`upsert`] and [`attach_file`] build the importer's create-or-update
//! semantics on top of it.
//!
//! # Reconciliation
//!
//! ```text
//! base name ──munge_name──▶ name ──show──┬─ Found(existing) ─▶ merge ─▶ update
//!                                        └─ NotFound ─────────────────▶ create
//! ```
//!
//! The record name is the only identity carried between runs. Repeated
//! imports of the same package therefore converge on one dataset, and the
//! newest run's extras replace the previous list wholesale.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    AttachedFile, CatalogRecord, Extra, Field, MetadataRecord, ResourcePayload, Tag,
};
use crate::munge::munge_name;

/// Sidecar fields that map to first-class dataset attributes. Everything
/// else becomes an extra.
pub const FIRST_CLASS_FIELDS: &[Field] = &[
    Field::Title,
    Field::Excerpt,
    Field::Creator,
    Field::Publisher,
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("catalog action {action} failed ({kind}): {message}")]
    Action {
        action: String,
        kind: String,
        message: String,
    },
    #[error("unexpected catalog response: {0}")]
    Decode(String),
    #[error("cannot read attachment {}: {source}", .path.display())]
    LocalFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of a lookup by name. A miss is an expected result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(CatalogRecord),
    NotFound,
}

/// Remote catalog operations consumed by the importer.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn show(&self, name: &str) -> Result<Lookup, CatalogError>;

    /// Creates a dataset; the catalog assigns its identifier.
    async fn create(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError>;

    /// Replaces the dataset identified by `record.id`.
    async fn update(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError>;

    async fn create_resource(
        &self,
        resource: &ResourcePayload,
        content: Vec<u8>,
    ) -> Result<AttachedFile, CatalogError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

impl std::fmt::Display for UpsertAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertAction::Created => f.write_str("created"),
            UpsertAction::Updated => f.write_str("updated"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Upserted {
    pub action: UpsertAction,
    pub record: CatalogRecord,
}

/// Options applied when building dataset payloads.
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
    /// Organization assigned to newly created datasets.
    pub owner_org: Option<String>,
}

/// Canonical dataset name for a package base name.
pub fn record_name(base_name: &str) -> String {
    munge_name(base_name)
}

/// Creates or fully updates the dataset for `base_name`.
pub async fn upsert(
    api: &dyn CatalogApi,
    base_name: &str,
    metadata: &MetadataRecord,
    options: &UpsertOptions,
) -> Result<Upserted, CatalogError> {
    let name = record_name(base_name);
    let fresh = build_record(&name, base_name, metadata);

    match api.show(&name).await? {
        Lookup::Found(existing) => {
            let merged = merge_into(existing, fresh);
            debug!(name = %name, id = ?merged.id, "updating existing dataset");
            let record = api.update(&merged).await?;
            info!(name = %record.name, "dataset updated");
            Ok(Upserted {
                action: UpsertAction::Updated,
                record,
            })
        }
        Lookup::NotFound => {
            let mut payload = fresh;
            if let Some(org) = &options.owner_org {
                payload
                    .other
                    .insert("owner_org".to_string(), Value::from(org.clone()));
            }
            debug!(name = %name, "creating dataset");
            let record = api.create(&payload).await?;
            info!(name = %record.name, id = ?record.id, "dataset created");
            Ok(Upserted {
                action: UpsertAction::Created,
                record,
            })
        }
    }
}

/// Builds the dataset payload for a package from its metadata.
pub fn build_record(name: &str, base_name: &str, metadata: &MetadataRecord) -> CatalogRecord {
    let extras = metadata
        .fields()
        .filter(|(field, _)| !FIRST_CLASS_FIELDS.contains(field))
        .map(|(field, value)| Extra {
            key: field.key().to_string(),
            value: value.unwrap_or_default().to_string(),
        })
        .collect();

    CatalogRecord {
        id: None,
        name: name.to_string(),
        title: Some(
            metadata
                .get(Field::Title)
                .unwrap_or(base_name)
                .to_string(),
        ),
        notes: metadata.get(Field::Excerpt).map(str::to_string),
        author: metadata.get(Field::Creator).map(str::to_string),
        maintainer: metadata.get(Field::Publisher).map(str::to_string),
        tags: metadata
            .tags
            .iter()
            .map(|name| Tag { name: name.clone() })
            .collect(),
        extras,
        other: Default::default(),
    }
}

/// Overwrites the importer-managed attributes of `existing` with `fresh`.
///
/// Identifier and unmanaged attributes of `existing` survive; extras and tags
/// are replaced, not merged.
fn merge_into(mut existing: CatalogRecord, fresh: CatalogRecord) -> CatalogRecord {
    existing.name = fresh.name;
    existing.title = fresh.title;
    existing.notes = fresh.notes;
    existing.author = fresh.author;
    existing.maintainer = fresh.maintainer;
    existing.tags = fresh.tags;
    existing.extras = fresh.extras;
    existing
}

/// Uploads `local_path` as a new attachment of `record_id`.
///
/// Returns `Ok(None)` without contacting the catalog when the file does not
/// exist. Every call creates a new attachment.
pub async fn attach_file(
    api: &dyn CatalogApi,
    record_id: &str,
    name: &str,
    title: &str,
    local_path: &Path,
    format: &str,
) -> Result<Option<AttachedFile>, CatalogError> {
    if !local_path.is_file() {
        debug!(path = %local_path.display(), "no file to attach");
        return Ok(None);
    }
    let content = tokio::fs::read(local_path)
        .await
        .map_err(|source| CatalogError::LocalFile {
            path: local_path.to_path_buf(),
            source,
        })?;

    let payload = ResourcePayload {
        package_id: record_id.to_string(),
        name: name.to_string(),
        title: title.to_string(),
        format: format.to_string(),
        file_name: local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string()),
        hash: format!("{:x}", Sha256::digest(&content)),
    };
    let attached = api.create_resource(&payload, content).await?;
    debug!(record = record_id, name = name, format = format, "attached file");
    Ok(Some(attached))
}
