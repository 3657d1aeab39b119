//! Core data models used throughout the importer.
//!
//! [`MetadataRecord`] is the transient per-package working state built from a
//! sidecar file. [`CatalogRecord`] and [`AttachedFile`] mirror the remote
//! catalog's dataset and resource shapes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every field a [`MetadataRecord`] carries.
///
/// Sidecar-backed fields are declared together with their path expression in
/// [`crate::metadata::FIELD_QUERIES`]; [`Field::FullText`] is filled by the
/// text extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Creator,
    Contributor,
    Publisher,
    Source,
    Language,
    Date,
    DocumentNumber,
    Excerpt,
    ScanResolution,
    ScanColorDepth,
    ScanDevice,
    GenerationSoftware,
    GenerationDate,
    FullText,
}

pub const FIELD_COUNT: usize = 15;

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Title,
        Field::Creator,
        Field::Contributor,
        Field::Publisher,
        Field::Source,
        Field::Language,
        Field::Date,
        Field::DocumentNumber,
        Field::Excerpt,
        Field::ScanResolution,
        Field::ScanColorDepth,
        Field::ScanDevice,
        Field::GenerationSoftware,
        Field::GenerationDate,
        Field::FullText,
    ];

    /// Key used for this field in catalog extras.
    pub fn key(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Creator => "creator",
            Field::Contributor => "contributor",
            Field::Publisher => "publisher",
            Field::Source => "source",
            Field::Language => "language",
            Field::Date => "date",
            Field::DocumentNumber => "document_number",
            Field::Excerpt => "excerpt",
            Field::ScanResolution => "scan_resolution",
            Field::ScanColorDepth => "scan_color_depth",
            Field::ScanDevice => "scan_device",
            Field::GenerationSoftware => "generation_software",
            Field::GenerationDate => "generation_date",
            Field::FullText => "full_text",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Metadata extracted for one package directory.
///
/// Every [`Field`] always has a slot; absent values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    values: [Option<String>; FIELD_COUNT],
    pub tags: BTreeSet<String>,
}

impl MetadataRecord {
    /// A record with every field absent.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values[field.index()].as_deref()
    }

    /// Stores a value; blank strings are stored as absent.
    pub fn set(&mut self, field: Field, value: Option<String>) {
        self.values[field.index()] = value.filter(|v| !v.trim().is_empty());
    }

    /// Iterates all fields in declaration order, including absent ones.
    pub fn fields(&self) -> impl Iterator<Item = (Field, Option<&str>)> + '_ {
        Field::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none) && self.tags.is_empty()
    }
}

/// A dataset tag as exchanged with the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// A free-form key/value pair on a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extra {
    pub key: String,
    pub value: String,
}

/// The remote dataset representation.
///
/// Attributes the importer does not manage are kept in `other` so an update
/// sends them back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub maintainer: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub extras: Vec<Extra>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CatalogRecord {
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn tag_names(&self) -> BTreeSet<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}

/// A file linked to a [`CatalogRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachedFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub package_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Metadata sent alongside the content of a new attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePayload {
    pub package_id: String,
    pub name: String,
    pub title: String,
    pub format: String,
    pub file_name: String,
    pub hash: String,
}
