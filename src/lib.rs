//! # neat-sync
//!
//! Imports a directory tree of scanned document packages into a CKAN-style
//! data catalog.
//!
//! Each package directory holds one primary document and an optional XML
//! sidecar. The importer reads the sidecar's metadata, extracts the
//! document's full text, derives tags, reconciles a catalog dataset by name,
//! and attaches the document and sidecar as resources.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ Discovery │──▶│ Importer             │──▶│ CatalogApi   │
//! │ dirs      │   │ metadata+text+tags   │   │ CKAN/memory  │
//! └───────────┘   └──────────────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! neat show ./packages                  # list packages and their files
//! neat import ./packages --dry-run      # reconcile against an in-memory catalog
//! neat import ./packages                # import into the configured catalog
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Metadata and catalog data types |
//! | [`munge`] | Name and tag normalization |
//! | [`metadata`] | Sidecar metadata extraction |
//! | [`tags`] | Tag derivation |
//! | [`extract`] | Full-text extraction providers |
//! | [`catalog`] | Catalog abstraction, upsert, and attachment |
//! | [`ckan`] | CKAN action API client |
//! | [`memory`] | In-memory catalog for dry runs and tests |
//! | [`discovery`] | Package directory discovery |
//! | [`import`] | Import pipeline and run report |
//! | [`show`] | Read-only package listing |

pub mod catalog;
pub mod ckan;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod import;
pub mod memory;
pub mod metadata;
pub mod models;
pub mod munge;
pub mod show;
pub mod tags;
