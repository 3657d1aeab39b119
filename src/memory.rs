//! In-memory [`CatalogApi`] implementation for tests and dry runs.
//!
//! Behaves like the remote catalog for the operations the importer uses:
//! names are unique, identifiers are assigned on creation, updates require
//! an existing identifier, and every resource upload adds a new attachment.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::{CatalogApi, CatalogError, Lookup};
use crate::models::{AttachedFile, CatalogRecord, ResourcePayload};

#[derive(Default)]
struct State {
    records: BTreeMap<String, CatalogRecord>,
    resources: Vec<AttachedFile>,
    calls: usize,
}

/// In-memory catalog keyed by dataset name.
pub struct InMemoryCatalog {
    state: RwLock<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// All datasets, ordered by name.
    pub fn records(&self) -> Vec<CatalogRecord> {
        self.read().records.values().cloned().collect()
    }

    pub fn record(&self, name: &str) -> Option<CatalogRecord> {
        self.read().records.get(name).cloned()
    }

    /// Attachments of a dataset in upload order.
    pub fn resources_for(&self, record_id: &str) -> Vec<AttachedFile> {
        self.read()
            .resources
            .iter()
            .filter(|r| r.package_id == record_id)
            .cloned()
            .collect()
    }

    /// Number of catalog operations served so far.
    pub fn call_count(&self) -> usize {
        self.read().calls
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.calls += 1;
        state
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(action: &str, what: &str) -> CatalogError {
    CatalogError::Action {
        action: action.to_string(),
        kind: "Not Found Error".to_string(),
        message: format!("{} not found", what),
    }
}

#[async_trait]
impl CatalogApi for InMemoryCatalog {
    async fn show(&self, name: &str) -> Result<Lookup, CatalogError> {
        let state = self.write();
        Ok(match state.records.get(name) {
            Some(record) => Lookup::Found(record.clone()),
            None => Lookup::NotFound,
        })
    }

    async fn create(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        let mut state = self.write();
        if state.records.contains_key(&record.name) {
            return Err(CatalogError::Action {
                action: "package_create".to_string(),
                kind: "Validation Error".to_string(),
                message: format!("name '{}' is already in use", record.name),
            });
        }
        let mut created = record.clone();
        created.id = Some(Uuid::new_v4().to_string());
        state.records.insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        let mut state = self.write();
        let id = record
            .id
            .as_deref()
            .ok_or_else(|| not_found("package_update", "dataset without id"))?;
        let previous_name = state
            .records
            .iter()
            .find(|(_, r)| r.id.as_deref() == Some(id))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| not_found("package_update", id))?;
        state.records.remove(&previous_name);
        state.records.insert(record.name.clone(), record.clone());
        Ok(record.clone())
    }

    async fn create_resource(
        &self,
        resource: &ResourcePayload,
        content: Vec<u8>,
    ) -> Result<AttachedFile, CatalogError> {
        let mut state = self.write();
        if !state
            .records
            .values()
            .any(|r| r.id.as_deref() == Some(resource.package_id.as_str()))
        {
            return Err(not_found("resource_create", &resource.package_id));
        }
        let attached = AttachedFile {
            id: Some(Uuid::new_v4().to_string()),
            package_id: resource.package_id.clone(),
            name: resource.name.clone(),
            title: Some(resource.title.clone()),
            format: resource.format.clone(),
            size: Some(content.len() as u64),
            hash: Some(resource.hash.clone()),
            url: Some(format!("memory://{}/{}", resource.package_id, resource.file_name)),
        };
        state.resources.push(attached.clone());
        Ok(attached)
    }
}
