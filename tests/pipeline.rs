//! End-to-end import runs against the in-memory catalog.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tempfile::TempDir;

use neat_sync::catalog::{CatalogApi, CatalogError, Lookup, UpsertAction};
use neat_sync::discovery::PackageLayout;
use neat_sync::extract::{ExtractionError, TextExtractor};
use neat_sync::import::{ImportError, ImportStage, Importer};
use neat_sync::memory::InMemoryCatalog;
use neat_sync::models::{AttachedFile, CatalogRecord, ResourcePayload};

/// Returns a fixed body, failing for packages in the named directories.
struct ScriptedExtractor {
    fail_in: Vec<&'static str>,
}

impl ScriptedExtractor {
    fn ok() -> Self {
        Self { fail_in: vec![] }
    }

    fn failing_in(dirs: &[&'static str]) -> Self {
        Self {
            fail_in: dirs.to_vec(),
        }
    }
}

#[async_trait]
impl TextExtractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let dir = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_in.iter().any(|d| *d == dir) {
            return Err(ExtractionError::Service(format!("cannot process {}", dir)));
        }
        Ok(format!("text of {}", dir))
    }
}

/// Delegates to an [`InMemoryCatalog`], failing lookups of one dataset and
/// uploads to another.
struct FailingCatalog {
    inner: InMemoryCatalog,
    fail_show: &'static str,
    fail_upload: &'static str,
}

fn unavailable(action: &str) -> CatalogError {
    CatalogError::Http {
        status: 503,
        body: format!("{} unavailable", action),
    }
}

#[async_trait]
impl CatalogApi for FailingCatalog {
    async fn show(&self, name: &str) -> Result<Lookup, CatalogError> {
        if name == self.fail_show {
            return Err(unavailable("package_show"));
        }
        self.inner.show(name).await
    }

    async fn create(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        self.inner.create(record).await
    }

    async fn update(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        self.inner.update(record).await
    }

    async fn create_resource(
        &self,
        resource: &ResourcePayload,
        content: Vec<u8>,
    ) -> Result<AttachedFile, CatalogError> {
        let target = self
            .inner
            .records()
            .into_iter()
            .find(|r| r.id.as_deref() == Some(resource.package_id.as_str()));
        if target.map(|r| r.name).as_deref() == Some(self.fail_upload) {
            return Err(unavailable("resource_create"));
        }
        self.inner.create_resource(resource, content).await
    }
}

fn sidecar(fields: &[(&str, &str)]) -> String {
    let mut xml = String::from(r#"<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">"#);
    for (name, value) in fields {
        xml.push_str(&format!("<dc:{0}>{1}</dc:{0}>", name, value));
    }
    xml.push_str("</metadata>");
    xml
}

fn write_package(root: &Path, dir: &str, sidecar_xml: Option<&str>) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("doc.pdf"), b"%PDF-1.4 placeholder").unwrap();
    if let Some(xml) = sidecar_xml {
        fs::write(dir.join("doc.xml"), xml).unwrap();
    }
}

#[tokio::test]
async fn imports_packages_with_and_without_sidecar() {
    let tmp = TempDir::new().unwrap();
    write_package(
        tmp.path(),
        "docA",
        Some(&sidecar(&[("creator", "Jane"), ("publisher", "Acme")])),
    );
    write_package(tmp.path(), "docB", None);

    let catalog = InMemoryCatalog::new();
    let extractor = ScriptedExtractor::ok();
    let importer = Importer::new(&catalog, &extractor, PackageLayout::default());
    let report = importer.run(tmp.path(), None).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 2);

    let a = catalog.record("doca-doc").expect("docA record");
    assert_eq!(a.author.as_deref(), Some("Jane"));
    assert_eq!(a.maintainer.as_deref(), Some("Acme"));
    assert_eq!(a.extra("full_text"), Some("text of docA"));
    assert!(a.tag_names().contains("jane"));
    assert!(a.tag_names().contains("acme"));
    let a_files = catalog.resources_for(a.id.as_deref().unwrap());
    let mut formats: Vec<&str> = a_files.iter().map(|f| f.format.as_str()).collect();
    formats.sort();
    assert_eq!(formats, vec!["PDF", "XML"]);

    let b = catalog.record("docb-doc").expect("docB record");
    assert_eq!(b.author, None);
    assert_eq!(b.maintainer, None);
    assert_eq!(b.title.as_deref(), Some("docB/doc"));
    let b_files = catalog.resources_for(b.id.as_deref().unwrap());
    assert_eq!(b_files.len(), 1);
    assert_eq!(b_files[0].format, "PDF");
    assert_eq!(b_files[0].name, "doc.pdf");
}

#[tokio::test]
async fn extraction_failure_is_isolated_to_its_package() {
    let tmp = TempDir::new().unwrap();
    for dir in ["one", "two", "three"] {
        write_package(tmp.path(), dir, None);
    }

    let catalog = InMemoryCatalog::new();
    let extractor = ScriptedExtractor::failing_in(&["two"]);
    let importer = Importer::new(&catalog, &extractor, PackageLayout::default());
    let report = importer.run(tmp.path(), None).await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.failure_count(), 1);
    let (dir, failure) = report.failed().next().unwrap();
    assert!(dir.ends_with("two"));
    assert_eq!(failure.stage, ImportStage::Extracting);
    assert!(matches!(failure.error, ImportError::Extraction(_)));

    let names: Vec<String> = catalog.records().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["one-doc", "three-doc"]);
}

#[tokio::test]
async fn catalog_failures_are_isolated_and_not_rolled_back() {
    let tmp = TempDir::new().unwrap();
    for dir in ["one", "two", "three"] {
        write_package(tmp.path(), dir, Some(&sidecar(&[("creator", "Jane")])));
    }

    let catalog = FailingCatalog {
        inner: InMemoryCatalog::new(),
        fail_show: "two-doc",
        fail_upload: "three-doc",
    };
    let extractor = ScriptedExtractor::ok();
    let importer = Importer::new(&catalog, &extractor, PackageLayout::default());
    let report = importer.run(tmp.path(), None).await.unwrap();

    let stages: Vec<(String, ImportStage)> = report
        .outcomes
        .iter()
        .map(|o| {
            let dir = o.directory.file_name().unwrap().to_string_lossy().into_owned();
            (dir, o.stage())
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            ("one".to_string(), ImportStage::Done),
            ("three".to_string(), ImportStage::AttachingFiles),
            ("two".to_string(), ImportStage::Reconciling),
        ]
    );
    for (_, failure) in report.failed() {
        assert!(matches!(failure.error, ImportError::Catalog(_)));
    }

    assert!(catalog.inner.record("two-doc").is_none());
    let three = catalog.inner.record("three-doc").expect("reconciled record kept");
    assert_eq!(three.author.as_deref(), Some("Jane"));
    assert!(catalog.inner.resources_for(three.id.as_deref().unwrap()).is_empty());
    let one = catalog.inner.record("one-doc").unwrap();
    assert_eq!(catalog.inner.resources_for(one.id.as_deref().unwrap()).len(), 2);
}

#[tokio::test]
async fn rerun_converges_to_latest_metadata() {
    let tmp = TempDir::new().unwrap();
    write_package(
        tmp.path(),
        "docA",
        Some(&sidecar(&[("creator", "Jane"), ("language", "de")])),
    );
    let catalog = InMemoryCatalog::new();
    let extractor = ScriptedExtractor::ok();
    let importer = Importer::new(&catalog, &extractor, PackageLayout::default());

    let first = importer.run(tmp.path(), None).await.unwrap();
    let (_, imported) = first.succeeded().next().unwrap();
    assert_eq!(imported.action, UpsertAction::Created);
    let id = imported.record.id.clone();

    fs::write(
        tmp.path().join("docA/doc.xml"),
        sidecar(&[("creator", "John"), ("date", "2011-03-01")]),
    )
    .unwrap();
    let second = importer.run(tmp.path(), None).await.unwrap();
    let (_, imported) = second.succeeded().next().unwrap();
    assert_eq!(imported.action, UpsertAction::Updated);

    let records = catalog.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, id);
    assert_eq!(record.author.as_deref(), Some("John"));
    assert_eq!(record.extra("date"), Some("2011-03-01"));
    assert_eq!(record.extra("language"), Some(""));
    assert!(!record.tag_names().contains("jane"));
    assert!(record.tag_names().contains("john"));
}

#[tokio::test]
async fn rerun_keeps_one_record_and_accumulates_attachments() {
    let tmp = TempDir::new().unwrap();
    write_package(tmp.path(), "docA", Some(&sidecar(&[("creator", "Jane")])));
    let catalog = InMemoryCatalog::new();
    let extractor = ScriptedExtractor::ok();
    let importer = Importer::new(&catalog, &extractor, PackageLayout::default());

    importer.run(tmp.path(), None).await.unwrap();
    let after_first = catalog.record("doca-doc").unwrap();
    importer.run(tmp.path(), None).await.unwrap();
    let after_second = catalog.record("doca-doc").unwrap();

    assert_eq!(catalog.records().len(), 1);
    assert_eq!(after_first.extras, after_second.extras);
    assert_eq!(after_first.tags, after_second.tags);
    let files = catalog.resources_for(after_second.id.as_deref().unwrap());
    assert_eq!(files.len(), 4);
}

#[tokio::test]
async fn limit_caps_processed_packages() {
    let tmp = TempDir::new().unwrap();
    for dir in ["a1", "a2", "a3"] {
        write_package(tmp.path(), dir, None);
    }
    let catalog = InMemoryCatalog::new();
    let extractor = ScriptedExtractor::ok();
    let importer = Importer::new(&catalog, &extractor, PackageLayout::default());

    let report = importer.run(tmp.path(), Some(2)).await.unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert!(catalog.record("a3-doc").is_none());
}

#[tokio::test]
async fn missing_root_aborts_the_run() {
    let tmp = TempDir::new().unwrap();
    let catalog = InMemoryCatalog::new();
    let extractor = ScriptedExtractor::ok();
    let importer = Importer::new(&catalog, &extractor, PackageLayout::default());

    assert!(importer.run(&tmp.path().join("nope"), None).await.is_err());
    assert_eq!(catalog.call_count(), 0);
}
