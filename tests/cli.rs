use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn neat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("neat");
    path
}

fn run_neat(args: &[&str], config: &Path) -> Output {
    Command::new(neat_binary())
        .args(args)
        .arg("--config")
        .arg(config)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run neat")
}

/// Single-page PDF whose content stream shows `phrase`.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!("<< /Length {} >> stream\n{}\nendstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// A package root with `docA` (document + sidecar) and `docB` (document only).
fn setup_packages() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("packages");

    let doc_a = root.join("docA");
    fs::create_dir_all(&doc_a).unwrap();
    fs::write(doc_a.join("doc.pdf"), minimal_pdf("tunnel survey")).unwrap();
    fs::write(
        doc_a.join("doc.xml"),
        r#"<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
  <dc:creator>Jane</dc:creator>
  <dc:publisher>Acme</dc:publisher>
</metadata>"#,
    )
    .unwrap();
    fs::write(doc_a.join("Thumbs.db"), b"").unwrap();

    let doc_b = root.join("docB");
    fs::create_dir_all(&doc_b).unwrap();
    fs::write(doc_b.join("doc.pdf"), minimal_pdf("bridge plan")).unwrap();

    (tmp, root)
}

#[test]
fn no_arguments_prints_usage() {
    let output = Command::new(neat_binary()).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}

#[test]
fn import_help_explains_dry_run_reports() {
    let output = Command::new(neat_binary())
        .args(["import", "--help"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--dry-run"));
    assert!(stdout.contains("starts empty"), "stdout: {}", stdout);
}

#[test]
fn unknown_subcommand_fails() {
    let output = Command::new(neat_binary()).arg("frobnicate").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn show_lists_packages_without_config() {
    let (tmp, root) = setup_packages();
    let output = run_neat(
        &["show", root.to_str().unwrap()],
        &tmp.path().join("missing.toml"),
    );
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("docA"));
    assert!(stdout.contains("doca-doc"));
    assert!(stdout.contains("doc.xml"));
    assert!(stdout.contains("docb-doc"));
    assert!(!stdout.contains("Thumbs.db"));
    assert!(stdout.contains("2 packages"));
}

#[test]
fn import_dry_run_reports_created_datasets() {
    let (tmp, root) = setup_packages();
    let config = tmp.path().join("neat.toml");
    fs::write(
        &config,
        r#"
[catalog]
url = "http://127.0.0.1:9"
owner_org = "neat"
"#,
    )
    .unwrap();

    let output = run_neat(&["import", root.to_str().unwrap(), "--dry-run"], &config);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {}\n{:?}", stdout, output);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("doca-doc"));
    assert!(stdout.contains("docb-doc"));
    assert!(stdout.contains("created"));
    assert!(stdout.contains("failed: 0"));
}

#[test]
fn import_dry_run_fails_when_a_package_fails() {
    let (tmp, root) = setup_packages();
    fs::write(root.join("docB/doc.xml"), "<metadata><unclosed>").unwrap();

    let output = run_neat(
        &["import", root.to_str().unwrap(), "--dry-run"],
        &tmp.path().join("missing.toml"),
    );
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("doca-doc"));
    assert!(stdout.contains("failed  "));
    assert!(stdout.contains("docB"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 of 2 packages failed"), "stderr: {}", stderr);
}

#[test]
fn import_requires_config() {
    let (tmp, root) = setup_packages();
    let output = run_neat(
        &["import", root.to_str().unwrap()],
        &tmp.path().join("missing.toml"),
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn import_with_missing_root_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run_neat(
        &["import", tmp.path().join("nope").to_str().unwrap(), "--dry-run"],
        &tmp.path().join("missing.toml"),
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("package root does not exist"), "stderr: {}", stderr);
}
