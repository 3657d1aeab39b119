use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: Option<CatalogConfig>,
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub owner_org: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PackagesConfig {
    #[serde(default = "default_document_extension")]
    pub document_extension: String,
    #[serde(default = "default_sidecar_extension")]
    pub sidecar_extension: String,
    #[serde(default = "default_ignore_globs")]
    pub ignore_globs: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            document_extension: default_document_extension(),
            sidecar_extension: default_sidecar_extension(),
            ignore_globs: default_ignore_globs(),
        }
    }
}

fn default_document_extension() -> String {
    "pdf".to_string()
}
fn default_sidecar_extension() -> String {
    "xml".to_string()
}
fn default_ignore_globs() -> Vec<String> {
    vec!["Thumbs.db".to_string(), ".DS_Store".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub tika_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            tika_url: None,
            timeout_secs: None,
        }
    }
}

fn default_provider() -> String {
    "pdf".to_string()
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate packages
    let packages = &config.packages;
    if packages.document_extension.trim().is_empty() {
        bail!("packages.document_extension must not be empty");
    }
    if packages.sidecar_extension.trim().is_empty() {
        bail!("packages.sidecar_extension must not be empty");
    }
    if packages
        .document_extension
        .eq_ignore_ascii_case(&packages.sidecar_extension)
    {
        bail!("packages.document_extension and packages.sidecar_extension must differ");
    }

    // Validate catalog
    if let Some(catalog) = &config.catalog {
        if catalog.url.trim().is_empty() {
            bail!("catalog.url must not be empty");
        }
    }

    // Validate extraction
    match config.extraction.provider.as_str() {
        "pdf" => {}
        "tika" => {
            if config.extraction.tika_url.is_none() {
                bail!("extraction.tika_url must be set when provider is 'tika'");
            }
        }
        other => bail!(
            "Unknown extraction provider: '{}'. Must be pdf or tika.",
            other
        ),
    }

    Ok(config)
}
