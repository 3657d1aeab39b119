//! Full-text extraction for primary documents.
//!
//! The importer only depends on the [`TextExtractor`] trait. Two providers
//! ship with the crate:
//!
//! - **[`PdfTextExtractor`]**: local extraction with `pdf-extract`, run on a
//!   blocking worker thread.
//! - **[`TikaExtractor`]**: delegates to an Apache Tika server
//!   (`PUT /tika`, `Accept: text/plain`).
//!
//! Neither retries; a failed extraction fails the package.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ExtractionConfig;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unsupported document type: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("extraction service failed: {0}")]
    Service(String),
}

/// Obtains the text content of a binary document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Provider name for logs and summaries.
    fn name(&self) -> &str;

    async fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

async fn read_document(path: &Path) -> Result<Vec<u8>, ExtractionError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ExtractionError::Read {
            path: path.to_path_buf(),
            source,
        })
}

// ============ Local PDF ============

pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let is_pdf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            return Err(ExtractionError::Unsupported(path.display().to_string()));
        }
        let bytes = read_document(path).await?;
        // pdf-extract is CPU bound and may panic on hostile input; the join
        // error carries the panic.
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ExtractionError::Pdf(e.to_string()))?
            .map_err(|e| ExtractionError::Pdf(e.to_string()))
    }
}

// ============ Tika server ============

pub struct TikaExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl TikaExtractor {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ExtractionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ExtractionError::Service(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/tika", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TextExtractor for TikaExtractor {
    fn name(&self) -> &str {
        "tika"
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = read_document(path).await?;
        let response = self
            .client
            .put(&self.endpoint)
            .header("Accept", "text/plain")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ExtractionError::Service(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Service(e.to_string()))?;
        tika_response(path, status, body)
    }
}

/// Maps a Tika reply to extracted text. 415 means Tika has no parser for the
/// document; any other non-2xx status is a service failure.
fn tika_response(path: &Path, status: u16, body: String) -> Result<String, ExtractionError> {
    match status {
        200..=299 => Ok(body),
        415 => Err(ExtractionError::Unsupported(path.display().to_string())),
        _ => Err(ExtractionError::Service(format!("HTTP {}: {}", status, body))),
    }
}

/// Create the configured [`TextExtractor`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"pdf"` | [`PdfTextExtractor`] |
/// | `"tika"` | [`TikaExtractor`] |
pub fn create_extractor(
    config: &ExtractionConfig,
) -> Result<Box<dyn TextExtractor>, ExtractionError> {
    match config.provider.as_str() {
        "pdf" => Ok(Box::new(PdfTextExtractor)),
        "tika" => {
            let url = config.tika_url.as_deref().ok_or_else(|| {
                ExtractionError::Service("extraction.tika_url is not set".to_string())
            })?;
            let timeout = config.timeout_secs.map(Duration::from_secs);
            Ok(Box::new(TikaExtractor::new(url, timeout)?))
        }
        other => Err(ExtractionError::Service(format!(
            "unknown extraction provider: {}",
            other
        ))),
    }
}
