//! CKAN action API client.
//!
//! Implements [`CatalogApi`] over `{url}/api/3/action/<action>`:
//!
//! | Operation | Action | Request |
//! |-----------|--------|---------|
//! | `show` | `package_show` | `GET ?id=<name>` |
//! | `create` | `package_create` | `POST` JSON |
//! | `update` | `package_update` | `POST` JSON |
//! | `create_resource` | `resource_create` | `POST` multipart with `upload` |
//!
//! Every response is wrapped in `{"success": bool, "result": ..., "error": ...}`.
//! A `package_show` error of type `Not Found Error` becomes [`Lookup::NotFound`];
//! every other failure is a [`CatalogError`]. Nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::catalog::{CatalogApi, CatalogError, Lookup};
use crate::config::CatalogConfig;
use crate::models::{AttachedFile, CatalogRecord, ResourcePayload};

const NOT_FOUND_ERROR: &str = "Not Found Error";

pub struct CkanApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    error: Option<ActionError>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionError {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

enum ActionOutcome<T> {
    Success(T),
    Failed(ActionError),
}

impl CkanApi {
    /// Builds a client from `[catalog]` configuration.
    ///
    /// `CKAN_API_KEY` in the environment takes precedence over `api_key`.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let api_key = std::env::var("CKAN_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| config.api_key.clone());

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.base_url, action)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        action: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ActionOutcome<T>, CatalogError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        parse_action_response(action, status.as_u16(), &body)
    }

    async fn expect_success<T: DeserializeOwned>(
        &self,
        action: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CatalogError> {
        match self.send(action, request).await? {
            ActionOutcome::Success(result) => Ok(result),
            ActionOutcome::Failed(error) => Err(action_error(action, error)),
        }
    }
}

fn parse_action_response<T: DeserializeOwned>(
    action: &str,
    status: u16,
    body: &str,
) -> Result<ActionOutcome<T>, CatalogError> {
    let envelope: ActionResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(CatalogError::Decode(format!("{}: {}", action, e)))
        }
        Err(_) => {
            return Err(CatalogError::Http {
                status,
                body: body.to_string(),
            })
        }
    };

    if envelope.success {
        envelope
            .result
            .map(ActionOutcome::Success)
            .ok_or_else(|| CatalogError::Decode(format!("{}: missing result", action)))
    } else {
        Ok(ActionOutcome::Failed(envelope.error.unwrap_or_default()))
    }
}

fn action_error(action: &str, error: ActionError) -> CatalogError {
    CatalogError::Action {
        action: action.to_string(),
        kind: error.kind.unwrap_or_else(|| "Unknown Error".to_string()),
        message: error.message.unwrap_or_default(),
    }
}

#[async_trait]
impl CatalogApi for CkanApi {
    async fn show(&self, name: &str) -> Result<Lookup, CatalogError> {
        let request = self
            .client
            .get(self.action_url("package_show"))
            .query(&[("id", name)]);
        match self.send("package_show", request).await? {
            ActionOutcome::Success(record) => Ok(Lookup::Found(record)),
            ActionOutcome::Failed(error) if error.kind.as_deref() == Some(NOT_FOUND_ERROR) => {
                Ok(Lookup::NotFound)
            }
            ActionOutcome::Failed(error) => Err(action_error("package_show", error)),
        }
    }

    async fn create(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        let request = self
            .client
            .post(self.action_url("package_create"))
            .json(record);
        self.expect_success("package_create", request).await
    }

    async fn update(&self, record: &CatalogRecord) -> Result<CatalogRecord, CatalogError> {
        let request = self
            .client
            .post(self.action_url("package_update"))
            .json(record);
        self.expect_success("package_update", request).await
    }

    async fn create_resource(
        &self,
        resource: &ResourcePayload,
        content: Vec<u8>,
    ) -> Result<AttachedFile, CatalogError> {
        let size = content.len();
        let upload = reqwest::multipart::Part::bytes(content).file_name(resource.file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("package_id", resource.package_id.clone())
            .text("name", resource.name.clone())
            .text("title", resource.title.clone())
            .text("format", resource.format.clone())
            .text("hash", resource.hash.clone())
            .text("size", size.to_string())
            .part("upload", upload);
        let request = self
            .client
            .post(self.action_url("resource_create"))
            .multipart(form);
        self.expect_success("resource_create", request).await
    }
}
