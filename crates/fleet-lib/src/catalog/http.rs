//! REST client for a remote pricing catalog

use super::PricingCatalog;
use crate::error::CollaboratorError;
use crate::models::{Architecture, PricingClass};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP catalog client configuration
#[derive(Debug, Clone)]
pub struct HttpCatalogConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for HttpCatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    hourly_price: f64,
}

#[derive(Debug, Deserialize)]
struct InstanceTypesResponse {
    instance_types: Vec<String>,
}

/// Pricing catalog backed by `GET /api/v1/prices/..` and
/// `GET /api/v1/instance-types/..`
pub struct HttpPricingCatalog {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpPricingCatalog {
    pub fn new(config: HttpCatalogConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(&config.base_url).context("Invalid catalog URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Catalog URL {} cannot carry a path", config.base_url);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            timeout: config.request_timeout,
        })
    }

    /// Base URL with `segments` appended, each one percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CollaboratorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CollaboratorError::InvalidResponse(format!("bad catalog URL {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, CollaboratorError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();

        debug!(url = %url, "Catalog request");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &path, body));
        }

        response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> CollaboratorError {
        if err.is_timeout() {
            CollaboratorError::Timeout(self.timeout)
        } else {
            CollaboratorError::Unavailable(err.to_string())
        }
    }
}

fn status_error(status: StatusCode, path: &str, body: String) -> CollaboratorError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CollaboratorError::Unauthorized(format!("{} ({})", path, status))
        }
        StatusCode::NOT_FOUND => CollaboratorError::NotFound(path.to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            CollaboratorError::Unavailable(format!("{}: {}", status, body))
        }
        s if s.is_server_error() => {
            CollaboratorError::Unavailable(format!("{}: {}", status, body))
        }
        _ => CollaboratorError::InvalidResponse(format!("{}: {}", status, body)),
    }
}

#[async_trait]
impl PricingCatalog for HttpPricingCatalog {
    async fn get_price(
        &self,
        instance_type: &str,
        class: PricingClass,
    ) -> Result<f64, CollaboratorError> {
        let response: PriceResponse = self
            .get(&["api", "v1", "prices", instance_type, class.as_str()])
            .await?;
        if !response.hourly_price.is_finite() || response.hourly_price < 0.0 {
            return Err(CollaboratorError::InvalidResponse(format!(
                "price {} for {}",
                response.hourly_price, instance_type
            )));
        }
        Ok(response.hourly_price)
    }

    async fn list_instance_types(
        &self,
        architecture: Architecture,
    ) -> Result<Vec<String>, CollaboratorError> {
        let response: InstanceTypesResponse = self
            .get(&["api", "v1", "instance-types", architecture.as_str()])
            .await?;
        Ok(response.instance_types)
    }
}
