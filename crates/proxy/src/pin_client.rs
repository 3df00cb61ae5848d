//! Out-of-band registration of extracted pins.

use crate::error::{ProxyError, Result};
use crate::extractor::PinCandidate;
use async_trait::async_trait;
use cidfan_core::config::ProxyConfig;
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, instrument};

/// Receives the pin candidates of a completed response.
#[async_trait]
pub trait PinSink: Send + Sync + 'static {
    async fn register(&self, pins: Vec<PinCandidate>) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PinRequest<'a> {
    api_key: &'a str,
    pins: &'a [PinCandidate],
}

/// Posts `{apiKey, pins}` to the backing API.
#[derive(Clone)]
pub struct HttpPinRegistrar {
    endpoint: Url,
    api_key: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpPinRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPinRegistrar")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpPinRegistrar {
    pub fn new(endpoint: &str, api_key: impl Into<String>, http: reqwest::Client) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| ProxyError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            http,
        })
    }

    /// Build from the `proxy` config section, if it names an endpoint.
    pub fn from_config(config: &ProxyConfig, http: reqwest::Client) -> Result<Option<Self>> {
        config.validate().map_err(ProxyError::InvalidEndpoint)?;
        match (&config.pin_endpoint, &config.api_key) {
            (Some(endpoint), Some(api_key)) => Self::new(endpoint, api_key.clone(), http).map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PinSink for HttpPinRegistrar {
    #[instrument(skip(self, pins), fields(count = pins.len()))]
    async fn register(&self, pins: Vec<PinCandidate>) -> Result<()> {
        if pins.is_empty() {
            return Ok(());
        }
        let body = PinRequest {
            api_key: &self.api_key,
            pins: &pins,
        };
        let response = self.http.post(self.endpoint.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Http {
                status: status.as_u16(),
                body,
            });
        }
        debug!("pins registered");
        Ok(())
    }
}
