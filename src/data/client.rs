//! MeteoSwiss product API client
//!
//! This module performs single upstream calls: the version manifest and the
//! per-endpoint JSON documents. It has no knowledge of caching.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use super::meteo::UpstreamError;
use super::LocationCode;

/// Base URL of the MeteoSwiss product API
pub const DEFAULT_BASE_URL: &str = "https://www.meteoswiss.admin.ch/product/output/";

/// Endpoint name to version token, as served by `versions.json`
pub type VersionManifest = HashMap<String, String>;

/// Errors that can occur while fetching from the upstream
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout)
    #[error("failed to fetch data: {0}")]
    Transport(#[source] reqwest::Error),

    /// The upstream answered with a non-success status
    #[error("unexpected status code for {url}: {status}")]
    Status { url: Url, status: StatusCode },

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    /// The body matched neither the expected shape nor the error shape
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The upstream returned its own error document
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The version manifest has no entry for an endpoint
    #[error("version not found for api: {0}")]
    MissingVersion(String),

    /// A URL could not be built from the base URL
    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The current temperature is not a number
    #[error("can't convert temperature '{value}' to float: {source}")]
    Temperature {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    /// A fan-out task panicked or was cancelled
    #[error("fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Status and plain-text message shown to the client for a failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub message: String,
}

impl ClientResponse {
    /// The generic `500` every non-upstream failure collapses into
    pub fn internal_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "500 Internal Server Error".to_string(),
        }
    }
}

impl FetchError {
    /// Decides what the client sees for this error
    ///
    /// Upstream error documents are replayed with their own status and message,
    /// an upstream 4xx/5xx status is forwarded with its reason phrase, any
    /// other non-success status becomes a `502`, and everything else is a
    /// plain `500`.
    pub fn client_response(&self) -> ClientResponse {
        match self {
            FetchError::Upstream(err) => ClientResponse {
                status: StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: err.message.clone(),
            },
            // A 3xx can't carry an error body to the client
            FetchError::Status { status, .. } if status.as_u16() < 400 => ClientResponse {
                status: StatusCode::BAD_GATEWAY,
                message: "502 Bad Gateway".to_string(),
            },
            FetchError::Status { status, .. } => ClientResponse {
                status: *status,
                message: format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Upstream Error")
                ),
            },
            _ => ClientResponse::internal_error(),
        }
    }
}

/// Upstream endpoints the aggregator reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Current conditions and a short daily forecast
    WeatherWidget,
    /// Hourly chart series for the coming days
    ForecastChart,
}

impl Endpoint {
    /// Path template of the endpoint, also its key in the version manifest
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::WeatherWidget => "weather-widget/forecast",
            Endpoint::ForecastChart => "forecast-chart",
        }
    }
}

/// A resolved upstream URL for one endpoint and location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub endpoint: Endpoint,
    pub url: Url,
}

/// Builds `{base}{endpoint}/version__{version}/en/{code}.json?plz={code}`
///
/// The code is normalized to six digits before being embedded. Fails if the
/// manifest has no version for the endpoint.
pub fn build_url(
    base_url: &Url,
    endpoint: Endpoint,
    manifest: &VersionManifest,
    code: &LocationCode,
) -> Result<FetchTarget, FetchError> {
    let version = manifest
        .get(endpoint.path())
        .ok_or_else(|| FetchError::MissingVersion(endpoint.path().to_string()))?;
    let code = code.normalized();

    let mut url = base_url.join(&format!(
        "{}/version__{}/en/{}.json",
        endpoint.path(),
        version,
        code
    ))?;
    url.query_pairs_mut().append_pair("plz", &code);

    Ok(FetchTarget { endpoint, url })
}

/// Client for the MeteoSwiss product API
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: Url,
}

impl UpstreamClient {
    /// Create a client whose every call is bounded by `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Transport)?;
        Self::with_client(client, base_url)
    }

    /// Create a client around an existing HTTP client
    ///
    /// A trailing `/` is added to the base URL so endpoint paths join under it.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, FetchError> {
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves the URL of `endpoint` for `code`
    pub fn target(
        &self,
        endpoint: Endpoint,
        manifest: &VersionManifest,
        code: &LocationCode,
    ) -> Result<FetchTarget, FetchError> {
        build_url(&self.base_url, endpoint, manifest, code)
    }

    /// Fetch the endpoint version manifest
    pub async fn fetch_versions(&self) -> Result<VersionManifest, FetchError> {
        let url = self.base_url.join("versions.json")?;
        self.fetch_typed(&url).await
    }

    /// GET `url` and decode the body as `T`
    ///
    /// If the body is not a `T`, it is tried as an [`UpstreamError`] document,
    /// which then becomes the returned error. Otherwise the first decode
    /// error is returned.
    #[instrument(skip(self, url), fields(url = %url), level = "debug")]
    pub async fn fetch_typed<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }

        let body = response.bytes().await.map_err(FetchError::Body)?;

        match serde_json::from_slice::<T>(&body) {
            Ok(payload) => Ok(payload),
            Err(decode_err) => match serde_json::from_slice::<UpstreamError>(&body) {
                Ok(upstream) => {
                    tracing::error!(
                        status = upstream.status,
                        message = %upstream.message,
                        "meteoswiss api returned error"
                    );
                    Err(FetchError::Upstream(upstream))
                }
                Err(_) => Err(FetchError::Decode(decode_err)),
            },
        }
    }
}
