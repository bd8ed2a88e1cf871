//! Command-line and environment configuration for the cache server
//!
//! Arguments are parsed with clap; each flag falls back to an environment
//! variable and then to a default. `ServerConfig::from_cli` validates them.

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::data::DEFAULT_BASE_URL;

/// Error types for configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The upstream base URL doesn't parse or isn't http(s)
    #[error("Invalid upstream URL: '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    /// A duration option was set to zero
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// MeteoSwiss cache - serve current conditions per postal code
#[derive(Parser, Debug)]
#[command(name = "meteo-cache")]
#[command(about = "Caching HTTP front for MeteoSwiss location forecasts")]
#[command(version)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Base URL of the MeteoSwiss product API
    #[arg(long, env = "UPSTREAM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub upstream_url: String,

    /// Timeout for each upstream call, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// How long a cached response is served, in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Log filter directives (e.g. "info,meteo_cache=debug")
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

/// Validated server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub addr: SocketAddr,
    /// Upstream base URL, always ending in `/`
    pub upstream_url: String,
    /// Bound on each upstream call
    pub upstream_timeout: Duration,
    /// TTL of cached responses
    pub cache_ttl: Duration,
    /// tracing-subscriber filter directives
    pub log_filter: String,
}

/// Checks that `raw` is an absolute http(s) URL and appends a trailing `/`
pub fn parse_upstream_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUpstreamUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    let mut normalized = url.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

impl ServerConfig {
    /// Creates a ServerConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(ServerConfig)` with validated settings
    /// * `Err(ConfigError)` if the upstream URL or a duration is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if cli.upstream_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("upstream timeout"));
        }
        if cli.cache_ttl_secs == 0 {
            return Err(ConfigError::ZeroDuration("cache TTL"));
        }

        Ok(ServerConfig {
            addr: SocketAddr::new(cli.bind, cli.port),
            upstream_url: parse_upstream_url(&cli.upstream_url)?,
            upstream_timeout: Duration::from_secs(cli.upstream_timeout_secs),
            cache_ttl: Duration::from_secs(cli.cache_ttl_secs),
            log_filter: cli.log_filter.clone(),
        })
    }
}
