//! Core data models for the MeteoSwiss cache
//!
//! This module contains the location code used as cache key, the normalized
//! weather report served to clients, and the upstream client and aggregator
//! that produce it.

pub mod aggregate;
pub mod client;
pub mod meteo;

pub use aggregate::Aggregator;
pub use client::{
    build_url, ClientResponse, Endpoint, FetchError, FetchTarget, UpstreamClient,
    VersionManifest, DEFAULT_BASE_URL,
};
pub use meteo::{ForecastChartDay, UpstreamError, Widget};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minimum length of a code once embedded in an upstream URL
const NORMALIZED_CODE_LEN: usize = 6;

/// Error returned when a path segment is not a 4-6 digit location code
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid location code: '{0}'")]
pub struct InvalidCode(pub String);

/// A validated 4-6 digit postal code identifying a forecast location
///
/// The code doubles as the cache key, so it is kept exactly as the client sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationCode(String);

impl LocationCode {
    /// The code as received, used as cache key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code right-padded with `'0'` to six digits, as the upstream expects
    ///
    /// `"1234"` becomes `"123400"`; six-digit codes are returned unchanged.
    pub fn normalized(&self) -> String {
        format!("{:0<width$}", self.0, width = NORMALIZED_CODE_LEN)
    }
}

impl FromStr for LocationCode {
    type Err = InvalidCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = (4..=6).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidCode(s.to_string()))
        }
    }
}

impl fmt::Display for LocationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current conditions for one location, as served to clients
///
/// Built once per aggregation from the widget endpoint and serialized immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Name of the city the code resolves to
    pub city_name: String,
    /// Current temperature in Celsius
    pub current_temperature: f64,
    /// Upstream timestamp of the observation (ms since epoch)
    pub timestamp: i64,
    /// MeteoSwiss weather symbol identifier
    pub symbol_id: i32,
}
