//! MeteoSwiss wire types
//!
//! Shapes of the JSON documents served by the upstream product API. Only the
//! fields the aggregator reads are required; everything else defaults so that
//! upstream additions or omissions don't fail a decode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error document returned by the upstream in place of a regular payload
///
/// Carries the status and message that are replayed verbatim to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamError {
    pub status: u16,
    pub message: String,
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API error: {} {}", self.status, self.message)
    }
}

impl std::error::Error for UpstreamError {}

/// Response of the `weather-widget/forecast` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Widget {
    pub data: WidgetData,
}

/// Location and current conditions from the widget endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct WidgetData {
    pub city_name: String,
    pub timestamp: i64,
    #[serde(rename = "weather_symbol_id")]
    pub symbol_id: i32,
    pub current: CurrentConditions,
    #[serde(default)]
    pub altitude: i32,
    #[serde(default)]
    pub coord_x: i64,
    #[serde(default)]
    pub coord_y: i64,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub forecasts: Vec<DailyForecast>,
}

/// Current conditions; the upstream sends numbers as strings here
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentConditions {
    pub temperature: String,
    #[serde(default, rename = "weather_symbol_id")]
    pub symbol_id: String,
}

/// One day of the widget's short forecast
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DailyForecast {
    pub weekday: String,
    pub noon: i64,
    pub temp_high: String,
    pub temp_low: String,
    pub precip_min: String,
    pub precip_mean: String,
    pub precip_max: String,
    #[serde(rename = "weather_symbol_id")]
    pub symbol_id: String,
}

/// One day of the `forecast-chart` endpoint
///
/// Series are `[timestamp, value, ...]` rows as sent by the upstream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForecastChartDay {
    pub current_time: i64,
    pub current_time_string: String,
    pub day_string: String,
    pub min_date: i64,
    pub max_date: i64,
    pub new_day: Option<i64>,
    pub sunrise: i64,
    pub sunset: i64,
    pub temperature: Vec<Vec<f64>>,
    pub rainfall: Vec<Vec<f64>>,
    pub sunshine: Vec<Vec<f64>>,
    pub variance_rain: Vec<Vec<f64>>,
    pub variance_range: Vec<Vec<f64>>,
    pub wind_speed_variance: Vec<Vec<f64>>,
    pub wind_gust_speed_variance: Vec<Vec<f64>>,
    pub symbol_day: ChartSymbol,
    pub symbols: Vec<ChartSymbol>,
    pub wind: ChartWind,
    pub wind_gust_peak: ChartSeries,
}

/// Weather symbol at a point in time
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChartSymbol {
    pub timestamp: i64,
    #[serde(rename = "weather_symbol_id")]
    pub symbol_id: i32,
}

/// Wind series with its direction symbols
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChartWind {
    pub data: Vec<Vec<f64>>,
    pub symbols: Vec<WindSymbol>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WindSymbol {
    pub symbol_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChartSeries {
    pub data: Vec<Vec<f64>>,
}
