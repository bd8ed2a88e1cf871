//! Fan-out aggregation of upstream endpoints
//!
//! Resolves the version manifest, fetches every endpoint for a location
//! concurrently and folds the results into one [`WeatherReport`].

use futures::future::try_join;
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::{instrument, Instrument};

use super::client::{Endpoint, FetchError, FetchTarget, UpstreamClient};
use super::meteo::{ForecastChartDay, Widget};
use super::{LocationCode, WeatherReport};

/// Produces weather reports from the upstream, one request at a time
#[derive(Debug, Clone)]
pub struct Aggregator {
    client: UpstreamClient,
}

impl Aggregator {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// Fetch all endpoints for `code` and build its report
    ///
    /// The manifest is fetched first since every endpoint URL depends on it.
    /// Endpoint fetches then run as separate tasks; the first one to fail
    /// decides the result and the others are left to finish on their own.
    #[instrument(skip(self, code), fields(code = %code))]
    pub async fn aggregate(&self, code: &LocationCode) -> Result<WeatherReport, FetchError> {
        let manifest = self.client.fetch_versions().await?;

        let widget_target = self.client.target(Endpoint::WeatherWidget, &manifest, code)?;
        let chart_target = self.client.target(Endpoint::ForecastChart, &manifest, code)?;

        let widget = self.spawn_fetch::<Widget>(widget_target);
        let chart = self.spawn_fetch::<Vec<ForecastChartDay>>(chart_target);

        let (widget, forecast_chart) = try_join(widget, chart).await?;
        // TODO: fold the chart series into the report once the response format carries them
        tracing::debug!(days = forecast_chart.len(), "forecast chart fetched");

        build_report(widget)
    }

    /// Runs one endpoint fetch on its own task
    ///
    /// The task runs inside the caller's span. Dropping the returned future
    /// detaches the task rather than aborting it.
    fn spawn_fetch<T>(&self, target: FetchTarget) -> impl Future<Output = Result<T, FetchError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.client.clone();
        let handle = tokio::spawn(async move {
            let result = client.fetch_typed::<T>(&target.url).await;
            if let Err(err) = &result {
                tracing::debug!(endpoint = ?target.endpoint, error = %err, "endpoint fetch failed");
            }
            result
        }
        .in_current_span());

        async move { handle.await? }
    }
}

/// Normalizes the widget payload; the temperature arrives as a string
fn build_report(widget: Widget) -> Result<WeatherReport, FetchError> {
    let data = widget.data;
    let current_temperature = data
        .current
        .temperature
        .parse::<f64>()
        .map_err(|source| FetchError::Temperature {
            value: data.current.temperature.clone(),
            source,
        })?;

    Ok(WeatherReport {
        city_name: data.city_name,
        current_temperature,
        timestamp: data.timestamp,
        symbol_id: data.symbol_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path, query_param};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::{Layer, Registry};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WIDGET_PATH: &str = "/weather-widget/forecast/version__w1/en/800100.json";
    const CHART_PATH: &str = "/forecast-chart/version__c1/en/800100.json";

    fn widget_body(temperature: &str) -> serde_json::Value {
        serde_json::json!({
            "data": {
                "city_name": "Zürich",
                "timestamp": 1700000000,
                "weather_symbol_id": 3,
                "current": { "temperature": temperature, "weather_symbol_id": "3" },
                "location_id": "800100"
            }
        })
    }

    fn chart_body() -> serde_json::Value {
        serde_json::json!([
            { "day_string": "Tue", "temperature": [[1700000000000.0, 12.5]] },
            { "day_string": "Wed", "temperature": [[1700086400000.0, 9.0]] }
        ])
    }

    async fn mount_versions(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "weather-widget/forecast": "w1",
                "forecast-chart": "c1"
            })))
            .mount(server)
            .await;
    }

    async fn mount(server: &MockServer, endpoint_path: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(endpoint_path))
            .and(query_param("plz", "800100"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn aggregator_for(server: &MockServer) -> Aggregator {
        let client = UpstreamClient::new(&server.uri(), Duration::from_secs(5)).expect("client should build");
        Aggregator::new(client)
    }

    fn code() -> LocationCode {
        "8001".parse().expect("valid code")
    }

    fn expected_report() -> WeatherReport {
        WeatherReport {
            city_name: "Zürich".to_string(),
            current_temperature: 12.5,
            timestamp: 1_700_000_000,
            symbol_id: 3,
        }
    }

    #[tokio::test]
    async fn test_aggregate_success() {
        let server = MockServer::start().await;
        mount_versions(&server).await;
        mount(&server, WIDGET_PATH, ResponseTemplate::new(200).set_body_json(widget_body("12.5"))).await;
        mount(&server, CHART_PATH, ResponseTemplate::new(200).set_body_json(chart_body())).await;

        let report = aggregator_for(&server).aggregate(&code()).await.expect("aggregation should succeed");

        assert_eq!(report, expected_report());
    }

    #[tokio::test]
    async fn test_aggregate_result_independent_of_completion_order() {
        for trial in 0..6 {
            let (widget_delay, chart_delay) = if trial % 2 == 0 {
                (Duration::from_millis(80), Duration::ZERO)
            } else {
                (Duration::ZERO, Duration::from_millis(80))
            };

            let server = MockServer::start().await;
            mount_versions(&server).await;
            mount(
                &server,
                WIDGET_PATH,
                ResponseTemplate::new(200).set_body_json(widget_body("12.5")).set_delay(widget_delay),
            )
            .await;
            mount(
                &server,
                CHART_PATH,
                ResponseTemplate::new(200).set_body_json(chart_body()).set_delay(chart_delay),
            )
            .await;

            let report = aggregator_for(&server).aggregate(&code()).await.expect("aggregation should succeed");

            assert_eq!(report, expected_report(), "trial {} produced a different report", trial);
        }
    }

    #[tokio::test]
    async fn test_aggregate_widget_failure_wins() {
        let server = MockServer::start().await;
        mount_versions(&server).await;
        mount(
            &server,
            WIDGET_PATH,
            ResponseTemplate::new(200).set_body_string(r#"{"status":503,"message":"maintenance"}"#),
        )
        .await;
        mount(&server, CHART_PATH, ResponseTemplate::new(200).set_body_json(chart_body())).await;

        let result = aggregator_for(&server).aggregate(&code()).await;

        match result {
            Err(FetchError::Upstream(err)) => {
                assert_eq!(err.status, 503);
                assert_eq!(err.message, "maintenance");
            }
            other => panic!("Expected Upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aggregate_chart_failure_wins() {
        let server = MockServer::start().await;
        mount_versions(&server).await;
        mount(&server, WIDGET_PATH, ResponseTemplate::new(200).set_body_json(widget_body("12.5"))).await;
        mount(&server, CHART_PATH, ResponseTemplate::new(500)).await;

        let result = aggregator_for(&server).aggregate(&code()).await;

        match result {
            Err(FetchError::Status { status, url }) => {
                assert_eq!(status.as_u16(), 500);
                assert!(url.path().starts_with("/forecast-chart/"));
            }
            other => panic!("Expected Status error from the chart endpoint, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aggregate_does_not_wait_for_slow_sibling() {
        let server = MockServer::start().await;
        mount_versions(&server).await;
        mount(
            &server,
            WIDGET_PATH,
            ResponseTemplate::new(200).set_body_json(widget_body("12.5")).set_delay(Duration::from_secs(2)),
        )
        .await;
        mount(&server, CHART_PATH, ResponseTemplate::new(502)).await;

        let started = Instant::now();
        let result = aggregator_for(&server).aggregate(&code()).await;

        assert!(matches!(result, Err(FetchError::Status { .. })));
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "first error should surface before the slow widget completes"
        );
    }

    #[tokio::test]
    async fn test_aggregate_unparseable_temperature() {
        let server = MockServer::start().await;
        mount_versions(&server).await;
        mount(&server, WIDGET_PATH, ResponseTemplate::new(200).set_body_json(widget_body("warm"))).await;
        mount(&server, CHART_PATH, ResponseTemplate::new(200).set_body_json(chart_body())).await;

        let result = aggregator_for(&server).aggregate(&code()).await;

        match result {
            Err(FetchError::Temperature { value, .. }) => assert_eq!(value, "warm"),
            other => panic!("Expected Temperature error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aggregate_manifest_failure_skips_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WIDGET_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(widget_body("12.5")))
            .expect(0)
            .mount(&server)
            .await;

        let result = aggregator_for(&server).aggregate(&code()).await;

        assert!(matches!(result, Err(FetchError::Status { .. })));
    }

    #[tokio::test]
    async fn test_aggregate_missing_manifest_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/versions.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "weather-widget/forecast": "w1"
            })))
            .mount(&server)
            .await;

        let result = aggregator_for(&server).aggregate(&code()).await;

        match result {
            Err(FetchError::MissingVersion(endpoint)) => assert_eq!(endpoint, "forecast-chart"),
            other => panic!("Expected MissingVersion error, got {:?}", other),
        }
    }

    /// Records each event's message with the names of its enclosing spans
    #[derive(Clone, Default)]
    struct SpanCapture {
        events: Arc<Mutex<Vec<(String, Vec<&'static str>)>>>,
    }

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S> Layer<S> for SpanCapture
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            let spans = ctx
                .event_scope(event)
                .map(|scope| scope.from_root().map(|span| span.name()).collect())
                .unwrap_or_default();
            self.events.lock().push((visitor.0, spans));
        }
    }

    #[tokio::test]
    async fn test_endpoint_fetches_log_inside_aggregate_span() {
        let capture = SpanCapture::default();
        let _guard = tracing::subscriber::set_default(Registry::default().with(capture.clone()));

        let server = MockServer::start().await;
        mount_versions(&server).await;
        mount(
            &server,
            WIDGET_PATH,
            ResponseTemplate::new(200).set_body_string(r#"{"status":503,"message":"maintenance"}"#),
        )
        .await;
        mount(&server, CHART_PATH, ResponseTemplate::new(200).set_body_json(chart_body())).await;

        let result = aggregator_for(&server).aggregate(&code()).await;
        assert!(matches!(result, Err(FetchError::Upstream(_))));

        let events = capture.events.lock().clone();
        let spans_of = |message: &str| {
            events
                .iter()
                .find(|(logged, _)| logged == message)
                .map(|(_, spans)| spans.clone())
                .unwrap_or_else(|| panic!("no {:?} event in {:?}", message, events))
        };

        assert_eq!(spans_of("meteoswiss api returned error"), vec!["aggregate", "fetch_typed"]);
        assert_eq!(spans_of("endpoint fetch failed"), vec!["aggregate"]);
    }
}
