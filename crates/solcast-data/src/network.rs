//! Network data source: owns forecast HTTP I/O and publishes the latest
//! successful fetch.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::watch;

use crate::parser::{self, ParseError, ParseOutcome};
use crate::types::{today_utc, ForecastRecord, Units};

/// Number of daily entries requested from the upstream API, and the
/// threshold for the repository's staleness check.
pub const NUM_FORECAST_DAYS: u32 = 14;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Http(u16),

    #[error("API reported no usable data")]
    Api,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Where and how to ask for forecast data.
#[derive(Debug, Clone)]
pub struct ForecastEndpoint {
    pub base_url: String,
    /// Location query, e.g. "London,UK".
    pub location: String,
    pub units: Units,
    pub api_key: Option<String>,
}

/// Fetches forecast data and publishes each successful result into a
/// single-slot channel.
///
/// Latest-value semantics: subscribers always observe the most recent
/// published forecast, and new subscribers immediately see the last one if
/// any exists. Nothing is retained beyond that one slot; the store owns
/// history.
pub struct WeatherNetworkDataSource {
    client: Client,
    endpoint: ForecastEndpoint,
    latest: watch::Sender<Option<Vec<ForecastRecord>>>,
}

impl WeatherNetworkDataSource {
    pub fn new(endpoint: ForecastEndpoint) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let (latest, _) = watch::channel(None);
        Ok(Self { client, endpoint, latest })
    }

    /// Subscribe to published forecasts. `None` until the first successful
    /// fetch of this process.
    pub fn subscribe(&self) -> watch::Receiver<Option<Vec<ForecastRecord>>> {
        self.latest.subscribe()
    }

    /// Fetch, parse, and publish the forecast once.
    ///
    /// Publishes exactly once per successful non-empty fetch and returns the
    /// number of records published. An empty forecast publishes nothing and
    /// is not an error. Failures publish nothing.
    pub async fn fetch_weather(&self) -> Result<usize, FetchError> {
        tracing::debug!("fetch weather started");

        let url = format!("{}/forecast", self.endpoint.base_url.trim_end_matches('/'));
        let mut query: Vec<(&str, String)> = vec![
            ("q", self.endpoint.location.clone()),
            ("units", self.endpoint.units.as_query().to_string()),
            ("cnt", NUM_FORECAST_DAYS.to_string()),
            ("mode", "json".to_string()),
        ];
        if let Some(key) = &self.endpoint.api_key {
            query.push(("appid", key.clone()));
        }

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // The upstream reports application-level failures with a matching
            // `cod` in the body; anything else is a transport problem.
            return match parser::parse_forecast(&body, today_utc()) {
                Ok(ParseOutcome::NoData) => Err(FetchError::Api),
                _ => Err(FetchError::Http(status.as_u16())),
            };
        }

        match parser::parse_forecast(&body, today_utc())? {
            ParseOutcome::NoData => Err(FetchError::Api),
            ParseOutcome::Forecast(weather) => {
                let days = weather.forecast.len();
                if days == 0 {
                    tracing::debug!("forecast response contained no entries");
                    return Ok(0);
                }
                tracing::debug!(days, "forecast parsed, publishing");
                self.latest.send_replace(Some(weather.forecast));
                Ok(days)
            }
        }
    }

    /// Request an immediate, out-of-band fetch on a background task.
    ///
    /// Fire-and-forget: failures are logged and dropped, nothing is surfaced
    /// to the caller. Used for the initial catch-up fetch.
    pub fn request_fetch(self: Arc<Self>) {
        let source = self;
        tokio::spawn(async move {
            match source.fetch_weather().await {
                Ok(days) => tracing::info!(days, "on-demand fetch complete"),
                Err(e) => tracing::warn!(error = %e, "on-demand fetch failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(base_url: &str) -> ForecastEndpoint {
        ForecastEndpoint {
            base_url: base_url.to_string(),
            location: "London,UK".to_string(),
            units: Units::Metric,
            api_key: None,
        }
    }

    fn fixture(days: usize) -> serde_json::Value {
        let list: Vec<_> = (0..days)
            .map(|i| {
                json!({
                    "pressure": 1010.0 + i as f64,
                    "humidity": 50 + i as i32,
                    "speed": 3.0,
                    "deg": 180.0,
                    "weather": [{ "id": 800 }],
                    "temp": { "max": 20.0 + i as f64, "min": 10.0 + i as f64 }
                })
            })
            .collect();
        json!({ "cod": "200", "list": list })
    }

    #[tokio::test]
    async fn successful_fetch_publishes_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("q", "London,UK"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture(3)))
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        let rx = source.subscribe();
        assert!(rx.borrow().is_none());

        let days = source.fetch_weather().await.unwrap();
        assert_eq!(days, 3);

        let published = rx.borrow().clone().unwrap();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].weather_id, 800);
    }

    #[tokio::test]
    async fn late_subscriber_sees_latest_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture(2)))
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        source.fetch_weather().await.unwrap();

        // Subscribing after the fetch still observes the published value.
        let rx = source.subscribe();
        assert_eq!(rx.borrow().clone().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn api_error_publishes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "cod": "404", "message": "city not found" })),
            )
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        let rx = source.subscribe();

        assert!(matches!(source.fetch_weather().await, Err(FetchError::Api)));
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn http_error_with_cod_body_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "cod": "404" })),
            )
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        assert!(matches!(source.fetch_weather().await, Err(FetchError::Api)));
    }

    #[tokio::test]
    async fn http_error_without_cod_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        assert!(matches!(source.fetch_weather().await, Err(FetchError::Http(500))));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error_and_publishes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "cod": 200, "list": [{ "pressure": "low" }] })),
            )
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        let rx = source.subscribe();

        assert!(matches!(source.fetch_weather().await, Err(FetchError::Parse(_))));
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn empty_forecast_is_ok_but_publishes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture(0)))
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        let rx = source.subscribe();

        assert_eq!(source.fetch_weather().await.unwrap(), 0);
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn api_key_is_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("appid", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture(1)))
            .expect(1)
            .mount(&server)
            .await;

        let mut ep = endpoint(&server.uri());
        ep.api_key = Some("secret".to_string());
        let source = WeatherNetworkDataSource::new(ep).unwrap();
        source.fetch_weather().await.unwrap();
    }

    #[tokio::test]
    async fn last_publish_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture(2)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture(5)))
            .mount(&server)
            .await;

        let source = WeatherNetworkDataSource::new(endpoint(&server.uri())).unwrap();
        let rx = source.subscribe();
        source.fetch_weather().await.unwrap();
        source.fetch_weather().await.unwrap();

        assert_eq!(rx.borrow().clone().unwrap().len(), 5);
    }
}
