use super::types::*;
use crate::config::Config;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenWeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("API error: {0}")]
    ApiError(String),
}

pub struct OpenWeatherClient {
    client: Client,
    config: Config,
}

impl OpenWeatherClient {
    pub fn new(config: Config) -> Result<Self, OpenWeatherError> {
        let client = Client::builder()
            .user_agent("WeatherProxy/1.0")
            .build()?;

        Ok(Self { client, config })
    }

    /// Performs a single upstream call with no retry. The body comes back as
    /// untyped JSON so callers can relay it verbatim.
    pub async fn fetch(&self, request: &UpstreamRequest) -> Result<Value, OpenWeatherError> {
        let url = format!(
            "{}{}",
            self.config.openweather_base_url.trim_end_matches('/'),
            self.path_for(request.endpoint)
        );

        let mut params: Vec<(&str, &str)> = request
            .upstream_params
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        params.push(("appid", self.config.openweather_api_key.as_str()));

        tracing::debug!(endpoint = request.endpoint.name(), %url, "Fetching from OpenWeather");

        let response = self.client.get(&url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OpenWeatherError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body = response.bytes().await?;
        let mut json: Value = serde_json::from_slice(&body)?;

        if request.endpoint == Endpoint::Geocoding {
            if let Value::Array(matches) = &mut json {
                matches.truncate(GEOCODE_LIMIT);
            }
        }

        Ok(json)
    }

    fn path_for(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Current => &self.config.openweather_current_path,
            Endpoint::Forecast => &self.config.openweather_forecast_path,
            Endpoint::Geocoding => &self.config.openweather_geocode_direct_path,
            Endpoint::Pollution => &self.config.openweather_air_pollution_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenWeatherClient {
        OpenWeatherClient::new(Config {
            openweather_api_key: "test-key".to_string(),
            openweather_base_url: server.uri(),
            ..Config::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_injects_credential_and_units() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .and(query_param("q", "Jakarta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Jakarta",
                "main": {"temp": 31.2}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let request = UpstreamRequest::current(&LocationQuery {
            q: Some("Jakarta".into()),
            ..Default::default()
        })
        .unwrap();

        let body = client.fetch(&request).await.unwrap();
        assert_eq!(body["name"], "Jakarta");
    }

    #[tokio::test]
    async fn test_fetch_pollution_path() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/air_pollution"))
            .and(query_param("lat", "52.52"))
            .and(query_param("lon", "13.40"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [{"main": {"aqi": 2}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let request = UpstreamRequest::pollution(&CoordinatesQuery {
            lat: Some("52.52".into()),
            lon: Some("13.40".into()),
        })
        .unwrap();

        let body = client.fetch(&request).await.unwrap();
        assert_eq!(body["list"][0]["main"]["aqi"], 2);
    }

    #[tokio::test]
    async fn test_base_url_trailing_slash_ignored() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Nairobi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "Nairobi"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Config {
            openweather_base_url: format!("{}/", mock_server.uri()),
            ..Config::default()
        })
        .unwrap();
        let request = UpstreamRequest::current(&LocationQuery {
            q: Some("Nairobi".into()),
            ..Default::default()
        })
        .unwrap();

        let body = client.fetch(&request).await.unwrap();
        assert_eq!(body["name"], "Nairobi");
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({
                    "cod": 401,
                    "message": "Invalid API key"
                })),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let request = UpstreamRequest::forecast(&LocationQuery {
            q: Some("Oslo".into()),
            ..Default::default()
        })
        .unwrap();

        let err = client.fetch(&request).await.unwrap_err();
        match err {
            OpenWeatherError::ApiError(message) => assert!(message.contains("401")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let request = UpstreamRequest::geocoding(&GeocodeQuery { q: Some("Lima".into()) }).unwrap();

        let err = client.fetch(&request).await.unwrap_err();
        assert!(matches!(err, OpenWeatherError::JsonParsing(_)));
    }

    #[tokio::test]
    async fn test_geocoding_truncated_to_limit() {
        let mock_server = MockServer::start().await;

        let matches: Vec<_> = (0..8)
            .map(|i| serde_json::json!({"name": format!("Springfield {i}"), "lat": 39.0 + i as f64, "lon": -89.0}))
            .collect();

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(matches))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let request =
            UpstreamRequest::geocoding(&GeocodeQuery { q: Some("Springfield".into()) }).unwrap();

        let body = client.fetch(&request).await.unwrap();
        assert_eq!(body.as_array().map(Vec::len), Some(GEOCODE_LIMIT));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_request_error() {
        let client = OpenWeatherClient::new(Config {
            // Nothing listens on port 9 (discard) in the test environment
            openweather_base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        })
        .unwrap();
        let request = UpstreamRequest::pollution(&CoordinatesQuery {
            lat: Some("1".into()),
            lon: Some("2".into()),
        })
        .unwrap();

        let err = client.fetch(&request).await.unwrap_err();
        assert!(matches!(err, OpenWeatherError::RequestFailed(_)));
    }
}
