use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::IntoParams;

/// Upstream geocoding is asked for, and trimmed to, this many matches.
pub const GEOCODE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Current,
    Forecast,
    Geocoding,
    Pollution,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Current => "current",
            Endpoint::Forecast => "forecast",
            Endpoint::Geocoding => "geocoding",
            Endpoint::Pollution => "pollution",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("Either coordinates (lat, lon) or city name (q) is required")]
    MissingLocation,
    #[error("Query parameter q is required")]
    MissingQuery,
    #[error("Latitude and longitude are required")]
    MissingCoordinates,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationQuery {
    /// Latitude, forwarded verbatim
    pub lat: Option<String>,
    /// Longitude, forwarded verbatim
    pub lon: Option<String>,
    /// Free-text city query, used when coordinates are absent
    pub q: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GeocodeQuery {
    /// Place name to resolve
    pub q: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoordinatesQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

// Empty query values count as missing.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A validated call against one upstream resource.
///
/// `cache_params` holds every parameter the caller supplied and feeds the
/// cache key. `upstream_params` is what actually goes on the wire, minus the
/// credential which the client adds.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub endpoint: Endpoint,
    pub cache_params: BTreeMap<&'static str, String>,
    pub upstream_params: Vec<(&'static str, String)>,
}

impl UpstreamRequest {
    pub fn current(query: &LocationQuery) -> Result<Self, RequestError> {
        Self::located(Endpoint::Current, query)
    }

    pub fn forecast(query: &LocationQuery) -> Result<Self, RequestError> {
        Self::located(Endpoint::Forecast, query)
    }

    pub fn geocoding(query: &GeocodeQuery) -> Result<Self, RequestError> {
        let q = present(&query.q).ok_or(RequestError::MissingQuery)?;

        Ok(Self {
            endpoint: Endpoint::Geocoding,
            cache_params: BTreeMap::from([("q", q.to_string())]),
            upstream_params: vec![("q", q.to_string()), ("limit", GEOCODE_LIMIT.to_string())],
        })
    }

    pub fn pollution(query: &CoordinatesQuery) -> Result<Self, RequestError> {
        let (lat, lon) = match (present(&query.lat), present(&query.lon)) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(RequestError::MissingCoordinates),
        };

        Ok(Self {
            endpoint: Endpoint::Pollution,
            cache_params: BTreeMap::from([("lat", lat.to_string()), ("lon", lon.to_string())]),
            upstream_params: vec![("lat", lat.to_string()), ("lon", lon.to_string())],
        })
    }

    // Coordinates win over `q` when both are supplied.
    fn located(endpoint: Endpoint, query: &LocationQuery) -> Result<Self, RequestError> {
        let lat = present(&query.lat);
        let lon = present(&query.lon);
        let q = present(&query.q);

        let mut upstream_params = vec![("units", "metric".to_string())];
        match (lat, lon, q) {
            (Some(lat), Some(lon), _) => {
                upstream_params.push(("lat", lat.to_string()));
                upstream_params.push(("lon", lon.to_string()));
            }
            (_, _, Some(q)) => upstream_params.push(("q", q.to_string())),
            _ => return Err(RequestError::MissingLocation),
        }

        let cache_params = [("lat", lat), ("lon", lon), ("q", q)]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v.to_string())))
            .collect();

        Ok(Self {
            endpoint,
            cache_params,
            upstream_params,
        })
    }

    /// `"{endpoint}_{params}"` where params is the compact JSON object of the
    /// supplied parameters in key order.
    pub fn cache_key(&self) -> String {
        let params = serde_json::to_string(&self.cache_params).unwrap_or_default();
        format!("{}_{}", self.endpoint.name(), params)
    }
}
