use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub openweather_current_path: String,
    pub openweather_forecast_path: String,
    pub openweather_geocode_direct_path: String,
    pub openweather_air_pollution_path: String,
    pub cache_ttl_seconds: u64,
    pub cache_max_capacity: u64,
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub open_browser: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openweather_api_key: String::new(),
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            openweather_current_path: "/data/2.5/weather".to_string(),
            openweather_forecast_path: "/data/2.5/forecast".to_string(),
            openweather_geocode_direct_path: "/geo/1.0/direct".to_string(),
            openweather_air_pollution_path: "/data/2.5/air_pollution".to_string(),
            cache_ttl_seconds: 600,
            cache_max_capacity: 10_000,
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: "public".to_string(),
            open_browser: false,
        }
    }
}

impl Config {
    /// Builds the configuration from process environment, falling back to
    /// [`Config::default`] for anything unset. The API key is not validated;
    /// a missing key shows up later as upstream failures.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            openweather_api_key: env::var("OPENWEATHER_API_KEY").unwrap_or_default(),
            openweather_base_url: env::var("OPENWEATHER_BASE_URL")
                .unwrap_or(defaults.openweather_base_url),
            openweather_current_path: env::var("OPENWEATHER_CURRENT_PATH")
                .unwrap_or(defaults.openweather_current_path),
            openweather_forecast_path: env::var("OPENWEATHER_FORECAST_PATH")
                .unwrap_or(defaults.openweather_forecast_path),
            openweather_geocode_direct_path: env::var("OPENWEATHER_GEOCODE_DIRECT_PATH")
                .unwrap_or(defaults.openweather_geocode_direct_path),
            openweather_air_pollution_path: env::var("OPENWEATHER_AIR_POLLUTION_PATH")
                .unwrap_or(defaults.openweather_air_pollution_path),
            cache_ttl_seconds: parse_var("CACHE_TTL_SECONDS", defaults.cache_ttl_seconds)?,
            cache_max_capacity: parse_var("CACHE_MAX_CAPACITY", defaults.cache_max_capacity)?,
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
            open_browser: parse_var("OPEN_BROWSER", defaults.open_browser)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value {:?}: {}", name, raw, e)),
        _ => Ok(default),
    }
}
