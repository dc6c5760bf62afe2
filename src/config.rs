use envconfig::Envconfig;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Shared low-quota key NASA hands out for experimentation.
pub const DEMO_API_KEY: &str = "DEMO_KEY";

/// Deployment flavour. Anything other than `development` is treated as production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            _ => Ok(Environment::Production),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Port to listen on
    #[envconfig(from = "PORT", default = "5000")]
    pub port: u16,

    /// NASA API key; falls back to the demo key when unset
    #[envconfig(from = "NASA_API_KEY")]
    pub nasa_api_key: Option<String>,

    /// Upstream APOD endpoint
    #[envconfig(from = "APOD_BASE_URL", default = "https://api.nasa.gov/planetary/apod")]
    pub apod_base_url: String,

    /// Outbound request timeout in seconds
    #[envconfig(from = "UPSTREAM_TIMEOUT_SECS", default = "10")]
    pub upstream_timeout_secs: u64,

    /// Allowed CORS origin, `*` for any
    #[envconfig(from = "CORS_ORIGIN", default = "http://localhost:3000")]
    pub cors_origin: String,

    #[envconfig(from = "APP_ENV", default = "production")]
    pub environment: Environment,

    /// Requests allowed per client IP per window
    #[envconfig(from = "RATE_LIMIT_MAX", default = "100")]
    pub rate_limit_max: u64,

    #[envconfig(from = "RATE_LIMIT_WINDOW_SECS", default = "900")]
    pub rate_limit_window_secs: u64,

    /// How often expired rate limit windows are purged
    #[envconfig(from = "RATE_LIMIT_PURGE_SECS", default = "300")]
    pub rate_limit_purge_secs: u64,

    /// Honour x-forwarded-for / x-real-ip when identifying clients
    #[envconfig(from = "TRUST_PROXY", default = "false")]
    pub trust_proxy: bool,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    /// The key sent upstream, falling back to the demo key.
    pub fn api_key(&self) -> &str {
        self.custom_api_key().unwrap_or(DEMO_API_KEY)
    }

    pub fn has_custom_api_key(&self) -> bool {
        self.custom_api_key().is_some()
    }

    fn custom_api_key(&self) -> Option<&str> {
        self.nasa_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit_purge_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_purge_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::init_from_hashmap(&vars).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.rate_limit_max, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(15 * 60));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.trust_proxy);
    }

    #[test]
    fn test_demo_key_fallback() {
        let config = config_from(&[]);
        assert_eq!(config.api_key(), DEMO_API_KEY);
        assert!(!config.has_custom_api_key());

        let blank = config_from(&[("NASA_API_KEY", "   ")]);
        assert_eq!(blank.api_key(), DEMO_API_KEY);
        assert!(!blank.has_custom_api_key());
    }

    #[test]
    fn test_custom_key() {
        let config = config_from(&[("NASA_API_KEY", "abc123")]);
        assert_eq!(config.api_key(), "abc123");
        assert!(config.has_custom_api_key());
    }

    #[test]
    fn test_environment_parsing() {
        assert!(config_from(&[("APP_ENV", "development")]).is_development());
        assert!(config_from(&[("APP_ENV", "Development")]).is_development());
        assert!(!config_from(&[("APP_ENV", "staging")]).is_development());
    }
}
