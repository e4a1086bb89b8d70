use crate::error::Result;
use crate::logging::LogFormat;
use crate::rules::Rule;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Process configuration. Every flag can also be set from the environment
/// (a `.env` file is loaded first).
#[derive(Debug, Clone, Parser)]
#[command(name = "ratewarden", version, about)]
pub struct Config {
    /// Service name reported in logs
    #[arg(long, env = "APP_NAME", default_value = "rate-limit-service")]
    pub app_name: String,

    /// Address to bind the HTTP server to
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind the HTTP server to
    #[arg(long, env = "APP_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "APP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "APP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Limit applied when no stored rule matches
    #[arg(long, env = "APP_DEFAULT_LIMIT", default_value_t = 100)]
    pub default_limit: i64,

    /// Window applied when no stored rule matches
    #[arg(long, env = "APP_DEFAULT_WINDOW_MINUTES", default_value_t = 60)]
    pub default_window_minutes: i64,

    /// Full Redis URL; overrides the individual redis settings
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    pub redis_db: u32,

    #[arg(long, env = "REDIS_SSL")]
    pub redis_ssl: bool,

    /// Upper bound on a single store round trip
    #[arg(long, env = "APP_STORE_TIMEOUT_MS", default_value_t = 1000)]
    pub store_timeout_ms: u64,

    /// Keep state in process memory instead of Redis (single replica only)
    #[arg(long, env = "APP_IN_MEMORY_STORE")]
    pub in_memory_store: bool,
}

impl Config {
    /// Load configuration from command line arguments and environment variables
    pub fn from_env() -> Self {
        Config::parse()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn redis_connection_url(&self) -> String {
        match &self.redis_url {
            Some(url) => url.clone(),
            None => {
                let scheme = if self.redis_ssl { "rediss" } else { "redis" };
                format!(
                    "{}://{}:{}/{}",
                    scheme, self.redis_host, self.redis_port, self.redis_db
                )
            }
        }
    }

    /// Process-wide rule used when the registry has no match
    pub fn default_rule(&self) -> Result<Rule> {
        Rule::new(
            self.default_limit,
            self.default_window_minutes.saturating_mul(60),
        )
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["ratewarden"]).unwrap();
        assert_eq!(config.app_name, "rate-limit-service");
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_limit, 100);
        assert_eq!(config.default_window_minutes, 60);
        assert_eq!(config.store_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_default_rule_converts_minutes() {
        let config = Config::try_parse_from([
            "ratewarden",
            "--default-limit",
            "5",
            "--default-window-minutes",
            "2",
        ])
        .unwrap();

        let rule = config.default_rule().unwrap();
        assert_eq!(rule.limit, 5);
        assert_eq!(rule.window_seconds, 120);
    }

    #[test]
    fn test_redis_url_assembly() {
        let config = Config::try_parse_from([
            "ratewarden",
            "--redis-host",
            "cache.internal",
            "--redis-port",
            "6380",
            "--redis-db",
            "2",
            "--redis-ssl",
        ])
        .unwrap();
        assert_eq!(config.redis_connection_url(), "rediss://cache.internal:6380/2");

        let explicit = Config::try_parse_from(["ratewarden", "--redis-url", "redis://r:1/0"]).unwrap();
        assert_eq!(explicit.redis_connection_url(), "redis://r:1/0");
    }

    #[test]
    fn test_bind_addr() {
        let config =
            Config::try_parse_from(["ratewarden", "--host", "127.0.0.1", "--port", "3000"]).unwrap();
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:3000");
    }
}
