use crate::config::Config;
use crate::error::RateLimitError;
use crate::rules::MAX_WINDOW_SECONDS;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<(), RateLimitError> {
        if url.is_empty() {
            return Err(RateLimitError::Config("Redis URL cannot be empty".to_string()));
        }

        if !["redis://", "rediss://", "unix://"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            return Err(RateLimitError::Config(
                "Redis URL must start with 'redis://', 'rediss://' or 'unix://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates the fallback rule parameters
    pub fn validate_default_rule(limit: i64, window_minutes: i64) -> Result<(), RateLimitError> {
        if limit <= 0 {
            return Err(RateLimitError::Config(
                "Default limit must be greater than 0".to_string(),
            ));
        }

        if window_minutes <= 0 {
            return Err(RateLimitError::Config(
                "Default window must be greater than 0 minutes".to_string(),
            ));
        }

        let max_minutes = (MAX_WINDOW_SECONDS / 60) as i64;
        if window_minutes > max_minutes {
            return Err(RateLimitError::Config(format!(
                "Default window must be at most {} minutes",
                max_minutes
            )));
        }

        Ok(())
    }

    pub fn validate_log_level(level: &str) -> Result<(), RateLimitError> {
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(RateLimitError::Config(format!(
                "Invalid log level '{}'. Must be one of: {:?}",
                level, LOG_LEVELS
            )));
        }

        Ok(())
    }

    /// Validates the whole process configuration
    pub fn validate(config: &Config) -> Result<(), RateLimitError> {
        Self::validate_default_rule(config.default_limit, config.default_window_minutes)?;
        Self::validate_log_level(&config.log_level)?;

        if config.store_timeout_ms == 0 {
            return Err(RateLimitError::Config(
                "Store timeout must be greater than 0".to_string(),
            ));
        }

        if !config.in_memory_store {
            Self::validate_redis_url(&config.redis_connection_url())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_valid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("redis://localhost:6379").is_ok());
        assert!(ConfigValidator::validate_redis_url("rediss://localhost:6379").is_ok());
        assert!(ConfigValidator::validate_redis_url("unix:///tmp/redis.sock").is_ok());
    }

    #[test]
    fn test_invalid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("").is_err());
        assert!(ConfigValidator::validate_redis_url("http://localhost:6379").is_err());
    }

    #[test]
    fn test_invalid_default_rule() {
        assert!(ConfigValidator::validate_default_rule(100, 60).is_ok());
        assert!(ConfigValidator::validate_default_rule(0, 60).is_err());
        assert!(ConfigValidator::validate_default_rule(100, -5).is_err());
    }

    #[test]
    fn test_default_window_upper_bound() {
        let max_minutes = (MAX_WINDOW_SECONDS / 60) as i64;
        assert!(ConfigValidator::validate_default_rule(100, max_minutes).is_ok());
        assert!(ConfigValidator::validate_default_rule(100, max_minutes + 1).is_err());
        assert!(ConfigValidator::validate_default_rule(100, i64::MAX / 60).is_err());
    }

    #[test]
    fn test_log_level() {
        assert!(ConfigValidator::validate_log_level("INFO").is_ok());
        assert!(ConfigValidator::validate_log_level("verbose").is_err());
    }

    #[test]
    fn test_validate_config() {
        let config = Config::try_parse_from(["ratewarden"]).unwrap();
        assert!(ConfigValidator::validate(&config).is_ok());

        let bad = Config::try_parse_from(["ratewarden", "--redis-url", "http://nope"]).unwrap();
        assert!(matches!(
            ConfigValidator::validate(&bad),
            Err(RateLimitError::Config(_))
        ));

        let memory = Config::try_parse_from([
            "ratewarden",
            "--redis-url",
            "http://nope",
            "--in-memory-store",
        ])
        .unwrap();
        assert!(ConfigValidator::validate(&memory).is_ok());
    }
}
