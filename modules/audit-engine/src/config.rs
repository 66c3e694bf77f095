//! Application configuration parsed from environment variables.

use std::env;

use crate::error::ConfigError;

/// Runtime tuning for the LLM client and enrichment phase.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_rate_limit_per_minute: u32,
    pub llm_max_concurrency: usize,
    pub llm_timeout_secs: u64,
    pub llm_max_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_api_key = env::var("LLM_API_KEY").ok();

        let llm_model =
            env::var("LLM_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());

        let llm_rate_limit_per_minute = env::var("LLM_RATE_LIMIT_PER_MINUTE")
            .ok()
            .map(|v| {
                v.parse()
                    .map_err(|_| ConfigError::InvalidValue("LLM_RATE_LIMIT_PER_MINUTE".into(), v))
            })
            .transpose()?
            .unwrap_or(15);

        let llm_max_concurrency = env::var("LLM_MAX_CONCURRENCY")
            .ok()
            .map(|v| {
                v.parse()
                    .map_err(|_| ConfigError::InvalidValue("LLM_MAX_CONCURRENCY".into(), v))
            })
            .transpose()?
            .unwrap_or(5);

        let llm_timeout_secs = env::var("LLM_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                v.parse()
                    .map_err(|_| ConfigError::InvalidValue("LLM_TIMEOUT_SECS".into(), v))
            })
            .transpose()?
            .unwrap_or(15);

        let llm_max_retries = env::var("LLM_MAX_RETRIES")
            .ok()
            .map(|v| {
                v.parse()
                    .map_err(|_| ConfigError::InvalidValue("LLM_MAX_RETRIES".into(), v))
            })
            .transpose()?
            .unwrap_or(5);

        Ok(Config {
            llm_api_key,
            llm_model,
            llm_rate_limit_per_minute,
            llm_max_concurrency,
            llm_timeout_secs,
            llm_max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        env::remove_var("LLM_MODEL");
        env::remove_var("LLM_RATE_LIMIT_PER_MINUTE");
        env::remove_var("LLM_MAX_CONCURRENCY");
        env::remove_var("LLM_TIMEOUT_SECS");
        env::remove_var("LLM_MAX_RETRIES");

        let config = Config::from_env().unwrap();
        assert_eq!(config.llm_rate_limit_per_minute, 15);
        assert_eq!(config.llm_max_concurrency, 5);
        assert_eq!(config.llm_timeout_secs, 15);
        assert_eq!(config.llm_max_retries, 5);
    }

    #[test]
    #[serial]
    fn invalid_numeric_value_is_rejected() {
        env::set_var("LLM_MAX_CONCURRENCY", "not-a-number");
        let result = Config::from_env();
        env::remove_var("LLM_MAX_CONCURRENCY");
        assert!(matches!(result, Err(ConfigError::InvalidValue(var, _)) if var == "LLM_MAX_CONCURRENCY"));
    }
}
