use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub backend_base_url: String,
    pub backend_timeout_secs: u64,
    pub validation_timeout_secs: u64,
    pub validation_max_polls: u32,
    pub validation_poll_interval_secs: u64,
    pub session_idle_ttl_secs: u64,
    pub api_key: Option<String>, // Unset means only the session header is checked
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            backend_base_url: std::env::var("BACKEND_BASE_URL")
                .map_err(|_| anyhow::anyhow!("BACKEND_BASE_URL environment variable required"))
                .and_then(|raw| {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        anyhow::bail!("BACKEND_BASE_URL cannot be empty");
                    }
                    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
                        anyhow::bail!("BACKEND_BASE_URL must start with http:// or https://");
                    }
                    url::Url::parse(trimmed).map_err(|e| {
                        anyhow::anyhow!("BACKEND_BASE_URL is not a valid URL: {}", e)
                    })?;
                    Ok(trimmed.trim_end_matches('/').to_string())
                })?,
            backend_timeout_secs: env_u64("BACKEND_TIMEOUT_SECS", 30)?,
            validation_timeout_secs: env_u64("VALIDATION_TIMEOUT_SECS", 480)?,
            validation_max_polls: std::env::var("VALIDATION_MAX_POLLS")
                .unwrap_or_else(|_| "1".to_string())
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("VALIDATION_MAX_POLLS must be a positive number"))
                .and_then(|polls| {
                    if polls == 0 {
                        anyhow::bail!("VALIDATION_MAX_POLLS must be at least 1");
                    }
                    Ok(polls)
                })?,
            validation_poll_interval_secs: env_u64("VALIDATION_POLL_INTERVAL_SECS", 5)?,
            session_idle_ttl_secs: env_u64("SESSION_IDLE_TTL_SECS", 1800)?,
            api_key: std::env::var("API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Backend Base URL: {}", config.backend_base_url);
        tracing::debug!(
            "Backend timeouts: {}s (default), {}s (validation)",
            config.backend_timeout_secs,
            config.validation_timeout_secs
        );
        tracing::debug!(
            "Validation polling: {} round(s), {}s apart",
            config.validation_max_polls,
            config.validation_poll_interval_secs
        );
        if config.api_key.is_none() {
            tracing::warn!("API_KEY not set; view endpoints are guarded by session id only");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Configuration pointing at `backend_base_url` with every other value at its default.
    pub fn with_backend(backend_base_url: impl Into<String>) -> Self {
        Self {
            port: 3000,
            backend_base_url: backend_base_url.into().trim_end_matches('/').to_string(),
            backend_timeout_secs: 30,
            validation_timeout_secs: 480,
            validation_max_polls: 1,
            validation_poll_interval_secs: 5,
            session_idle_ttl_secs: 1800,
            api_key: None,
        }
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    pub fn validation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.validation_poll_interval_secs)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative number of seconds", key)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_backend_strips_trailing_slash() {
        let config = Config::with_backend("http://localhost:8000/");
        assert_eq!(config.backend_base_url, "http://localhost:8000");
        assert_eq!(config.validation_max_polls, 1);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config::with_backend("http://localhost:8000");
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));
        assert_eq!(config.validation_timeout(), Duration::from_secs(480));
        assert_eq!(config.session_idle_ttl(), Duration::from_secs(1800));
    }
}
