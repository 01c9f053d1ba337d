use std::time::Duration;

/// Process configuration, read from the environment with local-dev defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    pub pool_size: u32,
    pub busy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "dbforum.db".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            cors_origin: None,
            pool_size: 8,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origin: lookup("CORS_ORIGIN").filter(|origin| !origin.is_empty()),
            pool_size: lookup("DB_POOL_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.pool_size),
            busy_timeout: lookup("DB_BUSY_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn falls_back_to_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.database_url, "dbforum.db");
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.pool_size, 8);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "/tmp/forum.db"),
            ("DB_POOL_SIZE", "zero"),
            ("DB_BUSY_TIMEOUT_MS", "250"),
            ("CORS_ORIGIN", "http://localhost:3000"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_url, "/tmp/forum.db");
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:3000"));
    }
}
