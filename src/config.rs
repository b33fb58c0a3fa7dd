use std::env;

/// Environment-driven settings shared by every command.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let url = env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let max_connections = match env::var("LIVABILITY_DB_MAX_CONNECTIONS") {
            Ok(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|count| *count > 0)
                .ok_or(ConfigError::InvalidMaxConnections(value))?,
            Err(_) => 5,
        };
        let log_level = env::var("LIVABILITY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Postgres report store connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Only commands that talk to Postgres need a URL.
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        self.url.as_deref().ok_or(ConfigError::MissingDatabaseUrl)
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set to a Postgres instance for this command")]
    MissingDatabaseUrl,
    #[error("LIVABILITY_DB_MAX_CONNECTIONS must be a positive integer, got '{0}'")]
    InvalidMaxConnections(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("DATABASE_URL");
        env::remove_var("LIVABILITY_DB_MAX_CONNECTIONS");
        env::remove_var("LIVABILITY_LOG_LEVEL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(matches!(
            config.database.require_url(),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn reads_overrides_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DATABASE_URL", "postgres://localhost/livability");
        env::set_var("LIVABILITY_DB_MAX_CONNECTIONS", "12");
        env::set_var("LIVABILITY_LOG_LEVEL", "debug");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.database.require_url().expect("url present"),
            "postgres://localhost/livability"
        );
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.telemetry.log_level, "debug");
        reset_env();
    }

    #[test]
    fn rejects_zero_connections() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LIVABILITY_DB_MAX_CONNECTIONS", "0");
        let err = AppConfig::load().expect_err("zero connections rejected");
        assert!(matches!(err, ConfigError::InvalidMaxConnections(value) if value == "0"));
        reset_env();
    }
}
