use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub quiz: QuizConfig,
    pub feedback: Option<FeedbackConfig>,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a login session.
    pub session_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizConfig {
    /// Live quiz sessions untouched for this long are dropped by the sweeper.
    pub session_idle_minutes: u64,
    pub sweep_interval_secs: u64,
}

/// OpenAI-compatible chat completions endpoint used to draft feedback.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
    pub static_dir: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

const DEFAULT_FEEDBACK_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEFAULT_FEEDBACK_MODEL: &str = "deepseek-chat";

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server configuration
        let host = lookup("SERVER_HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse SERVER_HOST")?;

        let port = lookup("SERVER_PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .context("Failed to parse SERVER_PORT")?;

        // Database configuration
        let db_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let db_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", &lookup, 10)?;
        let db_min_connections = parse_or("DATABASE_MIN_CONNECTIONS", &lookup, 1)?;

        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", &lookup, 24)?;
        let session_idle_minutes = parse_or("QUIZ_SESSION_IDLE_MINUTES", &lookup, 180)?;
        let sweep_interval_secs = parse_or("QUIZ_SWEEP_INTERVAL_SECS", &lookup, 15)?;

        // Feedback generation is optional and only enabled with an API key
        let feedback = match lookup("FEEDBACK_API_KEY").filter(|key| !key.trim().is_empty()) {
            Some(api_key) => Some(FeedbackConfig {
                api_url: lookup("FEEDBACK_API_URL")
                    .unwrap_or_else(|| DEFAULT_FEEDBACK_URL.to_string()),
                api_key,
                model: lookup("FEEDBACK_MODEL")
                    .unwrap_or_else(|| DEFAULT_FEEDBACK_MODEL.to_string()),
                timeout_secs: parse_or("FEEDBACK_TIMEOUT_SECS", &lookup, 30)?,
            }),
            None => None,
        };

        // App configuration
        let environment = lookup("APP_ENVIRONMENT")
            .map(|value| value.parse::<Environment>().unwrap_or_default())
            .unwrap_or_default();

        let app_name = lookup("APP_NAME").unwrap_or_else(|| "AlanMath".to_string());
        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| "dist/public".to_string());

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: db_url,
                max_connections: Some(db_max_connections),
                min_connections: Some(db_min_connections),
            },
            auth: AuthConfig { session_ttl_hours },
            quiz: QuizConfig {
                session_idle_minutes,
                sweep_interval_secs,
            },
            feedback,
            app: AppConfig {
                name: app_name,
                environment,
                static_dir,
            },
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }

    pub fn session_ttl(&self) -> time::Duration {
        time::Duration::hours(self.auth.session_ttl_hours)
    }

    pub fn quiz_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.quiz.session_idle_minutes * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.quiz.sweep_interval_secs.max(1))
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}", key)),
        None => Ok(default),
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" => Ok(Environment::Development),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

use once_cell::sync::OnceCell;

static CONFIG: OnceCell<Config> = OnceCell::new();

pub fn init() -> Result<&'static Config> {
    CONFIG.get_or_try_init(Config::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/alan")]))
                .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.max_connections, Some(10));
        assert_eq!(config.auth.session_ttl_hours, 24);
        assert_eq!(config.app.environment, Environment::Development);
        assert!(config.feedback.is_none());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn invalid_port_is_reported_with_key() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/alan"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn feedback_is_enabled_by_api_key() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/alan"),
            ("FEEDBACK_API_KEY", "sk-test"),
            ("FEEDBACK_MODEL", "gpt-4o-mini"),
        ]))
        .unwrap();

        let feedback = config.feedback.expect("feedback config");
        assert_eq!(feedback.api_url, DEFAULT_FEEDBACK_URL);
        assert_eq!(feedback.model, "gpt-4o-mini");
        assert_eq!(feedback.timeout_secs, 30);
    }

    #[test]
    fn unknown_environment_falls_back_to_development() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/alan"),
            ("APP_ENVIRONMENT", "PRODUCTION"),
        ]))
        .unwrap();
        assert!(config.is_production());

        assert_eq!("qa".parse::<Environment>().ok(), None);
    }
}
