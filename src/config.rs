use actix_web::cookie::Key;
use tracing::{info, warn};

use crate::auth::AdminCredentials;
use crate::error::AppError;
use crate::schedule::{parse_date, Season};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADMIN_EMAIL: &str = "admin@futsal.local";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

/// Server settings, read from the environment.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// No URL means bookings live in memory for the lifetime of the process.
    pub database_url: Option<String>,
    pub environment: Environment,
    pub session_key: Key,
    pub admin: AdminCredentials,
    pub season: Season,
}

impl Config {
    /// Reads the process environment. In debug builds a `.env` file is loaded first.
    pub fn from_env() -> Result<Self, AppError> {
        #[cfg(debug_assertions)]
        dotenv::dotenv().ok();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from a variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let environment = Environment::parse(var("APP_ENV").as_deref());

        let port = match var("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got {port:?}")))?,
            None => DEFAULT_PORT,
        };

        let session_key = match var("SESSION_KEY") {
            Some(key) => Key::try_from(key.as_bytes())
                .map_err(|_| AppError::Config("SESSION_KEY must be at least 64 bytes".to_string()))?,
            None => {
                warn!("SESSION_KEY not set, generated a key; admin sessions end on restart");
                Key::generate()
            }
        };

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => AdminCredentials::new(email, password),
            _ if environment.is_production() => {
                return Err(AppError::Config(
                    "ADMIN_EMAIL and ADMIN_PASSWORD are required in production".to_string(),
                ))
            }
            (email, password) => {
                warn!("admin credentials not fully configured, using development defaults");
                AdminCredentials::new(
                    email.unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
                    password.unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
                )
            }
        };

        let defaults = Season::default();
        let season = Season {
            start: season_date(&var, "SEASON_START")?.unwrap_or(defaults.start),
            end: season_date(&var, "SEASON_END")?.unwrap_or(defaults.end),
        };
        if season.end < season.start {
            return Err(AppError::Config(format!(
                "season ends ({}) before it starts ({})",
                season.end, season.start
            )));
        }

        let database_url = var("DATABASE_URL");
        info!(port, ?environment, season_start = %season.start, season_end = %season.end, "configuration loaded");

        Ok(Self {
            port,
            database_url,
            environment,
            session_key,
            admin,
            season,
        })
    }

    /// A port given as the first command-line argument wins over `PORT`.
    pub fn with_port_arg(mut self, arg: Option<String>) -> Self {
        if let Some(port) = arg.and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        self
    }
}

fn season_date(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<chrono::NaiveDate>, AppError> {
    var(name)
        .map(|value| {
            parse_date(&value).ok_or_else(|| AppError::Config(format!("{name} must be yyyy-MM-dd, got {value:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_for_development() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.database_url.is_none());
        assert_eq!(config.season, Season::default());
        assert!(config.admin.verify(DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD));
    }

    #[test]
    fn reads_every_variable() {
        let key = "k".repeat(64);
        let config = config(&[
            ("PORT", "3000"),
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://localhost/futsal"),
            ("SESSION_KEY", &key),
            ("ADMIN_EMAIL", "boss@club.test"),
            ("ADMIN_PASSWORD", "s3cret"),
            ("SEASON_START", "2025-09-01"),
            ("SEASON_END", "2026-06-30"),
        ])
        .unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.environment.is_production());
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/futsal"));
        assert!(config.admin.verify("boss@club.test", "s3cret"));
        assert_eq!(config.season.start, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("SESSION_KEY", "")]).is_ok());
        assert!(config(&[("SESSION_KEY", "short")]).is_err());
        assert!(config(&[("SEASON_START", "2025-13-01")]).is_err());
        assert!(config(&[("SEASON_START", "2025-09-01"), ("SEASON_END", "2025-01-01")]).is_err());
        assert!(config(&[("APP_ENV", "production")]).is_err());
    }

    #[test]
    fn port_argument_overrides() {
        let config = config(&[("PORT", "3000")]).unwrap();
        assert_eq!(config.clone().with_port_arg(Some("9000".to_string())).port, 9000);
        assert_eq!(config.clone().with_port_arg(Some("web".to_string())).port, 3000);
        assert_eq!(config.with_port_arg(None).port, 3000);
    }
}
