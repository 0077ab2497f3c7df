// src/config.rs

use std::env;

use dotenvy::dotenv;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5034;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Which persistence backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageKind,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// When false, a second submission for the same (student, test) is a 409.
    pub allow_resubmission: bool,
    /// When true, list endpoints answer 404 instead of an empty array.
    pub empty_result_not_found: bool,
    /// JSON file of user profiles loaded into the in-memory directory.
    pub seed_users: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let storage = match env::var("STORAGE").as_deref() {
            Err(_) | Ok("postgres") => StorageKind::Postgres,
            Ok("memory") => StorageKind::Memory,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE",
                    value: other.to_string(),
                });
            }
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            Err(_) => DEFAULT_PORT,
        };

        let cors_origins = parse_origins(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
        );

        let allow_resubmission = bool_var("ALLOW_RESUBMISSION", true)?;
        let empty_result_not_found = bool_var("EMPTY_RESULT_NOT_FOUND", true)?;
        let seed_users = env::var("SEED_USERS").ok();

        Ok(Self {
            storage,
            database_url,
            jwt_secret,
            rust_log,
            port,
            cors_origins,
            allow_resubmission,
            empty_result_not_found,
            seed_users,
        })
    }

    /// Settings for an in-memory instance, used by tests and local runs.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            storage: StorageKind::Memory,
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            rust_log: "error".to_string(),
            port: 0,
            cors_origins: parse_origins(DEFAULT_CORS_ORIGINS),
            allow_resubmission: true,
            empty_result_not_found: true,
            seed_users: None,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_bool(&value).ok_or(ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
