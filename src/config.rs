use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub secret: String,
    pub token_ttl_hours: i64,
    pub media_root: PathBuf,
    pub max_image_bytes: usize,
    pub admin: Option<AdminSeed>,
}

/// Account created on startup when `ADMIN_EMAIL`, `ADMIN_USERNAME` and
/// `ADMIN_PASSWORD` are all present.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let admin = match (
            var("ADMIN_EMAIL"),
            var("ADMIN_USERNAME"),
            var("ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(username), Some(password)) => Some(AdminSeed {
                email,
                username,
                password,
            }),
            _ => {
                info!("Admin seed variables not set, skipping admin account");
                None
            }
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_address: try_load("BIND_ADDRESS", "0.0.0.0:3000")?,
            secret: required("SECRET")?,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "./media")?,
            max_image_bytes: try_load("MAX_IMAGE_BYTES", "5242880")?,
            admin,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or(ConfigError::Missing(key))
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}
