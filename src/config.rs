//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast when a required variable is missing
//! or unparsable.

use crate::error::{Result, ShipmentError};
use crate::message::DEFAULT_MAX_MESSAGE_BYTES;
use crate::store::DEFAULT_MAX_SIGNATURE_BYTES;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_level: String,
    pub max_message_bytes: usize,
    pub max_signature_bytes: usize,
    pub code_prefix: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Config::from_env`], but `.env` in the working directory is
    /// loaded first when present.
    pub fn from_dotenv() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Same parsing as [`Config::from_env`] against an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("SHIPMENT_DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ShipmentError::Config(
                    "required environment variable SHIPMENT_DB_PATH is not set".to_string(),
                )
            })?;

        Ok(Self {
            db_path: PathBuf::from(db_path),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            max_message_bytes: parsed(&lookup, "MAX_MESSAGE_BYTES")?
                .unwrap_or(DEFAULT_MAX_MESSAGE_BYTES),
            max_signature_bytes: parsed(&lookup, "MAX_SIGNATURE_BYTES")?
                .unwrap_or(DEFAULT_MAX_SIGNATURE_BYTES),
            code_prefix: lookup("SHIPMENT_CODE_PREFIX").unwrap_or_else(|| "CL".to_string()),
        })
    }
}

fn parsed<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| ShipmentError::Config(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}
