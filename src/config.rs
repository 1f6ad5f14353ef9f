use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::emergency::qr::{MAX_MARGIN_MODULES, MAX_WIDTH_PX};
use crate::emergency::{ImageFormat, QrOptions};

/// Application-level constants
pub const APP_NAME: &str = "Kincare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

const ENV_ORIGIN: &str = "KINCARE_ORIGIN";
const ENV_QR_WIDTH: &str = "KINCARE_QR_WIDTH";
const ENV_QR_MARGIN: &str = "KINCARE_QR_MARGIN";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid origin {value}: {reason}")]
    InvalidOrigin { value: String, reason: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} = {value} is outside {min}..={max}")]
    OutOfRange {
        key: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Get the application data directory
/// ~/Kincare/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Where finished cards are saved
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// Where artifacts are staged while being serialized
pub fn staging_dir() -> PathBuf {
    app_data_dir().join("staging")
}

/// Get the local database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("kincare.db")
}

/// Log filter used when `RUST_LOG` is unset
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "kincare_lib=debug,info"
    } else {
        "kincare_lib=info,warn"
    }
}

/// Settings for emergency card generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardConfig {
    /// Scheme + host (+ port) the timeline link points at.
    pub origin: String,
    pub qr: QrOptions,
    /// Format of the QR image embedded in the card.
    pub image_format: ImageFormat,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.into(),
            qr: QrOptions::default(),
            image_format: ImageFormat::Png,
        }
    }
}

impl CardConfig {
    /// Defaults overridden by `KINCARE_ORIGIN`, `KINCARE_QR_WIDTH` and
    /// `KINCARE_QR_MARGIN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(origin) = lookup(ENV_ORIGIN) {
            config.origin = origin;
        }
        if let Some(width) = lookup(ENV_QR_WIDTH) {
            config.qr.width_px = parse_number(ENV_QR_WIDTH, &width)?;
        }
        if let Some(margin) = lookup(ENV_QR_MARGIN) {
            config.qr.margin_modules = parse_number(ENV_QR_MARGIN, &margin)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// The origin must be an absolute http(s) URL with no path, query or
    /// fragment. A trailing slash is dropped. QR width and margin must stay
    /// within the renderer's bounds.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        check_range(ENV_QR_WIDTH, self.qr.width_px, 1, MAX_WIDTH_PX)?;
        check_range(ENV_QR_MARGIN, self.qr.margin_modules, 0, MAX_MARGIN_MODULES)?;

        let invalid = |reason: &str| ConfigError::InvalidOrigin {
            value: self.origin.clone(),
            reason: reason.to_string(),
        };

        let url = Url::parse(self.origin.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("origin must not carry a path, query or fragment"));
        }

        self.origin = url.origin().ascii_serialization();
        Ok(())
    }
}

fn check_range(key: &'static str, value: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max,
        })
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}
