//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONTACT_CARDS_CONFIG environment variable
//! 3. Otherwise built-in defaults
//!
//! Individual settings can then be overridden from the environment
//! (CONTACT_CARDS_BIND, CONTACT_CARDS_DATABASE, CONTACT_CARDS_MEDIA_ROOT,
//! CONTACT_CARDS_BASE_URL, CONTACT_CARDS_DEBUG).

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CardError, Result};
use crate::qr::{
    QrOptions, MAX_SCALE, PNG_DEFAULT_BORDER, PNG_DEFAULT_SCALE, SVG_DEFAULT_BORDER, SVG_DEFAULT_SCALE,
};
use crate::storage::{MediaDir, DEFAULT_MAX_ATTACHMENT_BYTES};

pub const CONFIG_ENV: &str = "CONTACT_CARDS_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Directory uploaded .vcf names are relative to
    pub media_root: PathBuf,
    pub max_attachment_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("contact_cards.db"),
            media_root: PathBuf::from("media"),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Public origin used to build absolute QR/link targets, e.g. "https://example.com"
    pub public_base_url: Option<String>,
    /// Development mode: no immutable caching, no AI opt-out header
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    pub svg_scale: u32,
    pub svg_border: u32,
    pub png_scale: u32,
    pub png_border: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            svg_scale: SVG_DEFAULT_SCALE,
            svg_border: SVG_DEFAULT_BORDER,
            png_scale: PNG_DEFAULT_SCALE,
            png_border: PNG_DEFAULT_BORDER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub site: SiteConfig,
    pub qr: QrConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CardError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            CardError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load from an explicit path, the CONTACT_CARDS_CONFIG file, or defaults,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                info!("No config file given, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("CONTACT_CARDS_BIND") {
            self.server.bind_addr = bind;
        }
        if let Some(db) = lookup("CONTACT_CARDS_DATABASE") {
            self.storage.database_path = PathBuf::from(db);
        }
        if let Some(media) = lookup("CONTACT_CARDS_MEDIA_ROOT") {
            self.storage.media_root = PathBuf::from(media);
        }
        if let Some(base) = lookup("CONTACT_CARDS_BASE_URL") {
            self.site.public_base_url = Some(base).filter(|b| !b.trim().is_empty());
        }
        if let Some(debug) = lookup("CONTACT_CARDS_DEBUG") {
            self.site.debug = is_truthy(&debug);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let qr = &self.qr;
        if qr.svg_border == 0 || qr.png_border == 0 {
            return Err(CardError::Config(
                "QR border must be at least one module".to_string(),
            ));
        }
        if qr.svg_scale == 0 || qr.png_scale == 0 {
            return Err(CardError::Config("QR scale must be positive".to_string()));
        }

        if let Some(base) = &self.site.public_base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(CardError::Config(format!(
                    "public_base_url must start with http:// or https://, got {:?}",
                    base
                )));
            }
        }

        Ok(())
    }

    pub fn base_url(&self) -> Option<&str> {
        self.site.public_base_url.as_deref()
    }

    pub fn media_dir(&self) -> MediaDir {
        MediaDir::new(&self.storage.media_root).with_max_bytes(self.storage.max_attachment_bytes)
    }

    /// SVG options; a record's own scale takes precedence over the configured default
    pub fn svg_options(&self, scale: Option<u32>) -> QrOptions {
        QrOptions::svg()
            .with_scale(
                scale
                    .filter(|s| *s > 0)
                    .unwrap_or(self.qr.svg_scale)
                    .min(MAX_SCALE),
            )
            .with_border(self.qr.svg_border)
    }

    pub fn png_options(&self) -> QrOptions {
        QrOptions::png()
            .with_scale(self.qr.png_scale)
            .with_border(self.qr.png_border)
    }
}

/// "1", "true", "yes" and "on", case-insensitively
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
