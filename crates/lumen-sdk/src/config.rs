//! Client configuration
//!
//! Loaded from TOML with every field defaulted, then overridden from the
//! environment (`LUMEN_BASE_URL`, `LUMEN_API_KEY`, `LUMEN_AUTH_BYPASS`).

use crate::error::{Result, SdkError};
use crate::identity::Role;
use lumen_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LumenConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub invoice: InvoiceConfig,
}

/// How the current identity is obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Identity comes from the signed-in gateway session
    #[default]
    Live,
    /// Fixed development identity; the store's row security still applies
    Bypass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    /// User id for bypass mode
    #[serde(default)]
    pub bypass_user_id: Option<String>,

    /// Role for bypass mode
    #[serde(default)]
    pub bypass_role: Role,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Live,
            bypass_user_id: None,
            bypass_role: Role::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Object storage bucket for images
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Accepted MIME types
    #[serde(default = "default_allowed_mime")]
    pub allowed_mime: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            max_bytes: default_max_bytes(),
            allowed_mime: default_allowed_mime(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceConfig {
    /// Tax rate (percent) prefilled on new taxable invoices
    #[serde(default = "default_tax_rate")]
    pub default_tax_rate: String,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            default_tax_rate: default_tax_rate(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

// Defaults
fn default_bucket() -> String { "images".to_string() }
fn default_max_bytes() -> u64 { 10 * 1024 * 1024 } // 10MB
fn default_allowed_mime() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/webp".to_string(),
    ]
}
fn default_tax_rate() -> String { "18".to_string() }
fn default_currency_symbol() -> String { crate::derive::DEFAULT_CURRENCY_SYMBOL.to_string() }

impl LumenConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read a TOML file. Does not apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `LUMEN_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LUMEN_BASE_URL") {
            self.gateway.base_url = url;
        }
        if let Some(key) = lookup("LUMEN_API_KEY") {
            self.gateway.api_key = key;
        }
        if let Some(user_id) = lookup("LUMEN_AUTH_BYPASS") {
            let user_id = user_id.trim();
            if !user_id.is_empty() {
                self.auth.mode = AuthMode::Bypass;
                self.auth.bypass_user_id = Some(user_id.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(SdkError::Config("gateway.base_url must not be empty".into()));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(SdkError::Config("gateway.timeout_secs must be positive".into()));
        }
        if self.upload.max_bytes == 0 {
            return Err(SdkError::Config("upload.max_bytes must be positive".into()));
        }
        if self.auth.mode == AuthMode::Bypass {
            let user_id = self.auth.bypass_user_id.as_deref().unwrap_or("").trim();
            if uuid::Uuid::parse_str(user_id).is_err() {
                return Err(SdkError::Config(
                    "auth.bypass_user_id must be a UUID in bypass mode".into(),
                ));
            }
        }
        Ok(())
    }
}
