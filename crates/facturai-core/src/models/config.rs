//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FacturaiError;
use crate::export::ExportFormat;
use crate::normalize::DecimalConvention;

/// Main configuration for a facturai run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacturaiConfig {
    /// Input discovery configuration.
    pub input: InputConfig,

    /// Extraction service configuration.
    pub gateway: GatewayConfig,

    /// Normalization configuration.
    pub normalize: NormalizeConfig,

    /// Export configuration.
    pub export: ExportConfig,
}

/// Where invoices are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory containing invoice PDFs.
    pub dir: PathBuf,

    /// File extension of invoices (matched case-insensitively).
    pub extension: String,

    /// Descend into sub-directories.
    pub recursive: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Data"),
            extension: "pdf".to_string(),
            recursive: false,
        }
    }
}

/// Live extraction service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the Generative Language API.
    pub endpoint: String,

    /// Model identifier.
    pub model: String,

    /// Name of the environment variable holding the API key.
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Largest invoice sent inline, in bytes.
    pub max_file_bytes: u64,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum concurrent extraction calls.
    pub jobs: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            timeout_secs: 120,
            max_file_bytes: 20 * 1024 * 1024,
            temperature: 0.0,
            jobs: 1,
        }
    }
}

/// Record normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Decimal separator convention for textual amounts.
    pub decimal_convention: DecimalConvention,

    /// Currency used when none is detected (empty = leave blank).
    pub default_currency: String,

    /// Warn about IBANs with a bad checksum.
    pub validate_iban: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            decimal_convention: DecimalConvention::Auto,
            default_currency: String::new(),
            validate_iban: true,
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory the export is written to.
    pub dir: PathBuf,

    /// Export file format.
    pub format: ExportFormat,

    /// File name prefix, followed by the run timestamp.
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Output"),
            format: ExportFormat::Csv,
            file_prefix: "invoices".to_string(),
        }
    }
}

impl FacturaiConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Reject settings no run can work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.input.extension.trim().is_empty() {
            return Err(FacturaiError::Config("input.extension is empty".to_string()));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(FacturaiError::Config("gateway.timeout_secs must be positive".to_string()));
        }
        if self.gateway.jobs == 0 {
            return Err(FacturaiError::Config("gateway.jobs must be at least 1".to_string()));
        }
        if self.gateway.model.trim().is_empty() {
            return Err(FacturaiError::Config("gateway.model is empty".to_string()));
        }
        if self.export.file_prefix.trim().is_empty() {
            return Err(FacturaiError::Config("export.file_prefix is empty".to_string()));
        }
        Ok(())
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
