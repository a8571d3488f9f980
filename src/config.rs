//! Configuration types for the Convert and Export flows.
//!
//! Everything a flow needs to know lives in [`BridgeConfig`], built via its
//! [`BridgeConfigBuilder`] or loaded from a JSON file with
//! [`BridgeConfig::from_json_file`]. The nested sections mirror the pipeline:
//! [`ExtractConfig`] for the table extractor, [`ImportConfig`] for the
//! accounting endpoint, and [`RetryPolicy`] inside it for transport retries.

use crate::error::{Pdf2TallyError, Result};
use crate::progress::Observer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default accounting import endpoint (Tally's local HTTP server).
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9000";

/// Name given to the single worksheet of every artifact.
pub const DEFAULT_SHEET_NAME: &str = "PDF Data";

/// Configuration for both pipeline flows.
///
/// # Example
/// ```rust
/// use pdf2tally::BridgeConfig;
///
/// let config = BridgeConfig::builder()
///     .artifact_dir("/var/lib/pdf2tally")
///     .endpoint("http://tally.local:9000")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.import.retry.max_retries, 2);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory holding one artifact per key. Default: `uploads`.
    pub artifact_dir: PathBuf,

    /// Worksheet name written into every artifact. Default: `PDF Data`.
    pub sheet_name: String,

    /// Table extractor settings.
    pub extract: ExtractConfig,

    /// Accounting endpoint settings.
    pub import: ImportConfig,

    /// Optional stage observer; not serialised.
    #[serde(skip)]
    pub observer: Option<Observer>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("uploads"),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            extract: ExtractConfig::default(),
            import: ImportConfig::default(),
            observer: None,
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("artifact_dir", &self.artifact_dir)
            .field("sheet_name", &self.sheet_name)
            .field("extract", &self.extract)
            .field("import", &self.import)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

/// Table extractor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Vertical distance (PDF points) within which two text fragments'
    /// centres count as the same row. Default: 3.0.
    pub row_tolerance: f32,

    /// Horizontal gap (PDF points) below which adjacent fragments in a row
    /// are joined into one cell. `0` disables merging. Default: 1.0.
    pub merge_gap: f32,

    /// Upper bound on extraction wall-clock time, in seconds. Default: 60.
    pub timeout_secs: u64,

    /// PDF user password for encrypted documents.
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Directory containing the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 3.0,
            merge_gap: 1.0,
            timeout_secs: 60,
            password: None,
            pdfium_lib_path: None,
        }
    }
}

/// Accounting endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// URL the ledger XML is POSTed to. Default: `http://localhost:9000`.
    pub endpoint: String,

    /// Per-request timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Retry policy for failed transmissions. Default: single attempt.
    pub retry: RetryPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// How often a failed import is re-sent.
///
/// The default is a single attempt with no retry. Raising `max_retries`
/// enables exponential backoff: `backoff_ms`, `2 × backoff_ms`, …
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first. Default: 0.
    pub max_retries: u32,

    /// Initial delay between attempts in milliseconds. Default: 500.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based retry count).
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_ms.saturating_mul(2u64.pow(exp))
    }
}

impl BridgeConfig {
    /// Create a new builder for `BridgeConfig`.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Pdf2TallyError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Pdf2TallyError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints. Called by [`BridgeConfigBuilder::build`].
    pub fn validate(&self) -> Result<()> {
        if self.sheet_name.trim().is_empty() || self.sheet_name.chars().count() > 31 {
            return Err(Pdf2TallyError::InvalidConfig(format!(
                "sheet name must be 1–31 characters, got {:?}",
                self.sheet_name
            )));
        }
        if self.extract.row_tolerance.is_nan() || self.extract.row_tolerance <= 0.0 {
            return Err(Pdf2TallyError::InvalidConfig(format!(
                "row tolerance must be > 0, got {}",
                self.extract.row_tolerance
            )));
        }
        if self.extract.merge_gap < 0.0 {
            return Err(Pdf2TallyError::InvalidConfig(format!(
                "merge gap must be ≥ 0, got {}",
                self.extract.merge_gap
            )));
        }
        if self.extract.timeout_secs == 0 {
            return Err(Pdf2TallyError::InvalidConfig(
                "extraction timeout must be ≥ 1s".into(),
            ));
        }
        if self.import.request_timeout_secs == 0 {
            return Err(Pdf2TallyError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        let url = reqwest::Url::parse(&self.import.endpoint).map_err(|e| {
            Pdf2TallyError::InvalidConfig(format!("endpoint {:?}: {e}", self.import.endpoint))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Pdf2TallyError::InvalidConfig(format!(
                "endpoint must be http or https, got {:?}",
                self.import.endpoint
            )));
        }
        Ok(())
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Debug)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = dir.into();
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = name.into();
        self
    }

    pub fn row_tolerance(mut self, points: f32) -> Self {
        self.config.extract.row_tolerance = points;
        self
    }

    pub fn merge_gap(mut self, points: f32) -> Self {
        self.config.extract.merge_gap = points.max(0.0);
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract.timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.extract.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.extract.pdfium_lib_path = Some(dir.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.import.endpoint = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.import.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.import.retry.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.import.retry.backoff_ms = ms;
        self
    }

    pub fn observer(mut self, observer: Observer) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BridgeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_deployment() {
        let c = BridgeConfig::default();
        assert_eq!(c.artifact_dir, PathBuf::from("uploads"));
        assert_eq!(c.sheet_name, "PDF Data");
        assert_eq!(c.import.endpoint, "http://localhost:9000");
        assert_eq!(c.import.retry.max_retries, 0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn builder_rejects_bad_endpoint() {
        let err = BridgeConfig::builder()
            .endpoint("ftp://tally")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"), "got: {err}");

        assert!(BridgeConfig::builder().endpoint("not a url").build().is_err());
    }

    #[test]
    fn builder_rejects_zero_tolerance() {
        assert!(BridgeConfig::builder().row_tolerance(0.0).build().is_err());
        assert!(BridgeConfig::builder().row_tolerance(f32::NAN).build().is_err());
    }

    #[test]
    fn retry_delay_doubles() {
        let p = RetryPolicy {
            max_retries: 3,
            backoff_ms: 500,
        };
        assert_eq!(p.delay_for(1), 500);
        assert_eq!(p.delay_for(2), 1000);
        assert_eq!(p.delay_for(3), 2000);
    }

    #[test]
    fn json_file_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdf2tally.json");
        std::fs::write(
            &path,
            r#"{ "import": { "endpoint": "http://10.0.0.5:9000", "retry": { "max_retries": 1 } } }"#,
        )
        .unwrap();

        let c = BridgeConfig::from_json_file(&path).unwrap();
        assert_eq!(c.import.endpoint, "http://10.0.0.5:9000");
        assert_eq!(c.import.retry.max_retries, 1);
        assert_eq!(c.import.retry.backoff_ms, 500);
        assert_eq!(c.import.request_timeout_secs, 30);
        assert_eq!(c.sheet_name, "PDF Data");
    }

    #[test]
    fn json_file_invalid_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = BridgeConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
