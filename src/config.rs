//! Helper configuration

use crate::capabilities::BuildVariant;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Base URLs of the auxiliary assets the engine cannot bundle inline.
///
/// Engines append file names directly to these, so every URL is kept with a
/// trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUrls {
    /// Character maps for non-Latin glyph sets
    pub cmap_url: String,
    /// ICC colour profiles
    pub icc_url: String,
    /// WASM decoder modules
    pub wasm_url: String,
}

impl AssetUrls {
    pub fn new(
        cmap_url: impl Into<String>,
        icc_url: impl Into<String>,
        wasm_url: impl Into<String>,
    ) -> Self {
        Self {
            cmap_url: with_trailing_slash(cmap_url.into()),
            icc_url: with_trailing_slash(icc_url.into()),
            wasm_url: with_trailing_slash(wasm_url.into()),
        }
    }
}

impl Default for AssetUrls {
    fn default() -> Self {
        Self::new("./cmaps/", "./iccs/", "./wasm/")
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Location of the engine's background worker bundles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Base URL (or directory) both build variants are resolved against
    pub base_url: String,
    /// Force the legacy build regardless of detected capabilities
    pub force_legacy: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            base_url: "./".to_string(),
            force_legacy: false,
        }
    }
}

/// Resolved worker bundle for one build variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSource {
    pub variant: BuildVariant,
    pub location: String,
}

impl WorkerConfig {
    /// Resolve the worker bundle location of `variant`.
    ///
    /// Absolute URLs are joined with `url::Url::join`; anything else is
    /// treated as a relative directory.
    pub fn resolve(&self, variant: BuildVariant) -> Result<WorkerSource> {
        let location = match url::Url::parse(&self.base_url) {
            Ok(base) => {
                let base = if base.path().ends_with('/') {
                    base
                } else {
                    url::Url::parse(&with_trailing_slash(base.to_string()))?
                };
                base.join(variant.worker_path())?.to_string()
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                format!(
                    "{}{}",
                    with_trailing_slash(self.base_url.clone()),
                    variant.worker_path()
                )
            }
            Err(e) => return Err(Error::Url(e)),
        };

        Ok(WorkerSource { variant, location })
    }
}

/// Full helper configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Asset base URLs handed to the engine on every document load
    pub assets: AssetUrls,
    /// Character maps are stored in packed binary form
    pub cmap_packed: bool,
    /// Worker bundle location
    pub worker: WorkerConfig,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            assets: AssetUrls::default(),
            cmap_packed: true,
            worker: WorkerConfig::default(),
            max_download_bytes: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl HelperConfig {
    /// Defaults overlaid with `PDF_VIEWER_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let defaults = config.assets.clone();

        let cmap_url = env::var("PDF_VIEWER_CMAP_URL").unwrap_or(defaults.cmap_url);
        let icc_url = env::var("PDF_VIEWER_ICC_URL").unwrap_or(defaults.icc_url);
        let wasm_url = env::var("PDF_VIEWER_WASM_URL").unwrap_or(defaults.wasm_url);
        config.assets = AssetUrls::new(cmap_url, icc_url, wasm_url);

        if let Ok(worker_url) = env::var("PDF_VIEWER_WORKER_URL") {
            config.worker.base_url = worker_url;
        }
        if let Ok(value) = env::var("PDF_VIEWER_FORCE_LEGACY") {
            config.worker.force_legacy = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Ok(value) = env::var("PDF_VIEWER_MAX_DOWNLOAD_BYTES") {
            match value.parse() {
                Ok(bytes) => config.max_download_bytes = bytes,
                Err(_) => {
                    tracing::warn!(value = %value, "ignoring invalid PDF_VIEWER_MAX_DOWNLOAD_BYTES")
                }
            }
        }

        config
    }
}
