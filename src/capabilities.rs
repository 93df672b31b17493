//! Platform capability detection and engine build selection
//!
//! The engine ships a standard build and a legacy build. The legacy build is
//! required when the host platform lacks either of two modern primitives: a
//! deferred-completion helper and a static URL parser. The probe runs once at
//! startup and the resulting [`PlatformCapabilities`] value is handed to every
//! helper that needs it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Probes the host platform for the primitives the standard engine build relies on.
pub trait PlatformProbe {
    /// A helper returning a pre-created completion/rejection pair is available
    fn has_deferred_completion(&self) -> bool;

    /// A static URL parsing helper is available
    fn has_url_parse(&self) -> bool;
}

/// Probe for native targets
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProbe;

impl PlatformProbe for NativeProbe {
    /// Native targets always have oneshot channels
    fn has_deferred_completion(&self) -> bool {
        true
    }

    fn has_url_parse(&self) -> bool {
        url::Url::parse("https://example.com/").is_ok()
    }
}

/// Probe with fixed answers, for hosts that learn their capabilities elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    pub deferred_completion: bool,
    pub url_parse: bool,
}

impl PlatformProbe for StaticProbe {
    fn has_deferred_completion(&self) -> bool {
        self.deferred_completion
    }

    fn has_url_parse(&self) -> bool {
        self.url_parse
    }
}

/// Engine build variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    Standard,
    Legacy,
}

impl BuildVariant {
    /// Worker bundle path relative to the worker base URL
    pub fn worker_path(self) -> &'static str {
        match self {
            BuildVariant::Standard => "build/pdf.worker.min.mjs",
            BuildVariant::Legacy => "legacy/build/pdf.worker.min.mjs",
        }
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildVariant::Standard => f.write_str("standard"),
            BuildVariant::Legacy => f.write_str("legacy"),
        }
    }
}

/// Result of probing the platform, computed once and shared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    pub deferred_completion: bool,
    pub url_parse: bool,
}

impl PlatformCapabilities {
    /// Run the probe
    pub fn detect<P: PlatformProbe + ?Sized>(probe: &P) -> Self {
        let caps = Self {
            deferred_completion: probe.has_deferred_completion(),
            url_parse: probe.has_url_parse(),
        };
        if caps.requires_legacy_build() {
            tracing::warn!(
                deferred_completion = caps.deferred_completion,
                url_parse = caps.url_parse,
                "platform lacks modern primitives, falling back to legacy engine build"
            );
        }
        caps
    }

    /// Capabilities of the native platform
    pub fn native() -> Self {
        Self::detect(&NativeProbe)
    }

    /// Whether the legacy engine build must be used
    pub fn requires_legacy_build(&self) -> bool {
        !self.deferred_completion || !self.url_parse
    }

    /// Build variant selected by these capabilities
    pub fn build_variant(&self) -> BuildVariant {
        if self.requires_legacy_build() {
            BuildVariant::Legacy
        } else {
            BuildVariant::Standard
        }
    }
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            deferred_completion: true,
            url_parse: true,
        }
    }
}
