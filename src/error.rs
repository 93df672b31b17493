//! Error types for the PDF viewer helper

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for the PDF viewer helper
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF viewer helper
#[derive(Error, Debug)]
pub enum Error {
    /// A second helper was requested under the exclusive lifecycle policy
    #[error("PdfJsHelper is a singleton. Use HelperFactory::instance() instead")]
    SingletonViolation,

    /// One-time worker initialization failed; every dependent operation sees this.
    ///
    /// The outcome is cached and handed to every caller, so the engine's error
    /// is shared behind an `Arc` rather than cloned. It is preserved as is.
    #[error("Worker initialization failed: {0}")]
    Initialization(Arc<Error>),

    /// The engine worker could not be installed
    #[error("Failed to install worker from {location}: {reason}")]
    WorkerInstall { location: String, reason: String },

    /// Document not found at the given location
    #[error("PDF not found: {location}")]
    DocumentNotFound { location: String },

    /// Invalid PDF data
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no (or a wrong) password was provided
    #[error("Document needs a password")]
    PasswordRequired,

    /// Page out of bounds
    #[error("Page {page} does not exist (document has {total} pages)")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Scale outside of the viewer's supported range
    #[error("Invalid scale {scale} (allowed: {min}..={max})")]
    InvalidScale { scale: f32, min: f32, max: f32 },

    /// A path or URL could not be turned into PDF bytes
    #[error("Could not resolve document source: {reason}")]
    SourceResolution { reason: String },

    /// Download too large
    #[error("Remote document is {size} bytes, over the {max_size} byte limit")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Page rendering error
    #[error("Failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Message for end users: no paths, worker locations or library errors.
    pub fn client_message(&self) -> String {
        match self {
            Error::SingletonViolation => "Viewer helper already exists".to_string(),
            Error::Initialization(inner) => inner.client_message(),
            Error::WorkerInstall { .. } => "PDF worker could not be started".to_string(),
            Error::DocumentNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "Document needs a password".to_string(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} does not exist ({} pages)", page, total)
            }
            Error::InvalidScale { min, max, .. } => {
                format!("Scale must be between {} and {}", min, max)
            }
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Remote document is larger than {} bytes", max_size)
            }
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Render { page, .. } => format!("Failed to render page {}", page),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Url(_) => "Invalid URL".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
        }
    }

    /// Whether this error (or the initialization failure it wraps) is a worker install failure
    pub fn is_worker_install(&self) -> bool {
        match self {
            Error::WorkerInstall { .. } => true,
            Error::Initialization(inner) => inner.is_worker_install(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_details() {
        let err = Error::WorkerInstall {
            location: "/secret/path/build/pdf.worker.min.mjs".to_string(),
            reason: "dlopen failed".to_string(),
        };
        assert!(!err.client_message().contains("/secret"));
        assert!(err.to_string().contains("/secret"));
    }

    #[test]
    fn test_initialization_wraps_install_failure() {
        let err = Error::Initialization(Arc::new(Error::WorkerInstall {
            location: "worker".to_string(),
            reason: "boom".to_string(),
        }));
        assert!(err.is_worker_install());
        assert_eq!(err.client_message(), "PDF worker could not be started");
        assert!(!Error::PasswordRequired.is_worker_install());
    }
}
