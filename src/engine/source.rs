//! Byte resolution for engines that cannot fetch documents themselves

use crate::error::{Error, Result};
use futures_util::StreamExt;
use std::path::Path;

/// Resolved PDF data
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

fn check_pdf_header(data: &[u8], what: &str) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: format!("{} is not a valid PDF file", what),
        });
    }
    Ok(())
}

/// Resolve in-memory data, validating the PDF header
pub fn resolve_data(data: Vec<u8>) -> Result<ResolvedPdf> {
    check_pdf_header(&data, "Data")?;
    Ok(ResolvedPdf {
        data,
        source_name: "<data>".to_string(),
    })
}

/// Resolve a file path to PDF data
pub async fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(Error::DocumentNotFound {
            location: path.display().to_string(),
        });
    }

    let data = tokio::fs::read(path).await?;
    check_pdf_header(&data, "File")?;

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
    })
}

/// Resolve an HTTP(S) URL to PDF data with a download size limit
pub async fn resolve_url(url: &str, max_download_bytes: u64) -> Result<ResolvedPdf> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(Error::HttpRequest)?;

    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(Error::SourceResolution {
            reason: format!("HTTP request failed with status: {}", response.status()),
        });
    }

    // Reject on the announced length before reading the body
    if let Some(content_length) = response.content_length() {
        if content_length > max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: content_length,
                max_size: max_download_bytes,
            });
        }
    }

    // The announced length may be missing or wrong
    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Error::HttpRequest)?;
        data.extend_from_slice(&chunk);
        if data.len() as u64 > max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: data.len() as u64,
                max_size: max_download_bytes,
            });
        }
    }

    check_pdf_header(&data, "Downloaded data")?;

    Ok(ResolvedPdf {
        data,
        source_name: url.to_string(),
    })
}

/// Resolve a document location: `http(s)://` and `file://` URLs, or a plain path
pub async fn resolve_location(location: &str, max_download_bytes: u64) -> Result<ResolvedPdf> {
    match url::Url::parse(location) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => resolve_url(location, max_download_bytes).await,
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| Error::SourceResolution {
                        reason: format!("Invalid file URL: {}", location),
                    })?;
                resolve_path(path).await
            }
            other => Err(Error::SourceResolution {
                reason: format!("Unsupported URL scheme: {}", other),
            }),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => resolve_path(location).await,
        Err(e) => Err(Error::Url(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_data_invalid() {
        let result = resolve_data(b"Hello World".to_vec());
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_resolve_data_valid_header() {
        let resolved = resolve_data(b"%PDF-1.7\n".to_vec()).unwrap();
        assert_eq!(resolved.source_name, "<data>");
    }

    #[tokio::test]
    async fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf").await;
        assert!(matches!(result, Err(Error::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_location_file_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4\n%%EOF\n").unwrap();

        let url = url::Url::from_file_path(file.path()).unwrap();
        let resolved = resolve_location(url.as_str(), 1024).await.unwrap();
        assert_eq!(resolved.data, b"%PDF-1.4\n%%EOF\n");

        let by_path = resolve_location(&file.path().display().to_string(), 1024)
            .await
            .unwrap();
        assert_eq!(by_path.data, resolved.data);
    }

    #[tokio::test]
    async fn test_resolve_location_rejects_non_pdf_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plain text").unwrap();

        let result = resolve_location(&file.path().display().to_string(), 1024).await;
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[tokio::test]
    async fn test_resolve_location_unsupported_scheme() {
        let result = resolve_location("ftp://example.com/file.pdf", 1024).await;
        assert!(matches!(result, Err(Error::SourceResolution { .. })));
    }
}
