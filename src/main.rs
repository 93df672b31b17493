//! PDF Viewer - command line entry point
//!
//! Opens a PDF with PDFium and prints a JSON summary of its pages and form.

use anyhow::Context;
use clap::Parser;
use pdf_viewer_helper::engine::{DocumentOptions, PdfDocumentHandle, PdfiumEngine};
use pdf_viewer_helper::{HelperConfig, PdfJsHelper, PlatformCapabilities};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// PDF file path or URL
    location: String,

    /// Use the legacy engine build
    #[arg(long, default_value_t = false)]
    legacy: bool,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_viewer_helper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = HelperConfig::from_env();
    config.worker.force_legacy |= args.legacy;

    let engine = PdfiumEngine::new(config.max_download_bytes);
    let helper = PdfJsHelper::new(engine, config, PlatformCapabilities::native());

    let options = DocumentOptions {
        password: args.password,
        ..DocumentOptions::default()
    };
    let document = helper
        .load_document(args.location.as_str(), options)
        .await
        .with_context(|| format!("failed to open {}", args.location))?;

    let has_form = helper.has_form(&document).await?;
    let listened = helper.get_form_fields_to_listen(&document).await?;
    let required = helper.get_required_fields(&document).await?;
    let metadata = document.metadata().await?;

    let summary = json!({
        "source": args.location,
        "build": helper.build_variant(),
        "pageCount": document.num_pages(),
        "metadata": metadata.and_then(|m| m.info),
        "hasForm": has_form,
        "fieldsToListen": listened,
        "requiredFieldsFilled": PdfJsHelper::<PdfiumEngine>::all_required_fields_filled(&required),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_location_and_flags() {
        let args =
            Args::try_parse_from(["pdf-viewer", "form.pdf", "--legacy", "--password", "pw"])
                .unwrap();
        assert_eq!(args.location, "form.pdf");
        assert!(args.legacy);
        assert_eq!(args.password.as_deref(), Some("pw"));

        let args = Args::try_parse_from(["pdf-viewer", "https://example.com/a.pdf"]).unwrap();
        assert!(!args.legacy);
        assert_eq!(args.password, None);
    }

    #[test]
    fn test_location_is_required() {
        assert!(Args::try_parse_from(["pdf-viewer", "--legacy"]).is_err());
        assert!(Args::try_parse_from(["pdf-viewer", "--password"]).is_err());
    }
}
