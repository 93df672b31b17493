//! PDF Viewer Helper Library
//!
//! This crate wraps a PDF engine for viewer components:
//! - installs the engine's worker exactly once and gates every operation on it
//! - loads documents from bytes or URLs with the configured asset URLs
//! - creates page viewers bound to host elements and an event bus
//! - answers form questions: `has_form`, `form_values_have_changed`,
//!   `get_form_fields_to_listen`, `all_required_fields_filled`

pub mod capabilities;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod forms;
pub mod helper;
pub mod viewer;

pub use capabilities::{BuildVariant, PlatformCapabilities, PlatformProbe};
pub use config::{AssetUrls, HelperConfig, WorkerConfig};
pub use error::{Error, Result};
pub use event_bus::{EventBus, Scale, ViewerEvent, ViewerId};
pub use forms::{FieldType, FieldValue, RequiredField};
pub use helper::{DocumentSource, HelperFactory, LifecyclePolicy, PdfJsHelper};
pub use viewer::{HostElement, PdfViewer, ViewerOptions};
