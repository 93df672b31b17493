//! PDF engine abstraction
//!
//! The helper never parses or renders PDF data itself. Engines implement
//! [`PdfEngine`] and [`PdfDocumentHandle`]:
//! - [`MemoryEngine`]: in-memory documents, used by hosts without a native engine and by tests
//! - [`PdfiumEngine`]: PDFium via `pdfium-render`

mod memory;
mod model;
mod pdfium;
pub mod source;

pub use memory::{EngineCall, MemoryDocument, MemoryEngine, MemoryPage};
pub use model::{
    Annotation, AnnotationStorage, AnnotationSubtype, DocumentInfo, DocumentInitParameters,
    DocumentMetadata, DocumentOptions, FieldObject, FieldObjects, PageProxy, PageSize,
    RenderedPage,
};
pub use pdfium::{PdfiumDocument, PdfiumEngine};

use crate::config::WorkerSource;
use crate::error::Result;
use std::future::Future;

/// A PDF engine: owns the background worker and opens documents.
pub trait PdfEngine: Send + Sync + 'static {
    type Document: PdfDocumentHandle;

    /// Install the worker bundle of the selected build as the engine's global worker.
    fn install_worker(&self, worker: &WorkerSource) -> impl Future<Output = Result<()>> + Send;

    /// Open a document.
    ///
    /// The engine takes ownership of `params.data`.
    fn get_document(
        &self,
        params: DocumentInitParameters,
    ) -> impl Future<Output = Result<Self::Document>> + Send;
}

/// A parsed document as exposed by an engine.
pub trait PdfDocumentHandle: Send + Sync + 'static {
    fn num_pages(&self) -> u32;

    /// Field objects grouped by field name, or `None` when the document has no form fields
    fn field_objects(&self) -> impl Future<Output = Result<Option<FieldObjects>>> + Send;

    fn metadata(&self) -> impl Future<Output = Result<Option<DocumentMetadata>>> + Send;

    /// Page by number (1-indexed)
    fn page(&self, page_number: u32) -> impl Future<Output = Result<PageProxy>> + Send;

    /// Values edited in the viewer but not yet saved
    fn annotation_storage(&self) -> &AnnotationStorage;

    /// Serialise the document including edited form values
    fn save_document(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Rasterise a page at `scale` (1.0 = 72 dpi). With `forms` set, form
    /// widgets are drawn with their edited values.
    fn render_page(
        &self,
        page_number: u32,
        scale: f32,
        forms: bool,
    ) -> impl Future<Output = Result<RenderedPage>> + Send;
}
