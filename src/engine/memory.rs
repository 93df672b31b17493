//! In-memory engine
//!
//! Documents are described up front with [`MemoryDocument`] and registered by
//! URL or by content. Every engine call is recorded, which makes the engine
//! useful for hosts that drive a viewer from pre-extracted data and for
//! observing call sequencing.

use super::model::{
    Annotation, AnnotationStorage, AnnotationSubtype, DocumentInfo, DocumentInitParameters,
    DocumentMetadata, FieldObject, FieldObjects, PageProxy, PageSize, RenderedPage,
};
use super::{PdfDocumentHandle, PdfEngine};
use crate::config::WorkerSource;
use crate::error::{Error, Result};
use crate::forms::{FieldType, FieldValue};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// A call received by [`MemoryEngine`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    InstallWorker(WorkerSource),
    GetDocument(DocumentInitParameters),
}

/// One page of a [`MemoryDocument`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryPage {
    pub label: Option<String>,
    pub size: PageSize,
    pub annotations: Vec<Annotation>,
}

/// Document served by [`MemoryEngine`]
#[derive(Debug)]
pub struct MemoryDocument {
    metadata: Option<DocumentMetadata>,
    fields: Option<FieldObjects>,
    pages: Vec<MemoryPage>,
    password: Option<String>,
    data: Option<Vec<u8>>,
    storage: AnnotationStorage,
    renders: Mutex<Vec<(u32, bool)>>,
}

impl MemoryDocument {
    /// Document with `num_pages` blank US Letter pages and no metadata
    pub fn new(num_pages: u32) -> Self {
        Self {
            metadata: None,
            fields: None,
            pages: (0..num_pages).map(|_| MemoryPage::default()).collect(),
            password: None,
            data: None,
            storage: AnnotationStorage::new(),
            renders: Mutex::new(Vec::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Metadata with an info dictionary carrying the AcroForm flag
    pub fn with_acro_form(self, present: bool) -> Self {
        self.with_metadata(DocumentMetadata {
            info: Some(DocumentInfo {
                is_acro_form_present: Some(present),
                ..DocumentInfo::default()
            }),
        })
    }

    /// Add a field widget to the field-object map and as a widget annotation on its page.
    ///
    /// Pages are 1-indexed; a field on page 0 is moved to page 1.
    pub fn with_field(mut self, mut field: FieldObject) -> Self {
        field.page = field.page.max(1);
        let annotation = Annotation {
            id: field.id.clone(),
            subtype: AnnotationSubtype::Widget,
            field_name: Some(field.name.clone()),
            field_type: field.field_type,
            field_value: field.value.clone(),
            required: field.required,
            push_button: field.field_type == Some(FieldType::PushButton),
        };
        self.page_mut(field.page).annotations.push(annotation);
        self.fields
            .get_or_insert_with(BTreeMap::new)
            .entry(field.name.clone())
            .or_default()
            .push(field);
        self
    }

    /// Add an annotation that is not part of the field-object map
    pub fn with_annotation(mut self, page_number: u32, annotation: Annotation) -> Self {
        self.page_mut(page_number).annotations.push(annotation);
        self
    }

    pub fn with_page_label(mut self, page_number: u32, label: impl Into<String>) -> Self {
        self.page_mut(page_number).label = Some(label.into());
        self
    }

    pub fn with_page_size(mut self, page_number: u32, size: PageSize) -> Self {
        self.page_mut(page_number).size = size;
        self
    }

    /// Require `password` to open the document
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Bytes the engine received when opening this document
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Pages rendered so far, each with whether form widgets were drawn
    pub fn renders(&self) -> Vec<(u32, bool)> {
        self.renders.lock().clone()
    }

    /// Page 0 is treated as page 1
    fn page_mut(&mut self, page_number: u32) -> &mut MemoryPage {
        let index = page_number.max(1) as usize - 1;
        if self.pages.len() <= index {
            self.pages.resize_with(index + 1, MemoryPage::default);
        }
        &mut self.pages[index]
    }

    fn check_page(&self, page_number: u32) -> Result<&MemoryPage> {
        let total = self.num_pages();
        if page_number < 1 || page_number > total {
            return Err(Error::PageOutOfBounds {
                page: page_number,
                total,
            });
        }
        Ok(&self.pages[page_number as usize - 1])
    }
}

impl Clone for MemoryDocument {
    fn clone(&self) -> Self {
        let storage = AnnotationStorage::new();
        for (id, value) in self.storage.get_all().unwrap_or_default() {
            storage.set_value(id, value);
        }
        Self {
            metadata: self.metadata.clone(),
            fields: self.fields.clone(),
            pages: self.pages.clone(),
            password: self.password.clone(),
            data: self.data.clone(),
            storage,
            renders: Mutex::new(Vec::new()),
        }
    }
}

impl PdfDocumentHandle for MemoryDocument {
    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn field_objects(&self) -> Result<Option<FieldObjects>> {
        Ok(self.fields.clone())
    }

    async fn metadata(&self) -> Result<Option<DocumentMetadata>> {
        Ok(self.metadata.clone())
    }

    async fn page(&self, page_number: u32) -> Result<PageProxy> {
        let page = self.check_page(page_number)?;
        Ok(PageProxy {
            page_number,
            label: page.label.clone(),
            size: page.size,
            annotations: page.annotations.clone(),
        })
    }

    fn annotation_storage(&self) -> &AnnotationStorage {
        &self.storage
    }

    /// Serialises the form values (stored values overlaid with edits) as JSON.
    async fn save_document(&self) -> Result<Vec<u8>> {
        let mut values: BTreeMap<String, FieldValue> = BTreeMap::new();
        for page in &self.pages {
            for annotation in &page.annotations {
                if annotation.field_name.is_some() {
                    values.insert(annotation.id.clone(), annotation.field_value.clone());
                }
            }
        }
        for (id, value) in self.storage.get_all().unwrap_or_default() {
            values.insert(id, value);
        }
        Ok(serde_json::to_vec(&values)?)
    }

    async fn render_page(
        &self,
        page_number: u32,
        scale: f32,
        forms: bool,
    ) -> Result<RenderedPage> {
        let page = self.check_page(page_number)?;
        self.renders.lock().push((page_number, forms));
        let width = ((page.size.width * scale).round() as u32).max(1);
        let height = ((page.size.height * scale).round() as u32).max(1);

        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([255, 255, 255, 255]),
        ));
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| Error::Render {
                page: page_number,
                reason: e.to_string(),
            })?;

        Ok(RenderedPage {
            page: page_number,
            scale,
            width,
            height,
            png,
        })
    }
}

#[derive(Default)]
struct MemoryEngineState {
    by_url: HashMap<String, MemoryDocument>,
    by_data: Vec<(Vec<u8>, MemoryDocument)>,
    calls: Vec<EngineCall>,
}

/// Engine serving [`MemoryDocument`]s
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<MemoryEngineState>,
    install_delay: Option<Duration>,
    install_gate: Option<Arc<Notify>>,
    fail_install: bool,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay worker installation by `delay`
    pub fn with_install_delay(mut self, delay: Duration) -> Self {
        self.install_delay = Some(delay);
        self
    }

    /// Hold worker installation until the returned handle is notified
    pub fn with_install_gate(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.install_gate = Some(gate.clone());
        (self, gate)
    }

    /// Make worker installation fail
    pub fn with_failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    pub fn register_url(&self, url: impl Into<String>, document: MemoryDocument) {
        self.state.lock().by_url.insert(url.into(), document);
    }

    pub fn register_data(&self, data: impl Into<Vec<u8>>, document: MemoryDocument) {
        self.state.lock().by_data.push((data.into(), document));
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn install_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::InstallWorker(_)))
            .count()
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().calls.push(call);
    }

    fn lookup(&self, params: &DocumentInitParameters) -> Result<MemoryDocument> {
        let state = self.state.lock();

        if let Some(url) = &params.url {
            return state
                .by_url
                .get(url)
                .cloned()
                .ok_or_else(|| Error::DocumentNotFound {
                    location: url.clone(),
                });
        }

        let data = params.data.as_deref().unwrap_or_default();
        if let Some((_, document)) = state.by_data.iter().find(|(d, _)| d.as_slice() == data) {
            return Ok(document.clone());
        }

        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::InvalidPdf {
                reason: "Not a valid PDF file".to_string(),
            });
        }
        Ok(MemoryDocument::new(1))
    }
}

impl PdfEngine for MemoryEngine {
    type Document = MemoryDocument;

    async fn install_worker(&self, worker: &WorkerSource) -> Result<()> {
        if let Some(delay) = self.install_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.install_gate {
            gate.notified().await;
        }

        self.record(EngineCall::InstallWorker(worker.clone()));

        if self.fail_install {
            return Err(Error::WorkerInstall {
                location: worker.location.clone(),
                reason: "worker failed to start".to_string(),
            });
        }
        Ok(())
    }

    async fn get_document(&self, params: DocumentInitParameters) -> Result<MemoryDocument> {
        self.record(EngineCall::GetDocument(params.clone()));

        let mut document = self.lookup(&params)?;
        if let Some(required) = &document.password {
            if params.options.password.as_ref() != Some(required) {
                return Err(Error::PasswordRequired);
            }
        }
        document.data = params.data;
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::BuildVariant;
    use crate::engine::DocumentOptions;

    fn params_for_url(url: &str) -> DocumentInitParameters {
        DocumentInitParameters {
            cmap_url: "./cmaps/".to_string(),
            icc_url: "./iccs/".to_string(),
            wasm_url: "./wasm/".to_string(),
            cmap_packed: true,
            url: Some(url.to_string()),
            data: None,
            options: DocumentOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_unknown_url_is_not_found() {
        let engine = MemoryEngine::new();
        let result = engine.get_document(params_for_url("missing.pdf")).await;
        assert!(matches!(result, Err(Error::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_password_protected_document() {
        let engine = MemoryEngine::new();
        engine.register_url("secret.pdf", MemoryDocument::new(1).with_password("pw"));

        let result = engine.get_document(params_for_url("secret.pdf")).await;
        assert!(matches!(result, Err(Error::PasswordRequired)));

        let mut params = params_for_url("secret.pdf");
        params.options.password = Some("pw".to_string());
        assert!(engine.get_document(params).await.is_ok());
    }

    #[tokio::test]
    async fn test_install_failure_is_recorded() {
        let engine = MemoryEngine::new().with_failing_install();
        let worker = WorkerSource {
            variant: BuildVariant::Standard,
            location: "./build/pdf.worker.min.mjs".to_string(),
        };
        let result = engine.install_worker(&worker).await;
        assert!(matches!(result, Err(Error::WorkerInstall { .. })));
        assert_eq!(engine.install_count(), 1);
    }

    #[tokio::test]
    async fn test_with_field_adds_widget_annotation() {
        let document = MemoryDocument::new(1).with_field(FieldObject {
            id: "10R".to_string(),
            name: "submit".to_string(),
            field_type: Some(FieldType::PushButton),
            value: FieldValue::Null,
            page: 2,
            required: false,
            read_only: false,
        });

        assert_eq!(document.num_pages(), 2);
        let page = document.page(2).await.unwrap();
        assert_eq!(page.annotations.len(), 1);
        assert!(page.annotations[0].push_button);
        assert!(document.page(3).await.is_err());
    }

    #[tokio::test]
    async fn test_render_page_scales_page_size() {
        let document = MemoryDocument::new(1).with_page_size(
            1,
            PageSize {
                width: 100.0,
                height: 200.0,
            },
        );
        let rendered = document.render_page(1, 0.5, true).await.unwrap();
        assert_eq!((rendered.width, rendered.height), (50, 100));
        assert_eq!(&rendered.png[1..4], b"PNG");
        assert_eq!(document.renders(), vec![(1, true)]);
    }

    #[tokio::test]
    async fn test_field_on_page_zero_lands_on_first_page() {
        let document = MemoryDocument::new(1).with_field(FieldObject {
            id: "1R".to_string(),
            name: "name".to_string(),
            field_type: Some(FieldType::Text),
            value: FieldValue::Null,
            page: 0,
            required: true,
            read_only: false,
        });

        assert_eq!(document.num_pages(), 1);
        let fields = document.field_objects().await.unwrap().unwrap();
        assert_eq!(fields["name"][0].page, 1);
        assert_eq!(document.page(1).await.unwrap().annotations[0].id, "1R");
    }
}
