//! PDFium engine via `pdfium-render`
//!
//! PDFium is not thread-safe, so every operation binds a fresh instance on a
//! blocking thread and extracts owned data up front. "Installing the worker"
//! means locating a loadable PDFium library for the selected build.

use super::model::{
    Annotation, AnnotationStorage, AnnotationSubtype, DocumentInfo, DocumentInitParameters,
    DocumentMetadata, FieldObject, FieldObjects, PageProxy, PageSize, RenderedPage,
};
use super::source::{resolve_data, resolve_location};
use super::{PdfDocumentHandle, PdfEngine};
use crate::capabilities::BuildVariant;
use crate::config::WorkerSource;
use crate::error::{Error, Result};
use crate::forms::{FieldType, FieldValue};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the PDFium library was found
#[derive(Debug, Clone, PartialEq, Eq)]
enum LibraryBinding {
    Directory(PathBuf),
    System,
}

impl LibraryBinding {
    fn bind(&self) -> Result<Pdfium> {
        let bindings = match self {
            LibraryBinding::Directory(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            LibraryBinding::System => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

        Ok(Pdfium::new(bindings))
    }
}

/// Map PDFium errors to our error type
fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

fn join_error(err: tokio::task::JoinError) -> Error {
    Error::Pdfium {
        reason: format!("PDFium task failed: {}", err),
    }
}

/// Directory of a worker location, when the location is on the local filesystem
fn local_worker_dir(location: &str) -> Option<PathBuf> {
    let path = match url::Url::parse(location) {
        Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().ok()?,
        Ok(_) => return None,
        Err(_) => PathBuf::from(location),
    };
    path.parent().map(Path::to_path_buf)
}

/// Engine backed by PDFium
pub struct PdfiumEngine {
    search_dirs: Vec<PathBuf>,
    max_download_bytes: u64,
    binding: Mutex<Option<LibraryBinding>>,
}

impl PdfiumEngine {
    pub fn new(max_download_bytes: u64) -> Self {
        Self {
            search_dirs: vec![PathBuf::from("./"), PathBuf::from("/opt/pdfium/lib")],
            max_download_bytes,
            binding: Mutex::new(None),
        }
    }

    /// Search `dir` for the PDFium library before the default locations
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.insert(0, dir.into());
        self
    }

    fn candidates(&self, worker: &WorkerSource) -> Vec<LibraryBinding> {
        match worker.variant {
            BuildVariant::Legacy => vec![LibraryBinding::System],
            BuildVariant::Standard => local_worker_dir(&worker.location)
                .into_iter()
                .chain(self.search_dirs.iter().cloned())
                .map(LibraryBinding::Directory)
                .chain(std::iter::once(LibraryBinding::System))
                .collect(),
        }
    }

    fn installed_binding(&self) -> Result<LibraryBinding> {
        self.binding.lock().clone().ok_or_else(|| Error::Pdfium {
            reason: "PDFium worker is not installed".to_string(),
        })
    }
}

impl PdfEngine for PdfiumEngine {
    type Document = PdfiumDocument;

    async fn install_worker(&self, worker: &WorkerSource) -> Result<()> {
        let candidates = self.candidates(worker);

        let found = tokio::task::spawn_blocking(move || {
            let mut last_error = None;
            for candidate in candidates {
                match candidate.bind() {
                    Ok(_) => return Ok(candidate),
                    Err(e) => {
                        tracing::debug!(?candidate, error = %e, "PDFium library not usable");
                        last_error = Some(e);
                    }
                }
            }
            Err(last_error.unwrap_or_else(|| Error::Pdfium {
                reason: "no PDFium library candidates".to_string(),
            }))
        })
        .await
        .map_err(join_error)?
        .map_err(|e| Error::WorkerInstall {
            location: worker.location.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(variant = %worker.variant, binding = ?found, "PDFium worker installed");
        *self.binding.lock() = Some(found);
        Ok(())
    }

    async fn get_document(&self, params: DocumentInitParameters) -> Result<PdfiumDocument> {
        let binding = self.installed_binding()?;

        // PDFium ships its own CMaps and colour management
        tracing::debug!(
            cmap_url = %params.cmap_url,
            icc_url = %params.icc_url,
            wasm_url = %params.wasm_url,
            "asset URLs not used by PDFium"
        );

        let resolved = match (params.data, params.url) {
            (Some(data), _) => resolve_data(data)?,
            (None, Some(url)) => resolve_location(&url, self.max_download_bytes).await?,
            (None, None) => {
                return Err(Error::SourceResolution {
                    reason: "Either data or url must be provided".to_string(),
                })
            }
        };
        tracing::info!(source = %resolved.source_name, bytes = resolved.data.len(), "loading document");

        let data = Arc::new(resolved.data);
        let password = params.options.password;
        let enable_xfa = params.options.enable_xfa;
        let extracted = {
            let binding = binding.clone();
            let data = data.clone();
            let password = password.clone();
            tokio::task::spawn_blocking(move || {
                let pdfium = binding.bind()?;
                let document = pdfium
                    .load_pdf_from_byte_slice(&data, password.as_deref())
                    .map_err(map_pdfium_error)?;
                Ok::<_, Error>(Extracted::from_document(&document, enable_xfa))
            })
            .await
            .map_err(join_error)??
        };

        Ok(PdfiumDocument {
            binding,
            data,
            password,
            metadata: extracted.metadata,
            fields: extracted.fields,
            pages: extracted.pages,
            storage: AnnotationStorage::new(),
        })
    }
}

/// Owned snapshot of everything the helper asks about a document
struct Extracted {
    metadata: DocumentMetadata,
    fields: Option<FieldObjects>,
    pages: Vec<PageProxy>,
}

impl Extracted {
    fn from_document(document: &PdfDocument, enable_xfa: bool) -> Self {
        let meta = document.metadata();
        let tag = |t: PdfDocumentMetadataTagType| meta.get(t).map(|tag| tag.value().to_string());
        let is_acro_form_present =
            acro_form_present(document.form().map(|form| form.form_type()), enable_xfa);

        let info = DocumentInfo {
            is_acro_form_present: Some(is_acro_form_present),
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            creation_date: tag(PdfDocumentMetadataTagType::CreationDate),
            modification_date: tag(PdfDocumentMetadataTagType::ModificationDate),
        };

        let mut fields: FieldObjects = BTreeMap::new();
        let mut pages = Vec::new();

        for (index, page) in document.pages().iter().enumerate() {
            let page_number = index as u32 + 1;
            let mut annotations = Vec::new();

            for (ann_index, annotation) in page.annotations().iter().enumerate() {
                let id = annotation_id(annotation.name(), page_number, ann_index);
                let subtype = match annotation.annotation_type() {
                    PdfPageAnnotationType::Widget => AnnotationSubtype::Widget,
                    PdfPageAnnotationType::Link => AnnotationSubtype::Link,
                    PdfPageAnnotationType::Text => AnnotationSubtype::Text,
                    PdfPageAnnotationType::FreeText => AnnotationSubtype::FreeText,
                    PdfPageAnnotationType::Popup => AnnotationSubtype::Popup,
                    _ => AnnotationSubtype::Other,
                };

                let Some(field) = annotation.as_form_field() else {
                    annotations.push(Annotation {
                        id,
                        subtype,
                        field_name: None,
                        field_type: None,
                        field_value: FieldValue::Null,
                        required: false,
                        push_button: false,
                    });
                    continue;
                };

                let (field_type, value) = field_type_and_value(field);
                let name = field.name().unwrap_or_else(|| id.clone());
                let flags = FieldFlags {
                    required: field.is_required(),
                    read_only: field.is_read_only(),
                };

                let (object, widget) =
                    widget_entries(id, name, field_type, value, page_number, flags);
                fields.entry(object.name.clone()).or_default().push(object);
                annotations.push(widget);
            }

            pages.push(PageProxy {
                page_number,
                label: None,
                size: PageSize {
                    width: page.width().value,
                    height: page.height().value,
                },
                annotations,
            });
        }

        Self {
            metadata: DocumentMetadata { info: Some(info) },
            fields: if fields.is_empty() { None } else { Some(fields) },
            pages,
        }
    }
}

/// Whether the document's form counts as an AcroForm. Pure XFA forms only
/// count when XFA is enabled; hybrid forms carry an AcroForm fallback.
fn acro_form_present(form_type: Option<PdfFormType>, enable_xfa: bool) -> bool {
    match form_type {
        None | Some(PdfFormType::None) => false,
        Some(PdfFormType::XfaFull) => enable_xfa,
        Some(_) => true,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldFlags {
    required: bool,
    read_only: bool,
}

/// The field-object entry and the widget annotation for one form field
fn widget_entries(
    id: String,
    name: String,
    field_type: FieldType,
    value: FieldValue,
    page_number: u32,
    flags: FieldFlags,
) -> (FieldObject, Annotation) {
    let widget = Annotation {
        id: id.clone(),
        subtype: AnnotationSubtype::Widget,
        field_name: Some(name.clone()),
        field_type: Some(field_type),
        field_value: value.clone(),
        required: flags.required,
        push_button: field_type == FieldType::PushButton,
    };
    let object = FieldObject {
        id,
        name,
        field_type: Some(field_type),
        value,
        page: page_number,
        required: flags.required,
        read_only: flags.read_only,
    };
    (object, widget)
}

fn annotation_id(name: Option<String>, page_number: u32, index: usize) -> String {
    name.filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("p{}a{}", page_number, index))
}

fn field_type_and_value(field: &PdfFormField) -> (FieldType, FieldValue) {
    if let Some(text_field) = field.as_text_field() {
        (FieldType::Text, text_field.value().into())
    } else if let Some(checkbox) = field.as_checkbox_field() {
        (
            FieldType::Checkbox,
            checkbox.is_checked().map(FieldValue::Bool).unwrap_or_default(),
        )
    } else if let Some(radio) = field.as_radio_button_field() {
        (
            FieldType::RadioButton,
            radio.is_checked().map(FieldValue::Bool).unwrap_or_default(),
        )
    } else if let Some(combo) = field.as_combo_box_field() {
        let options = combo.options();
        let selected = (0..options.len())
            .filter_map(|i| options.get(i).ok())
            .filter(|opt| opt.is_set())
            .filter_map(|opt| opt.label().cloned())
            .collect();
        (FieldType::ComboBox, FieldValue::Choice(selected))
    } else if let Some(list) = field.as_list_box_field() {
        let options = list.options();
        let selected = (0..options.len())
            .filter_map(|i| options.get(i).ok())
            .filter(|opt| opt.is_set())
            .filter_map(|opt| opt.label().cloned())
            .collect();
        (FieldType::ListBox, FieldValue::Choice(selected))
    } else if field.as_push_button_field().is_some() {
        (FieldType::PushButton, FieldValue::Null)
    } else if field.as_signature_field().is_some() {
        (FieldType::Signature, FieldValue::Null)
    } else {
        (FieldType::Unknown, FieldValue::Null)
    }
}

/// Write edited values back into the form fields of an open document
fn apply_storage(document: &PdfDocument, values: &HashMap<String, FieldValue>) -> Result<()> {
    for (index, page) in document.pages().iter().enumerate() {
        let page_number = index as u32 + 1;

        for (ann_index, mut annotation) in page.annotations().iter().enumerate() {
            let id = annotation_id(annotation.name(), page_number, ann_index);
            let Some(value) = values.get(&id) else {
                continue;
            };
            let Some(field) = annotation.as_form_field_mut() else {
                continue;
            };

            let applied = if let Some(text_field) = field.as_text_field_mut() {
                match value {
                    FieldValue::Text(text) => Some(text_field.set_value(text)),
                    _ => None,
                }
            } else if let Some(checkbox) = field.as_checkbox_field_mut() {
                match value {
                    FieldValue::Bool(checked) => Some(checkbox.set_checked(*checked)),
                    _ => None,
                }
            } else if let Some(radio) = field.as_radio_button_field_mut() {
                match value {
                    FieldValue::Bool(true) => Some(radio.set_checked()),
                    _ => None,
                }
            } else {
                None
            };

            match applied {
                Some(result) => result.map_err(map_pdfium_error)?,
                None => tracing::debug!(id = %id, ?value, "edited value not applicable to field"),
            }
        }
    }
    Ok(())
}

/// Document opened by [`PdfiumEngine`]
pub struct PdfiumDocument {
    binding: LibraryBinding,
    data: Arc<Vec<u8>>,
    password: Option<String>,
    metadata: DocumentMetadata,
    fields: Option<FieldObjects>,
    pages: Vec<PageProxy>,
    storage: AnnotationStorage,
}

impl PdfiumDocument {
    fn check_page(&self, page_number: u32) -> Result<&PageProxy> {
        let total = self.num_pages();
        if page_number < 1 || page_number > total {
            return Err(Error::PageOutOfBounds {
                page: page_number,
                total,
            });
        }
        Ok(&self.pages[page_number as usize - 1])
    }

    /// Run `f` against a freshly opened copy of this document on a blocking thread
    async fn with_document<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&PdfDocument<'a>) -> Result<T> + Send + 'static,
    {
        let binding = self.binding.clone();
        let data = self.data.clone();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            let pdfium = binding.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(&data, password.as_deref())
                .map_err(map_pdfium_error)?;
            f(&document)
        })
        .await
        .map_err(join_error)?
    }
}

impl PdfDocumentHandle for PdfiumDocument {
    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn field_objects(&self) -> Result<Option<FieldObjects>> {
        Ok(self.fields.clone())
    }

    async fn metadata(&self) -> Result<Option<DocumentMetadata>> {
        Ok(Some(self.metadata.clone()))
    }

    async fn page(&self, page_number: u32) -> Result<PageProxy> {
        self.check_page(page_number).cloned()
    }

    fn annotation_storage(&self) -> &AnnotationStorage {
        &self.storage
    }

    async fn save_document(&self) -> Result<Vec<u8>> {
        let values = self.storage.get_all().unwrap_or_default();
        self.with_document(move |document| {
            apply_storage(document, &values)?;
            document.save_to_bytes().map_err(|e| Error::Pdfium {
                reason: format!("Failed to save PDF: {}", e),
            })
        })
        .await
    }

    async fn render_page(
        &self,
        page_number: u32,
        scale: f32,
        forms: bool,
    ) -> Result<RenderedPage> {
        self.check_page(page_number)?;
        let values = if forms {
            self.storage.get_all().unwrap_or_default()
        } else {
            HashMap::new()
        };

        self.with_document(move |document| {
            apply_storage(document, &values)?;

            let render_error = |reason: String| Error::Render {
                page: page_number,
                reason,
            };
            let page = document
                .pages()
                .get((page_number - 1) as u16)
                .map_err(|e| render_error(e.to_string()))?;

            let config = PdfRenderConfig::new()
                .scale_page_by_factor(scale)
                .render_form_data(forms)
                .render_annotations(true);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| render_error(e.to_string()))?;

            let image = bitmap.as_image();
            let mut png = Vec::new();
            image
                .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| render_error(e.to_string()))?;

            Ok(RenderedPage {
                page: page_number,
                scale,
                width: image.width(),
                height: image.height(),
                png,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DocumentOptions;

    #[test]
    fn test_legacy_build_binds_system_library_only() {
        let engine = PdfiumEngine::new(1024);
        let worker = WorkerSource {
            variant: BuildVariant::Legacy,
            location: "./legacy/build/pdf.worker.min.mjs".to_string(),
        };
        assert_eq!(engine.candidates(&worker), vec![LibraryBinding::System]);
    }

    #[test]
    fn test_standard_build_searches_worker_dir_first() {
        let engine = PdfiumEngine::new(1024).with_library_dir("/usr/local/lib/pdfium");
        let worker = WorkerSource {
            variant: BuildVariant::Standard,
            location: "/srv/pdfjs/build/pdf.worker.min.mjs".to_string(),
        };
        let candidates = engine.candidates(&worker);
        assert_eq!(
            candidates[0],
            LibraryBinding::Directory(PathBuf::from("/srv/pdfjs/build"))
        );
        assert_eq!(
            candidates[1],
            LibraryBinding::Directory(PathBuf::from("/usr/local/lib/pdfium"))
        );
        assert_eq!(candidates.last(), Some(&LibraryBinding::System));
    }

    #[test]
    fn test_remote_worker_has_no_local_dir() {
        assert_eq!(
            local_worker_dir("https://cdn.example.com/build/pdf.worker.min.mjs"),
            None
        );
    }

    #[test]
    fn test_annotation_id_fallback() {
        assert_eq!(annotation_id(Some("field-1".to_string()), 1, 0), "field-1");
        assert_eq!(annotation_id(Some(String::new()), 2, 3), "p2a3");
        assert_eq!(annotation_id(None, 1, 0), "p1a0");
    }

    #[test]
    fn test_acro_form_presence_by_form_type() {
        assert!(!acro_form_present(None, true));
        assert!(!acro_form_present(Some(PdfFormType::None), true));
        assert!(acro_form_present(Some(PdfFormType::Acrobat), false));
        assert!(acro_form_present(Some(PdfFormType::XfaForeground), false));
        assert!(!acro_form_present(Some(PdfFormType::XfaFull), false));
        assert!(acro_form_present(Some(PdfFormType::XfaFull), true));
    }

    #[test]
    fn test_widget_entries_carry_field_flags() {
        let flags = FieldFlags {
            required: true,
            read_only: true,
        };
        let (object, widget) = widget_entries(
            "7R".to_string(),
            "email".to_string(),
            FieldType::Text,
            FieldValue::Null,
            2,
            flags,
        );

        assert!(object.required);
        assert!(object.read_only);
        assert_eq!(object.page, 2);
        assert!(widget.required);
        assert_eq!(widget.subtype, AnnotationSubtype::Widget);
        assert!(!widget.push_button);
        assert_eq!(
            widget.to_required_field(None).map(|f| f.field_name),
            Some("email".to_string())
        );
    }

    #[test]
    fn test_widget_entries_mark_push_buttons() {
        let (object, widget) = widget_entries(
            "8R".to_string(),
            "submit".to_string(),
            FieldType::PushButton,
            FieldValue::Null,
            1,
            FieldFlags::default(),
        );
        assert!(!object.required);
        assert!(widget.push_button);
    }

    /// The flags come straight from pdfium-render's field API
    #[test]
    fn test_field_flags_read_from_pdfium_field() {
        fn flags(field: &PdfFormField) -> FieldFlags {
            FieldFlags {
                required: field.is_required(),
                read_only: field.is_read_only(),
            }
        }
        let _: fn(&PdfFormField) -> FieldFlags = flags;
    }

    #[tokio::test]
    async fn test_get_document_requires_installed_worker() {
        let engine = PdfiumEngine::new(1024);
        let params = DocumentInitParameters {
            cmap_url: "./cmaps/".to_string(),
            icc_url: "./iccs/".to_string(),
            wasm_url: "./wasm/".to_string(),
            cmap_packed: true,
            url: None,
            data: Some(b"%PDF-1.7".to_vec()),
            options: DocumentOptions::default(),
        };
        let result = engine.get_document(params).await;
        assert!(matches!(result, Err(Error::Pdfium { .. })));
    }
}
