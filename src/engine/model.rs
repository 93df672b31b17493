//! Engine-neutral document model
//!
//! Engines translate whatever their parser exposes into these owned types so
//! the helper can answer form questions without knowing the engine.

use crate::forms::{FieldType, FieldValue, RequiredField};
use base64::Engine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One widget of a form field, as returned by the engine's field-object map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldObject {
    /// Annotation id of the widget
    pub id: String,
    pub name: String,
    /// `None` when the engine reports no type for the field
    pub field_type: Option<FieldType>,
    pub value: FieldValue,
    /// Page number (1-indexed)
    pub page: u32,
    pub required: bool,
    pub read_only: bool,
}

/// Field name → widgets sharing that name
pub type FieldObjects = BTreeMap<String, Vec<FieldObject>>;

/// Document information dictionary plus engine-derived flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Set by the engine when the catalog carries an AcroForm
    pub is_acro_form_present: Option<bool>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Metadata returned by the engine; `info` may be absent for damaged documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub info: Option<DocumentInfo>,
}

/// Annotation subtype, reduced to what the helper distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationSubtype {
    Widget,
    Link,
    Text,
    FreeText,
    Popup,
    Other,
}

/// A page annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub subtype: AnnotationSubtype,
    /// Fully qualified field name, for widgets
    pub field_name: Option<String>,
    pub field_type: Option<FieldType>,
    pub field_value: FieldValue,
    pub required: bool,
    pub push_button: bool,
}

impl Annotation {
    /// Describe this annotation as a required-field entry, if it belongs to a form field.
    ///
    /// `current` overrides the stored value with an edit from the annotation storage.
    pub fn to_required_field(&self, current: Option<&FieldValue>) -> Option<RequiredField> {
        let name = self.field_name.as_ref()?;
        let value = current.cloned().unwrap_or_else(|| self.field_value.clone());
        Some(RequiredField::new(name.clone(), value).with_id(self.id.clone()))
    }
}

/// Page size in PDF points (1 point = 1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn is_portrait(&self) -> bool {
        self.height >= self.width
    }
}

impl Default for PageSize {
    /// US Letter
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
        }
    }
}

/// A page as returned by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct PageProxy {
    /// Page number (1-indexed)
    pub page_number: u32,
    pub label: Option<String>,
    pub size: PageSize,
    pub annotations: Vec<Annotation>,
}

/// A rasterised page
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Page number (1-indexed)
    pub page: u32,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    /// PNG encoded image
    pub png: Vec<u8>,
}

impl RenderedPage {
    /// `data:` URL suitable for an `<img>` element
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

/// In-memory store of form values edited in the viewer, keyed by annotation id
#[derive(Debug, Default)]
pub struct AnnotationStorage {
    values: Mutex<HashMap<String, FieldValue>>,
}

impl AnnotationStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&self, id: impl Into<String>, value: FieldValue) {
        self.values.lock().insert(id.into(), value);
    }

    pub fn get_value(&self, id: &str) -> Option<FieldValue> {
        self.values.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<FieldValue> {
        self.values.lock().remove(id)
    }

    /// Snapshot of all stored values, or `None` when nothing was edited
    pub fn get_all(&self) -> Option<HashMap<String, FieldValue>> {
        let values = self.values.lock();
        if values.is_empty() {
            None
        } else {
            Some(values.clone())
        }
    }

    pub fn size(&self) -> usize {
        self.values.lock().len()
    }

    pub fn reset(&self) {
        self.values.lock().clear();
    }
}

/// Caller-controlled document options.
///
/// Asset URLs and the document source are owned by the helper and are not
/// part of this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    pub password: Option<String>,
    /// Treat XFA forms as forms. When false, a document whose only form is
    /// XFA reports no AcroForm.
    pub enable_xfa: bool,
}

/// Everything an engine needs to open a document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInitParameters {
    pub cmap_url: String,
    pub icc_url: String,
    pub wasm_url: String,
    pub cmap_packed: bool,
    pub url: Option<String>,
    pub data: Option<Vec<u8>>,
    pub options: DocumentOptions,
}
