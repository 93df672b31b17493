//! Form field values and fill-completeness checks

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Value of a form field as held by the engine or edited in the viewer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Choice(Vec<String>),
}

impl FieldValue {
    /// Whether the value counts as filled in: anything except null, `false` and the empty string
    pub fn is_filled(&self) -> bool {
        !matches!(self, FieldValue::Null | FieldValue::Bool(false))
            && !matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Form field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Checkbox,
    RadioButton,
    ComboBox,
    ListBox,
    PushButton,
    Signature,
    Unknown,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Text => "text",
            FieldType::Checkbox => "checkbox",
            FieldType::RadioButton => "radio_button",
            FieldType::ComboBox => "combo_box",
            FieldType::ListBox => "list_box",
            FieldType::PushButton => "push_button",
            FieldType::Signature => "signature",
            FieldType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A form field that must be filled before the document can be submitted.
///
/// Several descriptors may share a `field_name`; they then form one
/// mutually exclusive group (radio buttons) that is satisfied by any member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredField {
    pub field_name: String,
    pub field_value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
}

impl RequiredField {
    pub fn new(field_name: impl Into<String>, field_value: impl Into<FieldValue>) -> Self {
        Self {
            field_name: field_name.into(),
            field_value: field_value.into(),
            field_id: None,
        }
    }

    pub fn with_id(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }
}

/// True when every distinct field name has at least one filled member.
pub fn all_required_fields_filled(required_fields: &[RequiredField]) -> bool {
    let mut groups: HashMap<&str, bool> = HashMap::new();

    for field in required_fields {
        let filled = groups.entry(field.field_name.as_str()).or_insert(false);
        *filled |= field.field_value.is_filled();
    }

    groups.values().all(|&filled| filled)
}
