//! UI schema: per-field presentation hints that run parallel to the schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Widget names that turn an enum-item array into a multi-select.
const MULTI_SELECT_WIDGETS: &[&str] = &["checkboxes", "multiselect"];

/// Presentation hints for one field and, by property name, its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiSchema {
    #[serde(rename = "ui:widget", default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<String>,
    /// Name of a registered custom field.
    #[serde(rename = "ui:field", default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(rename = "ui:options", default)]
    pub options: UiOptions,
    #[serde(rename = "ui:title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "ui:description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "ui:help", default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(rename = "ui:disabled", default)]
    pub disabled: bool,
    #[serde(rename = "ui:readonly", default)]
    pub readonly: bool,
    #[serde(rename = "ui:autofocus", default)]
    pub autofocus: bool,
    #[serde(rename = "classNames", default, skip_serializing_if = "Option::is_none")]
    pub class_names: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<UiItems>,
    #[serde(rename = "additionalItems", default, skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<Box<UiSchema>>,
    /// Property UI schemas and any other keys, parsed on demand.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// `items` of an array UI schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UiItems {
    Tuple(Vec<UiSchema>),
    Single(Box<UiSchema>),
}

/// `ui:options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<bool>,
    /// Options handed to widgets untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UiOptions {
    pub fn addable(&self) -> bool {
        self.addable.unwrap_or(true)
    }

    pub fn orderable(&self) -> bool {
        self.orderable.unwrap_or(true)
    }

    pub fn removable(&self) -> bool {
        self.removable.unwrap_or(true)
    }

    pub fn label(&self) -> bool {
        self.label.unwrap_or(true)
    }
}

impl UiSchema {
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    /// UI schema of property `name`; malformed entries are ignored.
    pub fn property(&self, name: &str) -> UiSchema {
        match self.rest.get(name) {
            Some(value) => UiSchema::from_value(value).unwrap_or_else(|err| {
                warn!("ignoring malformed ui schema for `{name}`: {err}");
                UiSchema::default()
            }),
            None => UiSchema::default(),
        }
    }

    /// UI schema for element `index` of an array.
    ///
    /// With `fixed_len` set, positions at or past it use `additionalItems`.
    pub fn item(&self, index: usize, fixed_len: Option<usize>) -> UiSchema {
        if fixed_len.is_some_and(|n| index >= n) {
            return self.additional_items.as_deref().cloned().unwrap_or_default();
        }
        match &self.items {
            Some(UiItems::Tuple(items)) => items.get(index).cloned().unwrap_or_default(),
            Some(UiItems::Single(item)) => (**item).clone(),
            None => UiSchema::default(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.widget.as_deref() == Some("hidden")
    }

    pub fn wants_files(&self) -> bool {
        self.widget.as_deref() == Some("files")
    }

    pub fn wants_multi_select(&self) -> bool {
        self.widget
            .as_deref()
            .is_some_and(|w| MULTI_SELECT_WIDGETS.contains(&w))
    }
}
