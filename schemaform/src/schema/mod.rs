//! Schema node model.
//!
//! This module provides the typed representation of the JSON-Schema-like
//! documents the engine consumes:
//!
//! - [`SchemaNode`] - one logical field, with unknown keys preserved
//! - [`SchemaKind`] - the closed set of rendering kinds derived from `type`
//! - [`condition`] - declarative `condition` blocks evaluated against form data

/// Declarative conditions deciding whether a field is active.
pub mod condition;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

pub use condition::{Condition, ConditionClause, Conjunction};

/// Ordered mapping of property name to schema.
pub type Properties = IndexMap<String, SchemaNode>;

/// Table used to resolve `$ref` pointers.
pub type Definitions = IndexMap<String, SchemaNode>;

/// One logical field of a form schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    /// Internal reference, e.g. `#/definitions/Address`.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Placeholder for a remotely fetched fragment.
    #[serde(rename = "$remote", default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<AdditionalItems>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: Properties,
    /// Names of required properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(alias = "$defs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub definitions: Definitions,
    /// Sub-schemas merged into this node during resolution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    /// Enables drag-sorting of ordinary arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_button_text: Option<String>,
    /// Keys the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `type` keyword: one name or a union of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Union(Vec<String>),
}

impl SchemaType {
    /// The first non-`null` type name, or `null` for a pure null type.
    pub fn primary(&self) -> Option<&str> {
        match self {
            SchemaType::Single(name) => Some(name),
            SchemaType::Union(names) => names
                .iter()
                .map(String::as_str)
                .find(|name| *name != "null")
                .or_else(|| names.first().map(String::as_str)),
        }
    }

    pub fn allows_null(&self) -> bool {
        match self {
            SchemaType::Single(name) => name == "null",
            SchemaType::Union(names) => names.iter().any(|n| n == "null"),
        }
    }
}

/// `items`: one schema for every element, or one per tuple position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    Tuple(Vec<SchemaNode>),
    Single(Box<SchemaNode>),
}

/// `additionalItems`: a flag or the schema for trailing tuple slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalItems {
    Flag(bool),
    Schema(Box<SchemaNode>),
}

/// Rendering kinds the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Color,
    Textarea,
    Image,
    Unknown,
}

impl SchemaKind {
    fn from_name(name: &str) -> Self {
        match name {
            "object" => SchemaKind::Object,
            "array" => SchemaKind::Array,
            "string" => SchemaKind::String,
            "number" => SchemaKind::Number,
            "integer" => SchemaKind::Integer,
            "boolean" => SchemaKind::Boolean,
            "null" => SchemaKind::Null,
            "color" => SchemaKind::Color,
            "textarea" => SchemaKind::Textarea,
            "image" => SchemaKind::Image,
            _ => SchemaKind::Unknown,
        }
    }

    /// Objects and arrays render their children instead of a control.
    pub fn is_container(self) -> bool {
        matches!(self, SchemaKind::Object | SchemaKind::Array)
    }
}

/// A selectable option of an enum-like schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumOption {
    pub label: String,
    pub value: Value,
}

impl SchemaNode {
    /// Parse a schema from a JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The rendering kind, guessing from the shape when `type` is missing.
    pub fn kind(&self) -> SchemaKind {
        match self.schema_type.as_ref().and_then(SchemaType::primary) {
            Some(name) => SchemaKind::from_name(name),
            None if !self.properties.is_empty() => SchemaKind::Object,
            None if self.items.is_some() => SchemaKind::Array,
            None if self.enum_values.is_some() => SchemaKind::String,
            None => SchemaKind::Unknown,
        }
    }

    /// Declared type name for messages and CSS classes.
    pub fn type_name(&self) -> String {
        match self.schema_type.as_ref().and_then(SchemaType::primary) {
            Some(name) => name.to_string(),
            None => match self.kind() {
                SchemaKind::Unknown => "<none>".to_string(),
                kind => format!("{kind:?}").to_lowercase(),
            },
        }
    }

    /// A schema with no keys at all.
    pub fn is_empty(&self) -> bool {
        *self == SchemaNode::default()
    }

    pub fn is_enum_like(&self) -> bool {
        self.enum_values.is_some()
    }

    /// `items` is a non-empty list of per-position schemas.
    pub fn is_fixed_items(&self) -> bool {
        matches!(&self.items, Some(Items::Tuple(items)) if !items.is_empty())
    }

    pub fn tuple_items(&self) -> Option<&[SchemaNode]> {
        match &self.items {
            Some(Items::Tuple(items)) => Some(items),
            _ => None,
        }
    }

    /// The schema shared by every element of an ordinary array.
    pub fn item_schema(&self) -> Option<&SchemaNode> {
        match &self.items {
            Some(Items::Single(item)) => Some(item),
            _ => None,
        }
    }

    /// Schema for slots beyond a fixed tuple.
    ///
    /// `additionalItems: true` carries no schema to build items from and is
    /// treated as not allowing additions.
    pub fn additional_items_schema(&self) -> Option<&SchemaNode> {
        match &self.additional_items {
            Some(AdditionalItems::Schema(schema)) => Some(schema),
            Some(AdditionalItems::Flag(true)) => {
                warn!("additionalItems=true is not supported, no items can be added");
                None
            }
            _ => None,
        }
    }

    /// Raw (unresolved) schema for array position `index`.
    pub fn schema_for_index(&self, index: usize) -> Option<&SchemaNode> {
        match &self.items {
            Some(Items::Tuple(items)) => items
                .get(index)
                .or_else(|| self.additional_items_schema()),
            Some(Items::Single(item)) => Some(item),
            None => None,
        }
    }

    pub fn is_property_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Whether array elements of this schema are inherently required.
    pub fn is_item_required(&self) -> bool {
        match &self.schema_type {
            Some(ty) => !ty.allows_null(),
            None => true,
        }
    }

    /// Options of an enum-like schema, labelled by `enumNames` when present.
    pub fn enum_options(&self) -> Vec<EnumOption> {
        let Some(values) = &self.enum_values else {
            return Vec::new();
        };
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let label = self
                    .enum_names
                    .as_ref()
                    .and_then(|names| names.get(i).cloned())
                    .unwrap_or_else(|| match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    });
                EnumOption {
                    label,
                    value: value.clone(),
                }
            })
            .collect()
    }

    /// Merge `top` over `self`; keys set in `top` win.
    pub fn overlay(&self, top: &SchemaNode) -> Result<SchemaNode> {
        let mut merged = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(top) = serde_json::to_value(top)? {
            merged.extend(top);
        }
        Ok(SchemaNode::deserialize(Value::Object(merged))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_preserves_unknown_keys() {
        let schema = SchemaNode::from_value(&json!({
            "type": "string",
            "title": "Name",
            "x-widget-hint": 3
        }))
        .unwrap();
        assert_eq!(schema.kind(), SchemaKind::String);
        assert_eq!(schema.extra.get("x-widget-hint"), Some(&json!(3)));
        assert_eq!(
            schema.to_value().unwrap(),
            json!({"type": "string", "title": "Name", "x-widget-hint": 3})
        );
    }

    #[test]
    fn test_kind_guessing() {
        let obj = SchemaNode::from_value(&json!({"properties": {"a": {}}})).unwrap();
        assert_eq!(obj.kind(), SchemaKind::Object);
        let nullable = SchemaNode::from_value(&json!({"type": ["null", "integer"]})).unwrap();
        assert_eq!(nullable.kind(), SchemaKind::Integer);
        assert!(!nullable.is_item_required());
        let odd = SchemaNode::from_value(&json!({"type": "matrix"})).unwrap();
        assert_eq!(odd.kind(), SchemaKind::Unknown);
        assert_eq!(odd.type_name(), "matrix");
    }

    #[test]
    fn test_items_variants() {
        let tuple = SchemaNode::from_value(&json!({
            "type": "array",
            "items": [{"type": "string"}, {"type": "number"}],
            "additionalItems": {"type": "boolean"}
        }))
        .unwrap();
        assert!(tuple.is_fixed_items());
        assert_eq!(tuple.schema_for_index(1).unwrap().kind(), SchemaKind::Number);
        assert_eq!(tuple.schema_for_index(5).unwrap().kind(), SchemaKind::Boolean);

        let list = SchemaNode::from_value(&json!({"type": "array", "items": {"type": "string"}}))
            .unwrap();
        assert!(!list.is_fixed_items());
        assert!(list.item_schema().is_some());

        let flag = SchemaNode::from_value(&json!({
            "type": "array",
            "items": [{"type": "string"}],
            "additionalItems": true
        }))
        .unwrap();
        assert!(flag.additional_items_schema().is_none());
    }

    #[test]
    fn test_enum_options() {
        let schema = SchemaNode::from_value(&json!({
            "type": "string",
            "enum": ["a", "b", 3],
            "enumNames": ["Alpha"]
        }))
        .unwrap();
        let labels: Vec<_> = schema.enum_options().into_iter().map(|o| o.label).collect();
        assert_eq!(labels, ["Alpha", "b", "3"]);
    }

    #[test]
    fn test_overlay() {
        let base =
            SchemaNode::from_value(&json!({"type": "string", "title": "Base", "minLength": 2}))
                .unwrap();
        let top = SchemaNode::from_value(&json!({"title": "Top"})).unwrap();
        let merged = base.overlay(&top).unwrap();
        assert_eq!(merged.title.as_deref(), Some("Top"));
        assert_eq!(merged.kind(), SchemaKind::String);
        assert_eq!(merged.extra.get("minLength"), Some(&json!(2)));
    }

    #[test]
    fn test_empty() {
        assert!(SchemaNode::from_value(&json!({})).unwrap().is_empty());
        assert!(!SchemaNode::from_value(&json!({"title": "x"})).unwrap().is_empty());
    }
}
