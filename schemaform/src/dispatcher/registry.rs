//! Named widgets and custom fields.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::{
    error_tree::ErrorNode,
    path::DataPath,
    schema::{EnumOption, SchemaNode},
    ui::{UiOptions, UiSchema},
};

/// Name of the fallback widget used for unknown widget names.
pub const UNSUPPORTED_WIDGET: &str = "unsupported";

/// Everything a primitive control receives.
#[derive(Debug, Clone)]
pub struct WidgetProps<'a> {
    pub schema: &'a SchemaNode,
    pub options: &'a UiOptions,
    pub id: &'a str,
    pub path: &'a DataPath,
    pub value: Option<&'a Value>,
    pub label: Option<&'a str>,
    pub required: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub autofocus: bool,
    /// Set for multi-select and file-list arrays.
    pub multiple: bool,
    pub enum_options: Vec<EnumOption>,
    pub errors: &'a [String],
}

/// A primitive input control.
pub trait Widget {
    fn render(&self, props: &WidgetProps<'_>) -> Value;
}

impl<F> Widget for F
where
    F: Fn(&WidgetProps<'_>) -> Value,
{
    fn render(&self, props: &WidgetProps<'_>) -> Value {
        self(props)
    }
}

/// What a custom field receives.
#[derive(Debug, Clone)]
pub struct CustomFieldProps<'a> {
    pub schema: &'a SchemaNode,
    pub ui: &'a UiSchema,
    pub id: &'a str,
    pub path: &'a DataPath,
    pub value: Option<&'a Value>,
    pub errors: Option<&'a ErrorNode>,
    pub required: bool,
    pub disabled: bool,
    pub readonly: bool,
    /// The whole form value.
    pub ref_data: &'a Value,
}

/// A field that takes over rendering of a whole subtree, selected with `ui:field`.
pub trait CustomField {
    fn render(&self, props: &CustomFieldProps<'_>) -> Value;
}

/// Built-in control description handed to templates.
struct BuiltinWidget {
    name: &'static str,
    input_type: Option<&'static str>,
    extra: fn(&WidgetProps<'_>) -> Map<String, Value>,
}

impl Widget for BuiltinWidget {
    fn render(&self, props: &WidgetProps<'_>) -> Value {
        let mut out = Map::new();
        out.insert("widget".into(), json!(self.name));
        out.insert("id".into(), json!(props.id));
        if let Some(input_type) = self.input_type {
            out.insert("type".into(), json!(input_type));
        }
        out.insert("value".into(), props.value.cloned().unwrap_or(Value::Null));
        if let Some(label) = props.label {
            out.insert("label".into(), json!(label));
        }
        out.insert("required".into(), json!(props.required));
        out.insert("disabled".into(), json!(props.disabled));
        out.insert("readonly".into(), json!(props.readonly));
        if props.autofocus {
            out.insert("autofocus".into(), json!(true));
        }
        if !props.errors.is_empty() {
            out.insert("errors".into(), json!(props.errors));
        }
        out.extend((self.extra)(props));
        Value::Object(out)
    }
}

fn no_extra(_: &WidgetProps<'_>) -> Map<String, Value> {
    Map::new()
}

fn textarea_extra(props: &WidgetProps<'_>) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(rows) = props.options.extra.get("rows") {
        out.insert("rows".into(), rows.clone());
    }
    out
}

fn select_extra(props: &WidgetProps<'_>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("multiple".into(), json!(props.multiple));
    out.insert("options".into(), json!(props.enum_options));
    out
}

fn files_extra(props: &WidgetProps<'_>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("multiple".into(), json!(props.multiple));
    if let Some(accept) = props.options.extra.get("accept") {
        out.insert("accept".into(), accept.clone());
    }
    out
}

fn alt_date_extra(props: &WidgetProps<'_>) -> Map<String, Value> {
    let mut out = Map::new();
    let with_time = props.options.extra.get("time").and_then(Value::as_bool).unwrap_or(false);
    let mut parts = vec!["year", "month", "day"];
    if with_time {
        parts.extend(["hour", "minute", "second"]);
    }
    out.insert("parts".into(), json!(parts));
    out
}

fn alt_year_extra(props: &WidgetProps<'_>) -> Map<String, Value> {
    let mut out = Map::new();
    let mut parts = vec!["year"];
    if props.options.extra.get("month").and_then(Value::as_bool).unwrap_or(false) {
        parts.push("month");
        if props.options.extra.get("day").and_then(Value::as_bool).unwrap_or(false) {
            parts.push("day");
        }
    }
    out.insert("parts".into(), json!(parts));
    out
}

fn unsupported_widget(props: &WidgetProps<'_>) -> Value {
    json!({
        "widget": UNSUPPORTED_WIDGET,
        "id": props.id,
        "unsupported": true,
        "type": props.schema.type_name(),
    })
}

/// Widgets and custom fields by name.
pub struct Registry {
    widgets: HashMap<String, Box<dyn Widget>>,
    aliases: HashMap<String, String>,
    fields: HashMap<String, Box<dyn CustomField>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with the built-in widgets.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        let builtins = [
            ("text", Some("text"), no_extra as fn(&WidgetProps<'_>) -> Map<String, Value>),
            ("textarea", None, textarea_extra),
            ("updown", Some("number"), no_extra),
            ("checkbox", Some("checkbox"), no_extra),
            ("color", Some("color"), no_extra),
            ("select", None, select_extra),
            ("date", Some("date"), no_extra),
            ("datetime", Some("datetime-local"), no_extra),
            ("alt-year", None, alt_year_extra),
            ("alt-datetime", None, alt_date_extra),
            ("file", Some("file"), files_extra),
            ("files", Some("file"), files_extra),
            ("hidden", Some("hidden"), no_extra),
        ];
        for (name, input_type, extra) in builtins {
            registry.register_widget(
                name,
                BuiltinWidget {
                    name,
                    input_type,
                    extra,
                },
            );
        }
        registry.register_widget(UNSUPPORTED_WIDGET, unsupported_widget);
        registry.register_alias("alt-date", "alt-year");
        registry
    }

    /// Registry with no widgets except the fallback.
    pub fn empty() -> Self {
        let mut registry = Self {
            widgets: HashMap::new(),
            aliases: HashMap::new(),
            fields: HashMap::new(),
        };
        registry.register_widget(UNSUPPORTED_WIDGET, unsupported_widget);
        registry
    }

    pub fn register_widget(&mut self, name: impl Into<String>, widget: impl Widget + 'static) {
        self.widgets.insert(name.into(), Box::new(widget));
    }

    /// Make `alias` render with `target`.
    pub fn register_alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    pub fn register_field(&mut self, name: impl Into<String>, field: impl CustomField + 'static) {
        self.fields.insert(name.into(), Box::new(field));
    }

    pub fn has_widget(&self, name: &str) -> bool {
        self.widgets.contains_key(self.canonical(name))
    }

    /// The widget for `name`, or the `unsupported` fallback.
    pub fn widget(&self, name: &str) -> &dyn Widget {
        match self.widgets.get(self.canonical(name)) {
            Some(widget) => widget.as_ref(),
            None => {
                warn!("no widget named `{name}`, using `{UNSUPPORTED_WIDGET}`");
                &unsupported_widget
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&dyn CustomField> {
        self.fields.get(name).map(Box::as_ref)
    }

    fn canonical<'n>(&'n self, name: &'n str) -> &'n str {
        self.aliases.get(name).map_or(name, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props<'a>(
        schema: &'a SchemaNode,
        options: &'a UiOptions,
        path: &'a DataPath,
    ) -> WidgetProps<'a> {
        WidgetProps {
            schema,
            options,
            id: "root_x",
            path,
            value: None,
            label: Some("X"),
            required: true,
            disabled: false,
            readonly: false,
            autofocus: false,
            multiple: false,
            enum_options: schema.enum_options(),
            errors: &[],
        }
    }

    #[test]
    fn test_builtin_text() {
        let registry = Registry::new();
        let schema = SchemaNode::default();
        let options = UiOptions::default();
        let path = DataPath::root();
        let out = registry.widget("text").render(&props(&schema, &options, &path));
        assert_eq!(out["widget"], json!("text"));
        assert_eq!(out["type"], json!("text"));
        assert_eq!(out["value"], Value::Null);
        assert_eq!(out["required"], json!(true));
    }

    #[test]
    fn test_alias_and_fallback() {
        let registry = Registry::new();
        let schema = SchemaNode::default();
        let path = DataPath::root();
        let options: UiOptions =
            serde_json::from_value(json!({"month": true, "day": true})).unwrap();
        assert!(registry.has_widget("alt-date"));
        let out = registry.widget("alt-date").render(&props(&schema, &options, &path));
        assert_eq!(out["parts"], json!(["year", "month", "day"]));

        let out = registry.widget("nope").render(&props(&schema, &options, &path));
        assert_eq!(out["widget"], json!(UNSUPPORTED_WIDGET));
        assert!(!registry.has_widget("nope"));
    }

    #[test]
    fn test_closure_widget() {
        let mut registry = Registry::empty();
        registry.register_widget("stars", |p: &WidgetProps<'_>| json!({"stars": p.id}));
        let schema = SchemaNode::default();
        let options = UiOptions::default();
        let path = DataPath::root();
        assert_eq!(
            registry.widget("stars").render(&props(&schema, &options, &path)),
            json!({"stars": "root_x"})
        );
        let output = registry.widget("text").render(&props(&schema, &options, &path));
        assert_eq!(output["widget"], json!(UNSUPPORTED_WIDGET));
    }
}
