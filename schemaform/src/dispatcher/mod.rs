//! Field dispatcher.
//!
//! Walks the schema together with the UI schema, data, identifier tree and
//! error tree, and produces a serialisable [`FieldView`] tree for templates
//! to lay out. Each node is resolved on its own: a failing `$ref` turns into a
//! [`FieldBody::Failed`] at that node and its siblings still render.

mod registry;

pub use registry::{
    CustomField, CustomFieldProps, Registry, UNSUPPORTED_WIDGET, Widget, WidgetProps,
};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{
    array::{ArrayCapabilities, ArrayEngine, ArrayVariant, ItemControls},
    defaults::get_default,
    error::FormError,
    error_tree::ErrorNode,
    ids::{DEFAULT_ROOT_ID, IdNode, child_id},
    path::DataPath,
    resolver::{FragmentStore, ResolveContext, resolve, retrieve_schema},
    schema::{Definitions, SchemaKind, SchemaNode},
    ui::UiSchema,
};

const DEFAULT_ADD_BUTTON_TEXT: &str = "Add";

/// Shared, read-only inputs of one render pass.
#[derive(Clone, Copy)]
pub struct FormContext<'a> {
    pub registry: &'a Registry,
    pub definitions: &'a Definitions,
    pub fragments: &'a FragmentStore,
    /// The whole current form value.
    pub ref_data: &'a Value,
}

impl FormContext<'_> {
    fn resolve_context(&self) -> ResolveContext<'_> {
        ResolveContext {
            definitions: self.definitions,
            fragments: self.fragments,
            ref_data: self.ref_data,
        }
    }
}

/// One field to render.
#[derive(Debug, Clone)]
pub struct FieldNode<'a> {
    /// Raw schema as declared by the parent.
    pub schema: &'a SchemaNode,
    pub ui: &'a UiSchema,
    pub data: Option<&'a Value>,
    pub id: String,
    pub ids: Option<&'a IdNode>,
    pub errors: Option<&'a ErrorNode>,
    /// Property name, for labels.
    pub name: Option<String>,
    pub path: DataPath,
    /// Requirement imposed by the parent.
    pub required: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub autofocus: bool,
}

impl<'a> FieldNode<'a> {
    /// The form root.
    pub fn root(schema: &'a SchemaNode, ui: &'a UiSchema, data: Option<&'a Value>) -> Self {
        Self {
            schema,
            ui,
            data,
            id: DEFAULT_ROOT_ID.to_string(),
            ids: None,
            errors: None,
            name: None,
            path: DataPath::root(),
            required: false,
            disabled: false,
            readonly: false,
            autofocus: false,
        }
    }

    pub fn with_ids(mut self, ids: &'a IdNode) -> Self {
        self.id = ids.id.clone();
        self.ids = Some(ids);
        self
    }

    pub fn with_errors(mut self, errors: &'a ErrorNode) -> Self {
        self.errors = Some(errors);
        self
    }

    fn own_errors(&self) -> &'a [String] {
        self.errors.map(ErrorNode::own_errors).unwrap_or_default()
    }

    /// `ui:title`, then the declared title, then the property name.
    fn label(&self, effective: Option<&SchemaNode>) -> Option<String> {
        self.ui
            .title
            .clone()
            .or_else(|| self.schema.title.clone())
            .or_else(|| effective.and_then(|s| s.title.clone()))
            .or_else(|| self.name.clone())
    }
}

/// Rendered field plus the decorations templates need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub id: String,
    pub path: DataPath,
    pub kind: SchemaKind,
    pub label: Option<String>,
    pub description: Option<String>,
    pub help: Option<String>,
    pub errors: Vec<String>,
    pub required: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub hidden: bool,
    pub display_label: bool,
    pub class_names: String,
    pub body: FieldBody,
}

impl FieldView {
    /// Depth-first search by id.
    pub fn find(&self, id: &str) -> Option<&FieldView> {
        if self.id == id {
            return Some(self);
        }
        match &self.body {
            FieldBody::Object { properties } => properties.values().find_map(|f| f.find(id)),
            FieldBody::Array(array) => array
                .items
                .iter()
                .filter_map(|item| item.field.as_ref())
                .find_map(|f| f.find(id)),
            _ => None,
        }
    }

    /// Direct child for property `name`.
    pub fn property(&self, name: &str) -> Option<&FieldView> {
        match &self.body {
            FieldBody::Object { properties } => properties.get(name),
            _ => None,
        }
    }
}

/// Content of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "body", rename_all = "snake_case")]
pub enum FieldBody {
    /// Empty schema, or recursion stopped for lack of data.
    Placeholder,
    Object {
        properties: IndexMap<String, FieldView>,
    },
    Array(ArrayView),
    /// Output of a primitive widget.
    Control { widget: String, output: Value },
    Custom { name: String, output: Value },
    Unsupported { reason: String },
    /// Resolution failed for this node only.
    Failed { error: String },
}

/// An array field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayView {
    pub variant: ArrayVariant,
    pub title: Option<String>,
    pub capabilities: ArrayCapabilities,
    pub add_button_text: String,
    pub items: Vec<ArrayItemView>,
    /// Whole-value control of multi-select and file-list arrays.
    pub control: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayItemView {
    pub index: usize,
    pub controls: ItemControls,
    pub has_toolbar: bool,
    /// `None` when the element was hidden by its condition.
    pub field: Option<FieldView>,
}

/// Render `node` and everything below it.
///
/// Returns `None` when the node's condition is not met.
pub fn render_field(ctx: &FormContext<'_>, node: &FieldNode<'_>) -> Option<FieldView> {
    Renderer {
        ctx,
        ancestors: Vec::new(),
    }
    .render(node)
}

struct Renderer<'c, 'a> {
    ctx: &'c FormContext<'a>,
    /// `$ref` pointers expanded on the way down.
    ancestors: Vec<String>,
}

impl Renderer<'_, '_> {
    fn render(&mut self, node: &FieldNode<'_>) -> Option<FieldView> {
        let raw = node.schema;
        if let Some(pointer) = &raw.reference
            && node.data.is_none()
            && self.ancestors.contains(pointer)
        {
            debug!("{}: recursion through {pointer} stopped", node.path);
            return Some(self.view(node, None, node.required, FieldBody::Placeholder));
        }

        let resolved = match resolve(raw, &self.ctx.resolve_context()) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("{}: {err}", node.path);
                let body = FieldBody::Failed {
                    error: err.to_string(),
                };
                return Some(self.view(node, None, node.required, body));
            }
        };
        if !resolved.activation.is_active() {
            debug!("{}: hidden by condition", node.path);
            return None;
        }
        let schema = resolved.schema;
        let required = resolved.activation.forces_required() || node.required;
        if schema.is_empty() {
            return Some(self.view(node, Some(&schema), required, FieldBody::Placeholder));
        }

        let filled = match node.data {
            None if schema.default.is_some() || schema.kind().is_container() => {
                match get_default(&schema, None, self.ctx.definitions) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!("{}: no default state: {err}", node.path);
                        None
                    }
                }
            }
            _ => None,
        };
        let mut local = node.clone();
        if filled.is_some() {
            local.data = filled.as_ref();
        }
        let node = &local;

        if let Some(pointer) = &raw.reference {
            self.ancestors.push(pointer.clone());
        }
        let body = self.body(node, &schema, required);
        if raw.reference.is_some() {
            self.ancestors.pop();
        }
        Some(self.view(node, Some(&schema), required, body))
    }

    fn body(&mut self, node: &FieldNode<'_>, schema: &SchemaNode, required: bool) -> FieldBody {
        if let Some(name) = &node.ui.field {
            match self.ctx.registry.field(name) {
                Some(field) => {
                    let output = field.render(&CustomFieldProps {
                        schema,
                        ui: node.ui,
                        id: &node.id,
                        path: &node.path,
                        value: node.data,
                        errors: node.errors,
                        required,
                        disabled: node.disabled || node.ui.disabled,
                        readonly: node.readonly || node.ui.readonly,
                        ref_data: self.ctx.ref_data,
                    });
                    return FieldBody::Custom {
                        name: name.clone(),
                        output,
                    };
                }
                None => warn!("{}: no custom field named `{name}`", node.path),
            }
        }

        match schema.kind() {
            SchemaKind::Object => self.object_body(node, schema),
            SchemaKind::Array => self.array_body(node, schema, required),
            SchemaKind::Unknown => {
                let err = FormError::UnsupportedSchemaType {
                    type_name: schema.type_name(),
                };
                warn!("{}: {err}", node.path);
                FieldBody::Unsupported {
                    reason: err.to_string(),
                }
            }
            kind => {
                let widget = node
                    .ui
                    .widget
                    .clone()
                    .unwrap_or_else(|| default_widget(kind, schema).to_string());
                let label = node.label(Some(schema));
                let output = self.ctx.registry.widget(&widget).render(&WidgetProps {
                    schema,
                    options: &node.ui.options,
                    id: &node.id,
                    path: &node.path,
                    value: node.data,
                    label: label.as_deref(),
                    required,
                    disabled: node.disabled || node.ui.disabled,
                    readonly: node.readonly || node.ui.readonly,
                    autofocus: node.autofocus || node.ui.autofocus,
                    multiple: false,
                    enum_options: schema.enum_options(),
                    errors: node.own_errors(),
                });
                FieldBody::Control { widget, output }
            }
        }
    }

    fn object_body(&mut self, node: &FieldNode<'_>, schema: &SchemaNode) -> FieldBody {
        let mut properties = IndexMap::new();
        for (name, child_schema) in &schema.properties {
            let ui = node.ui.property(name);
            let child = FieldNode {
                schema: child_schema,
                ui: &ui,
                data: node.data.and_then(|d| d.get(name)),
                id: node
                    .ids
                    .and_then(|ids| ids.child(name))
                    .map_or_else(|| child_id(&node.id, name), |ids| ids.id.clone()),
                ids: node.ids.and_then(|ids| ids.child(name)),
                errors: node.errors.and_then(|e| e.child(name)),
                name: Some(name.clone()),
                path: node.path.push_key(name),
                required: schema.is_property_required(name),
                disabled: node.disabled || node.ui.disabled,
                readonly: node.readonly || node.ui.readonly,
                autofocus: false,
            };
            if let Some(view) = self.render(&child) {
                properties.insert(name.clone(), view);
            }
        }
        FieldBody::Object { properties }
    }

    fn array_body(
        &mut self,
        node: &FieldNode<'_>,
        schema: &SchemaNode,
        required: bool,
    ) -> FieldBody {
        let engine = match ArrayEngine::new(schema, node.ui, self.ctx.definitions) {
            Ok(engine) => engine.at(node.path.clone()),
            Err(err) => {
                warn!("{}: {err}", node.path);
                return FieldBody::Failed {
                    error: err.to_string(),
                };
            }
        };
        let data = node
            .data
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let variant = engine.variant();
        let mut view = ArrayView {
            variant,
            title: node
                .ui
                .title
                .clone()
                .or_else(|| schema.title.clone())
                .or_else(|| node.name.clone()),
            capabilities: engine.capabilities(data.len()),
            add_button_text: schema
                .add_button_text
                .clone()
                .unwrap_or_else(|| DEFAULT_ADD_BUTTON_TEXT.to_string()),
            items: Vec::new(),
            control: None,
        };

        if variant.is_whole_value() {
            view.control = Some(self.whole_value_control(node, schema, variant, required));
            return FieldBody::Array(view);
        }

        let fixed_len = match variant {
            ArrayVariant::FixedTuple { fixed_len, .. } => Some(fixed_len),
            _ => None,
        };
        let len = data.len().max(fixed_len.unwrap_or(0));
        for index in 0..len {
            let Some(item_schema) = schema.schema_for_index(index) else {
                continue;
            };
            let key = index.to_string();
            let ui = node.ui.item(index, fixed_len);
            let item_required = retrieve_schema(item_schema, self.ctx.definitions)
                .map_or_else(|_| item_schema.is_item_required(), |s| s.is_item_required());
            let child = FieldNode {
                schema: item_schema,
                ui: &ui,
                data: data.get(index),
                id: node
                    .ids
                    .and_then(|ids| ids.item(index))
                    .map_or_else(|| child_id(&node.id, &key), |ids| ids.id.clone()),
                ids: node.ids.and_then(|ids| ids.item(index)),
                errors: node.errors.and_then(|e| e.item(index)),
                name: None,
                path: node.path.push_index(index),
                required: item_required,
                disabled: node.disabled || node.ui.disabled,
                readonly: node.readonly || node.ui.readonly,
                autofocus: false,
            };
            let controls = engine.item_controls(index, len);
            view.items.push(ArrayItemView {
                index,
                controls,
                has_toolbar: controls.has_toolbar(),
                field: self.render(&child),
            });
        }
        FieldBody::Array(view)
    }

    fn whole_value_control(
        &self,
        node: &FieldNode<'_>,
        schema: &SchemaNode,
        variant: ArrayVariant,
        required: bool,
    ) -> Value {
        let item = schema
            .item_schema()
            .and_then(|item| retrieve_schema(item, self.ctx.definitions).ok())
            .unwrap_or_default();
        let widget = match (&node.ui.widget, variant) {
            (Some(widget), _) => widget.as_str(),
            (None, ArrayVariant::FileList) => "files",
            (None, _) => "select",
        };
        let label = node.label(Some(schema));
        self.ctx.registry.widget(widget).render(&WidgetProps {
            schema,
            options: &node.ui.options,
            id: &node.id,
            path: &node.path,
            value: node.data,
            label: label.as_deref(),
            required,
            disabled: node.disabled || node.ui.disabled,
            readonly: node.readonly || node.ui.readonly,
            autofocus: node.autofocus || node.ui.autofocus,
            multiple: true,
            enum_options: item.enum_options(),
            errors: node.own_errors(),
        })
    }

    fn view(
        &self,
        node: &FieldNode<'_>,
        effective: Option<&SchemaNode>,
        required: bool,
        body: FieldBody,
    ) -> FieldView {
        let raw = node.schema;
        let ui = node.ui;
        let kind = effective.map_or(SchemaKind::Unknown, SchemaNode::kind);
        let type_name = effective.unwrap_or(raw).type_name();
        let errors = node.own_errors().to_vec();

        let display_label = match (&body, kind) {
            (FieldBody::Custom { .. }, _) | (_, SchemaKind::Object) => false,
            (FieldBody::Array(array), _) => array.variant.is_whole_value() && ui.options.label(),
            (_, SchemaKind::Boolean) if ui.widget.is_none() => false,
            _ => ui.options.label(),
        };

        let mut classes = Vec::new();
        if !kind.is_container() {
            classes.push("form-group".to_string());
        }
        classes.push("field".to_string());
        classes.push(format!("field-{type_name}"));
        if !errors.is_empty() {
            classes.extend(["field-error", "has-error", "has-danger"].map(String::from));
        }
        if let Some(extra) = &ui.class_names {
            classes.push(extra.clone());
        }

        FieldView {
            id: node.id.clone(),
            path: node.path.clone(),
            kind,
            label: node.label(effective),
            description: ui
                .description
                .clone()
                .or_else(|| raw.description.clone())
                .or_else(|| effective.and_then(|s| s.description.clone())),
            help: ui.help.clone(),
            errors,
            required,
            disabled: node.disabled || ui.disabled,
            readonly: node.readonly || ui.readonly,
            hidden: ui.is_hidden(),
            display_label,
            class_names: classes.join(" "),
            body,
        }
    }
}

/// Widget used when `ui:widget` is not set.
pub fn default_widget(kind: SchemaKind, schema: &SchemaNode) -> &'static str {
    if schema.is_enum_like() && kind != SchemaKind::Boolean {
        return "select";
    }
    match kind {
        SchemaKind::Boolean => "checkbox",
        SchemaKind::Number | SchemaKind::Integer => "updown",
        SchemaKind::Color => "color",
        SchemaKind::Textarea => "textarea",
        SchemaKind::Image => "file",
        SchemaKind::Null => "hidden",
        _ => match schema.format.as_deref() {
            Some("date") => "date",
            Some("date-time") => "datetime",
            Some("color") => "color",
            Some("data-url") => "file",
            _ => "text",
        },
    }
}
