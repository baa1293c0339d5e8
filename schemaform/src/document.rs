//! A loaded form: schema, UI schema, data, errors and fragments together.
//!
//! Schema, UI schema, data and error files are read as JSON or TOML by
//! extension. Mutations never touch the stored data; they return the new
//! top-level value for the caller to keep or discard.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, bail};
use schemars::JsonSchema;
use serde_json::Value;

use crate::{
    array::{ArrayAction, ArrayEngine},
    config::FormConfig,
    defaults::get_default,
    dispatcher::{FieldNode, FieldView, FormContext, Registry, render_field},
    error::{FormError, Result},
    error_tree::ErrorNode,
    ids::{DEFAULT_ROOT_ID, IdNode, build_id_tree},
    path::{DataPath, PathSegment},
    resolver::{FragmentStore, effective_schema},
    schema::{SchemaKind, SchemaNode},
    ui::UiSchema,
};

/// Read a JSON or TOML file into a JSON value.
///
/// Missing and blank files give `None`; other extensions are rejected.
pub fn read_structured(path: &Path) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let value = match ext {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))?,
        "toml" | "tml" => {
            let v: toml::Value = toml::from_str(&content)
                .with_context(|| format!("{} is not valid TOML", path.display()))?;
            serde_json::to_value(v)?
        }
        _ => bail!("Unsupported file extension: {ext:?}"),
    };
    Ok(Some(value))
}

/// Generated schema of a Rust type, definitions included.
pub fn schema_for<T: JsonSchema>() -> Result<SchemaNode> {
    let root = schemars::schema_for!(T);
    SchemaNode::from_value(&serde_json::to_value(&root)?)
}

/// Everything one form render needs.
#[derive(Debug, Clone)]
pub struct FormDocument {
    pub schema: SchemaNode,
    pub ui: UiSchema,
    pub data: Option<Value>,
    pub errors: ErrorNode,
    pub fragments: FragmentStore,
    pub root_id: String,
}

impl FormDocument {
    pub fn new(schema: SchemaNode) -> Self {
        Self {
            schema,
            ui: UiSchema::default(),
            data: None,
            errors: ErrorNode::new(),
            fragments: FragmentStore::new(),
            root_id: DEFAULT_ROOT_ID.to_string(),
        }
    }

    /// Form for the generated schema of `T`.
    pub fn for_type<T: JsonSchema>() -> Result<Self> {
        Ok(Self::new(schema_for::<T>()?))
    }

    /// Load the schema file; fails when it does not exist.
    pub fn load(schema: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = schema.as_ref();
        let Some(value) = read_structured(path)? else {
            bail!("Schema file does not exist or is empty: {}", path.display());
        };
        let schema = SchemaNode::from_value(&value)
            .with_context(|| format!("invalid schema {}", path.display()))?;
        Ok(Self::new(schema))
    }

    pub fn load_ui(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        if let Some(value) = read_structured(path.as_ref())? {
            self.ui = UiSchema::from_value(&value)?;
        }
        Ok(())
    }

    /// Load form data; an absent or blank file leaves the data absent.
    pub fn load_data(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        self.data = read_structured(path.as_ref())?;
        Ok(())
    }

    pub fn load_errors(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        if let Some(value) = read_structured(path.as_ref())? {
            self.errors = serde_json::from_value(value)
                .with_context(|| format!("invalid error tree {}", path.as_ref().display()))?;
        }
        Ok(())
    }

    /// Apply `config`; fragment paths are relative to `base`.
    pub fn apply_config(&mut self, config: &FormConfig, base: &Path) -> anyhow::Result<()> {
        self.root_id = config.root_id.clone();
        self.fragments = config.load_fragments(base)?;
        if config.fill_defaults {
            self.fill_defaults()?;
        }
        Ok(())
    }

    /// Root schema with references and fragments expanded.
    pub fn effective_root(&self) -> Result<SchemaNode> {
        effective_schema(&self.schema, &self.schema.definitions, &self.fragments)
    }

    /// Data with declared defaults filled in.
    pub fn defaults(&self) -> Result<Value> {
        get_default(&self.effective_root()?, self.data.as_ref(), &self.schema.definitions)
    }

    pub fn fill_defaults(&mut self) -> Result<()> {
        self.data = Some(self.defaults()?);
        Ok(())
    }

    pub fn id_tree(&self) -> Result<IdNode> {
        Ok(build_id_tree(
            &self.effective_root()?,
            &self.root_id,
            &self.schema.definitions,
            self.data.as_ref(),
        ))
    }

    /// Render the whole form. `None` when the root itself is conditional and inactive.
    pub fn render(&self, registry: &Registry) -> Result<Option<FieldView>> {
        let ids = self.id_tree()?;
        let ref_data = self.data.clone().unwrap_or(Value::Null);
        let ctx = FormContext {
            registry,
            definitions: &self.schema.definitions,
            fragments: &self.fragments,
            ref_data: &ref_data,
        };
        let root = FieldNode::root(&self.schema, &self.ui, self.data.as_ref())
            .with_ids(&ids)
            .with_errors(&self.errors);
        Ok(render_field(&ctx, &root))
    }

    /// Effective schema and UI schema of the field at `path`.
    pub fn field_at(&self, path: &DataPath) -> Result<(SchemaNode, UiSchema)> {
        let definitions = &self.schema.definitions;
        let mut schema = self.effective_root()?;
        let mut ui = self.ui.clone();
        for (depth, seg) in path.segments().iter().enumerate() {
            let next = match seg {
                PathSegment::Key(key) => {
                    let child = schema.properties.get(key);
                    ui = ui.property(key);
                    child
                }
                PathSegment::Index(index) if schema.kind() == SchemaKind::Array => {
                    let fixed = schema.tuple_items().map(<[SchemaNode]>::len);
                    ui = ui.item(*index, fixed);
                    schema.schema_for_index(*index)
                }
                PathSegment::Index(index) => {
                    let key = index.to_string();
                    ui = ui.property(&key);
                    schema.properties.get(&key)
                }
            };
            let Some(next) = next else {
                let prefix = DataPath::from_segments(&path.segments()[..=depth]);
                return Err(FormError::InvalidPath {
                    path: prefix.to_string(),
                    reason: "no schema declared for this location".to_string(),
                });
            };
            schema = effective_schema(next, definitions, &self.fragments)?;
        }
        Ok((schema, ui))
    }

    /// Apply an array action at `path`.
    ///
    /// Returns the new top-level data and whether validation must run again.
    pub fn apply_array_action(
        &self,
        path: &DataPath,
        action: ArrayAction,
    ) -> Result<(Value, bool)> {
        let (schema, ui) = self.field_at(path)?;
        if schema.kind() != SchemaKind::Array {
            return Err(FormError::TypeMismatch {
                path: path.to_string(),
                expected: "array".to_string(),
                actual: schema.type_name(),
            });
        }
        let root = self.data.clone().unwrap_or(Value::Null);
        let items = match path.lookup(&root) {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(other) => {
                return Err(FormError::TypeMismatch {
                    path: path.to_string(),
                    expected: "array".to_string(),
                    actual: json_type(other).to_string(),
                });
            }
        };
        let engine = ArrayEngine::new(&schema, &ui, &self.schema.definitions)?.at(path.clone());
        let change = engine.apply(items, action)?;
        let new_root = path.replace(&root, Value::Array(change.value))?;
        Ok((new_root, change.validate))
    }

    /// New top-level data with the slot at `path` replaced.
    pub fn set_value(&self, path: &DataPath, value: Value) -> Result<Value> {
        let root = self.data.clone().unwrap_or(Value::Null);
        path.replace(&root, value)
    }

    /// Write the data as JSON or TOML by extension, keeping a timestamped
    /// backup of an existing file.
    pub fn save_data(&self, path: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let path = path.as_ref();
        let data = self.data.clone().unwrap_or(Value::Null);
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let content = match ext {
            "toml" | "tml" => toml::to_string_pretty(&data)?,
            "json" => serde_json::to_string_pretty(&data)?,
            _ => bail!("Unsupported file extension: {ext}"),
        };
        if path.exists() {
            let bk = format!(
                "bk-{}.{ext}",
                SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)?
                    .as_secs()
            );
            let backup = path.with_extension(bk);
            fs::copy(path, &backup)?;
            debug!("backup written to {}", backup.display());
        }
        fs::write(path, content)?;
        Ok(path.to_path_buf())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::FieldBody;
    use serde_json::json;

    fn doc(schema: Value, data: Option<Value>) -> FormDocument {
        let mut doc = FormDocument::new(SchemaNode::from_value(&schema).unwrap());
        doc.data = data;
        doc
    }

    fn todo_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "default": "Todo"},
                "tasks": {
                    "type": "array",
                    "items": {"$ref": "#/definitions/Task"}
                }
            },
            "definitions": {
                "Task": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "default": "new task"},
                        "done": {"type": "boolean"}
                    }
                }
            }
        })
    }

    #[test]
    fn test_apply_array_action_at_path() {
        let doc = doc(todo_schema(), Some(json!({"title": "x", "tasks": [{"name": "a"}]})));
        let path = DataPath::parse("tasks");
        let (value, validate) = doc.apply_array_action(&path, ArrayAction::Append).unwrap();
        assert_eq!(
            value,
            json!({"title": "x", "tasks": [{"name": "a"}, {"name": "new task"}]})
        );
        assert!(!validate);
        // the stored data is untouched
        assert_eq!(doc.data.as_ref().unwrap()["tasks"].as_array().unwrap().len(), 1);

        let (value, validate) = doc
            .apply_array_action(&path, ArrayAction::RemoveAt { index: 0 })
            .unwrap();
        assert_eq!(value["tasks"], json!([]));
        assert!(validate);
    }

    #[test]
    fn test_apply_array_action_on_absent_data() {
        let doc = doc(todo_schema(), None);
        let (value, _) = doc
            .apply_array_action(&DataPath::parse("tasks"), ArrayAction::Append)
            .unwrap();
        assert_eq!(value, json!({"tasks": [{"name": "new task"}]}));
    }

    #[test]
    fn test_append_to_absent_tuple_keeps_positions() {
        let doc = doc(
            json!({
                "type": "object",
                "properties": {
                    "pair": {
                        "type": "array",
                        "items": [{"type": "string"}, {"type": "number"}],
                        "additionalItems": {"type": "boolean", "default": true}
                    }
                }
            }),
            None,
        );
        let (value, _) = doc
            .apply_array_action(&DataPath::parse("pair"), ArrayAction::Append)
            .unwrap();
        assert_eq!(value, json!({"pair": ["", 0, true]}));
    }

    #[test]
    fn test_render_shows_defaults_for_absent_data() {
        let doc = doc(
            json!({
                "type": "object",
                "properties": {"name": {"type": "string", "default": "anon"}}
            }),
            None,
        );
        let view = doc.render(&Registry::new()).unwrap().unwrap();
        let FieldBody::Control { output, .. } = &view.property("name").unwrap().body else {
            panic!("expected control");
        };
        assert_eq!(output["value"], json!("anon"));
    }

    #[test]
    fn test_path_errors() {
        let doc = doc(todo_schema(), Some(json!({"title": "x"})));
        assert!(matches!(
            doc.apply_array_action(&DataPath::parse("title"), ArrayAction::Append),
            Err(FormError::TypeMismatch { .. })
        ));
        assert!(matches!(
            doc.apply_array_action(&DataPath::parse("nope"), ArrayAction::Append),
            Err(FormError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_field_at_nested() {
        let doc = doc(todo_schema(), None);
        let (schema, _) = doc.field_at(&DataPath::parse("tasks/3/name")).unwrap();
        assert_eq!(schema.default, Some(json!("new task")));
    }

    #[test]
    fn test_set_value() {
        let doc = doc(todo_schema(), Some(json!({"tasks": [{"name": "a"}]})));
        let value = doc.set_value(&DataPath::parse("tasks/0/done"), json!(true)).unwrap();
        assert_eq!(value, json!({"tasks": [{"name": "a", "done": true}]}));
        assert!(doc.set_value(&DataPath::parse("tasks/5/done"), json!(true)).is_err());
    }

    #[test]
    fn test_defaults_ids_and_render() {
        let mut doc = doc(todo_schema(), Some(json!({"tasks": [{}]})));
        doc.fill_defaults().unwrap();
        assert_eq!(
            doc.data,
            Some(json!({"title": "Todo", "tasks": [{}]}))
        );
        let ids = doc.id_tree().unwrap();
        let done = ids.child("tasks").unwrap().item(0).unwrap().child("done").unwrap();
        assert_eq!(done.id, "root_tasks_0_done");
        let view = doc.render(&Registry::new()).unwrap().unwrap();
        assert!(view.find("root_tasks_0_name").is_some());
    }

    #[test]
    fn test_load_and_save_round_trip_through_files() {
        let dir = std::env::temp_dir().join(format!("schemaform-doc-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let schema_path = dir.join("schema.json");
        fs::write(&schema_path, todo_schema().to_string()).unwrap();
        let data_path = dir.join("data.toml");
        fs::write(&data_path, "title = \"from toml\"\n").unwrap();

        let mut doc = FormDocument::load(&schema_path).unwrap();
        doc.load_data(&data_path).unwrap();
        doc.load_ui(dir.join("missing-ui.json")).unwrap();
        assert_eq!(doc.data, Some(json!({"title": "from toml"})));

        let out = dir.join("out.json");
        doc.save_data(&out).unwrap();
        let saved: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(saved, json!({"title": "from toml"}));

        assert!(doc.save_data(dir.join("out.yaml")).is_err());
        assert!(FormDocument::load(dir.join("absent.json")).is_err());
    }
}
