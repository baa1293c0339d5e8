//! Default form state generation.

use serde_json::{Map, Value};

use crate::{
    error::Result,
    resolver::retrieve_schema,
    schema::{Definitions, SchemaKind, SchemaNode},
};

/// Produce a value for `schema` that keeps `current` where it fits and fills
/// declared defaults everywhere else.
///
/// `schema` must already be effective; nested `$ref`s are expanded through
/// the resolver as the walk reaches them.
pub fn get_default(
    schema: &SchemaNode,
    current: Option<&Value>,
    definitions: &Definitions,
) -> Result<Value> {
    DefaultGenerator::new(definitions).value_for(schema, current)
}

/// Empty value of the schema's type: `""`, `0`, `false`, `{}`, `[]` or `null`.
pub fn empty_value(schema: &SchemaNode) -> Value {
    match schema.kind() {
        SchemaKind::String | SchemaKind::Color | SchemaKind::Textarea | SchemaKind::Image => {
            Value::String(String::new())
        }
        SchemaKind::Number | SchemaKind::Integer => Value::from(0),
        SchemaKind::Boolean => Value::Bool(false),
        SchemaKind::Object => Value::Object(Map::new()),
        SchemaKind::Array => Value::Array(Vec::new()),
        SchemaKind::Null | SchemaKind::Unknown => Value::Null,
    }
}

/// Whether `value` has the JSON type declared by `schema`.
pub fn is_compatible(schema: &SchemaNode, value: &Value) -> bool {
    if value.is_null() && schema.schema_type.as_ref().is_some_and(|t| t.allows_null()) {
        return true;
    }
    match schema.kind() {
        SchemaKind::String | SchemaKind::Color | SchemaKind::Textarea | SchemaKind::Image => {
            value.is_string()
        }
        SchemaKind::Number => value.is_number(),
        SchemaKind::Integer => value.is_i64() || value.is_u64(),
        SchemaKind::Boolean => value.is_boolean(),
        SchemaKind::Object => value.is_object(),
        SchemaKind::Array => value.is_array(),
        SchemaKind::Null => value.is_null(),
        SchemaKind::Unknown => true,
    }
}

struct DefaultGenerator<'a> {
    definitions: &'a Definitions,
    /// `$ref` pointers expanded on the way down.
    ancestors: Vec<String>,
}

impl<'a> DefaultGenerator<'a> {
    fn new(definitions: &'a Definitions) -> Self {
        Self {
            definitions,
            ancestors: Vec::new(),
        }
    }

    fn value_for(&mut self, schema: &SchemaNode, current: Option<&Value>) -> Result<Value> {
        match schema.kind() {
            SchemaKind::Object => self.object_value(schema, current),
            SchemaKind::Array => self.array_value(schema, current),
            _ => Ok(scalar_value(schema, current)),
        }
    }

    fn object_value(&mut self, schema: &SchemaNode, current: Option<&Value>) -> Result<Value> {
        let start = current
            .filter(|v| v.is_object())
            .or_else(|| schema.default.as_ref().filter(|v| v.is_object()))
            .and_then(Value::as_object);

        let mut out = Map::new();
        for (name, child) in &schema.properties {
            let present = start.and_then(|m| m.get(name));
            if let Some(value) = self.child_value(child, present)? {
                out.insert(name.clone(), value);
            }
        }
        if let Some(start) = start {
            for (key, value) in start {
                if !out.contains_key(key) {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(Value::Object(out))
    }

    fn array_value(&mut self, schema: &SchemaNode, current: Option<&Value>) -> Result<Value> {
        if let Some(value) = current.filter(|v| v.is_array()) {
            return Ok(value.clone());
        }
        if let Some(items) = schema.tuple_items().filter(|items| !items.is_empty()) {
            let mut slots = Vec::with_capacity(items.len());
            for item in items {
                let slot = match self.child_value(item, None)? {
                    Some(value) => value,
                    None => self.slot_fallback(item)?,
                };
                slots.push(slot);
            }
            return Ok(Value::Array(slots));
        }
        if let Some(default) = schema.default.as_ref().filter(|v| v.is_array()) {
            return Ok(default.clone());
        }
        Ok(Value::Array(Vec::new()))
    }

    /// Value for a nested schema, or `None` to leave it absent.
    fn child_value(&mut self, raw: &SchemaNode, present: Option<&Value>) -> Result<Option<Value>> {
        if let Some(pointer) = &raw.reference
            && present.is_none()
            && self.ancestors.contains(pointer)
        {
            debug!("not defaulting recursive {pointer}");
            return Ok(None);
        }

        let schema = retrieve_schema(raw, self.definitions)?;
        if let Some(pointer) = &raw.reference {
            self.ancestors.push(pointer.clone());
        }
        let value = match present {
            Some(value) => self.value_for(&schema, Some(value)).map(Some),
            None => self.absent_value(&schema),
        };
        if raw.reference.is_some() {
            self.ancestors.pop();
        }
        value
    }

    fn absent_value(&mut self, schema: &SchemaNode) -> Result<Option<Value>> {
        if schema.default.is_some() {
            return self.value_for(schema, None).map(Some);
        }
        match schema.kind() {
            SchemaKind::Object => {
                let value = self.object_value(schema, None)?;
                let has_keys = value.as_object().is_some_and(|m| !m.is_empty());
                Ok(has_keys.then_some(value))
            }
            SchemaKind::Array if schema.is_fixed_items() => {
                self.array_value(schema, None).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn slot_fallback(&mut self, raw: &SchemaNode) -> Result<Value> {
        if raw
            .reference
            .as_ref()
            .is_some_and(|p| self.ancestors.contains(p))
        {
            return Ok(Value::Null);
        }
        Ok(empty_value(&retrieve_schema(raw, self.definitions)?))
    }
}

fn scalar_value(schema: &SchemaNode, current: Option<&Value>) -> Value {
    if let Some(value) = current
        && is_compatible(schema, value)
    {
        return value.clone();
    }
    match &schema.default {
        Some(default) => default.clone(),
        None => empty_value(schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(v: Value) -> SchemaNode {
        SchemaNode::from_value(&v).unwrap()
    }

    #[test]
    fn test_scalars() {
        let defs = Definitions::new();
        let s = node(json!({"type": "string", "default": "hi"}));
        assert_eq!(get_default(&s, None, &defs).unwrap(), json!("hi"));
        assert_eq!(get_default(&s, Some(&json!("kept")), &defs).unwrap(), json!("kept"));
        assert_eq!(get_default(&s, Some(&json!(5)), &defs).unwrap(), json!("hi"));

        let n = node(json!({"type": "integer"}));
        assert_eq!(get_default(&n, None, &defs).unwrap(), json!(0));
        assert_eq!(get_default(&n, Some(&json!(1.5)), &defs).unwrap(), json!(0));
        let b = node(json!({"type": "boolean"}));
        assert_eq!(get_default(&b, None, &defs).unwrap(), json!(false));
        let nullable = node(json!({"type": ["string", "null"]}));
        assert_eq!(get_default(&nullable, Some(&Value::Null), &defs).unwrap(), Value::Null);
    }

    #[test]
    fn test_object_with_all_defaults() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "default": "anon"},
                "age": {"type": "integer", "default": 30},
                "tags": {"type": "array", "items": {"type": "string"}, "default": ["a"]}
            }
        }));
        let value = get_default(&schema, None, &Definitions::new()).unwrap();
        assert_eq!(value, json!({"name": "anon", "age": 30, "tags": ["a"]}));
    }

    #[test]
    fn test_object_overlays_current_and_keeps_optional_absent() {
        let schema = node(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "default": "anon"},
                "nick": {"type": "string"},
                "inner": {
                    "type": "object",
                    "properties": {"flag": {"type": "boolean", "default": true}}
                },
                "empty": {"type": "object", "properties": {"x": {"type": "string"}}}
            }
        }));
        let current = json!({"name": "bob", "extra": 1});
        let value = get_default(&schema, Some(&current), &Definitions::new()).unwrap();
        assert_eq!(
            value,
            json!({"name": "bob", "inner": {"flag": true}, "extra": 1})
        );
    }

    #[test]
    fn test_arrays() {
        let defs = Definitions::new();
        let list = node(json!({"type": "array", "items": {"type": "string", "default": "x"}}));
        assert_eq!(get_default(&list, None, &defs).unwrap(), json!([]));
        let existing = json!(["a", 3]);
        assert_eq!(get_default(&list, Some(&existing), &defs).unwrap(), existing);

        let tuple = node(json!({
            "type": "array",
            "items": [{"type": "string", "default": "a"}, {"type": "number"}],
            "additionalItems": {"type": "boolean"}
        }));
        assert_eq!(get_default(&tuple, None, &defs).unwrap(), json!(["a", 0]));
    }

    #[test]
    fn test_refs_and_recursion_terminate() {
        let defs: Definitions = serde_json::from_value(json!({
            "Node": {
                "type": "object",
                "properties": {
                    "label": {"type": "string", "default": "n"},
                    "next": {"$ref": "#/definitions/Node"}
                }
            }
        }))
        .unwrap();
        let root = retrieve_schema(&node(json!({"$ref": "#/definitions/Node"})), &defs).unwrap();
        let value = get_default(&root, None, &defs).unwrap();
        assert_eq!(value, json!({"label": "n", "next": {"label": "n"}}));

        let current = json!({"next": {"next": {}}});
        let value = get_default(&root, Some(&current), &defs).unwrap();
        assert_eq!(
            value,
            json!({"label": "n", "next": {"label": "n", "next": {"label": "n"}}})
        );
    }

    #[test]
    fn test_unresolved_child_is_an_error() {
        let schema = node(json!({
            "type": "object",
            "properties": {"x": {"$ref": "#/definitions/Missing"}}
        }));
        assert!(get_default(&schema, None, &Definitions::new()).is_err());
    }
}
