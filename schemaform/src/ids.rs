//! Identifier trees.
//!
//! Every field gets an id made of its parent's id and its property name or
//! array index joined by `_`. Array ids are positional: moving an element
//! reassigns the ids of everything below the moved positions.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{
    resolver::retrieve_schema,
    schema::{Definitions, SchemaKind, SchemaNode},
};

/// Id of the form root unless configured otherwise.
pub const DEFAULT_ROOT_ID: &str = "root";

/// Separator between an id and its child key.
pub const ID_SEPARATOR: &str = "_";

/// One node of the identifier tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdNode {
    #[serde(rename = "$id")]
    pub id: String,
    /// Children keyed by property name or decimal array index.
    #[serde(flatten)]
    pub children: IndexMap<String, IdNode>,
}

impl IdNode {
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            children: IndexMap::new(),
        }
    }

    pub fn child(&self, key: &str) -> Option<&IdNode> {
        self.children.get(key)
    }

    pub fn item(&self, index: usize) -> Option<&IdNode> {
        self.children.get(&index.to_string())
    }

    /// Number of ids in this subtree, including this one.
    pub fn len(&self) -> usize {
        1 + self.children.values().map(IdNode::len).sum::<usize>()
    }

    /// Every id in depth-first order.
    pub fn ids(&self) -> Vec<&str> {
        let mut out = vec![self.id.as_str()];
        for child in self.children.values() {
            out.extend(child.ids());
        }
        out
    }
}

/// Id for `key` below `parent`.
pub fn child_id(parent: &str, key: &str) -> String {
    format!("{parent}{ID_SEPARATOR}{key}")
}

/// Build the identifier tree for an effective schema and its data.
///
/// Children whose schema cannot be resolved become leaves; the field
/// dispatcher reports the failure where it renders them.
pub fn build_id_tree(
    schema: &SchemaNode,
    id_prefix: &str,
    definitions: &Definitions,
    data: Option<&Value>,
) -> IdNode {
    IdBuilder {
        definitions,
        ancestors: Vec::new(),
    }
    .build(schema, id_prefix.to_string(), data)
}

struct IdBuilder<'a> {
    definitions: &'a Definitions,
    ancestors: Vec<String>,
}

impl IdBuilder<'_> {
    fn build(&mut self, schema: &SchemaNode, id: String, data: Option<&Value>) -> IdNode {
        let mut node = IdNode::leaf(id);
        match schema.kind() {
            SchemaKind::Object => {
                for (name, child) in &schema.properties {
                    let child_data = data.and_then(|d| d.get(name));
                    let child_node = self.build_child(child, child_id(&node.id, name), child_data);
                    node.children.insert(name.clone(), child_node);
                }
            }
            SchemaKind::Array => {
                let items = data.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
                let fixed = schema.tuple_items().map_or(0, <[SchemaNode]>::len);
                for index in 0..items.len().max(fixed) {
                    let key = index.to_string();
                    let id = child_id(&node.id, &key);
                    let child_node = match schema.schema_for_index(index) {
                        Some(item) => self.build_child(item, id, items.get(index)),
                        None => IdNode::leaf(id),
                    };
                    node.children.insert(key, child_node);
                }
            }
            _ => {}
        }
        node
    }

    fn build_child(&mut self, raw: &SchemaNode, id: String, data: Option<&Value>) -> IdNode {
        if let Some(pointer) = &raw.reference
            && data.is_none()
            && self.ancestors.contains(pointer)
        {
            return IdNode::leaf(id);
        }
        let schema = match retrieve_schema(raw, self.definitions) {
            Ok(schema) => schema,
            Err(err) => {
                warn!("id tree: {id} left as a leaf: {err}");
                return IdNode::leaf(id);
            }
        };
        if let Some(pointer) = &raw.reference {
            self.ancestors.push(pointer.clone());
        }
        let node = self.build(&schema, id, data);
        if raw.reference.is_some() {
            self.ancestors.pop();
        }
        node
    }
}
