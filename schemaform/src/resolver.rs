//! Effective schema resolution.
//!
//! Turns a raw [`SchemaNode`] into the schema every other component works
//! on: `$ref` pointers are expanded against the definitions table, `allOf`
//! parts are merged, already fetched remote fragments are merged in, and the
//! node's `condition` is evaluated against the whole form data.

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    error::{FormError, Result},
    schema::{Definitions, SchemaNode},
};

const DEFINITIONS_PREFIX: &str = "#/definitions/";
const DEFS_PREFIX: &str = "#/$defs/";

/// Remote schema fragments that the caller has already fetched, keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct FragmentStore {
    fragments: HashMap<String, SchemaNode>,
}

impl FragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, fragment: SchemaNode) {
        self.fragments.insert(url.into(), fragment);
    }

    pub fn get(&self, url: &str) -> Option<&SchemaNode> {
        self.fragments.get(url)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Inputs shared by every resolution in one render pass.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub definitions: &'a Definitions,
    pub fragments: &'a FragmentStore,
    /// The whole current form value, used by conditions.
    pub ref_data: &'a Value,
}

/// Outcome of evaluating a node's `condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// No condition declared.
    Unconditional,
    /// Condition holds: the field is shown and required.
    Active,
    /// Condition fails: the field is not rendered.
    Inactive,
}

impl Activation {
    pub fn is_active(self) -> bool {
        self != Activation::Inactive
    }

    pub fn forces_required(self) -> bool {
        self == Activation::Active
    }
}

/// An effective schema together with its activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub schema: SchemaNode,
    pub activation: Activation,
}

/// Resolve `node` into its effective schema and evaluate its condition.
pub fn resolve(node: &SchemaNode, ctx: &ResolveContext<'_>) -> Result<Resolved> {
    let schema = Expander::new(ctx.definitions, Some(ctx.fragments)).expand(node)?;
    let activation = match &schema.condition {
        None => Activation::Unconditional,
        Some(condition) if condition.evaluate(ctx.ref_data) => Activation::Active,
        Some(_) => Activation::Inactive,
    };
    Ok(Resolved { schema, activation })
}

/// Expand `$ref` and `allOf` of `node` without touching remote fragments.
pub fn retrieve_schema(node: &SchemaNode, definitions: &Definitions) -> Result<SchemaNode> {
    Expander::new(definitions, None).expand(node)
}

/// Expand references and merge remote fragments, ignoring conditions.
pub fn effective_schema(
    node: &SchemaNode,
    definitions: &Definitions,
    fragments: &FragmentStore,
) -> Result<SchemaNode> {
    Expander::new(definitions, Some(fragments)).expand(node)
}

struct Expander<'a> {
    definitions: &'a Definitions,
    fragments: Option<&'a FragmentStore>,
    /// Pointers currently being expanded.
    visiting: Vec<String>,
}

impl<'a> Expander<'a> {
    fn new(definitions: &'a Definitions, fragments: Option<&'a FragmentStore>) -> Self {
        Self {
            definitions,
            fragments,
            visiting: Vec::new(),
        }
    }

    fn expand(&mut self, node: &SchemaNode) -> Result<SchemaNode> {
        let current = self.expand_refs(node)?;
        let (Some(fragments), Some(url)) = (self.fragments, current.remote.as_deref()) else {
            return Ok(current);
        };
        let Some(fragment) = fragments.get(url) else {
            debug!("remote fragment {url} not fetched yet, keeping placeholder");
            return Ok(current);
        };
        debug!("merging remote fragment {url}");
        let mut placeholder = current.clone();
        placeholder.remote = None;
        let merged = placeholder.overlay(fragment)?;
        if merged.reference.is_none() && merged.all_of.is_empty() && merged.remote.is_none() {
            return Ok(merged);
        }
        if self.visiting.iter().any(|p| p == url) {
            let mut chain = std::mem::take(&mut self.visiting);
            chain.push(url.to_string());
            return Err(FormError::CyclicReference { chain });
        }
        self.visiting.push(url.to_string());
        let expanded = self.expand(&merged);
        self.visiting.pop();
        expanded
    }

    fn expand_refs(&mut self, node: &SchemaNode) -> Result<SchemaNode> {
        let mut node = match &node.reference {
            Some(pointer) => {
                let target = self.enter(pointer)?;
                let resolved = self.expand_refs(target);
                self.visiting.pop();

                let mut local = node.clone();
                local.reference = None;
                if local.is_empty() {
                    resolved?
                } else {
                    resolved?.overlay(&local)?
                }
            }
            None => node.clone(),
        };

        if !node.all_of.is_empty() {
            let parts = std::mem::take(&mut node.all_of);
            let mut merged = SchemaNode::default();
            for part in &parts {
                merged = conjoin(&merged, &self.expand_refs(part)?)?;
            }
            node = conjoin(&merged, &node)?;
        }
        Ok(node)
    }

    fn enter(&mut self, pointer: &str) -> Result<&'a SchemaNode> {
        if self.visiting.iter().any(|p| p == pointer) {
            let mut chain = std::mem::take(&mut self.visiting);
            chain.push(pointer.to_string());
            return Err(FormError::CyclicReference { chain });
        }
        let target = self.lookup(pointer)?;
        debug!("expanding {pointer}");
        self.visiting.push(pointer.to_string());
        Ok(target)
    }

    fn lookup(&self, pointer: &str) -> Result<&'a SchemaNode> {
        let definitions = self.definitions;
        pointer
            .strip_prefix(DEFINITIONS_PREFIX)
            .or_else(|| pointer.strip_prefix(DEFS_PREFIX))
            .map(|name| name.replace("~1", "/").replace("~0", "~"))
            .and_then(|name| definitions.get(&name))
            .ok_or_else(|| FormError::UnresolvedReference {
                pointer: pointer.to_string(),
            })
    }
}

/// Overlay `top` on `base`, uniting their `properties` and `required` lists.
fn conjoin(base: &SchemaNode, top: &SchemaNode) -> Result<SchemaNode> {
    let mut merged = base.overlay(top)?;
    let mut properties = base.properties.clone();
    properties.extend(top.properties.clone());
    merged.properties = properties;
    let mut required = base.required.clone();
    for name in &top.required {
        if !required.contains(name) {
            required.push(name.clone());
        }
    }
    merged.required = required;
    Ok(merged)
}
