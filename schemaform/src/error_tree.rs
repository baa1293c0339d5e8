//! Validation error trees.
//!
//! An [`ErrorNode`] mirrors the data: own messages under `__errors` plus one
//! child per property name or decimal array index. The engine only threads
//! these trees; producing them is the validator's job.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::DataPath;

/// Messages for one data node and its descendants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorNode {
    #[serde(rename = "__errors", default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(flatten)]
    pub children: IndexMap<String, ErrorNode>,
}

impl ErrorNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(path, message)` pairs such as `("tasks/1/title", "required")`.
    pub fn from_messages<P, M>(messages: impl IntoIterator<Item = (P, M)>) -> Self
    where
        P: Into<DataPath>,
        M: Into<String>,
    {
        let mut root = Self::new();
        for (path, message) in messages {
            root.node_mut(&path.into()).errors.push(message.into());
        }
        root
    }

    pub fn child(&self, key: &str) -> Option<&ErrorNode> {
        self.children.get(key)
    }

    pub fn item(&self, index: usize) -> Option<&ErrorNode> {
        self.children.get(&index.to_string())
    }

    pub fn at(&self, path: &DataPath) -> Option<&ErrorNode> {
        path.segments()
            .iter()
            .try_fold(self, |node, seg| node.child(&seg.as_key()))
    }

    fn node_mut(&mut self, path: &DataPath) -> &mut ErrorNode {
        path.segments().iter().fold(self, |node, seg| {
            node.children.entry(seg.as_key()).or_default()
        })
    }

    /// Own messages only.
    pub fn own_errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Messages in this subtree.
    pub fn total(&self) -> usize {
        self.errors.len() + self.children.values().map(ErrorNode::total).sum::<usize>()
    }
}
