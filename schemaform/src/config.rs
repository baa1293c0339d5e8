//! Engine configuration.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    document::read_structured, ids::DEFAULT_ROOT_ID, resolver::FragmentStore, schema::SchemaNode,
};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".schemaform.toml";

/// Settings for loading and rendering one form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FormConfig {
    /// Identifier of the form root; every field id starts with it.
    pub root_id: String,
    /// Already fetched remote fragments: `$remote` URL to local schema file.
    pub fragments: BTreeMap<String, PathBuf>,
    /// Fill declared defaults into the data before rendering.
    pub fill_defaults: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            root_id: DEFAULT_ROOT_ID.to_string(),
            fragments: BTreeMap::new(),
            fill_defaults: true,
        }
    }
}

impl FormConfig {
    /// Load from a `.toml` or `.json` file; a missing or empty file gives the defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match read_structured(path)? {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("invalid config {}", path.display())),
            None => {
                debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Read every configured fragment; relative paths are taken from `base`.
    pub fn load_fragments(&self, base: &Path) -> anyhow::Result<FragmentStore> {
        let mut store = FragmentStore::new();
        for (url, file) in &self.fragments {
            let file = base.join(file);
            let content = fs::read_to_string(&file)
                .with_context(|| format!("fragment {url}: cannot read {}", file.display()))?;
            let value: Value = serde_json::from_str(&content)
                .with_context(|| format!("fragment {url}: {} is not JSON", file.display()))?;
            store.insert(url.clone(), SchemaNode::from_value(&value)?);
            debug!("fragment {url} loaded from {}", file.display());
        }
        Ok(store)
    }

    /// JSON schema of the configuration itself.
    pub fn json_schema() -> anyhow::Result<Value> {
        Ok(serde_json::to_value(schemars::schema_for!(FormConfig))?)
    }
}
