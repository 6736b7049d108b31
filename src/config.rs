// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Named layouts loaded from TOML.
//!
//! ```toml
//! [layouts."std_msgs/Int32"]
//! grammar = "list 1 int32 *"
//! description = "single integer"
//!
//! [layouts."demo/AddInts"]
//! grammar = "list 2 int32 * int32 * --- list 1 int32 *"
//! ```
//!
//! Every grammar is compiled when the registry is built, so a bad entry is
//! reported up front instead of on the first message that needs it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::core::{Result, TwiddleError};
use crate::layout::Layout;
use crate::twiddle::WireTwiddler;

/// One entry as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutEntry {
    pub grammar: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    layouts: BTreeMap<String, LayoutEntry>,
}

/// A compiled registry entry.
#[derive(Debug, Clone)]
pub struct NamedLayout {
    pub name: String,
    pub description: Option<String>,
    /// First grammar section
    pub request: Arc<Layout>,
    /// Second section of a `---` grammar
    pub reply: Option<Arc<Layout>>,
}

/// Registry of compiled layouts keyed by name.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    entries: BTreeMap<String, NamedLayout>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and compile a registry from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: RegistryFile =
            toml::from_str(text).map_err(|e| TwiddleError::config("registry", e.to_string()))?;
        let mut registry = Self::new();
        for (name, entry) in file.layouts {
            registry.insert(name, entry)?;
        }
        debug!(
            context = "layout_registry",
            layouts = registry.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Read and compile a registry file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TwiddleError::config(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Compile and add an entry, replacing any entry of the same name.
    pub fn insert(&mut self, name: impl Into<String>, entry: LayoutEntry) -> Result<()> {
        let name = name.into();
        let sections = Layout::compile_sections(&entry.grammar)
            .map_err(|e| TwiddleError::config(&name, e.to_string()))?;
        if sections.len() > 2 {
            return Err(TwiddleError::config(
                &name,
                format!("expected at most 2 grammar sections, found {}", sections.len()),
            ));
        }
        let mut sections = sections.into_iter().map(Arc::new);
        let request = sections
            .next()
            .ok_or_else(|| TwiddleError::config(&name, "empty grammar"))?;
        let reply = sections.next();
        debug!(
            context = "layout_registry",
            name = %name,
            gaps = request.gaps().len(),
            has_reply = reply.is_some(),
            "layout compiled"
        );
        self.entries.insert(
            name.clone(),
            NamedLayout {
                name,
                description: entry.description,
                request,
                reply,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NamedLayout> {
        self.entries.get(name)
    }

    /// Request layout of an entry.
    pub fn layout(&self, name: &str) -> Option<Arc<Layout>> {
        self.entries.get(name).map(|e| Arc::clone(&e.request))
    }

    /// Reply layout of a `---` entry.
    pub fn reply_layout(&self, name: &str) -> Option<Arc<Layout>> {
        self.entries.get(name).and_then(|e| e.reply.clone())
    }

    /// Transcoder for an entry's request layout.
    pub fn twiddler(&self, name: &str) -> Option<WireTwiddler> {
        self.layout(name).map(WireTwiddler::new)
    }

    /// Entry names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
