//! Engine configuration.

use serde::Deserialize;

use crate::error::Error;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Attribute names, lifecycle event names and recursion ceilings.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attribute marking a two-way bound control.
    pub bind_attr: String,
    /// Attribute on the document body requesting [`autoload`](crate::engine::autoload).
    pub load_attr: String,
    /// Document event fired before data and template setup.
    pub plugin_event: String,
    /// Document event fired after the first render pass.
    pub ready_event: String,
    /// Event a bound control fires when its value changes.
    pub input_event: String,
    /// Upper bound on upward scope walks.
    pub max_path_depth: usize,
    /// Upper bound on nested placeholder descent.
    pub max_template_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_attr: "bbind".to_owned(),
            load_attr: "bload".to_owned(),
            plugin_event: "bplugin".to_owned(),
            ready_event: "bready".to_owned(),
            input_event: "keyup".to_owned(),
            max_path_depth: 1000,
            max_template_depth: 10,
        }
    }
}

impl EngineConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document, filling missing keys with defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the bind attribute (builder).
    pub fn with_bind_attr(mut self, attr: impl Into<String>) -> Self {
        self.bind_attr = attr.into();
        self
    }

    /// Set the load attribute (builder).
    pub fn with_load_attr(mut self, attr: impl Into<String>) -> Self {
        self.load_attr = attr.into();
        self
    }

    /// Set the plugin and ready event names (builder).
    pub fn with_lifecycle_events(mut self, plugin: impl Into<String>, ready: impl Into<String>) -> Self {
        self.plugin_event = plugin.into();
        self.ready_event = ready.into();
        self
    }

    /// Set the control input event (builder).
    pub fn with_input_event(mut self, event: impl Into<String>) -> Self {
        self.input_event = event.into();
        self
    }

    /// Set the upward walk ceiling (builder).
    pub fn with_max_path_depth(mut self, depth: usize) -> Self {
        self.max_path_depth = depth;
        self
    }

    /// Set the nested placeholder ceiling (builder).
    pub fn with_max_template_depth(mut self, depth: usize) -> Self {
        self.max_template_depth = depth;
        self
    }

    /// Attribute names no directive or injector may claim.
    ///
    /// `bscope`, `bsuper` and `bel` are kept for scope bookkeeping markup.
    pub fn reserved_attrs(&self) -> [&str; 5] {
        ["bscope", "bsuper", "bel", &self.bind_attr, &self.load_attr]
    }
}
