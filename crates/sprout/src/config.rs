//! Engine configuration
//!
//! Every attribute name and marker label the engine reads or writes is
//! configurable, so a host can embed several differently-flavoured engines
//! in one document.

use serde::Deserialize;

use crate::error::{Result, SproutError};

/// Configuration for an [`Engine`](crate::Engine).
///
/// Defaults match the stock markup:
///
/// ```text
/// <template is="🌱" data-json='{"users": [...]}'>
///   <template data-for="{user in users}" data-key="{user.id}">
///     <li>{user.name}</li>
///   </template>
/// </template>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tag name of render roots
    pub root_tag: String,

    /// Attribute that marks a root
    pub root_attribute: String,

    /// Value the root attribute must carry
    pub root_marker: String,

    /// Attribute holding the JSON payload
    pub payload_attribute: String,

    /// Tag name of directive containers
    pub directive_tag: String,

    /// Conditional attribute (render when truthy)
    pub if_attribute: String,

    /// Inverted conditional attribute (render when falsy)
    pub unless_attribute: String,

    /// Loop attribute: `item in sequence`
    pub for_attribute: String,

    /// Optional loop key expression attribute
    pub key_attribute: String,

    /// Field used as a loop key when no key expression is given
    pub identity_field: String,

    /// Comment text of a root's start/end markers
    pub root_markers: (String, String),

    /// Comment text of a loop's start/end markers
    pub loop_markers: (String, String),

    /// Maximum template nesting depth (stack overflow protection)
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_tag: "template".to_string(),
            root_attribute: "is".to_string(),
            root_marker: "🌱".to_string(),
            payload_attribute: "data-json".to_string(),
            directive_tag: "template".to_string(),
            if_attribute: "data-if".to_string(),
            unless_attribute: "data-unless".to_string(),
            for_attribute: "data-for".to_string(),
            key_attribute: "data-key".to_string(),
            identity_field: "id".to_string(),
            root_markers: ("🌱start".to_string(), "🌱end".to_string()),
            loop_markers: ("loop-start".to_string(), "loop-end".to_string()),
            max_depth: 512,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(SproutError::Config)
    }

    /// Use a different payload attribute.
    pub fn with_payload_attribute(mut self, name: impl Into<String>) -> Self {
        self.payload_attribute = name.into();
        self
    }

    /// Use a different root marker value.
    pub fn with_root_marker(mut self, marker: impl Into<String>) -> Self {
        self.root_marker = marker.into();
        self
    }

    /// Use a different identity field for default loop keys.
    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Create a configuration with a custom nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether `tag` names a directive container.
    pub fn is_directive_tag(&self, tag: &str) -> bool {
        tag.eq_ignore_ascii_case(&self.directive_tag)
    }
}
