//! Error types for mounting and rendering

use thiserror::Error;

use crate::engine::RootId;

/// Main error type for Sprout operations.
///
/// Only conditions that must be surfaced to the host are represented here.
/// Missing paths, malformed loop expressions and duplicate loop keys degrade
/// to empty output instead.
#[derive(Error, Debug)]
pub enum SproutError {
    /// A root's payload attribute did not contain valid JSON.
    #[error("Payload error in {root}: {source}")]
    Payload {
        /// The root whose payload failed to parse
        root: RootId,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Template nesting went deeper than the configured limit.
    #[error("Template nesting too deep: depth {depth} exceeds maximum {max}")]
    DepthExceeded {
        /// Depth reached
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// The root id is not (or no longer) mounted.
    #[error("Unknown root: {0}")]
    UnknownRoot(RootId),

    /// A root node must have a parent to receive boundary markers.
    #[error("Root node is not attached to a parent")]
    DetachedRoot,

    /// Markup handed to the reference document could not be parsed.
    #[error("Markup error: {0}")]
    Markup(String),

    /// Engine configuration could not be deserialized.
    #[error("Config error: {0}")]
    Config(#[source] serde_json::Error),
}

impl SproutError {
    /// Create a markup error.
    pub fn markup(message: impl Into<String>) -> Self {
        SproutError::Markup(message.into())
    }
}

/// Result type alias for Sprout operations
pub type Result<T> = std::result::Result<T, SproutError>;
