//! Binding environment that expressions are resolved against

mod frame;

pub use frame::ScopeGuard;

use serde_json::Value;

/// Name of the current-value binding.
pub const CURRENT: &str = "_";

/// A single named binding.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The binding's name
    pub name: String,

    /// The bound value
    pub value: Value,
}

/// The binding environment used during one hydration call.
///
/// Uses a flat scope design with frame boundaries: entering a loop item
/// pushes a frame holding the item binding and a new current value, and
/// leaving the item pops it again, so one item never observes another's
/// bindings.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sprout::Environment;
///
/// let mut env = Environment::with_current(json!({"users": []}));
///
/// env.push_frame();
/// env.define("user", json!({"name": "Ada"}));
/// env.set_current(json!({"name": "Ada"}));
///
/// assert_eq!(env.get("user"), Some(&json!({"name": "Ada"})));
///
/// env.pop_frame();
///
/// assert_eq!(env.get("user"), None);
/// assert_eq!(env.current(), Some(&json!({"users": []})));
/// ```
#[derive(Debug, Clone)]
pub struct Environment {
    /// All bindings in a flat array (most recent at end)
    bindings: Vec<Binding>,

    /// Frame boundaries (indices into bindings)
    frames: Vec<usize>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create a new empty environment.
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            frames: vec![0], // Start with one frame (global scope)
        }
    }

    /// Create an environment whose current value is `value`.
    pub fn with_current(value: Value) -> Self {
        let mut env = Self::new();
        env.set_current(value);
        env
    }

    // ═══════════════════════════════════════════════════════════════════
    // Frame Management (Scope Entry/Exit)
    // ═══════════════════════════════════════════════════════════════════

    /// Enter a new scope (push a frame).
    ///
    /// All bindings defined after this call will be removed when
    /// `pop_frame()` is called.
    pub fn push_frame(&mut self) {
        self.frames.push(self.bindings.len());
    }

    /// Exit the current scope (pop a frame).
    ///
    /// Does nothing at the global scope.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            if let Some(boundary) = self.frames.pop() {
                self.bindings.truncate(boundary);
            }
        }
    }

    /// Get the current scope depth (number of frames).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Bindings
    // ═══════════════════════════════════════════════════════════════════

    /// Define a binding in the current scope, shadowing any outer binding
    /// with the same name.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.push(Binding {
            name: name.into(),
            value,
        });
    }

    /// Set the current value (`_`) for the current scope.
    pub fn set_current(&mut self, value: Value) {
        self.define(CURRENT, value);
    }

    /// Look up a binding by name (most recent wins).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    /// The current value, if one is bound.
    pub fn current(&self) -> Option<&Value> {
        self.get(CURRENT)
    }

    /// Resolve the first segment of a path.
    ///
    /// Named bindings win; otherwise the name is looked up as a field of
    /// the current value.
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.get(name).or_else(|| match self.current() {
            Some(Value::Object(map)) => map.get(name),
            _ => None,
        })
    }

    /// Check if a binding exists.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }
}
