//! RAII scope guard for automatic frame cleanup

use super::Environment;

/// RAII guard that automatically pops a frame when dropped.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sprout::Environment;
///
/// let mut env = Environment::with_current(json!([1, 2]));
///
/// {
///     let mut item = env.scope_guard();
///     item.define("n", json!(1));
///     item.set_current(json!(1));
///     assert_eq!(item.current(), Some(&json!(1)));
/// }
/// // frame popped, n is gone
/// assert!(!env.contains("n"));
/// assert_eq!(env.current(), Some(&json!([1, 2])));
/// ```
pub struct ScopeGuard<'a> {
    env: &'a mut Environment,
}

impl Environment {
    /// Create a scope guard that pushes a frame now and pops it on drop.
    pub fn scope_guard(&mut self) -> ScopeGuard<'_> {
        self.push_frame();
        ScopeGuard { env: self }
    }
}

impl<'a> Drop for ScopeGuard<'a> {
    fn drop(&mut self) {
        self.env.pop_frame();
    }
}

impl<'a> std::ops::Deref for ScopeGuard<'a> {
    type Target = Environment;

    fn deref(&self) -> &Self::Target {
        self.env
    }
}

impl<'a> std::ops::DerefMut for ScopeGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.env
    }
}
