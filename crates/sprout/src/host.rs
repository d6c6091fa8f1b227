//! Host tree trait
//!
//! The engine never owns the tree it renders into. A host supplies node
//! creation, attribute access, ordered child insertion and removal, and a
//! way to be told when a root's payload attribute changes.
//!
//! # Architecture
//!
//! ```text
//! Host tree ──observe──▶ Notifier ──▶ Engine queue ──flush──▶ Hydrator ──▶ Host tree
//! ```
//!
//! [`Document`](crate::dom::Document) is the in-memory reference host.

use std::fmt;
use std::hash::Hash;

use tokio::sync::mpsc::UnboundedSender;

use crate::engine::RootId;

/// The kind of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An element with a tag name, attributes and children
    Element,
    /// A text node
    Text,
    /// A comment node (used for boundary markers)
    Comment,
    /// A detached container whose children move on insertion
    Fragment,
}

/// Handle identifying an attribute observer registered with a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Sender side of a root's change notifications.
///
/// Hosts call [`Notifier::notify`] whenever the observed attribute is
/// written. Notifications are queued; the engine renders on its next
/// flush, coalescing repeated notifications for the same root.
#[derive(Clone)]
pub struct Notifier {
    root: RootId,
    sender: UnboundedSender<RootId>,
}

impl Notifier {
    pub(crate) fn new(root: RootId, sender: UnboundedSender<RootId>) -> Self {
        Self { root, sender }
    }

    /// Queue a change notification. Ignored once the engine is gone.
    pub fn notify(&self) {
        let _ = self.sender.send(self.root);
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Notifier({})", self.root)
    }
}

/// A tree the engine can read templates from and render into.
pub trait Host {
    /// Handle to a node in this host's tree
    type Node: Clone + PartialEq + Eq + Hash + fmt::Debug;

    // ═══════════════════════════════════════════════════════════════════
    // Reading
    // ═══════════════════════════════════════════════════════════════════

    /// The kind of a node.
    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Tag name of an element (`None` for other kinds).
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    /// Text of a text or comment node.
    fn text(&self, node: &Self::Node) -> Option<String>;

    /// All attributes of an element, in document order.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    /// One attribute of an element.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Children in order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// The parent, if attached.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// The following sibling, if any.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    // ═══════════════════════════════════════════════════════════════════
    // Writing
    // ═══════════════════════════════════════════════════════════════════

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> Self::Node;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Create a detached comment node.
    fn create_comment(&mut self, text: &str) -> Self::Node;

    /// Create an empty fragment.
    fn create_fragment(&mut self) -> Self::Node;

    /// Set an attribute, notifying observers of that attribute.
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    /// Remove an attribute.
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    /// Replace the text of a text or comment node.
    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Insert `node` into `parent` before `reference` (append when `None`).
    ///
    /// An attached node is moved. A fragment moves its children and is left
    /// empty. Inserting a node directly before its own next sibling is a
    /// no-op.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        node: &Self::Node,
        reference: Option<&Self::Node>,
    );

    /// Append `node` as the last child of `parent`.
    fn append_child(&mut self, parent: &Self::Node, node: &Self::Node) {
        self.insert_before(parent, node, None);
    }

    /// Detach a node from its parent. Detached nodes may be reinserted.
    fn remove(&mut self, node: &Self::Node);

    // ═══════════════════════════════════════════════════════════════════
    // Observation
    // ═══════════════════════════════════════════════════════════════════

    /// Call `notifier` whenever `attribute` on `node` is written.
    fn observe(&mut self, node: &Self::Node, attribute: &str, notifier: Notifier) -> ObserverId;

    /// Stop an observer. Unknown ids are ignored.
    fn unobserve(&mut self, id: ObserverId);
}
