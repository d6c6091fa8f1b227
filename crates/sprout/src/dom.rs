//! In-memory reference host
//!
//! `Document` is an arena of nodes addressed by [`NodeId`]. Removed nodes
//! stay in the arena so they can be reinserted later, which is how loop
//! entries keep their identity across root re-renders.

use indexmap::IndexMap;
use tracing::warn;

use crate::error::Result;
use crate::host::{Host, NodeKind, Notifier, ObserverId};
use crate::markup::{self, MarkupNode};

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text(String),
    Comment(String),
    Fragment,
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Observer {
    id: ObserverId,
    node: NodeId,
    attribute: String,
    notifier: Notifier,
}

/// An in-memory document tree.
///
/// # Example
///
/// ```
/// use sprout::dom::Document;
///
/// let mut doc = Document::new();
/// let body = doc.body();
/// doc.append_markup(body, r#"<p class="greeting">hi</p>"#).unwrap();
///
/// assert_eq!(doc.inner_html(body), r#"<p class="greeting">hi</p>"#);
/// assert_eq!(doc.text_content(body), "hi");
/// ```
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Slot>,
    body: NodeId,
    observers: Vec<Observer>,
    next_observer: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with an empty `<body>`.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
            observers: Vec::new(),
            next_observer: 0,
        };
        doc.body = doc.create_element("body");
        doc
    }

    /// The document body.
    pub fn body(&self) -> NodeId {
        self.body
    }

    fn slot(&self, id: NodeId) -> &Slot {
        &self.nodes[id.0]
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        &mut self.nodes[id.0]
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // ═══════════════════════════════════════════════════════════════════
    // Markup
    // ═══════════════════════════════════════════════════════════════════

    /// Parse `markup` and append the resulting nodes to `parent`.
    ///
    /// Returns the top-level nodes created.
    pub fn append_markup(&mut self, parent: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let parsed = markup::parse_fragment(markup)?;
        let mut created = Vec::with_capacity(parsed.len());
        for node in &parsed {
            let id = self.build(node);
            self.append_child(&parent, &id);
            created.push(id);
        }
        Ok(created)
    }

    fn build(&mut self, node: &MarkupNode) -> NodeId {
        match node {
            MarkupNode::Text(text) => self.create_text(text),
            MarkupNode::Comment(text) => self.create_comment(text),
            MarkupNode::Element {
                tag,
                attributes,
                children,
            } => {
                let attributes = attributes.iter().cloned().collect();
                let id = self.alloc(NodeData::Element {
                    tag: tag.clone(),
                    attributes,
                });
                for child in children {
                    let child = self.build(child);
                    self.append_child(&id, &child);
                }
                id
            }
        }
    }

    /// Serialize a node and its subtree.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.slot(id).children {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let slot = self.slot(id);
        match &slot.data {
            NodeData::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Fragment => {
                for &child in &slot.children {
                    self.write_html(child, out);
                }
            }
            NodeData::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if markup::is_void_element(tag) {
                    return;
                }
                for &child in &slot.children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let slot = self.slot(id);
        match &slot.data {
            NodeData::Text(text) => text.clone(),
            NodeData::Comment(_) => String::new(),
            _ => slot
                .children
                .iter()
                .map(|&child| self.text_content(child))
                .collect(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════

    /// First attached element (document order from the body) whose
    /// attribute `name` equals `value`.
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .find(|&id| self.attribute(&id, name).as_deref() == Some(value))
    }

    /// All descendants of `id` in document order (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.slot(id).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.slot(next).children.iter().rev().copied());
        }
        out
    }

    /// Whether `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.slot(id).parent;
        }
        false
    }

    /// Number of observers currently registered.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.slot_mut(id).parent.take() {
            self.slot_mut(parent).children.retain(|&child| child != id);
        }
    }

    fn insert_one(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if reference == Some(node) {
            return;
        }
        if reference.is_some()
            && self.slot(node).parent == Some(parent)
            && self.next_sibling(&node) == reference
        {
            return;
        }

        self.detach(node);
        let children = &self.slot(parent).children;
        let index = match reference {
            Some(reference) => match children.iter().position(|&c| c == reference) {
                Some(index) => index,
                None => {
                    warn!(?parent, ?reference, "reference node is not a child, appending");
                    children.len()
                }
            },
            None => children.len(),
        };
        self.slot_mut(parent).children.insert(index, node);
        self.slot_mut(node).parent = Some(parent);
    }
}

impl Host for Document {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.slot(*node).data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.slot(*node).data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.slot(*node).data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        match &self.slot(*node).data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.slot(*node).data {
            NodeData::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.slot(*node).children.clone()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.slot(*node).parent
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.slot(*node).parent?;
        let siblings = &self.slot(parent).children;
        let index = siblings.iter().position(|c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeData::Fragment)
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        match &mut self.slot_mut(*node).data {
            NodeData::Element { attributes, .. } => {
                attributes.insert(name.to_string(), value.to_string());
            }
            _ => return,
        }
        for observer in &self.observers {
            if observer.node == *node && observer.attribute == name {
                observer.notifier.notify();
            }
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.slot_mut(*node).data {
            attributes.shift_remove(name);
        }
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        if let NodeData::Text(current) | NodeData::Comment(current) =
            &mut self.slot_mut(*node).data
        {
            *current = text.to_string();
        }
    }

    fn insert_before(&mut self, parent: &NodeId, node: &NodeId, reference: Option<&NodeId>) {
        let reference = reference.copied();
        if self.kind(node) == NodeKind::Fragment {
            let children = std::mem::take(&mut self.slot_mut(*node).children);
            for child in children {
                self.slot_mut(child).parent = None;
                self.insert_one(*parent, child, reference);
            }
        } else {
            self.insert_one(*parent, *node, reference);
        }
    }

    fn remove(&mut self, node: &NodeId) {
        self.detach(*node);
    }

    fn observe(&mut self, node: &NodeId, attribute: &str, notifier: Notifier) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Observer {
            id,
            node: *node,
            attribute: attribute.to_string(),
            notifier,
        });
        id
    }

    fn unobserve(&mut self, id: ObserverId) {
        self.observers.retain(|observer| observer.id != id);
    }
}
