//! Root render pipeline
//!
//! The engine owns every mounted root's private state in a side table keyed
//! by [`RootId`]: the cached payload text, the root's boundary markers, its
//! template and its loop states. Nothing is stored on host nodes.
//!
//! # Lifecycle
//!
//! ```text
//! Unmounted ──mount──▶ Idle ──notify + flush──▶ Rendering ──▶ Idle
//!                        │
//!                        └──unmount──▶ Unmounted
//! ```
//!
//! Renders are triggered by payload attribute writes. The host's observer
//! queues a notification; [`Engine::flush`] drains the queue, coalescing
//! repeated notifications per root, and re-renders each root whose payload
//! text differs from the last one rendered.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::{Result, SproutError};
use crate::host::{Host, NodeKind, Notifier, ObserverId};
use crate::hydrate::Hydrator;
use crate::reconcile::{LoopKey, LoopTable};
use crate::template::Template;

/// Stable identifier of a mounted root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(u64);

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// What a render call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The output region was rebuilt
    Rendered,
    /// The payload text matched the last render; nothing was touched
    Unchanged,
}

/// Private state of one mounted root.
struct Root<N> {
    node: N,
    template: Template,
    start: N,
    end: N,
    raw: Option<String>,
    loops: LoopTable<N>,
    observer: ObserverId,
}

/// Mounts roots and keeps their output in sync with their payloads.
///
/// # Example
///
/// ```
/// use sprout::dom::Document;
/// use sprout::{Engine, Host};
///
/// let mut doc = Document::new();
/// let body = doc.body();
/// doc.append_markup(
///     body,
///     r#"<template is="🌱" data-json='{"name": "Ada"}'><p>{name}</p></template>"#,
/// )
/// .unwrap();
///
/// let mut engine = Engine::default();
/// let roots = engine.mount_all(&mut doc, &body).unwrap();
/// assert_eq!(roots.len(), 1);
/// assert!(doc.inner_html(body).contains("<p>Ada</p>"));
///
/// let template = doc.children(&body)[0];
/// doc.set_attribute(&template, "data-json", r#"{"name": "Grace"}"#);
/// engine.flush(&mut doc);
/// assert!(doc.inner_html(body).contains("<p>Grace</p>"));
/// ```
pub struct Engine<H: Host> {
    config: EngineConfig,
    roots: IndexMap<RootId, Root<H::Node>>,
    next_id: u64,
    sender: UnboundedSender<RootId>,
    receiver: UnboundedReceiver<RootId>,
}

impl<H: Host> Default for Engine<H> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<H: Host> fmt::Debug for Engine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("roots", &self.roots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<H: Host> Engine<H> {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            config,
            roots: IndexMap::new(),
            next_id: 0,
            sender,
            receiver,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════
    // Mounting
    // ═══════════════════════════════════════════════════════════════════

    /// Discover and mount every root beneath `scope`.
    ///
    /// Roots already mounted are skipped, and template content is not
    /// searched. Every discovered root is mounted even if some initial
    /// renders fail; the first failure is returned after all roots have
    /// been processed, and the failed roots stay mounted so a later valid
    /// payload renders them.
    pub fn mount_all(&mut self, host: &mut H, scope: &H::Node) -> Result<Vec<RootId>> {
        let mut found = Vec::new();
        self.discover(host, scope, &mut found);

        let mut mounted = Vec::with_capacity(found.len());
        let mut first_error = None;
        for node in found {
            if self.root_of(&node).is_some() {
                continue;
            }
            match self.mount(host, &node) {
                Ok(id) => mounted.push(id),
                Err(err) => {
                    if let Some(id) = self.root_of(&node) {
                        mounted.push(id);
                    }
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(mounted),
        }
    }

    fn discover(&self, host: &H, node: &H::Node, found: &mut Vec<H::Node>) {
        for child in host.children(node) {
            if host.kind(&child) != NodeKind::Element {
                continue;
            }
            let tag = host.tag_name(&child).unwrap_or_default();
            if tag.eq_ignore_ascii_case(&self.config.root_tag)
                && host.attribute(&child, &self.config.root_attribute).as_deref()
                    == Some(self.config.root_marker.as_str())
            {
                found.push(child);
            } else if !self.config.is_directive_tag(&tag) {
                self.discover(host, &child, found);
            }
        }
    }

    /// Mount one root and render it.
    ///
    /// Boundary markers are inserted directly after `node`, and the root
    /// subscribes to writes of its payload attribute. Mounting an
    /// already-mounted node returns its existing id without rendering.
    ///
    /// # Errors
    ///
    /// `DetachedRoot` if `node` has no parent, `DepthExceeded` if its
    /// template is too deep, or any error from the initial render. After a
    /// render error the root remains mounted.
    pub fn mount(&mut self, host: &mut H, node: &H::Node) -> Result<RootId> {
        if let Some(id) = self.root_of(node) {
            return Ok(id);
        }

        let parent = host.parent(node).ok_or(SproutError::DetachedRoot)?;
        let template = Template::read(host, node, &self.config)?;

        let start = host.create_comment(&self.config.root_markers.0);
        let end = host.create_comment(&self.config.root_markers.1);
        let after = host.next_sibling(node);
        host.insert_before(&parent, &start, after.as_ref());
        host.insert_before(&parent, &end, after.as_ref());

        let id = RootId(self.next_id);
        self.next_id += 1;
        let observer = host.observe(
            node,
            &self.config.payload_attribute,
            Notifier::new(id, self.sender.clone()),
        );

        debug!(%id, loops = template.loop_count, "mounted root");
        self.roots.insert(
            id,
            Root {
                node: node.clone(),
                template,
                start,
                end,
                raw: None,
                loops: LoopTable::default(),
                observer,
            },
        );

        self.render(host, id)?;
        Ok(id)
    }

    /// Tear a root down: stop observing it, remove its output and markers,
    /// and drop its state.
    pub fn unmount(&mut self, host: &mut H, id: RootId) -> Result<()> {
        let root = self
            .roots
            .shift_remove(&id)
            .ok_or(SproutError::UnknownRoot(id))?;

        host.unobserve(root.observer);
        clear_between(host, &root.start, &root.end);
        host.remove(&root.start);
        host.remove(&root.end);
        debug!(%id, "unmounted root");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Rendering
    // ═══════════════════════════════════════════════════════════════════

    /// Render a root if its payload text changed since the last render.
    ///
    /// A missing payload attribute reads as `null`.
    ///
    /// # Errors
    ///
    /// `Payload` if the text is not valid JSON. The previous output and the
    /// cached payload are left untouched, so the next valid payload is
    /// compared against the last one that rendered.
    pub fn render(&mut self, host: &mut H, id: RootId) -> Result<RenderOutcome> {
        let config = &self.config;
        let root = self
            .roots
            .get_mut(&id)
            .ok_or(SproutError::UnknownRoot(id))?;

        let raw = host
            .attribute(&root.node, &config.payload_attribute)
            .unwrap_or_else(|| "null".to_string());
        if root.raw.as_deref() == Some(raw.as_str()) {
            debug!(%id, "payload unchanged, skipping render");
            return Ok(RenderOutcome::Unchanged);
        }

        let data: Value = serde_json::from_str(&raw).map_err(|source| {
            warn!(%id, error = %source, "payload is not valid JSON");
            SproutError::Payload { root: id, source }
        })?;

        let parent = match host.parent(&root.end) {
            Some(parent) => parent,
            None => {
                let parent = host.parent(&root.node).ok_or(SproutError::DetachedRoot)?;
                let after = host.next_sibling(&root.node);
                host.insert_before(&parent, &root.start, after.as_ref());
                host.insert_before(&parent, &root.end, after.as_ref());
                parent
            }
        };

        let fragment = host.create_fragment();
        let mut env = Environment::with_current(data);
        Hydrator::new(host, config, &mut root.loops).hydrate_all(
            &root.template.children,
            &fragment,
            &mut env,
        )?;

        clear_between(host, &root.start, &root.end);
        host.insert_before(&parent, &fragment, Some(&root.end));
        root.raw = Some(raw);

        debug!(%id, loops = root.loops.len(), "rendered root");
        Ok(RenderOutcome::Rendered)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Notifications
    // ═══════════════════════════════════════════════════════════════════

    /// Drain queued notifications, one id per root in arrival order.
    ///
    /// Notifications for roots that have since been unmounted are dropped.
    pub fn pending(&mut self) -> Vec<RootId> {
        let mut ids = IndexSet::new();
        while let Ok(id) = self.receiver.try_recv() {
            ids.insert(id);
        }
        self.live(ids)
    }

    /// Wait until at least one notification is queued, then drain the
    /// queue like [`pending`](Self::pending).
    pub async fn changed(&mut self) -> Vec<RootId> {
        let mut ids = IndexSet::new();
        if let Some(id) = self.receiver.recv().await {
            ids.insert(id);
        }
        while let Ok(id) = self.receiver.try_recv() {
            ids.insert(id);
        }
        self.live(ids)
    }

    fn live(&self, ids: IndexSet<RootId>) -> Vec<RootId> {
        ids.into_iter()
            .filter(|id| self.roots.contains_key(id))
            .collect()
    }

    /// Render every root with a pending notification.
    ///
    /// Each root renders independently: one root's failure is reported in
    /// its entry and does not stop the others.
    pub fn flush(&mut self, host: &mut H) -> Vec<(RootId, Result<RenderOutcome>)> {
        self.pending()
            .into_iter()
            .map(|id| (id, self.render(host, id)))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Introspection
    // ═══════════════════════════════════════════════════════════════════

    /// Ids of all mounted roots, in mount order.
    pub fn roots(&self) -> Vec<RootId> {
        self.roots.keys().copied().collect()
    }

    /// The root mounted on `node`, if any.
    pub fn root_of(&self, node: &H::Node) -> Option<RootId> {
        self.roots
            .iter()
            .find(|(_, root)| root.node == *node)
            .map(|(id, _)| *id)
    }

    /// The payload text of the last successful render.
    pub fn cached_payload(&self, id: RootId) -> Option<&str> {
        self.roots.get(&id)?.raw.as_deref()
    }

    /// The root's start and end markers.
    pub fn markers(&self, id: RootId) -> Option<(H::Node, H::Node)> {
        let root = self.roots.get(&id)?;
        Some((root.start.clone(), root.end.clone()))
    }

    /// Nodes currently in the root's output region, in order.
    pub fn output(&self, host: &H, id: RootId) -> Vec<H::Node> {
        let Some(root) = self.roots.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut next = host.next_sibling(&root.start);
        while let Some(node) = next {
            if node == root.end {
                break;
            }
            next = host.next_sibling(&node);
            out.push(node);
        }
        out
    }

    /// Keys held by a top-level (not nested) loop, by slot.
    pub fn loop_keys(&self, id: RootId, slot: usize) -> Vec<LoopKey> {
        self.top_level_loop(id, slot)
            .map(|state| state.keys())
            .unwrap_or_default()
    }

    /// Owned nodes of a top-level loop, by slot.
    pub fn owned_nodes(&self, id: RootId, slot: usize) -> Vec<H::Node> {
        self.top_level_loop(id, slot)
            .map(|state| state.owned_nodes())
            .unwrap_or_default()
    }

    /// Number of loop states (including nested instances) a root holds.
    pub fn loop_instances(&self, id: RootId) -> usize {
        self.roots.get(&id).map_or(0, |root| root.loops.len())
    }

    fn top_level_loop(
        &self,
        id: RootId,
        slot: usize,
    ) -> Option<&crate::reconcile::LoopState<H::Node>> {
        self.roots
            .get(&id)?
            .loops
            .iter()
            .find(|(instance, _)| instance.slot == slot && instance.scope.is_empty())
            .map(|(_, state)| state)
    }
}

/// Remove every node strictly between `start` and `end`.
fn clear_between<H: Host>(host: &mut H, start: &H::Node, end: &H::Node) {
    let mut next = host.next_sibling(start);
    while let Some(node) = next {
        if node == *end {
            break;
        }
        next = host.next_sibling(&node);
        host.remove(&node);
    }
}
