//! Keyed loop reconciliation
//!
//! Each loop occurrence keeps a [`LoopState`]: a pair of comment markers
//! delimiting its output and an ordered map from item key to the nodes that
//! item rendered. On every pass, existing entries are moved into the new
//! order and rebuilt only when their snapshot changed; new keys are
//! hydrated; keys that disappeared are removed.
//!
//! A changed item is not cleared and hydrated again in place. Its body is
//! hydrated into a scratch fragment and the result is transplanted onto the
//! item's owned node, so the owned node keeps its identity while its
//! attributes and children are replaced. When the rebuilt output starts
//! with a different kind of node or a different tag, the owned node is
//! dropped and the new one takes its place; identity is not preserved
//! across such a shape change.
//!
//! Keys come from the `data-key` expression, else the item's identity
//! field, else the item's position. Positional keys make identity follow
//! the index rather than the item, so lists that reorder or insert anywhere
//! but the end must supply a key.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::Result;
use crate::expression::{evaluate, evaluate_owned};
use crate::host::{Host, NodeKind};
use crate::hydrate::Hydrator;
use crate::template::{LoopDirective, TemplateNode};
use crate::value::{number_text, snapshot};

/// Identity of one loop item.
///
/// Normalised so that equal JSON values (`1` and `1.0`, an index and an
/// equal numeric id) produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoopKey {
    /// The key expression resolved to nothing
    Absent,
    /// `null`
    Null,
    /// A boolean key
    Bool(bool),
    /// A number, in canonical text form
    Number(String),
    /// A string key
    String(String),
    /// An array or object key, as compact JSON
    Structured(String),
}

impl LoopKey {
    /// Key for a resolved key value.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None => LoopKey::Absent,
            Some(Value::Null) => LoopKey::Null,
            Some(Value::Bool(b)) => LoopKey::Bool(*b),
            Some(Value::Number(n)) => LoopKey::Number(number_text(n)),
            Some(Value::String(s)) => LoopKey::String(s.clone()),
            Some(other) => LoopKey::Structured(other.to_string()),
        }
    }

    /// Positional key.
    pub fn index(index: usize) -> Self {
        LoopKey::Number(index.to_string())
    }
}

impl fmt::Display for LoopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKey::Absent => write!(f, "<absent>"),
            LoopKey::Null => write!(f, "null"),
            LoopKey::Bool(b) => write!(f, "{}", b),
            LoopKey::Number(n) => write!(f, "{}", n),
            LoopKey::String(s) => write!(f, "{:?}", s),
            LoopKey::Structured(json) => write!(f, "{}", json),
        }
    }
}

/// Chain of `(loop slot, item key)` pairs enclosing a loop occurrence.
pub type ScopePath = Vec<(usize, LoopKey)>;

/// Identifies one loop occurrence within a root.
///
/// A loop nested inside another loop gets a separate instance per outer
/// item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoopInstance {
    /// Document-order slot of the loop directive
    pub slot: usize,

    /// Enclosing loop items
    pub scope: ScopePath,
}

impl LoopInstance {
    /// Whether this instance lies inside the item identified by `prefix`.
    pub fn is_within(&self, prefix: &[(usize, LoopKey)]) -> bool {
        self.scope.starts_with(prefix)
    }
}

/// The nodes one loop item rendered.
#[derive(Debug, Clone)]
pub struct LoopEntry<N> {
    /// The owned node: first element of the item's output, or its first
    /// node of any kind. `None` when the body rendered nothing.
    pub node: Option<N>,

    /// Every top-level node the item rendered, in order (includes `node`)
    pub nodes: Vec<N>,

    /// Snapshot of the item the nodes were rendered from
    pub snapshot: String,
}

/// Persistent state of one loop occurrence.
#[derive(Debug)]
pub struct LoopState<N> {
    /// Start marker
    pub start: N,

    /// End marker; items are always inserted directly before it
    pub end: N,

    /// Entries by key
    pub entries: IndexMap<LoopKey, LoopEntry<N>>,
}

impl<N: Clone> LoopState<N> {
    /// Create state with fresh, detached markers.
    pub fn new<H: Host<Node = N>>(host: &mut H, config: &EngineConfig) -> Self {
        Self {
            start: host.create_comment(&config.loop_markers.0),
            end: host.create_comment(&config.loop_markers.1),
            entries: IndexMap::new(),
        }
    }

    /// Keys present after the last pass, in first-seen order.
    pub fn keys(&self) -> Vec<LoopKey> {
        self.entries.keys().cloned().collect()
    }

    /// Owned nodes of all entries that rendered something.
    pub fn owned_nodes(&self) -> Vec<N> {
        self.entries
            .values()
            .filter_map(|entry| entry.node.clone())
            .collect()
    }
}

/// Side table of loop states for one root.
pub type LoopTable<N> = IndexMap<LoopInstance, LoopState<N>>;

#[derive(Debug, Default)]
struct Stats {
    created: usize,
    moved: usize,
    patched: usize,
    removed: usize,
}

impl<'a, H: Host> Hydrator<'a, H> {
    /// Reconcile one loop directive into `parent`.
    ///
    /// Malformed loop grammar and sequences that are absent or not arrays
    /// render as empty loops.
    pub fn reconcile(
        &mut self,
        directive: &LoopDirective,
        body: &[TemplateNode],
        parent: &H::Node,
        env: &mut Environment,
    ) -> Result<()> {
        let instance = LoopInstance {
            slot: directive.slot,
            scope: self.scope.clone(),
        };
        let mut state = match self.loops.shift_remove(&instance) {
            Some(state) => state,
            None => LoopState::new(&mut *self.host, self.config),
        };

        let result = self.reconcile_items(directive, body, parent, env, &mut state);
        self.loops.insert(instance, state);
        result
    }

    fn reconcile_items(
        &mut self,
        directive: &LoopDirective,
        body: &[TemplateNode],
        parent: &H::Node,
        env: &mut Environment,
        state: &mut LoopState<H::Node>,
    ) -> Result<()> {
        if self.host.parent(&state.start).as_ref() != Some(parent) {
            self.host.append_child(parent, &state.start);
            self.host.append_child(parent, &state.end);
        }

        let mut stats = Stats::default();
        let mut seen = HashSet::new();

        if let Some(binding) = &directive.binding {
            let items = evaluate(&binding.sequence, env)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for (index, item) in items.iter().enumerate() {
                let mut item_env = env.scope_guard();
                item_env.define(binding.item.as_str(), item.clone());
                item_env.set_current(item.clone());

                let key = self.loop_key(directive, item, index, &item_env);
                if !seen.insert(key.clone()) {
                    trace!(%key, slot = directive.slot, "duplicate loop key, later item wins");
                }

                self.scope.push((directive.slot, key.clone()));
                let placed = self.place(
                    state,
                    key,
                    snapshot(item),
                    body,
                    parent,
                    &mut item_env,
                    &mut stats,
                );
                self.scope.pop();
                placed?;
            }
        }

        let stale: Vec<LoopKey> = state
            .entries
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(entry) = state.entries.shift_remove(&key) {
                for node in &entry.nodes {
                    self.host.remove(node);
                }
                let mut prefix = self.scope.clone();
                prefix.push((directive.slot, key));
                self.loops.retain(|instance, _| !instance.is_within(&prefix));
                stats.removed += 1;
            }
        }

        trace!(
            slot = directive.slot,
            depth = self.scope.len(),
            created = stats.created,
            moved = stats.moved,
            patched = stats.patched,
            removed = stats.removed,
            "reconciled loop"
        );
        Ok(())
    }

    fn loop_key(
        &self,
        directive: &LoopDirective,
        item: &Value,
        index: usize,
        env: &Environment,
    ) -> LoopKey {
        match &directive.key {
            Some(expr) => LoopKey::from_value(evaluate_owned(expr, env).as_ref()),
            None => match item {
                Value::Object(map) if map.contains_key(&self.config.identity_field) => {
                    LoopKey::from_value(map.get(&self.config.identity_field))
                }
                _ => LoopKey::index(index),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn place(
        &mut self,
        state: &mut LoopState<H::Node>,
        key: LoopKey,
        snapshot: String,
        body: &[TemplateNode],
        parent: &H::Node,
        env: &mut Environment,
        stats: &mut Stats,
    ) -> Result<()> {
        match state.entries.get_mut(&key) {
            Some(entry) if entry.node.is_some() => {
                if entry.snapshot != snapshot {
                    self.patch(entry, body, env)?;
                    entry.snapshot = snapshot;
                    stats.patched += 1;
                }
                for node in &entry.nodes {
                    self.host.insert_before(parent, node, Some(&state.end));
                }
                stats.moved += 1;
            }
            _ => {
                let fragment = self.host.create_fragment();
                self.hydrate_all(body, &fragment, env)?;
                let nodes = self.host.children(&fragment);
                let node = self.primary(&nodes);
                self.host.insert_before(parent, &fragment, Some(&state.end));
                state.entries.insert(
                    key,
                    LoopEntry {
                        node,
                        nodes,
                        snapshot,
                    },
                );
                stats.created += 1;
            }
        }
        Ok(())
    }

    /// Rebuild a changed entry while keeping its owned node.
    ///
    /// Nodes that come back from the rebuild unchanged (the output of a
    /// nested loop placed directly in the body) are adopted as they are.
    fn patch(
        &mut self,
        entry: &mut LoopEntry<H::Node>,
        body: &[TemplateNode],
        env: &mut Environment,
    ) -> Result<()> {
        let Some(owned) = entry.node.clone() else {
            return Ok(());
        };

        let scratch = self.host.create_fragment();
        self.hydrate_all(body, &scratch, env)?;
        let fresh = self.host.children(&scratch);
        let candidate = self.primary(&fresh);

        let keep_owned = match &candidate {
            Some(candidate) => {
                !fresh.contains(&owned)
                    && !entry.nodes.contains(candidate)
                    && self.same_shape(&owned, candidate)
            }
            None => false,
        };

        for node in &entry.nodes {
            if !fresh.contains(node) && !(keep_owned && *node == owned) {
                self.host.remove(node);
            }
        }

        match candidate {
            Some(candidate) if keep_owned => {
                self.transplant(&owned, &candidate);
                entry.nodes = fresh
                    .into_iter()
                    .map(|node| if node == candidate { owned.clone() } else { node })
                    .collect();
            }
            candidate => {
                if candidate.as_ref() != Some(&owned) {
                    trace!(?owned, ?candidate, "loop item changed owned node");
                }
                entry.node = candidate;
                entry.nodes = fresh;
            }
        }
        Ok(())
    }

    /// First element node, else first node.
    fn primary(&self, nodes: &[H::Node]) -> Option<H::Node> {
        nodes
            .iter()
            .find(|node| self.host.kind(node) == NodeKind::Element)
            .or_else(|| nodes.first())
            .cloned()
    }

    fn same_shape(&self, a: &H::Node, b: &H::Node) -> bool {
        let kind = self.host.kind(a);
        kind == self.host.kind(b)
            && (kind != NodeKind::Element || self.host.tag_name(a) == self.host.tag_name(b))
    }

    /// Make `owned` look like `candidate`: same attributes, and the
    /// candidate's children moved in place of its own.
    fn transplant(&mut self, owned: &H::Node, candidate: &H::Node) {
        match self.host.kind(owned) {
            NodeKind::Element => {
                let fresh = self.host.attributes(candidate);
                for (name, _) in self.host.attributes(owned) {
                    if !fresh.iter().any(|(fresh_name, _)| *fresh_name == name) {
                        self.host.remove_attribute(owned, &name);
                    }
                }
                for (name, value) in &fresh {
                    if self.host.attribute(owned, name).as_ref() != Some(value) {
                        self.host.set_attribute(owned, name, value);
                    }
                }

                for child in self.host.children(owned) {
                    self.host.remove(&child);
                }
                for child in self.host.children(candidate) {
                    self.host.append_child(owned, &child);
                }
            }
            NodeKind::Text | NodeKind::Comment => {
                let text = self.host.text(candidate).unwrap_or_default();
                self.host.set_text(owned, &text);
            }
            NodeKind::Fragment => {}
        }
    }
}
