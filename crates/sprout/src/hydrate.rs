//! Template hydration
//!
//! Walks a static [`Template`](crate::Template) together with an
//! [`Environment`] and appends concrete nodes to the host. Loop directives
//! are handed to the keyed reconciler in [`reconcile`](crate::reconcile),
//! which calls back into the hydrator for each item's body.

use tracing::trace;

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::{Result, SproutError};
use crate::expression::{evaluate_owned, interpolation};
use crate::host::Host;
use crate::reconcile::{LoopTable, ScopePath};
use crate::template::{Directive, TemplateNode};
use crate::value::{to_text, truthy};

/// Turns template nodes into host nodes.
///
/// A hydrator borrows the host and one root's loop side table for the
/// duration of a single render pass.
pub struct Hydrator<'a, H: Host> {
    pub(crate) host: &'a mut H,
    pub(crate) config: &'a EngineConfig,
    pub(crate) loops: &'a mut LoopTable<H::Node>,

    /// Keys of the loop items currently being hydrated, outermost first
    pub(crate) scope: ScopePath,

    depth: usize,
}

impl<'a, H: Host> Hydrator<'a, H> {
    /// Create a hydrator for one render pass.
    pub fn new(
        host: &'a mut H,
        config: &'a EngineConfig,
        loops: &'a mut LoopTable<H::Node>,
    ) -> Self {
        Self {
            host,
            config,
            loops,
            scope: Vec::new(),
            depth: 0,
        }
    }

    /// Hydrate a sequence of sibling nodes into `parent`.
    pub fn hydrate_all(
        &mut self,
        nodes: &[TemplateNode],
        parent: &H::Node,
        env: &mut Environment,
    ) -> Result<()> {
        for node in nodes {
            self.hydrate(node, parent, env)?;
        }
        Ok(())
    }

    /// Hydrate one template node, appending zero or more nodes to `parent`.
    ///
    /// # Errors
    ///
    /// Returns `DepthExceeded` when nesting exceeds `max_depth`.
    pub fn hydrate(
        &mut self,
        node: &TemplateNode,
        parent: &H::Node,
        env: &mut Environment,
    ) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(SproutError::DepthExceeded {
                depth: self.depth + 1,
                max: self.config.max_depth,
            });
        }
        self.depth += 1;
        let result = self.dispatch(node, parent, env);
        self.depth -= 1;
        result
    }

    fn dispatch(
        &mut self,
        node: &TemplateNode,
        parent: &H::Node,
        env: &mut Environment,
    ) -> Result<()> {
        match node {
            TemplateNode::Text(raw) => {
                let text = match interpolation(raw) {
                    Some(expr) => to_text(evaluate_owned(expr, env).as_ref()),
                    None => raw.clone(),
                };
                let created = self.host.create_text(&text);
                self.host.append_child(parent, &created);
                Ok(())
            }

            TemplateNode::Element {
                tag,
                attributes,
                children,
            } => {
                let element = self.host.create_element(tag);
                for (name, value) in attributes {
                    let value = match interpolation(value) {
                        Some(expr) => to_text(evaluate_owned(expr, env).as_ref()),
                        None => value.clone(),
                    };
                    self.host.set_attribute(&element, name, &value);
                }
                self.hydrate_all(children, &element, env)?;
                self.host.append_child(parent, &element);
                Ok(())
            }

            TemplateNode::Directive {
                directive,
                children,
            } => self.directive(directive, children, parent, env),

            TemplateNode::Comment(text) => {
                let created = self.host.create_comment(text);
                self.host.append_child(parent, &created);
                Ok(())
            }
        }
    }

    fn directive(
        &mut self,
        directive: &Directive,
        children: &[TemplateNode],
        parent: &H::Node,
        env: &mut Environment,
    ) -> Result<()> {
        match directive {
            Directive::If(condition) => {
                let pass = truthy(evaluate_owned(condition, env).as_ref());
                trace!(%condition, pass, "if");
                if pass {
                    self.hydrate_all(children, parent, env)?;
                }
                Ok(())
            }
            Directive::Unless(condition) => {
                let pass = !truthy(evaluate_owned(condition, env).as_ref());
                trace!(%condition, pass, "unless");
                if pass {
                    self.hydrate_all(children, parent, env)?;
                }
                Ok(())
            }
            Directive::For(directive) => self.reconcile(directive, children, parent, env),
            Directive::Bare => self.hydrate_all(children, parent, env),
        }
    }
}
