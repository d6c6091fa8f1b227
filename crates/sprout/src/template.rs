//! Static template model
//!
//! A root's template is read from the host once, when the root is mounted,
//! and is never mutated afterwards. Directive containers are classified
//! into a [`Directive`] at read time, so precedence between `data-if`,
//! `data-unless` and `data-for` is decided in exactly one place.
//!
//! # Architecture
//!
//! ```text
//! Host subtree → [Template::read] → Template → [Hydrator] → Host output
//!                                      ↑
//!                                      └─ TemplateNode (text | element | directive | comment)
//! ```

use crate::config::EngineConfig;
use crate::error::{Result, SproutError};
use crate::expression::strip_delimiters;
use crate::host::{Host, NodeKind};

/// A root's static template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    /// Top-level nodes, in document order
    pub children: Vec<TemplateNode>,

    /// Number of loop directives (slots `0..loop_count`)
    pub loop_count: usize,
}

/// A node in a template tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    /// Literal text, or a whole-content `{expression}`
    Text(String),

    /// An element copied to the output with interpolated attributes
    Element {
        /// Tag name
        tag: String,
        /// Attributes in document order
        attributes: Vec<(String, String)>,
        /// Child nodes
        children: Vec<TemplateNode>,
    },

    /// A directive container; never appears in output itself
    Directive {
        /// How the children are expanded
        directive: Directive,
        /// The container's content
        children: Vec<TemplateNode>,
    },

    /// A comment, copied verbatim
    Comment(String),
}

/// Classification of a directive container, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Render the children when the expression is truthy
    If(String),

    /// Render the children when the expression is falsy
    Unless(String),

    /// Render the children once per item of a sequence
    For(LoopDirective),

    /// No directive: render the children in place
    Bare,
}

/// A loop directive occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopDirective {
    /// Document-order index of this loop within its root's template
    pub slot: usize,

    /// Parsed `item in sequence`; `None` when the grammar did not match
    pub binding: Option<LoopBinding>,

    /// Explicit key expression, if any
    pub key: Option<String>,
}

/// The `item in sequence` part of a loop directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopBinding {
    /// Name the item is bound to
    pub item: String,

    /// Expression producing the sequence
    pub sequence: String,
}

impl LoopBinding {
    /// Parse `identifier in expression`, with or without braces.
    ///
    /// ```
    /// use sprout::template::LoopBinding;
    ///
    /// let binding = LoopBinding::parse("{user in team.members}").unwrap();
    /// assert_eq!(binding.item, "user");
    /// assert_eq!(binding.sequence, "team.members");
    /// assert_eq!(LoopBinding::parse("users"), None);
    /// ```
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = strip_delimiters(expr);
        let (item, rest) = expr.split_once(char::is_whitespace)?;
        if item.is_empty() || !item.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        let rest = rest.trim_start();
        let sequence = rest.strip_prefix("in")?;
        if !sequence.starts_with(char::is_whitespace) {
            return None;
        }
        let sequence = sequence.trim();
        if sequence.is_empty() {
            return None;
        }
        Some(Self {
            item: item.to_string(),
            sequence: sequence.to_string(),
        })
    }
}

impl Directive {
    /// Classify a container by its attributes. Loop slots are allocated
    /// from `next_slot` in document order.
    pub fn classify(
        attributes: &[(String, String)],
        config: &EngineConfig,
        next_slot: &mut usize,
    ) -> Self {
        let get = |name: &str| {
            attributes
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.clone())
        };

        if let Some(condition) = get(&config.if_attribute) {
            return Directive::If(condition);
        }
        if let Some(condition) = get(&config.unless_attribute) {
            return Directive::Unless(condition);
        }
        if let Some(expr) = get(&config.for_attribute) {
            let slot = *next_slot;
            *next_slot += 1;
            return Directive::For(LoopDirective {
                slot,
                binding: LoopBinding::parse(&expr),
                key: get(&config.key_attribute).filter(|key| !key.trim().is_empty()),
            });
        }
        Directive::Bare
    }
}

impl Template {
    /// Read the template held by `root`'s children.
    ///
    /// # Errors
    ///
    /// Returns `DepthExceeded` when the template nests deeper than
    /// `config.max_depth`.
    pub fn read<H: Host>(host: &H, root: &H::Node, config: &EngineConfig) -> Result<Self> {
        let mut reader = Reader {
            host,
            config,
            next_slot: 0,
        };
        let children = reader.children(root, 1)?;
        Ok(Self {
            children,
            loop_count: reader.next_slot,
        })
    }
}

struct Reader<'a, H: Host> {
    host: &'a H,
    config: &'a EngineConfig,
    next_slot: usize,
}

impl<'a, H: Host> Reader<'a, H> {
    fn children(&mut self, node: &H::Node, depth: usize) -> Result<Vec<TemplateNode>> {
        if depth > self.config.max_depth {
            return Err(SproutError::DepthExceeded {
                depth,
                max: self.config.max_depth,
            });
        }

        let mut out = Vec::new();
        for child in self.host.children(node) {
            match self.host.kind(&child) {
                NodeKind::Text => out.push(TemplateNode::Text(
                    self.host.text(&child).unwrap_or_default(),
                )),
                NodeKind::Comment => out.push(TemplateNode::Comment(
                    self.host.text(&child).unwrap_or_default(),
                )),
                NodeKind::Fragment => out.extend(self.children(&child, depth + 1)?),
                NodeKind::Element => {
                    let tag = self.host.tag_name(&child).unwrap_or_default();
                    let attributes = self.host.attributes(&child);
                    if self.config.is_directive_tag(&tag) {
                        let directive =
                            Directive::classify(&attributes, self.config, &mut self.next_slot);
                        let children = self.children(&child, depth + 1)?;
                        out.push(TemplateNode::Directive {
                            directive,
                            children,
                        });
                    } else {
                        let children = self.children(&child, depth + 1)?;
                        out.push(TemplateNode::Element {
                            tag,
                            attributes,
                            children,
                        });
                    }
                }
            }
        }
        Ok(out)
    }
}
