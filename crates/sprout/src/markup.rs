//! Markup fragments for populating the reference document
//!
//! Tokenizing (tags, attributes, character references, comments) is done by
//! `html5gum`; this module only builds the tree. Tree building is strict
//! rather than HTML5-forgiving: a closing tag must match the innermost open
//! element and every element must be closed, except void elements and
//! self-closing tags.

use html5gum::{State, Token, Tokenizer};

use crate::error::{Result, SproutError};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    /// An element
    Element {
        /// Lower-cased tag name
        tag: String,
        /// Attributes ordered by name
        attributes: Vec<(String, String)>,
        /// Child nodes
        children: Vec<MarkupNode>,
    },
    /// Text content (character references decoded)
    Text(String),
    /// Comment content
    Comment(String),
}

/// Whether `tag` is a void element.
pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

struct OpenElement {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<MarkupNode>,
}

impl OpenElement {
    fn close(self) -> MarkupNode {
        MarkupNode::Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Parse a markup fragment into a list of top-level nodes.
///
/// # Errors
///
/// Returns `SproutError::Markup` for tokenizer errors (unterminated
/// comments or tags, stray `<`), mismatched or unexpected closing tags, and
/// elements left open at the end of input.
pub fn parse_fragment(input: &str) -> Result<Vec<MarkupNode>> {
    let mut tokenizer = Tokenizer::new(input);
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut top = Vec::new();

    while let Some(token) = tokenizer.next() {
        let token = token.map_err(|_| SproutError::markup("tokenizer error"))?;

        match token {
            Token::StartTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                let mut attributes: Vec<(String, String)> = tag
                    .attributes
                    .iter()
                    .map(|(k, v)| {
                        (
                            String::from_utf8_lossy(k).into_owned(),
                            String::from_utf8_lossy(v).into_owned(),
                        )
                    })
                    .collect();
                attributes.sort();

                let open = OpenElement {
                    tag: name,
                    attributes,
                    children: Vec::new(),
                };
                if tag.self_closing || is_void_element(&open.tag) {
                    attach(&mut stack, &mut top, open.close());
                } else {
                    match open.tag.as_str() {
                        "script" | "style" => tokenizer.set_state(State::ScriptData),
                        "textarea" | "title" => tokenizer.set_state(State::RcData),
                        _ => {}
                    }
                    stack.push(open);
                }
            }
            Token::EndTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                let open = stack
                    .pop()
                    .ok_or_else(|| SproutError::markup(format!("unexpected </{}>", name)))?;
                if open.tag != name {
                    return Err(SproutError::markup(format!(
                        "expected </{}>, found </{}>",
                        open.tag, name
                    )));
                }
                attach(&mut stack, &mut top, open.close());
            }
            Token::String(text) => {
                let text = String::from_utf8_lossy(&text);
                let siblings = match stack.last_mut() {
                    Some(open) => &mut open.children,
                    None => &mut top,
                };
                match siblings.last_mut() {
                    Some(MarkupNode::Text(previous)) => previous.push_str(&text),
                    _ => siblings.push(MarkupNode::Text(text.into_owned())),
                }
            }
            Token::Comment(text) => {
                let comment = MarkupNode::Comment(String::from_utf8_lossy(&text).into_owned());
                attach(&mut stack, &mut top, comment);
            }
            Token::Doctype(_) => {}
            Token::Error(error) => {
                return Err(SproutError::markup(format!("{:?}", error)));
            }
        }
    }

    match stack.pop() {
        Some(open) => Err(SproutError::markup(format!("unclosed <{}>", open.tag))),
        None => Ok(top),
    }
}

fn attach(stack: &mut [OpenElement], top: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}
