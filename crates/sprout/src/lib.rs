//! # Sprout
//!
//! A directive template engine that renders a JSON payload into a host
//! tree and keeps the output in sync as the payload changes.
//!
//! A root is a `<template is="🌱">` carrying its data in a `data-json`
//! attribute. Its content is an ordinary markup tree with three kinds of
//! directive containers (`data-if`, `data-unless`, `data-for`) and
//! whole-content `{path}` interpolation in text and attribute values.
//! Writing a new payload re-renders the root; loop items are matched by
//! key so their nodes survive reorders and unchanged items are not rebuilt.
//!
//! ## Architecture
//!
//! - **Expression**: dotted-path lookups against an [`Environment`]
//! - **Template**: the static tree read once per root, directives classified
//! - **Hydrator**: template + environment → host nodes
//! - **Reconciler**: keyed, identity-preserving loop updates
//! - **Engine**: per-root lifecycle, change detection and notifications
//!
//! The engine works against any tree implementing [`Host`];
//! [`dom::Document`] is an in-memory implementation.
//!
//! ## Tracing
//!
//! Mounts, renders and skipped renders are logged at `debug`, per-loop
//! statistics at `trace`. Install a `tracing` subscriber to see them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dom;
pub mod engine;
pub mod environment;
pub mod error;
pub mod expression;
pub mod host;
pub mod hydrate;
pub mod markup;
pub mod reconcile;
pub mod template;
pub mod value;

// Re-export main types
pub use config::EngineConfig;
pub use engine::{Engine, RenderOutcome, RootId};
pub use environment::{Binding, Environment, ScopeGuard};
pub use error::{Result, SproutError};
pub use expression::evaluate;
pub use host::{Host, NodeKind, Notifier, ObserverId};
pub use hydrate::Hydrator;
pub use reconcile::{LoopEntry, LoopInstance, LoopKey, LoopState, LoopTable};
pub use template::{Directive, LoopBinding, LoopDirective, Template, TemplateNode};

/// Sprout version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
