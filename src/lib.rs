//! # bjs
//!
//! A reactive binding engine for element trees: plain data is wrapped into an
//! observable scope tree, directive-annotated elements become placeholders
//! that re-materialize their fragments whenever bound data changes, and form
//! controls write user input back into the model.
//!
//! ## Core Systems
//!
//! - **[`dom`]** — Slotmap-backed element tree, queries, a logos markup reader
//! - **[`value`]** — Tagged value model (scalars, raw data, scope references)
//! - **[`scope`]** — Scope arena: lazy wrapping, observed mutations, upward walks
//! - **[`reactive`]** — Watcher registry and change propagation
//! - **[`template`]** — Placeholders, directive and injector registries, render passes
//! - **[`event`]** — Event listeners and two-way binding
//! - **[`engine`]** — Engine lifecycle and data API
//! - **[`config`]** — Attribute names, lifecycle events, recursion ceilings
//! - **[`testing`]** — Headless Pilot and snapshot outlines

// Foundation
pub mod dom;
pub mod error;
pub mod value;

// Data model
pub mod reactive;
pub mod scope;

// Rendering and input
pub mod event;
pub mod template;

// Engine
pub mod config;
pub mod engine;

// Test support
pub mod testing;

pub use config::EngineConfig;
pub use engine::{autoload, load, Engine, EngineBuilder};
pub use error::Error;
pub use value::Value;
