//! Placeholders, directives and injectors.
//!
//! At startup every element carrying a registered directive attribute is
//! captured into an inert `<template type="bjs">` placeholder. Each render
//! pass asks the directive what fragment the placeholder should materialize,
//! swaps the previous fragment out, and re-runs injectors.

mod compile;
pub mod registry;
mod render;

pub use registry::{Directive, DirectiveCall, Injector, Plugins, Rendered};

pub(crate) use render::RenderState;
