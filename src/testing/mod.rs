//! Headless testing helpers: Pilot, snapshot outlines.
//!
//! Use the [`Pilot`] to drive an [`Engine`](crate::engine::Engine) the way a
//! user would: typing into bound controls and reading the document back. Use
//! [`outline`] to capture a subtree as plain text for snapshot assertions.

pub mod pilot;
pub mod snapshot;

pub use pilot::Pilot;
pub use snapshot::outline;
