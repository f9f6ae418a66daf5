//! Events and two-way binding.

pub mod binding;
pub mod listener;

pub use binding::is_bindable;
pub use listener::{Event, EventListeners, EventTarget, Listener};
