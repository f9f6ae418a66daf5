//! Watchers and change propagation.
//!
//! - [`WatcherRegistry`] — dotted path → ordered subscribers.
//! - [`WatchEvent`] — what a subscriber sees for one level of a change.
//!
//! Every mutation made through the [`Engine`](crate::engine::Engine) data API
//! funnels into propagation: watchers for each path prefix run from the
//! mutated leaf outward, displaced scopes are released, and a full render
//! pass re-evaluates every attached placeholder.

mod propagate;
pub mod watch;

pub use watch::{WatchEvent, Watcher, WatcherRegistry};
