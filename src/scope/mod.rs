//! Observable data model.
//!
//! Scopes live in a slotmap arena. A scope is either a mapping or a sequence;
//! it knows the scope that reaches it (`parent`), the property name it is
//! reached under (`name`), and the element it governs. Mutations go through
//! [`ScopeStore`] and return a [`Change`] describing what must be propagated.

mod mutate;
mod store;

pub use mutate::MAX_LEN;
pub use store::{Body, Change, PathError, Scope, ScopeId, ScopeStore};
