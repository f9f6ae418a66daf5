//! Host element tree: slotmap-backed arena, attribute queries, markup I/O.

pub mod markup;
pub mod node;
pub mod query;
pub mod tree;

pub use markup::{parse_markup, to_markup, MarkupError};
pub use node::{NodeData, NodeId, NodeKind};
pub use query::PLACEHOLDER_TYPE;
pub use tree::Dom;
