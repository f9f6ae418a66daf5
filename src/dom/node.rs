//! Node types: NodeId, NodeKind, NodeData.

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a DOM node. Copy, lightweight (u64).
    pub struct NodeId;
}

/// Tags whose elements carry a value property (form controls).
const CONTROL_TAGS: &[&str] = &["input", "textarea", "select"];

/// What kind of node a [`NodeData`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root.
    Document,
    /// A regular element with a tag and attributes.
    Element,
    /// A text node.
    Text,
    /// An inert template whose content lives outside the tree.
    Template,
}

/// Data associated with a single DOM node.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Element tag (`"#document"` and `"#text"` for the non-element kinds).
    pub tag: String,
    /// Attributes in source order.
    pub attributes: Vec<(String, String)>,
    /// Character data for text nodes.
    pub text: String,
    /// Value property of form controls. `None` for every other element.
    pub value: Option<String>,
    /// Template content: a detached node that is never part of the live tree.
    pub content: Option<NodeId>,
}

impl NodeData {
    /// Create element data for `tag`. Form controls start with an empty value.
    pub fn element(tag: impl Into<String>) -> Self {
        let tag = tag.into().to_ascii_lowercase();
        let value = CONTROL_TAGS.contains(&tag.as_str()).then(String::new);
        Self {
            kind: NodeKind::Element,
            tag,
            attributes: Vec::new(),
            text: String::new(),
            value,
            content: None,
        }
    }

    /// Create a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            tag: "#text".to_owned(),
            attributes: Vec::new(),
            text: text.into(),
            value: None,
            content: None,
        }
    }

    /// Create an empty template node.
    pub fn template() -> Self {
        Self {
            kind: NodeKind::Template,
            tag: "template".to_owned(),
            ..Self::element("template")
        }
    }

    /// Create the document root.
    pub fn document() -> Self {
        Self {
            kind: NodeKind::Document,
            tag: "#document".to_owned(),
            ..Self::text("")
        }
    }

    /// Set an attribute (builder).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Whether this node is an element or a template (both carry attributes).
    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element | NodeKind::Template)
    }

    /// Whether this node is a template.
    pub fn is_template(&self) -> bool {
        self.kind == NodeKind::Template
    }

    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the attribute is present (even with an empty value).
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n == name)
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(pos).1)
    }
}
