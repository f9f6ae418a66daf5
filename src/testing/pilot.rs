//! Pilot: programmatic interaction with a headless engine.
//!
//! The `Pilot` wraps an [`Engine`] and provides methods to simulate user
//! input on bound controls, mutate data by dotted path, and dump the document
//! for snapshot testing.

use crate::dom::{parse_markup, to_markup, NodeId};
use crate::engine::{Engine, EngineBuilder};
use crate::error::Error;
use crate::event::EventTarget;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless engine driver for testing.
///
/// # Examples
///
/// ```
/// use bjs::engine::EngineBuilder;
/// use bjs::testing::Pilot;
///
/// let mut pilot = Pilot::from_markup(EngineBuilder::new(), r#"<input bbind="name">"#, serde_json::json!({})).unwrap();
/// let input = pilot.query("input").unwrap();
/// pilot.type_text(input, "hi").unwrap();
/// assert_eq!(pilot.get("name"), Some("hi".into()));
/// ```
pub struct Pilot {
    engine: Engine,
}

impl Pilot {
    /// Drive an existing engine.
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Parse `markup` and build an engine over it.
    pub fn from_markup(builder: EngineBuilder, markup: &str, data: impl Into<Value>) -> Result<Self, Error> {
        let dom = parse_markup(markup)?;
        Ok(Self::new(builder.build(dom, data)?))
    }

    // ── Input simulation ─────────────────────────────────────────────

    /// Type `text` into a control one character at a time, firing the input
    /// event after each keystroke.
    pub fn type_text(&mut self, control: NodeId, text: &str) -> Result<(), Error> {
        for ch in text.chars() {
            let mut current = self.engine.control_value(control).unwrap_or_default();
            current.push(ch);
            self.engine.set_control_value(control, &current);
            self.fire_input(control)?;
        }
        Ok(())
    }

    /// Replace a control's value and fire the input event once.
    pub fn input(&mut self, control: NodeId, text: &str) -> Result<(), Error> {
        self.engine.set_control_value(control, text);
        self.fire_input(control)
    }

    /// Delete the last character of a control's value, like a backspace.
    pub fn backspace(&mut self, control: NodeId) -> Result<(), Error> {
        let mut current = self.engine.control_value(control).unwrap_or_default();
        current.pop();
        self.input(control, &current)
    }

    fn fire_input(&mut self, control: NodeId) -> Result<(), Error> {
        let kind = self.engine.config().input_event.clone();
        self.engine.dispatch_event(EventTarget::Node(control), &kind)
    }

    // ── Data ─────────────────────────────────────────────────────────

    /// Resolve a dotted path from the root scope.
    pub fn get(&mut self, path: &str) -> Option<Value> {
        let root = self.engine.root_scope();
        self.engine.resolve(root, path)
    }

    /// Assign a dotted path from the root scope. Intermediate segments must
    /// already resolve to scopes; otherwise nothing happens.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), Error> {
        let root = self.engine.root_scope();
        let (scope, prop) = match path.rsplit_once('.') {
            Some((parent, prop)) => match self.engine.resolve(root, parent).and_then(|v| v.as_scope()) {
                Some(scope) => (scope, prop),
                None => return Ok(()),
            },
            None => (root, path),
        };
        self.engine.set(scope, prop, value)
    }

    // ── Query ────────────────────────────────────────────────────────

    /// First live node with `tag`.
    pub fn query(&self, tag: &str) -> Option<NodeId> {
        self.engine.dom().query_tag(tag)
    }

    /// Live nodes whose attribute `name` equals `value`, in document order.
    pub fn query_attr(&self, name: &str, value: &str) -> Vec<NodeId> {
        let dom = self.engine.dom();
        let Some(root) = dom.root() else {
            return Vec::new();
        };
        dom.query_attr(root, name)
            .into_iter()
            .filter(|&id| dom.attr(id, name) == Some(value))
            .collect()
    }

    /// Text content of a node.
    pub fn text(&self, node: NodeId) -> String {
        self.engine.dom().text_content(node)
    }

    /// Compact markup of the whole document.
    pub fn markup(&self) -> String {
        self.engine
            .dom()
            .root()
            .map(|root| to_markup(self.engine.dom(), root))
            .unwrap_or_default()
    }

    /// Indented outline of the whole document.
    pub fn outline(&self) -> String {
        self.engine
            .dom()
            .root()
            .map(|root| super::snapshot::outline(self.engine.dom(), root))
            .unwrap_or_default()
    }

    // ── Access ───────────────────────────────────────────────────────

    /// Borrow the underlying engine immutably.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Borrow the underlying engine mutably.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }
}

// ===========================================================================
// Tests
// ===========================================================================
