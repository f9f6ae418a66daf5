//! Directive and injector tables.

use std::fmt;
use std::rc::Rc;

use crate::dom::NodeId;
use crate::engine::Engine;
use crate::scope::ScopeId;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Arguments of one directive evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DirectiveCall<'a> {
    /// Scope the placeholder is evaluated against.
    pub scope: ScopeId,
    /// The element captured in the placeholder. Directives clone it.
    pub content: Option<NodeId>,
    /// Attribute value the directive was declared with.
    pub expr: &'a str,
    /// `value` returned by the previous evaluation (`Null` the first time).
    pub previous: &'a Value,
    /// Directive name, for functions registered under several names.
    pub directive: &'a str,
}

/// Outcome of a directive evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    /// Remembered and handed back as `previous` next time.
    pub value: Value,
    /// Replace the previously materialized fragment with `elements`.
    pub to_render: bool,
    /// Fragment roots paired with the scope each was rendered against.
    pub elements: Vec<(NodeId, ScopeId)>,
}

impl Rendered {
    /// Replace the fragment with `elements`.
    pub fn render(value: Value, elements: Vec<(NodeId, ScopeId)>) -> Self {
        Self {
            value,
            to_render: true,
            elements,
        }
    }

    /// Keep whatever is currently materialized.
    pub fn keep(value: Value) -> Self {
        Self {
            value,
            to_render: false,
            elements: Vec::new(),
        }
    }
}

/// Decides which fragment a placeholder materializes.
pub type Directive = Rc<dyn for<'a> Fn(&mut Engine, DirectiveCall<'a>) -> Rendered>;

/// Applies an attribute-driven side effect: `(scope, element, value, name)`.
pub type Injector = Rc<dyn Fn(&mut Engine, ScopeId, NodeId, &str, &str)>;

// ---------------------------------------------------------------------------
// Plugins
// ---------------------------------------------------------------------------

/// Ordered directive and injector tables.
///
/// Registration order is the order in which a directive attribute is matched
/// on an element and the order in which injectors are applied. Registering an
/// existing name replaces the function in place.
#[derive(Clone, Default)]
pub struct Plugins {
    directives: Vec<(String, Directive)>,
    injectors: Vec<(String, Injector)>,
}

impl Plugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_directive(&mut self, name: &str, directive: Directive) {
        upsert(&mut self.directives, name, directive);
    }

    pub(crate) fn insert_injector(&mut self, name: &str, injector: Injector) {
        upsert(&mut self.injectors, name, injector);
    }

    /// Remove a directive; returns whether it was registered.
    pub fn unregister_directive(&mut self, name: &str) -> bool {
        remove(&mut self.directives, name)
    }

    /// Remove an injector; returns whether it was registered.
    pub fn unregister_injector(&mut self, name: &str) -> bool {
        remove(&mut self.injectors, name)
    }

    pub fn directive(&self, name: &str) -> Option<Directive> {
        self.directives.iter().find(|(n, _)| n == name).map(|(_, d)| d.clone())
    }

    pub fn directive_names(&self) -> Vec<String> {
        self.directives.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Injectors in application order.
    pub fn injectors(&self) -> Vec<(String, Injector)> {
        self.injectors.clone()
    }

    pub fn injector_names(&self) -> Vec<String> {
        self.injectors.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Stylesheet rule hiding elements whose directive has not been compiled
    /// yet. Empty when no directive is registered.
    pub fn hidden_rule(&self) -> String {
        if self.directives.is_empty() {
            return String::new();
        }
        let selectors: Vec<String> = self.directives.iter().map(|(n, _)| format!("* [{n}]")).collect();
        format!("{}{{ display: none; }}", selectors.join(", "))
    }
}

impl fmt::Debug for Plugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugins")
            .field("directives", &self.directive_names())
            .field("injectors", &self.injector_names())
            .finish()
    }
}

fn upsert<T>(table: &mut Vec<(String, T)>, name: &str, item: T) {
    match table.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = item,
        None => table.push((name.to_owned(), item)),
    }
}

fn remove<T>(table: &mut Vec<(String, T)>, name: &str) -> bool {
    let before = table.len();
    table.retain(|(n, _)| n != name);
    table.len() != before
}
