//! Two-way binding between form controls and scope variables.
//!
//! Elements carrying the bind attribute get one input listener that writes
//! the control value back into the scope, re-entering propagation. The
//! bind-value injector runs the other direction during render passes.

use tracing::trace;

use super::listener::EventTarget;
use crate::dom::NodeId;
use crate::engine::Engine;
use crate::error::Error;
use crate::scope::ScopeId;

/// Whether `name` is a bare variable name (no path or index syntax).
pub fn is_bindable(name: &str) -> bool {
    !name.contains('.') && !name.contains('[')
}

impl Engine {
    /// Attach listeners to every bound control below the element of `scope`.
    ///
    /// A bind attribute naming a path or index aborts the pass with
    /// [`Error::ForbiddenBind`].
    pub(crate) fn find_binds(&mut self, scope: ScopeId) -> Result<(), Error> {
        let Some(element) = self.scopes.element_of(scope).or_else(|| self.dom.root()) else {
            return Ok(());
        };
        let attr = self.config.bind_attr.clone();
        for control in self.dom.query_attr(element, &attr) {
            let Some(name) = self.dom.attr(control, &attr).filter(|n| !n.is_empty()).map(str::to_owned) else {
                continue;
            };
            if !is_bindable(&name) {
                return Err(Error::ForbiddenBind { name, attr });
            }
            self.add_bind(scope, control, &name)?;
        }
        Ok(())
    }

    /// Listen for input on `control` and sync it once. Attaching twice is a
    /// no-op.
    fn add_bind(&mut self, scope: ScopeId, control: NodeId, name: &str) -> Result<(), Error> {
        if self.bound.insert(control, ()).is_some() {
            return Ok(());
        }
        let owner = self.scopes.scope_of(&self.dom, control).unwrap_or(scope);
        let kind = self.config.input_event.clone();
        let variable = name.to_owned();
        self.on(EventTarget::Node(control), &kind, move |engine, _| {
            engine.sync_bind(owner, control, &variable)
        });
        trace!(name, "control bound");
        self.sync_bind(owner, control, name)
    }

    /// Write the control value into the scope that holds `name` (nearest
    /// first, `scope` itself when none does). Skipped when the displayed
    /// value already matches.
    fn sync_bind(&mut self, scope: ScopeId, control: NodeId, name: &str) -> Result<(), Error> {
        let Some(text) = self.control_value(control) else {
            return Ok(());
        };
        let target = self
            .scopes
            .chain(scope)
            .ok()
            .and_then(|chain| chain.into_iter().find(|&s| self.scopes.has(s, name)))
            .unwrap_or(scope);
        let current = self.scopes.read(target, name).map(|v| self.scopes.display(&v));
        if current.as_deref() == Some(text.as_str()) {
            return Ok(());
        }
        self.set(target, name, text)
    }

    /// The value property of a form control, else its text content.
    pub fn control_value(&self, node: NodeId) -> Option<String> {
        let data = self.dom.get(node)?;
        Some(match &data.value {
            Some(value) => value.clone(),
            None => self.dom.text_content(node),
        })
    }

    /// Set what [`control_value`](Self::control_value) reads, without
    /// dispatching anything.
    pub fn set_control_value(&mut self, node: NodeId, text: &str) {
        match self.dom.get_mut(node) {
            Some(data) if data.value.is_some() => data.value = Some(text.to_owned()),
            Some(_) => self.dom.set_text_content(node, text),
            None => {}
        }
    }
}

/// Injector registered under the bind attribute: shows the bound variable in
/// the control. Leaves the control alone when the variable is unset.
pub(crate) fn bind_value(engine: &mut Engine, scope: ScopeId, control: NodeId, name: &str, _: &str) {
    if !is_bindable(name) {
        return;
    }
    let Some(value) = engine.lookup(scope, name) else {
        return;
    };
    let text = engine.display(&value);
    if engine.control_value(control).as_deref() != Some(text.as_str()) {
        engine.set_control_value(control, &text);
    }
}
