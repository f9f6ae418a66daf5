//! Event listeners keyed by target and event type.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::dom::NodeId;
use crate::engine::Engine;
use crate::error::Error;

/// Where an event is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    /// The host document: lifecycle events.
    Document,
    Node(NodeId),
}

/// A dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: String,
    pub target: EventTarget,
}

/// A listener callback.
pub type Listener = Rc<dyn Fn(&mut Engine, &Event) -> Result<(), Error>>;

// ---------------------------------------------------------------------------
// EventListeners
// ---------------------------------------------------------------------------

/// Listeners in registration order per `(target, kind)`.
#[derive(Default)]
pub struct EventListeners {
    entries: HashMap<(EventTarget, String), Vec<Listener>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: EventTarget, kind: &str, listener: Listener) {
        self.entries
            .entry((target, kind.to_owned()))
            .or_default()
            .push(listener);
    }

    /// Snapshot of the listeners for `(target, kind)`.
    pub fn get(&self, target: EventTarget, kind: &str) -> Vec<Listener> {
        self.entries
            .get(&(target, kind.to_owned()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of listeners for `(target, kind)`.
    pub fn count(&self, target: EventTarget, kind: &str) -> usize {
        self.entries.get(&(target, kind.to_owned())).map_or(0, Vec::len)
    }

    /// Drop every listener of `target`.
    pub fn clear_target(&mut self, target: EventTarget) {
        self.entries.retain(|(t, _), _| *t != target);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|((t, k), v)| ((t, k), v.len())))
            .finish()
    }
}

impl Engine {
    /// Register a listener.
    pub fn on(
        &mut self,
        target: EventTarget,
        kind: &str,
        listener: impl Fn(&mut Engine, &Event) -> Result<(), Error> + 'static,
    ) {
        self.listeners.add(target, kind, Rc::new(listener));
    }

    /// Run the listeners of `(target, kind)` in registration order. The first
    /// error stops dispatch and is returned.
    pub fn dispatch_event(&mut self, target: EventTarget, kind: &str) -> Result<(), Error> {
        let event = Event {
            kind: kind.to_owned(),
            target,
        };
        for listener in self.listeners.get(target, kind) {
            listener(self, &event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn listener() -> Listener {
        Rc::new(|_: &mut Engine, _: &Event| Ok(()))
    }

    #[test]
    fn add_count_and_clear() {
        let mut nodes: SlotMap<NodeId, ()> = SlotMap::with_key();
        let a = nodes.insert(());
        let b = nodes.insert(());
        let mut listeners = EventListeners::new();
        assert!(listeners.is_empty());
        listeners.add(EventTarget::Node(a), "keyup", listener());
        listeners.add(EventTarget::Node(a), "click", listener());
        listeners.add(EventTarget::Node(b), "keyup", listener());
        listeners.add(EventTarget::Document, "bready", listener());
        assert_eq!(listeners.count(EventTarget::Node(a), "keyup"), 1);
        assert_eq!(listeners.get(EventTarget::Node(a), "click").len(), 1);

        listeners.clear_target(EventTarget::Node(a));
        assert_eq!(listeners.count(EventTarget::Node(a), "keyup"), 0);
        assert_eq!(listeners.count(EventTarget::Node(b), "keyup"), 1);
        assert_eq!(listeners.count(EventTarget::Document, "bready"), 1);
    }
}
