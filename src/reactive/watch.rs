//! Watcher registry keyed by dotted property path.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::Error;
use crate::scope::ScopeId;
use crate::value::Value;

/// What a watcher receives for one path level of a change.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    /// Dotted path of this level (`"a.b"`).
    pub path: String,
    pub new: Value,
    /// Before-image. Above the mutated leaf this is a shallow snapshot of the
    /// inner scope with only the changed property restored.
    pub old: Value,
    /// Scope holding `property` at this level.
    pub scope: ScopeId,
    pub property: String,
}

/// A watcher callback. It may mutate the engine; an error stops propagation.
pub type Watcher = Rc<dyn Fn(&mut Engine, &WatchEvent) -> Result<(), Error>>;

/// Path → ordered subscribers.
///
/// Looking a path up creates its (empty) entry; entries are never pruned.
#[derive(Default)]
pub struct WatcherRegistry {
    entries: HashMap<String, Vec<Watcher>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribers of `path`, created empty on first access.
    pub fn entry(&mut self, path: &str) -> &mut Vec<Watcher> {
        self.entries.entry(path.to_owned()).or_default()
    }

    /// Append a watcher; insertion order is call order.
    pub fn watch(&mut self, path: &str, watcher: Watcher) {
        self.entry(path).push(watcher);
    }

    /// Snapshot of the subscribers of `path`, so callbacks can re-enter.
    pub fn subscribers(&mut self, path: &str) -> Vec<Watcher> {
        self.entry(path).clone()
    }

    /// Number of subscribers of `path` (0 when never touched).
    pub fn count(&self, path: &str) -> usize {
        self.entries.get(path).map_or(0, Vec::len)
    }

    /// Whether `path` has an entry, even an empty one.
    pub fn has_entry(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (path, subscribers) in &self.entries {
            map.entry(path, &subscribers.len());
        }
        map.finish()
    }
}
