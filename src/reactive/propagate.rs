//! Change propagation: watcher dispatch, release, full render pass.

use tracing::{error, trace};

use super::watch::WatchEvent;
use crate::engine::Engine;
use crate::error::Error;
use crate::scope::{Change, ScopeId};
use crate::value::Value;

impl Engine {
    /// Propagate `change` if there is one.
    pub(crate) fn commit(&mut self, change: Option<Change>) -> Result<(), Error> {
        match change {
            Some(change) => self.value_changed(change),
            None => Ok(()),
        }
    }

    /// Notify watchers, release displaced scopes, then re-render the whole
    /// tree from the render root of the mutated scope.
    pub(crate) fn value_changed(&mut self, change: Change) -> Result<(), Error> {
        trace!(property = %change.property, "value changed");
        let Change {
            scope,
            property,
            old,
            new,
            origin,
            released,
        } = change;
        let dispatched = match scope {
            Some(scope) => self.trigger_watchers(scope, &property, old, new),
            None => Ok(()),
        };
        self.scopes.release(&released);
        dispatched?;

        let root = match self.scopes.render_root(origin) {
            Ok(root) => root,
            Err(err) => {
                error!(%err, "cannot find the render root, rendering from the root scope");
                self.root_scope()
            }
        };
        self.evaluate_templates(root)
    }

    /// Call the watchers of every prefix of the changed path, narrowest
    /// first. A path walk failure is logged and skips dispatch.
    pub(crate) fn trigger_watchers(&mut self, scope: ScopeId, property: &str, old: Value, new: Value) -> Result<(), Error> {
        let names = match self.scopes.path_to(scope, property) {
            Ok(names) => names,
            Err(err) => {
                error!(%err, property, "watcher dispatch aborted");
                return Ok(());
            }
        };

        let mut level_scope = Some(scope);
        let mut level_old = old;
        let mut level_new = new;
        for depth in (1..=names.len()).rev() {
            let Some(current) = level_scope else {
                break;
            };
            let path = names[..depth].join(".");
            let level_property = &names[depth - 1];
            let before = self.scopes.snapshot_with(current, level_property, level_old.clone());

            let event = WatchEvent {
                path: path.clone(),
                new: level_new,
                old: level_old,
                scope: current,
                property: level_property.clone(),
            };
            for watcher in self.watchers.subscribers(&path) {
                watcher(self, &event)?;
            }

            level_old = before;
            level_new = Value::Scope(current);
            level_scope = self.scopes.get(current).and_then(|s| s.parent());
        }
        Ok(())
    }
}
