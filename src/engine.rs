//! Engine: lifecycle, data API, plugin registration.
//!
//! [`Engine`] owns the document, the scope tree, the watcher and plugin
//! registries and the placeholder list. [`EngineBuilder`] collects
//! configuration and plugins, then runs the startup sequence.

use std::cmp::Ordering;
use std::ops::RangeBounds;
use std::rc::Rc;

use slotmap::SecondaryMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::dom::{Dom, NodeId};
use crate::error::Error;
use crate::event::binding::bind_value;
use crate::event::{Event, EventListeners, EventTarget, Listener};
use crate::reactive::{WatchEvent, WatcherRegistry};
use crate::scope::{ScopeId, ScopeStore};
use crate::template::{DirectiveCall, Plugins, RenderState, Rendered};
use crate::value::Value;

// ---------------------------------------------------------------------------
// EngineBuilder
// ---------------------------------------------------------------------------

/// Collects configuration, plugins and document listeners before startup.
///
/// Registration errors are kept and returned by [`build`](Self::build).
///
/// # Examples
///
/// ```
/// use bjs::dom::parse_markup;
/// use bjs::engine::EngineBuilder;
/// use bjs::value::Value;
///
/// let dom = parse_markup(r#"<p btext="greeting"></p>"#).unwrap();
/// let engine = EngineBuilder::new()
///     .injector("btext", |engine, scope, node, expr, _| {
///         let value = engine.resolve(scope, expr).unwrap_or_default();
///         let text = engine.display(&value);
///         engine.dom_mut().set_text_content(node, &text);
///     })
///     .build(dom, Value::from(serde_json::json!({"greeting": "hello"})))
///     .unwrap();
/// let p = engine.dom().query_tag("p").unwrap();
/// assert_eq!(engine.dom().text_content(p), "hello");
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    plugins: Plugins,
    listeners: Vec<(String, Listener)>,
    error: Option<Error>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            plugins: Plugins::new(),
            listeners: Vec::new(),
            error: None,
        }
    }

    /// Replace the configuration (builder).
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a directive (builder).
    pub fn directive(
        mut self,
        name: &str,
        directive: impl for<'a> Fn(&mut Engine, DirectiveCall<'a>) -> Rendered + 'static,
    ) -> Self {
        match check_name(&self.config, name) {
            Ok(()) => self.plugins.insert_directive(name, Rc::new(directive)),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Register an injector (builder).
    pub fn injector(
        mut self,
        name: &str,
        injector: impl Fn(&mut Engine, ScopeId, NodeId, &str, &str) + 'static,
    ) -> Self {
        match check_name(&self.config, name) {
            Ok(()) => self.plugins.insert_injector(name, Rc::new(injector)),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Listen for a document event such as the plugin or ready event
    /// (builder).
    pub fn on(
        mut self,
        kind: &str,
        listener: impl Fn(&mut Engine, &Event) -> Result<(), Error> + 'static,
    ) -> Self {
        self.listeners.push((kind.to_owned(), Rc::new(listener)));
        self
    }

    fn fail(&mut self, err: Error) {
        self.error.get_or_insert(err);
    }

    /// Run the startup sequence over `dom` with `data` as the root model.
    ///
    /// 1. register the bind-value injector
    /// 2. create the root scope
    /// 3. fire the plugin event on the document
    /// 4. compile placeholders
    /// 5. run the first render pass
    /// 6. fire the ready event on the document
    pub fn build(self, dom: Dom, data: impl Into<Value>) -> Result<Engine, Error> {
        let EngineBuilder {
            config,
            mut plugins,
            listeners,
            error,
        } = self;
        if let Some(err) = error {
            return Err(err);
        }

        plugins.insert_injector(&config.bind_attr, Rc::new(bind_value));
        let mut scopes = ScopeStore::new(config.max_path_depth);
        let root = scopes.create(dom.root(), data.into(), None);
        let mut engine = Engine {
            dom,
            config,
            scopes,
            watchers: WatcherRegistry::new(),
            plugins,
            listeners: EventListeners::new(),
            templates: Vec::new(),
            render_state: SecondaryMap::new(),
            bound: SecondaryMap::new(),
            root,
        };
        for (kind, listener) in listeners {
            engine.listeners.add(EventTarget::Document, &kind, listener);
        }

        let plugin_event = engine.config.plugin_event.clone();
        engine.dispatch_event(EventTarget::Document, &plugin_event)?;
        engine.templates = engine.create_templates();
        engine.render()?;
        let ready_event = engine.config.ready_event.clone();
        engine.dispatch_event(EventTarget::Document, &ready_event)?;
        debug!(
            templates = engine.templates.len(),
            scopes = engine.scopes.len(),
            "engine ready"
        );
        Ok(engine)
    }

    /// Build, then hand the engine to `callback`.
    pub fn load(self, dom: Dom, data: impl Into<Value>, callback: impl FnOnce(&mut Engine)) -> Result<Engine, Error> {
        let mut engine = self.build(dom, data)?;
        callback(&mut engine);
        Ok(engine)
    }

    /// Build only when the document body (or, without a body, the first
    /// element) carries the load attribute. The attribute is removed first.
    pub fn autoload(self, mut dom: Dom, data: impl Into<Value>) -> Result<Option<Engine>, Error> {
        let attr = self.config.load_attr.clone();
        let host = dom.query_tag("body").or_else(|| {
            let root = dom.root()?;
            dom.query_all(root, |d| d.is_element()).first().copied()
        });
        let requested = host
            .and_then(|h| dom.get_mut(h))
            .and_then(|data| data.remove_attr(&attr))
            .is_some();
        if !requested {
            return Ok(None);
        }
        self.build(dom, data).map(Some)
    }
}

/// Build an engine with default configuration and no plugins, then hand it
/// to `callback`.
pub fn load(dom: Dom, data: impl Into<Value>, callback: impl FnOnce(&mut Engine)) -> Result<Engine, Error> {
    EngineBuilder::new().load(dom, data, callback)
}

/// [`EngineBuilder::autoload`] with default configuration.
pub fn autoload(dom: Dom, data: impl Into<Value>) -> Result<Option<Engine>, Error> {
    EngineBuilder::new().autoload(dom, data)
}

fn check_name(config: &EngineConfig, name: &str) -> Result<(), Error> {
    if config.reserved_attrs().contains(&name) {
        return Err(Error::ReservedName(name.to_owned()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A running engine bound to one document.
///
/// Every mutation made through the data API propagates synchronously:
/// watchers run, then a full render pass, before the call returns.
pub struct Engine {
    pub(crate) dom: Dom,
    pub(crate) config: EngineConfig,
    pub(crate) scopes: ScopeStore,
    pub(crate) watchers: WatcherRegistry,
    pub(crate) plugins: Plugins,
    pub(crate) listeners: EventListeners,
    pub(crate) templates: Vec<NodeId>,
    pub(crate) render_state: SecondaryMap<NodeId, RenderState>,
    pub(crate) bound: SecondaryMap<NodeId, ()>,
    root: ScopeId,
}

impl Engine {
    // ── Accessors ────────────────────────────────────────────────────

    /// The scope owning the whole model.
    pub fn root_scope(&self) -> ScopeId {
        self.root
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// Direct document access. Structural edits made here are seen by the
    /// next render pass.
    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scopes(&self) -> &ScopeStore {
        &self.scopes
    }

    pub fn plugins(&self) -> &Plugins {
        &self.plugins
    }

    pub fn listeners(&self) -> &EventListeners {
        &self.listeners
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    /// Placeholders in document order, attached or not.
    pub fn templates(&self) -> &[NodeId] {
        &self.templates
    }

    /// Tear the engine down, keeping the document.
    pub fn into_dom(self) -> Dom {
        self.dom
    }

    // ── Plugins ──────────────────────────────────────────────────────

    /// Register a directive. Elements carrying it are compiled only at
    /// startup, so register from a plugin-event listener or the builder.
    pub fn register_directive(
        &mut self,
        name: &str,
        directive: impl for<'a> Fn(&mut Engine, DirectiveCall<'a>) -> Rendered + 'static,
    ) -> Result<(), Error> {
        check_name(&self.config, name)?;
        self.plugins.insert_directive(name, Rc::new(directive));
        Ok(())
    }

    pub fn register_injector(
        &mut self,
        name: &str,
        injector: impl Fn(&mut Engine, ScopeId, NodeId, &str, &str) + 'static,
    ) -> Result<(), Error> {
        check_name(&self.config, name)?;
        self.plugins.insert_injector(name, Rc::new(injector));
        Ok(())
    }

    pub fn unregister_directive(&mut self, name: &str) -> bool {
        self.plugins.unregister_directive(name)
    }

    pub fn unregister_injector(&mut self, name: &str) -> bool {
        self.plugins.unregister_injector(name)
    }

    /// Stylesheet rule hiding directive elements before compilation.
    pub fn hidden_rule(&self) -> String {
        self.plugins.hidden_rule()
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Read a property of `scope`. Structured values come back wrapped.
    pub fn get(&mut self, scope: ScopeId, prop: &str) -> Option<Value> {
        self.scopes.read(scope, prop)
    }

    /// Read `name` from `scope` or its nearest ancestor that has it.
    pub fn lookup(&mut self, scope: ScopeId, name: &str) -> Option<Value> {
        self.scopes.lookup(scope, name)
    }

    /// Resolve a dotted path (`"user.address.city"`, `"rows.0"`).
    pub fn resolve(&mut self, scope: ScopeId, path: &str) -> Option<Value> {
        self.scopes.resolve(scope, path)
    }

    /// Number of elements of a sequence scope (entries of a mapping).
    pub fn len(&self, scope: ScopeId) -> usize {
        self.scopes.get(scope).map_or(0, |s| s.len())
    }

    /// Elements of a sequence scope.
    pub fn items(&self, scope: ScopeId) -> Vec<Value> {
        self.scopes.items(scope)
    }

    /// Create a scope for `element` holding `data`, under `parent`.
    pub fn create_scope(&mut self, element: Option<NodeId>, data: impl Into<Value>, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.create(element, data.into(), parent)
    }

    /// The scope governing `node`.
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.scopes.scope_of(&self.dom, node)
    }

    pub fn to_json(&self, value: &Value) -> serde_json::Value {
        self.scopes.to_json(value)
    }

    /// Display text of `value`, resolving scopes.
    pub fn display(&self, value: &Value) -> String {
        self.scopes.display(value)
    }

    // ── Writes ───────────────────────────────────────────────────────

    pub fn set(&mut self, scope: ScopeId, prop: &str, value: impl Into<Value>) -> Result<(), Error> {
        let change = self.scopes.set(scope, prop, value.into());
        self.commit(change)
    }

    pub fn delete(&mut self, scope: ScopeId, prop: &str) -> Result<(), Error> {
        let change = self.scopes.delete(scope, prop);
        self.commit(change)
    }

    /// Append to a sequence; returns the new length.
    pub fn push(&mut self, scope: ScopeId, values: Vec<Value>) -> Result<usize, Error> {
        let (len, change) = self.scopes.push(scope, values);
        self.commit(change)?;
        Ok(len)
    }

    /// Prepend to a sequence; returns the new length.
    pub fn unshift(&mut self, scope: ScopeId, values: Vec<Value>) -> Result<usize, Error> {
        let (len, change) = self.scopes.unshift(scope, values);
        self.commit(change)?;
        Ok(len)
    }

    /// Remove the last element, returned as raw data.
    pub fn pop(&mut self, scope: ScopeId) -> Result<Option<Value>, Error> {
        let (value, change) = self.scopes.pop(scope);
        self.commit(change)?;
        Ok(value)
    }

    /// Remove the first element, returned as raw data.
    pub fn shift(&mut self, scope: ScopeId) -> Result<Option<Value>, Error> {
        let (value, change) = self.scopes.shift(scope);
        self.commit(change)?;
        Ok(value)
    }

    /// Remove `delete_count` elements at `start` (the rest when `None`) and
    /// insert `values`; returns the removed elements as raw data.
    pub fn splice(
        &mut self,
        scope: ScopeId,
        start: usize,
        delete_count: Option<usize>,
        values: Vec<Value>,
    ) -> Result<Vec<Value>, Error> {
        let (removed, change) = self.scopes.splice(scope, start, delete_count, values);
        self.commit(change)?;
        Ok(removed)
    }

    pub fn reverse(&mut self, scope: ScopeId) -> Result<(), Error> {
        let change = self.scopes.reverse(scope);
        self.commit(change)
    }

    /// Sort with [`Value::loose_cmp`].
    pub fn sort(&mut self, scope: ScopeId) -> Result<(), Error> {
        self.sort_by(scope, Value::loose_cmp)
    }

    pub fn sort_by(&mut self, scope: ScopeId, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<(), Error> {
        let change = self.scopes.sort_by(scope, compare);
        self.commit(change)
    }

    pub fn fill(&mut self, scope: ScopeId, value: impl Into<Value>, range: impl RangeBounds<usize>) -> Result<(), Error> {
        let change = self.scopes.fill(scope, value.into(), range);
        self.commit(change)
    }

    pub fn set_index(&mut self, scope: ScopeId, index: usize, value: impl Into<Value>) -> Result<(), Error> {
        let change = self.scopes.set_index(scope, index, value.into());
        self.commit(change)
    }

    pub fn set_len(&mut self, scope: ScopeId, len: usize) -> Result<(), Error> {
        let change = self.scopes.set_len(scope, len);
        self.commit(change)
    }

    pub fn delete_index(&mut self, scope: ScopeId, index: usize) -> Result<(), Error> {
        let change = self.scopes.delete_index(scope, index);
        self.commit(change)
    }

    // ── Watchers and rendering ───────────────────────────────────────

    /// Subscribe to changes of `path` or anything below it.
    pub fn watch(&mut self, path: &str, watcher: impl Fn(&mut Engine, &WatchEvent) -> Result<(), Error> + 'static) {
        self.watchers.watch(path, Rc::new(watcher));
    }

    /// Run a full render pass from the root scope.
    pub fn render(&mut self) -> Result<(), Error> {
        self.evaluate_templates(self.root)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::dom::{parse_markup, to_markup};

    fn doc(markup: &str) -> Dom {
        parse_markup(markup).unwrap()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    #[test]
    fn lifecycle_events_bracket_startup() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (plugin_log, ready_log) = (log.clone(), log.clone());
        let engine = EngineBuilder::new()
            .on("bplugin", move |engine, event| {
                plugin_log
                    .borrow_mut()
                    .push(format!("{} templates={}", event.kind, engine.templates().len()));
                Ok(())
            })
            .on("bready", move |engine, event| {
                ready_log
                    .borrow_mut()
                    .push(format!("{} templates={}", event.kind, engine.templates().len()));
                Ok(())
            })
            .directive("bif", |_, _| Rendered::default())
            .build(doc(r#"<p bif="x"></p>"#), Value::Null)
            .unwrap();
        assert_eq!(*log.borrow(), vec!["bplugin templates=0", "bready templates=1"]);
        assert_eq!(engine.templates().len(), 1);
    }

    #[test]
    fn plugin_event_can_register_directives() {
        let engine = EngineBuilder::new()
            .on("bplugin", |engine, _| {
                engine.register_directive("bshow", |_, _| Rendered::default())
            })
            .build(doc(r#"<p bshow="x"></p>"#), Value::Null)
            .unwrap();
        assert_eq!(engine.templates().len(), 1);
        assert_eq!(engine.hidden_rule(), "* [bshow]{ display: none; }");
    }

    #[test]
    fn reserved_names_are_rejected() {
        let err = EngineBuilder::new()
            .injector("bbind", |_, _, _, _, _| {})
            .build(Dom::document(), Value::Null)
            .err()
            .unwrap();
        assert!(matches!(err, Error::ReservedName(ref n) if n == "bbind"));

        let mut engine = EngineBuilder::new().build(Dom::document(), Value::Null).unwrap();
        for name in ["bscope", "bsuper", "bel", "bload"] {
            assert!(engine.register_directive(name, |_, _| Rendered::default()).is_err());
        }
        assert!(engine.register_injector("btext", |_, _, _, _, _| {}).is_ok());
        assert!(engine.unregister_injector("btext"));
    }

    #[test]
    fn bind_injector_is_registered_last() {
        let engine = EngineBuilder::new()
            .injector("btext", |_, _, _, _, _| {})
            .build(Dom::document(), Value::Null)
            .unwrap();
        assert_eq!(engine.plugins().injector_names(), vec!["btext", "bbind"]);
    }

    #[test]
    fn ready_listener_error_fails_build() {
        let err = EngineBuilder::new()
            .on("bready", |_, _| Err(Error::callback("not ready")))
            .build(Dom::document(), Value::Null)
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "not ready");
    }

    #[test]
    fn load_calls_back_with_engine() {
        let mut seen = None;
        let engine = load(doc("<p></p>"), json!({"a": 1}), |engine| {
            let root = engine.root_scope();
            seen = engine.get(root, "a");
        })
        .unwrap();
        assert_eq!(seen, Some(Value::from(1)));
        let dom = engine.into_dom();
        assert_eq!(to_markup(&dom, dom.root().unwrap()), "<p></p>");
    }

    #[test]
    fn autoload_requires_load_attribute() {
        assert!(autoload(doc("<body><p></p></body>"), Value::Null).unwrap().is_none());

        let engine = autoload(doc("<body bload><p></p></body>"), Value::Null).unwrap().unwrap();
        let body = engine.dom().query_tag("body").unwrap();
        assert_eq!(engine.dom().attr(body, "bload"), None);

        assert!(autoload(doc("<main bload></main>"), Value::Null).unwrap().is_some());
    }

    // ── Data API ─────────────────────────────────────────────────────

    #[test]
    fn reads_through_scopes() {
        let mut engine = EngineBuilder::new()
            .build(Dom::document(), json!({"user": {"tags": ["a", "b"]}}))
            .unwrap();
        let root = engine.root_scope();
        let tags = engine.resolve(root, "user.tags").and_then(|v| v.as_scope()).unwrap();
        assert_eq!(engine.len(tags), 2);
        assert_eq!(engine.items(tags), vec![Value::from("a"), Value::from("b")]);
        assert_eq!(engine.display(&Value::Scope(tags)), "a,b");
        assert_eq!(engine.to_json(&Value::Scope(root)), json!({"user": {"tags": ["a", "b"]}}));
    }

    #[test]
    fn sequence_api_round() {
        let mut engine = EngineBuilder::new().build(Dom::document(), json!({"n": [3, 1, 2]})).unwrap();
        let root = engine.root_scope();
        let n = engine.get(root, "n").and_then(|v| v.as_scope()).unwrap();
        engine.sort(n).unwrap();
        assert_eq!(engine.to_json(&Value::Scope(n)), json!([1, 2, 3]));
        assert_eq!(engine.unshift(n, vec![Value::from(0)]).unwrap(), 4);
        assert_eq!(engine.shift(n).unwrap(), Some(Value::from(0)));
        assert_eq!(engine.splice(n, 0, Some(1), Vec::new()).unwrap(), vec![Value::from(1)]);
        engine.fill(n, 9, ..1).unwrap();
        engine.set_index(n, 3, 4).unwrap();
        engine.delete_index(n, 2).unwrap();
        assert_eq!(engine.to_json(&Value::Scope(n)), json!([9, 3, null, 4]));
        engine.set_len(n, 1).unwrap();
        engine.sort_by(n, |a, b| b.loose_cmp(a)).unwrap();
        assert_eq!(engine.to_json(&Value::Scope(n)), json!([9]));
        engine.delete(root, "n").unwrap();
        assert_eq!(engine.get(root, "n"), None);
    }
}
