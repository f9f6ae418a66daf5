//! Scope arena: wrapping, reads, upward walks, release.

use std::collections::{BTreeMap, HashSet};

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::dom::{Dom, NodeId};
use crate::value::Value;

new_key_type! {
    /// Unique identifier for a scope. Copy, lightweight (u64).
    pub struct ScopeId;
}

/// Owned data of a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

/// One (data subtree, element) pairing.
#[derive(Debug, Clone)]
pub struct Scope {
    pub(crate) body: Body,
    parent: Option<ScopeId>,
    name: Option<String>,
    element: Option<NodeId>,
}

impl Scope {
    /// Navigation-only link to the enclosing scope.
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Property name under which the parent reaches this scope. `None` for
    /// sequence elements, directive scopes and the root.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The element this scope governs.
    pub fn element(&self) -> Option<NodeId> {
        self.element
    }

    pub fn is_list(&self) -> bool {
        matches!(self.body, Body::List(_))
    }

    /// Number of entries (keys or elements).
    pub fn len(&self) -> usize {
        match &self.body {
            Body::Map(entries) => entries.len(),
            Body::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of a mapping scope; indices of a sequence scope.
    pub fn keys(&self) -> Vec<String> {
        match &self.body {
            Body::Map(entries) => entries.keys().cloned().collect(),
            Body::List(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }
}

/// A mutation that must be propagated.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Scope whose `property` changed. `None` when a parentless sequence
    /// changed: nothing can be watched, but the tree still re-renders.
    pub scope: Option<ScopeId>,
    pub property: String,
    pub old: Value,
    pub new: Value,
    /// Scope the mutation was applied to.
    pub origin: ScopeId,
    /// Scopes whose home slot was overwritten or removed, released once
    /// watchers have seen the before-image.
    pub released: Vec<ScopeId>,
}

/// Failure of an upward scope walk.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("{limit} recursion reached walking scope parents toward the root")]
    Ceiling { limit: usize },
    #[error("scope parent links form a cycle")]
    Cycle,
}

/// The scope tree.
///
/// Ownership flows downward: a scope *homes* the scopes created from raw data
/// stored in it, and releasing a scope releases what it homes. Parent links
/// only navigate upward. A `Value::Scope` stored somewhere other than its home
/// is an alias and keeps pointing at the original.
pub struct ScopeStore {
    pub(crate) scopes: SlotMap<ScopeId, Scope>,
    by_element: SecondaryMap<NodeId, ScopeId>,
    max_depth: usize,
}

impl ScopeStore {
    /// Create an empty store whose upward walks stop after `max_depth` steps.
    pub fn new(max_depth: usize) -> Self {
        Self {
            scopes: SlotMap::with_key(),
            by_element: SecondaryMap::new(),
            max_depth,
        }
    }

    /// Create a scope for `element` holding `data`.
    ///
    /// Maps become mapping scopes and lists sequence scopes; a scalar yields an
    /// empty mapping scope. The scope is anonymous: upward path building stops
    /// here.
    pub fn create(&mut self, element: Option<NodeId>, data: Value, parent: Option<ScopeId>) -> ScopeId {
        let own = element;
        let element = element.or_else(|| parent.and_then(|p| self.element_of(p)));
        let id = match data {
            Value::Scope(existing) if self.scopes.contains_key(existing) => {
                let body = self.scopes[existing].body.clone();
                self.insert(body, parent, None, element)
            }
            Value::List(items) => self.new_list(items, parent, None, element),
            Value::Map(entries) => self.insert(Body::Map(entries), parent, None, element),
            _ => self.insert(Body::Map(BTreeMap::new()), parent, None, element),
        };
        if let Some(node) = own {
            self.by_element.insert(node, id);
        }
        id
    }

    fn insert(&mut self, body: Body, parent: Option<ScopeId>, name: Option<String>, element: Option<NodeId>) -> ScopeId {
        self.scopes.insert(Scope {
            body,
            parent,
            name,
            element,
        })
    }

    fn new_list(&mut self, items: Vec<Value>, parent: Option<ScopeId>, name: Option<String>, element: Option<NodeId>) -> ScopeId {
        let id = self.insert(Body::List(Vec::new()), parent, name, element);
        let wrapped: Vec<Value> = items.into_iter().map(|item| self.wrap(item, id, None)).collect();
        if let Some(scope) = self.scopes.get_mut(id) {
            scope.body = Body::List(wrapped);
        }
        id
    }

    /// Home `value` under `parent`: raw structures become scopes, scalars and
    /// existing scopes pass through.
    pub(crate) fn wrap(&mut self, value: Value, parent: ScopeId, name: Option<&str>) -> Value {
        let element = self.element_of(parent);
        let name = name.map(str::to_owned);
        match value {
            Value::Map(entries) => Value::Scope(self.insert(Body::Map(entries), Some(parent), name, element)),
            Value::List(items) => Value::Scope(self.new_list(items, Some(parent), name, element)),
            other => other,
        }
    }

    /// Look up a scope.
    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id)
    }

    pub fn contains(&self, id: ScopeId) -> bool {
        self.scopes.contains_key(id)
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Whether `prop` exists directly on scope `id`.
    pub fn has(&self, id: ScopeId, prop: &str) -> bool {
        match self.scopes.get(id).map(|s| &s.body) {
            Some(Body::Map(entries)) => entries.contains_key(prop),
            Some(Body::List(items)) => prop == "length" || index_of(prop).is_some_and(|i| i < items.len()),
            None => false,
        }
    }

    /// Read `prop` from scope `id`, wrapping raw structures in place.
    pub fn read(&mut self, id: ScopeId, prop: &str) -> Option<Value> {
        let scope = self.scopes.get(id)?;
        match &scope.body {
            Body::List(items) => {
                if prop == "length" {
                    return Some(Value::from(items.len()));
                }
                index_of(prop).and_then(|i| items.get(i).cloned())
            }
            Body::Map(entries) => {
                let value = entries.get(prop)?;
                if value.is_scalar() {
                    return Some(value.clone());
                }
                let raw = value.clone();
                let wrapped = self.wrap(raw, id, Some(prop));
                if let Some(Body::Map(entries)) = self.scopes.get_mut(id).map(|s| &mut s.body) {
                    entries.insert(prop.to_owned(), wrapped.clone());
                }
                Some(wrapped)
            }
        }
    }

    /// Find `name` on scope `id` or the nearest ancestor that has it.
    pub fn lookup(&mut self, id: ScopeId, name: &str) -> Option<Value> {
        let chain = self.chain(id).unwrap_or_else(|_| vec![id]);
        let owner = chain.into_iter().find(|&s| self.has(s, name))?;
        self.read(owner, name)
    }

    /// Resolve a dotted path: the first segment through [`lookup`](Self::lookup),
    /// the rest as property reads (numeric segments index sequences).
    pub fn resolve(&mut self, id: ScopeId, path: &str) -> Option<Value> {
        let mut segments = path.split('.').map(str::trim);
        let first = segments.next().filter(|s| !s.is_empty())?;
        let mut current = self.lookup(id, first)?;
        for segment in segments {
            let scope = current.as_scope()?;
            current = self.read(scope, segment)?;
        }
        Some(current)
    }

    /// Sequence elements (wrapped).
    pub fn items(&self, id: ScopeId) -> Vec<Value> {
        match self.scopes.get(id).map(|s| &s.body) {
            Some(Body::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// The element governed by `id` (inherited from the parent for data scopes).
    pub fn element_of(&self, id: ScopeId) -> Option<NodeId> {
        self.scopes.get(id).and_then(|s| s.element)
    }

    /// The nearest scope explicitly created for `node` or one of its ancestors.
    pub fn scope_of(&self, dom: &Dom, node: NodeId) -> Option<ScopeId> {
        std::iter::once(node)
            .chain(dom.ancestors(node))
            .find_map(|n| self.by_element.get(n).copied())
            .filter(|&s| self.scopes.contains_key(s))
    }

    /// `id` followed by its ancestors, nearest first.
    pub fn chain(&self, id: ScopeId) -> Result<Vec<ScopeId>, PathError> {
        let mut chain = vec![id];
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.scopes.get(current).and_then(|s| s.parent) {
            if !seen.insert(parent) {
                return Err(PathError::Cycle);
            }
            if chain.len() > self.max_depth {
                return Err(PathError::Ceiling {
                    limit: self.max_depth,
                });
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// The topmost ancestor of `id`: where a full render pass starts.
    pub fn render_root(&self, id: ScopeId) -> Result<ScopeId, PathError> {
        self.chain(id).map(|chain| chain[chain.len() - 1])
    }

    /// The segment that reaches `id` from its parent: its property name, or
    /// its current index inside a parent sequence. `None` ends a path.
    pub fn segment(&self, id: ScopeId) -> Option<String> {
        let scope = self.scopes.get(id)?;
        if let Some(name) = &scope.name {
            return Some(name.clone());
        }
        let parent = self.scopes.get(scope.parent?)?;
        match &parent.body {
            Body::List(items) => items
                .iter()
                .position(|item| *item == Value::Scope(id))
                .map(|i| i.to_string()),
            Body::Map(_) => None,
        }
    }

    /// Property names from the outermost named scope down to `prop`.
    pub fn path_to(&self, id: ScopeId, prop: &str) -> Result<Vec<String>, PathError> {
        let mut names = vec![prop.to_owned()];
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(scope) = current {
            if !seen.insert(scope) {
                return Err(PathError::Cycle);
            }
            if seen.len() > self.max_depth {
                return Err(PathError::Ceiling {
                    limit: self.max_depth,
                });
            }
            let Some(segment) = self.segment(scope) else {
                break;
            };
            names.insert(0, segment);
            current = self.scopes.get(scope).and_then(|s| s.parent);
        }
        Ok(names)
    }

    /// Shallow copy of `id`'s contents with `prop` replaced by `old`.
    pub fn snapshot_with(&self, id: ScopeId, prop: &str, old: Value) -> Value {
        match self.scopes.get(id).map(|s| &s.body) {
            Some(Body::Map(entries)) => {
                let mut entries = entries.clone();
                entries.insert(prop.to_owned(), old);
                Value::Map(entries)
            }
            Some(Body::List(items)) => {
                let mut items = items.clone();
                if let Some(slot) = index_of(prop).and_then(|i| items.get_mut(i)) {
                    *slot = old;
                }
                Value::List(items)
            }
            None => Value::Null,
        }
    }

    /// Whether `child` is homed in `container` (under `name` for mappings).
    pub(crate) fn is_homed(&self, child: ScopeId, container: ScopeId, name: Option<&str>) -> bool {
        self.scopes
            .get(child)
            .is_some_and(|s| s.parent == Some(container) && s.name.as_deref() == name)
    }

    /// Release scopes and everything they home.
    pub fn release(&mut self, ids: &[ScopeId]) {
        let mut pending = ids.to_vec();
        while let Some(id) = pending.pop() {
            let Some(scope) = self.scopes.remove(id) else {
                continue;
            };
            if let Some(node) = scope.element {
                if self.by_element.get(node) == Some(&id) {
                    self.by_element.remove(node);
                }
            }
            let values: Vec<&Value> = match &scope.body {
                Body::Map(entries) => entries.values().collect(),
                Body::List(items) => items.iter().collect(),
            };
            pending.extend(
                values
                    .into_iter()
                    .filter_map(Value::as_scope)
                    .filter(|&child| self.scopes.get(child).is_some_and(|c| c.parent == Some(id))),
            );
        }
    }

    /// Release the scope created for `node`, if any.
    pub fn release_element(&mut self, node: NodeId) {
        if let Some(id) = self.by_element.remove(node) {
            self.release(&[id]);
        }
    }

    /// Deep copy of `value` with every scope turned back into raw data.
    pub fn to_raw(&self, value: &Value) -> Value {
        self.to_raw_guarded(value, &mut Vec::new())
    }

    fn to_raw_guarded(&self, value: &Value, stack: &mut Vec<ScopeId>) -> Value {
        let Value::Scope(id) = value else {
            return value.clone();
        };
        if stack.contains(id) {
            return Value::Null;
        }
        let Some(scope) = self.scopes.get(*id) else {
            return Value::Null;
        };
        stack.push(*id);
        let raw = match &scope.body {
            Body::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), self.to_raw_guarded(v, stack)))
                    .collect(),
            ),
            Body::List(items) => Value::List(items.iter().map(|v| self.to_raw_guarded(v, stack)).collect()),
        };
        stack.pop();
        raw
    }

    /// Export `value` as JSON, resolving scopes.
    pub fn to_json(&self, value: &Value) -> serde_json::Value {
        raw_to_json(self.to_raw(value))
    }

    /// Display text of `value`, resolving scopes the way browsers stringify.
    pub fn display(&self, value: &Value) -> String {
        self.to_raw(value).to_string()
    }
}

fn raw_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Scope(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
            serde_json::Value::from(n as i64)
        }
        Value::Number(n) => serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::List(items) => serde_json::Value::Array(items.into_iter().map(raw_to_json).collect()),
        Value::Map(entries) => {
            serde_json::Value::Object(entries.into_iter().map(|(k, v)| (k, raw_to_json(v))).collect())
        }
    }
}

/// Parse a sequence index property (`"0"`, `"12"`).
pub(crate) fn index_of(prop: &str) -> Option<usize> {
    if prop.is_empty() || !prop.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prop.parse().ok()
}
