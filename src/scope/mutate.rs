//! Observed mutations.
//!
//! Every mutator returns the [`Change`] to propagate, or `None` when nothing
//! observable happened. Sequence mutations are attributed to the property
//! through which the parent reaches the sequence, with whole-sequence before
//! and after images.

use std::cmp::Ordering;
use std::ops::{Bound, RangeBounds};

use tracing::warn;

use super::store::{index_of, Body, Change, ScopeId, ScopeStore};
use crate::value::Value;

/// Largest sequence length; indices stay strictly below it.
pub const MAX_LEN: usize = u32::MAX as usize;

impl ScopeStore {
    /// Assign `prop` on scope `id`.
    ///
    /// Raw structured values are wrapped and homed here; scope values are
    /// stored as aliases. Writing an equal scalar or the same scope to an
    /// existing key is silent; raw structures always count as new. On a
    /// sequence scope, index and `length` properties route to
    /// [`set_index`](Self::set_index) and [`set_len`](Self::set_len).
    pub fn set(&mut self, id: ScopeId, prop: &str, value: Value) -> Option<Change> {
        match &self.scopes.get(id)?.body {
            Body::List(_) => {
                if prop == "length" {
                    let len = value
                        .as_f64()
                        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_LEN as f64);
                    let Some(len) = len else {
                        warn!(value = %value, "invalid sequence length ignored");
                        return None;
                    };
                    return self.set_len(id, len as usize);
                }
                let index = index_of(prop)?;
                self.set_index(id, index, value)
            }
            Body::Map(entries) => {
                let old = entries.get(prop).cloned();
                if unchanged(old.as_ref(), &value) {
                    return None;
                }
                let new = self.wrap(value, id, Some(prop));
                if let Some(Body::Map(entries)) = self.scopes.get_mut(id).map(|s| &mut s.body) {
                    entries.insert(prop.to_owned(), new.clone());
                }
                let released = self.displaced(id, Some(prop), old.as_ref(), &new);
                Some(Change {
                    scope: Some(id),
                    property: prop.to_owned(),
                    old: old.unwrap_or_default(),
                    new,
                    origin: id,
                    released,
                })
            }
        }
    }

    /// Remove `prop` from scope `id`. Silent when the key is absent.
    pub fn delete(&mut self, id: ScopeId, prop: &str) -> Option<Change> {
        match &self.scopes.get(id)?.body {
            Body::List(_) => self.delete_index(id, index_of(prop)?),
            Body::Map(_) => {
                let Some(Body::Map(entries)) = self.scopes.get_mut(id).map(|s| &mut s.body) else {
                    return None;
                };
                let old = entries.remove(prop)?;
                let released = self.displaced(id, Some(prop), Some(&old), &Value::Null);
                Some(Change {
                    scope: Some(id),
                    property: prop.to_owned(),
                    old,
                    new: Value::Null,
                    origin: id,
                    released,
                })
            }
        }
    }

    /// Append `values`; returns the new length.
    pub fn push(&mut self, id: ScopeId, values: Vec<Value>) -> (usize, Option<Change>) {
        let notify = !values.is_empty();
        self.edit_list(id, notify, |store, items| {
            let wrapped = store.wrap_all(id, values);
            items.extend(wrapped);
            items.len()
        })
        .unwrap_or((0, None))
    }

    /// Prepend `values`; returns the new length.
    pub fn unshift(&mut self, id: ScopeId, values: Vec<Value>) -> (usize, Option<Change>) {
        let notify = !values.is_empty();
        self.edit_list(id, notify, |store, items| {
            let wrapped = store.wrap_all(id, values);
            items.splice(0..0, wrapped);
            items.len()
        })
        .unwrap_or((0, None))
    }

    /// Remove the last element and return it as raw data.
    pub fn pop(&mut self, id: ScopeId) -> (Option<Value>, Option<Change>) {
        let notify = self.get(id).is_some_and(|s| !s.is_empty());
        self.edit_list(id, notify, |store, items| items.pop().map(|v| store.to_raw(&v)))
            .unwrap_or((None, None))
    }

    /// Remove the first element and return it as raw data.
    pub fn shift(&mut self, id: ScopeId) -> (Option<Value>, Option<Change>) {
        let notify = self.get(id).is_some_and(|s| !s.is_empty());
        self.edit_list(id, notify, |store, items| {
            if items.is_empty() {
                None
            } else {
                Some(store.to_raw(&items.remove(0)))
            }
        })
        .unwrap_or((None, None))
    }

    /// Remove `delete_count` elements at `start` (all remaining when `None`)
    /// and insert `values` there. Returns the removed elements as raw data.
    ///
    /// `start` is clamped to the length. Always notifies.
    pub fn splice(
        &mut self,
        id: ScopeId,
        start: usize,
        delete_count: Option<usize>,
        values: Vec<Value>,
    ) -> (Vec<Value>, Option<Change>) {
        self.edit_list(id, true, |store, items| {
            let start = start.min(items.len());
            let end = delete_count.map_or(items.len(), |n| start.saturating_add(n).min(items.len()));
            let wrapped = store.wrap_all(id, values);
            let removed: Vec<Value> = items.splice(start..end, wrapped).collect();
            removed.iter().map(|v| store.to_raw(v)).collect()
        })
        .unwrap_or((Vec::new(), None))
    }

    /// Reverse in place. Always notifies.
    pub fn reverse(&mut self, id: ScopeId) -> Option<Change> {
        self.edit_list(id, true, |_, items| items.reverse())?.1
    }

    /// Stable sort with `compare`. Always notifies.
    pub fn sort_by(&mut self, id: ScopeId, mut compare: impl FnMut(&Value, &Value) -> Ordering) -> Option<Change> {
        self.edit_list(id, true, |_, items| items.sort_by(&mut compare))?.1
    }

    /// Overwrite the slots in `range` with `value`, each slot wrapping its own
    /// copy of raw structured data. Always notifies.
    pub fn fill(&mut self, id: ScopeId, value: Value, range: impl RangeBounds<usize>) -> Option<Change> {
        self.edit_list(id, true, |store, items| {
            let len = items.len();
            let start = match range.start_bound() {
                Bound::Included(&s) => s,
                Bound::Excluded(&s) => s.saturating_add(1),
                Bound::Unbounded => 0,
            }
            .min(len);
            let end = match range.end_bound() {
                Bound::Included(&e) => e.saturating_add(1),
                Bound::Excluded(&e) => e,
                Bound::Unbounded => len,
            }
            .min(len);
            for slot in items.iter_mut().take(end).skip(start) {
                *slot = store.wrap(value.clone(), id, None);
            }
        })?
        .1
    }

    /// Assign one element. Writing past the end pads with `Null`. Silent when
    /// the slot already holds an equal scalar or the same scope. Indices at
    /// or beyond [`MAX_LEN`] are ignored.
    pub fn set_index(&mut self, id: ScopeId, index: usize, value: Value) -> Option<Change> {
        let Some(needed) = index.checked_add(1).filter(|&n| n <= MAX_LEN) else {
            warn!(index, "sequence index out of range ignored");
            return None;
        };
        let current = match &self.scopes.get(id)?.body {
            Body::List(items) => items.get(index).cloned(),
            Body::Map(_) => return None,
        };
        if unchanged(current.as_ref(), &value) {
            return None;
        }
        self.edit_list(id, true, |store, items| {
            let wrapped = store.wrap(value, id, None);
            if needed > items.len() {
                items.resize(needed, Value::Null);
            }
            items[index] = wrapped;
        })?
        .1
    }

    /// Truncate or pad with `Null`. Silent when the length is unchanged.
    /// Lengths beyond [`MAX_LEN`] are ignored.
    pub fn set_len(&mut self, id: ScopeId, len: usize) -> Option<Change> {
        if len > MAX_LEN {
            warn!(len, "sequence length out of range ignored");
            return None;
        }
        let same = self.get(id).is_some_and(|s| s.is_list() && s.len() == len);
        if same {
            return None;
        }
        self.edit_list(id, true, |_, items| items.resize(len, Value::Null))?.1
    }

    /// Clear one element, leaving a `Null` hole. Always notifies.
    pub fn delete_index(&mut self, id: ScopeId, index: usize) -> Option<Change> {
        self.edit_list(id, true, |_, items| {
            if let Some(slot) = items.get_mut(index) {
                *slot = Value::Null;
            }
        })?
        .1
    }

    fn wrap_all(&mut self, id: ScopeId, values: Vec<Value>) -> Vec<Value> {
        values.into_iter().map(|v| self.wrap(v, id, None)).collect()
    }

    /// Run `edit` on the elements of sequence `id`, then describe the change.
    ///
    /// Returns `None` when `id` is not a live sequence.
    fn edit_list<T>(
        &mut self,
        id: ScopeId,
        notify: bool,
        edit: impl FnOnce(&mut Self, &mut Vec<Value>) -> T,
    ) -> Option<(T, Option<Change>)> {
        let mut items = match &mut self.scopes.get_mut(id)?.body {
            Body::List(items) => std::mem::take(items),
            Body::Map(_) => return None,
        };
        let before = items.clone();
        let result = edit(self, &mut items);
        let after = items.clone();
        if let Some(scope) = self.scopes.get_mut(id) {
            scope.body = Body::List(items);
        }
        if !notify {
            return Some((result, None));
        }
        let released = before
            .iter()
            .filter(|v| !after.contains(v))
            .filter_map(Value::as_scope)
            .filter(|&c| self.is_homed(c, id, None))
            .collect();
        let (scope, property) = match self.get(id) {
            Some(s) => match (s.parent(), self.segment(id)) {
                (Some(parent), Some(segment)) => (Some(parent), segment),
                _ => (None, String::new()),
            },
            None => (None, String::new()),
        };
        Some((
            result,
            Some(Change {
                scope,
                property,
                old: Value::List(before),
                new: Value::Scope(id),
                origin: id,
                released,
            }),
        ))
    }

    /// Scopes homed at `(container, name)` that `old` held and `new` no
    /// longer does.
    fn displaced(&self, container: ScopeId, name: Option<&str>, old: Option<&Value>, new: &Value) -> Vec<ScopeId> {
        old.and_then(Value::as_scope)
            .filter(|&c| Some(c) != new.as_scope() && self.is_homed(c, container, name))
            .into_iter()
            .collect()
    }
}

/// Whether writing `new` over `old` is unobservable: equal scalars or the
/// same scope. A raw structure is a fresh value every time.
fn unchanged(old: Option<&Value>, new: &Value) -> bool {
    match (old, new) {
        (_, Value::List(_) | Value::Map(_)) => false,
        (Some(old), new) => old == new,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup(data: serde_json::Value) -> (ScopeStore, ScopeId) {
        let mut store = ScopeStore::new(1000);
        let root = store.create(None, Value::from(data), None);
        (store, root)
    }

    fn list(store: &mut ScopeStore, root: ScopeId, name: &str) -> ScopeId {
        store.read(root, name).and_then(|v| v.as_scope()).unwrap()
    }

    fn raw(store: &ScopeStore, id: ScopeId) -> serde_json::Value {
        store.to_json(&Value::Scope(id))
    }

    // ── mappings ─────────────────────────────────────────────────────

    #[test]
    fn set_reports_old_and_new() {
        let (mut store, root) = setup(json!({"a": 1}));
        let change = store.set(root, "a", Value::from(2)).unwrap();
        assert_eq!(change.scope, Some(root));
        assert_eq!(change.property, "a");
        assert_eq!(change.old, Value::from(1));
        assert_eq!(change.new, Value::from(2));
    }

    #[test]
    fn set_equal_value_is_silent() {
        let (mut store, root) = setup(json!({"a": 1}));
        assert!(store.set(root, "a", Value::from(1)).is_none());
    }

    #[test]
    fn fresh_structure_with_equal_contents_notifies() {
        let (mut store, root) = setup(json!({"cfg": {"a": 1}, "tags": [1]}));
        let change = store.set(root, "cfg", Value::from(json!({"a": 1}))).unwrap();
        assert_eq!(change.old, Value::from(json!({"a": 1})));
        assert!(change.new.as_scope().is_some());
        let tags = list(&mut store, root, "tags");
        assert!(store.set_index(tags, 0, Value::from(json!([]))).is_some());
        let same = store.read(root, "cfg").unwrap();
        assert!(store.set(root, "cfg", same).is_none());
    }

    #[test]
    fn out_of_range_sequence_writes_are_ignored() {
        let (mut store, root) = setup(json!({"n": [1]}));
        let n = list(&mut store, root, "n");
        assert!(store.set(n, "18446744073709551615", Value::from(1)).is_none());
        assert!(store.set_index(n, usize::MAX, Value::from(1)).is_none());
        assert!(store.set_index(n, MAX_LEN, Value::from(1)).is_none());
        assert!(store.set(n, "length", Value::from(1e300)).is_none());
        assert!(store.set(n, "length", Value::from(-1)).is_none());
        assert!(store.set_len(n, MAX_LEN + 1).is_none());
        assert_eq!(raw(&store, n), json!([1]));
        assert!(store.set(n, "length", Value::from(3)).is_some());
        assert_eq!(raw(&store, n), json!([1, null, null]));
    }

    #[test]
    fn set_missing_key_always_notifies() {
        let (mut store, root) = setup(json!({}));
        let change = store.set(root, "a", Value::Null).unwrap();
        assert!(change.old.is_null());
    }

    #[test]
    fn set_raw_structure_wraps_and_homes() {
        let (mut store, root) = setup(json!({}));
        let change = store.set(root, "user", Value::from(json!({"name": "x"}))).unwrap();
        let user = change.new.as_scope().unwrap();
        assert_eq!(store.get(user).unwrap().name(), Some("user"));
        assert_eq!(store.path_to(user, "name").unwrap(), vec!["user", "name"]);
    }

    #[test]
    fn overwriting_homed_scope_releases_it() {
        let (mut store, root) = setup(json!({"user": {"name": "x"}}));
        let user = list(&mut store, root, "user");
        let change = store.set(root, "user", Value::from("gone")).unwrap();
        assert_eq!(change.released, vec![user]);
    }

    #[test]
    fn aliases_are_not_released() {
        let (mut store, root) = setup(json!({"user": {"name": "x"}}));
        let user = list(&mut store, root, "user");
        store.set(root, "alias", Value::Scope(user)).unwrap();
        let change = store.set(root, "alias", Value::Null).unwrap();
        assert!(change.released.is_empty());
        assert_eq!(store.get(user).unwrap().name(), Some("user"));
    }

    #[test]
    fn delete_reports_removed_value() {
        let (mut store, root) = setup(json!({"a": 1}));
        let change = store.delete(root, "a").unwrap();
        assert_eq!(change.old, Value::from(1));
        assert!(change.new.is_null());
        assert!(store.delete(root, "a").is_none());
    }

    // ── sequences ────────────────────────────────────────────────────

    #[test]
    fn push_is_attributed_to_owning_property() {
        let (mut store, root) = setup(json!({"items": [1, 2]}));
        let items = list(&mut store, root, "items");
        let (len, change) = store.push(items, vec![Value::from(3)]);
        let change = change.unwrap();
        assert_eq!(len, 3);
        assert_eq!(change.scope, Some(root));
        assert_eq!(change.property, "items");
        assert_eq!(change.old, Value::List(vec![1.into(), 2.into()]));
        assert_eq!(change.new, Value::Scope(items));
        assert_eq!(raw(&store, items), json!([1, 2, 3]));
    }

    #[test]
    fn push_and_unshift_nothing_are_silent() {
        let (mut store, root) = setup(json!({"items": [1]}));
        let items = list(&mut store, root, "items");
        assert_eq!(store.push(items, Vec::new()), (1, None));
        assert_eq!(store.unshift(items, Vec::new()), (1, None));
    }

    #[test]
    fn pop_and_shift_on_empty_are_silent() {
        let (mut store, root) = setup(json!({"items": []}));
        let items = list(&mut store, root, "items");
        assert_eq!(store.pop(items), (None, None));
        assert_eq!(store.shift(items), (None, None));
    }

    #[test]
    fn pop_returns_raw_data_and_releases() {
        let (mut store, root) = setup(json!({"items": [{"id": 1}]}));
        let items = list(&mut store, root, "items");
        let element = store.items(items)[0].as_scope().unwrap();
        let (popped, change) = store.pop(items);
        assert_eq!(popped, Some(Value::from(json!({"id": 1}))));
        assert_eq!(change.unwrap().released, vec![element]);
    }

    #[test]
    fn splice_semantics() {
        let (mut store, root) = setup(json!({"items": [1, 2, 3, 4]}));
        let items = list(&mut store, root, "items");
        let (removed, change) = store.splice(items, 1, Some(2), vec![Value::from("x")]);
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert!(change.is_some());
        assert_eq!(raw(&store, items), json!([1, "x", 4]));

        let (removed, _) = store.splice(items, 10, None, Vec::new());
        assert!(removed.is_empty());
        let (removed, _) = store.splice(items, 1, None, Vec::new());
        assert_eq!(removed.len(), 2);
        assert_eq!(raw(&store, items), json!([1]));
    }

    #[test]
    fn reverse_and_sort_always_notify() {
        let (mut store, root) = setup(json!({"items": [3, 1, 2]}));
        let items = list(&mut store, root, "items");
        assert!(store.reverse(items).is_some());
        assert_eq!(raw(&store, items), json!([2, 1, 3]));
        assert!(store.sort_by(items, Value::loose_cmp).is_some());
        assert_eq!(raw(&store, items), json!([1, 2, 3]));
        assert!(store.sort_by(items, Value::loose_cmp).is_some());
    }

    #[test]
    fn fill_wraps_each_slot_separately() {
        let (mut store, root) = setup(json!({"items": [0, 0, 0]}));
        let items = list(&mut store, root, "items");
        store.fill(items, Value::from(json!({"v": 1})), 1..).unwrap();
        let slots = store.items(items);
        assert!(slots[0].as_scope().is_none());
        assert_ne!(slots[1], slots[2]);
        store.fill(items, Value::from(7), ..).unwrap();
        assert_eq!(raw(&store, items), json!([7, 7, 7]));
    }

    #[test]
    fn index_and_length_writes() {
        let (mut store, root) = setup(json!({"items": [1]}));
        let items = list(&mut store, root, "items");
        assert!(store.set_index(items, 0, Value::from(1)).is_none());
        assert!(store.set_index(items, 2, Value::from(3)).is_some());
        assert_eq!(raw(&store, items), json!([1, null, 3]));
        assert!(store.set_len(items, 3).is_none());
        assert!(store.set(items, "length", Value::from(1)).is_some());
        assert_eq!(raw(&store, items), json!([1]));
    }

    #[test]
    fn delete_index_always_notifies() {
        let (mut store, root) = setup(json!({"items": [1]}));
        let items = list(&mut store, root, "items");
        assert!(store.delete_index(items, 0).is_some());
        assert!(store.delete_index(items, 5).is_some());
        assert_eq!(raw(&store, items), json!([null]));
    }

    #[test]
    fn element_mutation_paths_through_index() {
        let (mut store, root) = setup(json!({"rows": [{"x": 1}, {"x": 2}]}));
        let rows = list(&mut store, root, "rows");
        let second = store.items(rows)[1].as_scope().unwrap();
        let change = store.set(second, "x", Value::from(5)).unwrap();
        assert_eq!(store.path_to(change.scope.unwrap(), &change.property).unwrap(), vec!["rows", "1", "x"]);
    }

    #[test]
    fn parentless_sequence_changes_have_no_watch_target() {
        let mut store = ScopeStore::new(1000);
        let items = store.create(None, Value::List(vec![1.into()]), None);
        let (_, change) = store.push(items, vec![Value::from(2)]);
        assert_eq!(change.unwrap().scope, None);
    }
}
