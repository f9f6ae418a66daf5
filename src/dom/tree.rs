//! Tree operations: insert, remove, splice, clone, walk.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{NodeData, NodeId, NodeKind};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// The host element tree, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps so that node removal is O(subtree size) and lookup is O(1).
/// Nodes without a parent are *detached*: they stay in the arena (template
/// content, freshly cloned fragments) but are not part of the live tree.
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl Dom {
    /// Create an empty DOM.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            root: None,
        }
    }

    /// Create a DOM whose root is an empty document node.
    pub fn document() -> Self {
        let mut dom = Self::new();
        dom.insert(NodeData::document());
        dom
    }

    /// Insert a detached node (no parent).
    ///
    /// If no root has been set yet, this node becomes the root.
    pub fn insert(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Insert a node as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics (debug) if `parent` does not exist in the tree.
    pub fn insert_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        debug_assert!(
            self.nodes.contains_key(parent),
            "parent node does not exist"
        );
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        self.attach(parent, id, None);
        id
    }

    /// Remove a node and all its descendants (template content included).
    ///
    /// Returns the `NodeData` for the removed node, or `None` if it didn't exist.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        if !self.nodes.contains_key(id) {
            return None;
        }

        self.detach(id);

        if self.root == Some(id) {
            self.root = None;
        }

        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);
        let mut removed_root_data = None;

        while let Some(current) = to_remove.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            self.parent.remove(current);
            let data = self.nodes.remove(current);
            if let Some(content) = data.as_ref().and_then(|d| d.content) {
                to_remove.push_back(content);
            }
            if current == id {
                removed_root_data = data;
            }
        }

        removed_root_data
    }

    /// Unlink a node from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent_id) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|&child| child != id);
            }
        }
    }

    /// Move `child` to become the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.nodes.contains_key(child), "child does not exist");
        debug_assert!(self.nodes.contains_key(parent), "parent does not exist");
        self.detach(child);
        self.attach(parent, child, None);
    }

    /// Insert `nodes`, in order, right after `reference` under the same parent.
    ///
    /// Returns `false` (and does nothing) when `reference` has no parent.
    pub fn insert_after(&mut self, reference: NodeId, nodes: &[NodeId]) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        for &node in nodes {
            self.detach(node);
        }
        let mut index = self.index_in_parent(reference).map_or(0, |i| i + 1);
        for &node in nodes {
            if !self.nodes.contains_key(node) {
                continue;
            }
            self.attach(parent, node, Some(index));
            index += 1;
        }
        true
    }

    /// Put `replacement` at `old`'s position. `old` ends up detached.
    pub fn replace_with(&mut self, old: NodeId, replacement: NodeId) {
        self.detach(replacement);
        let Some(parent) = self.parent(old) else {
            return;
        };
        let index = self.index_in_parent(old);
        self.detach(old);
        self.attach(parent, replacement, index);
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// The sibling immediately following `id`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Walk from `id` up to the topmost ancestor, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Whether `id` is part of the live tree (its ancestor chain reaches the root).
    pub fn is_connected(&self, id: NodeId) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        if !self.nodes.contains_key(id) {
            return false;
        }
        id == root || self.ancestors(id).last() == Some(&root)
    }

    /// Deep-copy `id` (children and template content included) into a new
    /// detached subtree.
    pub fn clone_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let mut data = self.nodes.get(id)?.clone();
        if let Some(content) = data.content {
            data.content = self.clone_subtree(content);
        }
        let copy = self.nodes.insert(data);
        self.children.insert(copy, Vec::new());
        let kids = self.children(id).to_vec();
        for kid in kids {
            if let Some(kid_copy) = self.clone_subtree(kid) {
                self.attach(copy, kid_copy, None);
            }
        }
        Some(copy)
    }

    /// The content node of a template.
    pub fn content(&self, template: NodeId) -> Option<NodeId> {
        self.nodes.get(template).and_then(|data| data.content)
    }

    /// Make `node` the content of `template`. The node is detached first.
    pub fn set_content(&mut self, template: NodeId, node: NodeId) {
        self.detach(node);
        if let Some(data) = self.nodes.get_mut(template) {
            data.content = Some(node);
        }
    }

    /// Concatenated text of all text nodes under `id` (template content excluded).
    pub fn text_content(&self, id: NodeId) -> String {
        self.walk_depth_first(id)
            .into_iter()
            .filter_map(|node| self.nodes.get(node))
            .filter(|data| data.kind == NodeKind::Text)
            .map(|data| data.text.as_str())
            .collect()
    }

    /// Replace everything under `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        let Some(data) = self.nodes.get_mut(id) else {
            return;
        };
        if data.kind == NodeKind::Text {
            data.text = text.to_owned();
            return;
        }
        for kid in self.children(id).to_vec() {
            self.remove(kid);
        }
        if !text.is_empty() {
            self.insert_child(id, NodeData::text(text));
        }
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// Attribute value of a node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|data| data.attr(name))
    }

    /// The current root node, if set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Explicitly set the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of nodes in the arena (live and detached).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the DOM is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the DOM contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    ///
    /// Template content is not visited.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            let kids = self.children(current);
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        self.parent.insert(child, parent);
        let Some(siblings) = self.children.get_mut(parent) else {
            return;
        };
        match index {
            Some(i) if i <= siblings.len() => siblings.insert(i, child),
            _ => siblings.push(child),
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}
