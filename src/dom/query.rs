//! DOM queries: attribute lookups, placeholders, generic predicate matching.
//!
//! Every query walks the subtree below `start` in document order and never
//! descends into template content, mirroring `querySelectorAll` semantics.

use super::node::{NodeData, NodeId};
use super::tree::Dom;

/// Value of the `type` attribute that marks an engine placeholder.
pub const PLACEHOLDER_TYPE: &str = "bjs";

impl Dom {
    /// All descendants of `start` (excluding `start`) carrying attribute `name`.
    pub fn query_attr(&self, start: NodeId, name: &str) -> Vec<NodeId> {
        self.query_all(start, |data| data.is_element() && data.has_attr(name))
    }

    /// All descendants of `start` carrying at least one of `names`.
    pub fn query_any_attr(&self, start: NodeId, names: &[&str]) -> Vec<NodeId> {
        self.query_all(start, |data| {
            data.is_element() && names.iter().any(|name| data.has_attr(name))
        })
    }

    /// All engine placeholders below `start`.
    pub fn query_placeholders(&self, start: NodeId) -> Vec<NodeId> {
        self.query_all(start, |data| {
            data.is_template() && data.attr("type") == Some(PLACEHOLDER_TYPE)
        })
    }

    /// First node in the whole live tree whose tag matches.
    pub fn query_tag(&self, tag: &str) -> Option<NodeId> {
        let root = self.root()?;
        self.walk_depth_first(root)
            .into_iter()
            .find(|&id| self.get(id).is_some_and(|data| data.tag == tag))
    }

    /// All descendants of `start` (excluding `start`) matching a predicate.
    pub fn query_all(&self, start: NodeId, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.walk_depth_first(start)
            .into_iter()
            .skip(1)
            .filter(|&id| self.get(id).is_some_and(&predicate))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::node::NodeData;
    use crate::dom::tree::Dom;

    /// Build a test tree for queries:
    /// ```text
    ///        document
    ///       /        \
    ///   ul[bfor]    template(type=bjs)
    ///    /   \            :
    ///  li    li[btext]    : content: p[btext] (not visited)
    /// ```
    fn build_query_tree() -> Dom {
        let mut dom = Dom::document();
        let root = dom.root().unwrap();
        let ul = dom.insert_child(root, NodeData::element("ul").with_attr("bfor", "items"));
        dom.insert_child(ul, NodeData::element("li"));
        dom.insert_child(ul, NodeData::element("li").with_attr("btext", "name"));
        let tpl = dom.insert_child(
            root,
            NodeData::template()
                .with_attr("type", "bjs")
                .with_attr("directive", "bif"),
        );
        let hidden = dom.insert(NodeData::element("p").with_attr("btext", "hidden"));
        dom.set_content(tpl, hidden);
        dom
    }

    #[test]
    fn query_attr_skips_template_content() {
        let dom = build_query_tree();
        let root = dom.root().unwrap();
        let found = dom.query_attr(root, "btext");
        assert_eq!(found.len(), 1);
        assert_eq!(dom.attr(found[0], "btext"), Some("name"));
    }

    #[test]
    fn query_attr_excludes_start() {
        let dom = build_query_tree();
        let ul = dom.query_attr(dom.root().unwrap(), "bfor")[0];
        assert!(dom.query_attr(ul, "bfor").is_empty());
    }

    #[test]
    fn query_any_attr_document_order() {
        let dom = build_query_tree();
        let found = dom.query_any_attr(dom.root().unwrap(), &["btext", "bfor"]);
        let tags: Vec<_> = found.iter().map(|&id| dom.get(id).unwrap().tag.as_str()).collect();
        assert_eq!(tags, vec!["ul", "li"]);
    }

    #[test]
    fn query_placeholders() {
        let dom = build_query_tree();
        let found = dom.query_placeholders(dom.root().unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(dom.attr(found[0], "directive"), Some("bif"));
    }

    #[test]
    fn query_tag() {
        let dom = build_query_tree();
        assert!(dom.query_tag("ul").is_some());
        assert!(dom.query_tag("p").is_none());
    }

    #[test]
    fn query_all_empty() {
        let dom = build_query_tree();
        assert!(dom.query_all(dom.root().unwrap(), |d| d.tag == "table").is_empty());
    }
}
