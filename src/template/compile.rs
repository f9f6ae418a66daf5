//! Placeholder compilation.

use tracing::debug;

use crate::dom::{NodeData, NodeId, PLACEHOLDER_TYPE};
use crate::engine::Engine;

impl Engine {
    /// Replace every element carrying a registered directive attribute with a
    /// placeholder that holds the element as its content.
    ///
    /// Matches are processed innermost-first so nested directive elements are
    /// already placeholders when their ancestor is captured. The returned list
    /// is in document order. The first registered directive present on an
    /// element wins; its attribute moves to the placeholder as `expr`.
    pub(crate) fn create_templates(&mut self) -> Vec<NodeId> {
        let names = self.plugins.directive_names();
        let Some(root) = self.dom.root() else {
            return Vec::new();
        };
        if names.is_empty() {
            return Vec::new();
        }

        let selectors: Vec<&str> = names.iter().map(String::as_str).collect();
        let matches = self.dom.query_any_attr(root, &selectors);
        let mut templates = Vec::with_capacity(matches.len());
        for element in matches.into_iter().rev() {
            let Some(data) = self.dom.get_mut(element) else {
                continue;
            };
            let Some(directive) = names.iter().find(|name| data.has_attr(name)) else {
                continue;
            };
            let expr = data.remove_attr(directive).unwrap_or_default();
            let placeholder = self.dom.insert(
                NodeData::template()
                    .with_attr("type", PLACEHOLDER_TYPE)
                    .with_attr("directive", directive.as_str())
                    .with_attr("expr", expr),
            );
            self.dom.replace_with(element, placeholder);
            self.dom.set_content(placeholder, element);
            templates.push(placeholder);
        }
        templates.reverse();
        debug!(count = templates.len(), "placeholders compiled");
        templates
    }
}
