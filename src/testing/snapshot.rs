//! Snapshot rendering helpers.
//!
//! Functions for converting a document subtree into an indented plain-text
//! outline suitable for snapshot testing and assertions.

use crate::dom::{Dom, NodeId, NodeKind};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render `id` and its subtree as an indented outline, two spaces per level.
///
/// Elements print as `tag attr="value"`, text nodes as their quoted text, and
/// form controls append `value="…"`. Template content is listed under a
/// `#content` line.
///
/// # Examples
///
/// ```
/// use bjs::dom::parse_markup;
/// use bjs::testing::outline;
///
/// let dom = parse_markup(r#"<ul id="x"><li>a</li></ul>"#).unwrap();
/// assert_eq!(outline(&dom, dom.root().unwrap()), "#document\n  ul id=\"x\"\n    li\n      \"a\"");
/// ```
pub fn outline(dom: &Dom, id: NodeId) -> String {
    let mut lines = Vec::new();
    write_outline(dom, id, 0, &mut lines);
    lines.join("\n")
}

fn write_outline(dom: &Dom, id: NodeId, depth: usize, lines: &mut Vec<String>) {
    let Some(data) = dom.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    match data.kind {
        NodeKind::Text => lines.push(format!("{indent}{:?}", data.text)),
        NodeKind::Document => lines.push(format!("{indent}#document")),
        NodeKind::Element | NodeKind::Template => {
            let mut line = format!("{indent}{}", data.tag);
            for (name, value) in &data.attributes {
                if value.is_empty() {
                    line.push_str(&format!(" {name}"));
                } else {
                    line.push_str(&format!(" {name}={value:?}"));
                }
            }
            if let Some(value) = &data.value {
                line.push_str(&format!(" value={value:?}"));
            }
            lines.push(line);
            if let Some(content) = data.content {
                lines.push(format!("{indent}  #content"));
                write_outline(dom, content, depth + 2, lines);
            }
        }
    }
    for &kid in dom.children(id) {
        write_outline(dom, kid, depth + 1, lines);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
