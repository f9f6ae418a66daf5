//! Render passes: placeholder evaluation and injector application.

use tracing::{debug, error, warn};

use super::registry::DirectiveCall;
use crate::dom::NodeId;
use crate::engine::Engine;
use crate::error::Error;
use crate::event::EventTarget;
use crate::scope::ScopeId;
use crate::value::Value;

/// Per-placeholder memory between evaluations.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RenderState {
    /// Value the directive returned last time.
    pub previous: Value,
    /// Elements currently materialized right after the placeholder.
    pub rendered: usize,
}

impl Engine {
    /// Full pass: evaluate every attached placeholder against `scope`, then
    /// apply injectors and discover bound controls tree-wide.
    ///
    /// Detached placeholders are skipped but stay registered.
    pub(crate) fn evaluate_templates(&mut self, scope: ScopeId) -> Result<(), Error> {
        let connected: Vec<NodeId> = self
            .templates
            .iter()
            .copied()
            .filter(|&t| self.dom.is_connected(t))
            .collect();
        debug!(
            connected = connected.len(),
            registered = self.templates.len(),
            "render pass"
        );
        for template in connected {
            self.evaluate_template(template, scope, 1);
        }
        self.apply_values(scope);
        self.find_binds(scope)
    }

    /// Evaluate one placeholder and splice its fragment.
    ///
    /// Nested placeholders inside produced elements are evaluated against the
    /// element's scope before the fragment is inserted. Descent stops at the
    /// configured depth.
    pub(crate) fn evaluate_template(&mut self, template: NodeId, scope: ScopeId, depth: usize) {
        let limit = self.config.max_template_depth;
        if depth >= limit {
            warn!(limit, "max template recursion reached");
            return;
        }
        let attr = |name: &str| {
            self.dom
                .attr(template, name)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let (Some(directive), Some(expr)) = (attr("directive"), attr("expr")) else {
            return;
        };
        let Some(function) = self.plugins.directive(&directive) else {
            error!(directive = %directive, "function is not defined for directive");
            return;
        };

        let state = self.render_state.get(template).cloned().unwrap_or_default();
        let content = self.dom.content(template);
        let rendered = function(
            self,
            DirectiveCall {
                scope,
                content,
                expr: &expr,
                previous: &state.previous,
                directive: &directive,
            },
        );
        debug!(
            directive = %directive,
            expr = %expr,
            to_render = rendered.to_render,
            elements = rendered.elements.len(),
            "template evaluated"
        );

        // The directive may have re-entered a pass that replaced the fragment.
        let materialized = self.rendered_count(template);
        let produced: Vec<NodeId> = rendered.elements.iter().map(|&(node, _)| node).collect();
        if rendered.to_render {
            self.remove_fragment(template, materialized, &produced);
        }
        for &(element, local) in &rendered.elements {
            for nested in self.dom.query_placeholders(element) {
                self.evaluate_template(nested, local, depth + 1);
            }
        }

        let mut count = materialized;
        if rendered.to_render {
            count = 0;
            if self.dom.insert_after(template, &produced) {
                count = produced.len();
            } else {
                self.discard_detached(&produced);
            }
        } else {
            self.discard_detached(&produced);
        }

        self.render_state.insert(
            template,
            RenderState {
                previous: rendered.value,
                rendered: count,
            },
        );
        self.apply_values(scope);
    }

    /// Remove the `count` elements following `template`. Elements listed in
    /// `keep` are only detached; the rest are deleted.
    fn remove_fragment(&mut self, template: NodeId, count: usize, keep: &[NodeId]) {
        for _ in 0..count {
            let Some(next) = self.dom.next_sibling(template) else {
                break;
            };
            if keep.contains(&next) {
                self.dom.detach(next);
            } else {
                self.delete_subtree(next);
            }
        }
    }

    /// Delete produced elements that did not make it into the tree.
    fn discard_detached(&mut self, nodes: &[NodeId]) {
        for &node in nodes {
            if self.dom.contains(node) && self.dom.parent(node).is_none() && self.dom.root() != Some(node) {
                self.delete_subtree(node);
            }
        }
    }

    /// Delete `node` with its subtree, dropping everything the engine keeps
    /// for those nodes.
    pub(crate) fn delete_subtree(&mut self, node: NodeId) {
        for id in self.dom.walk_depth_first(node) {
            self.scopes.release_element(id);
            self.render_state.remove(id);
            self.bound.remove(id);
            self.listeners.clear_target(EventTarget::Node(id));
        }
        self.dom.remove(node);
    }

    /// Run every injector on the element of `scope` and its descendants.
    ///
    /// Each call receives the scope that owns the element, falling back to
    /// `scope`.
    pub(crate) fn apply_values(&mut self, scope: ScopeId) {
        let Some(element) = self.scopes.element_of(scope).or_else(|| self.dom.root()) else {
            return;
        };
        for (name, injector) in self.plugins.injectors() {
            let own = self.dom.get(element).is_some_and(|d| d.is_element() && d.has_attr(&name));
            let mut targets = if own { vec![element] } else { Vec::new() };
            targets.extend(self.dom.query_attr(element, &name));
            for target in targets {
                let Some(value) = self.dom.attr(target, &name).map(str::to_owned) else {
                    continue;
                };
                let owner = self.scopes.scope_of(&self.dom, target).unwrap_or(scope);
                injector(self, owner, target, &value, &name);
            }
        }
    }

    /// Number of elements currently materialized after `template`.
    pub fn rendered_count(&self, template: NodeId) -> usize {
        self.render_state.get(template).map_or(0, |s| s.rendered)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use crate::dom::{parse_markup, to_markup, NodeData};
    use crate::engine::{Engine, EngineBuilder};
    use crate::template::{DirectiveCall, Rendered};
    use crate::value::Value;

    /// Directive rendering one clone of the content per element of the
    /// sequence named by `expr`, each against a scope holding `item`.
    fn each(engine: &mut Engine, call: DirectiveCall<'_>) -> Rendered {
        let items = engine
            .resolve(call.scope, call.expr)
            .and_then(|v| v.as_scope())
            .map(|list| engine.items(list))
            .unwrap_or_default();
        let mut elements = Vec::new();
        for item in items {
            let Some(clone) = call.content.and_then(|c| engine.dom_mut().clone_subtree(c)) else {
                continue;
            };
            let local = engine.create_scope(Some(clone), Value::map([("item", item)]), Some(call.scope));
            elements.push((clone, local));
        }
        Rendered::render(Value::Null, elements)
    }

    /// Injector writing the display text of the looked-up name.
    fn text(engine: &mut Engine, scope: crate::scope::ScopeId, node: crate::dom::NodeId, expr: &str, _: &str) {
        let value = engine.resolve(scope, expr).unwrap_or_default();
        let shown = engine.display(&value);
        engine.dom_mut().set_text_content(node, &shown);
    }

    fn list_engine(markup: &str, data: serde_json::Value) -> Engine {
        EngineBuilder::new()
            .directive("bfor", each)
            .injector("btext", text)
            .build(parse_markup(markup).unwrap(), Value::from(data))
            .unwrap()
    }

    fn body(engine: &Engine) -> String {
        to_markup(engine.dom(), engine.dom().root().unwrap())
    }

    #[test]
    fn first_pass_materializes_and_injects() {
        let engine = list_engine(r#"<ul><li bfor="items" btext="item"></li></ul>"#, serde_json::json!({"items": ["a", "b"]}));
        insta::assert_snapshot!(
            body(&engine),
            @r#"<ul><template type="bjs" directive="bfor" expr="items"><li btext="item"></li></template><li btext="item">a</li><li btext="item">b</li></ul>"#
        );
        assert_eq!(engine.rendered_count(engine.templates()[0]), 2);
    }

    #[test]
    fn rerender_replaces_previous_fragment() {
        let mut engine = list_engine(r#"<ul><li bfor="items" btext="item"></li></ul>"#, serde_json::json!({"items": [1, 2, 3]}));
        let root = engine.root_scope();
        let nodes_before = engine.dom().len();
        let items = engine.get(root, "items").and_then(|v| v.as_scope()).unwrap();
        engine.pop(items).unwrap();
        engine.pop(items).unwrap();
        engine.push(items, vec![Value::from(4), Value::from(5)]).unwrap();
        engine.reverse(items).unwrap();
        insta::assert_snapshot!(
            body(&engine),
            @r#"<ul><template type="bjs" directive="bfor" expr="items"><li btext="item"></li></template><li btext="item">5</li><li btext="item">4</li><li btext="item">1</li></ul>"#
        );
        assert_eq!(engine.dom().len(), nodes_before);
    }

    #[test]
    fn keep_leaves_fragment_and_skips_removal() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = calls.clone();
        let mut engine = EngineBuilder::new()
            .directive("bonce", move |engine: &mut Engine, call: DirectiveCall<'_>| {
                seen.borrow_mut().push(call.previous.clone());
                if call.previous.is_truthy() {
                    return Rendered::keep(call.previous.clone());
                }
                let Some(clone) = call.content.and_then(|c| engine.dom_mut().clone_subtree(c)) else {
                    return Rendered::keep(Value::Null);
                };
                Rendered::render(Value::from(true), vec![(clone, call.scope)])
            })
            .build(parse_markup(r#"<p bonce="x">hi</p>"#).unwrap(), Value::from(serde_json::json!({"n": 0})))
            .unwrap();
        let root = engine.root_scope();
        engine.set(root, "n", Value::from(1)).unwrap();
        assert_eq!(body(&engine), r#"<template type="bjs" directive="bonce" expr="x"><p>hi</p></template><p>hi</p>"#);
        assert_eq!(*calls.borrow(), vec![Value::Null, Value::from(true)]);
        assert_eq!(engine.rendered_count(engine.templates()[0]), 1);
    }

    #[test]
    fn unrendered_elements_are_discarded() {
        let mut engine = EngineBuilder::new()
            .directive("bghost", |engine: &mut Engine, call: DirectiveCall<'_>| {
                let node = engine.dom_mut().insert(NodeData::element("aside"));
                Rendered {
                    value: Value::Null,
                    to_render: false,
                    elements: vec![(node, call.scope)],
                }
            })
            .build(parse_markup(r#"<p bghost="x"></p>"#).unwrap(), Value::Null)
            .unwrap();
        let before = engine.dom().len();
        engine.render().unwrap();
        assert_eq!(engine.dom().len(), before);
        assert_eq!(engine.rendered_count(engine.templates()[0]), 0);
    }

    #[test]
    fn nested_placeholders_use_fragment_scope() {
        let engine = list_engine(
            r#"<div bfor="rows"><span bfor="item.cells" btext="item"></span></div>"#,
            serde_json::json!({"rows": [{"cells": [1, 2]}, {"cells": [3]}]}),
        );
        insta::assert_snapshot!(
            body(&engine),
            @r#"<template type="bjs" directive="bfor" expr="rows"><div><template type="bjs" directive="bfor" expr="item.cells"><span btext="item"></span></template></div></template><div><template type="bjs" directive="bfor" expr="item.cells"><span btext="item"></span></template><span btext="item">1</span><span btext="item">2</span></div><div><template type="bjs" directive="bfor" expr="item.cells"><span btext="item"></span></template><span btext="item">3</span></div>"#
        );
    }

    #[test]
    fn depth_ceiling_stops_descent() {
        let engine = EngineBuilder::new()
            .config(crate::config::EngineConfig::new().with_max_template_depth(2))
            .directive("bfor", each)
            .injector("btext", text)
            .build(
                parse_markup(r#"<div bfor="rows"><span bfor="item.cells" btext="item"></span></div>"#).unwrap(),
                Value::from(serde_json::json!({"rows": [{"cells": [1]}]})),
            )
            .unwrap();
        insta::assert_snapshot!(
            body(&engine),
            @r#"<template type="bjs" directive="bfor" expr="rows"><div><template type="bjs" directive="bfor" expr="item.cells"><span btext="item"></span></template></div></template><div><template type="bjs" directive="bfor" expr="item.cells"><span btext="item"></span></template></div>"#
        );
    }

    #[test]
    fn detached_placeholders_are_skipped_not_evicted() {
        let mut engine = list_engine(r#"<section><li bfor="items" btext="item"></li></section>"#, serde_json::json!({"items": [1]}));
        let template = engine.templates()[0];
        let section = engine.dom().parent(template).unwrap();
        engine.dom_mut().detach(section);
        let root = engine.root_scope();
        let items = engine.get(root, "items").and_then(|v| v.as_scope()).unwrap();
        engine.push(items, vec![Value::from(2)]).unwrap();
        assert_eq!(engine.templates(), &[template]);
        assert_eq!(engine.rendered_count(template), 1);
    }
}
