//! logos-based markup reader and a compact serializer.
//!
//! The lexer runs in two modes that morph into each other: [`ContentToken`]
//! between tags and [`TagToken`] inside an opening tag. The builder keeps a
//! stack of open elements and is lenient the way browsers are: void elements
//! never take children and unclosed elements are closed at end of input.
//! `<template>` elements become placeholders whose first element child is
//! moved into the template content.

use logos::{Lexer, Logos};

use super::node::{NodeData, NodeId, NodeKind};
use super::tree::Dom;

/// Elements that never have children or a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// Errors from reading markup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkupError {
    #[error("unexpected token at byte {position}: {message}")]
    UnexpectedToken { position: usize, message: String },
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),
    #[error("closing tag </{tag}> at byte {position} has no matching open element")]
    UnmatchedClose { tag: String, position: usize },
}

/// Tokens between tags.
#[derive(Logos, Debug, Clone, PartialEq)]
enum ContentToken {
    /// `<!-- ... -->`
    #[regex(r"<!--([^-]|-[^-])*-->")]
    Comment,

    /// `<div`: the start of an opening tag; attributes follow in tag mode.
    #[regex(r"<[a-zA-Z][a-zA-Z0-9-]*")]
    OpenTag,

    /// `</div>`
    #[regex(r"</[a-zA-Z][a-zA-Z0-9-]*[ \t\r\n]*>")]
    CloseTag,

    /// A stray `<` that starts no tag is plain text.
    #[token("<")]
    Lt,

    #[regex(r"[^<]+")]
    Text,
}

/// Tokens inside an opening tag.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum TagToken {
    /// `/>`
    #[token("/>")]
    SelfClose,

    /// `>`
    #[token(">")]
    End,

    /// `=`
    #[token("=")]
    Eq,

    /// Quoted attribute value, either quote style.
    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    Quoted,

    /// Attribute name (also accepted as an unquoted value).
    #[regex(r"[a-zA-Z_:@][a-zA-Z0-9_:.\-]*")]
    Name,

    /// Unquoted value that cannot be a name, e.g. `3` or `#top`.
    #[regex(r"[0-9#%+\-][^ \t\r\n\f/\x22'=<>`]*")]
    Bare,
}

/// Parse markup into a fresh document.
pub fn parse_markup(input: &str) -> Result<Dom, MarkupError> {
    let mut builder = Builder::new();
    let mut content = ContentToken::lexer(input);

    while let Some(token) = content.next() {
        let position = content.span().start;
        match token {
            Ok(ContentToken::Comment) => {}
            Ok(ContentToken::Text) | Ok(ContentToken::Lt) => builder.text(content.slice()),
            Ok(ContentToken::CloseTag) => {
                let tag = content.slice()[2..]
                    .trim_end_matches('>')
                    .trim()
                    .to_ascii_lowercase();
                builder.close(&tag, position)?;
            }
            Ok(ContentToken::OpenTag) => {
                let tag = content.slice()[1..].to_ascii_lowercase();
                let mut tag_lexer = content.morph::<TagToken>();
                let (attributes, self_closing) = read_attributes(&mut tag_lexer)?;
                content = tag_lexer.morph();
                builder.open(tag, attributes, self_closing);
            }
            Err(()) => {
                return Err(MarkupError::UnexpectedToken {
                    position,
                    message: format!("cannot read `{}`", content.slice()),
                })
            }
        }
    }

    Ok(builder.finish())
}

/// Read attributes up to and including the closing `>` or `/>`.
fn read_attributes(
    lexer: &mut Lexer<'_, TagToken>,
) -> Result<(Vec<(String, String)>, bool), MarkupError> {
    let mut attributes = Vec::new();
    let mut pending: Option<String> = None;
    let mut expect_value = false;

    while let Some(token) = lexer.next() {
        let position = lexer.span().start;
        let slice = lexer.slice();
        match token {
            Ok(TagToken::Name) | Ok(TagToken::Bare) if expect_value => {
                let name = pending.take().unwrap_or_default();
                attributes.push((name, slice.to_owned()));
                expect_value = false;
            }
            Ok(TagToken::Quoted) if expect_value => {
                let name = pending.take().unwrap_or_default();
                attributes.push((name, decode_entities(&slice[1..slice.len() - 1])));
                expect_value = false;
            }
            Ok(TagToken::Name) => {
                if let Some(name) = pending.replace(slice.to_ascii_lowercase()) {
                    attributes.push((name, String::new()));
                }
            }
            Ok(TagToken::Eq) if pending.is_some() && !expect_value => expect_value = true,
            Ok(end @ (TagToken::End | TagToken::SelfClose)) if !expect_value => {
                if let Some(name) = pending.take() {
                    attributes.push((name, String::new()));
                }
                return Ok((attributes, end == TagToken::SelfClose));
            }
            _ => {
                return Err(MarkupError::UnexpectedToken {
                    position,
                    message: format!("unexpected `{slice}` inside a tag"),
                })
            }
        }
    }

    Err(MarkupError::UnexpectedEof("unterminated tag".to_owned()))
}

/// Tree builder driven by the token loop.
struct Builder {
    dom: Dom,
    stack: Vec<NodeId>,
    /// Raw text seen since the last tag, flushed as one text node.
    text: String,
}

impl Builder {
    fn new() -> Self {
        let dom = Dom::document();
        let stack = dom.root().into_iter().collect();
        Self {
            dom,
            stack,
            text: String::new(),
        }
    }

    fn top(&self) -> NodeId {
        // The document root is never popped.
        self.stack[self.stack.len() - 1]
    }

    fn open(&mut self, tag: String, attributes: Vec<(String, String)>, self_closing: bool) {
        self.flush_text();
        let mut data = if tag == "template" {
            NodeData::template()
        } else {
            NodeData::element(tag)
        };
        for (name, value) in attributes {
            data.set_attr(name, value);
        }
        let is_void = VOID_TAGS.contains(&data.tag.as_str());
        let parent = self.top();
        let id = self.dom.insert_child(parent, data);
        if !self_closing && !is_void {
            self.stack.push(id);
        }
    }

    fn text(&mut self, raw: &str) {
        self.text.push_str(raw);
    }

    fn flush_text(&mut self) {
        let decoded = decode_entities(&std::mem::take(&mut self.text));
        if !decoded.trim().is_empty() {
            let parent = self.top();
            self.dom.insert_child(parent, NodeData::text(decoded));
        }
    }

    fn close(&mut self, tag: &str, position: usize) -> Result<(), MarkupError> {
        self.flush_text();
        let open_at = self
            .stack
            .iter()
            .skip(1)
            .rposition(|&id| self.dom.get(id).is_some_and(|data| data.tag == tag))
            .map(|i| i + 1)
            .ok_or_else(|| MarkupError::UnmatchedClose {
                tag: tag.to_owned(),
                position,
            })?;
        while self.stack.len() > open_at {
            if let Some(id) = self.stack.pop() {
                self.seal(id);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Dom {
        self.flush_text();
        while self.stack.len() > 1 {
            if let Some(id) = self.stack.pop() {
                self.seal(id);
            }
        }
        self.dom
    }

    /// Move a closed template's first element child into its content.
    fn seal(&mut self, id: NodeId) {
        if !self.dom.get(id).is_some_and(NodeData::is_template) {
            return;
        }
        let kids = self.dom.children(id).to_vec();
        let first_element = kids
            .iter()
            .copied()
            .find(|&kid| self.dom.get(kid).is_some_and(NodeData::is_element));
        if let Some(content) = first_element {
            self.dom.set_content(id, content);
        }
        for kid in kids.into_iter().filter(|&kid| Some(kid) != first_element) {
            self.dom.remove(kid);
        }
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn escape(text: &str, quote: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quote => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Serialize `id` and its subtree to compact markup.
///
/// Templates are written with their content inline so the output reads
/// back into an equivalent tree.
pub fn to_markup(dom: &Dom, id: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, &mut out);
    out
}

fn write_node(dom: &Dom, id: NodeId, out: &mut String) {
    let Some(data) = dom.get(id) else {
        return;
    };
    match data.kind {
        NodeKind::Document => {
            for &kid in dom.children(id) {
                write_node(dom, kid, out);
            }
        }
        NodeKind::Text => out.push_str(&escape(&data.text, false)),
        NodeKind::Element | NodeKind::Template => {
            out.push('<');
            out.push_str(&data.tag);
            for (name, value) in &data.attributes {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape(value, true));
                    out.push('"');
                }
            }
            out.push('>');
            if VOID_TAGS.contains(&data.tag.as_str()) {
                return;
            }
            if let Some(content) = data.content {
                write_node(dom, content, out);
            }
            for &kid in dom.children(id) {
                write_node(dom, kid, out);
            }
            out.push_str("</");
            out.push_str(&data.tag);
            out.push('>');
        }
    }
}
