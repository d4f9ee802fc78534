//! Element tree assembly.
//!
//! Turns the flat token stream into an [`ElementTree`], matching closing tags
//! against open elements. Structural problems are collected so that a single
//! read reports all of them.

use indexmap::IndexMap;
use log::debug;

use canopy_core::tree::{Element, ElementId, ElementTree};

use crate::{
    Span,
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    tokens::{Attribute, PositionedToken, Token},
};

struct OpenElement<'a> {
    id: ElementId,
    name: &'a str,
    span: Span,
}

/// Assembles tokens into a tree.
struct TreeAssembler<'a> {
    tree: ElementTree,
    open: Vec<OpenElement<'a>>,
    diagnostics: DiagnosticCollector,
}

impl<'a> TreeAssembler<'a> {
    fn new() -> Self {
        Self {
            tree: ElementTree::new(),
            open: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    fn parent(&self) -> Option<ElementId> {
        self.open.last().map(|open| open.id)
    }

    fn attributes(&mut self, attributes: &[Attribute<'a>]) -> IndexMap<String, String> {
        let mut map: IndexMap<String, String> = IndexMap::with_capacity(attributes.len());
        let mut first_spans: IndexMap<&str, Span> = IndexMap::new();
        for attr in attributes {
            if let Some(first) = first_spans.get(attr.name) {
                self.diagnostics.emit(
                    Diagnostic::error(format!("attribute `{}` is given twice", attr.name))
                        .with_code(ErrorCode::E103)
                        .with_label(attr.span, "duplicate attribute")
                        .with_secondary_label(*first, "first given here"),
                );
                continue;
            }
            first_spans.insert(attr.name, attr.span);
            map.insert(attr.name.to_string(), attr.value.clone());
        }
        map
    }

    fn start_tag(
        &mut self,
        name: &'a str,
        attributes: &[Attribute<'a>],
        self_closing: bool,
        span: Span,
    ) {
        let attributes = self.attributes(attributes);
        let id = self
            .tree
            .add_element(self.parent(), Element::new(name, attributes), span);
        if !self_closing {
            self.open.push(OpenElement { id, name, span });
        }
    }

    fn end_tag(&mut self, name: &str, span: Span) {
        let Some(position) = self.open.iter().rposition(|open| open.name == name) else {
            self.diagnostics.emit(
                Diagnostic::error(format!("closing tag `{}` has no open element", name))
                    .with_code(ErrorCode::E100)
                    .with_label(span, "nothing to close"),
            );
            return;
        };

        // Elements opened after the match are implicitly closed, with an error each.
        for unclosed in self.open.drain(position + 1..).rev() {
            self.diagnostics.emit(
                Diagnostic::error(format!(
                    "closing tag `{}` does not match `{}`",
                    name, unclosed.name
                ))
                .with_code(ErrorCode::E100)
                .with_label(span, format!("expected `</{}>`", unclosed.name))
                .with_secondary_label(unclosed.span, "opened here"),
            );
        }
        self.open.pop();
    }

    fn text(&mut self, text: &str, span: Span, verbatim: bool) {
        if !verbatim && text.trim().is_empty() {
            return;
        }
        match self.parent() {
            Some(parent) => {
                self.tree.add_text(Some(parent), text, span);
            }
            None => self.diagnostics.emit(
                Diagnostic::error("text outside of any element")
                    .with_code(ErrorCode::E002)
                    .with_label(span, "not inside an element")
                    .with_help("wrap the text in an element or remove it"),
            ),
        }
    }

    fn assemble(mut self, tokens: &[PositionedToken<'a>]) -> Result<ElementTree, ParseError> {
        for PositionedToken { token, span } in tokens {
            match token {
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => self.start_tag(*name, attributes, *self_closing, *span),
                Token::EndTag(name) => self.end_tag(name, *span),
                Token::Text(text) => self.text(text, *span, false),
                Token::CData(text) => self.text(text, *span, true),
                Token::Comment | Token::Declaration => {}
            }
        }

        for unclosed in std::mem::take(&mut self.open) {
            self.diagnostics.emit(
                Diagnostic::error(format!("element `{}` is never closed", unclosed.name))
                    .with_code(ErrorCode::E101)
                    .with_label(unclosed.span, "opened here")
                    .with_help(format!("add `</{}>`", unclosed.name)),
            );
        }

        if self.tree.document_element().is_none() {
            self.diagnostics.emit(
                Diagnostic::error("document contains no element")
                    .with_code(ErrorCode::E102)
                    .with_label(Span::default(), "expected a root element"),
            );
        }

        let Self {
            tree, diagnostics, ..
        } = self;
        diagnostics.finish()?;
        debug!(nodes = tree.len(), roots = tree.roots().len(); "Assembled element tree");
        Ok(tree)
    }
}

/// Assemble a token stream into an element tree.
///
/// Several top-level elements are allowed, so document fragments can be read
/// as well as whole documents.
///
/// # Errors
///
/// Returns every structural error found: mismatched or unclosed tags,
/// duplicate attributes, stray text and a missing root element.
pub fn assemble(tokens: &[PositionedToken<'_>]) -> Result<ElementTree, ParseError> {
    TreeAssembler::new().assemble(tokens)
}
