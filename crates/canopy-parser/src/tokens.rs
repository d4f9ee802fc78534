//! Markup tokens produced by the lexer.

use crate::Span;

/// An attribute of a start tag, with its value already entity-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: String,
    pub span: Span,
}

/// One markup construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<name attr="v">` or `<name attr="v"/>`.
    StartTag {
        name: &'a str,
        attributes: Vec<Attribute<'a>>,
        self_closing: bool,
    },
    /// `</name>`.
    EndTag(&'a str),
    /// Character data with entities decoded.
    Text(String),
    /// `<![CDATA[...]]>` content, verbatim.
    CData(&'a str),
    /// `<!-- ... -->`.
    Comment,
    /// `<?...?>` or `<!DOCTYPE ...>`.
    Declaration,
}

/// A token together with the source span it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedToken<'a> {
    pub token: Token<'a>,
    pub span: Span,
}

impl<'a> PositionedToken<'a> {
    pub fn new(token: Token<'a>, span: Span) -> Self {
        Self { token, span }
    }
}
