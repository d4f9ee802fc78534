//! Markup lexer.
//!
//! Splits document text into [`Token`]s: tags with their attributes, text,
//! CDATA sections, comments and declarations. Entity references in text and
//! attribute values are decoded here. Scanning stops at the first error.

use log::trace;
use winnow::{
    Parser as _,
    ascii::{Caseless, multispace0, multispace1},
    combinator::{alt, cut_err, delimited, preceded, repeat, terminated},
    error::{AddContext, ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{literal, none_of, take_till, take_until, take_while},
};

use crate::{
    Span,
    error::{Diagnostic, ErrorCode, ParseError},
    tokens::{Attribute, PositionedToken, Token},
};

/// Diagnostic details attached to winnow errors via `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MarkupDiagnostic {
    code: ErrorCode,
    message: &'static str,
    help: Option<&'static str>,
    /// The error span covers from `start` to the error position.
    start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = ModalResult<O, ContextError<MarkupDiagnostic>>;

fn commit<O>(input: &Input<'_>, diagnostic: MarkupDiagnostic) -> IResult<O> {
    Err(ErrMode::Cut(ContextError::new().add_context(
        input,
        &input.checkpoint(),
        diagnostic,
    )))
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// `&name;`, `&#NN;` or `&#xHH;`.
fn entity(input: &mut Input<'_>) -> IResult<char> {
    let start = input.current_token_start();
    preceded(
        '&',
        cut_err(
            terminated(
                take_while(1..=12, |c: char| c.is_ascii_alphanumeric() || c == '#'),
                ';',
            )
            .verify_map(decode_entity),
        )
        .context(MarkupDiagnostic {
            code: ErrorCode::E004,
            message: "unknown entity",
            help: Some("use `&lt;`, `&gt;`, `&amp;`, `&quot;`, `&apos;` or a numeric reference"),
            start,
        }),
    )
    .parse_next(input)
}

fn push_char(mut acc: String, ch: char) -> String {
    acc.push(ch);
    acc
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

/// Tag and attribute names.
fn name<'a>(input: &mut Input<'a>) -> IResult<&'a str> {
    take_while(1.., is_name_char)
        .verify(|s: &str| s.chars().next().is_some_and(is_name_start))
        .parse_next(input)
}

/// A value in single or double quotes.
fn quoted_value(input: &mut Input<'_>, quote: char) -> IResult<String> {
    let start = input.current_token_start();
    preceded(
        quote,
        cut_err(terminated(
            repeat(0.., alt((entity, none_of([quote, '&', '<'])))).fold(String::new, push_char),
            quote,
        ))
        .context(MarkupDiagnostic {
            code: ErrorCode::E003,
            message: "unterminated attribute value",
            help: Some("close the value with the quote it was opened with"),
            start,
        }),
    )
    .parse_next(input)
}

fn attribute<'a>(input: &mut Input<'a>) -> IResult<Attribute<'a>> {
    let start = input.current_token_start();
    let name = terminated(name, (multispace0, '=', multispace0)).parse_next(input)?;
    let value = alt((
        |i: &mut Input<'_>| quoted_value(i, '"'),
        |i: &mut Input<'_>| quoted_value(i, '\''),
    ))
    .parse_next(input)?;
    let end = input.current_token_start();
    Ok(Attribute {
        name,
        value,
        span: Span::new(start..end),
    })
}

fn start_tag<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    let name = preceded('<', name).parse_next(input)?;

    let rest: IResult<(Vec<Attribute<'a>>, &'a str, bool)> = (
        repeat(0.., (multispace1, attribute).map(|(_, attr)| attr)),
        multispace0,
        alt(("/>".value(true), '>'.value(false))),
    )
        .parse_next(input);

    match rest {
        Ok((attributes, _, self_closing)) => Ok(Token::StartTag {
            name,
            attributes,
            self_closing,
        }),
        Err(ErrMode::Backtrack(_)) if input.is_empty() => commit(
            input,
            MarkupDiagnostic {
                code: ErrorCode::E001,
                message: "unterminated tag",
                help: Some("close the tag with `>` or `/>`"),
                start,
            },
        ),
        Err(ErrMode::Backtrack(_)) => commit(
            input,
            MarkupDiagnostic {
                code: ErrorCode::E002,
                message: "unexpected character in tag",
                help: Some("attributes are written as name=\"value\""),
                start,
            },
        ),
        Err(e) => Err(e),
    }
}

fn end_tag<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    preceded(
        "</",
        cut_err(terminated(name, (multispace0, '>')))
            .context(MarkupDiagnostic {
                code: ErrorCode::E001,
                message: "unterminated closing tag",
                help: Some("write closing tags as `</name>`"),
                start,
            }),
    )
    .map(Token::EndTag)
    .parse_next(input)
}

fn comment<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    preceded(
        "<!--",
        cut_err(terminated(take_until(0.., "-->"), "-->"))
            .context(MarkupDiagnostic {
                code: ErrorCode::E001,
                message: "unterminated comment",
                help: Some("close the comment with `-->`"),
                start,
            }),
    )
    .value(Token::Comment)
    .parse_next(input)
}

fn cdata<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    preceded(
        "<![CDATA[",
        cut_err(terminated(take_until(0.., "]]>"), "]]>"))
            .context(MarkupDiagnostic {
                code: ErrorCode::E001,
                message: "unterminated CDATA section",
                help: Some("close the section with `]]>`"),
                start,
            }),
    )
    .map(Token::CData)
    .parse_next(input)
}

/// `<?xml ...?>` and other processing instructions.
fn processing_instruction<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    preceded(
        "<?",
        cut_err(terminated(take_until(0.., "?>"), "?>"))
            .context(MarkupDiagnostic {
                code: ErrorCode::E001,
                message: "unterminated processing instruction",
                help: Some("close the instruction with `?>`"),
                start,
            }),
    )
    .value(Token::Declaration)
    .parse_next(input)
}

/// `<!DOCTYPE ...>`, including an internal subset in brackets.
fn doctype<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    preceded(
        literal(Caseless("<!DOCTYPE")),
        cut_err(terminated(
            repeat::<_, _, (), _, _>(
                0..,
                alt((
                    delimited('[', take_till(0.., ']'), ']').void(),
                    none_of(['[', '>']).void(),
                )),
            ),
            '>',
        ))
        .context(MarkupDiagnostic {
            code: ErrorCode::E001,
            message: "unterminated document type declaration",
            help: Some("close the declaration with `>`"),
            start,
        }),
    )
    .value(Token::Declaration)
    .parse_next(input)
}

fn text<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    repeat(1.., alt((entity, none_of(['<', '&']))))
        .fold(String::new, push_char)
        .map(Token::Text)
        .parse_next(input)
}

fn positioned_token<'a>(input: &mut Input<'a>) -> IResult<PositionedToken<'a>> {
    let start_pos = input.current_token_start();

    let token = alt((
        comment,                // Must come before doctype
        cdata,                  // Must come before doctype
        doctype,
        processing_instruction,
        end_tag,                // Must come before start_tag
        start_tag,
        text,
    ))
    .parse_next(input)?;

    let end_pos = input.current_token_start();
    Ok(PositionedToken::new(token, Span::new(start_pos..end_pos)))
}

fn convert_err_mode(err: ErrMode<ContextError<MarkupDiagnostic>>, error_pos: usize) -> Diagnostic {
    let context_error = match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    if let Some(MarkupDiagnostic {
        code,
        message,
        help,
        start,
    }) = context_error.context().next()
    {
        let span = Span::new(*start..error_pos.max(*start + 1));
        let mut diag = Diagnostic::error(*message)
            .with_code(*code)
            .with_label(span, code.description());
        if let Some(h) = help {
            diag = diag.with_help(*h);
        }
        return diag;
    }

    let span = Span::new(error_pos..error_pos.saturating_add(1));
    Diagnostic::error("unexpected character")
        .with_code(ErrorCode::E002)
        .with_label(span, ErrorCode::E002.description())
}

/// Split `source` into markup tokens.
///
/// # Errors
///
/// Returns a [`ParseError`] holding the first markup error.
pub fn tokenize(source: &str) -> Result<Vec<PositionedToken<'_>>, ParseError> {
    let mut input = LocatingSlice::new(source);
    let mut tokens = Vec::new();
    while !input.is_empty() {
        match positioned_token(&mut input) {
            Ok(token) => tokens.push(token),
            Err(e) => {
                let error_pos = input.current_token_start();
                return Err(convert_err_mode(e, error_pos).into());
            }
        }
    }
    trace!(count = tokens.len(); "Tokenized document");
    Ok(tokens)
}
