//! Python front end.
//!
//! Source is parsed with `rustpython-parser`. Before the parser runs, one pass
//! over its token stream applies the limits CPython's tokenizer enforces
//! (bracket nesting, indentation depth) plus a per-statement operator budget.
//! Every construct that deepens the tree costs at least one counted token, so
//! a tree that passes can be walked and dropped recursively without
//! exhausting the stack.
//!
//! Only syntax is checked. Symbol-table and compiler checks (`return` outside a
//! function, duplicate parameters) are out of scope, exactly as with CPython's
//! `ast.parse`.

use rustpython_parser::lexer::{self, LexResult, LexicalErrorType};
use rustpython_parser::{ast, Mode, Parse, StringKind, Tok};
use sandgate_types::Span;

/// Brackets open at once. Same limit as CPython's tokenizer.
pub const MAX_BRACKET_DEPTH: usize = 200;

/// Indentation levels, counting the top level. Same limit as CPython's
/// tokenizer.
pub const MAX_INDENT_DEPTH: usize = 100;

/// Operators, trailers and brackets in one logical line.
pub const MAX_STATEMENT_OPERATORS: usize = 2000;

/// Name passed to the parser for error reporting.
const SOURCE_PATH: &str = "<sandbox>";

/// Parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Invalid Python syntax. `line` and `column` are 1-based.
    #[error("{message} (line {line}, column {column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
        span: Span,
    },
    #[error("source code string cannot contain null bytes")]
    NullBytes,
    #[error("statement too complex (more than {limit} operators)")]
    TooComplex { limit: usize, span: Span },
}

impl ParseError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, ParseError::Syntax { .. })
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::Syntax { span, .. } | ParseError::TooComplex { span, .. } => Some(*span),
            ParseError::NullBytes => None,
        }
    }

    fn syntax(source: &str, span: Span, message: impl Into<String>) -> Self {
        let (line, column) = span.to_line_col(source);
        ParseError::Syntax {
            message: message.into(),
            line,
            column,
            span,
        }
    }

    fn from_parser(source: &str, err: rustpython_parser::ParseError) -> Self {
        let offset = usize::from(err.offset).min(source.len());
        ParseError::syntax(source, Span::new(offset, offset), err.error.to_string())
    }
}

/// Parse Python source into a list of statements.
pub fn parse(source: &str) -> Result<ast::Suite, ParseError> {
    if source.contains('\0') {
        return Err(ParseError::NullBytes);
    }
    check_tokens(source, lexer::lex(source, Mode::Module))?;
    ast::Suite::parse(source, SOURCE_PATH).map_err(|err| ParseError::from_parser(source, err))
}

// ═══════════════════════════════════════════════════════════════════════════
// Token limits
// ═══════════════════════════════════════════════════════════════════════════

/// Check bracket balance and the nesting limits over a token stream.
///
/// Lexical errors end the check early; the parser reports them with its own
/// message. End of input inside brackets is reported here as the unclosed
/// bracket.
fn check_tokens(
    source: &str,
    tokens: impl Iterator<Item = LexResult>,
) -> Result<(), ParseError> {
    let mut brackets: Vec<(char, Span)> = Vec::new();
    let mut indent = 0usize;
    let mut operators = 0usize;
    let mut statement_start = 0usize;

    for item in tokens {
        let (tok, range) = match item {
            Ok(spanned) => spanned,
            Err(err) if matches!(err.error, LexicalErrorType::Eof) => break,
            Err(_) => return Ok(()),
        };
        let span = Span::new(usize::from(range.start()), usize::from(range.end()));

        match &tok {
            Tok::Lpar | Tok::Lsqb | Tok::Lbrace => {
                if brackets.len() >= MAX_BRACKET_DEPTH {
                    return Err(ParseError::syntax(source, span, "too many nested parentheses"));
                }
                brackets.push((bracket_char(&tok), span));
            }
            Tok::Rpar | Tok::Rsqb | Tok::Rbrace => {
                let close = bracket_char(&tok);
                match brackets.pop() {
                    None => {
                        return Err(ParseError::syntax(
                            source,
                            span,
                            format!("unmatched '{}'", close),
                        ));
                    }
                    Some((open, _)) if closing_for(open) != close => {
                        return Err(ParseError::syntax(
                            source,
                            span,
                            format!(
                                "closing parenthesis '{}' does not match opening parenthesis '{}'",
                                close, open
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
            Tok::Indent => {
                indent += 1;
                if indent >= MAX_INDENT_DEPTH {
                    return Err(ParseError::syntax(source, span, "too many levels of indentation"));
                }
            }
            Tok::Dedent => indent = indent.saturating_sub(1),
            Tok::Newline => {
                operators = 0;
                statement_start = span.end;
            }
            _ => {}
        }

        operators += operator_weight(&tok);
        if operators > MAX_STATEMENT_OPERATORS {
            return Err(ParseError::TooComplex {
                limit: MAX_STATEMENT_OPERATORS,
                span: Span::new(statement_start, span.end),
            });
        }
    }

    match brackets.last() {
        Some((open, span)) => Err(ParseError::syntax(
            source,
            *span,
            format!("'{}' was never closed", open),
        )),
        None => Ok(()),
    }
}

/// How many tree levels a token can add.
fn operator_weight(tok: &Tok) -> usize {
    match tok {
        Tok::String { value, kind, .. }
            if matches!(kind, StringKind::FString | StringKind::RawFString) =>
        {
            fstring_weight(value)
        }
        Tok::Plus
        | Tok::Minus
        | Tok::Star
        | Tok::Slash
        | Tok::DoubleSlash
        | Tok::Percent
        | Tok::DoubleStar
        | Tok::At
        | Tok::Vbar
        | Tok::Amper
        | Tok::CircumFlex
        | Tok::LeftShift
        | Tok::RightShift
        | Tok::Tilde
        | Tok::Dot
        | Tok::Lpar
        | Tok::Lsqb
        | Tok::Lbrace
        | Tok::Not
        | Tok::And
        | Tok::Or
        | Tok::Lambda
        | Tok::Await
        | Tok::If
        | Tok::Yield => 1,
        _ => 0,
    }
}

/// f-string bodies are one token; their replacement fields are parsed later.
/// Count punctuation and word breaks inside fields so deep expressions hidden
/// in a field still draw from the budget.
fn fstring_weight(body: &str) -> usize {
    let mut depth = 0usize;
    let mut weight = 0;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if depth == 0 && chars.peek() == Some(&'{') => {
                chars.next();
            }
            '}' if depth == 0 && chars.peek() == Some(&'}') => {
                chars.next();
            }
            '{' => {
                depth += 1;
                weight += 1;
            }
            '}' => depth = depth.saturating_sub(1),
            c if depth > 0 && (c.is_ascii_punctuation() || c.is_whitespace()) => weight += 1,
            _ => {}
        }
    }
    weight
}

fn bracket_char(tok: &Tok) -> char {
    match tok {
        Tok::Lpar => '(',
        Tok::Rpar => ')',
        Tok::Lsqb => '[',
        Tok::Rsqb => ']',
        Tok::Lbrace => '{',
        _ => '}',
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}
