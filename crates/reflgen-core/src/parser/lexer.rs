//! Token stream for the built-in header parser.
//!
//! Only as much of C++ is tokenized as declaration discovery needs: identifiers,
//! `::`, single-character punctuation, literals (skipped wholesale so braces in
//! strings never count) and documentation comments. Ordinary comments and
//! preprocessor lines are dropped.

use logos::Logos;

use super::{Diagnostic, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    /// `::`
    Scope,
    Punct(char),
    Literal,
    /// Text of a `///`, `//!`, `/** */` or `/*! */` comment, markers stripped
    DocComment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) text: String,
    pub(crate) line: u32,
}

impl Token {
    pub(crate) fn is_ident(&self, text: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == text
    }

    pub(crate) fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }
}

/// How a comment or raw string that scans ahead by hand ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Closed,
    Unterminated,
    /// Raw string delimiter that C++ does not allow
    Malformed,
}

#[derive(Logos, Debug, Clone, PartialEq)]
enum RawToken {
    #[regex(r"[ \t\r\n\x0B\x0C]+", logos::skip)]
    Whitespace,

    /// Directive text with continuations joined, or empty for a `#` that does
    /// not start a line
    #[token("#", lex_directive)]
    Directive(String),

    #[regex(r"//[^\n]*")]
    LineComment,

    #[token("/*", lex_block_comment)]
    BlockComment(Termination),

    #[regex(r#"(L|u8|u|U)?R""#, lex_raw_string)]
    RawString(Termination),

    #[regex(r#"(L|u8|u|U)?"([^"\\\n]|\\(.|\n))*""#)]
    String,

    #[regex(r#"(L|u8|u|U)?"([^"\\\n]|\\(.|\n))*"#)]
    UnterminatedString,

    #[regex(r"(L|u8|u|U)?'([^'\\\n]|\\(.|\n))*'")]
    Char,

    #[regex(r"(L|u8|u|U)?'([^'\\\n]|\\(.|\n))*")]
    UnterminatedChar,

    // Digit separators and exponent signs belong to the number
    #[regex(r"[0-9]([0-9A-Za-z_.']|[eEpP][+-])*")]
    Number,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Ident,

    #[token("::")]
    Scope,

    #[regex(r"[!$%&()*+,./:;<=>?@^`{|}~\[\]\\-]")]
    Punct,
}

fn lex_directive(lex: &mut logos::Lexer<'_, RawToken>) -> String {
    let before = &lex.source()[..lex.span().start];
    let line_prefix = before.rsplit('\n').next().unwrap_or_default();
    if !line_prefix.trim().is_empty() {
        return String::new();
    }

    let remainder = lex.remainder();
    let mut end = remainder.len();
    let mut search = 0;
    while let Some(offset) = remainder[search..].find('\n') {
        let newline = search + offset;
        if remainder[..newline].trim_end_matches('\r').ends_with('\\') {
            search = newline + 1;
        } else {
            end = newline;
            break;
        }
    }

    lex.bump(end);
    let body = remainder[..end].replace("\\\r\n", "").replace("\\\n", "");
    format!("#{body}")
}

fn lex_block_comment(lex: &mut logos::Lexer<'_, RawToken>) -> Termination {
    let remainder = lex.remainder();
    if let Some(end) = remainder.find("*/") {
        lex.bump(end + 2);
        Termination::Closed
    } else {
        lex.bump(remainder.len());
        Termination::Unterminated
    }
}

/// Positioned after `R"`; consumes `delim( ... )delim"`
fn lex_raw_string(lex: &mut logos::Lexer<'_, RawToken>) -> Termination {
    let remainder = lex.remainder();
    let Some(open) = remainder.find('(') else {
        return Termination::Malformed;
    };
    let delimiter = &remainder[..open];
    if delimiter.len() > 16
        || delimiter.contains(|c: char| c.is_whitespace() || matches!(c, '"' | ')' | '\\'))
    {
        return Termination::Malformed;
    }

    let terminator = format!("){delimiter}\"");
    match remainder[open + 1..].find(&terminator) {
        Some(end) => {
            lex.bump(open + 1 + end + terminator.len());
            Termination::Closed
        }
        None => {
            lex.bump(remainder.len());
            Termination::Unterminated
        }
    }
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source: source.trim_start_matches('\u{FEFF}'),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Tokenizes the whole input, stopping at the first fatal diagnostic
    pub(crate) fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut raw = RawToken::lexer(self.source);
        let mut line = 1u32;
        let mut last_end = 0;

        while let Some(result) = raw.next() {
            let span = raw.span();
            line += count_newlines(&self.source[last_end..span.start]);
            let slice = raw.slice();

            match result {
                Ok(RawToken::Directive(text)) if text.is_empty() => {
                    self.push(TokenKind::Punct('#'), "#", line);
                }
                Ok(RawToken::Directive(text)) => self.note_directive(&text, line),
                Ok(RawToken::LineComment) => {
                    if let Some(doc) = line_doc(slice) {
                        self.push(TokenKind::DocComment, doc, line);
                    }
                }
                Ok(RawToken::BlockComment(Termination::Closed)) => {
                    if let Some(doc) = block_doc(slice) {
                        self.push(TokenKind::DocComment, doc, line);
                    }
                }
                Ok(RawToken::BlockComment(_)) => {
                    self.fatal(line, "unterminated block comment");
                    break;
                }
                Ok(RawToken::RawString(Termination::Closed))
                | Ok(RawToken::String)
                | Ok(RawToken::Char)
                | Ok(RawToken::Number) => self.push(TokenKind::Literal, "", line),
                Ok(RawToken::RawString(Termination::Unterminated)) => {
                    self.fatal(line, "unterminated raw string literal");
                    break;
                }
                Ok(RawToken::RawString(Termination::Malformed)) => {
                    self.fatal(line, "invalid raw string delimiter");
                    break;
                }
                Ok(RawToken::UnterminatedString) => {
                    self.fatal(line, "unterminated string literal");
                    break;
                }
                Ok(RawToken::UnterminatedChar) => {
                    self.fatal(line, "unterminated character literal");
                    break;
                }
                Ok(RawToken::Ident) => self.push(TokenKind::Ident, slice, line),
                Ok(RawToken::Scope) => self.push(TokenKind::Scope, "::", line),
                Ok(RawToken::Whitespace) => {}
                // Anything else, non-ASCII symbols included, is punctuation
                Ok(RawToken::Punct) | Err(()) => {
                    for c in slice.chars() {
                        self.push(TokenKind::Punct(c), c.to_string(), line);
                    }
                }
            }

            line += count_newlines(slice);
            last_end = span.end;
        }

        (self.tokens, self.diagnostics)
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, line: u32) {
        self.tokens.push(Token {
            kind,
            text: text.into(),
            line,
        });
    }

    fn fatal(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(Severity::Fatal, line, message));
    }

    fn note_directive(&mut self, text: &str, line: u32) {
        let directive = text
            .trim_start_matches('#')
            .trim_start()
            .split(|c: char| !c.is_alphanumeric())
            .next()
            .unwrap_or_default();
        if matches!(directive, "if" | "ifdef" | "ifndef") {
            self.diagnostics.push(Diagnostic::new(
                Severity::Note,
                line,
                format!("'{}' block: declarations inside it are scanned regardless of the condition", text.trim()),
            ));
        }
    }
}

fn count_newlines(text: &str) -> u32 {
    text.bytes().filter(|&b| b == b'\n').count() as u32
}

fn line_doc(comment: &str) -> Option<&str> {
    let doc = if let Some(rest) = comment.strip_prefix("//!") {
        Some(rest)
    } else if comment.starts_with("////") {
        None
    } else {
        comment.strip_prefix("///")
    };
    doc.map(str::trim)
}

/// `comment` spans the whole `/* ... */`
fn block_doc(comment: &str) -> Option<String> {
    let inner = comment.strip_prefix("/*")?.strip_suffix("*/")?;
    let body = if inner.starts_with('*') && inner != "*" {
        &inner[1..]
    } else {
        inner.strip_prefix('!')?
    };

    let cleaned: Vec<&str> = body
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect();
    Some(cleaned.join("\n"))
}
