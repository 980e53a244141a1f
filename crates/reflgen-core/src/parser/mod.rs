//! Header parsing capability.
//!
//! Type discovery does not depend on any particular C++ front end: it consumes
//! declaration trees through the [`DeclarationParser`] trait. The tree is a
//! closed set of node kinds ([`Declaration`]) since discovery only ever cares
//! about namespaces, struct/class definitions, and "anything else".
//!
//! [`HeaderParser`] is the built-in implementation. It is a lightweight
//! declaration parser, not a compiler: it does not expand macros or evaluate
//! preprocessor conditions, and it does not look inside class bodies.
//!
//! ```
//! use reflgen_core::parser::{Declaration, HeaderParser};
//!
//! let parsed = HeaderParser::new().parse_source("namespace ns { struct A {}; }");
//! assert!(matches!(&parsed.nodes[0], Declaration::Namespace(ns) if ns.name == "ns"));
//! ```

mod header;
mod lexer;

use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// A node of a parsed header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `namespace name { ... }`
    Namespace(NamespaceDecl),
    /// `struct`/`class` definition or forward declaration
    Record(RecordDecl),
    /// Anything else: functions, variables, enums, templates, aliases...
    Other(OtherDecl),
}

impl Declaration {
    /// Line the declaration starts on (1-indexed)
    pub fn line(&self) -> u32 {
        match self {
            Declaration::Namespace(ns) => ns.line,
            Declaration::Record(record) => record.line,
            Declaration::Other(other) => other.line,
        }
    }
}

/// A namespace and the declarations nested in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// Namespace name, empty for anonymous namespaces
    pub name: String,
    /// Line of the `namespace` keyword
    pub line: u32,
    /// Declarations in source order
    pub children: Vec<Declaration>,
}

/// Keyword a record was declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKeyword {
    /// `struct`
    Struct,
    /// `class`
    Class,
}

/// A `struct` or `class` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDecl {
    /// Keyword used
    pub keyword: RecordKeyword,
    /// Name as written, which may itself be qualified (`detail::impl`)
    pub name: String,
    /// Line of the keyword
    pub line: u32,
    /// False for forward declarations
    pub is_definition: bool,
    /// Documentation comment immediately preceding the declaration
    pub comment: Option<String>,
}

/// Kinds of declarations discovery skips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherKind {
    /// Function declaration or definition
    Function,
    /// Variable or other simple declaration
    Variable,
    /// `enum` / `enum class`
    Enum,
    /// `union`
    Union,
    /// Class/function/alias templates, specializations, explicit instantiations
    Template,
    /// `typedef`, `using`, namespace alias
    Alias,
    /// `extern "C" { ... }`
    LinkageSpec,
}

/// A declaration discovery does not look into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherDecl {
    /// What kind of declaration it is
    pub kind: OtherKind,
    /// Line the declaration starts on
    pub line: u32,
}

/// Diagnostic severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational
    Note,
    /// Suspicious input that was still parsed
    Warning,
    /// Input that could not be understood
    Error,
    /// Input that makes the rest of the file meaningless
    Fatal,
}

impl Severity {
    /// Returns the lowercase label for this severity
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

/// A message produced while parsing a header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Line the diagnostic refers to (1-indexed)
    pub line: u32,
    /// Human-readable message
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic
    pub fn new(severity: Severity, line: u32, message: impl Into<String>) -> Self {
        Self {
            severity,
            line,
            message: message.into(),
        }
    }

    /// Returns true if the diagnostic prevents using the parse result
    pub fn is_fatal(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.severity.as_str(), self.message)
    }
}

/// Options forwarded to the parser
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Extra compiler arguments (`-I`, `-D`, `-std=`...)
    pub extra_args: Vec<String>,
}

impl ParseOptions {
    /// Creates options with no extra arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extra compiler arguments
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Output of parsing one header
#[derive(Debug, Clone, Default)]
pub struct ParsedHeader {
    /// Top-level declarations in source order
    pub nodes: Vec<Declaration>,
    /// Every diagnostic, fatal or not
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedHeader {
    /// Returns true if any diagnostic is fatal
    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_fatal)
    }

    /// Messages of the fatal diagnostics
    pub fn fatal_messages(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.is_fatal())
            .map(ToString::to_string)
            .collect()
    }
}

/// A source of declaration trees for header files.
///
/// Implementations report problems as [`Diagnostic`]s inside the returned
/// [`ParsedHeader`]; an `Err` is reserved for failing to access the file.
pub trait DeclarationParser: Send + Sync {
    /// Parses the header at `path`
    fn parse(&self, path: &Path, options: &ParseOptions) -> Result<ParsedHeader>;
}

/// Built-in lightweight header parser
#[derive(Debug, Clone, Default)]
pub struct HeaderParser;

impl HeaderParser {
    /// Creates a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parses header text held in memory
    pub fn parse_source(&self, source: &str) -> ParsedHeader {
        let (tokens, mut diagnostics) = lexer::Lexer::new(source).tokenize();
        trace!("Tokenized header into {} token(s)", tokens.len());

        // A lexer failure leaves the token stream truncated, so any tree built
        // from it would be misleading.
        if diagnostics.iter().any(Diagnostic::is_fatal) {
            return ParsedHeader {
                nodes: Vec::new(),
                diagnostics,
            };
        }

        let nodes = header::parse_declarations(&tokens, &mut diagnostics);
        diagnostics.sort_by_key(|d| d.line);
        ParsedHeader { nodes, diagnostics }
    }
}

impl DeclarationParser for HeaderParser {
    fn parse(&self, path: &Path, options: &ParseOptions) -> Result<ParsedHeader> {
        let source = fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let mut parsed = self.parse_source(&source);

        if !options.extra_args.is_empty() {
            debug!(
                "Built-in parser ignores {} compiler argument(s) for {}",
                options.extra_args.len(),
                path.display()
            );
            parsed.diagnostics.insert(
                0,
                Diagnostic::new(
                    Severity::Note,
                    1,
                    format!(
                        "compiler arguments are not interpreted by the built-in parser: {}",
                        options.extra_args.join(" ")
                    ),
                ),
            );
        }

        Ok(parsed)
    }
}
