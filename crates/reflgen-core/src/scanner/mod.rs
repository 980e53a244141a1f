//! Type discovery over parsed headers.
//!
//! ## Algorithm Overview
//!
//! 1. Ask the [`DeclarationParser`] for the header's declaration tree
//! 2. Abort with [`Error::Parse`] if it reported any fatal diagnostic
//! 3. Walk the tree in pre-order, descending only into namespaces
//! 4. Emit one [`TypeDescriptor`] per struct/class *definition* that is not
//!    opted out by its doc comment and is not a reserved type
//! 5. Keep the first definition of each qualified name; later ones (the other
//!    arm of an `#if`/`#else`) only leave a note
//!
//! Nested records (types declared inside a class body) are not visited.

use crate::error::{Error, Result};
use crate::parser::{
    Declaration, DeclarationParser, Diagnostic, HeaderParser, ParseOptions, RecordDecl, Severity,
};
use crate::types::{Category, TypeDescriptor};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Default opt-out marker looked for in a type's doc comment
pub const DEFAULT_OPT_OUT_MARKER: &str = "kengine registration off";

/// Type describing "no reflection info"; it must never register itself
pub const RESERVED_TYPE_INFO: &str = "putils::reflection::type_info";

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Pattern searched for anywhere in a type's doc comment
    pub opt_out: Regex,
    /// Fully qualified names that are never registered
    pub reserved_types: Vec<String>,
    /// Category given to discovered types
    pub category: Category,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            opt_out: Regex::new(&regex::escape(DEFAULT_OPT_OUT_MARKER))
                .expect("escaped literal is a valid regex"),
            reserved_types: vec![RESERVED_TYPE_INFO.to_string()],
            category: Category::Component,
        }
    }
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the opt-out pattern (a regular expression)
    pub fn opt_out_pattern(mut self, pattern: &str) -> Result<Self> {
        self.opt_out = Regex::new(pattern)
            .map_err(|e| Error::config("scanner", "opt_out_pattern", e.to_string()))?;
        Ok(self)
    }

    /// Adds a fully qualified name that is never registered
    pub fn reserved_type(mut self, name: impl Into<String>) -> Self {
        self.reserved_types.push(name.into());
        self
    }

    /// Sets the category given to discovered types
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }
}

/// Types found in one or more headers
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// Discovered types, in file order then declaration order
    pub types: Vec<TypeDescriptor>,
    /// Non-fatal diagnostics, paired with the header they came from
    pub diagnostics: Vec<(PathBuf, Diagnostic)>,
}

/// Walks parsed headers and collects the types to register
#[derive(Debug, Clone)]
pub struct Scanner<P = HeaderParser> {
    parser: P,
    config: ScannerConfig,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// Creates a scanner using the built-in header parser
    pub fn new() -> Self {
        Self::with_config(ScannerConfig::default())
    }

    /// Creates a scanner using the built-in header parser and `config`
    pub fn with_config(config: ScannerConfig) -> Self {
        Self {
            parser: HeaderParser::new(),
            config,
        }
    }
}

impl<P: DeclarationParser> Scanner<P> {
    /// Creates a scanner backed by another parser implementation
    pub fn with_parser(parser: P, config: ScannerConfig) -> Self {
        Self { parser, config }
    }

    /// Returns the scanner configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Scans one header
    pub fn scan(&self, header: &Path, options: &ParseOptions) -> Result<ScanOutput> {
        trace!("Parsing {}", header.display());
        let parsed = self.parser.parse(header, options)?;

        if parsed.has_fatal() {
            return Err(Error::parse(header, parsed.fatal_messages()));
        }

        let (types, notes) = self.discover_with_notes(header, &parsed.nodes);
        debug!("Discovered {} type(s) in {}", types.len(), header.display());

        let mut diagnostics = parsed.diagnostics;
        diagnostics.extend(notes);
        diagnostics.sort_by_key(|d| d.line);

        Ok(ScanOutput {
            types,
            diagnostics: diagnostics
                .into_iter()
                .map(|d| (header.to_path_buf(), d))
                .collect(),
        })
    }

    /// Scans every header in order; the first failure aborts the whole scan
    pub fn scan_all<H: AsRef<Path>>(&self, headers: &[H], options: &ParseOptions) -> Result<ScanOutput> {
        let mut output = ScanOutput::default();
        for header in headers {
            let scanned = self.scan(header.as_ref(), options)?;
            output.types.extend(scanned.types);
            output.diagnostics.extend(scanned.diagnostics);
        }
        Ok(output)
    }

    /// Collects type descriptors from an already parsed declaration tree.
    ///
    /// A qualified name defined more than once in the tree keeps its first
    /// definition.
    pub fn discover(&self, header: &Path, nodes: &[Declaration]) -> Vec<TypeDescriptor> {
        self.discover_with_notes(header, nodes).0
    }

    fn discover_with_notes(
        &self,
        header: &Path,
        nodes: &[Declaration],
    ) -> (Vec<TypeDescriptor>, Vec<Diagnostic>) {
        let mut scope: Vec<&str> = Vec::new();
        let mut found = Vec::new();
        for node in nodes {
            self.visit(header, node, &mut scope, &mut found);
        }

        let mut seen = HashSet::new();
        let mut types = Vec::with_capacity(found.len());
        let mut notes = Vec::new();
        for (ty, line) in found {
            if seen.insert(ty.qualified_name().to_string()) {
                types.push(ty);
            } else {
                debug!("Ignoring repeated definition of '{}' on line {}", ty.qualified_name(), line);
                notes.push(Diagnostic::new(
                    Severity::Note,
                    line,
                    format!("'{}' is defined again; keeping the first definition", ty.qualified_name()),
                ));
            }
        }
        (types, notes)
    }

    fn visit<'a>(
        &self,
        header: &Path,
        node: &'a Declaration,
        scope: &mut Vec<&'a str>,
        types: &mut Vec<(TypeDescriptor, u32)>,
    ) {
        match node {
            Declaration::Namespace(ns) => {
                let named = !ns.name.is_empty();
                if named {
                    scope.push(&ns.name);
                }
                for child in &ns.children {
                    self.visit(header, child, scope, types);
                }
                if named {
                    scope.pop();
                }
            }
            Declaration::Record(record) => {
                if let Some(ty) = self.describe(header, record, scope) {
                    types.push((ty, record.line));
                }
            }
            Declaration::Other(_) => {}
        }
    }

    fn describe(&self, header: &Path, record: &RecordDecl, scope: &[&str]) -> Option<TypeDescriptor> {
        if !record.is_definition {
            trace!("Skipping forward declaration of '{}'", record.name);
            return None;
        }

        let qualified_name = qualify(scope, &record.name);

        if let Some(comment) = &record.comment {
            if self.config.opt_out.is_match(comment) {
                debug!("Skipping '{}': registration disabled by annotation", qualified_name);
                return None;
            }
        }

        if self.config.reserved_types.iter().any(|r| *r == qualified_name) {
            debug!("Skipping reserved type '{}'", qualified_name);
            return None;
        }

        Some(TypeDescriptor::new(qualified_name, header).with_category(self.config.category))
    }
}

fn qualify(scope: &[&str], name: &str) -> String {
    let name = name.trim_start_matches("::");
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", scope.join("::"), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedHeader;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn discover(source: &str) -> Vec<String> {
        let parsed = HeaderParser::new().parse_source(source);
        Scanner::new()
            .discover(Path::new("test.hpp"), &parsed.nodes)
            .into_iter()
            .map(|t| t.qualified_name().to_string())
            .collect()
    }

    #[test]
    fn test_qualified_names_in_preorder() {
        let names = discover(
            r#"
            struct Global {};
            namespace a {
                struct First {};
                namespace b { struct Inner {}; }
                struct Second {};
            }
            namespace c::d { struct Deep {}; }
            namespace { struct Hidden {}; }
            "#,
        );
        assert_eq!(
            names,
            vec!["Global", "a::First", "a::b::Inner", "a::Second", "c::d::Deep", "Hidden"]
        );
    }

    #[test]
    fn test_opt_out_marker_is_pattern_matched() {
        let names = discover(
            r#"
            namespace ns {
                //! kengine registration off.
                struct Off {};
                /// Some docs. Kept: kengine registration on
                struct On {};
                /**
                 * Internal helper, kengine registration off!
                 */
                class AlsoOff {};
            }
            "#,
        );
        assert_eq!(names, vec!["ns::On"]);
    }

    #[test]
    fn test_forward_declarations_and_other_kinds_skipped() {
        let names = discover(
            r#"
            namespace ns {
                struct Later;
                enum class Color { Red };
                template<typename T> struct Generic {};
                void helper();
                struct Later { int x; };
            }
            "#,
        );
        assert_eq!(names, vec!["ns::Later"]);
    }

    #[test]
    fn test_reserved_type_excluded() {
        let names = discover("namespace putils::reflection { struct type_info {}; struct other {}; }");
        assert_eq!(names, vec!["putils::reflection::other"]);
    }

    #[test]
    fn test_custom_config() {
        let config = ScannerConfig::new()
            .opt_out_pattern(r"no\s+reflect")
            .unwrap()
            .reserved_type("ns::Internal")
            .category(Category::Type);
        let parsed = HeaderParser::new().parse_source(
            "namespace ns { /// no   reflect\nstruct A {}; struct Internal {}; struct B {}; }",
        );
        let types = Scanner::with_config(config).discover(Path::new("x.hpp"), &parsed.nodes);
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].qualified_name(), "ns::B");
        assert_eq!(types[0].category(), Category::Type);
        assert_eq!(types[0].source_header(), Path::new("x.hpp"));
    }

    #[test]
    fn test_invalid_opt_out_pattern() {
        assert!(ScannerConfig::new().opt_out_pattern("(unclosed").is_err());
    }

    #[test]
    fn test_scan_file_reports_parse_error() {
        let dir = TempDir::new().unwrap();
        let header = dir.path().join("broken.hpp");
        fs::write(&header, "namespace ns {\nstruct A {};\n").unwrap();

        match Scanner::new().scan(&header, &ParseOptions::new()) {
            Err(Error::Parse { path, messages }) => {
                assert_eq!(path, header);
                assert_eq!(messages.len(), 1);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_all_keeps_file_order_and_notes() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("b.hpp");
        let second = dir.path().join("a.hpp");
        fs::write(&first, "#ifdef X\nstruct B {};\n#endif\n").unwrap();
        fs::write(&second, "struct A {};").unwrap();

        let output = Scanner::new()
            .scan_all(&[&first, &second], &ParseOptions::new())
            .unwrap();
        let names: Vec<_> = output.types.iter().map(|t| t.qualified_name()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].0, first);
        assert_eq!(output.diagnostics[0].1.severity, Severity::Note);
    }

    #[test]
    fn test_platform_branches_keep_first_definition() {
        let dir = TempDir::new().unwrap();
        let header = dir.path().join("handle.hpp");
        fs::write(
            &header,
            "namespace ns {\n#ifdef _WIN32\nstruct Handle { void * h; };\n#else\nstruct Handle { int fd; };\n#endif\nstruct Other {};\n}\n",
        )
        .unwrap();

        let output = Scanner::new().scan(&header, &ParseOptions::new()).unwrap();
        let names: Vec<_> = output.types.iter().map(|t| t.qualified_name()).collect();
        assert_eq!(names, vec!["ns::Handle", "ns::Other"]);
        assert!(crate::types::validate_unique(&output.types).is_ok());

        let diagnostics: Vec<_> = output
            .diagnostics
            .iter()
            .map(|(_, d)| (d.severity, d.line, d.message.as_str()))
            .collect();
        assert_eq!(
            diagnostics,
            vec![
                (
                    Severity::Note,
                    2,
                    "'#ifdef _WIN32' block: declarations inside it are scanned regardless of the condition"
                ),
                (
                    Severity::Note,
                    5,
                    "'ns::Handle' is defined again; keeping the first definition"
                ),
            ]
        );
    }

    #[test]
    fn test_same_type_in_two_headers_still_collides() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.hpp");
        let second = dir.path().join("b.hpp");
        fs::write(&first, "namespace ns { struct Handle {}; }").unwrap();
        fs::write(&second, "namespace ns { struct Handle {}; }").unwrap();

        let output = Scanner::new()
            .scan_all(&[&first, &second], &ParseOptions::new())
            .unwrap();
        assert_eq!(output.types.len(), 2);
        assert!(matches!(
            crate::types::validate_unique(&output.types),
            Err(Error::IdentifierCollision { .. })
        ));
    }

    struct FixedParser(ParsedHeader);

    impl DeclarationParser for FixedParser {
        fn parse(&self, _path: &Path, _options: &ParseOptions) -> Result<ParsedHeader> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_custom_parser_fatal_diagnostic() {
        let parser = FixedParser(ParsedHeader {
            nodes: Vec::new(),
            diagnostics: vec![
                Diagnostic::new(Severity::Warning, 1, "odd"),
                Diagnostic::new(Severity::Error, 2, "unknown type name 'foo'"),
            ],
        });
        let scanner = Scanner::with_parser(parser, ScannerConfig::default());
        let err = scanner
            .scan(Path::new("virtual.hpp"), &ParseOptions::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to parse 'virtual.hpp': line 2: error: unknown type name 'foo'"
        );
    }
}
