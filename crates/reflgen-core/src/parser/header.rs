//! Recursive-descent pass that turns tokens into [`Declaration`] trees.
//!
//! Only namespace bodies are descended into. Every other braced block (class
//! bodies, function bodies, enumerator lists, initializers) is skipped as a
//! balanced unit.

use super::lexer::{Token, TokenKind};
use super::{
    Declaration, Diagnostic, NamespaceDecl, OtherDecl, OtherKind, RecordDecl, RecordKeyword,
    Severity,
};

pub(crate) fn parse_declarations(tokens: &[Token], diagnostics: &mut Vec<Diagnostic>) -> Vec<Declaration> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics,
    };
    let (nodes, _) = parser.parse_scope(None);
    nodes
}

struct Parser<'t, 'd> {
    tokens: &'t [Token],
    pos: usize,
    diagnostics: &'d mut Vec<Diagnostic>,
}

impl<'t, 'd> Parser<'t, 'd> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + n)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn current_line(&self) -> u32 {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn report(&mut self, severity: Severity, line: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(severity, line, message));
    }

    /// Parses declarations until the closing brace of `namespace` (or EOF at
    /// file scope). Returns the nodes and whether the scope was closed.
    fn parse_scope(&mut self, namespace: Option<&str>) -> (Vec<Declaration>, bool) {
        let mut nodes = Vec::new();
        let mut comment: Option<String> = None;

        loop {
            let Some(token) = self.peek() else {
                return (nodes, namespace.is_none());
            };

            match &token.kind {
                TokenKind::DocComment => {
                    self.bump();
                    comment = Some(match comment.take() {
                        Some(previous) => format!("{previous}\n{}", token.text),
                        None => token.text.clone(),
                    });
                    continue;
                }
                TokenKind::Punct('}') => {
                    self.bump();
                    if namespace.is_some() {
                        return (nodes, true);
                    }
                    self.report(Severity::Fatal, token.line, "unmatched '}' at file scope");
                }
                TokenKind::Punct(';') => {
                    self.bump();
                }
                TokenKind::Punct('[') if self.peek_nth(1).is_some_and(|t| t.is_punct('[')) => {
                    // Leading attribute list, the declaration follows
                    self.skip_balanced('[', ']');
                    continue;
                }
                TokenKind::Ident => {
                    let node = self.parse_declaration(token, comment.take());
                    nodes.push(node);
                }
                _ => {
                    let line = token.line;
                    let kind = self.skip_declaration();
                    nodes.push(Declaration::Other(OtherDecl { kind, line }));
                }
            }

            comment = None;
        }
    }

    fn parse_declaration(&mut self, token: &'t Token, comment: Option<String>) -> Declaration {
        let line = token.line;

        match token.text.as_str() {
            "namespace" => self.parse_namespace(),
            "inline" if self.peek_nth(1).is_some_and(|t| t.is_ident("namespace")) => {
                self.bump();
                self.parse_namespace()
            }
            "struct" => self.parse_record(RecordKeyword::Struct, comment),
            "class" => self.parse_record(RecordKeyword::Class, comment),
            "template" => {
                self.bump();
                if self.peek().is_some_and(|t| t.is_punct('<')) {
                    self.skip_angle_brackets();
                }
                self.skip_declaration();
                other(OtherKind::Template, line)
            }
            "enum" => {
                self.skip_declaration();
                other(OtherKind::Enum, line)
            }
            "union" => {
                self.skip_declaration();
                other(OtherKind::Union, line)
            }
            "typedef" | "using" => {
                self.skip_declaration();
                other(OtherKind::Alias, line)
            }
            "extern"
                if self.peek_nth(1).is_some_and(|t| t.kind == TokenKind::Literal)
                    && self.peek_nth(2).is_some_and(|t| t.is_punct('{')) =>
            {
                self.bump();
                self.bump();
                self.skip_balanced('{', '}');
                other(OtherKind::LinkageSpec, line)
            }
            _ => {
                let kind = self.skip_declaration();
                other(kind, line)
            }
        }
    }

    fn parse_namespace(&mut self) -> Declaration {
        let line = self.bump().map_or(1, |t| t.line);

        let mut segments: Vec<String> = Vec::new();
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Ident if token.text == "inline" => {
                    self.bump();
                }
                TokenKind::Ident => {
                    segments.push(token.text.clone());
                    self.bump();
                }
                TokenKind::Scope => {
                    self.bump();
                }
                TokenKind::Punct('[') => {
                    self.skip_balanced('[', ']');
                }
                _ => break,
            }
        }

        if self.peek().is_some_and(|t| t.is_punct('=')) {
            self.skip_declaration();
            return other(OtherKind::Alias, line);
        }

        if !self.peek().is_some_and(|t| t.is_punct('{')) {
            self.report(Severity::Error, line, "expected '{' after namespace name");
            self.skip_declaration();
            return other(OtherKind::Alias, line);
        }
        self.bump();

        let label = if segments.is_empty() {
            "<anonymous>".to_string()
        } else {
            segments.join("::")
        };
        let (children, closed) = self.parse_scope(Some(&label));
        if !closed {
            self.report(
                Severity::Fatal,
                line,
                format!("namespace '{label}' is never closed"),
            );
        }

        // `namespace a::b { }` is the same tree as `namespace a { namespace b { } }`
        let mut node = NamespaceDecl {
            name: segments.pop().unwrap_or_default(),
            line,
            children,
        };
        while let Some(outer) = segments.pop() {
            node = NamespaceDecl {
                name: outer,
                line,
                children: vec![Declaration::Namespace(node)],
            };
        }
        Declaration::Namespace(node)
    }

    fn parse_record(&mut self, keyword: RecordKeyword, comment: Option<String>) -> Declaration {
        let start = self.pos;
        let line = self.bump().map_or(1, |t| t.line);

        let mut name: Vec<&str> = Vec::new();
        let mut expect_segment = true;
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Punct('[') => {
                    self.skip_balanced('[', ']');
                }
                TokenKind::Ident
                    if matches!(token.text.as_str(), "alignas" | "__attribute__" | "__declspec") =>
                {
                    self.bump();
                    if self.peek().is_some_and(|t| t.is_punct('(')) {
                        self.skip_balanced('(', ')');
                    }
                }
                TokenKind::Ident if token.text == "final" && !name.is_empty() => {
                    self.bump();
                }
                TokenKind::Ident if expect_segment => {
                    name.push(&token.text);
                    expect_segment = false;
                    self.bump();
                    if self.peek().is_some_and(|t| t.is_punct('(')) {
                        // FOO_API(x) style macro before the real name
                        self.skip_balanced('(', ')');
                        name.clear();
                        expect_segment = true;
                    }
                }
                TokenKind::Ident if name.len() == 1 => {
                    // Two identifiers in a row: the first is an attribute macro
                    // unless this declares a variable (`struct A a;`, `struct A a{1};`)
                    let macro_like = is_macro_like(name[0]);
                    if !macro_like && !self.opens_record_body(1) {
                        break;
                    }
                    if !macro_like {
                        self.report(
                            Severity::Warning,
                            token.line,
                            format!(
                                "'{}' before '{}' is taken for an attribute macro",
                                name[0], token.text
                            ),
                        );
                    }
                    name.clear();
                    name.push(&token.text);
                    self.bump();
                }
                TokenKind::Scope => {
                    expect_segment = true;
                    self.bump();
                }
                TokenKind::Punct('<') => self.skip_angle_brackets(),
                _ => break,
            }
        }

        let next = self.peek();
        let is_forward = next.is_some_and(|t| t.is_punct(';'));
        let is_definition = next.is_some_and(|t| t.is_punct('{') || t.is_punct(':'));

        if name.is_empty() || expect_segment || !(is_forward || is_definition) {
            // Anonymous record, or the keyword is part of another declaration
            // (`struct A * make();`, `struct A a;`)
            self.pos = start;
            let kind = self.skip_declaration();
            return other(kind, line);
        }

        let name = name.join("::");

        if is_forward {
            self.bump();
        } else {
            while self.peek().is_some_and(|t| !t.is_punct('{')) {
                match self.peek().map(|t| &t.kind) {
                    Some(TokenKind::Punct('(')) => {
                        self.skip_balanced('(', ')');
                    }
                    Some(TokenKind::Punct('<')) => self.skip_angle_brackets(),
                    _ => {
                        self.bump();
                    }
                }
            }
            if !self.skip_balanced('{', '}') {
                self.report(Severity::Fatal, line, format!("body of '{name}' is never closed"));
            }
            // Trailing declarators: `} instance, *pointer;`
            match self.peek() {
                Some(t) if t.is_punct(';') => {
                    self.bump();
                }
                Some(t) if t.kind == TokenKind::Ident || t.is_punct('*') || t.is_punct('&') => {
                    self.skip_declaration();
                }
                _ => self.report(
                    Severity::Warning,
                    line,
                    format!("missing ';' after definition of '{name}'"),
                ),
            }
        }

        Declaration::Record(RecordDecl {
            keyword,
            name,
            line,
            is_definition: !is_forward,
            comment,
        })
    }

    /// Whether the tokens from `offset` on start a base clause or a class body
    /// rather than a brace initializer. An initializer holds no `;`.
    fn opens_record_body(&self, offset: usize) -> bool {
        match self.peek_nth(offset) {
            Some(t) if t.is_punct(':') => true,
            Some(t) if t.is_punct('{') => {
                let mut depth = 0usize;
                let mut inner = 0usize;
                for token in &self.tokens[self.pos + offset..] {
                    if token.is_punct('{') {
                        depth += 1;
                    } else if token.is_punct('}') {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    } else if token.is_punct(';') {
                        return true;
                    }
                    inner += 1;
                }
                inner == 1
            }
            _ => false,
        }
    }

    /// Consumes a declaration that discovery does not care about, up to and
    /// including its terminating `;` (or the end of a function body)
    fn skip_declaration(&mut self) -> OtherKind {
        let start_line = self.current_line();
        let mut saw_parens = false;
        let mut first = true;

        loop {
            let Some(token) = self.peek() else {
                self.report(
                    Severity::Warning,
                    start_line,
                    "declaration is not terminated before end of file",
                );
                break;
            };

            match &token.kind {
                TokenKind::Punct(';') => {
                    self.bump();
                    break;
                }
                TokenKind::Punct('}') => break,
                TokenKind::Punct('(') => {
                    saw_parens = true;
                    self.skip_balanced('(', ')');
                }
                TokenKind::Punct('[') => {
                    self.skip_balanced('[', ']');
                }
                TokenKind::Punct('{') => {
                    if !self.skip_balanced('{', '}') {
                        self.report(Severity::Fatal, token.line, "'{' is never closed");
                        break;
                    }
                    if self.peek().is_some_and(|t| t.is_punct(';')) {
                        self.bump();
                        break;
                    }
                    if saw_parens {
                        // Function body: the declaration ends with the block
                        break;
                    }
                }
                TokenKind::Ident if token.text == "namespace" && !first => {
                    self.report(
                        Severity::Warning,
                        start_line,
                        "declaration runs into a namespace; a macro without ';' was probably used",
                    );
                    break;
                }
                _ => {
                    self.bump();
                }
            }
            first = false;
        }

        if saw_parens {
            OtherKind::Function
        } else {
            OtherKind::Variable
        }
    }

    /// Skips a balanced group starting at the current `open` token. Returns
    /// false if the input ends before the group closes.
    fn skip_balanced(&mut self, open: char, close: char) -> bool {
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return true;
                }
            }
        }
        false
    }

    /// Skips `<...>`, ignoring angle brackets nested in parentheses
    fn skip_angle_brackets(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Punct('(') => {
                    self.skip_balanced('(', ')');
                    continue;
                }
                TokenKind::Punct('<') => depth += 1,
                TokenKind::Punct('>') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.bump();
                        return;
                    }
                }
                TokenKind::Punct('{') | TokenKind::Punct(';') => return,
                _ => {}
            }
            self.bump();
        }
    }
}

/// `KENGINE_EXPORT`, `API2`: upper-case identifiers are assumed to be macros
fn is_macro_like(ident: &str) -> bool {
    ident.len() > 1
        && ident
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn other(kind: OtherKind, line: u32) -> Declaration {
    Declaration::Other(OtherDecl { kind, line })
}

#[cfg(test)]
mod tests {
    use super::super::HeaderParser;
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<Declaration> {
        let parsed = HeaderParser::new().parse_source(source);
        assert!(!parsed.has_fatal(), "{:?}", parsed.diagnostics);
        parsed.nodes
    }

    fn record(node: &Declaration) -> &RecordDecl {
        match node {
            Declaration::Record(r) => r,
            other => panic!("expected record, got {other:?}"),
        }
    }

    fn namespace(node: &Declaration) -> &NamespaceDecl {
        match node {
            Declaration::Namespace(ns) => ns,
            other => panic!("expected namespace, got {other:?}"),
        }
    }

    #[test]
    fn test_namespace_with_records() {
        let nodes = parse("namespace ns {\n struct A {};\n class B { int x; };\n}");
        assert_eq!(nodes.len(), 1);
        let ns = namespace(&nodes[0]);
        assert_eq!(ns.name, "ns");
        assert_eq!(ns.children.len(), 2);
        assert_eq!(record(&ns.children[0]).name, "A");
        assert_eq!(record(&ns.children[0]).line, 2);
        assert_eq!(record(&ns.children[1]).keyword, RecordKeyword::Class);
    }

    #[test]
    fn test_nested_namespace_definition() {
        let nodes = parse("namespace a::inline b { struct C {}; }");
        let a = namespace(&nodes[0]);
        assert_eq!(a.name, "a");
        let b = namespace(&a.children[0]);
        assert_eq!(b.name, "b");
        assert_eq!(record(&b.children[0]).name, "C");
    }

    #[test]
    fn test_forward_declaration() {
        let nodes = parse("struct A;\nstruct A {};");
        assert!(!record(&nodes[0]).is_definition);
        assert!(record(&nodes[1]).is_definition);
    }

    #[test]
    fn test_doc_comment_attaches_to_next_declaration_only() {
        let nodes = parse("//! kengine registration off\nstruct A {};\nstruct B {};");
        assert_eq!(record(&nodes[0]).comment.as_deref(), Some("kengine registration off"));
        assert_eq!(record(&nodes[1]).comment, None);
    }

    #[test]
    fn test_export_macro_attributes_and_bases() {
        let nodes = parse(
            "struct KENGINE_EXPORT [[deprecated]] alignas(16) A final : public base<int, 2>, other { void f() { if (x) {} } };",
        );
        let a = record(&nodes[0]);
        assert_eq!(a.name, "A");
        assert!(a.is_definition);
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_skipped_kinds() {
        let nodes = parse(
            r#"
            template <typename T, typename = std::enable_if_t<(sizeof(T) > 4)>>
            struct Big { T t; };
            template<> struct Big<int> {};
            enum class E : int { A, B };
            union U { int i; float f; };
            using Alias = int;
            typedef struct { int x; } Anon;
            namespace fs = std::filesystem;
            extern "C" { struct CStruct {}; }
            void function(int a) { struct Local {}; }
            int variable = 3;
            struct Forward * make_forward();
            struct { int y; } anonymous_instance;
            "#,
        );

        let kinds: Vec<_> = nodes
            .iter()
            .map(|n| match n {
                Declaration::Other(o) => o.kind,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                OtherKind::Template,
                OtherKind::Template,
                OtherKind::Enum,
                OtherKind::Union,
                OtherKind::Alias,
                OtherKind::Alias,
                OtherKind::Alias,
                OtherKind::LinkageSpec,
                OtherKind::Function,
                OtherKind::Variable,
                OtherKind::Function,
                OtherKind::Variable,
            ]
        );
    }

    #[test]
    fn test_function_body_does_not_swallow_next_declaration() {
        let nodes = parse("inline void f() { return; }\nstruct A {};");
        assert_eq!(nodes.len(), 2);
        assert_eq!(record(&nodes[1]).name, "A");
    }

    #[test]
    fn test_trailing_declarators() {
        let nodes = parse("struct A { int x; } a, *b;\nstruct B {};");
        assert_eq!(nodes.len(), 2);
        assert_eq!(record(&nodes[0]).name, "A");
        assert_eq!(record(&nodes[1]).name, "B");
    }

    #[test]
    fn test_elaborated_variable_is_not_a_record() {
        let nodes = parse("struct A a{1};\nstruct B b;\nstruct C c = {};");
        assert_eq!(nodes.len(), 3);
        for node in &nodes {
            assert!(matches!(node, Declaration::Other(OtherDecl { kind: OtherKind::Variable, .. })));
        }
    }

    #[test]
    fn test_lowercase_attribute_macro_before_name() {
        let parsed = HeaderParser::new().parse_source(
            "namespace ns {\nstruct my_api Widget {};\nstruct my_api Base : other { int x; };\nstruct Other {};\n}",
        );
        assert!(!parsed.has_fatal(), "{:?}", parsed.diagnostics);

        let ns = namespace(&parsed.nodes[0]);
        let names: Vec<_> = ns.children.iter().map(|n| record(n).name.as_str()).collect();
        assert_eq!(names, vec!["Widget", "Base", "Other"]);
        assert!(ns.children.iter().all(|n| record(n).is_definition));

        let warnings: Vec<_> = parsed
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| (d.line, d.message.as_str()))
            .collect();
        assert_eq!(
            warnings,
            vec![
                (2, "'my_api' before 'Widget' is taken for an attribute macro"),
                (3, "'my_api' before 'Base' is taken for an attribute macro"),
            ]
        );
    }

    #[test]
    fn test_anonymous_namespace() {
        let nodes = parse("namespace { struct Hidden {}; }");
        let ns = namespace(&nodes[0]);
        assert_eq!(ns.name, "");
        assert_eq!(record(&ns.children[0]).name, "Hidden");
    }

    #[test]
    fn test_unclosed_namespace_is_fatal() {
        let parsed = HeaderParser::new().parse_source("namespace ns {\nstruct A {};\n");
        assert!(parsed.has_fatal());
        assert_eq!(
            parsed.fatal_messages(),
            vec!["line 1: fatal: namespace 'ns' is never closed"]
        );
    }

    #[test]
    fn test_stray_closing_brace_is_fatal() {
        let parsed = HeaderParser::new().parse_source("struct A {};\n}\n");
        assert!(parsed.has_fatal());
    }
}
