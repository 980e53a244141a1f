//! Indentation-aware text builder used by the generators.

/// Accumulates generated source text line by line
#[derive(Debug)]
pub(crate) struct CodeWriter {
    output: String,
    indent_str: &'static str,
    indent_level: usize,
}

impl CodeWriter {
    pub(crate) fn new() -> Self {
        Self {
            output: String::new(),
            indent_str: "\t",
            indent_level: 0,
        }
    }

    pub(crate) fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// Writes an indented line
    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent_level {
            self.output.push_str(self.indent_str);
        }
        self.output.push_str(text.as_ref());
        self.output.push('\n');
    }

    /// Writes a line at column zero, as preprocessor directives are
    pub(crate) fn directive(&mut self, text: impl AsRef<str>) {
        self.output.push_str(text.as_ref());
        self.output.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.output.push('\n');
    }

    pub(crate) fn finish(self) -> String {
        self.output
    }
}

/// Formats an `#include` line; headers already spelled `<x>` or `"x"` are kept as-is
pub(crate) fn include(header: &str) -> String {
    let header = header.trim();
    if header.starts_with('<') || header.starts_with('"') {
        format!("#include {header}")
    } else {
        format!("#include \"{}\"", header.replace('\\', "/"))
    }
}

/// Escapes text for use inside a C string literal
pub(crate) fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_indentation() {
        let mut w = CodeWriter::new();
        w.line("namespace ns {");
        w.indent();
        w.line("void f();");
        w.directive("#if X");
        w.dedent();
        w.dedent();
        w.line("}");
        assert_eq!(w.finish(), "namespace ns {\n\tvoid f();\n#if X\n}\n");
    }

    #[test]
    fn test_include() {
        assert_eq!(include("a/b.hpp"), "#include \"a/b.hpp\"");
        assert_eq!(include("a\\b.hpp"), "#include \"a/b.hpp\"");
        assert_eq!(include("<array>"), "#include <array>");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("ns::A"), "ns::A");
        assert_eq!(escape_string("defined(\"X\")"), "defined(\\\"X\\\")");
    }
}
