//! Aggregator unit: the dispatch tables and the public entry function.
//!
//! The entry function does not run any registration itself. It attaches two
//! callbacks to a fresh entity of the runtime context, one iterating the
//! pre-registration table and one iterating the registration table, and the
//! runtime decides when to invoke them.

use super::bindings::RuntimeBindings;
use super::naming::{pre_register_function, register_function};
use super::writer::{include, CodeWriter};
use crate::registrar::Pass;
use crate::types::TypeDescriptor;

/// Default name of the entry function and stem of the aggregator files
pub const DEFAULT_ENTRY_NAME: &str = "add_type_registrator";

const FN_ALIAS: &str = "type_registrator_fn";

/// Rendered aggregator artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainUnits {
    /// Implementation unit (`<entry>.cpp`)
    pub source: String,
    /// Interface unit (`<entry>.hpp`)
    pub header: String,
}

/// Renders the aggregator units
#[derive(Debug, Clone)]
pub struct DispatchGenerator {
    namespace: String,
    entry_name: String,
    export_macro: Option<String>,
    export_header: Option<String>,
    bindings: RuntimeBindings,
}

impl DispatchGenerator {
    /// Creates a generator for the given namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entry_name: DEFAULT_ENTRY_NAME.to_string(),
            export_macro: None,
            export_header: None,
            bindings: RuntimeBindings::default(),
        }
    }

    /// Sets the entry function name, which is also the file stem
    pub fn with_entry_name(mut self, name: impl Into<String>) -> Self {
        self.entry_name = name.into();
        self
    }

    /// Decorates the entry declaration with an export macro
    pub fn with_export_macro(mut self, export_macro: impl Into<String>) -> Self {
        self.export_macro = Some(export_macro.into());
        self
    }

    /// Includes a header defining the export macro
    pub fn with_export_header(mut self, header: impl Into<String>) -> Self {
        self.export_header = Some(header.into());
        self
    }

    /// Overrides the runtime bindings
    pub fn with_bindings(mut self, bindings: RuntimeBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Name of the entry function
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// File name of the implementation unit
    pub fn source_file_name(&self) -> String {
        format!("{}.cpp", self.entry_name)
    }

    /// File name of the interface unit
    pub fn header_file_name(&self) -> String {
        format!("{}.hpp", self.entry_name)
    }

    /// Renders both units; the tables follow the order of `types`
    pub fn render(&self, types: &[TypeDescriptor]) -> MainUnits {
        MainUnits {
            source: self.render_source(types),
            header: self.render_header(),
        }
    }

    fn render_header(&self) -> String {
        let b = &self.bindings;
        let mut w = CodeWriter::new();
        w.directive("#pragma once");
        w.blank();
        w.line("// runtime");
        w.directive(include(&b.context_forward_header));
        if let Some(header) = &self.export_header {
            w.blank();
            w.line("// export");
            w.directive(include(header));
        }
        w.blank();
        w.line(format!("namespace {} {{", self.namespace));
        w.indent();
        let head = b.function_head(&self.entry_name);
        match &self.export_macro {
            Some(m) if !m.is_empty() => w.line(format!("{m} {head};")),
            _ => w.line(format!("{head};")),
        }
        w.dedent();
        w.line("}");
        w.finish()
    }

    fn render_source(&self, types: &[TypeDescriptor]) -> String {
        let b = &self.bindings;
        let mut w = CodeWriter::new();
        w.directive(include(&self.header_file_name()));
        w.blank();
        w.line("// stl");
        w.directive(include("<array>"));
        w.blank();
        w.line("// runtime");
        w.directive(include(&b.context_header));
        for h in b.callback_headers.iter().chain(&b.helper_headers) {
            w.directive(include(h));
        }
        w.blank();
        w.line(format!("namespace {} {{", self.namespace));
        w.indent();

        for ty in types {
            w.line(b.extern_declaration(&pre_register_function(ty.function_base_name())));
            w.line(b.extern_declaration(&register_function(ty.function_base_name())));
        }
        if !types.is_empty() {
            w.blank();
        }

        w.line(format!("using {} = {};", FN_ALIAS, b.function_pointer_type()));
        w.blank();
        self.write_table(&mut w, Pass::Pre, types);
        w.blank();
        self.write_table(&mut w, Pass::Post, types);
        w.blank();
        self.write_entry(&mut w);

        w.dedent();
        w.line("}");
        w.finish()
    }

    fn write_table(&self, w: &mut CodeWriter, pass: Pass, types: &[TypeDescriptor]) {
        let head = format!(
            "static constexpr std::array<{}, {}> {}",
            FN_ALIAS,
            types.len(),
            table_name(pass)
        );
        if types.is_empty() {
            w.line(format!("{head} = {{}};"));
            return;
        }

        w.line(format!("{head} = {{"));
        w.indent();
        for ty in types {
            let name = match pass {
                Pass::Pre => pre_register_function(ty.function_base_name()),
                Pass::Post => register_function(ty.function_base_name()),
            };
            w.line(format!("{name},"));
        }
        w.dedent();
        w.line("};");
    }

    fn write_entry(&self, w: &mut CodeWriter) {
        let b = &self.bindings;
        w.line(format!("{} {{", b.function_head(&self.entry_name)));
        w.indent();
        if let Some(profiling) = b.profiling_statement() {
            w.line(profiling);
            w.blank();
        }
        w.line(format!("const auto e = {}.create();", b.context_name));
        self.write_callback(w, Pass::Pre, &b.pre_callback, "Pre-registering types");
        self.write_callback(w, Pass::Post, &b.callback, "Registering types");
        w.dedent();
        w.line("}");
    }

    fn write_callback(&self, w: &mut CodeWriter, pass: Pass, callback: &str, message: &str) {
        let b = &self.bindings;
        w.line(format!(
            "{ctx}.emplace<{callback}>(e, []({ty} & {ctx}) noexcept {{",
            ctx = b.context_name,
            ty = b.context_type,
        ));
        w.indent();
        if let Some(profiling) = b.profiling_statement() {
            w.line(profiling);
        }
        w.line(b.log_statement(&b.dispatch_log_severity, message));
        w.line(format!("for (const auto f : {})", table_name(pass)));
        w.indent();
        w.line(format!("f({});", b.context_name));
        w.dedent();
        w.dedent();
        w.line("});");
    }
}

fn table_name(pass: Pass) -> &'static str {
    match pass {
        Pass::Pre => "pre_registrators",
        Pass::Post => "registrators",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types() -> Vec<TypeDescriptor> {
        vec![
            TypeDescriptor::new("ns::A", "a.hpp"),
            TypeDescriptor::new("ns::B", "b.hpp").with_compile_guard("HAS_B"),
        ]
    }

    #[test]
    fn test_render_source() {
        let units = DispatchGenerator::new("gen").render(&types());
        let expected = "\
#include \"add_type_registrator.hpp\"

// stl
#include <array>

// runtime
#include <entt/entity/registry.hpp>
#include \"kengine/functions/pre_register_types.hpp\"
#include \"kengine/functions/register_types.hpp\"
#include \"kengine/helpers/log_helper.hpp\"
#include \"kengine/helpers/profiling_helper.hpp\"

namespace gen {
\textern void pre_register_ns_A(entt::registry &) noexcept;
\textern void register_ns_A(entt::registry &) noexcept;
\textern void pre_register_ns_B(entt::registry &) noexcept;
\textern void register_ns_B(entt::registry &) noexcept;

\tusing type_registrator_fn = void (*)(entt::registry &) noexcept;

\tstatic constexpr std::array<type_registrator_fn, 2> pre_registrators = {
\t\tpre_register_ns_A,
\t\tpre_register_ns_B,
\t};

\tstatic constexpr std::array<type_registrator_fn, 2> registrators = {
\t\tregister_ns_A,
\t\tregister_ns_B,
\t};

\tvoid add_type_registrator(entt::registry & r) noexcept {
\t\tKENGINE_PROFILING_SCOPE;

\t\tconst auto e = r.create();
\t\tr.emplace<kengine::functions::pre_register_types>(e, [](entt::registry & r) noexcept {
\t\t\tKENGINE_PROFILING_SCOPE;
\t\t\tkengine_log(r, log, \"init/register_types\", \"Pre-registering types\");
\t\t\tfor (const auto f : pre_registrators)
\t\t\t\tf(r);
\t\t});
\t\tr.emplace<kengine::functions::register_types>(e, [](entt::registry & r) noexcept {
\t\t\tKENGINE_PROFILING_SCOPE;
\t\t\tkengine_log(r, log, \"init/register_types\", \"Registering types\");
\t\t\tfor (const auto f : registrators)
\t\t\t\tf(r);
\t\t});
\t}
}
";
        assert_eq!(units.source, expected);
    }

    #[test]
    fn test_render_header_with_export() {
        let units = DispatchGenerator::new("gen")
            .with_export_macro("GEN_EXPORT")
            .with_export_header("gen_export.h")
            .render(&types());
        let expected = "\
#pragma once

// runtime
#include <entt/entity/fwd.hpp>

// export
#include \"gen_export.h\"

namespace gen {
\tGEN_EXPORT void add_type_registrator(entt::registry & r) noexcept;
}
";
        assert_eq!(units.header, expected);
    }

    #[test]
    fn test_empty_tables() {
        let units = DispatchGenerator::new("gen").render(&[]);
        assert!(units
            .source
            .contains("static constexpr std::array<type_registrator_fn, 0> pre_registrators = {};"));
        assert!(units
            .source
            .contains("static constexpr std::array<type_registrator_fn, 0> registrators = {};"));
        assert!(!units.source.contains("extern"));
    }

    #[test]
    fn test_custom_entry_name() {
        let generator = DispatchGenerator::new("gen").with_entry_name("register_game_types");
        assert_eq!(generator.source_file_name(), "register_game_types.cpp");
        assert_eq!(generator.header_file_name(), "register_game_types.hpp");
        let units = generator.render(&types());
        assert!(units.source.starts_with("#include \"register_game_types.hpp\""));
        assert!(units
            .header
            .contains("void register_game_types(entt::registry & r) noexcept;"));
    }
}
