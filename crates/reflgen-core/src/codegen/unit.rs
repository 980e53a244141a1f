//! Per-type registration units.
//!
//! Each enabled type gets one source file holding its `pre_register_<name>`
//! and `register_<name>` functions. Rendering is pure text synthesis; only
//! [`UnitGenerator::generate`] touches the filesystem.

use super::bindings::RuntimeBindings;
use super::naming::{pre_register_function, register_function};
use super::writer::{include, CodeWriter};
use crate::error::{Error, Result};
use crate::registrar::{Pass, RegistrarDescriptor, RegistrarSet};
use crate::types::TypeDescriptor;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Extension of generated per-type units
pub const UNIT_EXTENSION: &str = "cpp";

/// Outcome of generating one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    /// The unit was written to this path
    Written(PathBuf),
    /// A file already existed at this path and was left untouched
    Skipped(PathBuf),
}

impl GenerationResult {
    /// Path the result refers to
    pub fn path(&self) -> &Path {
        match self {
            GenerationResult::Written(path) | GenerationResult::Skipped(path) => path,
        }
    }

    /// Returns true for [`GenerationResult::Skipped`]
    pub fn is_skipped(&self) -> bool {
        matches!(self, GenerationResult::Skipped(_))
    }
}

/// A rendered unit waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Type the unit registers
    pub qualified_name: String,
    /// Where the unit goes
    pub output_path: PathBuf,
    /// True if a file already existed at `output_path` when the unit was planned
    pub is_stale: bool,
    /// Rendered source text
    pub contents: String,
}

/// Renders and writes per-type units
#[derive(Debug, Clone)]
pub struct UnitGenerator {
    namespace: String,
    output_dir: PathBuf,
    root: Option<PathBuf>,
    bindings: RuntimeBindings,
}

impl UnitGenerator {
    /// Creates a generator placing flat units in `output_dir`
    pub fn new(namespace: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            output_dir: output_dir.into(),
            root: None,
            bindings: RuntimeBindings::default(),
        }
    }

    /// Mirrors each header's directory relative to `root` under the output directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Overrides the runtime bindings
    pub fn with_bindings(mut self, bindings: RuntimeBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Output path of the unit for `ty`.
    ///
    /// Without a root the unit is `<output>/<base_name>.cpp`. With a root, the
    /// header's directory relative to the root is inserted in between.
    ///
    /// The namespace is not part of the path. Two runs with different
    /// namespaces writing into the same output directory therefore share their
    /// per-type units: the second run skips the units the first one wrote (they
    /// keep the first namespace) unless `force` is set. Give each namespace its
    /// own output directory.
    pub fn output_path(&self, ty: &TypeDescriptor) -> Result<PathBuf> {
        let mut path = self.output_dir.clone();
        if let Some(root) = &self.root {
            path.push(mirrored_dir(root, ty.source_header())?);
        }
        path.push(format!("{}.{}", ty.function_base_name(), UNIT_EXTENSION));
        Ok(path)
    }

    /// Renders the unit for `ty` and pairs it with its output path
    pub fn plan(&self, ty: &TypeDescriptor, registrars: &RegistrarSet) -> Result<GeneratedUnit> {
        let output_path = self.output_path(ty)?;
        Ok(GeneratedUnit {
            qualified_name: ty.qualified_name().to_string(),
            is_stale: output_path.exists(),
            contents: self.render(ty, registrars),
            output_path,
        })
    }

    /// Writes a planned unit unless a file exists there and `force` is false
    pub fn write(&self, unit: &GeneratedUnit, force: bool) -> Result<GenerationResult> {
        let path = &unit.output_path;
        if !force && path.exists() {
            info!(
                "Skipping existing {} ('{}'): it is not regenerated without --force and may be out of date",
                path.display(),
                unit.qualified_name
            );
            return Ok(GenerationResult::Skipped(path.clone()));
        }

        write_file(path, &unit.contents)?;
        debug!("Wrote registration for '{}' to {}", unit.qualified_name, path.display());
        Ok(GenerationResult::Written(path.clone()))
    }

    /// Renders and writes the unit for one type
    pub fn generate(
        &self,
        ty: &TypeDescriptor,
        registrars: &RegistrarSet,
        force: bool,
    ) -> Result<GenerationResult> {
        let unit = self.plan(ty, registrars)?;
        self.write(&unit, force)
    }

    /// Renders the unit text for `ty`
    pub fn render(&self, ty: &TypeDescriptor, registrars: &RegistrarSet) -> String {
        let mut w = CodeWriter::new();
        self.write_includes(&mut w, ty, registrars);
        w.blank();
        w.line(format!("namespace {} {{", self.namespace));
        w.indent();
        self.write_function(&mut w, ty, Pass::Pre, registrars.pass(Pass::Pre));
        w.blank();
        self.write_function(&mut w, ty, Pass::Post, registrars.pass(Pass::Post));
        w.dedent();
        w.line("}");
        w.finish()
    }

    fn write_includes(&self, w: &mut CodeWriter, ty: &TypeDescriptor, registrars: &RegistrarSet) {
        let header = ty.source_header().to_string_lossy();
        match ty.compile_guard() {
            Some(guard) => {
                w.directive(format!("#if {guard}"));
                w.directive(include(&header));
                w.directive("#endif");
            }
            None => w.directive(include(&header)),
        }

        let registrar_headers = registrars.headers();
        if !registrar_headers.is_empty() {
            w.blank();
            w.line("// registrars");
            for h in registrar_headers {
                w.directive(include(h));
            }
        }

        w.blank();
        w.line("// runtime");
        w.directive(include(&self.bindings.context_forward_header));
        for h in &self.bindings.helper_headers {
            w.directive(include(h));
        }
    }

    fn write_function(
        &self,
        w: &mut CodeWriter,
        ty: &TypeDescriptor,
        pass: Pass,
        registrars: &[RegistrarDescriptor],
    ) {
        let b = &self.bindings;
        let name = match pass {
            Pass::Pre => pre_register_function(ty.function_base_name()),
            Pass::Post => register_function(ty.function_base_name()),
        };
        let verb = match pass {
            Pass::Pre => "pre-registering",
            Pass::Post => "registering",
        };
        let type_name = ty.qualified_name();

        w.line(format!("{} {{", b.function_head(&name)));
        w.indent();
        if let Some(profiling) = b.profiling_statement() {
            w.line(profiling);
            w.blank();
        }

        if let Some(guard) = ty.compile_guard() {
            w.directive(format!("#if {guard}"));
        }

        w.line(b.log_statement(
            &b.log_severity,
            &format!("{} '{}'", capitalize(verb), type_name),
        ));
        for registrar in registrars.iter().filter(|r| r.applies(ty.category())) {
            w.line(format!("{}<{}>({});", registrar.registration_call, type_name, b.context_name));
        }

        if let Some(guard) = ty.compile_guard() {
            w.directive("#else");
            w.line(b.log_statement(
                &b.log_severity,
                &format!("Not {} '{}' because '{}' is not set", verb, type_name, guard),
            ));
            w.directive("#endif");
        }

        w.dedent();
        w.line("}");
    }
}

/// Directory of `header` relative to `root`, refusing anything that would climb
/// out of the output directory
fn mirrored_dir(root: &Path, header: &Path) -> Result<PathBuf> {
    let relative = header.strip_prefix(root).unwrap_or(header);
    let escapes = relative.components().any(|c| {
        matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        return Err(Error::path_traversal(header));
    }
    Ok(relative.parent().map(Path::to_path_buf).unwrap_or_default())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Writes `contents` to `path`, creating parent directories
pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
        }
    }
    fs::write(path, contents).map_err(|e| Error::file_write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn registrars() -> RegistrarSet {
        let mut set = RegistrarSet::new();
        set.push(RegistrarDescriptor::new("meta", "meta.hpp", Pass::Pre));
        set.push(RegistrarDescriptor::new("bind", "bind.hpp", Pass::Post));
        set.push(RegistrarDescriptor::new("storage", "meta.hpp", Pass::Post).applies_to(Category::Component));
        set
    }

    #[test]
    fn test_render_plain_unit() {
        let ty = TypeDescriptor::new("ns::A", "include/ns/a.hpp");
        let text = UnitGenerator::new("gen", "out").render(&ty, &registrars());

        let expected = "\
#include \"include/ns/a.hpp\"

// registrars
#include \"meta.hpp\"
#include \"bind.hpp\"

// runtime
#include <entt/entity/fwd.hpp>
#include \"kengine/helpers/log_helper.hpp\"
#include \"kengine/helpers/profiling_helper.hpp\"

namespace gen {
\tvoid pre_register_ns_A(entt::registry & r) noexcept {
\t\tKENGINE_PROFILING_SCOPE;

\t\tkengine_log(r, verbose, \"init/register_types\", \"Pre-registering 'ns::A'\");
\t\tmeta<ns::A>(r);
\t}

\tvoid register_ns_A(entt::registry & r) noexcept {
\t\tKENGINE_PROFILING_SCOPE;

\t\tkengine_log(r, verbose, \"init/register_types\", \"Registering 'ns::A'\");
\t\tbind<ns::A>(r);
\t\tstorage<ns::A>(r);
\t}
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_guarded_unit() {
        let ty = TypeDescriptor::new("ns::Gpu", "gpu.hpp").with_compile_guard("HAS_GPU");
        let mut set = RegistrarSet::new();
        set.push(RegistrarDescriptor::new("reg", "reg.hpp", Pass::Post));
        let text = UnitGenerator::new("gen", "out").render(&ty, &set);

        assert!(text.starts_with("#if HAS_GPU\n#include \"gpu.hpp\"\n#endif\n"));
        let expected_body = "\
\tvoid register_ns_Gpu(entt::registry & r) noexcept {
\t\tKENGINE_PROFILING_SCOPE;

#if HAS_GPU
\t\tkengine_log(r, verbose, \"init/register_types\", \"Registering 'ns::Gpu'\");
\t\treg<ns::Gpu>(r);
#else
\t\tkengine_log(r, verbose, \"init/register_types\", \"Not registering 'ns::Gpu' because 'HAS_GPU' is not set\");
#endif
\t}
";
        assert!(text.contains(expected_body), "{text}");
        assert!(text.contains("Not pre-registering 'ns::Gpu' because 'HAS_GPU' is not set"));
    }

    #[test]
    fn test_category_filter() {
        let ty = TypeDescriptor::new("Point", "point.hpp").with_category(Category::Type);
        let text = UnitGenerator::new("gen", "out").render(&ty, &registrars());
        assert!(text.contains("bind<Point>(r);"));
        assert!(!text.contains("storage<Point>"));
        // header still included for a filtered registrar
        assert!(text.contains("#include \"meta.hpp\""));
    }

    #[test]
    fn test_output_paths() {
        let ty = TypeDescriptor::new("ns::A", "src/game/ns/a.hpp");
        let flat = UnitGenerator::new("gen", "out");
        assert_eq!(flat.output_path(&ty).unwrap(), PathBuf::from("out/ns_A.cpp"));

        let mirrored = UnitGenerator::new("gen", "out").with_root("src");
        assert_eq!(mirrored.output_path(&ty).unwrap(), PathBuf::from("out/game/ns/ns_A.cpp"));
    }

    #[test]
    fn test_namespace_does_not_change_output_path() {
        let dir = TempDir::new().unwrap();
        let ty = TypeDescriptor::new("ns::A", "a.hpp");
        let set = registrars();
        let first = UnitGenerator::new("first", dir.path());
        let second = UnitGenerator::new("second", dir.path());
        assert_eq!(first.output_path(&ty).unwrap(), second.output_path(&ty).unwrap());

        first.generate(&ty, &set, false).unwrap();
        let shared = second.generate(&ty, &set, false).unwrap();
        assert!(shared.is_skipped());
        let contents = fs::read_to_string(shared.path()).unwrap();
        assert!(contents.contains("namespace first"));
        assert!(!contents.contains("namespace second"));

        let forced = second.generate(&ty, &set, true).unwrap();
        assert!(!forced.is_skipped());
        assert!(fs::read_to_string(forced.path()).unwrap().contains("namespace second"));
    }

    #[test]
    fn test_output_path_traversal_rejected() {
        let ty = TypeDescriptor::new("ns::A", "../elsewhere/a.hpp");
        let generator = UnitGenerator::new("gen", "out").with_root("src");
        assert!(matches!(
            generator.output_path(&ty),
            Err(Error::PathTraversal { .. })
        ));
    }

    #[test]
    fn test_generate_skips_existing() {
        let dir = TempDir::new().unwrap();
        let generator = UnitGenerator::new("gen", dir.path());
        let ty = TypeDescriptor::new("ns::A", "a.hpp");
        let set = registrars();

        let first = generator.generate(&ty, &set, false).unwrap();
        assert_eq!(first, GenerationResult::Written(dir.path().join("ns_A.cpp")));

        fs::write(first.path(), "// edited").unwrap();
        let second = generator.generate(&ty, &set, false).unwrap();
        assert!(second.is_skipped());
        assert_eq!(fs::read_to_string(second.path()).unwrap(), "// edited");

        let forced = generator.generate(&ty, &set, true).unwrap();
        assert!(!forced.is_skipped());
        assert_eq!(
            fs::read_to_string(forced.path()).unwrap(),
            generator.render(&ty, &set)
        );
    }

    #[test]
    fn test_plan_marks_stale() {
        let dir = TempDir::new().unwrap();
        let generator = UnitGenerator::new("gen", dir.path());
        let ty = TypeDescriptor::new("A", "a.hpp");

        assert!(!generator.plan(&ty, &RegistrarSet::new()).unwrap().is_stale);
        fs::write(dir.path().join("A.cpp"), "").unwrap();
        assert!(generator.plan(&ty, &RegistrarSet::new()).unwrap().is_stale);
    }
}
