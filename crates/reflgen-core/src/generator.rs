//! Generation pipeline.
//!
//! A run happens in two steps. [`Generator::plan`] validates the descriptors
//! and renders every unit in memory; nothing is written if any of it fails, so
//! the aggregator can never reference a function missing from disk.
//! [`Generator::execute`] then writes the plan, applying the skip-if-exists
//! policy to per-type units. The aggregator is always rewritten.

use crate::codegen::naming::{is_valid_identifier, is_valid_namespace};
use crate::codegen::unit::write_file;
use crate::codegen::{
    DispatchGenerator, GeneratedUnit, GenerationResult, MainUnits, RuntimeBindings, UnitGenerator,
    DEFAULT_ENTRY_NAME,
};
use crate::error::{Error, Result};
use crate::registrar::RegistrarSet;
use crate::types::{validate_unique, TypeDescriptor};
use std::path::PathBuf;
use tracing::{debug, info};

/// Configuration for a generation run
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Namespace wrapping every generated declaration
    pub namespace: String,
    /// Destination directory
    pub output_dir: PathBuf,
    /// If set, per-type units mirror header directories relative to this root
    pub root: Option<PathBuf>,
    /// Overwrite existing per-type units
    pub force: bool,
    /// Generate per-type units
    pub write_type_files: bool,
    /// Generate the aggregator units
    pub write_main_file: bool,
    /// Entry function name and aggregator file stem
    pub entry_name: String,
    /// Macro decorating the entry declaration
    pub export_macro: Option<String>,
    /// Header defining `export_macro`
    pub export_header: Option<String>,
    /// Runtime names used by the generated code
    pub bindings: RuntimeBindings,
}

impl GeneratorConfig {
    /// Creates a configuration writing both stages into `output_dir`
    pub fn new(namespace: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            output_dir: output_dir.into(),
            root: None,
            force: false,
            write_type_files: true,
            write_main_file: true,
            entry_name: DEFAULT_ENTRY_NAME.to_string(),
            export_macro: None,
            export_header: None,
            bindings: RuntimeBindings::default(),
        }
    }

    /// Sets the input root
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Sets whether existing per-type units are overwritten
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets whether per-type units are generated
    pub fn write_type_files(mut self, write: bool) -> Self {
        self.write_type_files = write;
        self
    }

    /// Sets whether the aggregator units are generated
    pub fn write_main_file(mut self, write: bool) -> Self {
        self.write_main_file = write;
        self
    }

    /// Sets the entry function name
    pub fn entry_name(mut self, name: impl Into<String>) -> Self {
        self.entry_name = name.into();
        self
    }

    /// Sets the export macro
    pub fn export_macro(mut self, export_macro: impl Into<String>) -> Self {
        self.export_macro = Some(export_macro.into());
        self
    }

    /// Sets the export header
    pub fn export_header(mut self, header: impl Into<String>) -> Self {
        self.export_header = Some(header.into());
        self
    }

    /// Sets the runtime bindings
    pub fn bindings(mut self, bindings: RuntimeBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Checks that every name ending up in generated code is a valid identifier
    pub fn validate(&self) -> Result<()> {
        if !is_valid_namespace(&self.namespace) {
            return Err(Error::config(
                "generator",
                "namespace",
                format!("'{}' is not a valid namespace", self.namespace),
            ));
        }
        if !is_valid_identifier(&self.entry_name) {
            return Err(Error::config(
                "generator",
                "entry_name",
                format!("'{}' is not a valid identifier", self.entry_name),
            ));
        }
        if let Some(m) = &self.export_macro {
            if !m.is_empty() && !is_valid_identifier(m) {
                return Err(Error::config(
                    "generator",
                    "export_macro",
                    format!("'{m}' is not a valid identifier"),
                ));
            }
        }
        Ok(())
    }
}

/// Paths and text of the aggregator units
#[derive(Debug, Clone)]
pub struct MainArtifacts {
    /// Implementation unit path
    pub source_path: PathBuf,
    /// Interface unit path
    pub header_path: PathBuf,
    /// Rendered text
    pub units: MainUnits,
}

/// Everything a run would write, fully rendered
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    /// Enabled types, in generation order
    pub types: Vec<TypeDescriptor>,
    /// Per-type units (empty when type files are disabled)
    pub units: Vec<GeneratedUnit>,
    /// Aggregator units (absent when the main file is disabled)
    pub main: Option<MainArtifacts>,
}

/// What a run did
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Outcome of each per-type unit
    pub units: Vec<GenerationResult>,
    /// Aggregator files written
    pub main_files: Vec<PathBuf>,
}

impl GenerationReport {
    /// Number of per-type units written
    pub fn written(&self) -> usize {
        self.units.iter().filter(|r| !r.is_skipped()).count()
    }

    /// Number of per-type units left untouched
    pub fn skipped(&self) -> usize {
        self.units.iter().filter(|r| r.is_skipped()).count()
    }
}

/// Drives unit and aggregator generation
#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
    units: UnitGenerator,
    dispatch: DispatchGenerator,
}

impl Generator {
    /// Creates a generator after validating `config`
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;

        let mut units = UnitGenerator::new(&config.namespace, &config.output_dir)
            .with_bindings(config.bindings.clone());
        if let Some(root) = &config.root {
            units = units.with_root(root);
        }

        let mut dispatch = DispatchGenerator::new(&config.namespace)
            .with_entry_name(&config.entry_name)
            .with_bindings(config.bindings.clone());
        if let Some(m) = &config.export_macro {
            dispatch = dispatch.with_export_macro(m);
        }
        if let Some(h) = &config.export_header {
            dispatch = dispatch.with_export_header(h);
        }

        Ok(Self {
            config,
            units,
            dispatch,
        })
    }

    /// Returns the configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Validates the descriptors and renders every unit without touching the disk
    pub fn plan(&self, types: &[TypeDescriptor], registrars: &RegistrarSet) -> Result<GenerationPlan> {
        validate_unique(types)?;

        let enabled: Vec<TypeDescriptor> = types
            .iter()
            .filter(|ty| {
                if !ty.is_enabled() {
                    debug!("Excluding disabled type '{}'", ty.qualified_name());
                }
                ty.is_enabled()
            })
            .cloned()
            .collect();

        let main = self.config.write_main_file.then(|| MainArtifacts {
            source_path: self.config.output_dir.join(self.dispatch.source_file_name()),
            header_path: self.config.output_dir.join(self.dispatch.header_file_name()),
            units: self.dispatch.render(&enabled),
        });

        let mut units = Vec::new();
        if self.config.write_type_files {
            units.reserve(enabled.len());
            for ty in &enabled {
                let unit = self.units.plan(ty, registrars)?;
                if let Some(main) = &main {
                    if unit.output_path == main.source_path {
                        return Err(Error::identifier_collision(
                            ty.function_base_name(),
                            ty.qualified_name(),
                            self.dispatch.entry_name(),
                        ));
                    }
                }
                units.push(unit);
            }
        }

        debug!(
            "Planned {} unit(s) for {} type(s)",
            units.len() + main.as_ref().map_or(0, |_| 2),
            enabled.len()
        );

        Ok(GenerationPlan {
            types: enabled,
            units,
            main,
        })
    }

    /// Writes a plan produced by [`plan`](Self::plan)
    pub fn execute(&self, plan: &GenerationPlan) -> Result<GenerationReport> {
        let mut report = GenerationReport::default();

        for unit in &plan.units {
            report.units.push(self.units.write(unit, self.config.force)?);
        }

        if let Some(main) = &plan.main {
            write_file(&main.source_path, &main.units.source)?;
            write_file(&main.header_path, &main.units.header)?;
            debug!("Wrote {} and {}", main.source_path.display(), main.header_path.display());
            report.main_files.push(main.source_path.clone());
            report.main_files.push(main.header_path.clone());
        }

        info!(
            "Generated registration for {} type(s): {} unit(s) written, {} skipped",
            plan.types.len(),
            report.written(),
            report.skipped()
        );
        Ok(report)
    }

    /// Plans and executes in one go
    pub fn run(&self, types: &[TypeDescriptor], registrars: &RegistrarSet) -> Result<GenerationReport> {
        let plan = self.plan(types, registrars)?;
        self.execute(&plan)
    }
}
