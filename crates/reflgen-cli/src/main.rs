//! reflgen - Generate type registration code from C++ headers
//!
//! This tool scans headers for struct/class definitions and emits one
//! registration unit per type, plus an aggregator unit whose entry function
//! installs the pre-registration and registration dispatch tables.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use reflgen_core::parser::Diagnostic;
use reflgen_core::scanner::DEFAULT_OPT_OUT_MARKER;
use reflgen_core::{
    registrar, types, Category, GenerationPlan, GenerationResult, Generator, GeneratorConfig,
    ParseOptions, RuntimeBindings, Scanner, ScannerConfig,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Extensions picked up when an input is a directory
const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "inl"];

const AFTER_HELP: &str = r#"Registrar documents list the registration function templates to invoke:
[
    {
        "registration": "kengine::register_everything",
        "header": "kengine/helpers/meta/register_everything.hpp"
    }
]
A bare array is the registration pass. Use { "pre": [...], "post": [...] } to
fill the pre-registration pass as well.

Registration can be disabled for a type by placing a
`//! kengine registration off` comment before it.

Include the generated 'add_type_registrator.hpp' and call
'add_type_registrator(r)' to install the registration callbacks."#;

/// Generate type registration code from C++ headers
#[derive(Parser, Debug)]
#[command(name = "reflgen")]
#[command(author, version, about, long_about = None)]
#[command(after_help = AFTER_HELP)]
#[command(propagate_version = true)]
struct Cli {
    /// Headers to scan; directories are searched for headers recursively
    #[arg(required_unless_present = "types", num_args = 1..)]
    files: Vec<PathBuf>,

    /// Registrar descriptor documents (JSON)
    #[arg(long, required = true, num_args = 1..)]
    registrations: Vec<PathBuf>,

    /// Type descriptor documents (JSON), registered after the scanned types
    #[arg(long, num_args = 1..)]
    types: Vec<PathBuf>,

    /// Namespace in which the functions are generated
    #[arg(long)]
    namespace: String,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Root directory of the inputs; its hierarchy is reproduced in the output directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Overwrite existing per-type files
    #[arg(long)]
    force: bool,

    /// Don't write the per-type registration files
    #[arg(long)]
    no_write_type_files: bool,

    /// Don't write the aggregator files
    #[arg(long)]
    no_write_main_file: bool,

    /// Export macro decorating the entry function declaration
    #[arg(long)]
    export_macro: Option<String>,

    /// Header defining the export macro
    #[arg(long)]
    export_header: Option<String>,

    /// Name of the entry function and stem of the aggregator files
    #[arg(long, default_value = reflgen_core::codegen::DEFAULT_ENTRY_NAME)]
    entry_name: String,

    /// Category given to types found in headers
    #[arg(long, value_enum, default_value = "components")]
    category: CategoryArg,

    /// Regular expression marking a type as opted out when found in its doc comment
    #[arg(long)]
    opt_out: Option<String>,

    /// JSON document overriding the runtime names used by generated code
    #[arg(long)]
    bindings: Option<PathBuf>,

    /// Print non-fatal parser diagnostics
    #[arg(long)]
    diagnostics: bool,

    /// Dry run - don't write files, just show what would be generated
    #[arg(long)]
    dry_run: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Extra arguments for the header parser (after `--`)
    #[arg(last = true)]
    parser_args: Vec<String>,
}

/// Category of scanned types
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    /// Entity components
    Components,
    /// Other reflectible types
    Types,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Components => Category::Component,
            CategoryArg::Types => Category::Type,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let registrars =
        registrar::load(&cli.registrations).context("Failed to load registrar descriptors")?;
    info!(
        "Loaded {} registrar(s): {} pre-registration, {} registration",
        registrars.len(),
        registrars.pre.len(),
        registrars.post.len()
    );

    let headers = expand_inputs(&cli.files)?;
    let scanner = Scanner::with_config(scanner_config(cli)?);
    let options = ParseOptions::new().extra_args(cli.parser_args.iter().cloned());
    let scanned = scanner.scan_all(&headers, &options)?;
    info!(
        "Found {} type(s) in {} header(s)",
        scanned.types.len(),
        headers.len()
    );

    if cli.diagnostics {
        print_diagnostics(&scanned.diagnostics);
    }

    let mut all_types = scanned.types;
    all_types.extend(
        types::load_type_documents(&cli.types).context("Failed to load type descriptors")?,
    );

    let generator = Generator::new(generator_config(cli)?)?;
    let plan = generator.plan(&all_types, &registrars)?;

    if cli.dry_run {
        print_plan(&plan, cli.force);
        return Ok(());
    }

    let report = generator.execute(&plan)?;
    for result in &report.units {
        match result {
            GenerationResult::Written(path) => println!("Wrote {}", path.display()),
            GenerationResult::Skipped(path) => {
                debug!("Kept existing {}", path.display())
            }
        }
    }
    for path in &report.main_files {
        println!("Wrote {}", path.display());
    }

    info!(
        "Summary: {} type(s), {} written, {} skipped",
        plan.types.len(),
        report.written(),
        report.skipped()
    );

    Ok(())
}

fn scanner_config(cli: &Cli) -> Result<ScannerConfig> {
    let mut config = ScannerConfig::new().category(cli.category.into());
    if let Some(pattern) = &cli.opt_out {
        config = config
            .opt_out_pattern(pattern)
            .with_context(|| format!("Invalid --opt-out pattern: {pattern}"))?;
    } else {
        trace!("Using default opt-out marker '{}'", DEFAULT_OPT_OUT_MARKER);
    }
    Ok(config)
}

fn generator_config(cli: &Cli) -> Result<GeneratorConfig> {
    let bindings = match &cli.bindings {
        Some(path) => RuntimeBindings::from_file(path)
            .with_context(|| format!("Failed to load bindings: {}", path.display()))?,
        None => RuntimeBindings::default(),
    };

    let mut config = GeneratorConfig::new(&cli.namespace, &cli.output)
        .force(cli.force)
        .write_type_files(!cli.no_write_type_files)
        .write_main_file(!cli.no_write_main_file)
        .entry_name(&cli.entry_name)
        .bindings(bindings);
    if let Some(root) = &cli.root {
        config = config.root(root);
    }
    if let Some(m) = &cli.export_macro {
        config = config.export_macro(m);
    }
    if let Some(h) = &cli.export_header {
        config = config.export_header(h);
    }
    Ok(config)
}

/// Expands directories into the headers they contain, sorted, and drops repeats
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut headers = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| !is_hidden(p) && is_header(p))
                .collect();
            found.sort();
            debug!("Found {} header(s) under {}", found.len(), input.display());
            headers.extend(found);
        } else if input.is_file() {
            headers.push(input.clone());
        } else {
            bail!("Input does not exist: {}", input.display());
        }
    }

    let mut seen = HashSet::new();
    headers.retain(|h| {
        let first = seen.insert(h.clone());
        if !first {
            trace!("Ignoring repeated input {}", h.display());
        }
        first
    });
    Ok(headers)
}

fn is_header(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| HEADER_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn print_diagnostics(diagnostics: &[(PathBuf, Diagnostic)]) {
    print!("{}", format_diagnostics(diagnostics));
}

/// One "Diagnostics for" heading per run of diagnostics from the same header
fn format_diagnostics(diagnostics: &[(PathBuf, Diagnostic)]) -> String {
    let mut out = String::new();
    let mut current: Option<&Path> = None;
    for (path, diagnostic) in diagnostics {
        if current != Some(path.as_path()) {
            out.push_str(&format!("Diagnostics for {}:\n", path.display()));
            current = Some(path.as_path());
        }
        out.push_str(&format!("\t{diagnostic}\n"));
    }
    out
}

fn print_plan(plan: &GenerationPlan, force: bool) {
    for unit in &plan.units {
        if unit.is_stale && !force {
            println!("Would skip (exists): {}", unit.output_path.display());
        } else {
            println!("Would write: {}", unit.output_path.display());
        }
    }
    if let Some(main) = &plan.main {
        println!("Would write: {}", main.source_path.display());
        println!("Would write: {}", main.header_path.display());
    }
}
