//! # reflgen-core
//!
//! A library for generating type registration code from C++ headers.
//!
//! This crate provides the core functionality for:
//! - Discovering struct/class definitions in headers, namespace by namespace
//! - Loading registrar descriptors, grouped into pre-registration and registration passes
//! - Emitting one registration unit per type plus an aggregator unit holding the
//!   dispatch tables and the entry function
//!
//! ## Architecture
//!
//! - [`parser`]: Declaration trees, the [`DeclarationParser`] capability and a built-in parser
//! - [`scanner`]: Type discovery over declaration trees
//! - [`registrar`]: Registrar descriptor documents
//! - [`types`]: Type descriptors and type descriptor documents
//! - [`codegen`]: Per-type and aggregator source text
//! - [`generator`]: Validation, rendering and writing of a whole run
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use reflgen_core::{registrar, Generator, GeneratorConfig, ParseOptions, Scanner};
//!
//! let registrars = registrar::load(&["registrations.json"])?;
//! let scanned = Scanner::new().scan_all(&["include/game/components.hpp"], &ParseOptions::new())?;
//!
//! let config = GeneratorConfig::new("game", "generated").root("include");
//! let report = Generator::new(config)?.run(&scanned.types, &registrars)?;
//! println!("{} written, {} skipped", report.written(), report.skipped());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`DeclarationParser`]: Plug in another C++ front end
//! - [`RuntimeBindings`]: Retarget the generated code at another runtime
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codegen;
pub mod error;
pub mod generator;
pub mod parser;
pub mod registrar;
pub mod scanner;
pub mod types;

// Re-export primary types for convenience
pub use codegen::{GenerationResult, RuntimeBindings};
pub use error::{Error, Result};
pub use generator::{GenerationPlan, GenerationReport, Generator, GeneratorConfig};
pub use parser::{DeclarationParser, HeaderParser, ParseOptions};
pub use registrar::{Pass, RegistrarDescriptor, RegistrarSet};
pub use scanner::{ScanOutput, Scanner, ScannerConfig};
pub use types::{Category, TypeDescriptor};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
