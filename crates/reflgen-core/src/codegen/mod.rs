//! Source generation.
//!
//! - [`unit`]: one registration unit per type
//! - [`dispatch`]: the aggregator unit with the dispatch tables and entry function
//! - [`naming`]: the name derivation both of them share
//! - [`bindings`]: runtime names the generated code refers to

pub mod bindings;
pub mod dispatch;
pub mod naming;
pub mod unit;

mod writer;

pub use bindings::RuntimeBindings;
pub use dispatch::{DispatchGenerator, MainUnits, DEFAULT_ENTRY_NAME};
pub use unit::{GeneratedUnit, GenerationResult, UnitGenerator};
