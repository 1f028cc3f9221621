//! # wirego Codegen
//!
//! Constructor synthesis and Go source emission for the wirego
//! dependency-injection generator.
//!
//! This crate provides:
//! - Binding registration (capabilities, shared values, singletons)
//! - Constructor synthesis with cycle detection
//! - Per-package unit rendering and the write policy
//! - The generation run tying discovery, synthesis and emission together

pub mod capability;
pub mod constructor;
pub mod context;
pub mod emit;
pub mod error;
pub mod generator;
pub mod go;
pub mod shared;
pub mod singleton;

pub use capability::{CapabilityBindings, Implementation};
pub use context::{ImportBook, PackageOutput, RunContext, TypeKey};
pub use emit::{GeneratedUnit, WriteOutcome, render_unit, write_unit};
pub use error::CodegenError;
pub use generator::Generator;

/// Writes every unit according to the write policy.
///
/// # Errors
/// Returns `CodegenError::Io` on the first unit that cannot be written.
pub fn write_units(
    units: &[GeneratedUnit],
    dry_run: bool,
) -> Result<Vec<WriteOutcome>, CodegenError> {
    units.iter().map(|unit| write_unit(unit, dry_run)).collect()
}
