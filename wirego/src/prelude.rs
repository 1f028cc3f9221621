//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types.
//!
//! ```ignore
//! use wirego::prelude::*;
//! ```

// Configuration and entry point
pub use crate::config::{GeneratorConfig, GeneratorConfigBuilder};
pub use crate::{RunReport, run};

// Source model
pub use wirego_schema::{Binding, BindingKind, GoParser, ParseError, SymbolRegistry, TypeExpr};

// Generation
pub use wirego_codegen::{CodegenError, GeneratedUnit, Generator, WriteOutcome};
