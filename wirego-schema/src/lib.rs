//! # wirego Schema
//!
//! Go source model for the wirego dependency-injection generator.
//!
//! This crate provides:
//! - Go source parsing into record, capability and method declarations
//! - Directive extraction into typed bindings
//! - A per-package symbol registry
//! - Source tree discovery

pub mod directives;
pub mod discovery;
pub mod error;
pub mod parser;
pub mod registry;
pub mod types;

pub use directives::{
    BindTarget, Binding, BindingKind, CallSite, DirectiveArg, DirectiveFile, Location, TypeRef,
    UnknownCall,
};
pub use discovery::{
    DIRECTIVE_FILE, GENERATED_FILE, LEGACY_GENERATED_FILE, SourceTree, discover, infer_module,
};
pub use error::ParseError;
pub use parser::GoParser;
pub use registry::{Package, Symbol, SymbolRegistry};
pub use types::{
    CapabilityType, Field, Import, Method, MethodSig, Param, Receiver, RecordType, SourceFile,
    TypeExpr, Variable,
};
