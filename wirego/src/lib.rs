//! # wirego
//!
//! Compile-time dependency-injection code generator for Go modules.
//!
//! Directive files (`di.go`) declare how an object graph is wired:
//!
//! ```go
//! di.Build(UserHandler{})
//! di.Bind(Writer{}, FileWriter{})
//! di.BindEnv(Servicer{}, TestImpl{}, "test")
//! di.Share(Db{}, OpenDb("postgres://"))
//! di.Singleton(Redis{}, NewRedis())
//! ```
//!
//! wirego reads every Go source of the module, resolves each requested
//! type down to primitive parameters and writes one `di_generated.go` per
//! package with the synthesized constructors.
//!
//! ## Quick Start
//!
//! ```ignore
//! use wirego::prelude::*;
//!
//! let config = GeneratorConfig::builder().root("./service").build();
//! let report = wirego::run(&config)?;
//! println!("{} units written", report.written());
//! ```
//!
//! ## Crate Organization
//!
//! - [`schema`] - Go parsing, directive extraction and the symbol registry
//! - [`codegen`] - Constructor synthesis and unit emission
//! - [`config`] - Run configuration

pub mod config;
pub mod prelude;

/// Go parsing, directive extraction and the symbol registry.
pub mod schema {
    pub use wirego_schema::*;
}

/// Constructor synthesis and unit emission.
pub mod codegen {
    pub use wirego_codegen::*;
}

pub use config::{GeneratorConfig, GeneratorConfigBuilder};
pub use wirego_codegen::{
    CodegenError, GeneratedUnit, Generator, WriteOutcome, write_unit, write_units,
};

use std::path::PathBuf;

/// Outcome of every unit of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Unit path and what happened to it, sorted by package name.
    pub units: Vec<(PathBuf, WriteOutcome)>,
}

impl RunReport {
    /// Returns the number of units with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: WriteOutcome) -> usize {
        self.units.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Returns the number of units written.
    #[must_use]
    pub fn written(&self) -> usize {
        self.count(WriteOutcome::Written)
    }
}

/// Runs generation and applies the write policy to every unit.
///
/// Nothing is written unless every directive succeeds.
///
/// # Arguments
/// * `config` - Run configuration
///
/// # Returns
/// What happened to each unit.
///
/// # Errors
/// Returns `CodegenError::Diagnostics` with every directive failure, or the
/// first parse or IO error.
pub fn run(config: &GeneratorConfig) -> Result<RunReport, CodegenError> {
    let mut generator = Generator::new(config.root.clone()).with_env(config.env.clone());
    if let Some(module) = &config.module {
        generator = generator.with_module(module.clone());
    }
    let units = generator.generate()?;
    let outcomes = write_units(&units, config.dry_run)?;

    let report = RunReport {
        units: units.iter().map(GeneratedUnit::path).zip(outcomes).collect(),
    };
    for (path, outcome) in &report.units {
        tracing::debug!("{}: {:?}", path.display(), outcome);
    }
    Ok(report)
}
