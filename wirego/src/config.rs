//! Run configuration.

use std::path::PathBuf;

/// Process environment variable holding the environment selector.
pub const ENV_VAR: &str = "ENV";

/// Configuration of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Module root.
    pub root: PathBuf,
    /// Module path; inferred from `go.mod` when `None`.
    pub module: Option<String>,
    /// Environment selector for `BindEnv` directives.
    pub env: Option<String>,
    /// Render and report without writing.
    pub dry_run: bool,
}

impl GeneratorConfig {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::new()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfigBuilder::new().build()
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug, Clone)]
pub struct GeneratorConfigBuilder {
    root: PathBuf,
    module: Option<String>,
    env: Option<Option<String>>,
    dry_run: bool,
}

impl GeneratorConfigBuilder {
    /// Creates a builder for the current directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("."),
            module: None,
            env: None,
            dry_run: false,
        }
    }

    /// Sets the module root.
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the module path.
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets the environment selector, overriding `ENV`.
    #[must_use]
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(Some(env.into()));
        self
    }

    /// Clears the environment selector, ignoring `ENV`.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.env = Some(None);
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builds the configuration, reading `ENV` unless the selector was set.
    #[must_use]
    pub fn build(self) -> GeneratorConfig {
        let env = self.env.unwrap_or_else(|| {
            std::env::var(ENV_VAR)
                .ok()
                .filter(|value| !value.is_empty())
        });
        GeneratorConfig {
            root: self.root,
            module: self.module,
            env,
            dry_run: self.dry_run,
        }
    }
}

impl Default for GeneratorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
