//! Generation run orchestration.
//!
//! A run discovers the source tree, fills the symbol registry, registers
//! `Share`, `Singleton`, `Bind` and `BindEnv` directives, then synthesizes
//! constructors in directive order. Failures of individual directives are
//! collected; the run returns units only when every directive succeeded.

use crate::capability::Implementation;
use crate::context::{RunContext, TypeKey};
use crate::emit::{GeneratedUnit, render_unit};
use crate::error::CodegenError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use wirego_schema::{
    BindTarget, Binding, BindingKind, GoParser, Location, SymbolRegistry, TypeRef, discover,
    infer_module,
};

/// Generator for one module tree.
#[derive(Debug, Clone)]
pub struct Generator {
    root: PathBuf,
    module: Option<String>,
    env: Option<String>,
}

impl Generator {
    /// Creates a generator for the tree under `root`.
    ///
    /// The module path defaults to the one declared in `root/go.mod`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            module: None,
            env: None,
        }
    }

    /// Sets the module path.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets the environment selector.
    #[must_use]
    pub fn with_env(mut self, env: Option<String>) -> Self {
        self.env = env;
        self
    }

    /// Runs generation and renders one unit per affected package.
    ///
    /// # Returns
    /// Units for every package owning directives or holding a previous unit,
    /// sorted by package name.
    ///
    /// # Errors
    /// Returns `CodegenError::Parse` if the tree cannot be read, or
    /// `CodegenError::Diagnostics` holding every directive failure.
    pub fn generate(&self) -> Result<Vec<GeneratedUnit>, CodegenError> {
        let tree = discover(&self.root)?;
        let module = match &self.module {
            Some(module) => module.clone(),
            None => infer_module(&self.root)?,
        };
        tracing::debug!("Generating for module {}", module);

        let mut parser = GoParser::new()?;
        let mut registry = SymbolRegistry::new(module.clone(), self.root.clone());
        for path in &tree.source_files {
            match parser.parse_file(path) {
                Ok(file) => registry.add_file(file),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        let mut files = Vec::with_capacity(tree.directive_files.len());
        for path in &tree.directive_files {
            let file = parser.parse_directive_file(path)?;
            registry.ensure_package(&file.package, parent_dir(path));
            files.push(file);
        }
        for file in &mut files {
            let imports = &file.imports;
            for binding in &mut file.bindings {
                binding.resolve_packages(&file.package, |alias| {
                    registry.resolve_qualifier(imports, alias)
                });
            }
        }

        let mut ctx = RunContext::new(&registry, self.env.clone());
        let mut errors = Vec::new();

        for file in &files {
            ctx.output_mut(&file.package);
            for unknown in &file.unknown {
                errors.push(
                    CodegenError::UnknownDirective {
                        kind: unknown.kind.clone(),
                    }
                    .at(&unknown.location),
                );
            }
        }
        for path in &tree.generated_files {
            let dir = parent_dir(path);
            match registry.packages().find(|p| p.dir == dir) {
                Some(package) => {
                    ctx.output_mut(&package.name);
                }
                None => tracing::warn!(
                    "Leaving {}: no package sources in its directory",
                    path.display()
                ),
            }
        }

        let bindings: Vec<&Binding> = files.iter().flat_map(|f| &f.bindings).collect();
        for binding in &bindings {
            if let Err(e) = ctx.register(binding) {
                errors.push(e.at(&binding.location));
            }
        }

        let mut done = BTreeSet::new();
        for binding in &bindings {
            if let Err(e) = ctx.synthesize(binding, &mut done) {
                errors.push(e.at(&binding.location));
            }
        }

        if !errors.is_empty() {
            return Err(CodegenError::Diagnostics { errors });
        }

        let (outputs, imports) = ctx.into_outputs();
        let units: Vec<GeneratedUnit> = outputs
            .values()
            .map(|output| render_unit(output, &imports, &module))
            .collect();
        tracing::info!(
            "Rendered {} units from {} directives",
            units.len(),
            bindings.len()
        );
        Ok(units)
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("."))
}

/// Returns the key of a resolved type reference.
fn key_of(ty: Option<&TypeRef>, directive: &str) -> Result<TypeKey, CodegenError> {
    let ty = ty.ok_or_else(|| CodegenError::incomplete(directive, "missing type argument"))?;
    Ok(TypeKey::from_ref(ty, ""))
}

impl RunContext<'_> {
    /// Registers the directives other constructors depend on.
    fn register(&mut self, binding: &Binding) -> Result<(), CodegenError> {
        match &binding.kind {
            BindingKind::Build { .. } => Ok(()),
            BindingKind::Share { target, value } => {
                let key = target.as_ref().map(|t| TypeKey::from_ref(t, &binding.package));
                self.register_share(key, value.as_ref())
            }
            BindingKind::Singleton { target, value } => {
                let key = target.as_ref().map(|t| TypeKey::from_ref(t, &binding.package));
                self.register_singleton(key, value.as_ref())
            }
            BindingKind::Bind {
                capability,
                implementation,
            } => self.register_bind(
                "Bind",
                capability.as_ref(),
                implementation.as_ref(),
                None,
                &binding.location,
            ),
            BindingKind::BindEnv {
                capability,
                implementation,
                env,
            } => {
                let env = env
                    .clone()
                    .ok_or_else(|| CodegenError::incomplete("BindEnv", "missing environment tag"))?;
                self.register_bind(
                    "BindEnv",
                    capability.as_ref(),
                    implementation.as_ref(),
                    Some(env),
                    &binding.location,
                )
            }
        }
    }

    fn register_bind(
        &mut self,
        directive: &str,
        capability: Option<&TypeRef>,
        implementation: Option<&BindTarget>,
        env: Option<String>,
        location: &Location,
    ) -> Result<(), CodegenError> {
        let capability = key_of(capability, directive)?;
        let implementation = match implementation {
            Some(BindTarget::Single(ty)) => {
                Implementation::Single(TypeKey::from_ref(ty, &capability.package))
            }
            Some(BindTarget::Keyed(entries)) => {
                let mut keyed: Vec<(String, TypeKey)> = entries
                    .iter()
                    .map(|(key, ty)| (key.clone(), TypeKey::from_ref(ty, &capability.package)))
                    .collect();
                keyed.sort();
                Implementation::Keyed(keyed)
            }
            None => return Err(CodegenError::incomplete(directive, "missing implementation")),
        };
        self.capabilities
            .register(capability, implementation, env, location)
    }

    /// Synthesizes the constructor a directive asks for.
    ///
    /// `done` holds the subjects already handled so that repeated `Build`
    /// directives and alternative bindings of one capability generate a
    /// single function.
    fn synthesize(
        &mut self,
        binding: &Binding,
        done: &mut BTreeSet<TypeKey>,
    ) -> Result<(), CodegenError> {
        match &binding.kind {
            BindingKind::Build { target } => {
                let key = key_of(target.as_ref(), "Build")?;
                if !done.insert(key.clone()) {
                    tracing::warn!("{} is built more than once", key);
                    return Ok(());
                }
                let name = format!("New{}", key.name);
                if self.generated(&key.package, &name).is_some() {
                    return Ok(());
                }
                let func = self.generate_record(&key)?;
                self.output_mut(&key.package).functions.insert(name, func);
                Ok(())
            }
            BindingKind::Bind { capability, .. } | BindingKind::BindEnv { capability, .. } => {
                let Some(capability) = capability else {
                    return Ok(());
                };
                let key = TypeKey::from_ref(capability, &binding.package);
                if self.binding_for(&key).is_none() || !done.insert(key.clone()) {
                    return Ok(());
                }
                let func = self.generate_capability(&key)?;
                self.output_mut(&key.package)
                    .functions
                    .insert(func.name.clone(), func);
                Ok(())
            }
            BindingKind::Share { .. } | BindingKind::Singleton { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("go.mod"), "module example.com/shop\n\ngo 1.22\n")
            .expect("Failed to write go.mod");
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().expect("parent")).expect("Failed to create dir");
            fs::write(path, content).expect("Failed to write source");
        }
        dir
    }

    fn unit<'a>(units: &'a [GeneratedUnit], package: &str) -> &'a str {
        &units
            .iter()
            .find(|u| u.package == package)
            .expect("unit for package")
            .content
    }

    #[test]
    fn test_generate_capability_binding() {
        let dir = tree(&[
            (
                "writer.go",
                r#"package shop

type Writer interface {
	Write(p []byte) (int, error)
}

type FileWriter struct {
	path string
}

func (w *FileWriter) Write(p []byte) (int, error) { return len(p), nil }

type Logger struct {
	Out Writer
}
"#,
            ),
            (
                "di.go",
                r#"package shop

import "example.com/shop/di"

func init() {
	di.Bind(Writer{}, FileWriter{})
	di.Build(Logger{})
}
"#,
            ),
        ]);

        let units = Generator::new(dir.path())
            .generate()
            .expect("Failed to generate");
        let content = unit(&units, "shop");
        assert!(content.contains(
            "func NewLogger(path string) (logger *Logger) {\n\
             \tfileWriter := FileWriter{\n\
             \t\tpath: path,\n\
             \t}\n\
             \tlogger = &Logger{\n\
             \t\tOut: &fileWriter,\n\
             \t}\n\
             \treturn\n\
             }\n"
        ));
        assert!(content.contains(
            "func NewWriter(path string) (writer Writer) {\n\
             \twriter = &FileWriter{\n\
             \t\tpath: path,\n\
             \t}\n\
             \treturn\n\
             }\n"
        ));
        assert!(content.find("func NewLogger") < content.find("func NewWriter"));
    }

    #[test]
    fn test_generate_collects_every_failure() {
        let dir = tree(&[
            (
                "types.go",
                r#"package shop

type Notifier interface {
	Notify(msg string) error
}

type Service struct {
	N Notifier
}

type Cache struct{}

func NewCache(size int) *Cache { return nil }
"#,
            ),
            (
                "di.go",
                r#"package shop

import "example.com/shop/di"

func init() {
	di.Build(Service{})
	di.Singleton(Cache{}, NewCache)
	di.Provide(Cache{})
}
"#,
            ),
        ]);

        let err = Generator::new(dir.path())
            .generate()
            .expect_err("generation must fail");
        let CodegenError::Diagnostics { errors } = err else {
            panic!("expected diagnostics");
        };
        let roots: Vec<&CodegenError> = errors.iter().map(CodegenError::root).collect();
        assert_eq!(roots.len(), 3);
        assert!(matches!(roots[0], CodegenError::UnknownDirective { kind } if kind == "Provide"));
        assert!(matches!(roots[1], CodegenError::InvalidSingleton { .. }));
        assert!(matches!(roots[2], CodegenError::MissingBinding { .. }));
    }

    #[test]
    fn test_generated_file_without_directives_is_emptied() {
        let dir = tree(&[
            ("shop.go", "package shop\n\ntype Db struct{}\n"),
            ("di_gen.go", "package shop\n\nfunc NewDb() *Db { return nil }\n"),
        ]);
        let units = Generator::new(dir.path())
            .with_module("example.com/shop")
            .generate()
            .expect("Failed to generate");
        assert_eq!(units.len(), 1);
        assert!(units[0].is_empty());
    }
}
