//! Run-scoped generation state.
//!
//! A [`RunContext`] is built fresh for every run and threaded through each
//! generator. It owns the binding tables, the per-package outputs and the
//! resolution stack used for cycle detection.

use crate::capability::CapabilityBindings;
use crate::error::CodegenError;
use crate::go::ast::{FuncDecl, VarSpec};
use crate::go::naming::Names;
use crate::shared::SharedValue;
use crate::singleton::SingletonEntry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use wirego_schema::{SymbolRegistry, TypeExpr, TypeRef};

/// Package-qualified type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    /// Declaring package name.
    pub package: String,
    /// Type name.
    pub name: String,
}

impl TypeKey {
    /// Creates a key.
    #[must_use]
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Creates a key from a resolved type reference.
    #[must_use]
    pub fn from_ref(ty: &TypeRef, default_package: &str) -> Self {
        Self::new(
            ty.package.as_deref().unwrap_or(default_package),
            ty.name.clone(),
        )
    }

    /// Returns the key as a package-qualified type expression.
    #[must_use]
    pub fn type_expr(&self) -> TypeExpr {
        TypeExpr::qualified(self.package.clone(), self.name.clone())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// Import paths of every qualifier used by generated code.
#[derive(Debug, Clone, Default)]
pub struct ImportBook {
    paths: BTreeMap<String, String>,
}

impl ImportBook {
    /// Records the path imported under `qualifier`.
    pub fn note(&mut self, qualifier: impl Into<String>, path: impl Into<String>) {
        self.paths.entry(qualifier.into()).or_insert_with(|| path.into());
    }

    /// Returns the path imported under `qualifier`.
    #[must_use]
    pub fn path(&self, qualifier: &str) -> Option<&str> {
        self.paths.get(qualifier).map(String::as_str)
    }

    /// Iterates every known qualifier.
    pub fn qualifiers(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }
}

/// Generated declarations of one package.
#[derive(Debug, Clone, Default)]
pub struct PackageOutput {
    /// Package name.
    pub name: String,
    /// Directory the unit is written to.
    pub dir: PathBuf,
    /// Package-level shared variables.
    pub shared_vars: Vec<VarSpec>,
    /// Singleton registrations in directive order.
    pub singletons: Vec<SingletonEntry>,
    /// Synthesized functions by name.
    pub functions: BTreeMap<String, FuncDecl>,
}

/// State of one generation run.
pub struct RunContext<'r> {
    pub(crate) registry: &'r SymbolRegistry,
    pub(crate) env: Option<String>,
    pub(crate) capabilities: CapabilityBindings,
    pub(crate) shared: BTreeMap<TypeKey, SharedValue>,
    pub(crate) singletons: BTreeMap<TypeKey, SingletonEntry>,
    pub(crate) outputs: BTreeMap<String, PackageOutput>,
    pub(crate) imports: ImportBook,
    pub(crate) stack: Vec<TypeKey>,
}

impl<'r> RunContext<'r> {
    /// Creates an empty context over a populated registry.
    #[must_use]
    pub fn new(registry: &'r SymbolRegistry, env: Option<String>) -> Self {
        let mut imports = ImportBook::default();
        imports.note("sync", "sync");
        for package in registry.packages() {
            imports.note(package.name.clone(), package.import_path.clone());
        }
        Self {
            registry,
            env,
            capabilities: CapabilityBindings::default(),
            shared: BTreeMap::new(),
            singletons: BTreeMap::new(),
            outputs: BTreeMap::new(),
            imports,
            stack: Vec::new(),
        }
    }

    /// Returns the output of a package, creating it if needed.
    pub fn output_mut(&mut self, package: &str) -> &mut PackageOutput {
        let dir = self
            .registry
            .package(package)
            .map(|p| p.dir.clone())
            .unwrap_or_default();
        self.outputs
            .entry(package.to_string())
            .or_insert_with(|| PackageOutput {
                name: package.to_string(),
                dir,
                ..PackageOutput::default()
            })
    }

    /// Returns the generated function `name` of `package`, if any.
    #[must_use]
    pub fn generated(&self, package: &str, name: &str) -> Option<&FuncDecl> {
        self.outputs.get(package)?.functions.get(name)
    }

    /// Consumes the context, returning the per-package outputs and the
    /// import paths they need.
    #[must_use]
    pub fn into_outputs(self) -> (BTreeMap<String, PackageOutput>, ImportBook) {
        (self.outputs, self.imports)
    }

    /// Rewrites a type declared in package `declared_in` so that every user
    /// type carries the name of its declaring package.
    pub fn canonical(&mut self, ty: &TypeExpr, declared_in: &str) -> TypeExpr {
        match ty {
            TypeExpr::Named {
                package: None,
                name,
            } => {
                if ty.is_builtin() {
                    ty.clone()
                } else {
                    TypeExpr::qualified(declared_in, name.clone())
                }
            }
            TypeExpr::Named {
                package: Some(alias),
                name,
            } => {
                let package = self.registry.resolve_in_package(declared_in, alias);
                if self.registry.package(&package).is_none() {
                    let path = self
                        .registry
                        .package(declared_in)
                        .and_then(|p| p.import_named(alias))
                        .map(|import| import.path.clone());
                    if let Some(path) = path {
                        self.imports.note(package.clone(), path);
                    }
                }
                TypeExpr::qualified(package, name.clone())
            }
            TypeExpr::Pointer(inner) => TypeExpr::pointer_to(self.canonical(inner, declared_in)),
            TypeExpr::Slice(inner) => TypeExpr::Slice(Box::new(self.canonical(inner, declared_in))),
            TypeExpr::Array { length, element } => TypeExpr::Array {
                length: length.clone(),
                element: Box::new(self.canonical(element, declared_in)),
            },
            TypeExpr::Map { key, value } => TypeExpr::Map {
                key: Box::new(self.canonical(key, declared_in)),
                value: Box::new(self.canonical(value, declared_in)),
            },
            TypeExpr::Opaque(_) => ty.clone(),
        }
    }

    /// Returns the identifiers a generated function in `package` must not
    /// declare: package qualifiers and shared variables.
    pub(crate) fn reserved_names(&self, package: &str) -> Names {
        let mut names = Names::with_taken(self.imports.qualifiers());
        if let Some(output) = self.outputs.get(package) {
            for spec in &output.shared_vars {
                for name in &spec.names {
                    names.take(name.clone());
                }
            }
        }
        for (key, value) in &self.shared {
            if key.package == package {
                if let Some(name) = value.identifier() {
                    names.take(name);
                }
            }
        }
        names
    }

    /// Runs `f` with `key` pushed on the resolution stack.
    ///
    /// # Errors
    /// Returns `CodegenError::CycleDetected` if `key` is already being
    /// resolved, or whatever `f` returns.
    pub(crate) fn with_frame<T>(
        &mut self,
        key: &TypeKey,
        f: impl FnOnce(&mut Self) -> Result<T, CodegenError>,
    ) -> Result<T, CodegenError> {
        if let Some(start) = self.stack.iter().position(|k| k == key) {
            let mut path: Vec<String> = self.stack[start..].iter().map(ToString::to_string).collect();
            path.push(key.to_string());
            return Err(CodegenError::CycleDetected { path });
        }
        self.stack.push(key.clone());
        let result = f(self);
        self.stack.pop();
        result
    }
}
