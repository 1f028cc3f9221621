//! Symbol registry.
//!
//! The registry merges the declarations of every ordinary Go file into one
//! entry per package and answers the lookups the constructor synthesizer
//! needs: record types, capability types, free functions and methods by
//! receiver.

use crate::types::{CapabilityType, Import, Method, RecordType, SourceFile, TypeExpr};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Declarations of one Go package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Declared package name.
    pub name: String,
    /// Source directory.
    pub dir: PathBuf,
    /// Import path (module path plus the directory relative to the root).
    pub import_path: String,
    /// Struct types by name.
    pub records: BTreeMap<String, RecordType>,
    /// Interface types by name.
    pub capabilities: BTreeMap<String, CapabilityType>,
    /// Free functions by name.
    pub functions: BTreeMap<String, Method>,
    /// Methods with a receiver, in source order.
    pub methods: Vec<Method>,
    /// Imports merged from every file of the package.
    pub imports: Vec<Import>,
    /// Package-level variable types by name.
    pub variables: BTreeMap<String, TypeExpr>,
}

impl Package {
    /// Creates an empty package.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: PathBuf, import_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir,
            import_path: import_path.into(),
            ..Self::default()
        }
    }

    /// Merges a parsed file into the package.
    pub fn merge(&mut self, file: SourceFile) {
        for import in file.imports {
            if !self.imports.contains(&import) {
                self.imports.push(import);
            }
        }
        for record in file.records {
            self.records.insert(record.name.clone(), record);
        }
        for capability in file.capabilities {
            self.capabilities
                .insert(capability.name.clone(), capability);
        }
        for method in file.methods {
            if method.is_free() {
                self.functions.insert(method.name.clone(), method);
            } else {
                self.methods.push(method);
            }
        }
        for variable in file.variables {
            self.variables.insert(variable.name, variable.ty);
        }
    }

    /// Returns the import declared under `alias` in any file of the package.
    #[must_use]
    pub fn import_named(&self, alias: &str) -> Option<&Import> {
        self.imports.iter().find(|import| import.name() == alias)
    }
}

/// Kind of a named user type.
#[derive(Debug, Clone, Copy)]
pub enum Symbol<'a> {
    /// Struct type.
    Record(&'a RecordType),
    /// Interface type.
    Capability(&'a CapabilityType),
}

/// Declarations of every package in the source tree.
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    module: String,
    root: PathBuf,
    packages: BTreeMap<String, Package>,
}

impl SymbolRegistry {
    /// Creates an empty registry for a module rooted at `root`.
    #[must_use]
    pub fn new(module: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            root: root.into(),
            packages: BTreeMap::new(),
        }
    }

    /// Returns the module path.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Adds a parsed ordinary file.
    ///
    /// Files with the same package name merge, even across directories.
    pub fn add_file(&mut self, file: SourceFile) {
        let dir = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
        let package = self.ensure_package(&file.package, &dir);
        package.merge(file);
    }

    /// Returns the package named `name`, creating it for `dir` if needed.
    pub fn ensure_package(&mut self, name: &str, dir: &Path) -> &mut Package {
        let import_path = self.import_path_for(dir);
        let package = self
            .packages
            .entry(name.to_string())
            .or_insert_with(|| Package::new(name, dir.to_path_buf(), import_path));
        if package.dir != dir {
            tracing::warn!(
                "Package '{}' declared in both {} and {}, merging",
                name,
                package.dir.display(),
                dir.display()
            );
        }
        package
    }

    /// Computes the import path of a directory below the root.
    #[must_use]
    pub fn import_path_for(&self, dir: &Path) -> String {
        let relative = dir.strip_prefix(&self.root).unwrap_or(dir);
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            self.module.clone()
        } else {
            format!("{}/{}", self.module, segments.join("/"))
        }
    }

    /// Gets a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Iterates packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Finds the package with the given import path.
    #[must_use]
    pub fn package_by_import_path(&self, import_path: &str) -> Option<&Package> {
        let import_path = import_path.trim_end_matches('/');
        self.packages
            .values()
            .find(|p| p.import_path == import_path)
    }

    /// Resolves a qualifier written in `imports` to a declared package name.
    ///
    /// Qualifiers that match no import, or import a package outside the
    /// source tree, are returned unchanged.
    #[must_use]
    pub fn resolve_qualifier(&self, imports: &[Import], alias: &str) -> String {
        imports
            .iter()
            .find(|import| import.name() == alias)
            .and_then(|import| self.package_by_import_path(&import.path))
            .map_or_else(|| alias.to_string(), |p| p.name.clone())
    }

    /// Resolves a qualifier used inside package `from`.
    #[must_use]
    pub fn resolve_in_package(&self, from: &str, alias: &str) -> String {
        match self.package(from) {
            Some(package) => self.resolve_qualifier(&package.imports, alias),
            None => alias.to_string(),
        }
    }

    /// Looks up a named user type.
    #[must_use]
    pub fn lookup(&self, package: &str, name: &str) -> Option<Symbol<'_>> {
        let package = self.package(package)?;
        package
            .records
            .get(name)
            .map(Symbol::Record)
            .or_else(|| package.capabilities.get(name).map(Symbol::Capability))
    }

    /// Gets a record type.
    #[must_use]
    pub fn record(&self, package: &str, name: &str) -> Option<&RecordType> {
        self.package(package)?.records.get(name)
    }

    /// Gets a capability type.
    #[must_use]
    pub fn capability(&self, package: &str, name: &str) -> Option<&CapabilityType> {
        self.package(package)?.capabilities.get(name)
    }

    /// Gets a free function.
    #[must_use]
    pub fn function(&self, package: &str, name: &str) -> Option<&Method> {
        self.package(package)?.functions.get(name)
    }

    /// Gets the type of a package-level variable.
    #[must_use]
    pub fn variable(&self, package: &str, name: &str) -> Option<&TypeExpr> {
        self.package(package)?.variables.get(name)
    }

    /// Gets a method declared on a receiver type.
    #[must_use]
    pub fn receiver_method(&self, package: &str, type_name: &str, method: &str) -> Option<&Method> {
        self.package(package)?
            .methods
            .iter()
            .find(|m| m.name == method && m.receiver_type() == Some(type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GoParser;

    fn registry(files: &[(&str, &str)]) -> SymbolRegistry {
        let mut parser = GoParser::new().expect("Failed to load grammar");
        let mut registry = SymbolRegistry::new("github.com/acme/app", "/src");
        for (path, source) in files {
            let file = parser
                .parse_source(source, Path::new(path))
                .expect("Failed to parse");
            registry.add_file(file);
        }
        registry
    }

    #[test]
    fn test_merge_files_of_one_package() {
        let registry = registry(&[
            ("/src/models.go", "package app\n\ntype Db struct {\n\tdsn string\n}\n"),
            (
                "/src/writer.go",
                "package app\n\ntype Writer interface {\n\twrite(s string) bool\n}\n\ntype FileWriter struct{}\n\nfunc (f FileWriter) write(s string) bool { return true }\n\nfunc NewDb() *Db { return nil }\n",
            ),
        ]);

        let app = registry.package("app").expect("package");
        assert_eq!(app.import_path, "github.com/acme/app");
        assert!(registry.record("app", "Db").is_some());
        assert!(registry.record("app", "FileWriter").is_some());
        assert!(registry.capability("app", "Writer").is_some());
        assert!(registry.function("app", "NewDb").is_some());
        assert!(registry.receiver_method("app", "FileWriter", "write").is_some());
        assert!(registry.receiver_method("app", "Db", "write").is_none());
        assert!(matches!(registry.lookup("app", "Writer"), Some(Symbol::Capability(_))));
        assert!(matches!(registry.lookup("app", "Db"), Some(Symbol::Record(_))));
        assert!(registry.lookup("app", "Missing").is_none());
    }

    #[test]
    fn test_resolve_qualifier_through_imports() {
        let registry = registry(&[
            (
                "/src/main.go",
                "package app\n\nimport st \"github.com/acme/app/internal/store\"\n\ntype Handler struct {\n\tRepo *st.Repo\n}\n",
            ),
            ("/src/internal/store/repo.go", "package store\n\ntype Repo struct{}\n"),
        ]);

        let store = registry.package("store").expect("package");
        assert_eq!(store.import_path, "github.com/acme/app/internal/store");
        assert_eq!(registry.resolve_in_package("app", "st"), "store");
        assert_eq!(registry.resolve_in_package("app", "fmt"), "fmt");
        assert_eq!(registry.resolve_in_package("nowhere", "st"), "st");
    }

    #[test]
    fn test_import_path_for_root() {
        let registry = SymbolRegistry::new("example.com/m", "/src");
        assert_eq!(registry.import_path_for(Path::new("/src")), "example.com/m");
        assert_eq!(registry.import_path_for(Path::new("/src/a/b")), "example.com/m/a/b");
    }
}
