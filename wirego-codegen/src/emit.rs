//! Unit rendering and the write policy.
//!
//! Every package with generated declarations becomes one `di_generated.go`
//! unit. A unit is rewritten only when its rendered content differs from
//! the file on disk, and a unit holding nothing but the header is never
//! written.

use crate::context::{ImportBook, PackageOutput};
use crate::error::CodegenError;
use crate::go::ast::{Expr, FuncDecl, GoType, Stmt, VarSpec};
use crate::go::printer::Printer;
use crate::singleton::singleton_decls;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use wirego_schema::{GENERATED_FILE, LEGACY_GENERATED_FILE, TypeExpr};
use wirego_schema::types::last_segment;

/// Header opening every generated unit.
pub const HEADER: &str = "// Code generated by wirego. DO NOT EDIT.\n\
                          // Run wirego from the module root to regenerate.\n";

/// Rendered output of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Package name.
    pub package: String,
    /// Package directory.
    pub dir: PathBuf,
    /// Rendered Go source.
    pub content: String,
}

impl GeneratedUnit {
    /// Returns the path the unit is written to.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(GENERATED_FILE)
    }

    /// Returns `true` if the unit holds only the header and package clause.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content == baseline(&self.package)
    }
}

/// Result of writing one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file on disk already had the rendered content.
    Unchanged,
    /// The unit was written.
    Written,
    /// Stale units were deleted and nothing replaced them.
    Removed,
    /// The unit was empty and there was nothing to delete.
    Skipped,
}

/// Returns the header-only content of a unit.
#[must_use]
pub fn baseline(package: &str) -> String {
    format!("{HEADER}\npackage {package}\n")
}

/// Renders the unit of one package.
///
/// # Arguments
/// * `output` - Declarations generated for the package
/// * `imports` - Import paths by qualifier
/// * `module` - Module path, used to group imports
#[must_use]
pub fn render_unit(output: &PackageOutput, imports: &ImportBook, module: &str) -> GeneratedUnit {
    let singleton = (!output.singletons.is_empty()).then(|| singleton_decls(&output.singletons));

    let mut used = Qualifiers::default();
    for spec in &output.shared_vars {
        used.var_spec(spec);
    }
    if let Some((func, binding)) = &singleton {
        used.func(func);
        used.var_spec(binding);
    }
    for func in output.functions.values() {
        used.func(func);
    }
    used.names.remove(&output.name);

    let mut sections = vec![baseline(&output.name)];
    if let Some(block) = import_block(&used.names, imports, module) {
        sections.push(block);
    }
    if !output.shared_vars.is_empty() {
        let mut printer = Printer::new(&output.name);
        printer.var_block(&output.shared_vars);
        sections.push(printer.finish());
    }
    if let Some((func, binding)) = &singleton {
        let mut printer = Printer::new(&output.name);
        printer.func(func);
        sections.push(printer.finish());
        let mut printer = Printer::new(&output.name);
        printer.var_line(binding);
        sections.push(printer.finish());
    }
    for func in output.functions.values() {
        let mut printer = Printer::new(&output.name);
        printer.func(func);
        sections.push(printer.finish());
    }

    GeneratedUnit {
        package: output.name.clone(),
        dir: output.dir.clone(),
        content: sections.join("\n"),
    }
}

/// Builds the import declaration, standard library first.
fn import_block(used: &BTreeSet<String>, imports: &ImportBook, module: &str) -> Option<String> {
    let mut std_group = Vec::new();
    let mut module_group = Vec::new();
    for qualifier in used {
        let Some(path) = imports.path(qualifier) else {
            tracing::warn!("No import path known for qualifier {}", qualifier);
            continue;
        };
        let spec = if last_segment(path) == qualifier {
            format!("\"{path}\"")
        } else {
            format!("{qualifier} \"{path}\"")
        };
        if is_std(path, module) {
            std_group.push((path.to_string(), spec));
        } else {
            module_group.push((path.to_string(), spec));
        }
    }
    std_group.sort();
    module_group.sort();

    match (std_group.as_slice(), module_group.as_slice()) {
        ([], []) => None,
        ([(_, only)], []) | ([], [(_, only)]) => Some(format!("import {only}\n")),
        _ => {
            let mut text = String::from("import (\n");
            for (_, spec) in &std_group {
                text.push_str(&format!("\t{spec}\n"));
            }
            if !std_group.is_empty() && !module_group.is_empty() {
                text.push('\n');
            }
            for (_, spec) in &module_group {
                text.push_str(&format!("\t{spec}\n"));
            }
            text.push_str(")\n");
            Some(text)
        }
    }
}

/// Standard library paths have no dot in their first element.
fn is_std(path: &str, module: &str) -> bool {
    let first = path.split('/').next().unwrap_or(path);
    !first.contains('.') && path != module && !path.starts_with(&format!("{module}/"))
}

/// Package qualifiers referenced by declarations.
#[derive(Default)]
struct Qualifiers {
    names: BTreeSet<String>,
}

impl Qualifiers {
    fn ty(&mut self, ty: &TypeExpr) {
        let mut found = Vec::new();
        ty.collect_qualifiers(&mut found);
        self.names.extend(found.into_iter().map(str::to_string));
    }

    fn go_type(&mut self, ty: &GoType) {
        match ty {
            GoType::Type(ty) => self.ty(ty),
            GoType::Func(results) => results.iter().for_each(|t| self.ty(t)),
        }
    }

    fn func(&mut self, func: &FuncDecl) {
        for field in func.params.iter().chain(&func.results) {
            self.go_type(&field.ty);
        }
        self.stmts(&func.body);
    }

    fn var_spec(&mut self, spec: &VarSpec) {
        self.expr(&spec.value);
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Define { value, .. } | Stmt::Assign { value, .. } => self.expr(value),
                Stmt::Var { ty, .. } => self.go_type(ty),
                Stmt::Expr(expr) => self.expr(expr),
                Stmt::Switch { cases, .. } => {
                    for case in cases {
                        self.stmts(&case.body);
                    }
                }
                Stmt::ReturnOnErr { .. } | Stmt::Return(_) => {}
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(_) | Expr::Raw(_) => {}
            Expr::Call { package, .. } => {
                if let Some(package) = package {
                    self.names.insert(package.clone());
                }
            }
            Expr::Composite { ty, fields } => {
                self.ty(ty);
                for (_, value) in fields {
                    self.expr(value);
                }
            }
            Expr::AddrOf(inner) | Expr::Deref(inner) => self.expr(inner),
            Expr::FuncLit { results, body } => {
                results.iter().for_each(|t| self.ty(t));
                self.stmts(body);
            }
            Expr::MethodCall { args, .. } => args.iter().for_each(|a| self.expr(a)),
        }
    }
}

/// Writes a unit according to the write policy.
///
/// Stale units (`di_gen.go` and `di_generated.go`) are removed before the new
/// content is written. A legacy `di_gen.go` is removed even when the current
/// unit is up to date. With `dry_run` the outcome is reported without
/// touching the filesystem.
///
/// # Errors
/// Returns `CodegenError::Io` if a file cannot be removed or written.
pub fn write_unit(unit: &GeneratedUnit, dry_run: bool) -> Result<WriteOutcome, CodegenError> {
    let target = unit.path();
    if fs::read_to_string(&target).is_ok_and(|existing| existing == unit.content) {
        let legacy = unit.dir.join(LEGACY_GENERATED_FILE);
        if !dry_run && legacy.is_file() {
            fs::remove_file(&legacy)?;
            tracing::info!("Removed {}", legacy.display());
        }
        tracing::debug!("{} is up to date", target.display());
        return Ok(WriteOutcome::Unchanged);
    }

    let stale: Vec<PathBuf> = [GENERATED_FILE, LEGACY_GENERATED_FILE]
        .iter()
        .map(|name| unit.dir.join(name))
        .filter(|path| path.is_file())
        .collect();
    if !dry_run {
        for path in &stale {
            fs::remove_file(path)?;
            tracing::info!("Removed {}", path.display());
        }
    }

    if unit.is_empty() {
        return Ok(if stale.is_empty() {
            WriteOutcome::Skipped
        } else {
            WriteOutcome::Removed
        });
    }
    if !dry_run {
        fs::write(&target, &unit.content)?;
        tracing::info!("Wrote {}", target.display());
    }
    Ok(WriteOutcome::Written)
}
