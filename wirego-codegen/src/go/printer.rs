//! gofmt-compatible printer for the output syntax.
//!
//! Indentation uses tabs; keyed composite literal values and grouped `var`
//! initializers are aligned with spaces, as gofmt does for single-line
//! elements.

use super::ast::{Expr, FieldDecl, FuncDecl, GoType, Stmt, VarSpec};
use wirego_schema::TypeExpr;

/// Prints declarations of one output package.
pub struct Printer<'a> {
    package: &'a str,
    out: String,
}

impl<'a> Printer<'a> {
    /// Creates a printer for declarations living in `package`.
    #[must_use]
    pub fn new(package: &'a str) -> Self {
        Self {
            package,
            out: String::new(),
        }
    }

    /// Returns the printed text.
    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }

    /// Prints a type as seen from the output package.
    #[must_use]
    pub fn type_str(&self, ty: &TypeExpr) -> String {
        ty.requalified(self.package, self.package).to_string()
    }

    fn go_type(&self, ty: &GoType) -> String {
        match ty {
            GoType::Type(ty) => self.type_str(ty),
            GoType::Func(results) => format!("func(){}", self.result_types(results)),
        }
    }

    fn result_types(&self, results: &[TypeExpr]) -> String {
        match results {
            [] => String::new(),
            [single] => format!(" {}", self.type_str(single)),
            many => {
                let list: Vec<String> = many.iter().map(|t| self.type_str(t)).collect();
                format!(" ({})", list.join(", "))
            }
        }
    }

    fn field_list(&self, fields: &[FieldDecl]) -> String {
        fields
            .iter()
            .map(|f| match &f.name {
                Some(name) => format!("{name} {}", self.go_type(&f.ty)),
                None => self.go_type(&f.ty),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn results(&self, results: &[FieldDecl]) -> String {
        match results {
            [] => String::new(),
            [single] if single.name.is_none() => format!(" {}", self.go_type(&single.ty)),
            many => format!(" ({})", self.field_list(many)),
        }
    }

    /// Prints a function declaration.
    pub fn func(&mut self, func: &FuncDecl) {
        let signature = format!(
            "func {}({}){} {{\n",
            func.name,
            self.field_list(&func.params),
            self.results(&func.results)
        );
        self.out.push_str(&signature);
        self.stmts(&func.body, 1);
        self.out.push_str("}\n");
    }

    /// Prints a grouped `var ( ... )` declaration.
    pub fn var_block(&mut self, specs: &[VarSpec]) {
        let lefts: Vec<String> = specs.iter().map(|s| s.names.join(", ")).collect();
        let width = lefts.iter().map(String::len).max().unwrap_or(0);
        let mut text = String::from("var (\n");
        for (left, spec) in lefts.iter().zip(specs) {
            text.push_str(&format!(
                "\t{left:<width$} = {}\n",
                self.expr(&spec.value, 1)
            ));
        }
        text.push_str(")\n");
        self.out.push_str(&text);
    }

    /// Prints a single-line `var a, b = value` declaration.
    pub fn var_line(&mut self, spec: &VarSpec) {
        let text = format!(
            "var {} = {}\n",
            spec.names.join(", "),
            self.expr(&spec.value, 0)
        );
        self.out.push_str(&text);
    }

    fn stmts(&mut self, stmts: &[Stmt], indent: usize) {
        for stmt in stmts {
            self.stmt(stmt, indent);
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn stmt(&mut self, stmt: &Stmt, indent: usize) {
        match stmt {
            Stmt::Define { names, value } => {
                let text = format!("{} := {}", names.join(", "), self.expr(value, indent));
                self.line(indent, &text);
            }
            Stmt::Assign { names, value } => {
                let text = format!("{} = {}", names.join(", "), self.expr(value, indent));
                self.line(indent, &text);
            }
            Stmt::Var { name, ty } => {
                let text = format!("var {name} {}", self.go_type(ty));
                self.line(indent, &text);
            }
            Stmt::Expr(expr) => {
                let text = self.expr(expr, indent);
                self.line(indent, &text);
            }
            Stmt::ReturnOnErr { values } => {
                self.line(indent, "if err != nil {");
                match values {
                    Some(values) => self.line(indent + 1, &format!("return {}", values.join(", "))),
                    None => self.line(indent + 1, "return"),
                }
                self.line(indent, "}");
            }
            Stmt::Switch { tag, cases } => {
                self.line(indent, &format!("switch {tag} {{"));
                for case in cases {
                    self.line(indent, &format!("case {}:", case.label));
                    self.stmts(&case.body, indent + 1);
                }
                self.line(indent, "}");
            }
            Stmt::Return(values) if values.is_empty() => self.line(indent, "return"),
            Stmt::Return(values) => self.line(indent, &format!("return {}", values.join(", "))),
        }
    }

    /// Prints an expression whose first line starts at `indent`.
    fn expr(&self, expr: &Expr, indent: usize) -> String {
        match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Raw(text) => text.clone(),
            Expr::Call {
                package,
                func,
                args,
            } => {
                let callee = match package {
                    Some(package) if package != self.package => format!("{package}.{func}"),
                    _ => func.clone(),
                };
                format!("{callee}({})", args.join(", "))
            }
            Expr::Composite { ty, fields } if fields.is_empty() => {
                format!("{}{{}}", self.type_str(ty))
            }
            Expr::Composite { ty, fields } => {
                let width = fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
                let mut text = format!("{}{{\n", self.type_str(ty));
                for (key, value) in fields {
                    let pad = width - key.len() + 1;
                    text.push_str(&tabs(indent + 1));
                    text.push_str(&format!(
                        "{key}:{}{},\n",
                        " ".repeat(pad),
                        self.expr(value, indent + 1)
                    ));
                }
                text.push_str(&tabs(indent));
                text.push('}');
                text
            }
            Expr::AddrOf(inner) => format!("&{}", self.expr(inner, indent)),
            Expr::Deref(inner) => format!("*{}", self.expr(inner, indent)),
            Expr::FuncLit { results, body } => {
                let mut nested = Printer::new(self.package);
                nested.stmts(body, indent + 1);
                format!(
                    "func(){} {{\n{}{}}}",
                    self.result_types(results),
                    nested.finish(),
                    tabs(indent)
                )
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                let args: Vec<String> = args.iter().map(|a| self.expr(a, indent)).collect();
                format!("{receiver}.{method}({})", args.join(", "))
            }
        }
    }
}

fn tabs(n: usize) -> String {
    "\t".repeat(n)
}
