//! Shared value registration.
//!
//! `Share(T{}, expr)` substitutes a precomputed value wherever `T` is
//! requested inside its package. A call expression initializes a
//! package-level variable once; anything else is substituted verbatim.

use crate::context::{RunContext, TypeKey};
use crate::error::CodegenError;
use crate::go::ast::{Expr, VarSpec};
use crate::go::naming::lower_first;
use crate::constructor::Value;
use wirego_schema::DirectiveArg;

/// Substitute registered for a shared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedValue {
    /// Expression referencing the value.
    pub expr: Expr,
    /// Whether the expression is a pointer.
    pub pointer: bool,
}

impl SharedValue {
    /// Returns the substitute as a resolved value.
    #[must_use]
    pub fn value(&self) -> Value {
        Value {
            expr: self.expr.clone(),
            pointer: self.pointer,
        }
    }

    /// Returns the identifier the substitute refers to, if it is one.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        match &self.expr {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Raw(text)
                if !text.is_empty()
                    && text.chars().all(|c| c.is_alphanumeric() || c == '_') =>
            {
                Some(text.clone())
            }
            _ => None,
        }
    }
}

impl RunContext<'_> {
    /// Registers a `Share` directive.
    ///
    /// # Errors
    /// Returns `IncompleteDirective` if an argument is missing and
    /// `DuplicateBinding` if the type is already shared.
    pub fn register_share(
        &mut self,
        key: Option<TypeKey>,
        value: Option<&DirectiveArg>,
    ) -> Result<(), CodegenError> {
        let key = key.ok_or_else(|| CodegenError::incomplete("Share", "missing target type"))?;
        let value =
            value.ok_or_else(|| CodegenError::incomplete("Share", "missing value expression"))?;
        if self.shared.contains_key(&key) {
            return Err(CodegenError::duplicate("Share", key.to_string()));
        }

        let shared = match value.call() {
            Some(call) => {
                let var = lower_first(&key.name);
                let pointer = self
                    .registry
                    .function(&key.package, &call.callee)
                    .and_then(|f| {
                        f.results
                            .iter()
                            .find(|r| r.ty.base_name() == Some(key.name.as_str()))
                    })
                    .is_some_and(|r| r.ty.is_pointer());
                let args = if call.arguments.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![call.arguments.trim().to_string()]
                };
                self.output_mut(&key.package).shared_vars.push(VarSpec {
                    names: vec![var.clone()],
                    value: Expr::Call {
                        package: None,
                        func: call.callee.clone(),
                        args,
                    },
                });
                SharedValue {
                    expr: Expr::Ident(var),
                    pointer,
                }
            }
            None => {
                let text = value.source_text();
                let pointer = match self.registry.variable(&key.package, text.trim()) {
                    Some(ty) => ty.is_pointer(),
                    None => text.starts_with('&'),
                };
                SharedValue {
                    pointer,
                    expr: Expr::Raw(text),
                }
            }
        };

        tracing::debug!("Registered shared value for {}", key);
        self.shared.insert(key, shared);
        Ok(())
    }

    /// Returns the substitute for `key` when it is visible from `package`.
    #[must_use]
    pub fn shared_in(&self, package: &str, key: &TypeKey) -> Option<&SharedValue> {
        if key.package == package {
            self.shared.get(key)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use wirego_schema::{CallSite, GoParser, SymbolRegistry};

    fn registry() -> SymbolRegistry {
        let mut parser = GoParser::new().expect("Failed to load grammar");
        let mut registry = SymbolRegistry::new("github.com/acme/app", "/src");
        registry.add_file(
            parser
                .parse_source(
                    "package app\n\ntype Db struct{}\n\nfunc OpenDb(dsn string) *Db { return nil }\n\nvar primary *Db\n",
                    Path::new("/src/db.go"),
                )
                .expect("Failed to parse"),
        );
        registry
    }

    #[test]
    fn test_share_call_declares_package_variable() {
        let registry = registry();
        let mut ctx = RunContext::new(&registry, None);
        let value = DirectiveArg::Expression {
            text: "OpenDb(\"dsn://\")".into(),
            call: Some(CallSite {
                callee: "OpenDb".into(),
                arguments: "\"dsn://\"".into(),
            }),
        };
        ctx.register_share(Some(TypeKey::new("app", "Db")), Some(&value))
            .expect("Failed to register");

        let shared = ctx.shared_in("app", &TypeKey::new("app", "Db")).expect("shared");
        assert_eq!(shared.expr, Expr::ident("db"));
        assert!(shared.pointer);

        let output = &ctx.outputs["app"];
        assert_eq!(output.shared_vars.len(), 1);
        assert_eq!(output.shared_vars[0].names, vec!["db".to_string()]);
        assert!(ctx.shared_in("other", &TypeKey::new("app", "Db")).is_none());
    }

    #[test]
    fn test_share_literal_is_substituted_verbatim() {
        let registry = registry();
        let mut ctx = RunContext::new(&registry, None);
        let value = DirectiveArg::Identifier(wirego_schema::TypeRef::new(None, "db"));
        ctx.register_share(Some(TypeKey::new("app", "Db")), Some(&value))
            .expect("Failed to register");

        let shared = ctx.shared_in("app", &TypeKey::new("app", "Db")).expect("shared");
        assert_eq!(shared.expr, Expr::Raw("db".into()));
        assert!(!shared.pointer);
        assert!(ctx.outputs.get("app").is_none_or(|o| o.shared_vars.is_empty()));
    }

    #[test]
    fn test_share_variable_takes_declared_pointer_form() {
        let registry = registry();
        let mut ctx = RunContext::new(&registry, None);
        let value = DirectiveArg::Identifier(wirego_schema::TypeRef::new(None, "primary"));
        ctx.register_share(Some(TypeKey::new("app", "Db")), Some(&value))
            .expect("Failed to register");

        let shared = ctx.shared_in("app", &TypeKey::new("app", "Db")).expect("shared");
        assert_eq!(shared.expr, Expr::Raw("primary".into()));
        assert!(shared.pointer);
    }

    #[test]
    fn test_share_rejects_duplicates_and_missing_value() {
        let registry = registry();
        let mut ctx = RunContext::new(&registry, None);
        let value = DirectiveArg::Literal("nil".into());
        let key = TypeKey::new("app", "Db");
        ctx.register_share(Some(key.clone()), Some(&value))
            .expect("Failed to register");
        assert!(matches!(
            ctx.register_share(Some(key.clone()), Some(&value)),
            Err(CodegenError::DuplicateBinding { .. })
        ));
        assert!(matches!(
            ctx.register_share(Some(key), None),
            Err(CodegenError::IncompleteDirective { .. })
        ));
    }
}
