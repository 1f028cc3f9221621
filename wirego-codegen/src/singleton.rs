//! Singleton accessors.
//!
//! Every `Singleton(T{}, expr)` of a package contributes one `sync.Once`
//! guarded closure to a single `diSingleton()` function. The closures are
//! bound to package-level `Get<T>` variables.

use crate::context::{RunContext, TypeKey};
use crate::error::CodegenError;
use crate::go::ast::{Expr, FieldDecl, FuncDecl, GoType, Stmt, VarSpec};
use crate::go::naming::{Names, lower_first, title};
use wirego_schema::{DirectiveArg, TypeExpr};

/// Name of the generated accessor function.
pub const SINGLETON_FN: &str = "diSingleton";

/// One memoized type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingletonEntry {
    /// Memoized type.
    pub key: TypeKey,
    /// Package-level accessor name (`Get<T>`).
    pub accessor: String,
    /// Memoized constructor.
    pub constructor: String,
    /// Constructor results, package-qualified.
    pub results: Vec<TypeExpr>,
}

impl RunContext<'_> {
    /// Registers a `Singleton` directive.
    ///
    /// The memoized constructor is the callee of the value expression when it
    /// is a call, otherwise `New<T>`.
    ///
    /// # Errors
    /// Returns `MissingConstructor` if the constructor is not declared,
    /// `InvalidSingleton` if it takes parameters and `DuplicateBinding` if the
    /// type is already registered.
    pub fn register_singleton(
        &mut self,
        key: Option<TypeKey>,
        value: Option<&DirectiveArg>,
    ) -> Result<(), CodegenError> {
        let key =
            key.ok_or_else(|| CodegenError::incomplete("Singleton", "missing target type"))?;
        if self.singletons.contains_key(&key) {
            return Err(CodegenError::duplicate("Singleton", key.to_string()));
        }

        let constructor = value
            .and_then(DirectiveArg::call)
            .map_or_else(|| format!("New{}", key.name), |call| call.callee.clone());
        let method = self
            .registry
            .function(&key.package, &constructor)
            .ok_or_else(|| CodegenError::MissingConstructor {
                type_name: key.name.clone(),
                constructor: constructor.clone(),
            })?;
        if !method.params.is_empty() {
            return Err(CodegenError::InvalidSingleton {
                type_name: key.name.clone(),
                constructor,
            });
        }

        let declared: Vec<TypeExpr> = method.results.iter().map(|r| r.ty.clone()).collect();
        let results = declared
            .iter()
            .map(|ty| self.canonical(ty, &key.package))
            .collect();
        let entry = SingletonEntry {
            accessor: format!("Get{}", key.name),
            key: key.clone(),
            constructor,
            results,
        };

        tracing::debug!("Registered singleton {} via {}", key, entry.constructor);
        self.output_mut(&key.package).singletons.push(entry.clone());
        self.singletons.insert(key, entry);
        Ok(())
    }
}

/// Builds the accessor function and the `var Get<A>, Get<B> = diSingleton()`
/// declaration for one package.
#[must_use]
pub fn singleton_decls(entries: &[SingletonEntry]) -> (FuncDecl, VarSpec) {
    let mut names = Names::with_taken([SINGLETON_FN, "sync"]);
    let mut body = Vec::new();
    let mut results = Vec::new();
    let mut getters = Vec::new();

    for entry in entries {
        let type_name = &entry.key.name;
        let once = names.claim(&format!("{}Once", lower_first(type_name)), "");
        body.push(Stmt::Var {
            name: once.clone(),
            ty: GoType::Type(TypeExpr::qualified("sync", "Once")),
        });

        let mut slots = Vec::new();
        for ty in &entry.results {
            let base = match ty.base_name() {
                Some(base) if base == type_name => lower_first(type_name),
                Some(base) => format!("{}{}", lower_first(type_name), title(base)),
                None => format!("{}Value", lower_first(type_name)),
            };
            let slot = names.claim(&base, "");
            body.push(Stmt::Var {
                name: slot.clone(),
                ty: GoType::Type(ty.clone()),
            });
            slots.push(slot);
        }

        let call = Expr::Call {
            package: None,
            func: entry.constructor.clone(),
            args: Vec::new(),
        };
        let init = if slots.is_empty() {
            Stmt::Expr(call)
        } else {
            Stmt::Assign {
                names: slots.clone(),
                value: call,
            }
        };
        let mut closure = vec![Stmt::Expr(Expr::MethodCall {
            receiver: once,
            method: "Do".to_string(),
            args: vec![Expr::FuncLit {
                results: Vec::new(),
                body: vec![init],
            }],
        })];
        if !slots.is_empty() {
            closure.push(Stmt::Return(slots));
        }

        let getter = names.claim(&lower_first(&entry.accessor), "");
        body.push(Stmt::Define {
            names: vec![getter.clone()],
            value: Expr::FuncLit {
                results: entry.results.clone(),
                body: closure,
            },
        });
        results.push(FieldDecl::unnamed(GoType::Func(entry.results.clone())));
        getters.push(getter);
    }
    body.push(Stmt::Return(getters));

    let func = FuncDecl {
        name: SINGLETON_FN.to_string(),
        params: Vec::new(),
        results,
        body,
    };
    let binding = VarSpec {
        names: entries.iter().map(|e| e.accessor.clone()).collect(),
        value: Expr::Call {
            package: None,
            func: SINGLETON_FN.to_string(),
            args: Vec::new(),
        },
    };
    (func, binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::printer::Printer;
    use std::path::Path;
    use wirego_schema::{CallSite, GoParser, SymbolRegistry};

    fn registry() -> SymbolRegistry {
        let mut parser = GoParser::new().expect("Failed to load grammar");
        let mut registry = SymbolRegistry::new("github.com/acme/app", "/src");
        registry.add_file(
            parser
                .parse_source(
                    r#"package app

type Redis struct{}

type Db struct{}

func NewRedis() *Redis { return &Redis{} }

func OpenDb() (*Db, error) { return nil, nil }

func NewCache(size int) *Redis { return nil }
"#,
                    Path::new("/src/infra.go"),
                )
                .expect("Failed to parse"),
        );
        registry
    }

    fn call(callee: &str) -> DirectiveArg {
        DirectiveArg::Expression {
            text: format!("{callee}()"),
            call: Some(CallSite {
                callee: callee.to_string(),
                arguments: String::new(),
            }),
        }
    }

    #[test]
    fn test_register_and_render_singletons() {
        let registry = registry();
        let mut ctx = RunContext::new(&registry, None);
        ctx.register_singleton(Some(TypeKey::new("app", "Redis")), None)
            .expect("Failed to register Redis");
        ctx.register_singleton(Some(TypeKey::new("app", "Db")), Some(&call("OpenDb")))
            .expect("Failed to register Db");

        let entries = &ctx.outputs["app"].singletons;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].constructor, "NewRedis");
        assert_eq!(entries[1].constructor, "OpenDb");

        let (func, binding) = singleton_decls(entries);
        let mut printer = Printer::new("app");
        printer.func(&func);
        printer.var_line(&binding);
        assert_eq!(
            printer.finish(),
            "func diSingleton() (func() *Redis, func() (*Db, error)) {\n\
             \tvar redisOnce sync.Once\n\
             \tvar redis *Redis\n\
             \tgetRedis := func() *Redis {\n\
             \t\tredisOnce.Do(func() {\n\
             \t\t\tredis = NewRedis()\n\
             \t\t})\n\
             \t\treturn redis\n\
             \t}\n\
             \tvar dbOnce sync.Once\n\
             \tvar db *Db\n\
             \tvar dbError error\n\
             \tgetDb := func() (*Db, error) {\n\
             \t\tdbOnce.Do(func() {\n\
             \t\t\tdb, dbError = OpenDb()\n\
             \t\t})\n\
             \t\treturn db, dbError\n\
             \t}\n\
             \treturn getRedis, getDb\n\
             }\n\
             var GetRedis, GetDb = diSingleton()\n"
        );
    }

    #[test]
    fn test_singleton_constructor_checks() {
        let registry = registry();
        let mut ctx = RunContext::new(&registry, None);

        assert!(matches!(
            ctx.register_singleton(Some(TypeKey::new("app", "Redis")), Some(&call("NewCache"))),
            Err(CodegenError::InvalidSingleton { .. })
        ));
        assert!(matches!(
            ctx.register_singleton(Some(TypeKey::new("app", "Db")), None),
            Err(CodegenError::MissingConstructor { .. })
        ));

        ctx.register_singleton(Some(TypeKey::new("app", "Redis")), None)
            .expect("Failed to register");
        assert!(matches!(
            ctx.register_singleton(Some(TypeKey::new("app", "Redis")), None),
            Err(CodegenError::DuplicateBinding { .. })
        ));
    }
}
