//! Constructor synthesis.
//!
//! Given a target type, the synthesizer produces the statements, parameters
//! and results of a function that builds a fully wired instance. Each
//! dependency is resolved in order:
//!
//! 1. a value already built in the same block is reused;
//! 2. a shared value registered in the function's package is substituted;
//! 3. an existing factory is called (`Get<T>` singleton accessor, then a
//!    declared `Get<T>`, then a declared `New<T>`);
//! 4. a record of another package is built by that package's own generated
//!    `New<T>`, whose parameters are forwarded;
//! 5. a local record is built field by field.

use crate::capability::Implementation;
use crate::context::{RunContext, TypeKey};
use crate::error::CodegenError;
use crate::go::ast::{Expr, FieldDecl, FuncDecl, Stmt};
use crate::go::naming::{Names, lower_first, title};
use std::collections::{BTreeMap, HashMap};
use wirego_schema::{Field, Param, RecordType, Symbol, TypeExpr};

/// Expression producing an instance, with its pointer form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// Expression.
    pub expr: Expr,
    /// Whether the expression is a pointer.
    pub pointer: bool,
}

impl Value {
    /// Converts the value to the requested form, inserting `&` or `*`.
    #[must_use]
    pub fn adjust(self, pointer: bool) -> Expr {
        match (self.pointer, pointer) {
            (true, false) => self.expr.deref(),
            (false, true) => self.expr.addr_of(),
            _ => self.expr,
        }
    }
}

/// Callable that already produces a type.
#[derive(Debug, Clone)]
struct Factory {
    package: String,
    name: String,
    params: Vec<(String, TypeExpr)>,
    /// The last parameter is `...T` and its slice is spread at the call.
    variadic: bool,
    results: Vec<TypeExpr>,
}

/// Function being synthesized.
pub struct FnBuilder {
    package: String,
    names: Names,
    leading: Vec<FieldDecl>,
    params: BTreeMap<String, TypeExpr>,
    returns_error: bool,
}

/// Statement block with its own locals.
pub struct Block {
    stmts: Vec<Stmt>,
    bound: HashMap<TypeKey, Value>,
    names: Names,
    err_return: Option<Vec<String>>,
}

impl Block {
    /// Returns the block's statements.
    #[must_use]
    pub fn into_stmts(self) -> Vec<Stmt> {
        self.stmts
    }
}

impl FnBuilder {
    /// Returns the package the function is generated into.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Claims the name of the primary result.
    pub fn claim_result(&mut self, base: &str) -> String {
        self.names.claim(base, &self.package)
    }

    /// Declares a parameter that precedes the sorted parameter list.
    pub fn leading_param(&mut self, name: &str, ty: TypeExpr) {
        self.names.take(name);
        self.leading.push(FieldDecl::named(name, ty));
    }

    /// Opens a block. `err_return` holds explicit values for error guards;
    /// `None` emits bare returns.
    #[must_use]
    pub fn block(&self, err_return: Option<Vec<String>>) -> Block {
        Block {
            stmts: Vec::new(),
            bound: HashMap::new(),
            names: self.names.clone(),
            err_return,
        }
    }

    /// Adds a parameter, merging with an existing one of the same name and
    /// type. A clash with a different type is resolved with the `owner`
    /// prefix, then a counter.
    fn param(&mut self, block: &mut Block, name: &str, ty: TypeExpr, owner: &str) -> String {
        let prefixed = format!("{}{}", lower_first(owner), title(name));
        let candidates = std::iter::once(name.to_string())
            .chain((!owner.is_empty()).then_some(prefixed))
            .chain((2..).map(|n| format!("{name}{n}")));
        for candidate in candidates {
            match self.params.get(&candidate) {
                Some(existing) if *existing == ty => return candidate,
                Some(_) => continue,
                None => {}
            }
            if self.names.is_taken(&candidate) || block.names.is_taken(&candidate) {
                continue;
            }
            self.names.take(candidate.clone());
            block.names.take(candidate.clone());
            self.params.insert(candidate.clone(), ty);
            return candidate;
        }
        unreachable!("candidate names are unbounded")
    }

    /// Completes the function with its primary result and body.
    #[must_use]
    pub fn finish(self, name: String, result: FieldDecl, body: Vec<Stmt>) -> FuncDecl {
        let mut params = self.leading;
        params.extend(
            self.params
                .into_iter()
                .map(|(name, ty)| FieldDecl::named(name, ty)),
        );
        let mut results = vec![result];
        if self.returns_error {
            results.push(FieldDecl::named("err", TypeExpr::named("error")));
        }
        FuncDecl {
            name,
            params,
            results,
            body,
        }
    }
}

/// Name of a factory parameter forwarded to the enclosing constructor.
fn factory_param_name(type_name: &str, param: &Param) -> String {
    let declared = param
        .name
        .clone()
        .or_else(|| param.ty.base_name().map(str::to_string))
        .unwrap_or_else(|| "arg".to_string());
    if declared.eq_ignore_ascii_case(type_name) {
        lower_first(&declared)
    } else {
        format!("{}{}", lower_first(type_name), title(&declared))
    }
}

impl RunContext<'_> {
    /// Starts a function generated into `package`.
    #[must_use]
    pub fn fn_builder(&self, package: &str) -> FnBuilder {
        FnBuilder {
            package: package.to_string(),
            names: self.reserved_names(package),
            leading: Vec::new(),
            params: BTreeMap::new(),
            returns_error: false,
        }
    }

    /// Generates `New<T>` for a record, as requested by `Build(T{})`.
    ///
    /// The result is a pointer to the record, or the plain type when the
    /// record is shared in its package.
    ///
    /// # Errors
    /// Returns `DuplicateConstructor` if the package already declares
    /// `New<T>`, `UnknownType` if `T` is not a record, or any resolution
    /// error of its fields.
    pub fn generate_record(&mut self, key: &TypeKey) -> Result<FuncDecl, CodegenError> {
        let name = format!("New{}", key.name);
        if self.registry.function(&key.package, &name).is_some() {
            return Err(CodegenError::DuplicateConstructor {
                package: key.package.clone(),
                function: name,
            });
        }
        let registry = self.registry;
        let record = registry
            .record(&key.package, &key.name)
            .ok_or_else(|| CodegenError::unknown_type(key.to_string()))?;

        let mut func = self.fn_builder(&key.package);
        let result = func.claim_result(&lower_first(&key.name));
        let mut block = func.block(None);

        let result_ty = if let Some(shared) = self.shared_in(&key.package, key) {
            let value = shared.value().adjust(false);
            block.stmts.push(Stmt::Assign {
                names: vec![result.clone()],
                value,
            });
            key.type_expr()
        } else {
            let literal = self.with_frame(key, |ctx| {
                ctx.record_literal(&mut func, &mut block, record)
            })?;
            block.stmts.push(Stmt::Assign {
                names: vec![result.clone()],
                value: literal.addr_of(),
            });
            TypeExpr::pointer_to(key.type_expr())
        };

        let mut body = block.into_stmts();
        body.push(Stmt::Return(Vec::new()));
        tracing::debug!("Generated {} in package {}", name, key.package);
        Ok(func.finish(name, FieldDecl::named(result, result_ty), body))
    }

    /// Returns the generated constructor of a record in its own package,
    /// generating it if needed.
    fn ensure_record_constructor(&mut self, key: &TypeKey) -> Result<FuncDecl, CodegenError> {
        let name = format!("New{}", key.name);
        if let Some(existing) = self.generated(&key.package, &name) {
            return Ok(existing.clone());
        }
        let func = self.generate_record(key)?;
        self.output_mut(&key.package)
            .functions
            .insert(name, func.clone());
        Ok(func)
    }

    /// Assigns an implementation to `result`, building a local record
    /// directly in place.
    ///
    /// # Errors
    /// Returns any resolution error of the implementation.
    pub fn assign_implementation(
        &mut self,
        func: &mut FnBuilder,
        block: &mut Block,
        result: &str,
        target: &TypeKey,
        by_address: bool,
    ) -> Result<(), CodegenError> {
        let in_place = target.package == func.package
            && self.shared_in(&func.package, target).is_none()
            && self.factory(target).is_none();
        let registry = self.registry;
        let value = match registry.record(&target.package, &target.name) {
            Some(record) if in_place => {
                let literal =
                    self.with_frame(target, |ctx| ctx.record_literal(func, block, record))?;
                if by_address {
                    literal.addr_of()
                } else {
                    literal
                }
            }
            _ => self.resolve(func, block, target)?.adjust(by_address),
        };
        block.stmts.push(Stmt::Assign {
            names: vec![result.to_string()],
            value,
        });
        Ok(())
    }

    /// Resolves a record dependency to a value usable in `block`.
    fn resolve(
        &mut self,
        func: &mut FnBuilder,
        block: &mut Block,
        key: &TypeKey,
    ) -> Result<Value, CodegenError> {
        if let Some(value) = block.bound.get(key) {
            return Ok(value.clone());
        }
        if let Some(shared) = self.shared_in(&func.package, key) {
            return Ok(shared.value());
        }
        if let Some(factory) = self.factory(key) {
            return Ok(self.call_factory(func, block, key, &factory));
        }

        let registry = self.registry;
        let record = registry
            .record(&key.package, &key.name)
            .ok_or_else(|| CodegenError::unknown_type(key.to_string()))?;

        if key.package != func.package {
            let constructor = self.ensure_record_constructor(key)?;
            let factory = Factory {
                package: key.package.clone(),
                name: constructor.name.clone(),
                params: constructor
                    .params
                    .iter()
                    .filter_map(|p| Some((p.name.clone()?, p.type_expr()?.clone())))
                    .collect(),
                variadic: false,
                results: constructor
                    .results
                    .iter()
                    .filter_map(|r| r.type_expr().cloned())
                    .collect(),
            };
            return Ok(self.call_factory(func, block, key, &factory));
        }

        let literal = self.with_frame(key, |ctx| ctx.record_literal(func, block, record))?;
        let local = block.names.claim(&lower_first(&key.name), &key.package);
        block.stmts.push(Stmt::Define {
            names: vec![local.clone()],
            value: literal,
        });
        let value = Value {
            expr: Expr::ident(local),
            pointer: false,
        };
        block.bound.insert(key.clone(), value.clone());
        Ok(value)
    }

    /// Finds an existing callable producing `key`.
    fn factory(&mut self, key: &TypeKey) -> Option<Factory> {
        if let Some(entry) = self.singletons.get(key) {
            return Some(Factory {
                package: key.package.clone(),
                name: entry.accessor.clone(),
                params: Vec::new(),
                variadic: false,
                results: entry.results.clone(),
            });
        }

        let registry = self.registry;
        let method = [format!("Get{}", key.name), format!("New{}", key.name)]
            .iter()
            .find_map(|name| registry.function(&key.package, name))?;
        let params = method
            .params
            .iter()
            .map(|p| {
                (
                    factory_param_name(&key.name, p),
                    self.canonical(&p.ty, &key.package),
                )
            })
            .collect();
        let results: Vec<TypeExpr> = method
            .results
            .iter()
            .map(|r| self.canonical(&r.ty, &key.package))
            .collect();
        let produces = results
            .iter()
            .any(|r| *r.pointee() == key.type_expr());
        produces.then(|| Factory {
            package: key.package.clone(),
            name: method.name.clone(),
            params,
            variadic: method.params.last().is_some_and(|p| p.variadic),
            results,
        })
    }

    /// Emits a factory call, forwarding its parameters.
    fn call_factory(
        &mut self,
        func: &mut FnBuilder,
        block: &mut Block,
        key: &TypeKey,
        factory: &Factory,
    ) -> Value {
        let local = block.names.claim(&lower_first(&key.name), &key.package);
        let mut args: Vec<String> = factory
            .params
            .iter()
            .map(|(name, ty)| func.param(block, name, ty.clone(), &key.name))
            .collect();
        if let Some(last) = args.last_mut().filter(|_| factory.variadic) {
            last.push_str("...");
        }

        let expected = key.type_expr();
        let mut pointer = false;
        let mut matched = false;
        let mut propagates = false;
        let names: Vec<String> = factory
            .results
            .iter()
            .map(|ty| {
                if !matched && *ty.pointee() == expected {
                    matched = true;
                    pointer = ty.is_pointer();
                    local.clone()
                } else if ty.is_error() {
                    propagates = true;
                    "err".to_string()
                } else {
                    "_".to_string()
                }
            })
            .collect();

        block.stmts.push(Stmt::Define {
            names,
            value: Expr::Call {
                package: Some(factory.package.clone()),
                func: factory.name.clone(),
                args,
            },
        });
        if propagates {
            func.returns_error = true;
            block.stmts.push(Stmt::ReturnOnErr {
                values: block.err_return.clone(),
            });
        }

        let value = Value {
            expr: Expr::ident(local),
            pointer,
        };
        block.bound.insert(key.clone(), value.clone());
        value
    }

    /// Builds the composite literal of a local record, resolving every field
    /// in declared order.
    fn record_literal(
        &mut self,
        func: &mut FnBuilder,
        block: &mut Block,
        record: &RecordType,
    ) -> Result<Expr, CodegenError> {
        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let ty = self.canonical(&field.ty, &record.package);
            let value = self.field_value(func, block, record, field, ty)?;
            fields.push((field.name.clone(), value));
        }
        Ok(Expr::Composite {
            ty: TypeExpr::qualified(record.package.clone(), record.name.clone()),
            fields,
        })
    }

    fn field_value(
        &mut self,
        func: &mut FnBuilder,
        block: &mut Block,
        record: &RecordType,
        field: &Field,
        ty: TypeExpr,
    ) -> Result<Expr, CodegenError> {
        let key = match ty.pointee() {
            TypeExpr::Named {
                package: Some(package),
                name,
            } if !ty.is_builtin() => TypeKey::new(package.clone(), name.clone()),
            _ => return Ok(self.passthrough(func, block, record, field, ty)),
        };

        let registry = self.registry;
        match registry.lookup(&key.package, &key.name) {
            Some(Symbol::Record(_)) => {
                let value = self.resolve(func, block, &key)?;
                Ok(value.adjust(ty.is_pointer()))
            }
            Some(Symbol::Capability(_)) => self.capability_value(func, block, record, field, &key),
            None => Ok(self.passthrough(func, block, record, field, ty)),
        }
    }

    /// Fills a capability-typed field from its active binding.
    fn capability_value(
        &mut self,
        func: &mut FnBuilder,
        block: &mut Block,
        record: &RecordType,
        field: &Field,
        capability: &TypeKey,
    ) -> Result<Expr, CodegenError> {
        if let Some(shared) = self.shared_in(&func.package, capability) {
            return Ok(shared.expr.clone());
        }
        let implementation = self.binding_for(capability).cloned().ok_or_else(|| {
            CodegenError::missing_binding(capability.to_string(), &record.name, &field.name)
        })?;
        match implementation {
            Implementation::Single(target) => {
                let by_address = self.check_satisfies(capability, &target)?;
                let value = self.resolve(func, block, &target)?;
                Ok(value.adjust(by_address))
            }
            Implementation::Keyed(_) => Err(CodegenError::KeyedBindingField {
                capability: capability.to_string(),
                record: record.name.clone(),
                field: field.name.clone(),
            }),
        }
    }

    /// Turns a field into a parameter of the enclosing function.
    fn passthrough(
        &mut self,
        func: &mut FnBuilder,
        block: &mut Block,
        record: &RecordType,
        field: &Field,
        ty: TypeExpr,
    ) -> Expr {
        let name = func.param(block, &lower_first(&field.name), ty, &record.name);
        Expr::Ident(name)
    }
}
