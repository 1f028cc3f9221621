//! Capability bindings.
//!
//! `Bind` and `BindEnv` directives map a capability (interface) type to the
//! implementation injected wherever the capability is required. A
//! `BindEnv` binding is active only when the environment selector equals its
//! tag and then takes precedence over the unscoped `Bind`.

use crate::context::{RunContext, TypeKey};
use crate::error::CodegenError;
use crate::go::ast::{Case, FieldDecl, FuncDecl, Stmt};
use crate::go::naming::lower_first;
use std::collections::BTreeMap;
use wirego_schema::{Location, TypeExpr};

/// Parameter of a keyed constructor selecting the implementation.
pub const KEY_PARAM: &str = "name";

/// Resolved implementation side of a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Implementation {
    /// One implementation.
    Single(TypeKey),
    /// One implementation per discriminator key, sorted by key.
    Keyed(Vec<(String, TypeKey)>),
}

#[derive(Debug, Clone)]
struct Registered {
    implementation: Implementation,
    location: Location,
}

#[derive(Debug, Clone, Default)]
struct CapabilityEntry {
    default: Option<Registered>,
    scoped: Vec<(String, Registered)>,
}

/// Capability bindings of a run.
#[derive(Debug, Clone, Default)]
pub struct CapabilityBindings {
    entries: BTreeMap<TypeKey, CapabilityEntry>,
}

impl CapabilityBindings {
    /// Registers a binding, scoped to `env` when given.
    ///
    /// # Errors
    /// Returns `DuplicateBinding` if the capability already has a binding for
    /// the same scope.
    pub fn register(
        &mut self,
        capability: TypeKey,
        implementation: Implementation,
        env: Option<String>,
        location: &Location,
    ) -> Result<(), CodegenError> {
        let entry = self.entries.entry(capability.clone()).or_default();
        let registered = Registered {
            implementation,
            location: location.clone(),
        };
        match env {
            None => {
                if let Some(previous) = &entry.default {
                    tracing::warn!(
                        "{} is already bound at {}",
                        capability,
                        previous.location
                    );
                    return Err(CodegenError::duplicate("Bind", capability.to_string()));
                }
                entry.default = Some(registered);
            }
            Some(env) => {
                if entry.scoped.iter().any(|(tag, _)| *tag == env) {
                    return Err(CodegenError::duplicate(
                        "BindEnv",
                        format!("{capability} ({env})"),
                    ));
                }
                entry.scoped.push((env, registered));
            }
        }
        Ok(())
    }

    /// Returns the implementation active for `env`.
    #[must_use]
    pub fn active(&self, capability: &TypeKey, env: Option<&str>) -> Option<&Implementation> {
        let entry = self.entries.get(capability)?;
        env.and_then(|env| {
            entry
                .scoped
                .iter()
                .find(|(tag, _)| tag == env)
                .map(|(_, r)| &r.implementation)
        })
        .or_else(|| entry.default.as_ref().map(|r| &r.implementation))
    }
}

impl RunContext<'_> {
    /// Returns the implementation bound to a capability in this run's
    /// environment.
    #[must_use]
    pub fn binding_for(&self, capability: &TypeKey) -> Option<&Implementation> {
        self.capabilities.active(capability, self.env.as_deref())
    }

    /// Checks that `implementation` provides the capability's first method.
    ///
    /// # Returns
    /// Whether the method has a pointer receiver, which decides if the
    /// implementation is injected by address.
    ///
    /// # Errors
    /// Returns `UnknownType` if either type is not declared and
    /// `MissingMethod` if the method is absent.
    pub fn check_satisfies(
        &self,
        capability: &TypeKey,
        implementation: &TypeKey,
    ) -> Result<bool, CodegenError> {
        let cap = self
            .registry
            .capability(&capability.package, &capability.name)
            .ok_or_else(|| CodegenError::unknown_type(capability.to_string()))?;
        if self
            .registry
            .record(&implementation.package, &implementation.name)
            .is_none()
        {
            return Err(CodegenError::unknown_type(implementation.to_string()));
        }
        let Some(required) = cap.first_method() else {
            return Ok(false);
        };
        let method = self
            .registry
            .receiver_method(&implementation.package, &implementation.name, &required.name)
            .ok_or_else(|| CodegenError::MissingMethod {
                implementation: implementation.to_string(),
                capability: capability.to_string(),
                method: required.name.clone(),
            })?;
        Ok(method.has_pointer_receiver())
    }

    /// Generates `New<Capability>` for the active binding of a capability.
    ///
    /// A single implementation yields a constructor returning the
    /// capability; a keyed binding yields `New<Capability>(name string)`
    /// switching over the registered keys. An unmatched key leaves the zero
    /// value.
    ///
    /// # Errors
    /// Returns `CodegenError` if the capability or an implementation cannot
    /// be resolved.
    pub fn generate_capability(&mut self, capability: &TypeKey) -> Result<FuncDecl, CodegenError> {
        let name = format!("New{}", capability.name);
        if self.registry.function(&capability.package, &name).is_some() {
            return Err(CodegenError::DuplicateConstructor {
                package: capability.package.clone(),
                function: name,
            });
        }
        if self
            .registry
            .capability(&capability.package, &capability.name)
            .is_none()
        {
            return Err(CodegenError::unknown_type(capability.to_string()));
        }
        let implementation = self
            .binding_for(capability)
            .cloned()
            .ok_or_else(|| {
                CodegenError::incomplete("Bind", format!("no active binding for {capability}"))
            })?;

        let mut func = self.fn_builder(&capability.package);
        let result = func.claim_result(&lower_first(&capability.name));
        let result_decl = FieldDecl::named(result.clone(), capability.type_expr());

        let body = match implementation {
            Implementation::Single(target) => {
                let by_address = self.check_satisfies(capability, &target)?;
                let mut block = func.block(None);
                self.assign_implementation(&mut func, &mut block, &result, &target, by_address)?;
                let mut stmts = block.into_stmts();
                stmts.push(Stmt::Return(Vec::new()));
                stmts
            }
            Implementation::Keyed(entries) => {
                func.leading_param(KEY_PARAM, TypeExpr::named("string"));
                let mut cases = Vec::with_capacity(entries.len());
                for (key, target) in &entries {
                    let by_address = self.check_satisfies(capability, target)?;
                    let mut block = func.block(Some(vec![result.clone(), "err".to_string()]));
                    self.assign_implementation(&mut func, &mut block, &result, target, by_address)?;
                    cases.push(Case {
                        label: go_quote(key),
                        body: block.into_stmts(),
                    });
                }
                vec![
                    Stmt::Switch {
                        tag: KEY_PARAM.to_string(),
                        cases,
                    },
                    Stmt::Return(Vec::new()),
                ]
            }
        };

        tracing::debug!("Generated {} in package {}", name, capability.package);
        Ok(func.finish(name, result_decl, body))
    }
}

/// Quotes a string as a Go interpreted string literal.
fn go_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
