//! Directive extraction.
//!
//! Directive files (`di.go`) are never compiled into the program; they hold
//! calls such as `di.Build(UserHandler{})` that describe how the object graph
//! is wired. This module recognizes those calls and turns each into a typed
//! [`Binding`].

use crate::error::ParseError;
use crate::parser::{
    GoParser, collect_imports, named_children, package_name, read_source, text, unquote,
};
use crate::types::{Import, last_segment};
use std::fmt;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// Import path segment and bare identifier naming the directive library.
pub const DI_QUALIFIER: &str = "di";

/// Reference to a named type, optionally qualified by a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Package qualifier (an import alias until resolved, then a package name).
    pub package: Option<String>,
    /// Type name.
    pub name: String,
}

impl TypeRef {
    /// Creates a type reference.
    #[must_use]
    pub fn new(package: Option<String>, name: impl Into<String>) -> Self {
        Self {
            package,
            name: name.into(),
        }
    }

    /// Parses `Name` or `pkg.Name`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((package, name)) => Self::new(Some(package.to_string()), name),
            None => Self::new(None, text),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{package}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Function call appearing as a directive argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Unqualified name of the invoked function.
    pub callee: String,
    /// Argument text between the parentheses.
    pub arguments: String,
}

/// Shape of a directive argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveArg {
    /// Basic literal, raw source text.
    Literal(String),
    /// Plain or package-qualified name.
    Identifier(TypeRef),
    /// Composite literal of a named type.
    CompositeValue {
        /// Literal type.
        ty: TypeRef,
        /// Literal source text.
        text: String,
    },
    /// Composite literal of map type holding `"key": Impl{}` pairs.
    KeyedMap(Vec<(String, TypeRef)>),
    /// Any other expression.
    Expression {
        /// Source text.
        text: String,
        /// Call details when the expression is a call.
        call: Option<CallSite>,
    },
}

impl DirectiveArg {
    /// Returns the referenced type for identifiers and composite values.
    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            Self::Identifier(ty) | Self::CompositeValue { ty, .. } => Some(ty),
            _ => None,
        }
    }

    /// Returns the unquoted value of a string literal.
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        match self {
            Self::Literal(raw) if raw.starts_with('"') || raw.starts_with('`') => {
                Some(unquote(raw))
            }
            _ => None,
        }
    }

    /// Returns the call details when the argument is a call expression.
    #[must_use]
    pub fn call(&self) -> Option<&CallSite> {
        match self {
            Self::Expression { call, .. } => call.as_ref(),
            _ => None,
        }
    }

    /// Returns the argument as Go source text.
    #[must_use]
    pub fn source_text(&self) -> String {
        match self {
            Self::Literal(raw) => raw.clone(),
            Self::Identifier(ty) => ty.to_string(),
            Self::CompositeValue { text, .. } | Self::Expression { text, .. } => text.clone(),
            Self::KeyedMap(entries) => {
                let body: Vec<String> = entries
                    .iter()
                    .map(|(key, ty)| format!("{key:?}: {ty}{{}}"))
                    .collect();
                format!("map[string]any{{{}}}", body.join(", "))
            }
        }
    }
}

/// Implementation side of a capability binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// One implementation.
    Single(TypeRef),
    /// One implementation per discriminator key.
    Keyed(Vec<(String, TypeRef)>),
}

/// Directive kind with its arguments.
///
/// Arguments whose shape was not recognized are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// `Build(T{})`.
    Build {
        /// Record to construct.
        target: Option<TypeRef>,
    },
    /// `Bind(Capability{}, Impl{})`.
    Bind {
        /// Capability type.
        capability: Option<TypeRef>,
        /// Implementation or keyed implementations.
        implementation: Option<BindTarget>,
    },
    /// `BindEnv(Capability{}, Impl{}, "tag")`.
    BindEnv {
        /// Capability type.
        capability: Option<TypeRef>,
        /// Implementation or keyed implementations.
        implementation: Option<BindTarget>,
        /// Environment tag enabling the binding.
        env: Option<String>,
    },
    /// `Share(T{}, expr)`.
    Share {
        /// Shared type.
        target: Option<TypeRef>,
        /// Value substituted for the type.
        value: Option<DirectiveArg>,
    },
    /// `Singleton(T{}, expr)`.
    Singleton {
        /// Memoized type.
        target: Option<TypeRef>,
        /// Value expression naming the memoized constructor.
        value: Option<DirectiveArg>,
    },
}

impl BindingKind {
    /// Returns the directive's name as written in source.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Build { .. } => "Build",
            Self::Bind { .. } => "Bind",
            Self::BindEnv { .. } => "BindEnv",
            Self::Share { .. } => "Share",
            Self::Singleton { .. } => "Singleton",
        }
    }

    /// Returns the first argument's type, which decides the owning package.
    #[must_use]
    pub fn subject(&self) -> Option<&TypeRef> {
        match self {
            Self::Build { target }
            | Self::Share { target, .. }
            | Self::Singleton { target, .. } => target.as_ref(),
            Self::Bind { capability, .. } | Self::BindEnv { capability, .. } => {
                capability.as_ref()
            }
        }
    }

    fn type_refs_mut(&mut self) -> Vec<&mut TypeRef> {
        let mut refs = Vec::new();
        match self {
            Self::Build { target }
            | Self::Share { target, .. }
            | Self::Singleton { target, .. } => refs.extend(target.as_mut()),
            Self::Bind {
                capability,
                implementation,
            }
            | Self::BindEnv {
                capability,
                implementation,
                ..
            } => {
                refs.extend(capability.as_mut());
                match implementation {
                    Some(BindTarget::Single(ty)) => refs.push(ty),
                    Some(BindTarget::Keyed(entries)) => {
                        refs.extend(entries.iter_mut().map(|(_, ty)| ty));
                    }
                    None => {}
                }
            }
        }
        refs
    }
}

/// Source position of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Directive file.
    pub file: PathBuf,
    /// One-based line number.
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One dependency rule declared by a directive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Package owning the binding.
    pub package: String,
    /// Where the directive was written.
    pub location: Location,
    /// Directive kind and arguments.
    pub kind: BindingKind,
}

impl Binding {
    /// Qualifies every type reference with a declared package name and
    /// recomputes the owning package.
    ///
    /// Directive files refer to other packages through import aliases;
    /// `resolve` maps an alias to the package it imports. Unqualified
    /// references belong to `file_package`.
    pub fn resolve_packages(&mut self, file_package: &str, resolve: impl Fn(&str) -> String) {
        for ty in self.kind.type_refs_mut() {
            let package = match ty.package.as_deref() {
                Some(alias) => resolve(alias),
                None => file_package.to_string(),
            };
            ty.package = Some(package);
        }
        self.package = self
            .kind
            .subject()
            .and_then(|ty| ty.package.clone())
            .unwrap_or_else(|| file_package.to_string());
    }
}

/// Call to the directive library with a kind name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCall {
    /// Kind name as written.
    pub kind: String,
    /// Where the call was written.
    pub location: Location,
}

/// Everything extracted from one directive file.
#[derive(Debug, Clone, Default)]
pub struct DirectiveFile {
    /// Package clause.
    pub package: String,
    /// File path.
    pub path: PathBuf,
    /// Imports.
    pub imports: Vec<Import>,
    /// Recognized directives in source order.
    pub bindings: Vec<Binding>,
    /// Unrecognized directive calls.
    pub unknown: Vec<UnknownCall>,
}

impl GoParser {
    /// Parses a directive file.
    ///
    /// # Arguments
    /// * `source` - File content
    /// * `path` - File path, used for locations
    ///
    /// # Returns
    /// The directives in source order.
    ///
    /// # Errors
    /// Returns `ParseError` if no tree is produced or the package clause is
    /// missing.
    pub fn parse_directives(
        &mut self,
        source: &str,
        path: &Path,
    ) -> Result<DirectiveFile, ParseError> {
        let tree = self.parse_tree(source, path)?;
        let root = tree.root_node();
        let src = source.as_bytes();

        if root.has_error() {
            tracing::warn!("Syntax errors in {}, continuing best-effort", path.display());
        }

        let package = package_name(root, src).ok_or_else(|| ParseError::missing_package(path))?;
        let imports = collect_imports(root, src);
        let qualifiers = di_qualifiers(&imports);

        let mut extractor = Extractor {
            src,
            path,
            package: &package,
            qualifiers: &qualifiers,
            bindings: Vec::new(),
            unknown: Vec::new(),
        };
        extractor.visit(root);
        let Extractor {
            bindings, unknown, ..
        } = extractor;

        tracing::debug!(
            "Extracted {} directives from {}",
            bindings.len(),
            path.display()
        );

        Ok(DirectiveFile {
            package,
            path: path.to_path_buf(),
            imports,
            bindings,
            unknown,
        })
    }

    /// Reads and parses a directive file from disk.
    ///
    /// # Errors
    /// Returns `ParseError` if the file cannot be read or parsed.
    pub fn parse_directive_file(&mut self, path: &Path) -> Result<DirectiveFile, ParseError> {
        let source = read_source(path)?;
        self.parse_directives(&source, path)
    }
}

/// Returns the identifiers that refer to the directive library in a file.
fn di_qualifiers(imports: &[Import]) -> Vec<String> {
    let mut qualifiers = vec![DI_QUALIFIER.to_string()];
    for import in imports {
        if last_segment(import.path.trim_end_matches('/')) == DI_QUALIFIER {
            qualifiers.push(import.name().to_string());
        }
    }
    qualifiers
}

struct Extractor<'a> {
    src: &'a [u8],
    path: &'a Path,
    package: &'a str,
    qualifiers: &'a [String],
    bindings: Vec<Binding>,
    unknown: Vec<UnknownCall>,
}

impl Extractor<'_> {
    fn visit(&mut self, node: Node<'_>) {
        if node.kind() == "call_expression" && self.try_directive(node) {
            return;
        }
        for child in named_children(node) {
            self.visit(child);
        }
    }

    /// Records the call if it targets the directive library.
    fn try_directive(&mut self, call: Node<'_>) -> bool {
        let Some(function) = call.child_by_field_name("function") else {
            return false;
        };
        if function.kind() != "selector_expression" {
            return false;
        }
        let (Some(operand), Some(field)) = (
            function.child_by_field_name("operand"),
            function.child_by_field_name("field"),
        ) else {
            return false;
        };
        if operand.kind() != "identifier"
            || !self.qualifiers.iter().any(|q| q == text(operand, self.src))
        {
            return false;
        }

        let location = Location {
            file: self.path.to_path_buf(),
            line: call.start_position().row + 1,
        };
        let args: Vec<DirectiveArg> = call
            .child_by_field_name("arguments")
            .map(|list| {
                named_children(list)
                    .into_iter()
                    .map(|arg| parse_arg(arg, self.src))
                    .collect()
            })
            .unwrap_or_default();

        let kind_name = text(field, self.src);
        let Some(kind) = binding_kind(kind_name, &args) else {
            self.unknown.push(UnknownCall {
                kind: kind_name.to_string(),
                location,
            });
            return true;
        };

        let package = kind
            .subject()
            .and_then(|ty| ty.package.clone())
            .unwrap_or_else(|| self.package.to_string());
        self.bindings.push(Binding {
            package,
            location,
            kind,
        });
        true
    }
}

/// Builds the binding for a directive kind name.
fn binding_kind(name: &str, args: &[DirectiveArg]) -> Option<BindingKind> {
    let target = || args.first().and_then(DirectiveArg::type_ref).cloned();
    let kind = match name {
        "Build" => BindingKind::Build { target: target() },
        "Bind" => BindingKind::Bind {
            capability: target(),
            implementation: args.get(1).and_then(bind_target),
        },
        "BindEnv" => BindingKind::BindEnv {
            capability: target(),
            implementation: args.get(1).and_then(bind_target),
            env: args
                .get(2)
                .and_then(DirectiveArg::string_value)
                .map(str::to_string),
        },
        "Share" => BindingKind::Share {
            target: target(),
            value: args.get(1).cloned(),
        },
        "Singleton" => BindingKind::Singleton {
            target: target(),
            value: args.get(1).cloned(),
        },
        _ => return None,
    };
    Some(kind)
}

fn bind_target(arg: &DirectiveArg) -> Option<BindTarget> {
    match arg {
        DirectiveArg::KeyedMap(entries) => Some(BindTarget::Keyed(entries.clone())),
        DirectiveArg::Literal(_) => arg
            .string_value()
            .map(|name| BindTarget::Single(TypeRef::parse(name))),
        other => other.type_ref().cloned().map(BindTarget::Single),
    }
}

/// Classifies one argument expression.
fn parse_arg(node: Node<'_>, src: &[u8]) -> DirectiveArg {
    let raw = text(node, src).to_string();
    match node.kind() {
        "interpreted_string_literal" | "raw_string_literal" | "int_literal"
        | "float_literal" | "imaginary_literal" | "rune_literal" | "true" | "false" | "nil" => {
            DirectiveArg::Literal(raw)
        }
        "identifier" => DirectiveArg::Identifier(TypeRef::new(None, raw)),
        "selector_expression" => match selector_ref(node, src) {
            Some(ty) => DirectiveArg::Identifier(ty),
            None => DirectiveArg::Expression {
                text: raw,
                call: None,
            },
        },
        "composite_literal" => composite_arg(node, src, raw),
        "call_expression" => {
            let call = node.child_by_field_name("function").and_then(|function| {
                let callee = match function.kind() {
                    "identifier" => text(function, src).to_string(),
                    "selector_expression" => {
                        text(function.child_by_field_name("field")?, src).to_string()
                    }
                    _ => return None,
                };
                let arguments = node
                    .child_by_field_name("arguments")
                    .map(|list| {
                        let list = text(list, src);
                        list.strip_prefix('(')
                            .and_then(|s| s.strip_suffix(')'))
                            .unwrap_or(list)
                            .to_string()
                    })
                    .unwrap_or_default();
                Some(CallSite { callee, arguments })
            });
            DirectiveArg::Expression { text: raw, call }
        }
        _ => DirectiveArg::Expression {
            text: raw,
            call: None,
        },
    }
}

fn selector_ref(node: Node<'_>, src: &[u8]) -> Option<TypeRef> {
    let operand = node.child_by_field_name("operand")?;
    let field = node.child_by_field_name("field")?;
    (operand.kind() == "identifier").then(|| {
        TypeRef::new(
            Some(text(operand, src).to_string()),
            text(field, src).to_string(),
        )
    })
}

fn composite_ref(node: Node<'_>, src: &[u8]) -> Option<TypeRef> {
    match node.kind() {
        "type_identifier" | "identifier" => Some(TypeRef::new(None, text(node, src))),
        "qualified_type" => Some(TypeRef::new(
            Some(text(node.child_by_field_name("package")?, src).to_string()),
            text(node.child_by_field_name("name")?, src),
        )),
        "selector_expression" => selector_ref(node, src),
        _ => None,
    }
}

fn composite_arg(node: Node<'_>, src: &[u8], raw: String) -> DirectiveArg {
    let Some(ty) = node.child_by_field_name("type") else {
        return DirectiveArg::Expression {
            text: raw,
            call: None,
        };
    };
    if ty.kind() == "map_type" {
        let entries = node
            .child_by_field_name("body")
            .map(|body| keyed_entries(body, src))
            .unwrap_or_default();
        return DirectiveArg::KeyedMap(entries);
    }
    match composite_ref(ty, src) {
        Some(ty) => DirectiveArg::CompositeValue { ty, text: raw },
        None => DirectiveArg::Expression {
            text: raw,
            call: None,
        },
    }
}

/// Reads `"key": Impl{}` pairs from a map literal body.
fn keyed_entries(body: Node<'_>, src: &[u8]) -> Vec<(String, TypeRef)> {
    let mut entries = Vec::new();
    for element in named_children(body)
        .into_iter()
        .filter(|n| n.kind() == "keyed_element")
    {
        let parts = named_children(element);
        let (Some(key), Some(value)) = (parts.first(), parts.last()) else {
            continue;
        };
        let key = unwrap_element(*key);
        let value = unwrap_element(*value);
        let key_text = text(key, src);
        let implementation = match parse_arg(value, src) {
            DirectiveArg::CompositeValue { ty, .. } | DirectiveArg::Identifier(ty) => ty,
            _ => {
                tracing::warn!(
                    "Ignoring keyed binding entry {} with unsupported value",
                    key_text
                );
                continue;
            }
        };
        entries.push((unquote(key_text).to_string(), implementation));
    }
    entries
}

fn unwrap_element(node: Node<'_>) -> Node<'_> {
    if node.kind() == "literal_element" {
        named_children(node).into_iter().next().unwrap_or(node)
    } else {
        node
    }
}
