//! Symbol definitions for parsed Go sources.
//!
//! This module contains the data structures representing the declarations
//! the generator cares about: record (struct) types, capability (interface)
//! types, free functions and methods, and the type expressions they use.

use std::fmt;
use std::path::PathBuf;

/// Names predeclared by the Go language that never resolve to a user symbol.
const BUILTIN_TYPES: &[&str] = &[
    "bool",
    "string",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "byte",
    "rune",
    "float32",
    "float64",
    "complex64",
    "complex128",
    "any",
    "error",
];

/// Go type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// Named type, optionally qualified by an import alias (`Db`, `sql.DB`).
    Named {
        /// Import alias qualifying the name.
        package: Option<String>,
        /// Type name.
        name: String,
    },
    /// Pointer to another type.
    Pointer(Box<TypeExpr>),
    /// Slice of another type.
    Slice(Box<TypeExpr>),
    /// Fixed-length array.
    Array {
        /// Length expression, kept verbatim.
        length: String,
        /// Element type.
        element: Box<TypeExpr>,
    },
    /// Map type.
    Map {
        /// Key type.
        key: Box<TypeExpr>,
        /// Value type.
        value: Box<TypeExpr>,
    },
    /// Any other type (func, chan, generic instantiation, inline struct or
    /// interface), kept as source text.
    Opaque(String),
}

impl TypeExpr {
    /// Creates an unqualified named type.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            package: None,
            name: name.into(),
        }
    }

    /// Creates a package-qualified named type.
    #[must_use]
    pub fn qualified(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named {
            package: Some(package.into()),
            name: name.into(),
        }
    }

    /// Creates a pointer to the given type.
    #[must_use]
    pub fn pointer_to(inner: TypeExpr) -> Self {
        Self::Pointer(Box::new(inner))
    }

    /// Returns true if this is a pointer type.
    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer(_))
    }

    /// Returns the type with every leading pointer removed.
    #[must_use]
    pub fn pointee(&self) -> &TypeExpr {
        match self {
            Self::Pointer(inner) => inner.pointee(),
            other => other,
        }
    }

    /// Returns the name of the named type behind any pointers.
    #[must_use]
    pub fn base_name(&self) -> Option<&str> {
        match self.pointee() {
            Self::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the import alias qualifying the named type behind any pointers.
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        match self.pointee() {
            Self::Named { package, .. } => package.as_deref(),
            _ => None,
        }
    }

    /// Returns true if the type (behind any pointers) is predeclared by Go.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        match self.pointee() {
            Self::Named {
                package: None,
                name,
            } => BUILTIN_TYPES.contains(&name.as_str()),
            Self::Opaque(text) => text.replace(' ', "") == "interface{}",
            _ => false,
        }
    }

    /// Returns true if this is the predeclared `error` type.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Named { package: None, name } if name == "error")
    }

    /// Rewrites the type as seen from package `target` when it was declared
    /// in package `owner`.
    ///
    /// Unqualified user types gain the owner's qualifier and types qualified
    /// with the target package lose it.
    #[must_use]
    pub fn requalified(&self, owner: &str, target: &str) -> TypeExpr {
        match self {
            Self::Named {
                package: None,
                name,
            } if owner != target && !self.is_builtin() => Self::qualified(owner, name.clone()),
            Self::Named {
                package: Some(package),
                name,
            } if package == target => Self::named(name.clone()),
            Self::Named { .. } | Self::Opaque(_) => self.clone(),
            Self::Pointer(inner) => Self::pointer_to(inner.requalified(owner, target)),
            Self::Slice(inner) => Self::Slice(Box::new(inner.requalified(owner, target))),
            Self::Array { length, element } => Self::Array {
                length: length.clone(),
                element: Box::new(element.requalified(owner, target)),
            },
            Self::Map { key, value } => Self::Map {
                key: Box::new(key.requalified(owner, target)),
                value: Box::new(value.requalified(owner, target)),
            },
        }
    }

    /// Collects every package qualifier used anywhere in the type.
    pub fn collect_qualifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Named {
                package: Some(package),
                ..
            } => out.push(package),
            Self::Named { .. } | Self::Opaque(_) => {}
            Self::Pointer(inner) | Self::Slice(inner) => inner.collect_qualifiers(out),
            Self::Array { element, .. } => element.collect_qualifiers(out),
            Self::Map { key, value } => {
                key.collect_qualifiers(out);
                value.collect_qualifiers(out);
            }
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named {
                package: Some(package),
                name,
            } => write!(f, "{package}.{name}"),
            Self::Named {
                package: None,
                name,
            } => f.write_str(name),
            Self::Pointer(inner) => write!(f, "*{inner}"),
            Self::Slice(inner) => write!(f, "[]{inner}"),
            Self::Array { length, element } => write!(f, "[{length}]{element}"),
            Self::Map { key, value } => write!(f, "map[{key}]{value}"),
            Self::Opaque(text) => f.write_str(text),
        }
    }
}

/// Field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name (the type name for embedded fields).
    pub name: String,
    /// Declared type.
    pub ty: TypeExpr,
    /// Struct tag, raw.
    pub tag: Option<String>,
    /// Whether the field is embedded.
    pub embedded: bool,
}

/// Struct declaration.
#[derive(Debug, Clone)]
pub struct RecordType {
    /// Type name.
    pub name: String,
    /// Declaring package.
    pub package: String,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// File the type was declared in.
    pub file: PathBuf,
}

/// Parameter or result of a function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, if declared.
    pub name: Option<String>,
    /// Parameter type. A variadic `...T` is stored as `[]T`.
    pub ty: TypeExpr,
    /// Declared as `...T`.
    pub variadic: bool,
}

impl Param {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: Option<String>, ty: TypeExpr) -> Self {
        Self {
            name,
            ty,
            variadic: false,
        }
    }

    /// Marks the parameter as variadic.
    #[must_use]
    pub fn into_variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// Method required by a capability type.
#[derive(Debug, Clone)]
pub struct MethodSig {
    /// Method name.
    pub name: String,
    /// Parameters.
    pub params: Vec<Param>,
    /// Results.
    pub results: Vec<Param>,
}

/// Interface declaration.
#[derive(Debug, Clone)]
pub struct CapabilityType {
    /// Type name.
    pub name: String,
    /// Declaring package.
    pub package: String,
    /// Required methods in declaration order.
    pub methods: Vec<MethodSig>,
}

impl CapabilityType {
    /// Returns the method used to check that an implementation satisfies the
    /// capability.
    #[must_use]
    pub fn first_method(&self) -> Option<&MethodSig> {
        self.methods.first()
    }
}

/// Method receiver.
#[derive(Debug, Clone)]
pub struct Receiver {
    /// Receiver name, if declared.
    pub name: Option<String>,
    /// Receiver type (`T` or `*T`).
    pub ty: TypeExpr,
}

/// Function or method declaration.
#[derive(Debug, Clone)]
pub struct Method {
    /// Function name.
    pub name: String,
    /// Declaring package.
    pub package: String,
    /// Declaring file.
    pub file: PathBuf,
    /// Parameters.
    pub params: Vec<Param>,
    /// Results.
    pub results: Vec<Param>,
    /// Receiver, `None` for free functions.
    pub receiver: Option<Receiver>,
}

impl Method {
    /// Returns true if this is a free function.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.receiver.is_none()
    }

    /// Returns true if the method is declared on a pointer receiver.
    #[must_use]
    pub fn has_pointer_receiver(&self) -> bool {
        self.receiver.as_ref().is_some_and(|r| r.ty.is_pointer())
    }

    /// Returns the receiver's type name.
    #[must_use]
    pub fn receiver_type(&self) -> Option<&str> {
        self.receiver.as_ref().and_then(|r| r.ty.base_name())
    }

    /// Returns true if one of the results is `error`.
    #[must_use]
    pub fn returns_error(&self) -> bool {
        self.results.iter().any(|r| r.ty.is_error())
    }
}

/// Import declared by a source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Import {
    /// Explicit alias.
    pub alias: Option<String>,
    /// Import path.
    pub path: String,
}

impl Import {
    /// Creates an import.
    #[must_use]
    pub fn new(alias: Option<String>, path: impl Into<String>) -> Self {
        Self {
            alias,
            path: path.into(),
        }
    }

    /// Returns the name the import is referenced by in the importing file.
    #[must_use]
    pub fn name(&self) -> &str {
        self.alias
            .as_deref()
            .unwrap_or_else(|| last_segment(&self.path))
    }
}

/// Returns the last `/`-separated segment of an import path.
#[must_use]
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Declarations extracted from one ordinary Go file.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    /// Package clause.
    pub package: String,
    /// File path.
    pub path: PathBuf,
    /// Imports.
    pub imports: Vec<Import>,
    /// Struct declarations.
    pub records: Vec<RecordType>,
    /// Interface declarations.
    pub capabilities: Vec<CapabilityType>,
    /// Functions and methods.
    pub methods: Vec<Method>,
    /// Package-level variables whose type is known.
    pub variables: Vec<Variable>,
    /// Whether the syntax tree contained errors.
    pub malformed: bool,
}

/// Package-level variable.
///
/// The type is the declared one, or the type of a composite literal
/// initializer (`var db = &Db{}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Variable name.
    pub name: String,
    /// Variable type.
    pub ty: TypeExpr,
}
