//! Go output syntax.
//!
//! Only the forms the generator emits are modelled. Types are kept as
//! package-qualified [`TypeExpr`]s until printing, where the qualifier of the
//! output package is dropped.

use wirego_schema::TypeExpr;

/// Type position in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoType {
    /// Ordinary type.
    Type(TypeExpr),
    /// Function type without parameters: `func() R` or `func() (R1, R2)`.
    Func(Vec<TypeExpr>),
}

impl From<TypeExpr> for GoType {
    fn from(ty: TypeExpr) -> Self {
        Self::Type(ty)
    }
}

/// Parameter or result declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Name, absent for unnamed results.
    pub name: Option<String>,
    /// Declared type.
    pub ty: GoType,
}

impl FieldDecl {
    /// Creates a named declaration.
    #[must_use]
    pub fn named(name: impl Into<String>, ty: impl Into<GoType>) -> Self {
        Self {
            name: Some(name.into()),
            ty: ty.into(),
        }
    }

    /// Creates an unnamed declaration.
    #[must_use]
    pub fn unnamed(ty: impl Into<GoType>) -> Self {
        Self {
            name: None,
            ty: ty.into(),
        }
    }

    /// Returns the plain type, if this is not a function type.
    #[must_use]
    pub fn type_expr(&self) -> Option<&TypeExpr> {
        match &self.ty {
            GoType::Type(ty) => Some(ty),
            GoType::Func(_) => None,
        }
    }
}

/// Expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Identifier.
    Ident(String),
    /// Source text copied verbatim.
    Raw(String),
    /// Call with identifier arguments.
    Call {
        /// Package qualifier of the callee.
        package: Option<String>,
        /// Function name.
        func: String,
        /// Argument identifiers.
        args: Vec<String>,
    },
    /// Keyed composite literal.
    Composite {
        /// Literal type.
        ty: TypeExpr,
        /// Field name and value, in declaration order.
        fields: Vec<(String, Expr)>,
    },
    /// `&x`.
    AddrOf(Box<Expr>),
    /// `*x`.
    Deref(Box<Expr>),
    /// Function literal without parameters.
    FuncLit {
        /// Result types.
        results: Vec<TypeExpr>,
        /// Body.
        body: Vec<Stmt>,
    },
    /// Method call on a receiver identifier with function literal
    /// arguments, as in `once.Do(func() { ... })`.
    MethodCall {
        /// Receiver identifier.
        receiver: String,
        /// Method name.
        method: String,
        /// Arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Creates an identifier.
    #[must_use]
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    /// Takes the address of the expression.
    #[must_use]
    pub fn addr_of(self) -> Self {
        Self::AddrOf(Box::new(self))
    }

    /// Dereferences the expression.
    #[must_use]
    pub fn deref(self) -> Self {
        Self::Deref(Box::new(self))
    }
}

/// Switch case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    /// Case label, already quoted.
    pub label: String,
    /// Body.
    pub body: Vec<Stmt>,
}

/// Statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `a, b := value`.
    Define {
        /// Left-hand names.
        names: Vec<String>,
        /// Right-hand side.
        value: Expr,
    },
    /// `a, b = value`.
    Assign {
        /// Left-hand names.
        names: Vec<String>,
        /// Right-hand side.
        value: Expr,
    },
    /// `var name T`.
    Var {
        /// Variable name.
        name: String,
        /// Variable type.
        ty: GoType,
    },
    /// Expression statement.
    Expr(Expr),
    /// `if err != nil { return ... }`.
    ReturnOnErr {
        /// Explicit return values; a bare return when `None`.
        values: Option<Vec<String>>,
    },
    /// `switch tag { ... }`.
    Switch {
        /// Switch tag identifier.
        tag: String,
        /// Cases in order.
        cases: Vec<Case>,
    },
    /// `return a, b`.
    Return(Vec<String>),
}

/// Function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    /// Function name.
    pub name: String,
    /// Parameters.
    pub params: Vec<FieldDecl>,
    /// Results.
    pub results: Vec<FieldDecl>,
    /// Body.
    pub body: Vec<Stmt>,
}

impl FuncDecl {
    /// Returns true if one of the results is `error`.
    #[must_use]
    pub fn returns_error(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.type_expr().is_some_and(TypeExpr::is_error))
    }
}

/// Package-level `var` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarSpec {
    /// Declared names.
    pub names: Vec<String>,
    /// Initializer.
    pub value: Expr,
}
