//! Go output modules.

pub mod ast;
pub mod naming;
pub mod printer;

pub use ast::{Case, Expr, FieldDecl, FuncDecl, GoType, Stmt, VarSpec};
pub use naming::{Names, lower_first, title};
pub use printer::Printer;
