//! Go source parser.
//!
//! This module wraps the tree-sitter Go grammar and lowers the concrete
//! syntax tree of an ordinary Go file into the declarations of
//! [`crate::types`]. Only top-level declarations are collected.

use crate::error::ParseError;
use crate::types::{
    CapabilityType, Field, Import, Method, MethodSig, Param, Receiver, RecordType, SourceFile,
    TypeExpr, Variable,
};
use std::path::Path;
use tree_sitter::{Language, Node, Parser, Tree};

/// Parser for Go source files.
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    /// Creates a parser with the Go grammar loaded.
    ///
    /// # Errors
    /// Returns `ParseError::Grammar` if the grammar is incompatible with the
    /// linked tree-sitter runtime.
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        let language: Language = tree_sitter_go::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| ParseError::grammar(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Parses source text into a syntax tree.
    ///
    /// # Errors
    /// Returns `ParseError::NoTree` if the parser gives up on the input.
    pub fn parse_tree(&mut self, source: &str, path: &Path) -> Result<Tree, ParseError> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| ParseError::NoTree {
                path: path.to_path_buf(),
            })
    }

    /// Parses an ordinary Go file from disk.
    ///
    /// # Errors
    /// Returns `ParseError` if the file cannot be read or has no package
    /// clause.
    pub fn parse_file(&mut self, path: &Path) -> Result<SourceFile, ParseError> {
        let source = read_source(path)?;
        self.parse_source(&source, path)
    }

    /// Parses ordinary Go source text into its declarations.
    ///
    /// Syntax errors do not abort parsing: tree-sitter recovers and whatever
    /// declarations survive are returned with `malformed` set.
    ///
    /// # Errors
    /// Returns `ParseError` if no tree is produced or the package clause is
    /// missing.
    pub fn parse_source(&mut self, source: &str, path: &Path) -> Result<SourceFile, ParseError> {
        let tree = self.parse_tree(source, path)?;
        let root = tree.root_node();
        let src = source.as_bytes();

        let package = package_name(root, src).ok_or_else(|| ParseError::missing_package(path))?;
        let mut file = SourceFile {
            package,
            path: path.to_path_buf(),
            imports: collect_imports(root, src),
            malformed: root.has_error(),
            ..SourceFile::default()
        };

        for node in named_children(root) {
            match node.kind() {
                "type_declaration" => collect_type_declaration(node, src, &mut file),
                "var_declaration" => collect_var_declaration(node, src, &mut file),
                "function_declaration" | "method_declaration" => {
                    if let Some(method) = lower_function(node, src, &file) {
                        file.methods.push(method);
                    }
                }
                _ => {}
            }
        }

        if file.malformed {
            tracing::warn!("Syntax errors in {}, continuing best-effort", path.display());
        }

        Ok(file)
    }
}

/// Reads a source file, replacing invalid UTF-8 sequences.
pub(crate) fn read_source(path: &Path) -> Result<String, ParseError> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(source) => Ok(source),
        Err(e) => {
            tracing::warn!("Invalid UTF-8 in {}, decoding lossily", path.display());
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Returns the text covered by a node.
pub(crate) fn text<'s>(node: Node<'_>, src: &'s [u8]) -> &'s str {
    std::str::from_utf8(&src[node.byte_range()]).unwrap_or("")
}

/// Returns the named children of a node, skipping comments.
pub(crate) fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Removes the quotes around a Go string literal.
#[must_use]
pub fn unquote(literal: &str) -> &str {
    literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| literal.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(literal)
}

/// Reads the package clause of a file.
pub(crate) fn package_name(root: Node<'_>, src: &[u8]) -> Option<String> {
    named_children(root)
        .into_iter()
        .find(|n| n.kind() == "package_clause")
        .and_then(|clause| named_children(clause).into_iter().next())
        .map(|ident| text(ident, src).to_string())
}

/// Collects the imports of a file.
pub(crate) fn collect_imports(root: Node<'_>, src: &[u8]) -> Vec<Import> {
    let mut imports = Vec::new();
    for decl in named_children(root)
        .into_iter()
        .filter(|n| n.kind() == "import_declaration")
    {
        for child in named_children(decl) {
            let specs = match child.kind() {
                "import_spec" => vec![child],
                "import_spec_list" => named_children(child),
                _ => Vec::new(),
            };
            for spec in specs.into_iter().filter(|s| s.kind() == "import_spec") {
                let Some(path) = spec.child_by_field_name("path") else {
                    continue;
                };
                let alias = spec
                    .child_by_field_name("name")
                    .map(|n| text(n, src).to_string());
                imports.push(Import::new(alias, unquote(text(path, src))));
            }
        }
    }
    imports
}

/// Lowers a type node into a type expression.
pub(crate) fn type_expr(node: Node<'_>, src: &[u8]) -> TypeExpr {
    match node.kind() {
        "type_identifier" | "identifier" => TypeExpr::named(text(node, src)),
        "qualified_type" => match (
            node.child_by_field_name("package"),
            node.child_by_field_name("name"),
        ) {
            (Some(package), Some(name)) => TypeExpr::qualified(text(package, src), text(name, src)),
            _ => TypeExpr::Opaque(text(node, src).to_string()),
        },
        "selector_expression" => match (
            node.child_by_field_name("operand"),
            node.child_by_field_name("field"),
        ) {
            (Some(operand), Some(field)) if operand.kind() == "identifier" => {
                TypeExpr::qualified(text(operand, src), text(field, src))
            }
            _ => TypeExpr::Opaque(text(node, src).to_string()),
        },
        "pointer_type" => match named_children(node).into_iter().next() {
            Some(inner) => TypeExpr::pointer_to(type_expr(inner, src)),
            None => TypeExpr::Opaque(text(node, src).to_string()),
        },
        "slice_type" => match element_of(node) {
            Some(inner) => TypeExpr::Slice(Box::new(type_expr(inner, src))),
            None => TypeExpr::Opaque(text(node, src).to_string()),
        },
        "array_type" => match (node.child_by_field_name("length"), element_of(node)) {
            (Some(length), Some(element)) => TypeExpr::Array {
                length: text(length, src).to_string(),
                element: Box::new(type_expr(element, src)),
            },
            _ => TypeExpr::Opaque(text(node, src).to_string()),
        },
        "map_type" => match (
            node.child_by_field_name("key"),
            node.child_by_field_name("value"),
        ) {
            (Some(key), Some(value)) => TypeExpr::Map {
                key: Box::new(type_expr(key, src)),
                value: Box::new(type_expr(value, src)),
            },
            _ => TypeExpr::Opaque(text(node, src).to_string()),
        },
        "parenthesized_type" => match named_children(node).into_iter().next() {
            Some(inner) => type_expr(inner, src),
            None => TypeExpr::Opaque(text(node, src).to_string()),
        },
        _ => TypeExpr::Opaque(text(node, src).to_string()),
    }
}

fn element_of(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("element")
        .or_else(|| named_children(node).into_iter().last())
}

fn collect_type_declaration(decl: Node<'_>, src: &[u8], file: &mut SourceFile) {
    for spec in named_children(decl)
        .into_iter()
        .filter(|n| n.kind() == "type_spec")
    {
        let (Some(name), Some(ty)) = (
            spec.child_by_field_name("name"),
            spec.child_by_field_name("type"),
        ) else {
            continue;
        };
        let name = text(name, src).to_string();
        match ty.kind() {
            "struct_type" => file.records.push(RecordType {
                name,
                package: file.package.clone(),
                fields: lower_fields(ty, src),
                file: file.path.clone(),
            }),
            "interface_type" => file.capabilities.push(CapabilityType {
                name,
                package: file.package.clone(),
                methods: lower_method_elems(ty, src),
            }),
            _ => {}
        }
    }
}

fn collect_var_declaration(decl: Node<'_>, src: &[u8], file: &mut SourceFile) {
    let specs = named_children(decl).into_iter().flat_map(|n| match n.kind() {
        "var_spec" => vec![n],
        "var_spec_list" => named_children(n)
            .into_iter()
            .filter(|c| c.kind() == "var_spec")
            .collect(),
        _ => Vec::new(),
    });
    for spec in specs {
        let mut cursor = spec.walk();
        let names: Vec<Node<'_>> = spec.children_by_field_name("name", &mut cursor).collect();
        let declared = spec.child_by_field_name("type").map(|ty| type_expr(ty, src));
        let values = spec
            .child_by_field_name("value")
            .map(named_children)
            .unwrap_or_default();
        for (i, name) in names.into_iter().enumerate() {
            let ty = declared
                .clone()
                .or_else(|| values.get(i).and_then(|v| literal_type(*v, src)));
            if let Some(ty) = ty {
                file.variables.push(Variable {
                    name: text(name, src).to_string(),
                    ty,
                });
            }
        }
    }
}

/// Returns the type of a composite literal or of its address.
fn literal_type(value: Node<'_>, src: &[u8]) -> Option<TypeExpr> {
    match value.kind() {
        "composite_literal" => value.child_by_field_name("type").map(|ty| type_expr(ty, src)),
        "unary_expression" => {
            let operator = value.child_by_field_name("operator")?;
            let operand = value.child_by_field_name("operand")?;
            if text(operator, src) != "&" || operand.kind() != "composite_literal" {
                return None;
            }
            literal_type(operand, src).map(TypeExpr::pointer_to)
        }
        _ => None,
    }
}

fn lower_fields(struct_type: Node<'_>, src: &[u8]) -> Vec<Field> {
    let mut fields = Vec::new();
    let Some(list) = named_children(struct_type)
        .into_iter()
        .find(|n| n.kind() == "field_declaration_list")
    else {
        return fields;
    };

    for decl in named_children(list)
        .into_iter()
        .filter(|n| n.kind() == "field_declaration")
    {
        let Some(ty_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let tag = decl
            .child_by_field_name("tag")
            .map(|t| text(t, src).to_string());
        let mut cursor = decl.walk();
        let names: Vec<String> = decl
            .children_by_field_name("name", &mut cursor)
            .map(|n| text(n, src).to_string())
            .collect();

        if names.is_empty() {
            let mut ty = type_expr(ty_node, src);
            let mut cursor = decl.walk();
            if decl.children(&mut cursor).any(|c| c.kind() == "*") {
                ty = TypeExpr::pointer_to(ty);
            }
            let name = ty.base_name().unwrap_or_default().to_string();
            fields.push(Field {
                name,
                ty,
                tag,
                embedded: true,
            });
        } else {
            let ty = type_expr(ty_node, src);
            for name in names {
                fields.push(Field {
                    name,
                    ty: ty.clone(),
                    tag: tag.clone(),
                    embedded: false,
                });
            }
        }
    }
    fields
}

fn lower_method_elems(interface_type: Node<'_>, src: &[u8]) -> Vec<MethodSig> {
    named_children(interface_type)
        .into_iter()
        .filter(|n| matches!(n.kind(), "method_elem" | "method_spec"))
        .filter_map(|elem| {
            let name = elem.child_by_field_name("name")?;
            Some(MethodSig {
                name: text(name, src).to_string(),
                params: elem
                    .child_by_field_name("parameters")
                    .map(|p| lower_params(p, src))
                    .unwrap_or_default(),
                results: elem
                    .child_by_field_name("result")
                    .map(|r| lower_results(r, src))
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn lower_function(node: Node<'_>, src: &[u8], file: &SourceFile) -> Option<Method> {
    let name = node.child_by_field_name("name")?;
    let receiver = node
        .child_by_field_name("receiver")
        .and_then(|list| lower_params(list, src).into_iter().next())
        .map(|param| Receiver {
            name: param.name,
            ty: param.ty,
        });

    Some(Method {
        name: text(name, src).to_string(),
        package: file.package.clone(),
        file: file.path.clone(),
        params: node
            .child_by_field_name("parameters")
            .map(|p| lower_params(p, src))
            .unwrap_or_default(),
        results: node
            .child_by_field_name("result")
            .map(|r| lower_results(r, src))
            .unwrap_or_default(),
        receiver,
    })
}

/// Lowers a `parameter_list` node.
fn lower_params(list: Node<'_>, src: &[u8]) -> Vec<Param> {
    let mut params = Vec::new();
    for decl in named_children(list) {
        if !matches!(
            decl.kind(),
            "parameter_declaration" | "variadic_parameter_declaration"
        ) {
            continue;
        }
        let Some(ty_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let variadic = decl.kind() == "variadic_parameter_declaration";
        let mut ty = type_expr(ty_node, src);
        if variadic {
            ty = TypeExpr::Slice(Box::new(ty));
        }
        let mut cursor = decl.walk();
        let names: Vec<String> = decl
            .children_by_field_name("name", &mut cursor)
            .map(|n| text(n, src).to_string())
            .collect();
        let declare = |name: Option<String>| {
            let param = Param::new(name, ty.clone());
            if variadic { param.into_variadic() } else { param }
        };
        if names.is_empty() {
            params.push(declare(None));
        } else {
            params.extend(names.into_iter().map(|n| declare(Some(n))));
        }
    }
    params
}

/// Lowers a function result, which is either a parameter list or a bare type.
fn lower_results(node: Node<'_>, src: &[u8]) -> Vec<Param> {
    if node.kind() == "parameter_list" {
        lower_params(node, src)
    } else {
        vec![Param::new(None, type_expr(node, src))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> SourceFile {
        let mut parser = GoParser::new().expect("Failed to load grammar");
        parser
            .parse_source(source, &PathBuf::from("app/main.go"))
            .expect("Failed to parse")
    }

    #[test]
    fn test_parse_package_and_imports() {
        let file = parse(
            r#"package app

import (
	"fmt"
	db "database/sql"
	"github.com/acme/app/store"
)

import "sync"
"#,
        );
        assert_eq!(file.package, "app");
        assert_eq!(file.imports.len(), 4);
        assert_eq!(file.imports[1].name(), "db");
        assert_eq!(file.imports[1].path, "database/sql");
        assert_eq!(file.imports[2].name(), "store");
        assert_eq!(file.imports[3].path, "sync");
        assert!(!file.malformed);
    }

    #[test]
    fn test_parse_struct_fields() {
        let file = parse(
            r#"package app

type UserRepo struct {
	Db    *Db
	Redis Redis
	a, b  int `json:"x"`
	*Logger
	store.Config
	names []string
}
"#,
        );
        assert_eq!(file.records.len(), 1);
        let record = &file.records[0];
        assert_eq!(record.name, "UserRepo");
        assert_eq!(record.package, "app");

        let names: Vec<&str> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Db", "Redis", "a", "b", "Logger", "Config", "names"]);

        assert_eq!(record.fields[0].ty.to_string(), "*Db");
        assert_eq!(record.fields[2].tag.as_deref(), Some("`json:\"x\"`"));
        assert!(record.fields[4].embedded);
        assert!(record.fields[4].ty.is_pointer());
        assert_eq!(record.fields[5].ty, TypeExpr::qualified("store", "Config"));
        assert_eq!(record.fields[6].ty.to_string(), "[]string");
    }

    #[test]
    fn test_parse_interface_methods() {
        let file = parse(
            r#"package app

type Writer interface {
	write(s string) bool
	Close() error
}
"#,
        );
        assert_eq!(file.capabilities.len(), 1);
        let writer = &file.capabilities[0];
        assert_eq!(writer.name, "Writer");
        assert_eq!(writer.methods.len(), 2);
        let first = writer.first_method().expect("first method");
        assert_eq!(first.name, "write");
        assert_eq!(first.params[0].ty.to_string(), "string");
        assert_eq!(first.results[0].ty.to_string(), "bool");
    }

    #[test]
    fn test_parse_functions_and_methods() {
        let file = parse(
            r#"package app

func NewUserRepo(dsn string, pool int) (*UserRepo, error) {
	return nil, nil
}

func NewRedis() Redis { return Redis{} }

func (u *UserService) process() {}

func (f FileWriter) write(s string) bool { return true }
"#,
        );
        assert_eq!(file.methods.len(), 4);

        let repo = &file.methods[0];
        assert!(repo.is_free());
        assert_eq!(repo.params.len(), 2);
        assert_eq!(repo.params[0].name.as_deref(), Some("dsn"));
        assert_eq!(repo.results[0].ty.to_string(), "*UserRepo");
        assert!(repo.returns_error());

        let redis = &file.methods[1];
        assert_eq!(redis.results.len(), 1);
        assert_eq!(redis.results[0].ty.to_string(), "Redis");

        let process = &file.methods[2];
        assert!(process.has_pointer_receiver());
        assert_eq!(process.receiver_type(), Some("UserService"));

        let write = &file.methods[3];
        assert!(!write.has_pointer_receiver());
        assert_eq!(write.receiver_type(), Some("FileWriter"));
    }

    #[test]
    fn test_parse_package_variables() {
        let file = parse(
            r#"package app

var primary *Db

var (
	replica    = &Db{}
	cfg        = Config{Name: "app"}
	count, max int
	started    = time.Now()
)
"#,
        );
        let vars: Vec<(String, String)> = file
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.ty.to_string()))
            .collect();
        assert_eq!(
            vars,
            vec![
                ("primary".to_string(), "*Db".to_string()),
                ("replica".to_string(), "*Db".to_string()),
                ("cfg".to_string(), "Config".to_string()),
                ("count".to_string(), "int".to_string()),
                ("max".to_string(), "int".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_grouped_params_and_variadic() {
        let file = parse(
            r#"package app

func Join(a, b string, rest ...string) string { return a }
"#,
        );
        let join = &file.methods[0];
        assert_eq!(join.params.len(), 3);
        assert_eq!(join.params[1].ty.to_string(), "string");
        assert!(!join.params[1].variadic);
        assert_eq!(join.params[2].ty.to_string(), "[]string");
        assert!(join.params[2].variadic);
    }

    #[test]
    fn test_malformed_source_is_best_effort() {
        let file = parse(
            r#"package app

type Db struct {
	dsn string
}

func broken( {
"#,
        );
        assert!(file.malformed);
        assert_eq!(file.records.len(), 1);
    }

    #[test]
    fn test_parse_file_with_invalid_utf8() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("latin1.go");
        let mut source = b"package app\n\n// caf".to_vec();
        source.push(0xE9);
        source.extend_from_slice(b"\ntype Db struct {\n\tdsn string\n}\n");
        std::fs::write(&path, source).expect("Failed to write source");

        let mut parser = GoParser::new().expect("Failed to load grammar");
        let file = parser.parse_file(&path).expect("Failed to parse");
        assert_eq!(file.package, "app");
        assert_eq!(file.records.len(), 1);
    }

    #[test]
    fn test_missing_package_clause() {
        let mut parser = GoParser::new().expect("Failed to load grammar");
        let result = parser.parse_source("type X struct{}", &PathBuf::from("x.go"));
        assert!(matches!(result, Err(ParseError::MissingPackage { .. })));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"test\""), "test");
        assert_eq!(unquote("`raw`"), "raw");
        assert_eq!(unquote("plain"), "plain");
    }
}
