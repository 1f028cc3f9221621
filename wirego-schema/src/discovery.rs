//! Source tree discovery.

use crate::error::ParseError;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Name of the directive file in a package directory.
pub const DIRECTIVE_FILE: &str = "di.go";

/// Name of the generated unit.
pub const GENERATED_FILE: &str = "di_generated.go";

/// Name used for generated units by earlier releases.
pub const LEGACY_GENERATED_FILE: &str = "di_gen.go";

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &[".git", "vendor", "node_modules"];

/// Go files found below a root directory, in path order.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    /// Root directory.
    pub root: PathBuf,
    /// Directive files.
    pub directive_files: Vec<PathBuf>,
    /// Ordinary source files.
    pub source_files: Vec<PathBuf>,
    /// Generated units from a previous run.
    pub generated_files: Vec<PathBuf>,
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Scans `root` recursively for Go files.
///
/// # Errors
/// Returns `ParseError::Walk` if a directory cannot be read.
pub fn discover(root: &Path) -> Result<SourceTree, ParseError> {
    let mut tree = SourceTree {
        root: root.to_path_buf(),
        ..SourceTree::default()
    };

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.ends_with(".go") || name.ends_with("_test.go") {
            continue;
        }

        let bucket = match name {
            DIRECTIVE_FILE => &mut tree.directive_files,
            GENERATED_FILE | LEGACY_GENERATED_FILE => &mut tree.generated_files,
            _ => &mut tree.source_files,
        };
        bucket.push(entry.into_path());
    }

    tracing::debug!(
        "Discovered {} directive files and {} source files under {}",
        tree.directive_files.len(),
        tree.source_files.len(),
        root.display()
    );

    Ok(tree)
}

/// Reads the module path from `<root>/go.mod`.
///
/// # Errors
/// Returns `ParseError::Io` if the manifest cannot be read and
/// `ParseError::MissingModule` if it has no `module` line.
pub fn infer_module(root: &Path) -> Result<String, ParseError> {
    let manifest = root.join("go.mod");
    let content = std::fs::read_to_string(&manifest)?;
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("module"))
        .find(|rest| rest.starts_with(char::is_whitespace))
        .map(|rest| rest.trim().trim_matches('"').to_string())
        .filter(|module| !module.is_empty())
        .ok_or(ParseError::MissingModule { path: manifest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("Failed to create dir");
        fs::write(path, "package x\n").expect("Failed to write");
    }

    #[test]
    fn test_discover_classifies_files() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        touch(root, "di.go");
        touch(root, "main.go");
        touch(root, "main_test.go");
        touch(root, "di_generated.go");
        touch(root, "store/di_gen.go");
        touch(root, "store/repo.go");
        touch(root, "vendor/lib/lib.go");
        touch(root, ".git/hooks/x.go");
        touch(root, "node_modules/m/m.go");
        touch(root, "README.md");

        let tree = discover(root).expect("Failed to discover");
        assert_eq!(tree.directive_files, vec![root.join("di.go")]);
        assert_eq!(
            tree.source_files,
            vec![root.join("main.go"), root.join("store/repo.go")]
        );
        assert_eq!(
            tree.generated_files,
            vec![root.join("di_generated.go"), root.join("store/di_gen.go")]
        );
    }

    #[test]
    fn test_infer_module() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(
            dir.path().join("go.mod"),
            "// comment\nmodule github.com/acme/app\n\ngo 1.22\n",
        )
        .expect("Failed to write");
        assert_eq!(
            infer_module(dir.path()).expect("Failed to infer"),
            "github.com/acme/app"
        );
    }

    #[test]
    fn test_infer_module_missing_line() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("go.mod"), "go 1.22\n").expect("Failed to write");
        assert!(matches!(
            infer_module(dir.path()),
            Err(ParseError::MissingModule { .. })
        ));
    }
}
