//! Resolves a dotted path like `pkg.module.func` to the source of one Python
//! function inside a checked-out repository.
//!
//! Lookup never imports or executes the target code; the module file is only
//! read and parsed.

pub mod python;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::LocateError;

pub use python::PythonFunctionFinder;

/// A dotted path split into module segments and a function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPath {
    module: Vec<String>,
    function: String,
}

impl FunctionPath {
    pub fn parse(raw: &str) -> Result<Self, LocateError> {
        let invalid = |reason| LocateError::InvalidFunctionPath {
            path: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            if segment.is_empty() {
                return Err(invalid("path contains an empty segment"));
            }
            if !is_identifier(segment) {
                return Err(invalid("segments must be identifiers"));
            }
            segments.push(segment.to_string());
        }

        // split() always yields at least one item for non-empty input
        let function = segments.pop().ok_or_else(|| invalid("path is empty"))?;
        if segments.is_empty() {
            return Err(invalid("path needs a module and a function name"));
        }

        Ok(Self {
            module: segments,
            function,
        })
    }

    pub fn module_segments(&self) -> &[String] {
        &self.module
    }

    pub fn function_name(&self) -> &str {
        &self.function
    }

    /// `root/a/b.py` first, then the package form `root/a/b/__init__.py`.
    pub fn candidate_files(&self, root: &Path) -> [PathBuf; 2] {
        let mut base = root.to_path_buf();
        for segment in &self.module {
            base.push(segment);
        }
        let module_file = base.with_extension("py");
        let package_init = base.join("__init__.py");
        [module_file, package_init]
    }
}

impl FromStr for FunctionPath {
    type Err = LocateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FunctionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module.join("."), self.function)
    }
}

fn is_identifier(segment: &str) -> bool {
    segment.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// One function definition pulled out of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFunction {
    pub name: String,
    pub module_file: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    /// Normalized source: comments and blank lines dropped, dedented.
    pub source: String,
}

/// Find the module file for `path` under `root`.
///
/// Candidates are followed through symlinks, and one that lands outside the
/// canonical `root` is rejected rather than read.
pub fn resolve_module(root: &Path, path: &FunctionPath) -> Result<PathBuf, LocateError> {
    let canonical_root = root.canonicalize().map_err(|source| LocateError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let [module_file, package_init] = path.candidate_files(root);

    for candidate in [&module_file, &package_init] {
        if !candidate.is_file() {
            continue;
        }
        let resolved = candidate.canonicalize().map_err(|source| LocateError::Io {
            path: candidate.clone(),
            source,
        })?;
        if !resolved.starts_with(&canonical_root) {
            warn!(
                "Refusing {} for {}: resolves to {}",
                candidate.display(),
                path,
                resolved.display()
            );
            return Err(LocateError::OutsideRepository {
                path: candidate.clone(),
            });
        }
        debug!("Resolved {} to {}", path, candidate.display());
        return Ok(resolved);
    }

    Err(LocateError::ModuleNotFound { path: module_file })
}

/// Locate `dotted_path` inside the repository at `repository_root`.
pub fn locate(repository_root: &Path, dotted_path: &str) -> Result<ExtractedFunction, LocateError> {
    let path = FunctionPath::parse(dotted_path)?;
    let module_file = resolve_module(repository_root, &path)?;

    let bytes = fs::read(&module_file).map_err(|source| LocateError::Io {
        path: module_file.clone(),
        source,
    })?;
    let source = String::from_utf8(bytes).map_err(|e| LocateError::Parse {
        path: module_file.clone(),
        reason: format!("file is not valid UTF-8: {}", e),
    })?;

    let finder = PythonFunctionFinder::new();
    finder.find(&module_file, &source, path.function_name())
}
