use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use super::ExtractedFunction;
use crate::error::LocateError;

const FUNCTION_KIND: &str = "function_definition";
const DECORATED_KIND: &str = "decorated_definition";
const COMMENT_KIND: &str = "comment";
const STRING_KIND: &str = "string";

/// Finds function definitions in Python source with the tree-sitter grammar.
pub struct PythonFunctionFinder {
    language: Language,
}

impl Default for PythonFunctionFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonFunctionFinder {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::language(),
        }
    }

    /// Parse `source`, rejecting anything the grammar flags as an error.
    pub fn parse(&self, file: &Path, source: &str) -> Result<Tree, LocateError> {
        let parse_error = |reason: String| LocateError::Parse {
            path: file.to_path_buf(),
            reason,
        };

        let mut parser = Parser::new();
        parser
            .set_language(self.language)
            .map_err(|e| parse_error(format!("grammar error: {}", e)))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            let reason = match first_error(root) {
                Some(node) => {
                    let position = node.start_position();
                    format!(
                        "invalid syntax at line {}, column {}",
                        position.row + 1,
                        position.column + 1
                    )
                }
                None => "invalid syntax".to_string(),
            };
            return Err(parse_error(reason));
        }

        Ok(tree)
    }

    /// Return the first function named `name` in depth-first pre-order.
    pub fn find(&self, file: &Path, source: &str, name: &str) -> Result<ExtractedFunction, LocateError> {
        let tree = self.parse(file, source)?;

        let function = first_function_named(tree.root_node(), source, name).ok_or_else(|| {
            LocateError::FunctionNotFound {
                name: name.to_string(),
                path: file.to_path_buf(),
            }
        })?;

        // Decorators belong to the definition they wrap.
        let span = match function.parent() {
            Some(parent) if parent.kind() == DECORATED_KIND => parent,
            _ => function,
        };

        Ok(ExtractedFunction {
            name: name.to_string(),
            module_file: file.to_path_buf(),
            start_line: span.start_position().row + 1,
            end_line: span.end_position().row + 1,
            source: normalize_definition(span, source),
        })
    }
}

fn first_function_named<'t>(root: Node<'t>, source: &str, name: &str) -> Option<Node<'t>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == FUNCTION_KIND {
            let is_match = node
                .child_by_field_name("name")
                .and_then(|ident| ident.utf8_text(source.as_bytes()).ok())
                .map_or(false, |ident| ident == name);
            if is_match {
                return Some(node);
            }
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                stack.push(child);
            }
        }
    }
    None
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "ERROR" || node.is_missing() {
            return Some(node);
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                if child.has_error() || child.is_missing() {
                    stack.push(child);
                }
            }
        }
    }
    None
}

/// Byte ranges of comments and string literals below `node`, in source order.
fn comment_and_string_ranges(node: Node<'_>) -> (Vec<(usize, usize)>, Vec<(usize, usize)>) {
    let mut comments = Vec::new();
    let mut strings = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            COMMENT_KIND => {
                comments.push((current.start_byte(), current.end_byte()));
                continue;
            }
            STRING_KIND => {
                strings.push((current.start_byte(), current.end_byte()));
                continue;
            }
            _ => {}
        }
        for i in (0..current.child_count()).rev() {
            if let Some(child) = current.child(i) {
                stack.push(child);
            }
        }
    }
    (comments, strings)
}

/// One output line. Lines that begin inside a string literal are program
/// text and pass through untouched.
struct SourceLine {
    text: String,
    in_string: bool,
}

/// Canonical text for a definition: comments removed, trailing whitespace
/// and blank lines dropped, common indentation stripped. String literal
/// contents are never altered.
fn normalize_definition(node: Node<'_>, source: &str) -> String {
    let (start, end) = (node.start_byte(), node.end_byte());
    let (comments, strings) = comment_and_string_ranges(node);
    let inside_string = |offset: usize| strings.iter().any(|&(s, e)| s < offset && offset < e);

    let mut lines = Vec::new();
    let mut line_start = start;
    while line_start <= end {
        let line_end = source[line_start..end]
            .find('\n')
            .map_or(end, |i| line_start + i);

        // The first line starts mid-line, so restore its indentation
        // before dedenting.
        let mut text = if line_start == start {
            " ".repeat(node.start_position().column)
        } else {
            String::new()
        };
        let mut cursor = line_start;
        let mut dropped_comment = false;
        for &(comment_start, comment_end) in comments
            .iter()
            .filter(|(comment_start, _)| (line_start..line_end).contains(comment_start))
        {
            text.push_str(&source[cursor..comment_start]);
            cursor = comment_end.min(line_end);
            dropped_comment = true;
        }
        text.push_str(&source[cursor..line_end]);
        if text.ends_with('\r') {
            text.pop();
        }
        if dropped_comment || !inside_string(line_end) {
            text.truncate(text.trim_end().len());
        }

        let in_string = inside_string(line_start);
        if in_string || !text.is_empty() {
            lines.push(SourceLine { text, in_string });
        }
        line_start = line_end + 1;
    }

    let margin = lines
        .iter()
        .filter(|line| !line.in_string)
        .map(|line| line.text.len() - line.text.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut normalized = String::with_capacity(end - start);
    for line in &lines {
        let text = line.text.as_str();
        let dedented = if line.in_string {
            text
        } else if text.is_char_boundary(margin) {
            &text[margin..]
        } else {
            text.trim_start()
        };
        normalized.push_str(dedented);
        normalized.push('\n');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(source: &str, name: &str) -> Result<ExtractedFunction, LocateError> {
        PythonFunctionFinder::new().find(Path::new("module.py"), source, name)
    }

    #[test]
    fn test_finds_top_level_function() {
        let source = "import os\n\ndef greet(name):\n    return f'hi {name}'\n";
        let found = find(source, "greet").unwrap();

        assert_eq!(found.source, "def greet(name):\n    return f'hi {name}'\n");
        assert_eq!(found.start_line, 3);
        assert_eq!(found.end_line, 4);
    }

    #[test]
    fn test_first_match_in_preorder_wins() {
        let source = "\
class Service:
    def run(self):
        def run():
            return 'inner'
        return run()

def run():
    return 'top'
";
        let found = find(source, "run").unwrap();
        assert!(found.source.starts_with("def run(self):"));
        assert!(found.source.contains("'inner'"));
        assert_eq!(found.start_line, 2);
    }

    #[test]
    fn test_nested_definition_is_dedented() {
        let source = "\
def outer():
    def helper(x):
        if x:
            return 1
        return 0
    return helper
";
        let found = find(source, "helper").unwrap();
        assert_eq!(
            found.source,
            "def helper(x):\n    if x:\n        return 1\n    return 0\n"
        );
    }

    #[test]
    fn test_comments_and_blank_lines_are_dropped() {
        let source = "\
def tidy(a):  # trailing note
    # leading note
    b = a * 2

    return b
";
        let found = find(source, "tidy").unwrap();
        assert_eq!(found.source, "def tidy(a):\n    b = a * 2\n    return b\n");
    }

    #[test]
    fn test_multiline_string_contents_are_preserved() {
        let source = "class A:\n    def run(self):\n        text = \"\"\"first\n\nthird\"\"\"\n        return text\n";
        let found = find(source, "run").unwrap();
        assert_eq!(
            found.source,
            "def run(self):\n    text = \"\"\"first\n\nthird\"\"\"\n    return text\n"
        );
    }

    #[test]
    fn test_hash_and_trailing_space_inside_string_are_kept() {
        let source = "def banner():\n    return '''# not a comment   \n  indented\n'''  # real comment\n";
        let found = find(source, "banner").unwrap();
        assert_eq!(
            found.source,
            "def banner():\n    return '''# not a comment   \n  indented\n'''\n"
        );
    }

    #[test]
    fn test_decorators_are_included() {
        let source = "\
import functools

@functools.lru_cache(maxsize=None)
def fib(n):
    return n if n < 2 else fib(n - 1) + fib(n - 2)
";
        let found = find(source, "fib").unwrap();
        assert!(found.source.starts_with("@functools.lru_cache(maxsize=None)\ndef fib(n):"));
        assert_eq!(found.start_line, 3);
    }

    #[test]
    fn test_async_functions_are_found() {
        let source = "async def fetch(url):\n    return await get(url)\n";
        let found = find(source, "fetch").unwrap();
        assert!(found.source.contains("async def fetch(url):"));
    }

    #[test]
    fn test_name_must_match_exactly() {
        let source = "def handler_v2():\n    pass\n";
        let err = find(source, "handler").unwrap_err();
        assert!(matches!(err, LocateError::FunctionNotFound { .. }));
    }

    #[test]
    fn test_invalid_syntax_reports_position() {
        let source = "def ok():\n    pass\n\ndef broken(:\n    pass\n";
        match find(source, "ok").unwrap_err() {
            LocateError::Parse { reason, .. } => assert!(reason.contains("line")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_function_named_like_variable_is_not_matched() {
        let source = "target = 1\n\ndef other():\n    target = 2\n";
        assert!(find(source, "target").is_err());
    }
}
