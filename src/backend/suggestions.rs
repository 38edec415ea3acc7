use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

// Bullets ("- ", "• ", "* ") and numbering ("1.", "2)").
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-•]+\s*|\*\s+|\d+[.)](?:\s+|$))").unwrap());

#[derive(Debug, Deserialize)]
struct SuggestionList {
    suggestions: Vec<Value>,
}

/// Strip one leading list marker from a trimmed line.
pub fn clean_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let stripped = LIST_MARKER.replace(trimmed, "");
    let cleaned = stripped.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// One suggestion per non-empty line, list markers removed.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines().filter_map(clean_line).collect()
}

/// Collect the string entries of a JSON `suggestions` array.
pub fn from_json_array(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => clean_line(text),
            Value::Null => None,
            other => clean_line(&other.to_string()),
        })
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            // Drop the info string ("json", "text", ...) on the opening fence.
            let body = rest.split_once('\n').map_or("", |(_, body)| body);
            body.trim_end().strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    }
}

/// Interpret free text produced by a self-hosted model.
///
/// Text that looks like a JSON object is read as `{"suggestions": [...]}`;
/// if that fails the whole cleaned text becomes a single suggestion.
/// Anything else is split into lines.
pub fn parse_generated_text(text: &str) -> Vec<String> {
    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    if cleaned.starts_with('{') {
        return match serde_json::from_str::<SuggestionList>(cleaned) {
            Ok(list) => from_json_array(&list.suggestions),
            Err(_) => vec![cleaned.to_string()],
        };
    }

    parse_lines(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_line_markers() {
        assert_eq!(clean_line("- Add type hints").as_deref(), Some("Add type hints"));
        assert_eq!(clean_line("  * Add docstring ").as_deref(), Some("Add docstring"));
        assert_eq!(clean_line("• Rename x").as_deref(), Some("Rename x"));
        assert_eq!(clean_line("1. Use a set").as_deref(), Some("Use a set"));
        assert_eq!(clean_line("12) Handle None").as_deref(), Some("Handle None"));
        assert_eq!(clean_line("--- Split function").as_deref(), Some("Split function"));
        assert_eq!(clean_line("   "), None);
        assert_eq!(clean_line("-"), None);
        assert_eq!(clean_line("2."), None);
    }

    #[test]
    fn test_clean_line_keeps_content() {
        assert_eq!(clean_line("**Naming**: be explicit").as_deref(), Some("**Naming**: be explicit"));
        assert_eq!(clean_line("3.14 is hardcoded").as_deref(), Some("3.14 is hardcoded"));
        assert_eq!(clean_line("Use f-strings").as_deref(), Some("Use f-strings"));
    }

    #[test]
    fn test_parse_lines() {
        let text = "Here are my suggestions:\n\n1. Add type hints\n2. Add a docstring\n\n- Avoid globals\n";
        assert_eq!(
            parse_lines(text),
            vec![
                "Here are my suggestions:",
                "Add type hints",
                "Add a docstring",
                "Avoid globals"
            ]
        );
    }

    #[test]
    fn test_generated_json_object() {
        let text = r#"{"suggestions": ["1. Add type hints", "Add docstring", null]}"#;
        assert_eq!(parse_generated_text(text), vec!["Add type hints", "Add docstring"]);
    }

    #[test]
    fn test_generated_json_in_code_fence() {
        let text = "```json\n{\"suggestions\": [\"Use pathlib\"]}\n```";
        assert_eq!(parse_generated_text(text), vec!["Use pathlib"]);
    }

    #[test]
    fn test_broken_json_becomes_single_suggestion() {
        let text = "  {\"suggestions\": [\"unterminated\"  ";
        assert_eq!(
            parse_generated_text(text),
            vec!["{\"suggestions\": [\"unterminated\""]
        );
    }

    #[test]
    fn test_generated_plain_text() {
        assert_eq!(
            parse_generated_text("1. Validate input\n2. Log failures"),
            vec!["Validate input", "Log failures"]
        );
        assert!(parse_generated_text("   ").is_empty());
    }

    #[test]
    fn test_non_string_json_entries() {
        let items = vec![json!("Keep"), json!(42), json!(null)];
        assert_eq!(from_json_array(&items), vec!["Keep", "42"]);
    }
}
