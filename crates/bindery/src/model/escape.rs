//! HTML escaping of attribute values for `Model::escape`.

use std::sync::OnceLock;

use serde_json::Value;

static ENTITY_REGEX: OnceLock<regex::Regex> = OnceLock::new();

/// Matches an already-escaped entity at the start of the input.
fn entity_regex() -> &'static regex::Regex {
    ENTITY_REGEX.get_or_init(|| {
        regex::Regex::new(r"^(?:\w+|#\d+|#[xX][0-9a-fA-F]+);").expect("entity regex is valid")
    })
}

/// String form of an attribute value. Missing and `null` are empty.
pub(crate) fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Escape `&`, `<`, `>`, `"`, `'`, and `/`. Existing entities such as
/// `&amp;` or `&#39;` are left intact.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, c) in input.char_indices() {
        match c {
            '&' if entity_regex().is_match(&input[i + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            c => out.push(c),
        }
    }
    out
}
