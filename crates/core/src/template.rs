//! Template variable rendering.
//!
//! Scripts may reference request-supplied values with `{{ .VarName }}`
//! placeholders. Rendering happens per request, never at registration
//! time, so the registered script text stays canonical.

use std::collections::HashMap;

use regex::Regex;

fn placeholder_regex() -> Regex {
    Regex::new(r"\{\{\s*\.(\w+)\s*\}\}").expect("placeholder pattern is valid")
}

/// Variable names referenced by a script, first-seen order, deduplicated.
pub fn extract_vars(content: &str) -> Vec<String> {
    let re = placeholder_regex();
    let mut vars: Vec<String> = Vec::new();
    for caps in re.captures_iter(content) {
        let name = &caps[1];
        if !vars.iter().any(|v| v == name) {
            vars.push(name.to_string());
        }
    }
    vars
}

/// Substitutes provided values into a script's placeholders.
///
/// Placeholders with no provided value are left intact so the script
/// fails visibly rather than silently receiving an empty string.
pub fn render(source: &str, values: &HashMap<String, String>) -> String {
    let re = placeholder_regex();
    re.replace_all(source, |caps: &regex::Captures<'_>| {
        match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
