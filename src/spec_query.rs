//! Helpers shared by the URL planner (C3) and parameter expander (C4) for
//! reading role/scope gates and path parameters off a swagger operation
//! object (spec.md §4.3/§4.4).

use std::collections::HashSet;

use regex::Regex;
use serde_json::Value;

/// Path-variable names embedded in a swagger route template, e.g.
/// `{character_id}` in `/characters/{character_id}/roles/`.
pub fn path_params(route: &str) -> Vec<String> {
    static_path_param_regex()
        .captures_iter(route)
        .map(|c| c[1].to_string())
        .collect()
}

fn static_path_param_regex() -> Regex {
    Regex::new(r"\{([a-zA-Z0-9_]+)\}").expect("valid literal regex")
}

/// `x-required-roles` on a GET operation, if present.
pub fn required_roles(get_op: &Value) -> HashSet<String> {
    get_op
        .get("x-required-roles")
        .and_then(Value::as_array)
        .map(|roles| roles.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// `security[0].evesso` scopes on a GET operation, if present.
pub fn required_scopes(get_op: &Value) -> HashSet<String> {
    get_op
        .get("security")
        .and_then(Value::as_array)
        .and_then(|sec| sec.first())
        .and_then(|entry| entry.get("evesso"))
        .and_then(Value::as_array)
        .map(|scopes| scopes.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn is_subset(required: &HashSet<String>, granted: &HashSet<String>) -> bool {
    required.is_subset(granted)
}

/// Substitute every `{name}` occurrence in `route` with its value from `values`.
/// Returns `None` if any placeholder is missing.
pub fn substitute(route: &str, values: &std::collections::HashMap<String, i64>) -> Option<String> {
    let mut out = route.to_string();
    for name in path_params(route) {
        let value = values.get(&name)?;
        out = out.replace(&format!("{{{}}}", name), &value.to_string());
    }
    Some(out)
}
