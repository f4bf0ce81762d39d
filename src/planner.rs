//! URL planner (C3): purely syntactic over the spec — policy lives entirely
//! in the ignore list and the role/scope subset checks (spec.md §4.3).

use std::collections::HashSet;

use serde_json::Value;

use crate::config::routes;
use crate::model::{KnownParams, ParamPools};
use crate::spec_query::{is_subset, path_params, required_roles, required_scopes, substitute};

/// Emits every fully-substituted URL the token may legally call.
///
/// Implemented as a pure fold over fan-out dimensions (spec.md §9 "Cartesian
/// product construction"): `product := [known]; for each (param, pool) in
/// fan_out: product := flatmap(product, s -> [s ⊕ {param:id} for id in pool])`.
pub fn build_urls(
    spec: &Value,
    scopes: &HashSet<String>,
    roles: &HashSet<String>,
    known_params: &KnownParams,
    all_params: &ParamPools,
    base_url: &str,
) -> Vec<String> {
    let base_path = spec.get("basePath").and_then(Value::as_str).unwrap_or("");
    let mut urls = Vec::new();

    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return urls;
    };

    'route: for (route, operations) in paths {
        if routes::IGNORE_LIST.contains(&route.as_str()) {
            continue;
        }

        let Some(get_op) = operations.get("get") else {
            continue;
        };

        if !is_subset(&required_roles(get_op), roles) {
            continue;
        }
        if !is_subset(&required_scopes(get_op), scopes) {
            continue;
        }

        let mut matched_known = false;
        let mut fan_out: Vec<(String, &Vec<i64>)> = Vec::new();
        for param in path_params(route) {
            if known_params.contains_key(&param) {
                matched_known = true;
                continue;
            }
            let pool = known_params
                .keys()
                .filter_map(|parent| all_params.get(parent).and_then(|children| children.get(&param)))
                .next();
            match pool {
                Some(pool) => fan_out.push((param, pool)),
                None => continue 'route,
            }
        }

        // A route with no path placeholders at all offers no useful call
        // once substituted against known params (spec.md §4.3 step 6) — it
        // would be emitted once, unparameterized, regardless of the token.
        if !matched_known && fan_out.is_empty() {
            continue;
        }

        let mut product = vec![known_params.clone()];
        for (param, pool) in &fan_out {
            product = product
                .into_iter()
                .flat_map(|base| {
                    pool.iter().map(move |id| {
                        let mut extended = base.clone();
                        extended.insert(param.clone(), *id);
                        extended
                    })
                })
                .collect();
        }

        if product.is_empty() {
            continue;
        }

        for combination in product {
            if let Some(substituted) = substitute(route, &combination) {
                urls.push(format!("{}{}{}", base_url, base_path, substituted));
            }
        }
    }

    urls
}
