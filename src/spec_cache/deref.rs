//! Resolves Swagger 2.0 `$ref` JSON-pointer indirections so downstream code
//! never has to dereference (spec.md §4.2). Reimplemented from scratch —
//! the original relies on a Python-only JSON-Reference library with no
//! Rust equivalent in the corpus.

use serde_json::Value;

const MAX_DEPTH: usize = 64;

/// Resolves every `$ref` in `document` against `document` itself (Swagger
/// documents only ever ref their own `#/definitions/...`).
pub fn resolve(document: &Value) -> Value {
    let mut resolved = document.clone();
    walk(&mut resolved, document, 0);
    resolved
}

fn walk(node: &mut Value, root: &Value, depth: usize) {
    if depth >= MAX_DEPTH {
        return;
    }

    match node {
        Value::Object(map) => {
            if let Some(Value::String(pointer)) = map.get("$ref").cloned() {
                if let Some(target) = resolve_pointer(root, &pointer) {
                    let mut replacement = target.clone();
                    walk(&mut replacement, root, depth + 1);
                    *node = replacement;
                    return;
                }
            }
            for value in map.values_mut() {
                walk(value, root, depth + 1);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                walk(item, root, depth + 1);
            }
        }
        _ => {}
    }
}

fn resolve_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let pointer = pointer.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    root.pointer(pointer)
}
