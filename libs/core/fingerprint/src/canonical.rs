// [libs/core/fingerprint/src/canonical.rs]
//! Canonicalization rules: sort mapping keys lexicographically at every
//! level, normalize numeric scalars to their minimal decimal form,
//! normalize strings to NFC, and serialize with no insignificant
//! whitespace.
//!
//! Implementations that disagree on any of these steps will derive
//! different `run_id`s for the same logical configuration and never
//! rendezvous, so this module is the one place that logic may live.

use serde_json::{Map, Number, Value};
use unicode_normalization::UnicodeNormalization;

/// Recursively rewrites `value` into its canonical form.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) => value.clone(),
        Value::Number(n) => Value::Number(canonicalize_number(n)),
        Value::String(s) => Value::String(s.nfc().collect()),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            // `serde_json::Map` is a `BTreeMap` in this workspace (the
            // `preserve_order` feature is never enabled), so rebuilding it
            // here already yields lexicographically sorted keys; the
            // explicit rebuild keeps that guarantee independent of feature
            // flags elsewhere in the dependency graph.
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
    }
}

/// Collapses a float that is mathematically an integer to its integer
/// form so `1.0` and `1` canonicalize identically.
fn canonicalize_number(n: &Number) -> Number {
    if let Some(f) = n.as_f64() {
        if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            return Number::from(f as i64);
        }
    }
    n.clone()
}

/// Serializes `value` (already canonicalized) as compact UTF-8 with no
/// insignificant whitespace.
pub fn to_canonical_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical Value always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_at_every_level() {
        let input = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let canon = canonicalize(&input);
        let bytes = to_canonical_bytes(&canon);
        assert_eq!(bytes, br#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn collapses_integer_valued_floats() {
        let input = json!({"x": 1.0});
        let canon = canonicalize(&input);
        assert_eq!(to_canonical_bytes(&canon), br#"{"x":1}"#);
    }

    #[test]
    fn normalizes_strings_to_nfc() {
        // "e" + combining acute accent vs precomposed "é" must canonicalize equal.
        let decomposed = json!({"name": "cafe\u{0301}"});
        let precomposed = json!({"name": "café"});
        assert_eq!(
            to_canonical_bytes(&canonicalize(&decomposed)),
            to_canonical_bytes(&canonicalize(&precomposed))
        );
    }

    #[test]
    fn no_insignificant_whitespace() {
        let canon = canonicalize(&json!({"a": 1, "b": [1, 2, 3]}));
        let bytes = to_canonical_bytes(&canon);
        assert!(!bytes.contains(&b' '));
    }
}
