//! # Canonical Serialization — RFC 8785 Byte Production
//!
//! This module defines [`CanonicalBytes`], the sole construction path for
//! bytes used in digest computation and Ed25519 signing across the entire
//! platform.
//!
//! ## Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which serializes the
//! value with the JSON Canonicalization Scheme (RFC 8785): UTF-8, no
//! insignificant whitespace, object keys sorted by code point, arrays in
//! order, numbers as their shortest exact decimal, strings escaping only
//! what JSON requires.
//!
//! This makes the "wrong serialization path" defect class structurally
//! impossible: any function hashing or signing structured data must accept
//! `&CanonicalBytes`, and the only way to produce one is through the
//! correct pipeline. Two values that compare structurally equal serialize
//! to identical bytes regardless of construction order.
//!
//! ## Number Domain
//!
//! Finite numbers are accepted and emitted in shortest-round-trip decimal
//! form. NaN and ±∞ are unrepresentable in `serde_json::Number` by
//! construction; the [`canonical_number`] helper is the checked entry
//! point for raw `f64` values arriving from outside the JSON domain.

use serde::Serialize;
use serde_json::Number;

use crate::error::EncodingError;

/// Bytes produced exclusively by RFC 8785 canonical serialization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Object keys are sorted lexicographically by code point.
/// - Output is compact UTF-8 with no insignificant whitespace.
/// - Numbers are shortest exact decimal; integers carry no fraction.
///
/// These invariants are enforced by the constructor and cannot be violated
/// by downstream code because the inner `Vec<u8>` is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// This is the ONLY way to construct `CanonicalBytes`. All digest and
    /// signature computation in the workspace must flow through here.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Serialization`] if the value cannot be
    /// represented as canonical JSON (e.g. a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, EncodingError> {
        let value = serde_json::to_value(obj)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest or signature computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Checked conversion of a raw `f64` into the canonical number domain.
///
/// `serde_json::Number` cannot hold NaN or infinities, so any value that
/// reaches canonicalization as a `Number` is already finite. This helper
/// is the boundary check for floats arriving from computation (scores,
/// distances) before they enter a value destined for hashing or signing.
///
/// # Errors
///
/// Returns [`EncodingError::NonFiniteNumber`] for NaN and ±∞.
pub fn canonical_number(f: f64) -> Result<Number, EncodingError> {
    Number::from_f64(f).ok_or(EncodingError::NonFiniteNumber(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_object_is_compact_and_sorted() {
        let data = json!({"b": 2, "a": 1, "c": "hello"});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn key_order_of_input_is_irrelevant() {
        let a = json!({"z": 1, "m": 2, "a": 3});
        let b = json!({"a": 3, "z": 1, "m": 2});
        assert_eq!(
            CanonicalBytes::new(&a).unwrap(),
            CanonicalBytes::new(&b).unwrap()
        );
    }

    #[test]
    fn nested_objects_sorted_recursively() {
        let data = json!({
            "outer": {"b": 2, "a": 1},
            "list": [3, 2, 1]
        });
        let cb = CanonicalBytes::new(&data).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn integers_carry_no_fraction() {
        let cb = CanonicalBytes::new(&json!({"n": 42})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"n":42}"#);
    }

    #[test]
    fn finite_floats_are_shortest_form() {
        let cb = CanonicalBytes::new(&json!({"w": 0.5})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"w":0.5}"#);
    }

    #[test]
    fn null_and_bool_passthrough() {
        let cb = CanonicalBytes::new(&json!({"k": null, "f": true})).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert_eq!(s, r#"{"f":true,"k":null}"#);
    }

    #[test]
    fn empty_containers() {
        assert_eq!(CanonicalBytes::new(&json!({})).unwrap().as_bytes(), b"{}");
        assert_eq!(CanonicalBytes::new(&json!([])).unwrap().as_bytes(), b"[]");
    }

    #[test]
    fn unicode_passes_through_unescaped() {
        let cb = CanonicalBytes::new(&json!({"name": "deklaracija ą č ė"})).unwrap();
        let s = std::str::from_utf8(cb.as_bytes()).unwrap();
        assert!(s.contains('ą'));
        assert!(s.contains('ė'));
    }

    #[test]
    fn canonical_number_accepts_finite() {
        assert!(canonical_number(0.25).is_ok());
        assert!(canonical_number(-3.0).is_ok());
    }

    #[test]
    fn canonical_number_rejects_nan_and_infinity() {
        assert!(matches!(
            canonical_number(f64::NAN),
            Err(EncodingError::NonFiniteNumber(_))
        ));
        assert!(canonical_number(f64::INFINITY).is_err());
        assert!(canonical_number(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn len_and_is_empty() {
        let cb = CanonicalBytes::new(&json!({"a": 1})).unwrap();
        assert!(!cb.is_empty());
        assert!(cb.len() > 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    /// Strategy over the canonical value domain (finite numbers only;
    /// `serde_json::Number` cannot hold anything else).
    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ ]{0,50}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,10}", inner, 0..8).prop_map(|m| {
                    let map: serde_json::Map<String, Value> = m.into_iter().collect();
                    Value::Object(map)
                }),
            ]
        })
    }

    proptest! {
        /// Canonicalization never fails over the canonical value domain.
        #[test]
        fn canonicalization_is_total(value in json_value()) {
            prop_assert!(CanonicalBytes::new(&value).is_ok());
        }

        /// Same input always produces the same bytes.
        #[test]
        fn canonicalization_is_deterministic(value in json_value()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        /// Output is valid UTF-8 JSON that round-trips.
        #[test]
        fn canonical_bytes_are_valid_json(value in json_value()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            let parsed: Result<Value, _> = serde_json::from_slice(cb.as_bytes());
            prop_assert!(parsed.is_ok());
            prop_assert_eq!(parsed.unwrap(), value);
        }

        /// Object keys appear sorted in the canonical output.
        #[test]
        fn object_keys_are_sorted(
            keys in prop::collection::btree_set("[a-z]{1,8}", 2..6)
        ) {
            let map: serde_json::Map<String, Value> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), serde_json::json!(i)))
                .collect();
            let cb = CanonicalBytes::new(&Value::Object(map)).unwrap();
            let s = std::str::from_utf8(cb.as_bytes()).unwrap();
            let parsed: serde_json::Map<String, Value> = serde_json::from_str(s).unwrap();
            let output_keys: Vec<&String> = parsed.keys().collect();
            let mut sorted = output_keys.clone();
            sorted.sort();
            prop_assert_eq!(output_keys, sorted);
        }
    }
}
