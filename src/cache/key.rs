//! Deterministic cache keys.
//!
//! A key is `"{prefix}:{sha256}"` where the digest covers a canonical JSON
//! rendering of the prefix, the positional arguments (order kept) and the
//! keyword arguments (sorted by name).
//!
//! Only the digest part has a fixed length (64 hex characters); the whole key
//! grows with the prefix, so callers should not rely on key length.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct Canonical<'a> {
    prefix: &'a str,
    args: &'a [Value],
    kwargs: &'a BTreeMap<String, Value>,
}

/// Build a key from already-serialized arguments.
pub fn make_key(prefix: &str, args: &[Value], kwargs: &BTreeMap<String, Value>) -> String {
    let canonical = Canonical { prefix, args, kwargs };
    // Value trees with string keys always serialize.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    format!("{}:{:x}", prefix, Sha256::digest(&bytes))
}

/// Key for an argument bundle passed as one serializable value.
///
/// Tuples and sequences become positional arguments, structs and maps become
/// keyword arguments, anything else is a single positional argument.
pub fn key_for<A: Serialize + ?Sized>(prefix: &str, args: &A) -> Result<String, serde_json::Error> {
    let key = match serde_json::to_value(args)? {
        Value::Array(items) => make_key(prefix, &items, &BTreeMap::new()),
        Value::Object(map) => make_key(prefix, &[], &map.into_iter().collect()),
        Value::Null => make_key(prefix, &[], &BTreeMap::new()),
        other => make_key(prefix, &[other], &BTreeMap::new()),
    };
    Ok(key)
}

/// Incremental key builder.
///
/// ```
/// use ordnung_gate::cache::CacheKey;
///
/// let a = CacheKey::new("user").arg(&1).kwarg("a", &3).kwarg("b", &4).build().unwrap();
/// let b = CacheKey::new("user").arg(&1).kwarg("b", &4).kwarg("a", &3).build().unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct CacheKey {
    prefix: String,
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
    error: Option<String>,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            error: None,
        }
    }

    /// Append a positional argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => self.args.push(v),
            Err(e) => self.error = Some(e.to_string()),
        }
        self
    }

    /// Set a keyword argument. Later values for the same name win.
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.kwargs.insert(name.into(), v);
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self
    }

    /// The final key, or `None` if any argument failed to serialize.
    pub fn build(&self) -> Option<String> {
        if let Some(error) = &self.error {
            tracing::debug!(prefix = %self.prefix, error = %error, "Cache key argument not serializable");
            return None;
        }
        Some(make_key(&self.prefix, &self.args, &self.kwargs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_kwarg_order_independent_positional_order_significant() {
        let k1 = CacheKey::new("p").arg(&1).arg(&2).kwarg("a", &3).kwarg("b", &4).build();
        let k2 = CacheKey::new("p").arg(&1).arg(&2).kwarg("b", &4).kwarg("a", &3).build();
        let k3 = CacheKey::new("p").arg(&2).arg(&1).kwarg("a", &3).kwarg("b", &4).build();

        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_stable_and_prefixed() {
        let kwargs = BTreeMap::new();
        let a = make_key("workspace", &[json!(42)], &kwargs);
        let b = make_key("workspace", &[json!(42)], &kwargs);
        assert_eq!(a, b);
        assert!(a.starts_with("workspace:"));
        assert_eq!(a.len(), "workspace:".len() + 64);
    }

    #[test]
    fn test_prefix_separates_keys() {
        let kwargs = BTreeMap::new();
        assert_ne!(make_key("a", &[json!(1)], &kwargs), make_key("b", &[json!(1)], &kwargs));
    }

    #[test]
    fn test_args_and_kwargs_do_not_alias() {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("0".to_string(), json!(1));
        assert_ne!(make_key("p", &[json!(1)], &BTreeMap::new()), make_key("p", &[], &kwargs));
    }

    #[test]
    fn test_key_for_shapes() {
        #[derive(Serialize)]
        struct Query {
            b: u32,
            a: u32,
        }

        assert_eq!(
            key_for("p", &(1, 2)).unwrap(),
            CacheKey::new("p").arg(&1).arg(&2).build().unwrap()
        );
        assert_eq!(
            key_for("p", &Query { b: 4, a: 3 }).unwrap(),
            CacheKey::new("p").kwarg("a", &3).kwarg("b", &4).build().unwrap()
        );
        assert_eq!(
            key_for("p", "x").unwrap(),
            CacheKey::new("p").arg("x").build().unwrap()
        );
    }

    #[test]
    fn test_unserializable_argument() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not JSON object keys");
        assert!(CacheKey::new("p").arg(&bad).build().is_none());
        assert!(key_for("p", &bad).is_err());
    }
}
