//! Canonical byte rendering of structured values.
//!
//! The digest of a structured payload must not depend on the order in which
//! the caller inserted keys, so objects are rendered with their keys sorted
//! lexicographically at every nesting level. Arrays keep their order (order
//! is meaning there). The output is compact JSON with no whitespace.
//!
//! Volatile fields (ephemeral render state and the like) are the caller's
//! responsibility to strip before hashing; this module canonicalizes
//! whatever it is given.

use serde::Serialize;
use serde_json::Value;

use crate::hasher::DigestError;

/// Render any serializable value to its canonical byte form.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, DigestError> {
    let value = serde_json::to_value(value)
        .map_err(|e| DigestError::Serialization(e.to_string()))?;
    let mut out = Vec::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), DigestError> {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)
                    .map_err(|e| DigestError::Serialization(e.to_string()))?;
                out.push(b':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        leaf => {
            serde_json::to_writer(&mut *out, leaf)
                .map_err(|e| DigestError::Serialization(e.to_string()))?;
        }
    }
    Ok(())
}
