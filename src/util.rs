//! Small helpers: identifier generation and default-filling merge.

use rand::Rng;
use serde_json::Value;

const INITIAL_CHARS: &[u8] = b"acdefghijkmnprstuvwxyz";
const TRAILING_CHARS: &[u8] = b"0123456789acdefghijkmnprstuvwxyz";

/// Default length of generated identifiers.
pub const DEFAULT_ID_LENGTH: usize = 12;

/// Generate a random identifier of `length` characters.
///
/// The first character is always a letter, so the result is usable as a key
/// in most naming schemes. Easily confused letters (`b`, `l`, `o`, `q`) are
/// left out.
pub fn random(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|i| {
            let chars = if i == 0 { INITIAL_CHARS } else { TRAILING_CHARS };
            chars[rng.gen_range(0..chars.len())] as char
        })
        .collect()
}

/// Fill the null or missing fields of `data` from `default`, recursively.
///
/// ```
/// use provision::merge;
/// use serde_json::json;
///
/// let merged = merge(json!({"a": 33, "b": null, "d": 66}), &json!({"a": 0, "b": 44, "c": 55}));
/// assert_eq!(merged, json!({"a": 33, "b": 44, "c": 55, "d": 66}));
/// ```
pub fn merge(data: Value, default: &Value) -> Value {
    match (data, default) {
        (Value::Null, default) => default.clone(),
        (Value::Object(mut data), Value::Object(default)) => {
            for (key, default) in default {
                let current = data.remove(key).unwrap_or(Value::Null);
                data.insert(key.clone(), merge(current, default));
            }
            Value::Object(data)
        }
        (data, _) => data,
    }
}
