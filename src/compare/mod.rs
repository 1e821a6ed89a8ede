//! Equality policies used to decide whether a mutation is a no-op.
//!
//! The built-in policies look at the JSON view of the data, [`data_view`].
//! Object keys that start with `_` are skipped by [`shallow_equal`] and
//! [`deep_equal`], so a data value can carry private fields that never
//! trigger an update.
//!
//! ```
//! use provision::compare::{deep_equal, full_equal};
//! use serde_json::json;
//!
//! assert!(deep_equal(&json!({"a": 1, "_b": 1}), &json!({"a": 1, "_b": 2})));
//! assert!(!full_equal(&json!({"a": 1, "_b": 1}), &json!({"a": 1, "_b": 2})));
//! ```

mod view;

pub use view::{data_view, NON_FINITE_KEY};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::rc::Rc;

/// Same-value equality for floats: `NaN` equals itself, `+0` and `-0` differ.
pub fn same_value(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

fn number_equal(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => same_value(x, y),
            _ => false,
        }
    } else {
        a == b
    }
}

fn is_private(key: &str) -> bool {
    key.starts_with('_')
}

/// Identity comparison.
///
/// Values carry no reference identity here, so identity is full structural
/// equality (private keys included) with same-value number semantics.
pub fn full_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| full_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, x)| y.get(key).is_some_and(|y| full_equal(x, y)))
        }
        _ => a == b,
    }
}

fn members_equal(a: &Value, b: &Value, inner: fn(&Value, &Value) -> bool) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .filter(|(key, _)| !is_private(key))
                    .all(|(key, x)| y.get(key).is_some_and(|y| inner(x, y)))
                && y.keys().filter(|key| !is_private(key)).all(|key| x.contains_key(key))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| inner(x, y))
        }
        _ => false,
    }
}

/// One-level comparison: members are compared with [`full_equal`].
///
/// Private keys are ignored, but still count towards the key count.
pub fn shallow_equal(a: &Value, b: &Value) -> bool {
    full_equal(a, b) || members_equal(a, b, full_equal)
}

/// Recursive comparison; private keys are ignored at every depth.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    full_equal(a, b) || members_equal(a, b, deep_equal)
}

/// Never equal: every mutation is treated as a change.
pub fn not_equal(_a: &Value, _b: &Value) -> bool {
    false
}

/// A named comparison policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparePolicy {
    /// [`full_equal`].
    Is,
    /// [`shallow_equal`].
    Shallow,
    /// [`deep_equal`].
    #[default]
    Deep,
    /// [`not_equal`].
    Not,
}

impl ComparePolicy {
    /// The JSON comparison function behind this policy.
    pub fn function(self) -> fn(&Value, &Value) -> bool {
        match self {
            ComparePolicy::Is => full_equal,
            ComparePolicy::Shallow => shallow_equal,
            ComparePolicy::Deep => deep_equal,
            ComparePolicy::Not => not_equal,
        }
    }
}

/// Caller-supplied comparison over typed data.
pub type CompareFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// The comparator a store resolves once at construction, or per call.
pub enum Compare<T> {
    Policy(ComparePolicy),
    Custom(CompareFn<T>),
}

impl<T: Serialize> Compare<T> {
    /// Wrap a custom comparison function.
    pub fn custom(f: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Compare::Custom(Rc::new(f))
    }

    /// Returns true when `a` and `b` are to be treated as equal.
    ///
    /// Data that cannot be viewed as JSON is never equal.
    pub fn equals(&self, a: &T, b: &T) -> bool {
        match self {
            Compare::Custom(f) => f(a, b),
            Compare::Policy(ComparePolicy::Not) => false,
            Compare::Policy(policy) => {
                match (data_view(a), data_view(b)) {
                    (Ok(a), Ok(b)) => policy.function()(&a, &b),
                    _ => false,
                }
            }
        }
    }
}

impl<T> Default for Compare<T> {
    fn default() -> Self {
        Compare::Policy(ComparePolicy::Deep)
    }
}

impl<T> Clone for Compare<T> {
    fn clone(&self) -> Self {
        match self {
            Compare::Policy(policy) => Compare::Policy(*policy),
            Compare::Custom(f) => Compare::Custom(Rc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Compare<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compare::Policy(policy) => f.debug_tuple("Policy").field(policy).finish(),
            Compare::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<T> From<ComparePolicy> for Compare<T> {
    fn from(policy: ComparePolicy) -> Self {
        Compare::Policy(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn same_value_semantics() {
        assert!(same_value(f64::NAN, f64::NAN));
        assert!(!same_value(0.0, -0.0));
        assert!(same_value(1.5, 1.5));
        assert!(full_equal(&json!(-0.0), &json!(-0.0)));
        assert!(!full_equal(&json!(0.0), &json!(-0.0)));
        assert!(full_equal(&json!(1), &json!(1.0)));
    }

    #[test]
    fn underscore_keys_are_ignored() {
        assert!(deep_equal(&json!({"a": 1, "_b": 1}), &json!({"a": 1, "_b": 2})));
        assert!(!deep_equal(&json!({"a": 1, "_b": 1}), &json!({"a": 2, "_b": 1})));
        assert!(deep_equal(
            &json!({"a": {"b": 1, "_c": 1}}),
            &json!({"a": {"b": 1, "_c": 9}})
        ));
        // still counted
        assert!(!deep_equal(&json!({"a": 1, "_b": 1}), &json!({"a": 1})));
    }

    #[test]
    fn shallow_compares_members_by_identity() {
        let a = json!({"a": {"b": 1, "_c": 1}});
        let b = json!({"a": {"b": 1, "_c": 2}});
        assert!(!shallow_equal(&a, &b));
        assert!(deep_equal(&a, &b));
        assert!(shallow_equal(&json!({"x": [1, 2]}), &json!({"x": [1, 2]})));
        assert!(!shallow_equal(&json!({"x": 1}), &json!({"y": 1})));
    }

    #[test]
    fn primitives_fall_through() {
        assert!(!deep_equal(&json!(1), &json!("1")));
        assert!(!shallow_equal(&json!(null), &json!({})));
        assert!(deep_equal(&json!("x"), &json!("x")));
        assert!(!not_equal(&json!(1), &json!(1)));
    }

    #[test]
    fn typed_compare() {
        #[derive(Serialize)]
        struct Data {
            count: i32,
            _cache: String,
        }
        let a = Data { count: 1, _cache: "a".into() };
        let b = Data { count: 1, _cache: "b".into() };
        assert!(Compare::<Data>::default().equals(&a, &b));
        assert!(!Compare::<Data>::from(ComparePolicy::Is).equals(&a, &b));
        assert!(!Compare::<Data>::from(ComparePolicy::Not).equals(&a, &a));
        assert!(Compare::<Data>::custom(|_, _| true).equals(&a, &b));
    }

    #[test]
    fn typed_floats_follow_same_value() {
        let is = Compare::<f64>::from(ComparePolicy::Is);
        assert!(is.equals(&f64::NAN, &f64::NAN));
        assert!(!is.equals(&0.0, &-0.0));
        assert!(!is.equals(&f64::NAN, &f64::INFINITY));
        assert!(!is.equals(&f64::INFINITY, &f64::NEG_INFINITY));

        let deep = Compare::<Option<f64>>::default();
        assert!(deep.equals(&Some(f64::NAN), &Some(f64::NAN)));
        assert!(!deep.equals(&Some(f64::NAN), &None));
        assert!(!deep.equals(&Some(0.0), &Some(-0.0)));
    }

    #[test]
    fn policy_names() {
        let policy: ComparePolicy = serde_json::from_str("\"shallow\"").unwrap();
        assert_eq!(policy, ComparePolicy::Shallow);
        assert_eq!(ComparePolicy::default(), ComparePolicy::Deep);
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<f64>().prop_map(|f| data_view(&f).expect("floats always have a view")),
            "[a-z_]{0,4}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                prop::collection::btree_map("[a-z_]{1,3}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn comparators_are_reflexive(v in arb_value()) {
            prop_assert!(full_equal(&v, &v));
            prop_assert!(shallow_equal(&v, &v));
            prop_assert!(deep_equal(&v, &v));
        }

        #[test]
        fn comparators_are_symmetric(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(full_equal(&a, &b), full_equal(&b, &a));
            prop_assert_eq!(shallow_equal(&a, &b), shallow_equal(&b, &a));
            prop_assert_eq!(deep_equal(&a, &b), deep_equal(&b, &a));
        }

        #[test]
        fn policies_nest(a in arb_value(), b in arb_value()) {
            if full_equal(&a, &b) {
                prop_assert!(shallow_equal(&a, &b));
            }
            if shallow_equal(&a, &b) {
                prop_assert!(deep_equal(&a, &b));
            }
        }
    }
}
