//! Attribute value model and schema-driven coercion.
//!
//! Values carry no floats: decimals are stored as integers pre-scaled by the
//! schema's declared number of decimal places, which keeps every value totally
//! ordered and directly usable as an index key.

use crate::error::{CoreError, CoreResult};
use crate::types::AttributeKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Int,
    /// Fixed-point decimal, stored as an integer scaled by the schema's
    /// declared decimal places.
    Decimal,
    /// UTF-8 string.
    Str,
}

impl AttributeType {
    /// Returns the type name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Decimal => "decimal",
            Self::Str => "string",
        }
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Fixed-point decimal, pre-scaled.
    Decimal(i64),
    /// UTF-8 string.
    Str(String),
    /// Homogeneous array of scalar values.
    Array(Vec<Value>),
}

impl Value {
    /// Returns the name of the value's runtime type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Decimal(_) => "decimal",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
        }
    }

    /// Returns true for array values.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}d"),
            Self::Str(v) => write!(f, "{v}"),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn pow10(places: u8) -> i64 {
    10i64.pow(u32::from(places))
}

/// Coerces a value to the attribute's declared type.
///
/// Integers are accepted for decimal attributes and scaled up by the declared
/// number of decimal places; decimals are assumed to be pre-scaled. Arrays
/// are coerced element-wise. Any other mismatch is an error.
pub fn coerce(value: &Value, key: &AttributeKey, ty: AttributeType, decimal_places: u8) -> CoreResult<Value> {
    let mismatch = || CoreError::InvalidValueType {
        attribute: key.to_string(),
        expected: ty.name(),
        actual: value.type_name(),
    };
    match (value, ty) {
        (Value::Array(items), _) => {
            let coerced = items
                .iter()
                .map(|item| {
                    if item.is_array() {
                        Err(mismatch())
                    } else {
                        coerce(item, key, ty, decimal_places)
                    }
                })
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Value::Array(coerced))
        }
        (Value::Bool(v), AttributeType::Bool) => Ok(Value::Bool(*v)),
        (Value::Int(v), AttributeType::Int) => Ok(Value::Int(*v)),
        (Value::Int(v), AttributeType::Decimal) => v
            .checked_mul(pow10(decimal_places))
            .map(Value::Decimal)
            .ok_or_else(mismatch),
        (Value::Decimal(v), AttributeType::Decimal) => Ok(Value::Decimal(*v)),
        (Value::Str(v), AttributeType::Str) => Ok(Value::Str(v.clone())),
        _ => Err(mismatch()),
    }
}

/// Applies a numeric delta to an existing value.
///
/// The delta is coerced to the attribute's type first, so an integer delta on
/// a decimal attribute is scaled before the addition.
pub fn apply_delta(
    existing: &Value,
    delta: &Value,
    key: &AttributeKey,
    ty: AttributeType,
    decimal_places: u8,
) -> CoreResult<Value> {
    let delta = coerce(delta, key, ty, decimal_places)?;
    match (existing, &delta) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| CoreError::premise(format!("integer overflow applying delta to {key}"))),
        (Value::Decimal(a), Value::Decimal(b)) => a
            .checked_add(*b)
            .map(Value::Decimal)
            .ok_or_else(|| CoreError::premise(format!("decimal overflow applying delta to {key}"))),
        _ => Err(CoreError::InvalidValueType {
            attribute: key.to_string(),
            expected: ty.name(),
            actual: existing.type_name(),
        }),
    }
}

/// A versioned attribute value as stored in a container.
///
/// Removal keeps the record as a tombstone (`exists == false`) so the version
/// counter survives remove/re-insert cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// Key the value is stored under.
    pub key: AttributeKey,
    /// The value itself, already coerced to the schema type.
    pub value: Value,
    /// Monotonic per-value version.
    pub version: u32,
    /// False when the value has been removed.
    pub exists: bool,
}

/// Comparable tuple of optional element values of a sortable compound.
///
/// Derived ordering places absent elements first, which matches the
/// nulls-first ordering of the compound index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompoundTuple(pub Vec<Option<Value>>);

impl CompoundTuple {
    /// Returns true when at least one element carries a value. Tuples with
    /// no values are not indexed at all.
    #[must_use]
    pub fn has_values(&self) -> bool {
        self.0.iter().any(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeKey;

    fn key() -> AttributeKey {
        AttributeKey::global("weight")
    }

    #[test]
    fn int_scales_to_decimal() {
        let coerced = coerce(&Value::Int(7), &key(), AttributeType::Decimal, 2).unwrap();
        assert_eq!(coerced, Value::Decimal(700));
    }

    #[test]
    fn decimal_is_kept_pre_scaled() {
        let coerced = coerce(&Value::Decimal(750), &key(), AttributeType::Decimal, 2).unwrap();
        assert_eq!(coerced, Value::Decimal(750));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = coerce(&Value::Str("x".into()), &key(), AttributeType::Int, 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidValueType { .. }));
    }

    #[test]
    fn arrays_coerce_element_wise() {
        let v = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let coerced = coerce(&v, &key(), AttributeType::Decimal, 1).unwrap();
        assert_eq!(
            coerced,
            Value::Array(vec![Value::Decimal(10), Value::Decimal(20)])
        );
    }

    #[test]
    fn nested_arrays_are_rejected() {
        let v = Value::Array(vec![Value::Array(vec![Value::Int(1)])]);
        assert!(coerce(&v, &key(), AttributeType::Int, 0).is_err());
    }

    #[test]
    fn delta_on_decimal_scales_integer_delta() {
        let next = apply_delta(&Value::Decimal(500), &Value::Int(2), &key(), AttributeType::Decimal, 2).unwrap();
        assert_eq!(next, Value::Decimal(700));
    }

    #[test]
    fn empty_tuple_has_no_values() {
        assert!(!CompoundTuple(vec![None, None]).has_values());
        assert!(CompoundTuple(vec![None, Some(Value::Int(1))]).has_values());
    }
}
