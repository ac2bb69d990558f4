//! Typed field values held in record buffers

use super::{CtDate, CtTime, CtTimestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One field's value inside a record buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    /// Signed integers, MONEY/CURRENCY (minor units) and NUMBER
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Date(CtDate),
    Time(CtTime),
    Timestamp(CtTimestamp),
    Text(String),
    Binary(Vec<u8>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Short variant name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Signed(_) => "signed",
            FieldValue::Unsigned(_) => "unsigned",
            FieldValue::Float(_) => "float",
            FieldValue::Date(_) => "date",
            FieldValue::Time(_) => "time",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Text(_) => "text",
            FieldValue::Binary(_) => "binary",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Signed(_) | FieldValue::Unsigned(_) | FieldValue::Float(_) => 2,
            FieldValue::Date(_) => 3,
            FieldValue::Time(_) => 4,
            FieldValue::Timestamp(_) => 5,
            FieldValue::Text(_) => 6,
            FieldValue::Binary(_) => 7,
        }
    }

    /// Total order used for index keys
    ///
    /// Null sorts first. Numbers compare across representations; floats use
    /// IEEE total ordering. `ignore_case` folds ASCII case for text.
    pub fn cmp_key(&self, other: &FieldValue, ignore_case: bool) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Signed(a), Signed(b)) => a.cmp(b),
            (Unsigned(a), Unsigned(b)) => a.cmp(b),
            (Signed(a), Unsigned(b)) => (*a as i128).cmp(&(*b as i128)),
            (Unsigned(a), Signed(b)) => (*a as i128).cmp(&(*b as i128)),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Float(a), Signed(b)) => a.total_cmp(&(*b as f64)),
            (Float(a), Unsigned(b)) => a.total_cmp(&(*b as f64)),
            (Signed(a), Float(b)) => (*a as f64).total_cmp(b),
            (Unsigned(a), Float(b)) => (*a as f64).total_cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Time(a), Time(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (Text(a), Text(b)) if ignore_case => a
                .bytes()
                .map(|c| c.to_ascii_lowercase())
                .cmp(b.bytes().map(|c| c.to_ascii_lowercase())),
            (Text(a), Text(b)) => a.cmp(b),
            (Binary(a), Binary(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Signed(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Signed(v as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Unsigned(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Unsigned(v as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Binary(v)
    }
}

impl From<CtDate> for FieldValue {
    fn from(v: CtDate) -> Self {
        FieldValue::Date(v)
    }
}

impl From<CtTime> for FieldValue {
    fn from(v: CtTime) -> Self {
        FieldValue::Time(v)
    }
}

impl From<CtTimestamp> for FieldValue {
    fn from(v: CtTimestamp) -> Self {
        FieldValue::Timestamp(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sorts_first() {
        assert_eq!(FieldValue::Null.cmp_key(&FieldValue::Signed(-5), false), Ordering::Less);
        assert_eq!(FieldValue::Text("".into()).cmp_key(&FieldValue::Null, false), Ordering::Greater);
    }

    #[test]
    fn test_numeric_cross_compare() {
        assert_eq!(FieldValue::Signed(-1).cmp_key(&FieldValue::Unsigned(0), false), Ordering::Less);
        assert_eq!(FieldValue::Unsigned(u64::MAX).cmp_key(&FieldValue::Signed(i64::MAX), false), Ordering::Greater);
        assert_eq!(FieldValue::Float(2.5).cmp_key(&FieldValue::Signed(2), false), Ordering::Greater);
    }

    #[test]
    fn test_text_case_folding() {
        let a = FieldValue::from("Alpha");
        let b = FieldValue::from("alpha");
        assert_ne!(a.cmp_key(&b, false), Ordering::Equal);
        assert_eq!(a.cmp_key(&b, true), Ordering::Equal);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(FieldValue::from(7u32), FieldValue::Unsigned(7));
        assert_eq!(FieldValue::from(-7i32), FieldValue::Signed(-7));
        assert_eq!(FieldValue::from(true).kind_name(), "bool");
        assert!(FieldValue::Null.is_null());
    }
}
