//! Field type tags and per-type value rules

use super::FieldValue;
use crate::error::{CtdbError, Result};
use serde::{Deserialize, Serialize};

/// Primitive field kinds understood by the engine
///
/// `Unknown` carries a raw type code read from storage (or produced by a
/// newer engine) that this SDK does not recognize. It is only ever
/// produced by [`FieldType::from_code`]; tables cannot be created with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    TinyInt,
    UTinyInt,
    SmallInt,
    USmallInt,
    Integer,
    UInteger,
    Money,
    Date,
    Time,
    Float,
    Double,
    Timestamp,
    EFloat,
    Binary,
    Chars,
    FpString,
    F2String,
    F4String,
    BigInt,
    Number,
    Currency,
    PString,
    VarBinary,
    Lvb,
    VarChar,
    Unknown(u16),
}

impl FieldType {
    /// Every recognized variant, in type-code order
    pub const ALL: [FieldType; 26] = [
        FieldType::Bool,
        FieldType::TinyInt,
        FieldType::UTinyInt,
        FieldType::SmallInt,
        FieldType::USmallInt,
        FieldType::Integer,
        FieldType::UInteger,
        FieldType::Money,
        FieldType::Date,
        FieldType::Time,
        FieldType::Float,
        FieldType::Double,
        FieldType::Timestamp,
        FieldType::EFloat,
        FieldType::Binary,
        FieldType::Chars,
        FieldType::FpString,
        FieldType::F2String,
        FieldType::F4String,
        FieldType::BigInt,
        FieldType::Number,
        FieldType::Currency,
        FieldType::PString,
        FieldType::VarBinary,
        FieldType::Lvb,
        FieldType::VarChar,
    ];

    /// Stable numeric code (as stored in table files)
    pub fn code(self) -> u16 {
        match self {
            FieldType::Unknown(code) => code,
            known => Self::ALL.iter().position(|t| *t == known).map_or(0, |p| p as u16 + 1),
        }
    }

    /// Inverse of [`FieldType::code`]; unrecognized codes map to `Unknown`
    pub fn from_code(code: u16) -> Self {
        match code {
            1..=26 => Self::ALL[code as usize - 1],
            other => FieldType::Unknown(other),
        }
    }

    /// Canonical uppercase name; never fails
    pub fn human_type(self) -> &'static str {
        match self {
            FieldType::Bool => "BOOL",
            FieldType::TinyInt => "TINYINT",
            FieldType::UTinyInt => "UTINYINT",
            FieldType::SmallInt => "SMALLINT",
            FieldType::USmallInt => "USMALLINT",
            FieldType::Integer => "INTEGER",
            FieldType::UInteger => "UINTEGER",
            FieldType::Money => "MONEY",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::EFloat => "EFLOAT",
            FieldType::Binary => "BINARY",
            FieldType::Chars => "CHARS",
            FieldType::FpString => "FPSTRING",
            FieldType::F2String => "F2STRING",
            FieldType::F4String => "F4STRING",
            FieldType::BigInt => "BIGINT",
            FieldType::Number => "NUMBER",
            FieldType::Currency => "CURRENCY",
            FieldType::PString => "PSTRING",
            FieldType::VarBinary => "VARBINARY",
            FieldType::Lvb => "LVB",
            FieldType::VarChar => "VARCHAR",
            FieldType::Unknown(_) => "UNKNOWN",
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, FieldType::Unknown(_))
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            FieldType::Chars
                | FieldType::FpString
                | FieldType::F2String
                | FieldType::F4String
                | FieldType::PString
                | FieldType::VarChar
                | FieldType::Lvb
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::TinyInt
                | FieldType::UTinyInt
                | FieldType::SmallInt
                | FieldType::USmallInt
                | FieldType::Integer
                | FieldType::UInteger
                | FieldType::BigInt
                | FieldType::Number
        )
    }

    pub fn is_date(self) -> bool {
        matches!(self, FieldType::Date)
    }

    /// Types stored as [`FieldValue::Signed`]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            FieldType::TinyInt
                | FieldType::SmallInt
                | FieldType::Integer
                | FieldType::BigInt
                | FieldType::Number
                | FieldType::Money
                | FieldType::Currency
        )
    }

    /// Types stored as [`FieldValue::Unsigned`]
    pub fn is_unsigned(self) -> bool {
        matches!(self, FieldType::UTinyInt | FieldType::USmallInt | FieldType::UInteger)
    }

    pub fn is_float(self) -> bool {
        matches!(self, FieldType::Float | FieldType::Double | FieldType::EFloat)
    }

    /// Types stored as [`FieldValue::Binary`]
    pub fn is_binary(self) -> bool {
        matches!(self, FieldType::Binary | FieldType::VarBinary)
    }

    /// Byte width for fixed-width types, or the length-prefix size for the
    /// prefixed variable-length types. `None` means the caller picks.
    pub fn natural_length(self) -> Option<u32> {
        match self {
            FieldType::Bool | FieldType::TinyInt | FieldType::UTinyInt => Some(1),
            FieldType::SmallInt | FieldType::USmallInt => Some(2),
            FieldType::Integer | FieldType::UInteger | FieldType::Money => Some(4),
            FieldType::Date | FieldType::Time | FieldType::Float => Some(4),
            FieldType::Double | FieldType::Timestamp => Some(8),
            FieldType::BigInt | FieldType::Number | FieldType::Currency => Some(8),
            FieldType::EFloat => Some(16),
            FieldType::FpString | FieldType::PString => Some(1),
            FieldType::F2String | FieldType::VarBinary => Some(2),
            FieldType::F4String | FieldType::Lvb => Some(4),
            FieldType::Chars | FieldType::VarChar | FieldType::Binary => None,
            FieldType::Unknown(_) => None,
        }
    }

    /// Check a declared length against the type
    pub fn validate_length(self, length: u32) -> Result<()> {
        if !self.is_known() {
            return Err(CtdbError::InvalidArgument(format!(
                "unrecognized field type code {}",
                self.code()
            )));
        }
        match self.natural_length() {
            Some(expected) if expected != length => Err(CtdbError::InvalidArgument(format!(
                "{} fields have length {}, got {}",
                self.human_type(),
                expected,
                length
            ))),
            None if length == 0 => Err(CtdbError::InvalidArgument(format!(
                "{} fields need a non-zero length",
                self.human_type()
            ))),
            _ => Ok(()),
        }
    }

    /// Maximum payload bytes for string/binary types
    ///
    /// Fixed types (CHARS, BINARY, VARCHAR) hold `length` bytes; prefixed
    /// types hold whatever their length prefix can describe.
    pub fn capacity(self, length: u32) -> Option<u64> {
        match self {
            FieldType::Chars | FieldType::VarChar | FieldType::Binary => Some(length as u64),
            FieldType::FpString | FieldType::PString => Some(u8::MAX as u64),
            FieldType::F2String | FieldType::VarBinary => Some(u16::MAX as u64),
            FieldType::F4String | FieldType::Lvb => Some(u32::MAX as u64),
            _ => None,
        }
    }

    /// Inclusive range for signed integer types
    pub fn signed_range(self) -> Option<(i64, i64)> {
        match self {
            FieldType::TinyInt => Some((i8::MIN as i64, i8::MAX as i64)),
            FieldType::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            FieldType::Integer | FieldType::Money => Some((i32::MIN as i64, i32::MAX as i64)),
            FieldType::BigInt | FieldType::Number | FieldType::Currency => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Inclusive maximum for unsigned integer types
    pub fn unsigned_max(self) -> Option<u64> {
        match self {
            FieldType::UTinyInt => Some(u8::MAX as u64),
            FieldType::USmallInt => Some(u16::MAX as u64),
            FieldType::UInteger => Some(u32::MAX as u64),
            _ => None,
        }
    }

    /// Value a cleared, non-nullable field starts with
    pub fn blank_value(self) -> FieldValue {
        match self {
            FieldType::Bool => FieldValue::Bool(false),
            t if t.is_signed() => FieldValue::Signed(0),
            t if t.is_unsigned() => FieldValue::Unsigned(0),
            t if t.is_float() => FieldValue::Float(0.0),
            FieldType::Date => FieldValue::Date(super::CtDate::MIN),
            FieldType::Time => FieldValue::Time(super::CtTime::MIDNIGHT),
            FieldType::Timestamp => FieldValue::Timestamp(super::CtTimestamp::MIN),
            t if t.is_binary() => FieldValue::Binary(Vec::new()),
            t if t.is_string() => FieldValue::Text(String::new()),
            _ => FieldValue::Null,
        }
    }

    /// Convert an integer value to the signedness this type stores
    ///
    /// `Signed(n)` becomes `Unsigned` for unsigned types when `n >= 0`, and
    /// `Unsigned(n)` becomes `Signed` for signed types when it fits in `i64`.
    /// Anything else is returned unchanged for `check_value` to judge.
    pub fn coerce_value(self, value: FieldValue) -> FieldValue {
        match value {
            FieldValue::Signed(n) if self.is_unsigned() => match u64::try_from(n) {
                Ok(n) => FieldValue::Unsigned(n),
                Err(_) => FieldValue::Signed(n),
            },
            FieldValue::Unsigned(n) if self.is_signed() => match i64::try_from(n) {
                Ok(n) => FieldValue::Signed(n),
                Err(_) => FieldValue::Unsigned(n),
            },
            other => other,
        }
    }

    /// Check that `value` can be stored in a field of this type and length
    ///
    /// The value variant must match the type exactly; numeric values are
    /// range-checked and text/binary values are length-checked. `Null` is
    /// accepted here; nullability is a per-field property.
    pub fn check_value(self, length: u32, value: &FieldValue) -> Result<()> {
        let mismatch = || {
            CtdbError::TypeMismatch(format!(
                "{} value cannot be stored in a {} field",
                value.kind_name(),
                self.human_type()
            ))
        };

        match value {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(_) if self == FieldType::Bool => Ok(()),
            FieldValue::Signed(v) => {
                let (min, max) = self.signed_range().ok_or_else(mismatch)?;
                if *v < min || *v > max {
                    return Err(CtdbError::TypeMismatch(format!(
                        "{} out of range for {} ({}..={})",
                        v,
                        self.human_type(),
                        min,
                        max
                    )));
                }
                Ok(())
            }
            FieldValue::Unsigned(v) => {
                let max = self.unsigned_max().ok_or_else(mismatch)?;
                if *v > max {
                    return Err(CtdbError::TypeMismatch(format!(
                        "{} out of range for {} (0..={})",
                        v,
                        self.human_type(),
                        max
                    )));
                }
                Ok(())
            }
            FieldValue::Float(v) if self.is_float() => {
                if self == FieldType::Float && v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(CtdbError::TypeMismatch(format!("{} overflows FLOAT", v)));
                }
                Ok(())
            }
            FieldValue::Date(_) if self == FieldType::Date => Ok(()),
            FieldValue::Time(_) if self == FieldType::Time => Ok(()),
            FieldValue::Timestamp(_) if self == FieldType::Timestamp => Ok(()),
            FieldValue::Text(s) if self.is_string() => self.check_capacity(length, s.len()),
            FieldValue::Binary(b) if self.is_binary() || self == FieldType::Lvb => {
                self.check_capacity(length, b.len())
            }
            _ => Err(mismatch()),
        }
    }

    fn check_capacity(self, length: u32, len: usize) -> Result<()> {
        let capacity = self.capacity(length).unwrap_or(0);
        if len as u64 > capacity {
            return Err(CtdbError::TypeMismatch(format!(
                "{} bytes exceed {} capacity of {}",
                len,
                self.human_type(),
                capacity
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.human_type())
    }
}
