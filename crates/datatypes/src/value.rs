use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::TimeDelta;
use rust_decimal::Decimal;

use crate::datatype::DataType;
use crate::error::DataTypeError;
use crate::temporal::{DateTimeValue, DateValue};

/// Underlying representation of an atomic value.
///
/// Several datatypes share a representation; `token` and `uri` values are both
/// [`Value::Text`], every integer subtype is [`Value::Integer`].
///
/// Equality and hashing are representational: decimals with different
/// scales, such as `1.0` and `1.00`, are different values.
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    Date(DateValue),
    DateTime(DateTimeValue),
    DayTimeDuration(TimeDelta),
    YearMonthDuration(i32),
    Binary(Vec<u8>),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
}

impl Value {
    pub(crate) fn representation(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "date-time",
            Value::DayTimeDuration(_) => "day-time duration",
            Value::YearMonthDuration(_) => "year-month duration",
            Value::Binary(_) => "binary",
            Value::Ipv4(_) => "IPv4 address",
            Value::Ipv6(_) => "IPv6 address",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a.serialize() == b.serialize(),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::DayTimeDuration(a), Value::DayTimeDuration(b)) => a == b,
            (Value::YearMonthDuration(a), Value::YearMonthDuration(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Ipv4(a), Value::Ipv4(b)) => a == b,
            (Value::Ipv6(a), Value::Ipv6(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::Text(text) => text.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Decimal(d) => d.serialize().hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Date(date) => date.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::DayTimeDuration(delta) => delta.hash(state),
            Value::YearMonthDuration(months) => months.hash(state),
            Value::Binary(bytes) => bytes.hash(state),
            Value::Ipv4(addr) => addr.hash(state),
            Value::Ipv6(addr) => addr.hash(state),
        }
    }
}

/// An immutable atomic value together with the datatype that defines it.
///
/// Equality and hashing are strict: two values are equal only when both the
/// datatype and the representation match. Use [`AtomicValue::compare_to`] for
/// the value-space comparison used by queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomicValue {
    datatype: DataType,
    value: Value,
}

impl AtomicValue {
    pub fn new(datatype: DataType, value: Value) -> Result<Self, DataTypeError> {
        datatype.check(&value)?;
        Ok(Self { datatype, value })
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self {
            datatype: DataType::String,
            value: Value::Text(text.into()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Self {
            datatype: DataType::Integer,
            value: Value::Integer(value),
        }
    }

    pub fn decimal(value: Decimal) -> Self {
        Self {
            datatype: DataType::Decimal,
            value: Value::Decimal(value),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            datatype: DataType::Boolean,
            value: Value::Boolean(value),
        }
    }

    pub fn date(value: DateValue) -> Self {
        Self {
            datatype: DataType::Date,
            value: Value::Date(value),
        }
    }

    pub fn date_time(value: DateTimeValue) -> Self {
        Self {
            datatype: DataType::DateTime,
            value: Value::DateTime(value),
        }
    }

    pub fn day_time_duration(value: TimeDelta) -> Self {
        Self {
            datatype: DataType::DayTimeDuration,
            value: Value::DayTimeDuration(value),
        }
    }

    pub fn year_month_duration(months: i32) -> Self {
        Self {
            datatype: DataType::YearMonthDuration,
            value: Value::YearMonthDuration(months),
        }
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Re-tags this value as `datatype`, validating the value space.
    pub fn with_datatype(&self, datatype: DataType) -> Result<Self, DataTypeError> {
        Self::new(datatype, self.value.clone())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.value, Value::Integer(_) | Value::Decimal(_))
    }

    pub fn is_textual(&self) -> bool {
        matches!(self.value, Value::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.value {
            Value::Integer(i) => Some(Decimal::from(i)),
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Compares two values in their shared value space.
    ///
    /// Integers and decimals compare numerically, all textual datatypes compare
    /// by code point, dates and date-times compare as UTC instants. Values from
    /// unrelated families are incomparable.
    pub fn compare_to(&self, other: &AtomicValue) -> Result<Ordering, DataTypeError> {
        let ordering = match (&self.value, &other.value) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Decimal(b)) => Decimal::from(*a).cmp(b),
            (Value::Decimal(a), Value::Integer(b)) => a.cmp(&Decimal::from(*b)),
            (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.to_utc().cmp(&b.to_utc()),
            (Value::DateTime(a), Value::DateTime(b)) => a.to_utc().cmp(&b.to_utc()),
            (Value::DayTimeDuration(a), Value::DayTimeDuration(b)) => a.cmp(b),
            (Value::YearMonthDuration(a), Value::YearMonthDuration(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::Ipv4(a), Value::Ipv4(b)) => a.cmp(b),
            (Value::Ipv6(a), Value::Ipv6(b)) => a.cmp(b),
            _ => {
                return Err(DataTypeError::Incomparable {
                    left: self.datatype.name(),
                    right: other.datatype.name(),
                });
            }
        };
        Ok(ordering)
    }

    /// Value-space equality; incomparable values are simply unequal.
    pub fn value_equals(&self, other: &AtomicValue) -> bool {
        matches!(self.compare_to(other), Ok(Ordering::Equal))
    }
}

impl fmt::Display for AtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.datatype.format(&self.value))
    }
}

impl From<&str> for AtomicValue {
    fn from(s: &str) -> Self {
        AtomicValue::string(s)
    }
}

impl From<String> for AtomicValue {
    fn from(s: String) -> Self {
        AtomicValue::string(s)
    }
}

impl From<i64> for AtomicValue {
    fn from(i: i64) -> Self {
        AtomicValue::integer(i)
    }
}

impl From<bool> for AtomicValue {
    fn from(b: bool) -> Self {
        AtomicValue::boolean(b)
    }
}

impl From<Decimal> for AtomicValue {
    fn from(d: Decimal) -> Self {
        AtomicValue::decimal(d)
    }
}
