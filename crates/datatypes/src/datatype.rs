use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DataTypeError;
use crate::temporal;
use crate::value::{AtomicValue, Value};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\p{L}|_)(\p{L}|\p{N}|[.\-_])*$").expect("BUG: invalid TOKEN regex literal")
});

static URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:\S*$").expect("BUG: invalid URI regex literal")
});

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[45][0-9A-Fa-f]{3}-[89ABab][0-9A-Fa-f]{3}-[0-9A-Fa-f]{12}$")
        .expect("BUG: invalid UUID regex literal")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+$").expect("BUG: invalid EMAIL regex literal")
});

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("BUG: invalid INTEGER regex literal"));

static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("BUG: invalid DECIMAL regex literal")
});

/// Raw JSON shape used by external serializers for a datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Boolean,
}

/// A built-in leaf datatype.
///
/// The variant doubles as the adapter for its values: [`DataType::parse`]
/// validates lexical text, [`DataType::format`] produces canonical text, and
/// [`DataType::base`] exposes the derivation hierarchy used for instance tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    String,
    Token,
    #[serde(rename = "ncname")]
    NcName,
    Uri,
    UriReference,
    Uuid,
    EmailAddress,
    Hostname,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    Decimal,
    Boolean,
    Date,
    DateWithTimezone,
    DateTime,
    DateTimeWithTimezone,
    DayTimeDuration,
    YearMonthDuration,
    Base64,
    IpV4Address,
    IpV6Address,
    MarkupLine,
    MarkupMultiline,
}

impl DataType {
    pub const ALL: [DataType; 24] = [
        DataType::String,
        DataType::Token,
        DataType::NcName,
        DataType::Uri,
        DataType::UriReference,
        DataType::Uuid,
        DataType::EmailAddress,
        DataType::Hostname,
        DataType::Integer,
        DataType::NonNegativeInteger,
        DataType::PositiveInteger,
        DataType::Decimal,
        DataType::Boolean,
        DataType::Date,
        DataType::DateWithTimezone,
        DataType::DateTime,
        DataType::DateTimeWithTimezone,
        DataType::DayTimeDuration,
        DataType::YearMonthDuration,
        DataType::Base64,
        DataType::IpV4Address,
        DataType::IpV6Address,
        DataType::MarkupLine,
        DataType::MarkupMultiline,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Token => "token",
            DataType::NcName => "ncname",
            DataType::Uri => "uri",
            DataType::UriReference => "uri-reference",
            DataType::Uuid => "uuid",
            DataType::EmailAddress => "email-address",
            DataType::Hostname => "hostname",
            DataType::Integer => "integer",
            DataType::NonNegativeInteger => "non-negative-integer",
            DataType::PositiveInteger => "positive-integer",
            DataType::Decimal => "decimal",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateWithTimezone => "date-with-timezone",
            DataType::DateTime => "date-time",
            DataType::DateTimeWithTimezone => "date-time-with-timezone",
            DataType::DayTimeDuration => "day-time-duration",
            DataType::YearMonthDuration => "year-month-duration",
            DataType::Base64 => "base64",
            DataType::IpV4Address => "ip-v4-address",
            DataType::IpV6Address => "ip-v6-address",
            DataType::MarkupLine => "markup-line",
            DataType::MarkupMultiline => "markup-multiline",
        }
    }

    pub fn from_name(name: &str) -> Option<DataType> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// The datatype this one is derived from by restriction, if any.
    pub fn base(self) -> Option<DataType> {
        match self {
            DataType::Token => Some(DataType::String),
            DataType::NcName => Some(DataType::Token),
            DataType::Uuid | DataType::EmailAddress | DataType::Hostname => {
                Some(DataType::String)
            }
            DataType::NonNegativeInteger => Some(DataType::Integer),
            DataType::PositiveInteger => Some(DataType::NonNegativeInteger),
            DataType::Integer => Some(DataType::Decimal),
            DataType::DateWithTimezone => Some(DataType::Date),
            DataType::DateTimeWithTimezone => Some(DataType::DateTime),
            _ => None,
        }
    }

    /// True when `self` is `other` or is derived from it.
    pub fn derives_from(self, other: DataType) -> bool {
        let mut current = Some(self);
        while let Some(t) = current {
            if t == other {
                return true;
            }
            current = t.base();
        }
        false
    }

    pub fn json_type(self) -> JsonType {
        match self {
            DataType::Integer
            | DataType::NonNegativeInteger
            | DataType::PositiveInteger
            | DataType::Decimal => JsonType::Number,
            DataType::Boolean => JsonType::Boolean,
            _ => JsonType::String,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.derives_from(DataType::Decimal)
    }

    /// Values of these datatypes are held as text.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            DataType::String
                | DataType::Token
                | DataType::NcName
                | DataType::Uri
                | DataType::UriReference
                | DataType::Uuid
                | DataType::EmailAddress
                | DataType::Hostname
                | DataType::MarkupLine
                | DataType::MarkupMultiline
        )
    }

    /// Parses lexical text into a value of this datatype.
    ///
    /// Leading and trailing whitespace is collapsed for every datatype except
    /// `string` and the markup types, which keep their text verbatim.
    pub fn parse(self, text: &str) -> Result<AtomicValue, DataTypeError> {
        let name = self.name();
        let trimmed = match self {
            DataType::String | DataType::MarkupLine | DataType::MarkupMultiline => text,
            _ => text.trim(),
        };
        let invalid = || DataTypeError::invalid(name, text);

        let value = match self {
            DataType::String | DataType::MarkupMultiline => Value::Text(trimmed.to_string()),
            DataType::MarkupLine => {
                if trimmed.contains('\n') {
                    return Err(invalid());
                }
                Value::Text(trimmed.to_string())
            }
            DataType::Token | DataType::NcName => {
                if !TOKEN.is_match(trimmed) {
                    return Err(invalid());
                }
                Value::Text(trimmed.to_string())
            }
            DataType::Uri => {
                if !URI.is_match(trimmed) {
                    return Err(invalid());
                }
                Value::Text(trimmed.to_string())
            }
            DataType::UriReference => {
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(invalid());
                }
                Value::Text(trimmed.to_string())
            }
            DataType::Uuid => {
                if !UUID.is_match(trimmed) {
                    return Err(invalid());
                }
                Value::Text(trimmed.to_string())
            }
            DataType::EmailAddress => {
                if !EMAIL.is_match(trimmed) {
                    return Err(invalid());
                }
                Value::Text(trimmed.to_string())
            }
            DataType::Hostname => {
                if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
                    return Err(invalid());
                }
                Value::Text(trimmed.to_string())
            }
            DataType::Integer | DataType::NonNegativeInteger | DataType::PositiveInteger => {
                if !INTEGER.is_match(trimmed) {
                    return Err(invalid());
                }
                let value = i64::from_str(trimmed).map_err(|_| DataTypeError::OutOfRange {
                    datatype: name,
                    value: trimmed.to_string(),
                })?;
                Value::Integer(value)
            }
            DataType::Decimal => {
                if !DECIMAL.is_match(trimmed) {
                    return Err(invalid());
                }
                Value::Decimal(parse_decimal(trimmed).ok_or_else(invalid)?)
            }
            DataType::Boolean => match trimmed {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            DataType::Date | DataType::DateWithTimezone => {
                Value::Date(temporal::parse_date(name, trimmed)?)
            }
            DataType::DateTime | DataType::DateTimeWithTimezone => {
                Value::DateTime(temporal::parse_date_time(name, trimmed)?)
            }
            DataType::DayTimeDuration => {
                Value::DayTimeDuration(temporal::parse_day_time_duration(name, trimmed)?)
            }
            DataType::YearMonthDuration => {
                Value::YearMonthDuration(temporal::parse_year_month_duration(name, trimmed)?)
            }
            DataType::Base64 => {
                let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
                Value::Binary(STANDARD.decode(compact).map_err(|_| invalid())?)
            }
            DataType::IpV4Address => {
                Value::Ipv4(Ipv4Addr::from_str(trimmed).map_err(|_| invalid())?)
            }
            DataType::IpV6Address => {
                Value::Ipv6(Ipv6Addr::from_str(trimmed).map_err(|_| invalid())?)
            }
        };

        AtomicValue::new(self, value)
    }

    /// Canonical lexical form of a value.
    pub fn format(self, value: &Value) -> String {
        match value {
            Value::Text(text) => text.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(date) => temporal::format_date(date),
            Value::DateTime(dt) => temporal::format_date_time(dt),
            Value::DayTimeDuration(delta) => temporal::format_day_time_duration(*delta),
            Value::YearMonthDuration(months) => temporal::format_year_month_duration(*months),
            Value::Binary(bytes) => STANDARD.encode(bytes),
            Value::Ipv4(addr) => addr.to_string(),
            Value::Ipv6(addr) => addr.to_string(),
        }
    }

    /// Checks that `value` is a legal member of this datatype's value space.
    pub(crate) fn check(self, value: &Value) -> Result<(), DataTypeError> {
        let representation = value.representation();
        let mismatch = || DataTypeError::Representation {
            datatype: self.name(),
            representation,
        };
        let out_of_range = || DataTypeError::OutOfRange {
            datatype: self.name(),
            value: self.format(value),
        };

        match (self, value) {
            (t, Value::Text(_)) if t.is_textual() => Ok(()),
            (DataType::Integer, Value::Integer(_)) => Ok(()),
            (DataType::NonNegativeInteger, Value::Integer(i)) => {
                if *i >= 0 { Ok(()) } else { Err(out_of_range()) }
            }
            (DataType::PositiveInteger, Value::Integer(i)) => {
                if *i >= 1 { Ok(()) } else { Err(out_of_range()) }
            }
            (DataType::Decimal, Value::Decimal(_)) => Ok(()),
            (DataType::Boolean, Value::Boolean(_)) => Ok(()),
            (DataType::Date, Value::Date(_)) => Ok(()),
            (DataType::DateWithTimezone, Value::Date(date)) => {
                if date.offset.is_some() {
                    Ok(())
                } else {
                    Err(DataTypeError::invalid(self.name(), self.format(value)))
                }
            }
            (DataType::DateTime, Value::DateTime(_)) => Ok(()),
            (DataType::DateTimeWithTimezone, Value::DateTime(dt)) => {
                if dt.offset.is_some() {
                    Ok(())
                } else {
                    Err(DataTypeError::invalid(self.name(), self.format(value)))
                }
            }
            (DataType::DayTimeDuration, Value::DayTimeDuration(_)) => Ok(()),
            (DataType::YearMonthDuration, Value::YearMonthDuration(_)) => Ok(()),
            (DataType::Base64, Value::Binary(_)) => Ok(()),
            (DataType::IpV4Address, Value::Ipv4(_)) => Ok(()),
            (DataType::IpV6Address, Value::Ipv6(_)) => Ok(()),
            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let (sign, digits) = match text.strip_prefix(['+', '-']) {
        Some(rest) => (&text[..1], rest),
        None => ("", text),
    };
    let mut normalized = String::with_capacity(text.len() + 2);
    if sign == "-" {
        normalized.push('-');
    }
    if digits.starts_with('.') {
        normalized.push('0');
    }
    normalized.push_str(digits);
    if digits.ends_with('.') {
        normalized.push('0');
    }
    Decimal::from_str(&normalized).ok()
}
