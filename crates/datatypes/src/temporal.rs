use std::sync::LazyLock;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use regex::Regex;

use crate::error::DataTypeError;

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d{4,})-(\d{2})-(\d{2})(Z|[+-]\d{2}:\d{2})?$")
        .expect("BUG: invalid DATE regex literal")
});

static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d{4,})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})(?:\.(\d+))?(Z|[+-]\d{2}:\d{2})?$")
        .expect("BUG: invalid DATE_TIME regex literal")
});

static DAY_TIME_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d+))?S)?)?$")
        .expect("BUG: invalid DAY_TIME_DURATION regex literal")
});

static YEAR_MONTH_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?$")
        .expect("BUG: invalid YEAR_MONTH_DURATION regex literal")
});

/// A calendar date with an optional timezone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateValue {
    pub date: NaiveDate,
    pub offset: Option<FixedOffset>,
}

/// A date and time of day with an optional timezone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTimeValue {
    pub date_time: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl DateValue {
    pub fn new(date: NaiveDate, offset: Option<FixedOffset>) -> Self {
        Self { date, offset }
    }

    /// The instant this date starts at, normalized to UTC. A missing offset is read as UTC.
    pub fn to_utc(&self) -> NaiveDateTime {
        DateTimeValue::new(self.date.and_time(NaiveTime::default()), self.offset).to_utc()
    }
}

impl DateTimeValue {
    pub fn new(date_time: NaiveDateTime, offset: Option<FixedOffset>) -> Self {
        Self { date_time, offset }
    }

    pub fn to_utc(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => {
                self.date_time - TimeDelta::seconds(i64::from(offset.local_minus_utc()))
            }
            None => self.date_time,
        }
    }

    pub fn date(&self) -> DateValue {
        DateValue::new(self.date_time.date(), self.offset)
    }
}

pub(crate) fn parse_date(datatype: &'static str, text: &str) -> Result<DateValue, DataTypeError> {
    let caps = DATE
        .captures(text)
        .ok_or_else(|| DataTypeError::invalid(datatype, text))?;
    let date = ymd(datatype, text, &caps[1], &caps[2], &caps[3])?;
    let offset = caps
        .get(4)
        .map(|m| parse_offset(datatype, m.as_str()))
        .transpose()?;
    Ok(DateValue::new(date, offset))
}

pub(crate) fn parse_date_time(
    datatype: &'static str,
    text: &str,
) -> Result<DateTimeValue, DataTypeError> {
    let caps = DATE_TIME
        .captures(text)
        .ok_or_else(|| DataTypeError::invalid(datatype, text))?;
    let date = ymd(datatype, text, &caps[1], &caps[2], &caps[3])?;
    let hour = number::<u32>(datatype, text, &caps[4])?;
    let minute = number::<u32>(datatype, text, &caps[5])?;
    let second = number::<u32>(datatype, text, &caps[6])?;
    let nanos = caps.get(7).map(|m| fraction_nanos(m.as_str())).unwrap_or(0);

    let offset = caps
        .get(8)
        .map(|m| parse_offset(datatype, m.as_str()))
        .transpose()?;

    if hour == 24 && minute == 0 && second == 0 && nanos == 0 {
        // 24:00:00 is the first instant of the next day
        let next = date
            .succ_opt()
            .ok_or_else(|| DataTypeError::invalid(datatype, text))?;
        return Ok(DateTimeValue::new(next.and_time(NaiveTime::default()), offset));
    }
    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
        .ok_or_else(|| DataTypeError::invalid(datatype, text))?;
    Ok(DateTimeValue::new(date.and_time(time), offset))
}

pub(crate) fn parse_day_time_duration(
    datatype: &'static str,
    text: &str,
) -> Result<TimeDelta, DataTypeError> {
    let invalid = || DataTypeError::invalid(datatype, text);
    if text.ends_with('P') || text.ends_with('T') {
        return Err(invalid());
    }
    let caps = DAY_TIME_DURATION.captures(text).ok_or_else(invalid)?;

    let component = |index: usize| -> Result<i64, DataTypeError> {
        caps.get(index)
            .map(|m| number::<i64>(datatype, text, m.as_str()))
            .unwrap_or(Ok(0))
    };
    let (days, hours, minutes, secs) = (component(2)?, component(3)?, component(4)?, component(5)?);
    let seconds = days
        .checked_mul(86_400)
        .and_then(|s| s.checked_add(hours.checked_mul(3_600)?))
        .and_then(|s| s.checked_add(minutes.checked_mul(60)?))
        .and_then(|s| s.checked_add(secs))
        .ok_or_else(|| DataTypeError::OutOfRange {
            datatype,
            value: text.to_string(),
        })?;
    let nanos = caps.get(6).map(|m| fraction_nanos(m.as_str())).unwrap_or(0);

    let delta = TimeDelta::new(seconds, nanos).ok_or_else(invalid)?;
    Ok(if caps.get(1).is_some() { -delta } else { delta })
}

pub(crate) fn parse_year_month_duration(
    datatype: &'static str,
    text: &str,
) -> Result<i32, DataTypeError> {
    if text.ends_with('P') {
        return Err(DataTypeError::invalid(datatype, text));
    }
    let caps = YEAR_MONTH_DURATION
        .captures(text)
        .ok_or_else(|| DataTypeError::invalid(datatype, text))?;
    let years = caps
        .get(2)
        .map(|m| number::<i32>(datatype, text, m.as_str()))
        .unwrap_or(Ok(0))?;
    let months = caps
        .get(3)
        .map(|m| number::<i32>(datatype, text, m.as_str()))
        .unwrap_or(Ok(0))?;
    let total = years
        .checked_mul(12)
        .and_then(|y| y.checked_add(months))
        .ok_or_else(|| DataTypeError::OutOfRange {
            datatype,
            value: text.to_string(),
        })?;
    Ok(if caps.get(1).is_some() { -total } else { total })
}

pub(crate) fn format_date(value: &DateValue) -> String {
    let mut out = format_ymd(value.date);
    push_offset(&mut out, value.offset);
    out
}

pub(crate) fn format_date_time(value: &DateTimeValue) -> String {
    let dt = value.date_time;
    let mut out = format!(
        "{}T{:02}:{:02}:{:02}",
        format_ymd(dt.date()),
        dt.hour(),
        dt.minute(),
        dt.second()
    );
    push_fraction(&mut out, dt.nanosecond());
    push_offset(&mut out, value.offset);
    out
}

pub(crate) fn format_day_time_duration(delta: TimeDelta) -> String {
    let negative = delta < TimeDelta::zero();
    let delta = if negative { -delta } else { delta };
    let total = delta.num_seconds();
    let nanos = delta.subsec_nanos().unsigned_abs();

    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::from(if negative { "-P" } else { "P" });
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 || nanos > 0 {
            out.push_str(&seconds.to_string());
            push_fraction(&mut out, nanos);
            out.push('S');
        }
    }
    if days == 0 && total == 0 && nanos == 0 {
        return "PT0S".to_string();
    }
    out
}

pub(crate) fn format_year_month_duration(months: i32) -> String {
    if months == 0 {
        return "P0M".to_string();
    }
    let sign = if months < 0 { "-" } else { "" };
    let abs = months.unsigned_abs();
    let mut out = format!("{sign}P");
    if abs / 12 > 0 {
        out.push_str(&format!("{}Y", abs / 12));
    }
    if abs % 12 > 0 {
        out.push_str(&format!("{}M", abs % 12));
    }
    out
}

pub(crate) fn format_offset(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "Z".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 3_600, (abs % 3_600) / 60)
}

fn push_offset(out: &mut String, offset: Option<FixedOffset>) {
    if let Some(offset) = offset {
        out.push_str(&format_offset(offset));
    }
}

fn push_fraction(out: &mut String, nanos: u32) {
    if nanos > 0 {
        let digits = format!("{nanos:09}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
}

fn format_ymd(date: NaiveDate) -> String {
    if date.year() < 0 {
        format!("-{:04}-{:02}-{:02}", -date.year(), date.month(), date.day())
    } else {
        format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
    }
}

fn ymd(
    datatype: &'static str,
    text: &str,
    year: &str,
    month: &str,
    day: &str,
) -> Result<NaiveDate, DataTypeError> {
    let year = number::<i32>(datatype, text, year)?;
    let month = number::<u32>(datatype, text, month)?;
    let day = number::<u32>(datatype, text, day)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| DataTypeError::invalid(datatype, text))
}

fn parse_offset(datatype: &'static str, text: &str) -> Result<FixedOffset, DataTypeError> {
    if text == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(|| DataTypeError::invalid(datatype, text));
    }
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let hours = number::<i32>(datatype, text, &text[1..3])?;
    let minutes = number::<i32>(datatype, text, &text[4..6])?;
    if hours > 14 || minutes > 59 || (hours == 14 && minutes > 0) {
        return Err(DataTypeError::invalid(datatype, text));
    }
    FixedOffset::east_opt(sign * (hours * 3_600 + minutes * 60))
        .ok_or_else(|| DataTypeError::invalid(datatype, text))
}

fn fraction_nanos(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

fn number<T: std::str::FromStr>(
    datatype: &'static str,
    text: &str,
    digits: &str,
) -> Result<T, DataTypeError> {
    digits
        .parse()
        .map_err(|_| DataTypeError::invalid(datatype, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_round_trip() {
        let date = parse_date("date", "2024-02-29Z").unwrap();
        assert_eq!(format_date(&date), "2024-02-29Z");
        assert!(parse_date("date", "2023-02-29").is_err());
    }

    #[test]
    fn test_date_time_fraction_and_offset() {
        let dt = parse_date_time("date-time", "2020-01-01T10:30:00.250-05:00").unwrap();
        assert_eq!(format_date_time(&dt), "2020-01-01T10:30:00.25-05:00");
        assert_eq!(dt.to_utc().to_string(), "2020-01-01 15:30:00.250");
    }

    #[test]
    fn test_end_of_day_rolls_over() {
        let dt = parse_date_time("date-time", "2020-12-31T24:00:00").unwrap();
        assert_eq!(format_date_time(&dt), "2021-01-01T00:00:00");
    }

    #[test]
    fn test_day_time_duration() {
        let d = parse_day_time_duration("day-time-duration", "P1DT2H30M").unwrap();
        assert_eq!(d.num_seconds(), 86_400 + 2 * 3_600 + 30 * 60);
        assert_eq!(format_day_time_duration(d), "P1DT2H30M");
        assert_eq!(format_day_time_duration(TimeDelta::zero()), "PT0S");
        assert!(parse_day_time_duration("day-time-duration", "PT").is_err());
        assert!(parse_day_time_duration("day-time-duration", "P").is_err());
    }

    #[test]
    fn test_negative_fractional_duration() {
        let d = parse_day_time_duration("day-time-duration", "-PT1.5S").unwrap();
        assert_eq!(format_day_time_duration(d), "-PT1.5S");
    }

    #[test]
    fn test_year_month_duration() {
        assert_eq!(parse_year_month_duration("ym", "P1Y2M").unwrap(), 14);
        assert_eq!(parse_year_month_duration("ym", "-P3M").unwrap(), -3);
        assert_eq!(format_year_month_duration(14), "P1Y2M");
        assert_eq!(format_year_month_duration(0), "P0M");
    }
}
