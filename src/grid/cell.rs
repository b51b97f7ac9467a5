use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;

/// Raw value held by a grid cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    /// Plain or shared string
    Text(String),
    /// Numeric value, dates excluded
    Number(f64),
    /// Boolean value (true/false)
    Boolean(bool),
    /// Date/time value already decoded from its serial number
    DateTime(NaiveDateTime),
    /// Error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    /// Returns true if the cell holds nothing or only whitespace text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Boolean(value) => write!(f, "{}", if *value { "true" } else { "false" }),
            CellValue::DateTime(datetime) if datetime.time() == NaiveTime::MIN => {
                write!(f, "{}", datetime.format("%Y-%m-%d"))
            }
            CellValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Error(code) => write!(f, "{code}"),
        }
    }
}

/// Formatting attached to a cell. Only what the table engine inspects is modeled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStyle {
    /// Opaque style index of the backing workbook
    pub style_id: usize,
    /// Whether a border is rendered below the cell
    pub bottom_border: bool,
}

fn epoch_1900() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal")
}

/// Converts a 1900-system serial number to a date/time.
/// Handles the Lotus 1-2-3 leap year bug for serials before 1900-03-01.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let date = epoch_1900() + Duration::days(days + if days < 60 { 1 } else { 0 });
    let microseconds = (serial.fract() * 86_400_000_000f64).round() as i64;
    Some(date.and_time(NaiveTime::MIN) + Duration::microseconds(microseconds))
}

/// Converts a date/time to its 1900-system serial number.
pub fn datetime_to_serial(datetime: &NaiveDateTime) -> f64 {
    let mut days = (datetime.date() - epoch_1900()).num_days();
    if days < 61 {
        days -= 1;
    }
    let time = datetime.time();
    let seconds = time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 / 1e9;
    days as f64 + seconds / 86_400f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn display_values() {
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::Number(42.0).to_string(), "42");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Boolean(true).to_string(), "true");
        assert_eq!(CellValue::DateTime(date(2024, 4, 1)).to_string(), "2024-04-01");
        assert_eq!(
            CellValue::DateTime(date(2024, 4, 1) + Duration::hours(13)).to_string(),
            "2024-04-01 13:00:00"
        );
    }

    #[test]
    fn blank_cells() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::text(" \t").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn serial_dates() {
        assert_eq!(serial_to_datetime(1.0), Some(date(1900, 1, 1)));
        assert_eq!(serial_to_datetime(59.0), Some(date(1900, 2, 28)));
        assert_eq!(serial_to_datetime(61.0), Some(date(1900, 3, 1)));
        assert_eq!(serial_to_datetime(45_383.0), Some(date(2024, 4, 1)));
        assert_eq!(serial_to_datetime(45_383.5), Some(date(2024, 4, 1) + Duration::hours(12)));
        assert_eq!(serial_to_datetime(-1.0), None);

        assert_eq!(datetime_to_serial(&date(1900, 1, 1)), 1.0);
        assert_eq!(datetime_to_serial(&date(1900, 3, 1)), 61.0);
        assert_eq!(datetime_to_serial(&(date(2024, 4, 1) + Duration::hours(6))), 45_383.25);
    }
}
