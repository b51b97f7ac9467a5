//! Default conversions between cell values and Rust field types.
//!
//! Record types use these from their [`crate::record::TableRecord`] hooks; any
//! other conversion can be plugged in there instead.
use crate::grid::cell::datetime_to_serial;
use crate::grid::cell::serial_to_datetime;
use crate::grid::CellValue;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use iso8601_duration::Duration as IsoDuration;
use thiserror::Error;

/// Errors raised while converting a cell value to a field type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("cannot convert '{value}' to {target}")]
    Mismatch { value: String, target: &'static str },

    #[error("value required for {target}, cell is empty")]
    Missing { target: &'static str },
}

fn mismatch(value: &CellValue, target: &'static str) -> ConvertError {
    ConvertError::Mismatch {
        value: value.to_string(),
        target,
    }
}

/// Reads a field value out of a cell.
pub trait FromCell: Sized {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError>;
}

/// Turns a field value into a cell value.
pub trait IntoCell {
    fn into_cell(&self) -> CellValue;
}

impl FromCell for String {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        match value {
            CellValue::Error(_) => Err(mismatch(value, "string")),
            _ => Ok(value.to_string()),
        }
    }
}

impl FromCell for i64 {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        match value {
            CellValue::Number(number) if number.fract() == 0.0 => Ok(*number as i64),
            CellValue::Text(text) => text.trim().parse().map_err(|_| mismatch(value, "integer")),
            CellValue::Boolean(flag) => Ok(*flag as i64),
            CellValue::Empty => Err(ConvertError::Missing { target: "integer" }),
            _ => Err(mismatch(value, "integer")),
        }
    }
}

impl FromCell for f64 {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        match value {
            CellValue::Number(number) => Ok(*number),
            CellValue::Text(text) => text.trim().parse().map_err(|_| mismatch(value, "double")),
            CellValue::DateTime(datetime) => Ok(datetime_to_serial(datetime)),
            CellValue::Empty => Err(ConvertError::Missing { target: "double" }),
            _ => Err(mismatch(value, "double")),
        }
    }
}

impl FromCell for bool {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        match value {
            CellValue::Boolean(flag) => Ok(*flag),
            CellValue::Number(number) => Ok(*number != 0.0),
            CellValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(mismatch(value, "boolean")),
            },
            CellValue::Empty => Err(ConvertError::Missing { target: "boolean" }),
            _ => Err(mismatch(value, "boolean")),
        }
    }
}

impl FromCell for NaiveDateTime {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        match value {
            CellValue::DateTime(datetime) => Ok(*datetime),
            CellValue::Number(serial) => serial_to_datetime(*serial).ok_or_else(|| mismatch(value, "datetime")),
            CellValue::Text(text) => {
                let text = text.trim();
                if text.contains('T') {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                } else if text.contains(' ') {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                } else {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|date| date.and_time(NaiveTime::MIN))
                }
                .map_err(|_| mismatch(value, "datetime"))
            }
            CellValue::Empty => Err(ConvertError::Missing { target: "datetime" }),
            _ => Err(mismatch(value, "datetime")),
        }
    }
}

impl FromCell for NaiveDate {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        NaiveDateTime::from_cell(value)
            .map(|datetime| datetime.date())
            .map_err(|error| match error {
                ConvertError::Mismatch { value, .. } => ConvertError::Mismatch { value, target: "date" },
                ConvertError::Missing { .. } => ConvertError::Missing { target: "date" },
            })
    }
}

impl FromCell for Duration {
    /// Numbers are fractions of a day, text is an ISO 8601 duration such as `PT1H30M`.
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        match value {
            CellValue::Number(days) => Ok(Duration::microseconds((days * 86_400_000_000f64).round() as i64)),
            CellValue::Text(text) => {
                let duration = text
                    .trim()
                    .parse::<IsoDuration>()
                    .map_err(|_| mismatch(value, "duration"))?;
                let day = duration.day as i64;
                let hour = duration.hour as i64;
                let minute = duration.minute as i64;
                let second = duration.second as f64;
                Ok(Duration::days(day)
                    + Duration::hours(hour)
                    + Duration::minutes(minute)
                    + Duration::microseconds((second * 1_000_000f64).round() as i64))
            }
            CellValue::Empty => Err(ConvertError::Missing { target: "duration" }),
            _ => Err(mismatch(value, "duration")),
        }
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(value: &CellValue) -> Result<Self, ConvertError> {
        if value.is_blank() {
            Ok(None)
        } else {
            T::from_cell(value).map(Some)
        }
    }
}

impl IntoCell for String {
    fn into_cell(&self) -> CellValue {
        CellValue::Text(self.to_owned())
    }
}

impl IntoCell for &str {
    fn into_cell(&self) -> CellValue {
        CellValue::Text((*self).to_owned())
    }
}

impl IntoCell for i64 {
    fn into_cell(&self) -> CellValue {
        CellValue::Number(*self as f64)
    }
}

impl IntoCell for f64 {
    fn into_cell(&self) -> CellValue {
        CellValue::Number(*self)
    }
}

impl IntoCell for bool {
    fn into_cell(&self) -> CellValue {
        CellValue::Boolean(*self)
    }
}

impl IntoCell for NaiveDateTime {
    fn into_cell(&self) -> CellValue {
        CellValue::DateTime(*self)
    }
}

impl IntoCell for NaiveDate {
    fn into_cell(&self) -> CellValue {
        CellValue::DateTime(self.and_time(NaiveTime::MIN))
    }
}

impl IntoCell for Duration {
    fn into_cell(&self) -> CellValue {
        CellValue::Number(self.num_microseconds().unwrap_or(i64::MAX) as f64 / 86_400_000_000f64)
    }
}

impl<T: IntoCell> IntoCell for Option<T> {
    fn into_cell(&self) -> CellValue {
        self.as_ref().map(IntoCell::into_cell).unwrap_or_default()
    }
}
