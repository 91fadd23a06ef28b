use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::fmt::Display;

/// Canonical rendering of datetimes, also used for length measurement and value comparison.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A typed cell value as read from a sheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl CellValue {
    /// Builds a numeric value, narrowing integral floats inside the i64 range to `Int`.
    pub fn number(value: f64) -> CellValue {
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            CellValue::Int(value as i64)
        } else {
            CellValue::Float(value)
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Returns the canonical string form, `None` for missing values.
    pub fn render(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            value => Some(value.to_string()),
        }
    }

    /// Returns the integer payload of integral values.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(value) => write!(f, "{}", value),
            CellValue::Int(value) => write!(f, "{}", value),
            CellValue::Float(value) => write!(f, "{}", value),
            CellValue::DateTime(value) => write!(f, "{}", value.format(DATETIME_FORMAT)),
            CellValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
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

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// How a numeric cell is displayed, derived from its number format.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum NumberStyle {
    #[default]
    General,
    Date,
    DateTime,
    Time,
}

impl NumberStyle {
    /// Classifies built-in Excel number format IDs.
    pub(crate) fn parse_builtin_number_format_id(id: &str) -> Option<Self> {
        match id {
            "22" => Some(Self::DateTime),
            "14" | "15" | "16" | "17" => Some(Self::Date),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::Time),
            _ => None,
        }
    }

    /// Classifies custom number format codes by scanning for date and time tokens
    /// outside literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_bracket = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::DateTime,
            (true, false) => Self::Date,
            (false, true) => Self::Time,
            (false, false) => Self::General,
        }
    }

    /// Converts a raw numeric cell under this style.
    pub(crate) fn to_value(self, number: f64, is_1904: bool) -> CellValue {
        match self {
            NumberStyle::General => CellValue::number(number),
            NumberStyle::Date | NumberStyle::DateTime => serial_to_datetime(number, is_1904)
                .map(CellValue::DateTime)
                .unwrap_or_else(|| CellValue::number(number)),
            NumberStyle::Time => CellValue::Text(serial_to_time_string(number)),
        }
    }
}

/// Converts an Excel serial date to a datetime.
/// Serials below 60 in the 1900 system are shifted one day for the Lotus 1-2-3 leap year bug.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let milliseconds = (serial.fract() * 86_400_000f64).round() as i64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::days(days + offset))?
        .checked_add_signed(Duration::milliseconds(milliseconds))
}

/// Converts the fractional day part of a serial to `HH:MM:SS`.
pub(crate) fn serial_to_time_string(serial: f64) -> String {
    let mut seconds = (serial.fract().abs() * 86_400f64).round() as i64;
    // a fraction that rounds up to a full day wraps to midnight
    seconds %= 86_400;
    let hours = seconds / 3_600;
    seconds %= 3_600;
    let minutes = seconds / 60;
    seconds %= 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn numbers_narrow_to_integers() {
        assert_eq!(CellValue::number(3.0), CellValue::Int(3));
        assert_eq!(CellValue::number(-128.0), CellValue::Int(-128));
        assert_eq!(CellValue::number(2.5), CellValue::Float(2.5));
        assert_eq!(CellValue::number(1e300), CellValue::Float(1e300));
    }

    #[test]
    fn render_uses_canonical_forms() {
        assert_eq!(CellValue::Null.render(), None);
        assert_eq!(CellValue::Bool(true).render().as_deref(), Some("true"));
        assert_eq!(CellValue::Int(-42).render().as_deref(), Some("-42"));
        assert_eq!(CellValue::Float(0.1).render().as_deref(), Some("0.1"));
        assert_eq!(
            CellValue::DateTime(datetime("2024-01-05 08:30:00")).render().as_deref(),
            Some("2024-01-05 08:30:00")
        );
        assert_eq!(CellValue::from("abc").render().as_deref(), Some("abc"));
        assert_eq!(CellValue::from(None::<i64>), CellValue::Null);
    }

    #[test]
    fn builtin_formats() {
        assert_eq!(NumberStyle::parse_builtin_number_format_id("14"), Some(NumberStyle::Date));
        assert_eq!(NumberStyle::parse_builtin_number_format_id("22"), Some(NumberStyle::DateTime));
        assert_eq!(NumberStyle::parse_builtin_number_format_id("46"), Some(NumberStyle::Time));
        assert_eq!(NumberStyle::parse_builtin_number_format_id("0"), None);
    }

    #[test]
    fn custom_formats() {
        assert_eq!(NumberStyle::parse_custom_number_format("yyyy-mm-dd"), NumberStyle::Date);
        assert_eq!(NumberStyle::parse_custom_number_format("yyyy-mm-dd hh:mm:ss"), NumberStyle::DateTime);
        assert_eq!(NumberStyle::parse_custom_number_format("hh:mm"), NumberStyle::Time);
        assert_eq!(NumberStyle::parse_custom_number_format("#,##0.00"), NumberStyle::General);
        assert_eq!(NumberStyle::parse_custom_number_format("[Red]0.00"), NumberStyle::General);
        assert_eq!(NumberStyle::parse_custom_number_format("0.00\" days\""), NumberStyle::General);
        assert_eq!(NumberStyle::parse_custom_number_format("0\\d"), NumberStyle::General);
    }

    #[test]
    fn serial_dates_in_both_systems() {
        assert_eq!(serial_to_datetime(45292.0, false), Some(datetime("2024-01-01 00:00:00")));
        assert_eq!(serial_to_datetime(43830.0, true), Some(datetime("2024-01-01 00:00:00")));
        assert_eq!(serial_to_datetime(1.0, false), Some(datetime("1900-01-01 00:00:00")));
        assert_eq!(serial_to_datetime(61.0, false), Some(datetime("1900-03-01 00:00:00")));
        assert_eq!(serial_to_datetime(45292.75, false), Some(datetime("2024-01-01 18:00:00")));
        assert_eq!(serial_to_datetime(-1.0, false), None);
    }

    #[test]
    fn serial_times() {
        assert_eq!(serial_to_time_string(0.5), "12:00:00");
        assert_eq!(serial_to_time_string(0.75), "18:00:00");
        assert_eq!(serial_to_time_string(45292.25), "06:00:00");
        assert_eq!(NumberStyle::Time.to_value(0.5, false), CellValue::Text("12:00:00".to_owned()));
    }
}
