use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use iso8601_duration::Duration as IsoDuration;
use serde::Serialize;
use std::fmt::Display;

/// How a raw cell value found in the workbook XML has to be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean stored as "1" / "0"
    Boolean,
    /// Serial number, rendered according to its number format
    Number(NumberKind),
    /// ISO 8601 date or date/time string
    IsoDateTime,
    /// ISO 8601 duration string (ODS time cells)
    IsoDuration,
    /// Text stored inside the cell
    InlineString,
    /// Index into the shared string table
    SharedString,
    /// Error literal such as "#DIV/0!"
    Error,
}

/// Number format classes that change how a serial number is presented
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum NumberKind {
    #[default]
    Plain,
    Date,
    Time,
    DateTime,
}

impl NumberKind {
    /// Classifies built-in OOXML number format ids.
    pub(crate) fn from_builtin_id(id: u32) -> Option<Self> {
        match id {
            22 => Some(Self::DateTime),
            14..=17 => Some(Self::Date),
            18..=21 | 45..=47 => Some(Self::Time),
            _ => None,
        }
    }

    /// Scans a custom format code for date and time tokens, skipping quoted
    /// literals, escaped characters and bracketed sections such as `[Red]`.
    pub(crate) fn from_format_code(format: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_literal => is_escaped = true,

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
            (false, false) => Self::Plain,
        }
    }
}

/// A 24-bit color
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses "#RRGGBB", "RRGGBB" or OOXML's "AARRGGBB" (alpha dropped)
    pub fn parse_hex(text: &str) -> Option<Rgb> {
        let hex = text.trim().trim_start_matches('#');
        let hex = match hex.len() {
            8 => hex.get(2..)?,
            6 => hex,
            _ => return None,
        };
        let channel = |index: usize| u8::from_str_radix(hex.get(index..index + 2)?, 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Presentation flags read from the workbook
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub background: Option<Rgb>,
}

impl CellStyle {
    pub fn is_plain(&self) -> bool {
        *self == CellStyle::default()
    }
}

/// A typed cell value, as produced by the workbook readers
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Converts a raw workbook value according to its type.
    /// Values that do not parse as their declared type are kept as text.
    pub(crate) fn from_raw(kind: CellType, raw: &str, is_1904: bool) -> CellValue {
        let as_text = || CellValue::Text(raw.to_owned());
        match kind {
            CellType::Empty => CellValue::Empty,
            CellType::Boolean => CellValue::Boolean(raw.trim() == "1" || raw.trim().eq_ignore_ascii_case("true")),
            CellType::Number(number_kind) => match raw.trim().parse::<f64>() {
                Ok(serial) => CellValue::from_number(serial, number_kind, is_1904),
                Err(_) => as_text(),
            },
            CellType::IsoDateTime => from_iso_datetime(raw).unwrap_or_else(as_text),
            CellType::IsoDuration => from_iso_duration(raw).unwrap_or_else(as_text),
            CellType::InlineString | CellType::SharedString | CellType::Error => as_text(),
        }
    }

    /// Converts a stored number according to its number format class
    pub(crate) fn from_number(serial: f64, kind: NumberKind, is_1904: bool) -> CellValue {
        from_serial(serial, kind, is_1904).unwrap_or(CellValue::Number(serial))
    }
}

/// Text of a binary cell error code
pub(crate) fn error_text(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Boolean(value) => write!(f, "{value}"),
            CellValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            CellValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Time(time) => write!(f, "{}", time.format("%H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::Text(text.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        CellValue::Text(text)
    }
}

impl From<f64> for CellValue {
    fn from(number: f64) -> Self {
        CellValue::Number(number)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(date: NaiveDate) -> Self {
        CellValue::Date(date)
    }
}

/// Converts a spreadsheet serial number to a date, time or date/time value.
/// The 1900 system counts 1900-02-29 (the Lotus 1-2-3 leap year bug), so
/// serials before 60 are shifted by one day.
fn from_serial(serial: f64, kind: NumberKind, is_1904: bool) -> Option<CellValue> {
    if kind == NumberKind::Plain || !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let offset = if is_1904 {
        1462.0
    } else if serial < 60.0 {
        1.0
    } else {
        0.0
    };
    let milliseconds = ((serial + offset) * 86_400_000f64).round() as i64;
    let datetime = epoch.checked_add_signed(Duration::try_milliseconds(milliseconds)?)?;
    Some(match kind {
        NumberKind::Date => CellValue::Date(datetime.date()),
        NumberKind::Time => CellValue::Time(datetime.time()),
        _ => CellValue::DateTime(datetime),
    })
}

/// Parses "2024-03-01" or "2024-03-01T10:30:00(.fff)"
fn from_iso_datetime(value: &str) -> Option<CellValue> {
    let value = value.trim();
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(CellValue::DateTime)
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(CellValue::Date)
    }
}

/// Parses an ISO 8601 duration such as "PT10H30M00S" into a time of day
fn from_iso_duration(value: &str) -> Option<CellValue> {
    let duration = value.trim().parse::<IsoDuration>().ok()?;
    let seconds = duration.hour as f64 * 3600.0 + duration.minute as f64 * 60.0 + duration.second as f64;
    let whole = seconds.trunc() as u32;
    let nanoseconds = (seconds.fract() * 1_000_000_000f64).round() as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(whole % 86_400, nanoseconds.min(999_999_999))
        .map(CellValue::Time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn builtin_number_formats() {
        assert_eq!(NumberKind::from_builtin_id(14), Some(NumberKind::Date));
        assert_eq!(NumberKind::from_builtin_id(22), Some(NumberKind::DateTime));
        assert_eq!(NumberKind::from_builtin_id(20), Some(NumberKind::Time));
        assert_eq!(NumberKind::from_builtin_id(46), Some(NumberKind::Time));
        assert_eq!(NumberKind::from_builtin_id(0), None);
        assert_eq!(NumberKind::from_builtin_id(4), None);
    }

    #[test]
    fn custom_number_formats() {
        assert_eq!(NumberKind::from_format_code("yyyy-mm-dd"), NumberKind::Date);
        assert_eq!(NumberKind::from_format_code("yyyy-mm-dd hh:mm:ss"), NumberKind::DateTime);
        assert_eq!(NumberKind::from_format_code("hh:mm"), NumberKind::Time);
        assert_eq!(NumberKind::from_format_code("0.00"), NumberKind::Plain);
        assert_eq!(NumberKind::from_format_code("#,##0 \"days\""), NumberKind::Plain);
        assert_eq!(NumberKind::from_format_code("[Red]0.0"), NumberKind::Plain);
        assert_eq!(NumberKind::from_format_code("0\\d"), NumberKind::Plain);
    }

    #[test]
    fn serial_dates_1900() {
        let kind = CellType::Number(NumberKind::Date);
        assert_eq!(CellValue::from_raw(kind, "1", false), CellValue::Date(date(1900, 1, 1)));
        assert_eq!(CellValue::from_raw(kind, "59", false), CellValue::Date(date(1900, 2, 28)));
        assert_eq!(CellValue::from_raw(kind, "61", false), CellValue::Date(date(1900, 3, 1)));
        assert_eq!(CellValue::from_raw(kind, "45292", false), CellValue::Date(date(2024, 1, 1)));
    }

    #[test]
    fn serial_dates_1904() {
        let kind = CellType::Number(NumberKind::Date);
        assert_eq!(CellValue::from_raw(kind, "0", true), CellValue::Date(date(1904, 1, 1)));
        assert_eq!(CellValue::from_raw(kind, "43830", true), CellValue::Date(date(2024, 1, 1)));
    }

    #[test]
    fn serial_times_and_datetimes() {
        let time = CellValue::from_raw(CellType::Number(NumberKind::Time), "0.5", false);
        assert_eq!(time, CellValue::Time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));

        let datetime = CellValue::from_raw(CellType::Number(NumberKind::DateTime), "45292.75", false);
        assert_eq!(datetime, CellValue::DateTime(date(2024, 1, 1).and_hms_opt(18, 0, 0).unwrap()));
        assert_eq!(datetime.to_string(), "2024-01-01 18:00:00");
    }

    #[test]
    fn plain_numbers_and_text() {
        assert_eq!(CellValue::from_raw(CellType::Number(NumberKind::Plain), "3", false), CellValue::Number(3.0));
        assert_eq!(CellValue::from_raw(CellType::Number(NumberKind::Plain), "3", false).to_string(), "3");
        assert_eq!(CellValue::from_raw(CellType::Number(NumberKind::Plain), "2.5", false).to_string(), "2.5");
        assert_eq!(CellValue::from_raw(CellType::Number(NumberKind::Plain), "abc", false), CellValue::from("abc"));
        assert_eq!(CellValue::from_raw(CellType::Error, "#DIV/0!", false), CellValue::from("#DIV/0!"));
        assert_eq!(CellValue::from_raw(CellType::Boolean, "1", false), CellValue::Boolean(true));
        assert_eq!(CellValue::from_raw(CellType::Boolean, "0", false), CellValue::Boolean(false));
    }

    #[test]
    fn binary_numbers_and_errors() {
        assert_eq!(CellValue::from_number(45292.0, NumberKind::Date, false), CellValue::Date(date(2024, 1, 1)));
        assert_eq!(CellValue::from_number(-1.0, NumberKind::Date, false), CellValue::Number(-1.0));
        assert_eq!(CellValue::from_number(0.25, NumberKind::Plain, false), CellValue::Number(0.25));
        assert_eq!(error_text(0x07), "#DIV/0!");
        assert_eq!(error_text(0x2A), "#N/A");
        assert_eq!(error_text(0x99), "#ERROR!");
    }

    #[test]
    fn iso_values() {
        assert_eq!(CellValue::from_raw(CellType::IsoDateTime, "2024-03-01", false), CellValue::Date(date(2024, 3, 1)));
        assert_eq!(
            CellValue::from_raw(CellType::IsoDateTime, "2024-03-01T10:30:00", false),
            CellValue::DateTime(date(2024, 3, 1).and_hms_opt(10, 30, 0).unwrap())
        );
        assert_eq!(
            CellValue::from_raw(CellType::IsoDuration, "PT10H30M00S", false),
            CellValue::Time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
        );
        assert_eq!(CellValue::from_raw(CellType::IsoDateTime, "someday", false), CellValue::from("someday"));
    }

    #[test]
    fn rgb_parsing() {
        assert_eq!(Rgb::parse_hex("#FF8000"), Some(Rgb(255, 128, 0)));
        assert_eq!(Rgb::parse_hex("ffc0c0c0"), Some(Rgb(192, 192, 192)));
        assert_eq!(Rgb::parse_hex("c0c0c0"), Some(Rgb(192, 192, 192)));
        assert_eq!(Rgb::parse_hex("#fff"), None);
        assert_eq!(Rgb::parse_hex("zzzzzz"), None);
    }

    #[test]
    fn empty_values() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::from("").is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
        assert_eq!(CellValue::Empty.to_string(), "");
    }
}
