//! Date parsing and `date-fns` style formatting.
//!
//! Parsing accepts the shapes a browser `Date` understands for query API
//! payloads: ISO 8601 / RFC 3339, RFC 2822, US `M/d/yyyy`, `yyyy/MM/dd`, and
//! epoch milliseconds for JSON numbers. Values without an offset are read as
//! UTC so that rendering never depends on the machine running it.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde_json::Value;

use crate::pattern::{PatternError, PatternLexer, PatternToken};

/// Pattern used when a caller asks for a date without naming a format.
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd hh:mm:ss";

#[derive(Debug, thiserror::Error)]
pub enum DateError {
    #[error("Invalid time value: {0}")]
    InvalidValue(String),
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),
    #[error("Unsupported format token `{0}`")]
    UnsupportedToken(String),
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Parse a JSON attribute value into an instant.
pub fn parse_date(value: &Value) -> Result<DateTime<Utc>, DateError> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => {
            let millis = n
                .as_f64()
                .filter(|f| f.is_finite())
                .ok_or_else(|| DateError::InvalidValue(n.to_string()))?;
            DateTime::from_timestamp_millis(millis.trunc() as i64)
                .ok_or_else(|| DateError::InvalidValue(n.to_string()))
        }
        other => Err(DateError::InvalidValue(other.to_string())),
    }
}

pub fn parse_date_str(input: &str) -> Result<DateTime<Utc>, DateError> {
    let s = input.trim();
    let invalid = || DateError::InvalidValue(input.to_string());
    if s.is_empty() {
        return Err(invalid());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Some(dt) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Ok(dt.and_utc());
    }
    if let Some(date) = NAIVE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()).ok_or_else(invalid);
    }

    // Reduced ISO precision: `yyyy` and `yyyy-MM`
    let bytes = s.as_bytes();
    let is_year = |b: &[u8]| b.len() == 4 && b.iter().all(u8::is_ascii_digit);
    let date = match bytes.len() {
        4 if is_year(bytes) => NaiveDate::parse_from_str(&format!("{s}-01-01"), "%Y-%m-%d").ok(),
        7 if is_year(&bytes[..4]) && bytes[4] == b'-' => {
            NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()
        }
        _ => None,
    };
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(invalid)
}

/// Format an instant with a `date-fns` pattern (en-US locale, UTC).
pub fn format_date(dt: &DateTime<Utc>, pattern: &str) -> Result<String, DateError> {
    let tokens = PatternLexer::new(pattern).tokenize()?;
    let mut out = String::new();
    let mut iter = tokens.iter().peekable();
    while let Some(tok) = iter.next() {
        match tok {
            PatternToken::Literal(s) => out.push_str(s),
            PatternToken::Field {
                letter,
                width,
                ordinal,
            } => {
                out.push_str(&format_field(dt, *letter, *width, *ordinal)?);
                // `Pp` runs join date and time the way the locale does
                if *letter == 'P'
                    && matches!(iter.peek(), Some(PatternToken::Field { letter: 'p', .. }))
                {
                    out.push_str(if *width >= 3 { " at " } else { ", " });
                }
            }
        }
    }
    Ok(out)
}

/// Parse then format; the single entry point used by cell rendering.
pub fn format_value(value: &Value, pattern: &str) -> Result<String, DateError> {
    let dt = parse_date(value)?;
    format_date(&dt, pattern)
}

fn format_field(
    dt: &DateTime<Utc>,
    letter: char,
    width: usize,
    ordinal: bool,
) -> Result<String, DateError> {
    let number = |n: i64| {
        if ordinal {
            with_ordinal(n)
        } else {
            pad(n, width)
        }
    };
    let hour = dt.hour() as i64;
    let date = dt.date_naive();

    let s = match letter {
        'G' => match width {
            1..=3 => String::from(if dt.year() > 0 { "AD" } else { "BC" }),
            4 => String::from(if dt.year() > 0 { "Anno Domini" } else { "Before Christ" }),
            _ => String::from(if dt.year() > 0 { "A" } else { "B" }),
        },
        'y' => {
            let year = dt.year() as i64;
            match (width, ordinal) {
                (_, true) => with_ordinal(year),
                (2, _) => pad(year.rem_euclid(100), 2),
                _ => pad(year, width),
            }
        }
        'u' => pad(dt.year() as i64, width),
        'Y' => {
            let (week_year, _) = local_week(date).ok_or_else(|| invalid_instant(dt))?;
            number(week_year as i64)
        }
        'R' => pad(dt.iso_week().year() as i64, width),
        'Q' | 'q' => {
            let quarter = (dt.month0() / 3 + 1) as i64;
            match width {
                1 | 2 => number(quarter),
                3 => format!("Q{quarter}"),
                _ => format!("{} quarter", with_ordinal(quarter)),
            }
        }
        'M' | 'L' => {
            let name = MONTHS[dt.month0() as usize];
            match width {
                1 | 2 => number(dt.month() as i64),
                3 => name[..3].to_string(),
                4 => name.to_string(),
                _ => name[..1].to_string(),
            }
        }
        'w' => {
            let (_, week) = local_week(date).ok_or_else(|| invalid_instant(dt))?;
            number(week as i64)
        }
        'I' => number(dt.iso_week().week() as i64),
        'd' => number(dt.day() as i64),
        'D' => number(dt.ordinal() as i64),
        'E' => weekday_name(dt, width.max(3)),
        'i' => match width {
            1 | 2 => number(dt.weekday().number_from_monday() as i64),
            _ => weekday_name(dt, width),
        },
        'e' | 'c' => match width {
            1 | 2 => number(dt.weekday().number_from_sunday() as i64),
            _ => weekday_name(dt, width),
        },
        'a' => {
            let pm = hour >= 12;
            match width {
                1 | 2 => String::from(if pm { "PM" } else { "AM" }),
                3 => String::from(if pm { "pm" } else { "am" }),
                4 => String::from(if pm { "p.m." } else { "a.m." }),
                _ => String::from(if pm { "p" } else { "a" }),
            }
        }
        'b' => {
            let (abbreviated, wide, narrow) = match hour {
                12 => ("noon", "noon", "n"),
                0 => ("midnight", "midnight", "mi"),
                h if h > 12 => ("PM", "p.m.", "p"),
                _ => ("AM", "a.m.", "a"),
            };
            match width {
                1 | 2 => abbreviated.to_string(),
                3 => abbreviated.to_lowercase(),
                4 => wide.to_string(),
                _ => narrow.to_string(),
            }
        }
        'B' => String::from(match hour {
            17.. => "in the evening",
            12.. => "in the afternoon",
            4.. => "in the morning",
            _ => "at night",
        }),
        'H' => number(hour),
        'h' => number(dt.hour12().1 as i64),
        'K' => number(hour % 12),
        'k' => number(if hour == 0 { 24 } else { hour }),
        'm' => number(dt.minute() as i64),
        's' => number(dt.second() as i64),
        'S' => {
            let digits = format!("{:09}", dt.nanosecond() % 1_000_000_000);
            let mut fraction: String = digits.chars().take(width.min(9)).collect();
            fraction.extend(std::iter::repeat_n('0', width.saturating_sub(9)));
            fraction
        }
        'X' => "Z".to_string(),
        'x' => match width {
            1 => "+00".to_string(),
            2 | 4 => "+0000".to_string(),
            _ => "+00:00".to_string(),
        },
        'O' | 'z' => match width {
            1..=3 => "GMT+0".to_string(),
            _ => "GMT+00:00".to_string(),
        },
        't' => dt.timestamp().to_string(),
        'T' => dt.timestamp_millis().to_string(),
        'P' => {
            let long = match width {
                1 => "MM/dd/yyyy",
                2 => "MMM d, y",
                3 => "MMMM do, y",
                _ => "EEEE, MMMM do, y",
            };
            format_date(dt, long)?
        }
        'p' => {
            let long = match width {
                1 => "h:mm a",
                2 => "h:mm:ss a",
                3 => "h:mm:ss a z",
                _ => "h:mm:ss a zzzz",
            };
            format_date(dt, long)?
        }
        _ => {
            let run: String = std::iter::repeat_n(letter, width).collect();
            return Err(DateError::UnsupportedToken(run));
        }
    };
    Ok(s)
}

fn invalid_instant(dt: &DateTime<Utc>) -> DateError {
    DateError::InvalidValue(dt.to_rfc3339())
}

/// Weekday name by token width: 3 short, 4 full, 5 initial, 6 two letters.
fn weekday_name(dt: &DateTime<Utc>, width: usize) -> String {
    let name = WEEKDAYS[dt.weekday().num_days_from_monday() as usize];
    match width {
        0..=3 => name[..3].to_string(),
        4 => name.to_string(),
        5 => name[..1].to_string(),
        _ => name[..2].to_string(),
    }
}

fn sunday_on_or_before(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(date.weekday().num_days_from_sunday() as u64))
}

/// Week-numbering year and week of the en-US calendar: weeks start on
/// Sunday and week 1 is the one containing January 1st.
fn local_week(date: NaiveDate) -> Option<(i32, u32)> {
    let year_start = |year: i32| NaiveDate::from_ymd_opt(year, 1, 1).and_then(sunday_on_or_before);
    let week_year = if date >= year_start(date.year() + 1)? {
        date.year() + 1
    } else {
        date.year()
    };
    let days = (sunday_on_or_before(date)? - year_start(week_year)?).num_days();
    Some((week_year, (days / 7 + 1) as u32))
}

fn pad(n: i64, width: usize) -> String {
    if n < 0 {
        format!("-{:0width$}", -n, width = width)
    } else {
        format!("{:0width$}", n, width = width)
    }
}

fn with_ordinal(n: i64) -> String {
    let rem100 = n.rem_euclid(100);
    let suffix = match (rem100, n.rem_euclid(10)) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[rstest]
    #[case("2024-01-01", "2024-01-01T00:00:00Z")]
    #[case("2024-01-01T10:30:00Z", "2024-01-01T10:30:00Z")]
    #[case("2024-01-01T10:30:00+02:00", "2024-01-01T08:30:00Z")]
    #[case("2024-01-01T10:30:00.250", "2024-01-01T10:30:00.250Z")]
    #[case("2024-01-01 10:30", "2024-01-01T10:30:00Z")]
    #[case("1/2/2024", "2024-01-02T00:00:00Z")]
    #[case("2024/03/05", "2024-03-05T00:00:00Z")]
    #[case("Mon, 15 Jan 2024 10:00:00 GMT", "2024-01-15T10:00:00Z")]
    #[case("2024-07", "2024-07-01T00:00:00Z")]
    #[case("2024", "2024-01-01T00:00:00Z")]
    fn test_parse_accepted_shapes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse_date_str(input).unwrap(), utc(expected));
    }

    #[rstest]
    #[case("not-a-date")]
    #[case("")]
    #[case("2024-13-01")]
    #[case("apple")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(parse_date_str(input).is_err());
    }

    #[test]
    fn test_parse_epoch_millis() {
        let dt = parse_date(&json!(86_400_000)).unwrap();
        assert_eq!(dt, utc("1970-01-02T00:00:00Z"));
        assert!(parse_date(&json!(true)).is_err());
        assert!(parse_date(&json!(null)).is_err());
    }

    #[test]
    fn test_format_default_pattern() {
        let dt = utc("2024-03-05T14:07:09Z");
        assert_eq!(format_date(&dt, DEFAULT_DATE_FORMAT).unwrap(), "2024-03-05 02:07:09");
    }

    #[rstest]
    #[case("dd/MM/yyyy", "05/03/2024")]
    #[case("d MMM yy", "5 Mar 24")]
    #[case("EEEE, MMMM do", "Tuesday, March 5th")]
    #[case("h:mm a", "2:07 PM")]
    #[case("HH:mm:ss.SSS", "14:07:09.120")]
    #[case("'Q'Q yyyy", "Q1 2024")]
    #[case("yyyy-MM-dd'T'HH:mmXXX", "2024-03-05T14:07Z")]
    #[case("uu", "2024")]
    #[case("yy", "24")]
    #[case("P", "03/05/2024")]
    #[case("PP", "Mar 5, 2024")]
    #[case("PPP", "March 5th, 2024")]
    #[case("PPPP", "Tuesday, March 5th, 2024")]
    #[case("p", "2:07 PM")]
    #[case("pp", "2:07:09 PM")]
    #[case("ppp", "2:07:09 PM GMT+0")]
    #[case("pppp", "2:07:09 PM GMT+00:00")]
    #[case("Pp", "03/05/2024, 2:07 PM")]
    #[case("PPpp", "Mar 5, 2024, 2:07:09 PM")]
    #[case("PPPp", "March 5th, 2024 at 2:07 PM")]
    #[case("'week' w 'of' Y", "week 10 of 2024")]
    #[case("wo", "10th")]
    #[case("RRRR-'W'II-i", "2024-W10-2")]
    #[case("iii iiii iiiii iiiiii", "Tue Tuesday T Tu")]
    #[case("e ee eo eee cccc", "3 03 3rd Tue Tuesday")]
    #[case("b bbb bbbb", "PM pm p.m.")]
    #[case("B", "in the afternoon")]
    #[case("O zzzz", "GMT+0 GMT+00:00")]
    fn test_format_patterns(#[case] pattern: &str, #[case] expected: &str) {
        let dt = utc("2024-03-05T14:07:09.120Z");
        assert_eq!(format_date(&dt, pattern).unwrap(), expected);
    }

    #[test]
    fn test_format_rejects_bad_pattern() {
        let dt = utc("2024-03-05T14:07:09Z");
        assert!(matches!(format_date(&dt, "yyyy-MM-DD"), Err(DateError::Pattern(_))));
        assert!(matches!(format_date(&dt, "hh A"), Err(DateError::Pattern(_))));
    }

    #[rstest]
    #[case("2024-03-05T12:00:00Z", "noon in the afternoon")]
    #[case("2024-03-05T00:30:00Z", "midnight at night")]
    #[case("2024-03-05T09:00:00Z", "AM in the morning")]
    #[case("2024-03-05T19:00:00Z", "PM in the evening")]
    fn test_day_periods(#[case] instant: &str, #[case] expected: &str) {
        assert_eq!(format_date(&utc(instant), "b B").unwrap(), expected);
    }

    #[rstest]
    // Sunday Dec 29th 2024 starts the week holding Jan 1st 2025
    #[case("2024-12-29T00:00:00Z", "1 2025")]
    #[case("2024-12-28T00:00:00Z", "52 2024")]
    #[case("2023-01-01T00:00:00Z", "1 2023")]
    #[case("2022-12-31T00:00:00Z", "53 2022")]
    fn test_local_week_numbering(#[case] instant: &str, #[case] expected: &str) {
        assert_eq!(format_date(&utc(instant), "w Y").unwrap(), expected);
    }

    #[test]
    fn test_full_year_padding_only_truncates_y() {
        let dt = utc("0905-06-01T00:00:00Z");
        assert_eq!(format_date(&dt, "uu yy uuuuu").unwrap(), "905 05 00905");
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(with_ordinal(1), "1st");
        assert_eq!(with_ordinal(2), "2nd");
        assert_eq!(with_ordinal(3), "3rd");
        assert_eq!(with_ordinal(11), "11th");
        assert_eq!(with_ordinal(22), "22nd");
        assert_eq!(with_ordinal(113), "113th");
    }

    #[test]
    fn test_format_value_falls_through_errors() {
        assert_eq!(format_value(&json!("2023-06-15"), "yyyy").unwrap(), "2023");
        assert!(format_value(&json!("not-a-date"), "yyyy").is_err());
    }
}
