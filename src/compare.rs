//! Row ordering for column sorts.
//!
//! Rank order within one column: null, then empty string, then values. With a
//! date format, parsable dates come before unparsable ones. Otherwise numeric
//! values compare as numbers and rank before non-numeric ones, which compare
//! as case-insensitive text.

use std::cmp::Ordering;

use serde_json::Value;

use crate::column::ColumnDescriptor;
use crate::date::parse_date;
use crate::record::{Record, value_text};

/// Three-way comparison of two records under `column`.
pub fn compare_rows(a: &Record, b: &Record, column: &ColumnDescriptor) -> Ordering {
    let a_value = sort_value(a, column);
    let b_value = sort_value(b, column);
    compare_values(a_value, b_value, column.date_format().is_some())
}

/// The value a record contributes to a sort on `column`.
///
/// Joined columns sort on the first non-empty listed field only; the formatted
/// companion of the column key overrides whatever was found, even when null.
pub fn sort_value<'a>(record: &'a Record, column: &ColumnDescriptor) -> Option<&'a Value> {
    let mut value = record.get(&column.field_name);

    if let Some(fields) = column.join_fields() {
        value = fields
            .iter()
            .find_map(|field| record.get(field).filter(|v| !is_empty_string(v)));
    }

    if let Some(formatted) = record.formatted_entry(&column.key) {
        value = Some(formatted).filter(|v| !v.is_null());
    }

    value
}

pub fn compare_values(a: Option<&Value>, b: Option<&Value>, as_dates: bool) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };

    match (is_empty_string(a), is_empty_string(b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    if as_dates {
        return match (parse_date(a).ok(), parse_date(b).ok()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => x.cmp(&y),
        };
    }

    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_text(&value_text(a), &value_text(b)),
    }
}

fn is_empty_string(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

/// Numeric reading of a value, following `parseFloat`: the longest numeric
/// prefix of the text counts. Only finite results are numbers here.
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        Value::Array(_) => parse_float_prefix(&value_text(value)),
        _ => None,
    };
    n.filter(|f| f.is_finite())
}

fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// Case-insensitive text order approximating the root locale collation:
/// whitespace, punctuation and symbols sort before digits, digits before
/// letters, and accented Latin letters sort with their base letter. Ties on
/// that primary key fall back to code point order.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let primary = a.chars().map(collation_key).cmp(b.chars().map(collation_key));
    primary.then_with(|| a.cmp(&b))
}

fn collation_key(c: char) -> (u8, char) {
    let class = if c.is_whitespace() {
        0
    } else if c.is_numeric() {
        2
    } else if c.is_alphabetic() {
        3
    } else {
        1
    };
    (class, fold_diacritic(c))
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'š' | 'ś' => 's',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' | 'ź' | 'ż' => 'z',
        _ => c,
    }
}
