//! Implicit scalar tag resolution
//!
//! Classifies a raw scalar string into a tag following YAML 1.1 rules, with
//! one deliberate deviation: only the literal words `true` and `false`
//! (case insensitive) resolve to booleans. The YAML 1.1 extras `yes`, `no`,
//! `on` and `off` resolve to plain strings, matching parsers that treat
//! boolean-like words as strings.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Resolved scalar tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Null scalar (`~`, `null`, empty)
    Null,
    /// Boolean scalar (literal `true`/`false` only)
    Bool,
    /// Integer scalar (decimal, hex, octal, binary, sexagesimal)
    Int,
    /// Float scalar (incl. `.inf`, `.nan`, sexagesimal)
    Float,
    /// Timestamp scalar (YAML 1.1 forms)
    Timestamp,
    /// Everything else
    Str,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::Null => "null",
            Tag::Bool => "bool",
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::Timestamp => "timestamp",
            Tag::Str => "str",
        };
        write!(f, "{}", name)
    }
}

// The boolean set is intentionally narrowed to true/false.
static BOOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?i:true|false)$").unwrap());

static NULL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:~|null|Null|NULL|)$").unwrap());

static INT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[-+]?0b[0-1_]+|[-+]?0x[0-9a-fA-F_]+|[-+]?0[0-7_]+|[-+]?(?:0|[1-9][0-9_]*)|[-+]?[1-9][0-9_]*(?::[0-5]?[0-9])+)$",
    )
    .unwrap()
});

static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[-+]?(?:[0-9][0-9_]*)\.[0-9_]*(?:[eE][-+]?[0-9]+)?|[-+]?(?:[0-9][0-9_]*)(?:[eE][-+]?[0-9]+)|[-+]?\.[0-9_]+(?:[eE][-+]?[0-9]+)?|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
    )
    .unwrap()
});

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<ymd>[0-9]{4}-[0-9]{2}-[0-9]{2})|(?P<year>[0-9]{4})-(?P<month>[0-9]{1,2})-(?P<day>[0-9]{1,2})(?:[Tt]|[ \t]+)(?P<hour>[0-9]{1,2}):(?P<minute>[0-9]{2}):(?P<second>[0-9]{2})(?:\.(?P<fraction>[0-9]*))?(?:[ \t]*(?:Z|(?P<offh>[-+][0-9]{1,2})(?::(?P<offm>[0-9]{2}))?))?)$",
    )
    .unwrap()
});

/// Classify a raw scalar string into its implicit tag.
pub fn resolve(scalar: &str) -> Tag {
    if NULL.is_match(scalar) {
        Tag::Null
    } else if BOOL.is_match(scalar) {
        Tag::Bool
    } else if INT.is_match(scalar) {
        Tag::Int
    } else if FLOAT.is_match(scalar) {
        Tag::Float
    } else if TIMESTAMP.is_match(scalar) {
        Tag::Timestamp
    } else {
        Tag::Str
    }
}

/// Parse a scalar already classified as [`Tag::Int`].
///
/// Returns `None` when the value overflows an `i64`.
pub fn parse_int(scalar: &str) -> Option<i64> {
    let cleaned = scalar.replace('_', "");
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let magnitude = if let Some(hex) = body.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = body.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()?
    } else if body.contains(':') {
        // Sexagesimal: 190:20:30 == 190*3600 + 20*60 + 30
        let mut total: i64 = 0;
        for part in body.split(':') {
            let digit: i64 = part.parse().ok()?;
            total = total.checked_mul(60)?.checked_add(digit)?;
        }
        total
    } else if body.len() > 1 && body.starts_with('0') {
        i64::from_str_radix(body, 8).ok()?
    } else {
        body.parse().ok()?
    };

    if negative {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}

/// Parse a scalar already classified as [`Tag::Float`].
pub fn parse_float(scalar: &str) -> Option<f64> {
    let cleaned = scalar.replace('_', "");

    match cleaned.as_str() {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Some(f64::NAN),
        _ => {}
    }

    if cleaned.contains(':') {
        let (negative, body) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };
        let mut total: f64 = 0.0;
        for part in body.split(':') {
            let digit: f64 = part.parse().ok()?;
            total = total * 60.0 + digit;
        }
        return Some(if negative { -total } else { total });
    }

    cleaned.parse().ok()
}

/// Parse a scalar already classified as [`Tag::Timestamp`].
///
/// Date-only forms become midnight UTC; a missing time zone means UTC.
/// Returns `None` when the text matches the pattern but is not a valid
/// calendar date.
pub fn parse_timestamp(scalar: &str) -> Option<DateTime<FixedOffset>> {
    let caps = TIMESTAMP.captures(scalar)?;
    let utc = FixedOffset::east_opt(0)?;

    if let Some(ymd) = caps.name("ymd") {
        let date = NaiveDate::parse_from_str(ymd.as_str(), "%Y-%m-%d").ok()?;
        return utc
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .single();
    }

    let field = |name: &str| caps.name(name).map(|m| m.as_str());
    let number = |name: &str| field(name).and_then(|s| s.parse::<u32>().ok());

    let date = NaiveDate::from_ymd_opt(
        field("year")?.parse().ok()?,
        number("month")?,
        number("day")?,
    )?;

    let mut nanos: u32 = 0;
    if let Some(fraction) = field("fraction") {
        let digits: String = fraction.chars().take(9).collect();
        if !digits.is_empty() {
            nanos = digits.parse::<u32>().ok()? * 10u32.pow(9 - digits.len() as u32);
        }
    }

    let time = date.and_hms_nano_opt(number("hour")?, number("minute")?, number("second")?, nanos)?;

    let offset = match field("offh") {
        None => utc,
        Some(text) => {
            // the sign comes from the text, not the parsed hours: "-00:30"
            // parses its hour part to 0
            let negative = text.starts_with('-');
            let hours: i32 = text.parse().ok()?;
            let minutes = number("offm").unwrap_or(0) as i32;
            let magnitude = hours.abs() * 3600 + minutes * 60;
            FixedOffset::east_opt(if negative { -magnitude } else { magnitude })?
        }
    };

    offset.from_local_datetime(&time).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_booleans() {
        for s in ["true", "True", "TRUE", "TrUe", "false", "False", "FALSE", "fALsE"] {
            assert_eq!(resolve(s), Tag::Bool, "{}", s);
        }
    }

    #[test]
    fn test_boolean_like_words_are_strings() {
        for s in [
            "yes", "Yes", "YES", "yEs", "no", "No", "NO", "nO", "on", "On", "ON", "oN", "off",
            "Off", "OFF", "oFf", "y", "n",
        ] {
            assert_eq!(resolve(s), Tag::Str, "{}", s);
        }
    }

    #[test]
    fn test_null_forms() {
        for s in ["~", "null", "Null", "NULL", ""] {
            assert_eq!(resolve(s), Tag::Null, "{:?}", s);
        }
    }

    #[test]
    fn test_int_forms() {
        for s in ["0", "42", "-17", "+8", "1_000", "0x1F", "0b1010", "0755", "190:20:30"] {
            assert_eq!(resolve(s), Tag::Int, "{}", s);
        }
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-17"), Some(-17));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("0b1010"), Some(10));
        assert_eq!(parse_int("0755"), Some(493));
        assert_eq!(parse_int("190:20:30"), Some(685230));
    }

    #[test]
    fn test_float_forms() {
        for s in ["3.14", "-0.5", ".5", "6.", "1e3", "6.8523015e+5", ".inf", "-.Inf", ".NaN"] {
            assert_eq!(resolve(s), Tag::Float, "{}", s);
        }
        assert_eq!(parse_float("3.14"), Some(3.14));
        assert_eq!(parse_float("1e3"), Some(1000.0));
        assert_eq!(parse_float("-.inf"), Some(f64::NEG_INFINITY));
        assert!(parse_float(".nan").unwrap().is_nan());
        assert!((parse_float("190:20:30.15").unwrap() - 685230.15).abs() < 1e-6);
    }

    #[test]
    fn test_timestamp_forms() {
        for s in [
            "2024-01-15",
            "2001-12-14t21:59:43.10-05:00",
            "2001-12-14 21:59:43.10 -5",
            "2001-12-15T02:59:43.1Z",
            "2001-12-15 2:59:43.10",
        ] {
            assert_eq!(resolve(s), Tag::Timestamp, "{}", s);
            assert!(parse_timestamp(s).is_some(), "{}", s);
        }
    }

    #[test]
    fn test_zero_hour_offsets_keep_their_minutes() {
        let ts = parse_timestamp("2001-12-14 21:59:43 -00:30").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -1800);

        let ts = parse_timestamp("2001-12-14 21:59:43 +00:30").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 1800);

        let ts = parse_timestamp("2001-12-14 21:59:43 -05:30").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -(5 * 3600 + 1800));
    }

    #[test]
    fn test_date_only_is_midnight_utc() {
        let ts = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-15T00:00:00+00:00");
    }

    #[test]
    fn test_invalid_calendar_date_parses_to_none() {
        // Matches the pattern but February has no day 30
        assert_eq!(resolve("2024-02-30"), Tag::Timestamp);
        assert!(parse_timestamp("2024-02-30").is_none());
    }

    #[test]
    fn test_loose_dates_without_time_are_strings() {
        assert_eq!(resolve("2024-1-5"), Tag::Str);
    }

    #[test]
    fn test_everything_else_is_string() {
        for s in ["hello", "0x", "1.2.3", "true story", "${var}", "-"] {
            assert_eq!(resolve(s), Tag::Str, "{}", s);
        }
    }

    #[test]
    fn test_int_overflow_is_none() {
        assert!(parse_int("92233720368547758089").is_none());
    }
}
