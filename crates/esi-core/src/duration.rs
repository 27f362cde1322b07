//! Duration literals such as `300ms`, `1.5h` or `2h45m`.
//!
//! The grammar and the error messages follow Go's `time.ParseDuration`, which is
//! what ESI tags in the wild are written against. Negative durations are rejected.

use std::time::Duration;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Error returned when a duration literal cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    /// Malformed input, negative value or overflow.
    #[error("time: invalid duration {0}")]
    Invalid(String),

    /// A number without a unit suffix.
    #[error("time: missing unit in duration {0}")]
    MissingUnit(String),

    /// A unit suffix that is not one of `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`.
    #[error("time: unknown unit {unit} in duration {input}")]
    UnknownUnit { unit: String, input: String },
}

/// Parse a duration literal.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());

    let mut s = input;
    if s.starts_with('-') {
        return Err(invalid());
    }
    if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let first = s.as_bytes()[0];
        if first != b'.' && !first.is_ascii_digit() {
            return Err(invalid());
        }

        let int_len = leading_digits(s);
        let int_part = &s[..int_len];
        s = &s[int_len..];

        let mut frac_part = "";
        if let Some(rest) = s.strip_prefix('.') {
            let frac_len = leading_digits(rest);
            frac_part = &rest[..frac_len];
            s = &rest[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = s
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(s.len());
        let unit = &s[..unit_len];
        s = &s[unit_len..];
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let unit_nanos = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let mut int_value: u128 = 0;
        for digit in int_part.bytes() {
            int_value = int_value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u128::from(digit - b'0')))
                .filter(|v| *v <= u128::from(u64::MAX))
                .ok_or_else(invalid)?;
        }
        let mut value = int_value * unit_nanos;

        if !frac_part.is_empty() {
            let mut frac: u128 = 0;
            let mut scale: u128 = 1;
            for digit in frac_part.bytes() {
                // Digits past nanosecond precision of the largest unit are noise.
                if scale >= 10u128.pow(19) {
                    break;
                }
                frac = frac * 10 + u128::from(digit - b'0');
                scale *= 10;
            }
            value += frac * unit_nanos / scale;
        }

        total += value;
        if total > u128::from(u64::MAX) {
            return Err(invalid());
        }
    }

    Ok(Duration::from_nanos(total as u64))
}

/// Format a duration in the same grammar `parse_duration` accepts.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SECOND {
        let (unit, scale) = if nanos < 1_000 {
            ("ns", 1)
        } else if nanos < 1_000_000 {
            ("µs", 1_000)
        } else {
            ("ms", 1_000_000)
        };
        return format!("{}{}", fixed_point(nanos, scale), unit);
    }

    let total_secs = nanos / NANOS_PER_SECOND;
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    let sub_second = nanos % NANOS_PER_SECOND;
    out.push_str(&fixed_point(seconds * NANOS_PER_SECOND + sub_second, NANOS_PER_SECOND));
    out.push('s');
    out
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3600 * NANOS_PER_SECOND),
        _ => None,
    }
}

fn fixed_point(value: u128, scale: u128) -> String {
    let int = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return int.to_string();
    }
    let width = scale.ilog10() as usize;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", int, digits.trim_end_matches('0'))
}

/// Serde adapter storing a [`Duration`] as a duration literal string.
pub mod serde_literal {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let literal = String::deserialize(deserializer)?;
        super::parse_duration(literal.trim()).map_err(serde::de::Error::custom)
    }
}
