use thiserror::Error;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// 1 unit = 100 cents, so 500.00 = 50000 cents.
pub type Cents = i64;

/// Format cents as a decimal string.
/// Example: 50000 -> "500.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCentsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid money format: {0}")]
    InvalidFormat(String),
    #[error("amount has more than two decimal places: {0}")]
    TooPrecise(String),
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// Parse a decimal string into cents.
///
/// Accepts an optional leading `-`, whole units and up to two fractional digits:
/// "500.00" -> 50000, "12.5" -> 1250, ".5" -> 50, "100" -> 10000.
/// Sub-cent precision is rejected rather than silently truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (units_str.is_empty() && fraction_str.is_empty())
        || !is_digits(units_str)
        || !is_digits(fraction_str)
    {
        return Err(ParseCentsError::InvalidFormat(input.to_string()));
    }
    if fraction_str.len() > 2 {
        return Err(ParseCentsError::TooPrecise(input.to_string()));
    }

    let out_of_range = || ParseCentsError::OutOfRange(input.to_string());

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| out_of_range())?
    };
    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        // "12.5" means fifty cents
        1 => fraction_str.parse::<i64>().map_err(|_| out_of_range())? * 10,
        _ => fraction_str.parse().map_err(|_| out_of_range())?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(out_of_range)?;
    Ok(if negative { -cents } else { cents })
}

/// Convert a floating-point currency amount into cents, rounding to the nearest cent.
pub fn cents_from_f64(value: f64) -> Option<Cents> {
    let scaled = (value * 100.0).round();
    if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
        return None;
    }
    Some(scaled as i64)
}

/// Serde adapter for amounts carried in JSON payloads.
///
/// Deserializes from a number (`500.5`) or a decimal string (`"500.50"`) and
/// serializes as a decimal string.
pub mod decimal {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    use super::{Cents, cents_from_f64, format_cents, parse_cents};

    pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_cents(*cents))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl Visitor<'_> for DecimalVisitor {
        type Value = Cents;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a currency amount as a number or decimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Cents, E> {
            v.checked_mul(100)
                .ok_or_else(|| E::custom(format!("amount out of range: {v}")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Cents, E> {
            i64::try_from(v)
                .ok()
                .and_then(|v| v.checked_mul(100))
                .ok_or_else(|| E::custom(format!("amount out of range: {v}")))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Cents, E> {
            cents_from_f64(v).ok_or_else(|| E::custom(format!("amount out of range: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Cents, E> {
            parse_cents(v).map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(50000), "500.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-1234), "-12.34");
        assert_eq!(format_cents(i64::MIN), "-92233720368547758.08");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("500.00"), Ok(50000));
        assert_eq!(parse_cents("100"), Ok(10000));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents(".5"), Ok(50));
        assert_eq!(parse_cents("7."), Ok(700));
        assert_eq!(parse_cents(" 0.01 "), Ok(1));
        assert_eq!(parse_cents("-10.00"), Ok(-1000));
    }

    #[test]
    fn test_parse_cents_rejects_sub_cent_precision() {
        assert!(matches!(
            parse_cents("100.999"),
            Err(ParseCentsError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert_eq!(parse_cents(""), Err(ParseCentsError::Empty));
        assert!(matches!(parse_cents("."), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(parse_cents("abc"), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(parse_cents("1.2.3"), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(parse_cents("+5"), Err(ParseCentsError::InvalidFormat(_))));
        assert!(matches!(
            parse_cents("99999999999999999999"),
            Err(ParseCentsError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_cents_from_f64_rounds_to_nearest_cent() {
        assert_eq!(cents_from_f64(500.0), Some(50000));
        assert_eq!(cents_from_f64(0.1 + 0.2), Some(30));
        assert_eq!(cents_from_f64(19.999), Some(2000));
        assert_eq!(cents_from_f64(f64::NAN), None);
        assert_eq!(cents_from_f64(f64::INFINITY), None);
    }

    #[derive(serde::Deserialize, serde::Serialize)]
    struct Amount {
        #[serde(with = "decimal")]
        value: Cents,
    }

    #[test]
    fn test_decimal_serde_accepts_numbers_and_strings() {
        let from_float: Amount = serde_json::from_str(r#"{"value": 500.5}"#).unwrap();
        assert_eq!(from_float.value, 50050);

        let from_int: Amount = serde_json::from_str(r#"{"value": 3}"#).unwrap();
        assert_eq!(from_int.value, 300);

        let from_str: Amount = serde_json::from_str(r#"{"value": "12.34"}"#).unwrap();
        assert_eq!(from_str.value, 1234);

        assert!(serde_json::from_str::<Amount>(r#"{"value": "1.234"}"#).is_err());
        assert!(serde_json::from_str::<Amount>(r#"{"value": true}"#).is_err());

        let rendered = serde_json::to_string(&Amount { value: 40000 }).unwrap();
        assert_eq!(rendered, r#"{"value":"400.00"}"#);
    }
}
