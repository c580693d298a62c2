use serde::Serialize;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RangeClass {
    InRange,
    OutOfRange,
    Indeterminate,
}

impl RangeClass {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InRange => "in_range",
            Self::OutOfRange => "out_of_range",
            Self::Indeterminate => "indeterminate",
        }
    }

    pub(crate) fn is_flagged(self) -> bool {
        self == Self::OutOfRange
    }
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum RangeParseError {
    #[error("reference range is empty")]
    EmptyRange,
    #[error("value {0:?} has no digits")]
    NonNumericValue(String),
    #[error("no number found in {0:?}")]
    MissingNumber(String),
    #[error("no interval or comparison operator in {0:?}")]
    NoOperator(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Between { low: f64, high: f64 },
    AtMost(f64),
    AtLeast(f64),
    Below(f64),
    Above(f64),
}

impl Bound {
    fn excludes(self, measured: f64) -> bool {
        match self {
            Self::Between { low, high } => measured < low || measured > high,
            Self::AtMost(bound) => measured > bound,
            Self::AtLeast(bound) => measured < bound,
            Self::Below(bound) => measured >= bound,
            Self::Above(bound) => measured <= bound,
        }
    }
}

/// Classifies `value` against a free-form reference range such as
/// "70-100 mg/dL", "<=5.0" or ">59 mL/min/1.73 m2".
pub(crate) fn classify(reference_range: &str, value: &str) -> RangeClass {
    match evaluate(reference_range, value) {
        Ok(true) => RangeClass::OutOfRange,
        Ok(false) => RangeClass::InRange,
        Err(error) => {
            trace!(range = %reference_range, value = %value, error = %error, "range indeterminate");
            RangeClass::Indeterminate
        }
    }
}

fn evaluate(reference_range: &str, value: &str) -> Result<bool, RangeParseError> {
    let range = reference_range
        .trim()
        .to_lowercase()
        .replace(['–', '—', '‐', '−'], "-");
    if range.is_empty() {
        return Err(RangeParseError::EmptyRange);
    }

    let value = value.trim();
    if !value.chars().any(|character| character.is_ascii_digit()) {
        return Err(RangeParseError::NonNumericValue(value.to_string()));
    }
    let measured =
        first_number(value).ok_or_else(|| RangeParseError::MissingNumber(value.to_string()))?;

    Ok(parse_bound(&range)?.excludes(measured))
}

fn parse_bound(range: &str) -> Result<Bound, RangeParseError> {
    let number = |text: &str| {
        first_number(text).ok_or_else(|| RangeParseError::MissingNumber(text.to_string()))
    };

    if let Some((low, high)) = range.split_once('-') {
        return Ok(Bound::Between {
            low: number(low)?,
            high: number(high)?,
        });
    }
    if range.contains("<=") {
        return Ok(Bound::AtMost(number(range)?));
    }
    if range.contains(">=") {
        return Ok(Bound::AtLeast(number(range)?));
    }
    if range.contains('<') {
        return Ok(Bound::Below(number(range)?));
    }
    if range.contains('>') {
        return Ok(Bound::Above(number(range)?));
    }

    Err(RangeParseError::NoOperator(range.to_string()))
}

/// First unsigned decimal number in `text` ("<0.5 ng/mL" -> 0.5).
fn first_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let starts_number = |index: usize| {
        bytes[index].is_ascii_digit()
            || (bytes[index] == b'.' && bytes.get(index + 1).is_some_and(u8::is_ascii_digit))
    };

    let start = (0..bytes.len()).find(|&index| starts_number(index))?;
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        let byte = bytes[end];
        if byte.is_ascii_digit() {
            end += 1;
        } else if byte == b'.'
            && !seen_dot
            && bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
        {
            seen_dot = true;
            end += 1;
        } else {
            break;
        }
    }

    text[start..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_skips_comparators_and_units() {
        assert_eq!(first_number("<0.5 ng/mL"), Some(0.5));
        assert_eq!(first_number("4.0 x10E3/uL"), Some(4.0));
        assert_eq!(first_number(".75"), Some(0.75));
        assert_eq!(first_number("no digits"), None);
    }

    #[test]
    fn parse_bound_reports_missing_operator() {
        assert_eq!(
            parse_bound("5.0"),
            Err(RangeParseError::NoOperator("5.0".to_string()))
        );
        assert_eq!(
            parse_bound("negative - see note"),
            Err(RangeParseError::MissingNumber("negative ".to_string()))
        );
    }
}
