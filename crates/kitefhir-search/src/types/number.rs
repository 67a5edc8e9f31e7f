//! Number search: comparison prefixes with implicit-precision equality.
//!
//! `eq100` matches `[99.5, 100.5)`, the half-step of the last significant
//! digit of the literal. Operands are parsed into structured values; no
//! textual interpolation ever reaches the backend.

use kitefhir_storage::{NumberTest, ValueTest};

use crate::error::SearchError;
use crate::parameters::SearchPrefix;
use crate::types::date::prefix_to_op;

/// Parse `[prefix]number` into a `NumberTest` with its implicit precision
/// bounds.
pub fn parse_number_test(param: &str, raw: &str) -> Result<NumberTest, SearchError> {
    let (prefix, literal) = SearchPrefix::split(raw);
    if literal.is_empty() {
        return Err(SearchError::invalid_value(param, "empty number value"));
    }
    let value: f64 = literal
        .parse()
        .map_err(|_| SearchError::invalid_value(param, format!("'{literal}' is not a number")))?;

    let half = half_step(literal);
    Ok(NumberTest {
        op: prefix_to_op(prefix),
        value,
        low: value - half,
        high: value + half,
    })
}

/// Build the value test for one number value.
pub fn build_number_test(param: &str, raw: &str) -> Result<ValueTest, SearchError> {
    Ok(ValueTest::Number(parse_number_test(param, raw)?))
}

/// Half of the step implied by the literal's decimal places:
/// `100` → 0.5, `100.0` → 0.05, `1.25` → 0.005.
fn half_step(literal: &str) -> f64 {
    let digits = literal
        .split(['e', 'E'])
        .next()
        .and_then(|mantissa| mantissa.split_once('.'))
        .map(|(_, frac)| frac.len() as i32)
        .unwrap_or(0);
    0.5 * 10f64.powi(-digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitefhir_storage::ComparisonOp;

    #[test]
    fn integer_precision() {
        let t = parse_number_test("probability", "eq100").unwrap();
        assert_eq!(t.op, ComparisonOp::Eq);
        assert!((t.low - 99.5).abs() < 1e-9);
        assert!((t.high - 100.5).abs() < 1e-9);
    }

    #[test]
    fn decimal_precision() {
        let t = parse_number_test("probability", "100.00").unwrap();
        assert!((t.low - 99.995).abs() < 1e-9);
        assert!((t.high - 100.005).abs() < 1e-9);
    }

    #[test]
    fn plain_value_defaults_to_eq() {
        let t = parse_number_test("length", "5.4").unwrap();
        assert_eq!(t.op, ComparisonOp::Eq);
        assert!((t.value - 5.4).abs() < 1e-9);
    }

    #[test]
    fn prefixes() {
        assert_eq!(
            parse_number_test("length", "gt10").unwrap().op,
            ComparisonOp::Gt
        );
        assert_eq!(
            parse_number_test("length", "ap10").unwrap().op,
            ComparisonOp::Ap
        );
    }

    #[test]
    fn negative_numbers() {
        let t = parse_number_test("length", "-4.5").unwrap();
        assert!((t.value + 4.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_rejected() {
        assert!(parse_number_test("length", "abc").is_err());
        assert!(parse_number_test("length", "ge").is_err());
        assert!(parse_number_test("length", "").is_err());
    }
}
