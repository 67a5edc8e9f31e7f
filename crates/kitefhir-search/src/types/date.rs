//! Date search: partial-precision values with comparison prefixes,
//! evaluated as interval comparisons against indexed `[start, end]`
//! ranges.

use kitefhir_core::extract::parse_date_range;
use kitefhir_storage::{ComparisonOp, ValueTest};

use crate::error::SearchError;
use crate::parameters::SearchPrefix;

pub(crate) fn prefix_to_op(prefix: Option<SearchPrefix>) -> ComparisonOp {
    match prefix {
        None | Some(SearchPrefix::Eq) => ComparisonOp::Eq,
        Some(SearchPrefix::Ne) => ComparisonOp::Ne,
        Some(SearchPrefix::Gt) => ComparisonOp::Gt,
        Some(SearchPrefix::Lt) => ComparisonOp::Lt,
        Some(SearchPrefix::Ge) => ComparisonOp::Ge,
        Some(SearchPrefix::Le) => ComparisonOp::Le,
        Some(SearchPrefix::Sa) => ComparisonOp::Sa,
        Some(SearchPrefix::Eb) => ComparisonOp::Eb,
        Some(SearchPrefix::Ap) => ComparisonOp::Ap,
    }
}

/// Build the value test for one date value (`[prefix]date`).
pub fn build_date_test(param: &str, raw: &str) -> Result<ValueTest, SearchError> {
    let (prefix, value) = SearchPrefix::split(raw);
    let range = parse_date_range(value).ok_or_else(|| {
        SearchError::invalid_value(param, format!("'{value}' is not a valid FHIR date"))
    })?;
    Ok(ValueTest::Date {
        op: prefix_to_op(prefix),
        range,
    })
}
