//! String search: case-insensitive, accent-folded prefix match by
//! default, with `:exact` and `:contains` modifiers.

use kitefhir_core::extract::normalize_string;
use kitefhir_storage::{StringMode, ValueTest};

use crate::error::SearchError;
use crate::parameters::SearchModifier;

/// Build the value test for one string value.
///
/// The operand is normalized with the same function applied at index-write
/// time, except for `:exact`, which compares the original value
/// case-sensitively.
pub fn build_string_test(
    param: &str,
    modifier: Option<&SearchModifier>,
    raw: &str,
) -> Result<ValueTest, SearchError> {
    if raw.is_empty() {
        return Err(SearchError::invalid_value(param, "empty string value"));
    }

    match modifier {
        None => Ok(ValueTest::String {
            value: normalize_string(raw),
            mode: StringMode::StartsWith,
        }),
        Some(SearchModifier::Exact) => Ok(ValueTest::String {
            value: raw.to_string(),
            mode: StringMode::Exact,
        }),
        Some(SearchModifier::Contains) => Ok(ValueTest::String {
            value: normalize_string(raw),
            mode: StringMode::Contains,
        }),
        Some(other) => Err(SearchError::modifier_not_applicable(param, other.as_str())),
    }
}
