//! URI search with the hierarchical `:above` and `:below` modifiers.

use kitefhir_storage::{UriMode, ValueTest};

use crate::error::SearchError;
use crate::parameters::SearchModifier;

/// Build the value test for one uri value.
pub fn build_uri_test(
    param: &str,
    modifier: Option<&SearchModifier>,
    raw: &str,
) -> Result<ValueTest, SearchError> {
    if raw.is_empty() {
        return Err(SearchError::invalid_value(param, "empty uri value"));
    }

    let mode = match modifier {
        None => UriMode::Exact,
        Some(SearchModifier::Above) => UriMode::Above,
        Some(SearchModifier::Below) => UriMode::Below,
        Some(other) => {
            return Err(SearchError::modifier_not_applicable(param, other.as_str()));
        }
    };

    Ok(ValueTest::Uri {
        value: raw.to_string(),
        mode,
    })
}
