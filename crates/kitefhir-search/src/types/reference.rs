//! Reference search: `Type/id`, absolute URL, bare id, plus the
//! `:identifier` and `:<TargetType>` modifiers.

use kitefhir_storage::{ReferenceTest, ValueTest};

use crate::error::SearchError;
use crate::parameters::SearchModifier;
use crate::types::token::parse_token_value;

/// Build the value test for one reference value.
pub fn build_reference_test(
    param: &str,
    modifier: Option<&SearchModifier>,
    raw: &str,
) -> Result<ValueTest, SearchError> {
    if raw.is_empty() {
        return Err(SearchError::invalid_value(param, "empty reference value"));
    }

    match modifier {
        // subject:identifier=system|value searches Reference.identifier
        Some(SearchModifier::Identifier) => {
            let token = parse_token_value(raw);
            let value = token.code.ok_or_else(|| {
                SearchError::invalid_value(param, "':identifier' requires a value")
            })?;
            Ok(ValueTest::Reference(ReferenceTest {
                target_type: None,
                target_id: None,
                url: None,
                identifier: Some((token.system.filter(|s| !s.is_empty()), value)),
            }))
        }
        // subject:Patient=123 restricts the target type
        Some(SearchModifier::Type(target_type)) => {
            if raw.contains('/') {
                return Err(SearchError::invalid_value(
                    param,
                    "type modifier takes a bare id",
                ));
            }
            Ok(ValueTest::Reference(ReferenceTest {
                target_type: Some(target_type.clone()),
                target_id: Some(raw.to_string()),
                url: None,
                identifier: None,
            }))
        }
        None => Ok(ValueTest::Reference(parse_reference_value(raw))),
        Some(other) => Err(SearchError::modifier_not_applicable(param, other.as_str())),
    }
}

/// Parse an unmodified reference value into its matching form.
fn parse_reference_value(raw: &str) -> ReferenceTest {
    // Absolute URL: match on the raw URL and on the trailing Type/id
    if raw.starts_with("http://") || raw.starts_with("https://") {
        let (target_type, target_id) = trailing_type_id(raw);
        return ReferenceTest {
            target_type,
            target_id,
            url: Some(raw.to_string()),
            identifier: None,
        };
    }

    // Type/id form
    if let Some((first, rest)) = raw.split_once('/')
        && first
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
        && !rest.is_empty()
        && !rest.contains('/')
    {
        return ReferenceTest {
            target_type: Some(first.to_string()),
            target_id: Some(rest.to_string()),
            url: None,
            identifier: None,
        };
    }

    // Bare id: any target type
    ReferenceTest {
        target_type: None,
        target_id: Some(raw.to_string()),
        url: None,
        identifier: None,
    }
}

fn trailing_type_id(url: &str) -> (Option<String>, Option<String>) {
    let trimmed = url.trim_end_matches('/');
    let mut parts = trimmed.rsplit('/');
    let id = parts.next();
    let rtype = parts.next();
    match (rtype, id) {
        (Some(t), Some(id))
            if t.chars()
                .next()
                .map(|c| c.is_ascii_uppercase())
                .unwrap_or(false) =>
        {
            (Some(t.to_string()), Some(id.to_string()))
        }
        _ => (None, None),
    }
}
