//! Token search: coded values (Coding, CodeableConcept, Identifier, code).

use kitefhir_storage::{TokenTest, ValueTest};

use crate::error::SearchError;
use crate::parameters::SearchModifier;

/// The parsed `system|code` forms of a token value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValue {
    /// `None`: system unconstrained (`code`). `Some("")`: explicitly
    /// systemless (`|code`).
    pub system: Option<String>,
    /// `None`: any code within the system (`system|`).
    pub code: Option<String>,
}

/// Parse a token value into its system/code parts.
///
/// Forms: `system|code`, `|code`, `system|`, `code`.
pub fn parse_token_value(raw: &str) -> TokenValue {
    match raw.split_once('|') {
        Some((system, code)) => TokenValue {
            system: Some(system.to_string()),
            code: if code.is_empty() {
                None
            } else {
                Some(code.to_string())
            },
        },
        None => TokenValue {
            system: None,
            code: Some(raw.to_string()),
        },
    }
}

/// Build the value test for one token value.
pub fn build_token_test(
    param: &str,
    modifier: Option<&SearchModifier>,
    raw: &str,
) -> Result<ValueTest, SearchError> {
    if raw.is_empty() {
        return Err(SearchError::invalid_value(param, "empty token value"));
    }

    match modifier {
        Some(SearchModifier::Text) => Ok(ValueTest::TokenText(raw.to_string())),
        Some(SearchModifier::Not) => {
            let parsed = parse_token_value(raw);
            Ok(ValueTest::Token(TokenTest {
                system: parsed.system,
                code: parsed.code,
                negate: true,
            }))
        }
        // `:exact` on token is the default match semantics
        Some(SearchModifier::Exact) | None => {
            let parsed = parse_token_value(raw);
            if parsed.system.is_none() && parsed.code.is_none() {
                return Err(SearchError::invalid_value(param, "empty token value"));
            }
            Ok(ValueTest::Token(TokenTest {
                system: parsed.system,
                code: parsed.code,
                negate: false,
            }))
        }
        Some(other) => Err(SearchError::modifier_not_applicable(param, other.as_str())),
    }
}
