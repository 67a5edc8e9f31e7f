//! Typed predicate construction per search parameter type.
//!
//! Each module turns one raw URL value into a `ValueTest` from the storage
//! query IR: token, string, date, number, quantity, reference and uri.
//! Composite parameters are compiled in `composite` using the component
//! definitions declared on the SearchParameter.

pub mod composite;
pub mod date;
pub mod number;
pub mod quantity;
pub mod reference;
pub mod string;
pub mod token;
pub mod uri;

pub use composite::build_composite_predicate;
pub use date::build_date_test;
pub use number::{build_number_test, parse_number_test};
pub use quantity::build_quantity_test;
pub use reference::build_reference_test;
pub use string::build_string_test;
pub use token::{build_token_test, parse_token_value};
pub use uri::build_uri_test;

use kitefhir_storage::ValueTest;

use crate::error::SearchError;
use crate::parameters::{SearchModifier, SearchParamType, SearchParameter};

/// Build the value test for one raw value of a non-composite parameter.
///
/// The modifier has already been resolved; applicability to the parameter
/// type is enforced here. `:missing` is handled uniformly for all types.
pub fn build_value_test(
    definition: &SearchParameter,
    modifier: Option<&SearchModifier>,
    raw: &str,
) -> Result<ValueTest, SearchError> {
    if let Some(m) = modifier {
        if !m.applies_to(definition.param_type) {
            return Err(SearchError::modifier_not_applicable(
                &definition.code,
                m.as_str(),
            ));
        }
        if *m == SearchModifier::Missing {
            return match raw {
                "true" => Ok(ValueTest::Missing(true)),
                "false" => Ok(ValueTest::Missing(false)),
                other => Err(SearchError::invalid_value(
                    &definition.code,
                    format!("':missing' takes true or false, got '{other}'"),
                )),
            };
        }
    }

    match definition.param_type {
        SearchParamType::Token => build_token_test(&definition.code, modifier, raw),
        SearchParamType::String => build_string_test(&definition.code, modifier, raw),
        SearchParamType::Date => build_date_test(&definition.code, raw),
        SearchParamType::Number => build_number_test(&definition.code, raw),
        SearchParamType::Quantity => build_quantity_test(&definition.code, raw),
        SearchParamType::Reference => build_reference_test(&definition.code, modifier, raw),
        SearchParamType::Uri => build_uri_test(&definition.code, modifier, raw),
        SearchParamType::Composite => Err(SearchError::invalid_value(
            &definition.code,
            "composite parameters are compiled from their components",
        )),
        SearchParamType::Special => {
            Err(SearchError::DisallowedParameter(definition.code.clone()))
        }
    }
}
