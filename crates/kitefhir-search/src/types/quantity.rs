//! Quantity search: `[prefix]value|system|code`, a number comparison
//! plus optional unit/system equality.

use kitefhir_storage::ValueTest;

use crate::error::SearchError;
use crate::types::number::parse_number_test;

/// Build the value test for one quantity value.
///
/// Forms: `5.4`, `gt5.4`, `5.4|http://unitsofmeasure.org|mg`,
/// `5.4||mg` (unit without system).
pub fn build_quantity_test(param: &str, raw: &str) -> Result<ValueTest, SearchError> {
    let mut parts = raw.splitn(3, '|');
    let number_part = parts.next().unwrap_or_default();
    let system = parts.next();
    let unit = parts.next();

    let number = parse_number_test(param, number_part)?;

    Ok(ValueTest::Quantity {
        number,
        system: system.filter(|s| !s.is_empty()).map(String::from),
        unit: unit.filter(|u| !u.is_empty()).map(String::from),
    })
}
