pub mod error;
pub mod extract;
pub mod fhir;
pub mod id;
pub mod time;

pub use error::{CoreError, Result};
pub use extract::{
    DateRange, ExtractedValue, expression_components, extract_values, normalize_string,
    parse_date_range,
};
pub use fhir::{FhirVersion, Interaction, is_known_resource_type, is_valid_resource_type_name};
pub use id::{generate_id, validate_id};
pub use time::{format_rfc3339, now_utc, parse_rfc3339};
