use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// FHIR version enumeration.
///
/// KiteFHIR serves R4B and R5 side by side; every stored resource row and
/// every request context carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FhirVersion {
    #[serde(rename = "R4B", alias = "r4b", alias = "4.3.0")]
    R4B,
    #[serde(rename = "R5", alias = "r5", alias = "5.0.0")]
    R5,
}

impl FhirVersion {
    /// The canonical label used in configuration and the `X-FHIR-Version` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            FhirVersion::R4B => "R4B",
            FhirVersion::R5 => "R5",
        }
    }

    /// The lowercase URL segment (`/fhir/r4b/...`, `/fhir/r5/...`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            FhirVersion::R4B => "r4b",
            FhirVersion::R5 => "r5",
        }
    }

    /// The FHIR publication version string, as used in CapabilityStatement.fhirVersion.
    pub fn fhir_release(&self) -> &'static str {
        match self {
            FhirVersion::R4B => "4.3.0",
            FhirVersion::R5 => "5.0.0",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FhirVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R4B" | "r4b" | "4.3.0" => Ok(FhirVersion::R4B),
            "R5" | "r5" | "5.0.0" => Ok(FhirVersion::R5),
            _ => Err(CoreError::configuration(format!(
                "Unknown FHIR version: {s}"
            ))),
        }
    }
}

impl Default for FhirVersion {
    fn default() -> Self {
        FhirVersion::R5
    }
}

/// RESTful interactions a resource type can enable or disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Read,
    Vread,
    Create,
    Update,
    Patch,
    Delete,
    Search,
    History,
}

impl Interaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interaction::Read => "read",
            Interaction::Vread => "vread",
            Interaction::Create => "create",
            Interaction::Update => "update",
            Interaction::Patch => "patch",
            Interaction::Delete => "delete",
            Interaction::Search => "search",
            Interaction::History => "history",
        }
    }

    pub const ALL: [Interaction; 8] = [
        Interaction::Read,
        Interaction::Vread,
        Interaction::Create,
        Interaction::Update,
        Interaction::Patch,
        Interaction::Delete,
        Interaction::Search,
        Interaction::History,
    ];
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate if a string is a valid FHIR resource type name
pub fn is_valid_resource_type_name(name: &str) -> bool {
    // FHIR resource type names must start with uppercase letter and contain only letters
    !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Resource types the structural parser recognizes per version.
///
/// Anything outside this list is handled through the custom-resource path:
/// only `resourceType` equality and meta stamping are enforced.
const COMMON_RESOURCE_TYPES: &[&str] = &[
    "AdverseEvent",
    "AllergyIntolerance",
    "Appointment",
    "Binary",
    "Bundle",
    "CapabilityStatement",
    "CarePlan",
    "CareTeam",
    "CodeSystem",
    "Condition",
    "Device",
    "DiagnosticReport",
    "DocumentReference",
    "Encounter",
    "Goal",
    "Group",
    "Immunization",
    "Library",
    "Location",
    "Medication",
    "MedicationRequest",
    "MedicationStatement",
    "Observation",
    "OperationDefinition",
    "OperationOutcome",
    "Organization",
    "Parameters",
    "Patient",
    "Practitioner",
    "PractitionerRole",
    "Procedure",
    "Provenance",
    "Questionnaire",
    "QuestionnaireResponse",
    "RelatedPerson",
    "SearchParameter",
    "ServiceRequest",
    "Specimen",
    "StructureDefinition",
    "Subscription",
    "Task",
    "ValueSet",
];

/// Types introduced in R5 and absent from R4B.
const R5_ONLY_RESOURCE_TYPES: &[&str] = &[
    "ActorDefinition",
    "DeviceAssociation",
    "EncounterHistory",
    "GenomicStudy",
    "InventoryItem",
    "NutritionIntake",
    "Requirements",
    "SubscriptionStatus",
    "SubscriptionTopic",
    "TestPlan",
];

/// Whether `resource_type` is known to the structural parser for `version`.
pub fn is_known_resource_type(version: FhirVersion, resource_type: &str) -> bool {
    if COMMON_RESOURCE_TYPES.binary_search(&resource_type).is_ok() {
        return true;
    }
    match version {
        FhirVersion::R5 => R5_ONLY_RESOURCE_TYPES.binary_search(&resource_type).is_ok(),
        FhirVersion::R4B => false,
    }
}
