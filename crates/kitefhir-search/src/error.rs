use thiserror::Error;

/// Errors raised while validating and compiling a search request.
///
/// All variants surface as HTTP 400; `DisallowedParameter` carries the
/// `not-supported` outcome code, everything else `invalid`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Unknown search parameter: {0}")]
    UnknownParameter(String),

    #[error("Search parameter '{0}' is not allowed for this resource")]
    DisallowedParameter(String),

    #[error("Unknown modifier ':{modifier}' on parameter '{param}'")]
    UnknownModifier { param: String, modifier: String },

    #[error("Modifier ':{modifier}' is not applicable to parameter '{param}'")]
    ModifierNotApplicable { param: String, modifier: String },

    #[error("Invalid value for {param}: {message}")]
    InvalidValue { param: String, message: String },

    #[error("Prefix '{prefix}' is not applicable to parameter '{param}'")]
    PrefixNotApplicable { param: String, prefix: String },
}

impl SearchError {
    pub fn invalid_value(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn unknown_modifier(param: impl Into<String>, modifier: impl Into<String>) -> Self {
        Self::UnknownModifier {
            param: param.into(),
            modifier: modifier.into(),
        }
    }

    pub fn modifier_not_applicable(
        param: impl Into<String>,
        modifier: impl Into<String>,
    ) -> Self {
        Self::ModifierNotApplicable {
            param: param.into(),
            modifier: modifier.into(),
        }
    }

    /// The FHIR IssueType code for the OperationOutcome body.
    pub fn outcome_code(&self) -> &'static str {
        match self {
            Self::DisallowedParameter(_) => "not-supported",
            _ => "invalid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes() {
        assert_eq!(
            SearchError::UnknownParameter("foo".into()).outcome_code(),
            "invalid"
        );
        assert_eq!(
            SearchError::DisallowedParameter("foo".into()).outcome_code(),
            "not-supported"
        );
    }

    #[test]
    fn messages() {
        let err = SearchError::unknown_modifier("family", "fuzzy");
        assert_eq!(err.to_string(), "Unknown modifier ':fuzzy' on parameter 'family'");
        let err = SearchError::invalid_value("_count", "must be >= 1");
        assert_eq!(err.to_string(), "Invalid value for _count: must be >= 1");
    }
}
