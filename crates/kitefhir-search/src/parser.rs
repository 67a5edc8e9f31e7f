//! Query-string parsing into structured search parameters.
//!
//! Splits each key into base name and modifier, URL-decodes values and
//! expands comma-separated value lists. Prefix handling is deferred to
//! the typed builders, which know whether a parameter is ordered.

use url::form_urlencoded;

use crate::parameters::SearchModifier;
use crate::error::SearchError;

/// One raw value of a search parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedValue {
    pub raw: String,
}

/// One occurrence of a search parameter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParam {
    pub name: String,
    /// The raw modifier text after `:`, if any. Resolution against the
    /// parameter type happens during plan building.
    pub modifier: Option<String>,
    pub values: Vec<ParsedValue>,
}

impl ParsedParam {
    /// Resolve the modifier text into a known `SearchModifier`.
    pub fn resolve_modifier(&self) -> Result<Option<SearchModifier>, SearchError> {
        match &self.modifier {
            None => Ok(None),
            Some(text) => SearchModifier::parse(text)
                .map(Some)
                .ok_or_else(|| SearchError::unknown_modifier(&self.name, text)),
        }
    }
}

/// A parsed query string, in request order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub params: Vec<ParsedParam>,
}

impl ParsedQuery {
    /// First occurrence of a parameter by name (modifier-less match).
    pub fn first(&self, name: &str) -> Option<&ParsedParam> {
        self.params
            .iter()
            .find(|p| p.name == name && p.modifier.is_none())
    }

    /// First raw value of a parameter by name.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.first(name)
            .and_then(|p| p.values.first())
            .map(|v| v.raw.as_str())
    }
}

/// Parse an `application/x-www-form-urlencoded` query string.
///
/// Example: `family:exact=Smith&birthdate=ge2020-01-01&_count=10`
pub fn parse_query(query: &str) -> ParsedQuery {
    let mut result = ParsedQuery::default();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let (name, modifier) = match key.split_once(':') {
            Some((name, modifier)) if !modifier.is_empty() => {
                (name.to_string(), Some(modifier.to_string()))
            }
            Some((name, _)) => (name.to_string(), None),
            None => (key.into_owned(), None),
        };

        // Comma-separated values are OR alternatives per FHIR search rules
        let values: Vec<ParsedValue> = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| ParsedValue { raw: v.to_string() })
            .collect();

        result.params.push(ParsedParam {
            name,
            modifier,
            values,
        });
    }
    result
}
