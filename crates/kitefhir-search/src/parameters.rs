use serde::{Deserialize, Serialize};
use std::fmt;

/// FHIR SearchParameter type enumeration
/// See: https://hl7.org/fhir/search.html#table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    Number,
    Date,
    String,
    Token,
    Reference,
    Composite,
    Quantity,
    Uri,
    Special,
}

impl SearchParamType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "reference" => Some(Self::Reference),
            "composite" => Some(Self::Composite),
            "quantity" => Some(Self::Quantity),
            "uri" => Some(Self::Uri),
            "special" => Some(Self::Special),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Date => "date",
            Self::String => "string",
            Self::Token => "token",
            Self::Reference => "reference",
            Self::Composite => "composite",
            Self::Quantity => "quantity",
            Self::Uri => "uri",
            Self::Special => "special",
        }
    }

    /// Ordered types accept comparison prefixes on their values.
    pub fn accepts_prefixes(&self) -> bool {
        matches!(self, Self::Number | Self::Date | Self::Quantity)
    }
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported search modifiers, applied as a suffix to the parameter name
/// (`name:modifier`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchModifier {
    Exact,
    Contains,
    Text,
    Not,
    Missing,
    Identifier,
    Above,
    Below,
    /// Target type restriction on references, e.g. `subject:Patient`.
    Type(String),
}

impl SearchModifier {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(Self::Exact),
            "contains" => Some(Self::Contains),
            "text" => Some(Self::Text),
            "not" => Some(Self::Not),
            "missing" => Some(Self::Missing),
            "identifier" => Some(Self::Identifier),
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            other
                if !other.is_empty()
                    && other
                        .chars()
                        .next()
                        .map(|c| c.is_ascii_uppercase())
                        .unwrap_or(false) =>
            {
                Some(Self::Type(other.to_string()))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::Text => "text",
            Self::Not => "not",
            Self::Missing => "missing",
            Self::Identifier => "identifier",
            Self::Above => "above",
            Self::Below => "below",
            Self::Type(t) => t.as_str(),
        }
    }

    /// Whether this modifier is applicable to values of `param_type`.
    /// `:missing` applies everywhere.
    pub fn applies_to(&self, param_type: SearchParamType) -> bool {
        match self {
            Self::Missing => true,
            Self::Exact | Self::Contains => param_type == SearchParamType::String,
            Self::Text | Self::Not => param_type == SearchParamType::Token,
            Self::Identifier | Self::Type(_) => param_type == SearchParamType::Reference,
            Self::Above | Self::Below => param_type == SearchParamType::Uri,
        }
    }
}

/// Prefixes for ordered search values, e.g. `ge2020-01-01`, `lt5.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrefix {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Sa,
    Eb,
    Ap,
}

impl SearchPrefix {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            "sa" => Some(Self::Sa),
            "eb" => Some(Self::Eb),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }

    /// Split a leading prefix off an ordered-type value.
    pub fn split(value: &str) -> (Option<Self>, &str) {
        if value.len() >= 2
            && let Some(prefix) = Self::parse(&value[..2])
        {
            return (Some(prefix), &value[2..]);
        }
        (None, value)
    }
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Le => "le",
            Self::Sa => "sa",
            Self::Eb => "eb",
            Self::Ap => "ap",
        };
        f.write_str(s)
    }
}

/// One component of a composite search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameterComponent {
    /// Canonical URL of the component's SearchParameter definition.
    pub definition: String,
    /// Sub-expression relative to the composite root.
    pub expression: String,
}

/// A search parameter definition as consumed from FHIR SearchParameter
/// documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameter {
    pub code: String,
    pub url: String,
    pub param_type: SearchParamType,
    /// Resource types this parameter applies to; may contain the abstract
    /// bases `Resource` and `DomainResource`.
    pub base: Vec<String>,
    pub expression: Option<String>,
    /// Allowed target types for reference parameters.
    pub target: Vec<String>,
    pub modifiers: Vec<SearchModifier>,
    pub comparators: Vec<String>,
    pub component: Vec<SearchParameterComponent>,
    pub description: Option<String>,
}

impl SearchParameter {
    pub fn new(
        code: impl Into<String>,
        url: impl Into<String>,
        param_type: SearchParamType,
        base: Vec<String>,
    ) -> Self {
        Self {
            code: code.into(),
            url: url.into(),
            param_type,
            base,
            expression: None,
            target: Vec::new(),
            modifiers: Vec::new(),
            comparators: Vec::new(),
            component: Vec::new(),
            description: None,
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_targets(mut self, target: Vec<String>) -> Self {
        self.target = target;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<SearchModifier>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_comparators(mut self, comparators: Vec<String>) -> Self {
        self.comparators = comparators;
        self
    }

    pub fn with_components(mut self, component: Vec<SearchParameterComponent>) -> Self {
        self.component = component;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// A parameter is common when its base includes one of the abstract
    /// resource types.
    pub fn is_common(&self) -> bool {
        self.base
            .iter()
            .any(|b| b == "Resource" || b == "DomainResource")
    }
}
