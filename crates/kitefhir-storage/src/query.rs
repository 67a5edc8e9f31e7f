//! Typed search query IR.
//!
//! The search engine compiles URL parameters into this tree; backends
//! evaluate it against their index rows. Operands are structured values,
//! never query-string fragments.

use kitefhir_core::extract::DateRange;

use crate::types::TotalMode;

/// A complete, validated search query for one resource type.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub predicate: Predicate,
    pub offset: usize,
    pub count: usize,
    pub sort: Vec<SortKey>,
    pub total_mode: TotalMode,
}

impl SearchQuery {
    pub fn match_all(count: usize) -> Self {
        Self {
            predicate: Predicate::And(Vec::new()),
            offset: 0,
            count,
            sort: Vec::new(),
            total_mode: TotalMode::Accurate,
        }
    }
}

/// Boolean combination of per-parameter filters.
///
/// Repeating a parameter key produces an `Or` of its values; distinct keys
/// are `And`-ed together.
#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Leaf(ParamFilter),
}

impl Predicate {
    /// An empty conjunction, matching everything.
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }
}

/// A single test against the index rows of one search parameter.
#[derive(Debug, Clone)]
pub struct ParamFilter {
    /// Search parameter code the test applies to.
    pub param: String,
    pub test: ValueTest,
}

impl ParamFilter {
    pub fn new(param: impl Into<String>, test: ValueTest) -> Self {
        Self {
            param: param.into(),
            test,
        }
    }
}

/// The typed comparison a filter performs.
#[derive(Debug, Clone)]
pub enum ValueTest {
    /// `:missing=true|false`: presence test on the parameter itself.
    Missing(bool),
    Token(TokenTest),
    /// Case-insensitive substring match on token text (`:text`).
    TokenText(String),
    String { value: String, mode: StringMode },
    Date { op: ComparisonOp, range: DateRange },
    Number(NumberTest),
    Quantity {
        number: NumberTest,
        system: Option<String>,
        unit: Option<String>,
    },
    Reference(ReferenceTest),
    Uri { value: String, mode: UriMode },
}

/// Token matching: any combination of system and code, plus negation for
/// the `:not` modifier.
#[derive(Debug, Clone)]
pub struct TokenTest {
    /// `None`: system not constrained. `Some("")`: explicitly systemless
    /// (the `|code` form).
    pub system: Option<String>,
    /// `None`: any code within the system (the `system|` form).
    pub code: Option<String>,
    pub negate: bool,
}

/// String matching modes. The operand is already normalized for
/// `StartsWith`/`Contains`; `Exact` compares the original value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMode {
    StartsWith,
    Exact,
    Contains,
}

/// Ordered-type comparison operators (the FHIR search prefixes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
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

/// Number comparison with the implicit-precision range carried along:
/// `eq100` matches `[99.5, 100.5)`.
#[derive(Debug, Clone)]
pub struct NumberTest {
    pub op: ComparisonOp,
    pub value: f64,
    /// Implicit precision bounds derived from the literal's significant digits.
    pub low: f64,
    pub high: f64,
}

/// Reference matching: `Type/id`, absolute URL, bare id, or identifier.
#[derive(Debug, Clone)]
pub struct ReferenceTest {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub url: Option<String>,
    pub identifier: Option<(Option<String>, String)>,
}

/// URI matching modes for the `:above`/`:below` modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriMode {
    Exact,
    Above,
    Below,
}

/// One `_sort` component; `param` is an indexed parameter code or one of
/// the built-ins (`_id`, `_lastUpdated`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub param: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            descending: false,
        }
    }

    pub fn desc(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            descending: true,
        }
    }
}
