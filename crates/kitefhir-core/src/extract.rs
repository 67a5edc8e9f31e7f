//! Search index value extraction.
//!
//! Extracts typed values (token, string, date, number, quantity, reference,
//! uri) from FHIR resource JSON for indexing in the denormalized search
//! index. Expressions arriving here are already filtered to the concrete
//! resource type by the search parameter registry.

use serde_json::Value;
use time::{Date, Month, OffsetDateTime, Time, UtcOffset};

/// An inclusive timestamp range derived from a partial-precision FHIR date.
///
/// `1990` covers the whole calendar year, `1990-03` the month, and so on.
/// Equality on dates becomes interval containment, which removes per-query
/// precision branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl DateRange {
    pub fn instant(at: OffsetDateTime) -> Self {
        Self { start: at, end: at }
    }

    /// True when `self` lies entirely within `other`.
    pub fn within(&self, other: &DateRange) -> bool {
        other.start <= self.start && self.end <= other.end
    }

    /// True when the ranges share at least one instant.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A single extracted value, ready for the search index.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValue {
    String {
        exact: String,
        normalized: String,
    },
    Token {
        system: Option<String>,
        code: Option<String>,
        text: Option<String>,
    },
    Date(DateRange),
    Number(f64),
    Quantity {
        value: f64,
        system: Option<String>,
        unit: Option<String>,
    },
    Reference {
        target_type: Option<String>,
        target_id: Option<String>,
        raw: Option<String>,
        identifier: Option<(Option<String>, String)>,
    },
    Uri(String),
}

/// The shape of value an extraction pass is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind {
    String,
    Token,
    Date,
    Number,
    Quantity,
    Reference,
    Uri,
}

// ============================================================================
// String normalization
// ============================================================================

/// Normalize a string for search: lowercase plus accent folding.
///
/// Applied identically at index-write time and to query operands, so the
/// two sides always compare under the same function.
pub fn normalize_string(s: &str) -> String {
    s.chars()
        .flat_map(|c| c.to_lowercase())
        .map(fold_accent)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'š' | 'ś' => 's',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' | 'ź' | 'ż' => 'z',
        other => other,
    }
}

// ============================================================================
// Date parsing
// ============================================================================

/// Parse a FHIR date/dateTime string into a start/end range based on its
/// precision. Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, and full RFC 3339
/// instants (timezone-aware).
pub fn parse_date_range(date_str: &str) -> Option<DateRange> {
    let trimmed = date_str.trim();
    let len = trimmed.len();

    // Year only: "2024"
    if len == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = trimmed.parse().ok()?;
        return Some(DateRange {
            start: utc_datetime(year, 1, 1, Time::MIDNIGHT)?,
            end: utc_datetime(year, 12, 31, end_of_day())?,
        });
    }

    // Year-Month: "2024-03"
    if len == 7 && trimmed.as_bytes().get(4) == Some(&b'-') {
        let year: i32 = trimmed[..4].parse().ok()?;
        let month: u8 = trimmed[5..7].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        let last_day = days_in_month(year, month);
        return Some(DateRange {
            start: utc_datetime(year, month, 1, Time::MIDNIGHT)?,
            end: utc_datetime(year, month, last_day, end_of_day())?,
        });
    }

    // Full date: "2024-03-15"
    if len == 10 && !trimmed.contains('T') {
        let year: i32 = trimmed[..4].parse().ok()?;
        let month: u8 = trimmed[5..7].parse().ok()?;
        let day: u8 = trimmed[8..10].parse().ok()?;
        return Some(DateRange {
            start: utc_datetime(year, month, day, Time::MIDNIGHT)?,
            end: utc_datetime(year, month, day, end_of_day())?,
        });
    }

    // Full instant with timezone
    if trimmed.contains('T') {
        let parsed = OffsetDateTime::parse(
            trimmed,
            &time::format_description::well_known::Rfc3339,
        )
        .ok()?;
        return Some(DateRange::instant(parsed));
    }

    None
}

fn utc_datetime(year: i32, month: u8, day: u8, t: Time) -> Option<OffsetDateTime> {
    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    Some(date.with_time(t).assume_offset(UtcOffset::UTC))
}

fn end_of_day() -> Time {
    Time::from_hms_milli(23, 59, 59, 999).expect("valid time literal")
}

/// Get number of days in a month.
fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

// ============================================================================
// Expression handling
// ============================================================================

/// Split a (possibly multi-path) FHIRPath expression into its `|`-separated
/// components, trimming surrounding whitespace.
pub fn expression_components(expression: &str) -> Vec<&str> {
    expression
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Convert one FHIRPath component into JSON path segments.
///
/// Simplified conversion for the patterns FHIR core search parameters use:
/// strips the resource type prefix, `as Type` casts, function calls like
/// `.where(...)`, and array subscripts.
fn fhirpath_to_segments(component: &str, resource_type: &str) -> Vec<String> {
    // Strip `as Type` casting, with or without parentheses
    let expr = if let Some(idx) = component.find(" as ") {
        component[..idx]
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
    } else {
        component
    };

    // Strip resource type prefix (concrete type or the abstract bases)
    let expr = expr
        .strip_prefix(&format!("{resource_type}."))
        .or_else(|| expr.strip_prefix("Resource."))
        .or_else(|| expr.strip_prefix("DomainResource."))
        .or_else(|| {
            let idx = expr.find('.')?;
            let prefix = &expr[..idx];
            prefix
                .chars()
                .next()
                .filter(|c| c.is_ascii_uppercase())
                .map(|_| &expr[idx + 1..])
        })
        .unwrap_or(expr);

    let expr = strip_fhirpath_functions(expr);

    expr.split('.')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(base) = s.strip_suffix(']')
                && let Some((name, _)) = base.split_once('[')
            {
                return name.to_string();
            }
            s.to_string()
        })
        .collect()
}

/// Strip FHIRPath function calls, keeping property paths.
fn strip_fhirpath_functions(expr: &str) -> String {
    let mut result = String::with_capacity(expr.len());
    let mut i = 0;
    let bytes = expr.as_bytes();

    while i < bytes.len() {
        if bytes[i] == b'(' {
            let mut depth = 1;
            i += 1;
            while i < bytes.len() && depth > 0 {
                match bytes[i] {
                    b'(' => depth += 1,
                    b')' => depth -= 1,
                    _ => {}
                }
                i += 1;
            }
            if let Some(dot_pos) = result.rfind('.') {
                if is_fhirpath_function(&result[dot_pos + 1..]) {
                    result.truncate(dot_pos);
                }
            } else if is_fhirpath_function(&result) {
                result.clear();
            }
        } else {
            result.push(bytes[i] as char);
            i += 1;
        }
    }

    while result.ends_with('.') {
        result.pop();
    }
    while result.starts_with('.') {
        result.remove(0);
    }

    result
}

fn is_fhirpath_function(name: &str) -> bool {
    matches!(
        name,
        "where"
            | "resolve"
            | "ofType"
            | "exists"
            | "empty"
            | "first"
            | "last"
            | "as"
            | "is"
            | "not"
            | "all"
            | "count"
            | "distinct"
            | "single"
    )
}

/// Navigate JSON following path segments, collecting leaf values.
///
/// Arrays are traversed transparently, and FHIR polymorphic fields are
/// matched by prefix: a segment `effective` collects `effectiveDateTime`
/// and `effectivePeriod` alike.
fn navigate_json(value: &Value, segments: &[String], depth: usize, results: &mut Vec<Value>) {
    if depth >= segments.len() {
        match value {
            Value::Array(arr) => {
                for item in arr {
                    results.push(item.clone());
                }
            }
            Value::Null => {}
            _ => results.push(value.clone()),
        }
        return;
    }

    let segment = &segments[depth];

    match value {
        Value::Object(obj) => {
            if let Some(child) = obj.get(segment.as_str()) {
                navigate_json(child, segments, depth + 1, results);
            } else {
                for (key, child) in obj {
                    if key.len() > segment.len()
                        && key.starts_with(segment.as_str())
                        && key.as_bytes()[segment.len()].is_ascii_uppercase()
                    {
                        navigate_json(child, segments, depth + 1, results);
                    }
                }
            }
        }
        Value::Array(arr) => {
            for item in arr {
                navigate_json(item, segments, depth, results);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Typed extraction
// ============================================================================

/// Extract values of `kind` from `resource` using a FHIRPath expression.
///
/// Every `|`-separated component of the expression is navigated; the union
/// of all matches is returned.
pub fn extract_values(
    resource: &Value,
    resource_type: &str,
    expression: &str,
    kind: ExtractKind,
) -> Vec<ExtractedValue> {
    let mut nodes = Vec::new();
    for component in expression_components(expression) {
        let segments = fhirpath_to_segments(component, resource_type);
        if segments.is_empty() {
            continue;
        }
        navigate_json(resource, &segments, 0, &mut nodes);
    }

    let mut results = Vec::new();
    for node in nodes {
        match kind {
            ExtractKind::String => collect_strings(&node, &mut results),
            ExtractKind::Token => collect_tokens(&node, &mut results),
            ExtractKind::Date => collect_dates(&node, &mut results),
            ExtractKind::Number => collect_numbers(&node, &mut results),
            ExtractKind::Quantity => collect_quantities(&node, &mut results),
            ExtractKind::Reference => collect_references(&node, &mut results),
            ExtractKind::Uri => collect_uris(&node, &mut results),
        }
    }
    results
}

fn push_string(s: &str, results: &mut Vec<ExtractedValue>) {
    if !s.is_empty() {
        results.push(ExtractedValue::String {
            exact: s.to_string(),
            normalized: normalize_string(s),
        });
    }
}

fn collect_strings(node: &Value, results: &mut Vec<ExtractedValue>) {
    match node {
        Value::String(s) => push_string(s, results),
        Value::Object(obj) => {
            // HumanName: family + given + text
            if obj.contains_key("family") || obj.contains_key("given") {
                if let Some(family) = obj.get("family").and_then(Value::as_str) {
                    push_string(family, results);
                }
                if let Some(given) = obj.get("given").and_then(Value::as_array) {
                    for g in given.iter().filter_map(Value::as_str) {
                        push_string(g, results);
                    }
                }
                if let Some(text) = obj.get("text").and_then(Value::as_str) {
                    push_string(text, results);
                }
                return;
            }
            // Address: line + city/state/country/postalCode/district/text
            if obj.contains_key("line") || obj.contains_key("city") {
                for field in ["city", "state", "country", "postalCode", "district", "text"] {
                    if let Some(v) = obj.get(field).and_then(Value::as_str) {
                        push_string(v, results);
                    }
                }
                if let Some(lines) = obj.get("line").and_then(Value::as_array) {
                    for line in lines.iter().filter_map(Value::as_str) {
                        push_string(line, results);
                    }
                }
            }
        }
        _ => {}
    }
}

fn collect_tokens(node: &Value, results: &mut Vec<ExtractedValue>) {
    match node {
        // Bare `code` / `string` / `id` element
        Value::String(s) if !s.is_empty() => results.push(ExtractedValue::Token {
            system: None,
            code: Some(s.clone()),
            text: None,
        }),
        Value::Bool(b) => results.push(ExtractedValue::Token {
            system: None,
            code: Some(b.to_string()),
            text: None,
        }),
        Value::Object(obj) => {
            // CodeableConcept
            if let Some(codings) = obj.get("coding").and_then(Value::as_array) {
                let text = obj.get("text").and_then(Value::as_str).map(String::from);
                for coding in codings {
                    results.push(ExtractedValue::Token {
                        system: coding
                            .get("system")
                            .and_then(Value::as_str)
                            .map(String::from),
                        code: coding.get("code").and_then(Value::as_str).map(String::from),
                        text: coding
                            .get("display")
                            .and_then(Value::as_str)
                            .map(String::from)
                            .or_else(|| text.clone()),
                    });
                }
                return;
            }
            // Coding
            if obj.contains_key("code") && obj.contains_key("system") {
                results.push(ExtractedValue::Token {
                    system: obj.get("system").and_then(Value::as_str).map(String::from),
                    code: obj.get("code").and_then(Value::as_str).map(String::from),
                    text: obj.get("display").and_then(Value::as_str).map(String::from),
                });
                return;
            }
            // Identifier / ContactPoint: system + value
            if let Some(value) = obj.get("value").and_then(Value::as_str) {
                results.push(ExtractedValue::Token {
                    system: obj.get("system").and_then(Value::as_str).map(String::from),
                    code: Some(value.to_string()),
                    text: obj
                        .get("type")
                        .and_then(|t| t.get("text"))
                        .and_then(Value::as_str)
                        .map(String::from),
                });
            }
        }
        _ => {}
    }
}

fn collect_dates(node: &Value, results: &mut Vec<ExtractedValue>) {
    match node {
        Value::String(s) => {
            if let Some(range) = parse_date_range(s) {
                results.push(ExtractedValue::Date(range));
            }
        }
        Value::Object(obj) if obj.contains_key("start") || obj.contains_key("end") => {
            // Period: open ends collapse to the known bound
            let start = obj
                .get("start")
                .and_then(Value::as_str)
                .and_then(parse_date_range)
                .map(|r| r.start);
            let end = obj
                .get("end")
                .and_then(Value::as_str)
                .and_then(parse_date_range)
                .map(|r| r.end);
            match (start, end) {
                (Some(s), Some(e)) => results.push(ExtractedValue::Date(DateRange { start: s, end: e })),
                (Some(s), None) => results.push(ExtractedValue::Date(DateRange { start: s, end: s })),
                (None, Some(e)) => results.push(ExtractedValue::Date(DateRange { start: e, end: e })),
                (None, None) => {}
            }
        }
        _ => {}
    }
}

fn collect_numbers(node: &Value, results: &mut Vec<ExtractedValue>) {
    if let Some(n) = node.as_f64() {
        results.push(ExtractedValue::Number(n));
    }
}

fn collect_quantities(node: &Value, results: &mut Vec<ExtractedValue>) {
    if let Value::Object(obj) = node
        && let Some(value) = obj.get("value").and_then(Value::as_f64)
    {
        results.push(ExtractedValue::Quantity {
            value,
            system: obj.get("system").and_then(Value::as_str).map(String::from),
            unit: obj
                .get("code")
                .and_then(Value::as_str)
                .or_else(|| obj.get("unit").and_then(Value::as_str))
                .map(String::from),
        });
    }
}

fn collect_references(node: &Value, results: &mut Vec<ExtractedValue>) {
    let Value::Object(obj) = node else {
        return;
    };

    let raw = obj.get("reference").and_then(Value::as_str);
    let identifier = obj.get("identifier").and_then(|ident| {
        let value = ident.get("value").and_then(Value::as_str)?;
        Some((
            ident.get("system").and_then(Value::as_str).map(String::from),
            value.to_string(),
        ))
    });

    if raw.is_none() && identifier.is_none() {
        return;
    }

    let (target_type, target_id) = raw.map(parse_reference_target).unwrap_or((None, None));
    results.push(ExtractedValue::Reference {
        target_type,
        target_id,
        raw: raw.map(String::from),
        identifier,
    });
}

/// Split a reference string into (type, id).
///
/// Handles `Type/id`, absolute URLs ending in `.../Type/id`, and bare ids.
fn parse_reference_target(reference: &str) -> (Option<String>, Option<String>) {
    if reference.starts_with('#') {
        // Contained reference, not indexable
        return (None, None);
    }
    let trimmed = reference.trim_end_matches('/');
    let mut parts = trimmed.rsplit('/');
    let last = parts.next();
    let second_last = parts.next();
    match (second_last, last) {
        (Some(t), Some(id))
            if t.chars()
                .next()
                .map(|c| c.is_ascii_uppercase())
                .unwrap_or(false) =>
        {
            (Some(t.to_string()), Some(id.to_string()))
        }
        (None, Some(id)) if !id.is_empty() => (None, Some(id.to_string())),
        _ => (None, None),
    }
}

fn collect_uris(node: &Value, results: &mut Vec<ExtractedValue>) {
    if let Some(s) = node.as_str()
        && !s.is_empty()
    {
        results.push(ExtractedValue::Uri(s.to_string()));
    }
}
