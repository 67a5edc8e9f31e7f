//! Predicate evaluation against index rows.

use kitefhir_core::extract::{DateRange, ExtractedValue};
use kitefhir_storage::{
    ComparisonOp, IndexEntry, NumberTest, ParamFilter, Predicate, ReferenceTest, StringMode,
    TokenTest, UriMode, ValueTest,
};

/// Evaluate a predicate tree against one resource's index rows.
pub(crate) fn eval_predicate(predicate: &Predicate, index: &[IndexEntry]) -> bool {
    match predicate {
        Predicate::And(children) => children.iter().all(|c| eval_predicate(c, index)),
        Predicate::Or(children) => children.iter().any(|c| eval_predicate(c, index)),
        Predicate::Leaf(filter) => eval_filter(filter, index),
    }
}

fn eval_filter(filter: &ParamFilter, index: &[IndexEntry]) -> bool {
    let rows: Vec<&ExtractedValue> = index
        .iter()
        .filter(|e| e.param == filter.param)
        .map(|e| &e.value)
        .collect();

    match &filter.test {
        ValueTest::Missing(want_missing) => rows.is_empty() == *want_missing,
        ValueTest::Token(test) => {
            let hit = rows.iter().any(|v| token_matches(test, v));
            if test.negate { !hit } else { hit }
        }
        ValueTest::TokenText(needle) => {
            let needle = needle.to_lowercase();
            rows.iter().any(|v| {
                matches!(v, ExtractedValue::Token { text: Some(t), .. }
                    if t.to_lowercase().contains(&needle))
            })
        }
        ValueTest::String { value, mode } => rows.iter().any(|v| string_matches(value, *mode, v)),
        ValueTest::Date { op, range } => rows.iter().any(|v| {
            matches!(v, ExtractedValue::Date(stored) if date_matches(*op, range, stored))
        }),
        ValueTest::Number(test) => rows.iter().any(|v| {
            matches!(v, ExtractedValue::Number(n) if number_matches(test, *n))
        }),
        ValueTest::Quantity {
            number,
            system,
            unit,
        } => rows.iter().any(|v| quantity_matches(number, system, unit, v)),
        ValueTest::Reference(test) => rows.iter().any(|v| reference_matches(test, v)),
        ValueTest::Uri { value, mode } => rows.iter().any(|v| {
            matches!(v, ExtractedValue::Uri(stored) if uri_matches(value, *mode, stored))
        }),
    }
}

fn token_matches(test: &TokenTest, value: &ExtractedValue) -> bool {
    let ExtractedValue::Token { system, code, .. } = value else {
        return false;
    };

    if let Some(wanted_code) = &test.code
        && code.as_deref() != Some(wanted_code.as_str())
    {
        return false;
    }

    match test.system.as_deref() {
        // `code` form: system unconstrained
        None => true,
        // `|code` form: explicitly systemless
        Some("") => system.is_none(),
        Some(wanted) => system.as_deref() == Some(wanted),
    }
}

fn string_matches(query: &str, mode: StringMode, value: &ExtractedValue) -> bool {
    let ExtractedValue::String { exact, normalized } = value else {
        return false;
    };
    match mode {
        StringMode::StartsWith => normalized.starts_with(query),
        StringMode::Exact => exact == query,
        StringMode::Contains => normalized.contains(query),
    }
}

fn date_matches(op: ComparisonOp, query: &DateRange, stored: &DateRange) -> bool {
    match op {
        // eq: the stored range lies entirely within the query precision
        ComparisonOp::Eq => stored.within(query),
        // ne: no overlap at all
        ComparisonOp::Ne => !stored.overlaps(query),
        ComparisonOp::Gt => stored.end > query.end,
        ComparisonOp::Lt => stored.start < query.start,
        ComparisonOp::Ge => stored.end >= query.start,
        ComparisonOp::Le => stored.start <= query.end,
        ComparisonOp::Sa => stored.start > query.end,
        ComparisonOp::Eb => stored.end < query.start,
        ComparisonOp::Ap => {
            // approximately: overlap with the query padded by 10% of its span
            let pad = (query.end - query.start) / 10;
            stored.start <= query.end + pad && stored.end >= query.start - pad
        }
    }
}

fn number_matches(test: &NumberTest, value: f64) -> bool {
    match test.op {
        ComparisonOp::Eq => test.low <= value && value < test.high,
        ComparisonOp::Ne => !(test.low <= value && value < test.high),
        ComparisonOp::Gt => value > test.value,
        ComparisonOp::Lt => value < test.value,
        ComparisonOp::Ge => value >= test.value,
        ComparisonOp::Le => value <= test.value,
        ComparisonOp::Sa => value >= test.high,
        ComparisonOp::Eb => value < test.low,
        ComparisonOp::Ap => (value - test.value).abs() <= 0.1 * test.value.abs(),
    }
}

fn quantity_matches(
    number: &NumberTest,
    system: &Option<String>,
    unit: &Option<String>,
    value: &ExtractedValue,
) -> bool {
    let ExtractedValue::Quantity {
        value: stored,
        system: stored_system,
        unit: stored_unit,
    } = value
    else {
        return false;
    };

    if !number_matches(number, *stored) {
        return false;
    }
    if let Some(wanted) = system
        && stored_system.as_deref() != Some(wanted.as_str())
    {
        return false;
    }
    if let Some(wanted) = unit
        && stored_unit.as_deref() != Some(wanted.as_str())
    {
        return false;
    }
    true
}

fn reference_matches(test: &ReferenceTest, value: &ExtractedValue) -> bool {
    let ExtractedValue::Reference {
        target_type,
        target_id,
        raw,
        identifier,
    } = value
    else {
        return false;
    };

    // :identifier searches Reference.identifier only
    if let Some((wanted_system, wanted_value)) = &test.identifier {
        let Some((stored_system, stored_value)) = identifier else {
            return false;
        };
        if stored_value != wanted_value {
            return false;
        }
        return match wanted_system {
            None => true,
            Some(s) => stored_system.as_deref() == Some(s.as_str()),
        };
    }

    // absolute URL: the raw reference matches outright
    if let Some(url) = &test.url
        && raw.as_deref() == Some(url.as_str())
    {
        return true;
    }

    if let Some(wanted_type) = &test.target_type
        && target_type.as_deref() != Some(wanted_type.as_str())
    {
        return false;
    }
    match &test.target_id {
        Some(wanted_id) => target_id.as_deref() == Some(wanted_id.as_str()),
        None => false,
    }
}

fn uri_matches(query: &str, mode: UriMode, stored: &str) -> bool {
    match mode {
        UriMode::Exact => stored == query,
        // below: stored values underneath the query hierarchy
        UriMode::Below => stored.starts_with(query),
        // above: stored values that are ancestors of the query
        UriMode::Above => query.starts_with(stored),
    }
}

/// Sort comparison value for one resource under a sort parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SortValue {
    Text(String),
    Number(f64),
    Time(time::OffsetDateTime),
}

impl SortValue {
    pub(crate) fn compare(a: &Option<SortValue>, b: &Option<SortValue>) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (a, b) {
            (None, None) => Ordering::Equal,
            // missing values sort last
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => match (x, y) {
                (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
                (SortValue::Number(x), SortValue::Number(y)) => {
                    x.partial_cmp(y).unwrap_or(Ordering::Equal)
                }
                (SortValue::Time(x), SortValue::Time(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
        }
    }
}

/// The first index value of `param`, rendered as a sortable key.
pub(crate) fn sort_value(index: &[IndexEntry], param: &str) -> Option<SortValue> {
    index
        .iter()
        .find(|e| e.param == param)
        .map(|e| match &e.value {
            ExtractedValue::String { normalized, .. } => SortValue::Text(normalized.clone()),
            ExtractedValue::Token { code, system, .. } => SortValue::Text(
                code.clone()
                    .or_else(|| system.clone())
                    .unwrap_or_default(),
            ),
            ExtractedValue::Date(range) => SortValue::Time(range.start),
            ExtractedValue::Number(n) => SortValue::Number(*n),
            ExtractedValue::Quantity { value, .. } => SortValue::Number(*value),
            ExtractedValue::Reference {
                target_id, raw, ..
            } => SortValue::Text(
                target_id
                    .clone()
                    .or_else(|| raw.clone())
                    .unwrap_or_default(),
            ),
            ExtractedValue::Uri(u) => SortValue::Text(u.clone()),
        })
}
