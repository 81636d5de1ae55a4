use std::cmp::Ordering;

use bson::{Bson, Document};
use flint_query::ops;

use crate::driver::DriverError;

/// Parsed form of a filter document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expression {
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Nor(Vec<Expression>),
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    In(String, Vec<Bson>),
    Nin(String, Vec<Bson>),
    Exists(String, bool),
    ElemMatch(String, Box<Expression>),
}

fn parse_error(msg: impl Into<String>) -> DriverError {
    DriverError::backend(format!("filter parse error: {}", msg.into()))
}

/// Parse a filter document into an [`Expression`] tree.
///
/// - Top-level document is an implicit AND of all entries; empty matches all
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `$and` / `$or` / `$nor` take arrays of filter documents
pub(crate) fn parse_filter(doc: &Document) -> Result<Expression, DriverError> {
    let mut children = Vec::with_capacity(doc.len());

    for (key, value) in doc {
        match key.as_str() {
            ops::AND => children.push(Expression::And(parse_logical_array(key, value)?)),
            ops::OR => children.push(Expression::Or(parse_logical_array(key, value)?)),
            ops::NOR => children.push(Expression::Nor(parse_logical_array(key, value)?)),
            k if k.starts_with('$') => {
                return Err(parse_error(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    Ok(collapse(children))
}

fn collapse(mut children: Vec<Expression>) -> Expression {
    if children.len() == 1 {
        children.remove(0)
    } else {
        Expression::And(children)
    }
}

fn parse_logical_array(op: &str, value: &Bson) -> Result<Vec<Expression>, DriverError> {
    let Bson::Array(items) = value else {
        return Err(parse_error(format!("{op} value must be an array")));
    };
    if items.is_empty() {
        return Err(parse_error(format!("{op} array must not be empty")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => parse_filter(sub),
            _ => Err(parse_error(format!("{op} array elements must be documents"))),
        })
        .collect()
}

fn parse_field_condition(field: &str, value: &Bson) -> Result<Expression, DriverError> {
    if let Bson::Document(sub) = value {
        if sub.keys().next().is_some_and(|k| k.starts_with('$')) {
            return parse_operator_doc(field, sub);
        }
    }
    Ok(Expression::Eq(field.to_string(), value.clone()))
}

fn parse_operator_doc(field: &str, doc: &Document) -> Result<Expression, DriverError> {
    let mut conditions = Vec::with_capacity(doc.len());
    let f = || field.to_string();

    for (op, value) in doc {
        let expr = match op.as_str() {
            ops::EQ => Expression::Eq(f(), value.clone()),
            ops::NE => Expression::Ne(f(), value.clone()),
            ops::GT => Expression::Gt(f(), value.clone()),
            ops::GTE => Expression::Gte(f(), value.clone()),
            ops::LT => Expression::Lt(f(), value.clone()),
            ops::LTE => Expression::Lte(f(), value.clone()),
            ops::IN | ops::NIN => {
                let Bson::Array(values) = value else {
                    return Err(parse_error(format!("{op} value must be an array")));
                };
                if op == ops::IN {
                    Expression::In(f(), values.clone())
                } else {
                    Expression::Nin(f(), values.clone())
                }
            }
            ops::EXISTS => match value {
                Bson::Boolean(b) => Expression::Exists(f(), *b),
                _ => return Err(parse_error("$exists value must be a boolean")),
            },
            ops::ELEM_MATCH => match value {
                Bson::Document(sub) => Expression::ElemMatch(f(), Box::new(parse_filter(sub)?)),
                _ => return Err(parse_error("$elemMatch value must be a document")),
            },
            k => return Err(parse_error(format!("unknown field operator: {k}"))),
        };
        conditions.push(expr);
    }

    Ok(collapse(conditions))
}

// ── Evaluation ──────────────────────────────────────────────────

/// Resolve a dotted path through nested documents.
pub(crate) fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        match current {
            Bson::Document(sub) => current = sub.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

pub(crate) fn matches(doc: &Document, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|c| matches(doc, c)),
        Expression::Or(children) => children.iter().any(|c| matches(doc, c)),
        Expression::Nor(children) => !children.iter().any(|c| matches(doc, c)),
        Expression::Eq(field, val) => field_eq(lookup_path(doc, field), val),
        Expression::Ne(field, val) => !field_eq(lookup_path(doc, field), val),
        Expression::In(field, vals) => {
            let found = lookup_path(doc, field);
            vals.iter().any(|v| field_eq(found, v))
        }
        Expression::Nin(field, vals) => {
            let found = lookup_path(doc, field);
            !vals.iter().any(|v| field_eq(found, v))
        }
        Expression::Gt(field, val)
        | Expression::Gte(field, val)
        | Expression::Lt(field, val)
        | Expression::Lte(field, val) => {
            let predicate: fn(Ordering) -> bool = match expr {
                Expression::Gt(..) => |o| o == Ordering::Greater,
                Expression::Gte(..) => |o| o != Ordering::Less,
                Expression::Lt(..) => |o| o == Ordering::Less,
                _ => |o| o != Ordering::Greater,
            };
            match lookup_path(doc, field) {
                Some(Bson::Array(items)) => items
                    .iter()
                    .any(|item| value_cmp(item, val).is_some_and(predicate)),
                Some(found) => value_cmp(found, val).is_some_and(predicate),
                None => false,
            }
        }
        Expression::Exists(field, expected) => lookup_path(doc, field).is_some() == *expected,
        Expression::ElemMatch(field, sub) => match lookup_path(doc, field) {
            Some(Bson::Array(items)) => items
                .iter()
                .any(|item| matches!(item, Bson::Document(d) if self::matches(d, sub))),
            _ => false,
        },
    }
}

fn field_eq(found: Option<&Bson>, val: &Bson) -> bool {
    match (found, val) {
        // null matches both missing fields and explicit nulls
        (None, Bson::Null) => true,
        (None, _) => false,
        (Some(found @ Bson::Array(items)), _) => {
            items.iter().any(|item| value_eq(item, val)) || found == val
        }
        (Some(found), _) => value_eq(found, val),
    }
}

fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

pub(crate) fn value_eq(a: &Bson, b: &Bson) -> bool {
    match value_cmp(a, b) {
        Some(o) => o == Ordering::Equal,
        None => a == b,
    }
}

/// Ordering between two values of comparable types; `None` otherwise.
pub(crate) fn value_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(v: Option<&Bson>) -> u8 {
    match v {
        None | Some(Bson::Null) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

/// Total order used when sorting: type rank first, then value.
pub(crate) fn sort_cmp(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Some(x), Some(y)) => value_cmp(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    })
}

/// Compare two documents by a `{ field: 1 | -1, ... }` spec.
pub(crate) fn compare_by(spec: &Document, a: &Document, b: &Document) -> Ordering {
    spec.iter().fold(Ordering::Equal, |acc, (field, direction)| {
        acc.then_with(|| {
            let o = sort_cmp(lookup_path(a, field), lookup_path(b, field));
            if as_i64(direction).is_some_and(|d| d < 0) {
                o.reverse()
            } else {
                o
            }
        })
    })
}

/// Sort in place by a `{ field: 1 | -1, ... }` spec. Stable.
pub(crate) fn sort_documents(docs: &mut [Document], spec: &Document) {
    docs.sort_by(|a, b| compare_by(spec, a, b));
}
