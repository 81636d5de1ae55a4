use bson::{Bson, Document};
use flint_query::ops;

use crate::driver::DriverError;

use super::filter::value_eq;

fn update_error(msg: impl Into<String>) -> DriverError {
    DriverError::backend(format!("update error: {}", msg.into()))
}

/// Apply an update document (`$set`, `$unset`, `$inc`, `$currentDate`) in
/// place. Returns whether the document changed.
pub(crate) fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, DriverError> {
    if update.is_empty() {
        return Err(update_error("update document must not be empty"));
    }
    let before = doc.clone();

    for (op, args) in update {
        let Bson::Document(args) = args else {
            return Err(update_error(format!("{op} argument must be a document")));
        };
        match op.as_str() {
            ops::SET => {
                for (path, value) in args {
                    set_path(doc, path, value.clone())?;
                }
            }
            ops::UNSET => {
                for (path, _) in args {
                    unset_path(doc, path);
                }
            }
            ops::INC => {
                for (path, delta) in args {
                    let current = super::filter::lookup_path(doc, path).cloned();
                    let next = increment(current.as_ref(), delta)
                        .ok_or_else(|| update_error(format!("cannot increment {path}")))?;
                    set_path(doc, path, next)?;
                }
            }
            ops::CURRENT_DATE => {
                for (path, spec) in args {
                    match spec {
                        Bson::Boolean(true) => {}
                        Bson::Document(t) if t.get_str("$type").is_ok_and(|t| t == "date") => {}
                        _ => return Err(update_error(format!("unsupported $currentDate spec for {path}"))),
                    }
                    set_path(doc, path, Bson::DateTime(bson::DateTime::now()))?;
                }
            }
            k if k.starts_with('$') => {
                return Err(update_error(format!("unknown update operator: {k}")));
            }
            k => {
                return Err(update_error(format!(
                    "update documents only take operators, found {k}"
                )));
            }
        }
    }

    Ok(*doc != before)
}

/// Seed document for an upsert: the plain equality entries of the filter.
pub(crate) fn upsert_seed(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(k, v)| {
            !k.starts_with('$')
                && !matches!(v, Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn increment(current: Option<&Bson>, delta: &Bson) -> Option<Bson> {
    let zero = Bson::Int32(0);
    match (current.unwrap_or(&zero), delta) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(a.checked_add(*b).map_or(Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32)),
        (Bson::Int32(a), Bson::Int64(b)) => Some(Bson::Int64(i64::from(*a) + b)),
        (Bson::Int64(a), Bson::Int32(b)) => Some(Bson::Int64(a + i64::from(*b))),
        (Bson::Int64(a), Bson::Int64(b)) => Some(Bson::Int64(a + b)),
        (a, b) => {
            let x = number(a)?;
            let y = number(b)?;
            Some(Bson::Double(x + y))
        }
    }
}

fn number(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<(), DriverError> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(sub)) => set_path(sub, rest, value),
                _ => Err(update_error(format!("cannot create field {rest} inside {head}"))),
            }
        }
    }
}

fn unset_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(sub)) = doc.get_mut(head) {
                unset_path(sub, rest);
            }
        }
    }
}

/// True if `docs` already holds a document with this `_id`.
pub(crate) fn has_id(docs: &[Document], id: &Bson) -> bool {
    docs.iter().any(|d| d.get("_id").is_some_and(|existing| value_eq(existing, id)))
}
