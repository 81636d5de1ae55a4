use std::collections::HashMap;

use bson::{Bson, Document};
use flint_query::ops;

use crate::driver::{Deadline, DriverError, Namespace};

use super::filter::{lookup_path, matches, parse_filter, sort_documents, value_eq};

fn stage_error(stage: &str, msg: impl std::fmt::Display) -> DriverError {
    DriverError::backend(format!("{stage}: {msg}"))
}

/// Evaluates aggregation pipelines against in-memory collections.
pub(crate) struct Aggregator<'a> {
    pub(crate) collections: &'a HashMap<Namespace, Vec<Document>>,
    pub(crate) database: &'a str,
    pub(crate) deadline: &'a Deadline,
}

impl Aggregator<'_> {
    pub(crate) fn run(
        &self,
        mut docs: Vec<Document>,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, DriverError> {
        for stage in pipeline {
            self.deadline.check()?;
            let mut entries = stage.iter();
            let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
                return Err(DriverError::backend(
                    "a pipeline stage must have exactly one field",
                ));
            };
            docs = self.stage(name, spec, docs)?;
        }
        Ok(docs)
    }

    fn stage(
        &self,
        name: &str,
        spec: &Bson,
        mut docs: Vec<Document>,
    ) -> Result<Vec<Document>, DriverError> {
        match (name, spec) {
            (ops::MATCH, Bson::Document(filter)) => {
                let expr = parse_filter(filter)?;
                docs.retain(|d| matches(d, &expr));
                Ok(docs)
            }
            (ops::LOOKUP, Bson::Document(spec)) => self.lookup(spec, docs),
            (ops::PROJECT, Bson::Document(spec)) => {
                docs.iter().map(|d| project(d, spec)).collect()
            }
            (ops::FACET, Bson::Document(spec)) => {
                let mut out = Document::new();
                for (facet, sub) in spec {
                    let Bson::Array(stages) = sub else {
                        return Err(stage_error(name, format!("{facet} must be an array")));
                    };
                    let stages = stages
                        .iter()
                        .map(|s| match s {
                            Bson::Document(d) => Ok(d.clone()),
                            _ => Err(stage_error(name, "sub-pipeline stages must be documents")),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    let result = self.run(docs.clone(), &stages)?;
                    out.insert(facet, result.into_iter().map(Bson::Document).collect::<Vec<_>>());
                }
                Ok(vec![out])
            }
            (ops::GROUP, Bson::Document(spec)) => group(spec, docs),
            (ops::SORT, Bson::Document(spec)) => {
                sort_documents(&mut docs, spec);
                Ok(docs)
            }
            (ops::SKIP, n) => {
                let n = non_negative(name, n)?;
                Ok(docs.into_iter().skip(n).collect())
            }
            (ops::LIMIT, n) => {
                let n = non_negative(name, n)?;
                if n == 0 {
                    return Err(stage_error(name, "limit must be positive"));
                }
                docs.truncate(n);
                Ok(docs)
            }
            (ops::COUNT, Bson::String(field)) => {
                if docs.is_empty() {
                    return Ok(Vec::new());
                }
                let mut out = Document::new();
                out.insert(field.as_str(), count_bson(docs.len() as i64));
                Ok(vec![out])
            }
            (name, _) => Err(stage_error(name, "unsupported stage or malformed argument")),
        }
    }

    fn lookup(&self, spec: &Document, mut docs: Vec<Document>) -> Result<Vec<Document>, DriverError> {
        let field = |key: &str| {
            spec.get_str(key)
                .map_err(|_| stage_error("$lookup", format!("{key} must be a string")))
        };
        let from = field("from")?;
        let local = field("localField")?;
        let foreign = field("foreignField")?;
        let alias = field("as")?;

        let ns = Namespace::new(self.database, from);
        let foreign_docs = self.collections.get(&ns).map(Vec::as_slice).unwrap_or(&[]);

        for doc in &mut docs {
            let local_value = lookup_path(doc, local).cloned().unwrap_or(Bson::Null);
            let joined: Vec<Bson> = foreign_docs
                .iter()
                .filter(|f| {
                    let foreign_value = lookup_path(f, foreign).unwrap_or(&Bson::Null);
                    match &local_value {
                        Bson::Array(items) => items.iter().any(|i| value_eq(i, foreign_value)),
                        v => value_eq(v, foreign_value),
                    }
                })
                .cloned()
                .map(Bson::Document)
                .collect();
            doc.insert(alias, joined);
        }
        Ok(docs)
    }
}

fn non_negative(stage: &str, v: &Bson) -> Result<usize, DriverError> {
    let n = match v {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        _ => return Err(stage_error(stage, "argument must be an integer")),
    };
    usize::try_from(n).map_err(|_| stage_error(stage, "argument must not be negative"))
}

fn count_bson(n: i64) -> Bson {
    match i32::try_from(n) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(n),
    }
}

fn is_flag(v: &Bson) -> bool {
    matches!(
        v,
        Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)
    )
}

fn is_truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => false,
    }
}

/// Apply a projection document to one document.
///
/// Supports inclusion (`field: 1`), exclusion (`field: 0`), `$elemMatch`
/// over arrays of subdocuments, and `"$path"` references. Projected keys are
/// top-level.
pub(crate) fn project(doc: &Document, spec: &Document) -> Result<Document, DriverError> {
    let inclusive = spec
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .any(|(_, v)| is_truthy(v) || !is_flag(v));

    if !inclusive {
        let mut out = doc.clone();
        for (k, _) in spec.iter().filter(|(_, v)| !is_truthy(v)) {
            out.remove(k);
        }
        return Ok(out);
    }

    let mut out = Document::new();
    if spec.get("_id").is_none_or(is_truthy) {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for (key, value) in spec {
        if key == "_id" {
            continue;
        }
        match value {
            Bson::Document(op) if op.contains_key(ops::ELEM_MATCH) => {
                let Ok(sub) = op.get_document(ops::ELEM_MATCH) else {
                    return Err(stage_error("$project", "$elemMatch must be a document"));
                };
                let expr = parse_filter(sub)?;
                if let Some(Bson::Array(items)) = doc.get(key) {
                    let first = items
                        .iter()
                        .find(|i| matches!(i, Bson::Document(d) if matches(d, &expr)));
                    if let Some(hit) = first {
                        out.insert(key, vec![hit.clone()]);
                    }
                }
            }
            Bson::String(path) if path.starts_with('$') => {
                if let Some(v) = lookup_path(doc, &path[1..]) {
                    out.insert(key, v.clone());
                }
            }
            v if is_truthy(v) => {
                if let Some(found) = lookup_path(doc, key) {
                    out.insert(key, found.clone());
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

enum Sum {
    Int(i64),
    Float(f64),
}

impl Sum {
    fn add(self, v: &Bson) -> Sum {
        match (self, v) {
            (Sum::Int(a), Bson::Int32(b)) => Sum::Int(a + i64::from(*b)),
            (Sum::Int(a), Bson::Int64(b)) => Sum::Int(a + b),
            (Sum::Int(a), Bson::Double(b)) => Sum::Float(a as f64 + b),
            (Sum::Float(a), Bson::Int32(b)) => Sum::Float(a + f64::from(*b)),
            (Sum::Float(a), Bson::Int64(b)) => Sum::Float(a + *b as f64),
            (Sum::Float(a), Bson::Double(b)) => Sum::Float(a + b),
            // non-numeric values are ignored
            (s, _) => s,
        }
    }

    fn into_bson(self) -> Bson {
        match self {
            Sum::Int(n) => count_bson(n),
            Sum::Float(f) => Bson::Double(f),
        }
    }
}

fn resolve(doc: &Document, expr: &Bson) -> Bson {
    match expr {
        Bson::String(path) if path.starts_with('$') => {
            lookup_path(doc, &path[1..]).cloned().unwrap_or(Bson::Null)
        }
        other => other.clone(),
    }
}

/// `$group` with `$sum` accumulators. Groups come out in first-seen order.
fn group(spec: &Document, docs: Vec<Document>) -> Result<Vec<Document>, DriverError> {
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| stage_error("$group", "an _id expression is required"))?;

    let mut accumulators = Vec::new();
    for (name, acc) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
        let operand = match acc {
            Bson::Document(op) => op
                .get(ops::SUM)
                .ok_or_else(|| stage_error("$group", format!("{name}: only $sum is supported")))?,
            _ => return Err(stage_error("$group", format!("{name} must be an accumulator"))),
        };
        accumulators.push((name.as_str(), operand));
    }

    let mut groups: Vec<(Bson, Vec<Sum>)> = Vec::new();
    for doc in &docs {
        let key = resolve(doc, key_expr);
        let idx = match groups.iter().position(|(k, _)| value_eq(k, &key)) {
            Some(i) => i,
            None => {
                groups.push((key, accumulators.iter().map(|_| Sum::Int(0)).collect()));
                groups.len() - 1
            }
        };
        let sums = std::mem::take(&mut groups[idx].1);
        groups[idx].1 = sums
            .into_iter()
            .zip(&accumulators)
            .map(|(sum, (_, operand))| sum.add(&resolve(doc, operand)))
            .collect();
    }

    Ok(groups
        .into_iter()
        .map(|(key, sums)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for (sum, (name, _)) in sums.into_iter().zip(&accumulators) {
                out.insert(*name, sum.into_bson());
            }
            out
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::time::Duration;

    fn run_on(collections: &HashMap<Namespace, Vec<Document>>, input: Vec<Document>, pipeline: Vec<Document>) -> Vec<Document> {
        let deadline = Deadline::after(Duration::from_secs(5));
        let agg = Aggregator {
            collections,
            database: "db",
            deadline: &deadline,
        };
        agg.run(input, &pipeline).unwrap()
    }

    fn people() -> Vec<Document> {
        (1..=5)
            .map(|i| {
                let team = if i % 2 == 0 { "even" } else { "odd" };
                doc! { "_id": i, "name": format!("p{i}"), "team": team }
            })
            .collect()
    }

    #[test]
    fn match_sort_skip_limit() {
        let out = run_on(
            &HashMap::new(),
            people(),
            vec![
                doc! { "$match": { "team": "odd" } },
                doc! { "$sort": { "_id": -1 } },
                doc! { "$skip": 1 },
                doc! { "$limit": 1 },
            ],
        );
        assert_eq!(out, vec![doc! { "_id": 3, "name": "p3", "team": "odd" }]);
    }

    #[test]
    fn facet_with_count_group() {
        let out = run_on(
            &HashMap::new(),
            people(),
            vec![doc! { "$facet": {
                "result": [{ "$skip": 3 }, { "$limit": 10 }],
                "total": [{ "$group": { "_id": Bson::Null, "count": { "$sum": 1 } } }],
            } }],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get_array("result").unwrap().len(), 2);
        assert_eq!(
            out[0].get_array("total").unwrap()[0],
            Bson::Document(doc! { "_id": Bson::Null, "count": 5 })
        );
    }

    #[test]
    fn group_on_empty_input_yields_nothing() {
        let out = run_on(
            &HashMap::new(),
            Vec::new(),
            vec![doc! { "$group": { "_id": Bson::Null, "count": { "$sum": 1 } } }],
        );
        assert!(out.is_empty());
    }

    #[test]
    fn group_by_field_sums_values() {
        let out = run_on(
            &HashMap::new(),
            people(),
            vec![doc! { "$group": { "_id": "$team", "ids": { "$sum": "$_id" } } }],
        );
        assert_eq!(
            out,
            vec![doc! { "_id": "odd", "ids": 9 }, doc! { "_id": "even", "ids": 6 }]
        );
    }

    #[test]
    fn lookup_joins_foreign_collection() {
        let mut collections = HashMap::new();
        collections.insert(
            Namespace::new("db", "orders"),
            vec![
                doc! { "_id": 10, "user": 1 },
                doc! { "_id": 11, "user": 1 },
                doc! { "_id": 12, "user": 2 },
            ],
        );
        let out = run_on(
            &collections,
            vec![doc! { "_id": 1 }, doc! { "_id": 3 }],
            vec![doc! { "$lookup": { "from": "orders", "localField": "_id", "foreignField": "user", "as": "orders" } }],
        );
        assert_eq!(out[0].get_array("orders").unwrap().len(), 2);
        assert!(out[1].get_array("orders").unwrap().is_empty());
    }

    #[test]
    fn project_inclusion_and_exclusion() {
        let d = doc! { "_id": 1, "a": 1, "b": 2, "c": 3 };
        assert_eq!(project(&d, &doc! { "a": 1 }).unwrap(), doc! { "_id": 1, "a": 1 });
        assert_eq!(project(&d, &doc! { "a": 1, "_id": 0 }).unwrap(), doc! { "a": 1 });
        assert_eq!(project(&d, &doc! { "b": 0 }).unwrap(), doc! { "_id": 1, "a": 1, "c": 3 });
    }

    #[test]
    fn project_elem_match_keeps_first_hit() {
        let d = doc! { "_id": 1, "items": [{ "k": "a" }, { "k": "b" }, { "k": "b", "n": 2 }] };
        let out = project(&d, &doc! { "items": { "$elemMatch": { "k": "b" } } }).unwrap();
        assert_eq!(out, doc! { "_id": 1, "items": [{ "k": "b" }] });
    }

    #[test]
    fn negative_limit_is_rejected() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let collections = HashMap::new();
        let agg = Aggregator {
            collections: &collections,
            database: "db",
            deadline: &deadline,
        };
        assert!(agg.run(people(), &[doc! { "$limit": -1 }]).is_err());
        assert!(agg.run(people(), &[doc! { "$out": "x" }]).is_err());
    }
}
