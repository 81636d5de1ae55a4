use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::operator::{Operator, ops};

/// A single `field <operator> value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    #[serde(default)]
    pub operator: Operator,
    pub value: Bson,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Bson>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// Value side of the clause: raw for `Eq`, `{ "$op": value }` otherwise.
    pub fn clause_value(&self) -> Bson {
        match self.operator {
            Operator::Eq => self.value.clone(),
            op => {
                let mut wrapped = Document::new();
                wrapped.insert(op.as_bson_key(), self.value.clone());
                Bson::Document(wrapped)
            }
        }
    }

    /// Single-field clause document `{ field: clause_value }`.
    pub fn to_clause(&self) -> Document {
        let mut clause = Document::new();
        clause.insert(self.field.clone(), self.clause_value());
        clause
    }
}

/// A membership condition: `field` in (or not in) `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub field: String,
    pub values: Bson,
}

/// Predicates accumulated into independent buckets and rendered into one
/// composite filter document.
///
/// Each bucket keeps insertion order. Nothing is deduplicated across buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    and: Vec<Predicate>,
    or: Vec<Predicate>,
    within: Vec<Membership>,
    not_within: Vec<Membership>,
    not: Vec<Predicate>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_where(&mut self, field: impl Into<String>, op: Operator, value: impl Into<Bson>) {
        self.and.push(Predicate::new(field, op, value));
    }

    pub fn push_or_where(
        &mut self,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<Bson>,
    ) {
        self.or.push(Predicate::new(field, op, value));
    }

    pub fn push_in(&mut self, field: impl Into<String>, values: impl Into<Bson>) {
        self.within.push(Membership {
            field: field.into(),
            values: values.into(),
        });
    }

    pub fn push_not_in(&mut self, field: impl Into<String>, values: impl Into<Bson>) {
        self.not_within.push(Membership {
            field: field.into(),
            values: values.into(),
        });
    }

    /// Record a negation. Negations are kept but not rendered: there is no
    /// settled `$not`/`$nor` shape for them yet.
    pub fn push_not(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        self.not.push(Predicate::eq(field, value));
    }

    pub fn conjunction(&self) -> &[Predicate] {
        &self.and
    }

    pub fn disjunction(&self) -> &[Predicate] {
        &self.or
    }

    pub fn inclusions(&self) -> &[Membership] {
        &self.within
    }

    pub fn exclusions(&self) -> &[Membership] {
        &self.not_within
    }

    pub fn negations(&self) -> &[Predicate] {
        &self.not
    }

    pub fn is_empty(&self) -> bool {
        self.and.is_empty()
            && self.or.is_empty()
            && self.within.is_empty()
            && self.not_within.is_empty()
            && self.not.is_empty()
    }

    /// Render the buckets into a filter document.
    ///
    /// - `$and`: one single-field clause per `and` entry
    /// - `$or`: one single-field clause per `or` entry
    /// - `field: { $in: values }` per inclusion, last one per field wins
    /// - `field: { $nin: values }` per exclusion, last one per field wins
    ///
    /// Returns an empty document when nothing was accumulated.
    pub fn render(&self) -> Document {
        let mut result = Document::new();

        if !self.and.is_empty() {
            result.insert(ops::AND, clause_list(&self.and));
        }
        if !self.or.is_empty() {
            result.insert(ops::OR, clause_list(&self.or));
        }
        for m in &self.within {
            result.insert(m.field.clone(), membership(ops::IN, &m.values));
        }
        for m in &self.not_within {
            result.insert(m.field.clone(), membership(ops::NIN, &m.values));
        }

        result
    }
}

fn clause_list(predicates: &[Predicate]) -> Bson {
    Bson::Array(
        predicates
            .iter()
            .map(|p| Bson::Document(p.to_clause()))
            .collect(),
    )
}

fn membership(op: &str, values: &Bson) -> Bson {
    let mut doc = Document::new();
    doc.insert(op, values.clone());
    Bson::Document(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{RawDocumentBuf, doc};

    #[test]
    fn empty_set_renders_empty_document() {
        let set = ConditionSet::new();
        assert!(set.is_empty());
        assert_eq!(set.render(), Document::new());
    }

    #[test]
    fn equality_is_stored_unwrapped() {
        let mut set = ConditionSet::new();
        set.push_where("status", Operator::Eq, "active");
        assert_eq!(set.render(), doc! { "$and": [{ "status": "active" }] });
    }

    #[test]
    fn comparisons_wrap_value_in_operator_doc() {
        let mut set = ConditionSet::new();
        set.push_where("age", Operator::Gt, 30);
        set.push_where("age", Operator::Lte, 65);
        set.push_where("name", Operator::Ne, "root");
        assert_eq!(
            set.render(),
            doc! {
                "$and": [
                    { "age": { "$gt": 30 } },
                    { "age": { "$lte": 65 } },
                    { "name": { "$ne": "root" } },
                ]
            }
        );
    }

    #[test]
    fn and_with_in_renders_both() {
        let mut set = ConditionSet::new();
        set.push_where("age", Operator::Gt, 30);
        set.push_in("status", vec!["a", "b"]);

        let rendered = set.render();
        assert_eq!(
            rendered.get_array("$and").unwrap(),
            &vec![Bson::Document(doc! { "age": { "$gt": 30 } })]
        );
        assert_eq!(
            rendered.get_document("status").unwrap(),
            &doc! { "$in": ["a", "b"] }
        );
    }

    #[test]
    fn or_bucket_renders_disjunction() {
        let mut set = ConditionSet::new();
        set.push_or_where("status", Operator::Eq, "active");
        set.push_or_where("score", Operator::Gte, 90);
        assert_eq!(
            set.render(),
            doc! { "$or": [{ "status": "active" }, { "score": { "$gte": 90 } }] }
        );
    }

    #[test]
    fn repeated_in_on_same_field_keeps_last() {
        let mut set = ConditionSet::new();
        set.push_in("tag", vec!["x"]);
        set.push_in("tag", vec!["y", "z"]);
        assert_eq!(set.render(), doc! { "tag": { "$in": ["y", "z"] } });
    }

    #[test]
    fn not_in_overwrites_in_for_same_field() {
        let mut set = ConditionSet::new();
        set.push_in("tag", vec!["x"]);
        set.push_not_in("tag", vec!["y"]);
        assert_eq!(set.render(), doc! { "tag": { "$nin": ["y"] } });
    }

    #[test]
    fn negations_are_recorded_but_not_rendered() {
        let mut set = ConditionSet::new();
        set.push_not("status", "deleted");
        assert!(!set.is_empty());
        assert_eq!(set.negations().len(), 1);
        assert_eq!(set.render(), Document::new());
    }

    #[test]
    fn render_is_idempotent() {
        let mut set = ConditionSet::new();
        set.push_where("a", Operator::Gt, 1);
        set.push_or_where("b", Operator::Eq, 2);
        set.push_in("c", vec![3, 4]);
        set.push_not_in("d", vec![5]);

        let first = RawDocumentBuf::try_from(&set.render()).unwrap();
        let second = RawDocumentBuf::try_from(&set.render()).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn buckets_keep_insertion_order() {
        let mut set = ConditionSet::new();
        set.push_where("z", Operator::Eq, 1);
        set.push_where("a", Operator::Eq, 2);
        let fields: Vec<&str> = set.conjunction().iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, ["z", "a"]);
    }
}
