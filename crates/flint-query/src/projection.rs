use bson::{Bson, Document, doc};

use crate::operator::ops;

/// One entry of a field selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Include the field as is.
    Field(String),
    /// Include only the first array element of `field` whose `key` equals `value`.
    ElemMatch {
        field: String,
        key: String,
        value: Bson,
    },
}

impl Selection {
    pub fn elem_match(
        field: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Bson>,
    ) -> Self {
        Selection::ElemMatch {
            field: field.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Selection::Field(f) | Selection::ElemMatch { field: f, .. } => f,
        }
    }
}

impl From<&str> for Selection {
    fn from(field: &str) -> Self {
        Selection::Field(field.to_string())
    }
}

impl From<String> for Selection {
    fn from(field: String) -> Self {
        Selection::Field(field)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionSpec {
    selections: Vec<Selection>,
}

impl ProjectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, selection: impl Into<Selection>) {
        self.selections.push(selection.into());
    }

    /// Replace every selection.
    pub fn replace<I, S>(&mut self, selections: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Selection>,
    {
        self.selections = selections.into_iter().map(Into::into).collect();
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// Render into a projection document, or `None` when no field was
    /// selected (the store then returns whole documents).
    pub fn render(&self) -> Option<Document> {
        if self.selections.is_empty() {
            return None;
        }

        let mut projection = Document::new();
        for selection in &self.selections {
            match selection {
                Selection::Field(field) => {
                    projection.insert(field.clone(), 1);
                }
                Selection::ElemMatch { field, key, value } => {
                    let mut cond = Document::new();
                    cond.insert(key.clone(), value.clone());
                    projection.insert(field.clone(), doc! { (ops::ELEM_MATCH): cond });
                }
            }
        }
        Some(projection)
    }
}

impl<S: Into<Selection>> FromIterator<S> for ProjectionSpec {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            selections: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_renders_none() {
        assert_eq!(ProjectionSpec::new().render(), None);
    }

    #[test]
    fn plain_fields_are_included_with_weight_one() {
        let spec: ProjectionSpec = ["name", "email"].into_iter().collect();
        assert_eq!(spec.render(), Some(doc! { "name": 1, "email": 1 }));
    }

    #[test]
    fn elem_match_renders_nested_condition() {
        let mut spec = ProjectionSpec::new();
        spec.push("name");
        spec.push(Selection::elem_match("roles", "scope", "admin"));
        assert_eq!(
            spec.render(),
            Some(doc! {
                "name": 1,
                "roles": { "$elemMatch": { "scope": "admin" } },
            })
        );
    }

    #[test]
    fn later_entry_for_same_field_wins() {
        let mut spec = ProjectionSpec::new();
        spec.push(Selection::elem_match("roles", "scope", "admin"));
        spec.push("roles");
        assert_eq!(spec.render(), Some(doc! { "roles": 1 }));
    }

    #[test]
    fn replace_discards_previous_selections() {
        let mut spec = ProjectionSpec::new();
        spec.push("a");
        spec.replace(["b", "c"]);
        let fields: Vec<&str> = spec.selections().iter().map(Selection::field).collect();
        assert_eq!(fields, ["b", "c"]);
    }
}
