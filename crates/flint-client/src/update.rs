use bson::{Bson, Document, doc};
use flint_query::ops;

use crate::config::ClientConfig;

/// Which fields of a model may be written by [`QueryBuilder::update`].
///
/// Declared by the caller; fields absent from the mapping are never written.
///
/// [`QueryBuilder::update`]: crate::QueryBuilder::update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateFields {
    fields: Vec<(String, bool)>,
}

impl UpdateFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every named field is updatable.
    pub fn updatable<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(|n| (n.into(), true)).collect(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, updatable: bool) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = updatable,
            None => self.fields.push((name, updatable)),
        }
        self
    }

    pub fn is_updatable(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, u)| n == name && *u)
    }

    /// Build the update document for a serialized model.
    ///
    /// Writes every updatable field that is present, not null, not an empty
    /// string, and not in the config's skip set, then stamps the configured
    /// updated-at field with the server time.
    pub fn build(&self, model: &Document, config: &ClientConfig) -> Document {
        let mut set = Document::new();
        for (name, updatable) in &self.fields {
            if !updatable || config.skips_on_update(name) {
                continue;
            }
            match model.get(name) {
                None | Some(Bson::Null) => {}
                Some(Bson::String(s)) if s.is_empty() => {}
                Some(v) => {
                    set.insert(name.as_str(), v.clone());
                }
            }
        }

        let mut update = doc! { (ops::SET): set };
        if let Some(field) = &config.updated_at_field {
            update.insert(ops::CURRENT_DATE, doc! { (field.as_str()): true });
        }
        update
    }
}
