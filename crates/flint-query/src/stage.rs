use bson::{Bson, Document, doc};

use crate::error::RenderError;
use crate::operator::ops;

/// Name of the facet branch holding the page of documents.
pub const FACET_RESULT: &str = "result";
/// Name of the facet branch holding the matched-document count.
pub const FACET_TOTAL: &str = "total";
/// Counter field inside the `total` branch.
pub const FACET_COUNT: &str = "count";

/// One aggregation pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Lookup(LookupStage),
    Match(MatchStage),
    Project(ProjectStage),
    Facet(FacetStage),
}

impl Stage {
    pub fn render(&self) -> Result<Document, RenderError> {
        match self {
            Stage::Lookup(s) => Ok(s.render()),
            Stage::Match(s) => Ok(s.render()),
            Stage::Project(s) => Ok(s.render()),
            Stage::Facet(s) => s.render(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Lookup(_) => ops::LOOKUP,
            Stage::Match(_) => ops::MATCH,
            Stage::Project(_) => ops::PROJECT,
            Stage::Facet(_) => ops::FACET,
        }
    }
}

impl From<LookupStage> for Stage {
    fn from(s: LookupStage) -> Self {
        Stage::Lookup(s)
    }
}

impl From<MatchStage> for Stage {
    fn from(s: MatchStage) -> Self {
        Stage::Match(s)
    }
}

impl From<ProjectStage> for Stage {
    fn from(s: ProjectStage) -> Self {
        Stage::Project(s)
    }
}

impl From<FacetStage> for Stage {
    fn from(s: FacetStage) -> Self {
        Stage::Facet(s)
    }
}

// ── Lookup ──────────────────────────────────────────────────────

/// Left outer join against another collection of the same database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupStage {
    from: String,
    local_field: String,
    foreign_field: String,
    alias: String,
}

impl LookupStage {
    pub fn new(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            alias: alias.into(),
        }
    }

    pub fn render(&self) -> Document {
        doc! {
            (ops::LOOKUP): {
                "from": self.from.as_str(),
                "localField": self.local_field.as_str(),
                "foreignField": self.foreign_field.as_str(),
                "as": self.alias.as_str(),
            }
        }
    }
}

// ── Match ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchStage {
    cases: Document,
}

impl MatchStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any earlier condition on `key`.
    pub fn add_condition(&mut self, key: impl Into<String>, value: impl Into<Bson>) -> &mut Self {
        self.cases.insert(key.into(), value.into());
        self
    }

    pub fn render(&self) -> Document {
        doc! { (ops::MATCH): self.cases.clone() }
    }
}

impl From<Document> for MatchStage {
    fn from(cases: Document) -> Self {
        Self { cases }
    }
}

// ── Project ─────────────────────────────────────────────────────

/// Wraps a projection document as given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectStage {
    projection: Document,
}

impl ProjectStage {
    pub fn new(projection: Document) -> Self {
        Self { projection }
    }

    pub fn render(&self) -> Document {
        doc! { (ops::PROJECT): self.projection.clone() }
    }
}

// ── Facet ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum FacetEntry {
    Limit(i64),
    Skip(i64),
    Sort(Document),
}

impl FacetEntry {
    fn render(&self) -> Result<Document, RenderError> {
        match self {
            FacetEntry::Limit(n) if *n <= 0 => Err(RenderError::new(
                ops::FACET,
                format!("$limit must be positive, got {n}"),
            )),
            FacetEntry::Limit(n) => Ok(doc! { (ops::LIMIT): *n }),
            FacetEntry::Skip(n) if *n < 0 => Err(RenderError::new(
                ops::FACET,
                format!("$skip must not be negative, got {n}"),
            )),
            FacetEntry::Skip(n) => Ok(doc! { (ops::SKIP): *n }),
            FacetEntry::Sort(keys) => Ok(doc! { (ops::SORT): keys.clone() }),
        }
    }
}

/// Runs the accumulated sub-pipeline as the `result` branch next to a fixed
/// `total` branch that counts every input document, so one round trip returns
/// both a page and the size of the whole match.
///
/// Setters append; calling one twice keeps both entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetStage {
    entries: Vec<FacetEntry>,
}

impl FacetStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_limit(&mut self, limit: i64) -> &mut Self {
        self.entries.push(FacetEntry::Limit(limit));
        self
    }

    pub fn set_skip(&mut self, skip: i64) -> &mut Self {
        self.entries.push(FacetEntry::Skip(skip));
        self
    }

    pub fn set_sort(&mut self, keys: Document) -> &mut Self {
        self.entries.push(FacetEntry::Sort(keys));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> Result<Document, RenderError> {
        let result = self
            .entries
            .iter()
            .map(FacetEntry::render)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(doc! {
            (ops::FACET): {
                (FACET_RESULT): result,
                (FACET_TOTAL): [
                    { (ops::GROUP): { "_id": Bson::Null, (FACET_COUNT): { (ops::SUM): 1 } } }
                ],
            }
        })
    }
}

/// Decoded output of a facet stage: the page plus the total match count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetPage {
    pub items: Vec<Document>,
    pub total: i64,
}

impl FacetPage {
    /// Read the `result` and `total` branches of a facet output document.
    ///
    /// A missing or empty `total` branch means nothing matched.
    pub fn from_document(doc: &Document) -> Self {
        let items = match doc.get(FACET_RESULT) {
            Some(Bson::Array(items)) => items
                .iter()
                .filter_map(|b| match b {
                    Bson::Document(d) => Some(d.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let total = match doc.get(FACET_TOTAL) {
            Some(Bson::Array(branch)) => branch
                .first()
                .and_then(|b| match b {
                    Bson::Document(d) => d.get(FACET_COUNT),
                    _ => None,
                })
                .and_then(as_count)
                .unwrap_or(0),
            _ => 0,
        };

        Self { items, total }
    }
}

fn as_count(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) => Some(*n as i64),
        _ => None,
    }
}
