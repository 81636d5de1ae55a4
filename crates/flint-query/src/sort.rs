use bson::Document;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Recognized direction keywords, matched case-insensitively.
pub const SORT_KEYWORDS: &[(&str, SortDirection)] =
    &[("asc", SortDirection::Asc), ("desc", SortDirection::Desc)];

impl SortDirection {
    /// Unrecognized keywords sort ascending.
    pub fn from_keyword(keyword: &str) -> Self {
        let keyword = keyword.trim();
        SORT_KEYWORDS
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .map(|(_, d)| *d)
            .unwrap_or_default()
    }

    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, keyword: &str) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::from_keyword(keyword),
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Render sort keys into a `{ field: 1 | -1 }` document.
///
/// Keys keep the order they were given in; entries with an empty field are
/// skipped and a repeated field keeps its first position with the last
/// direction. Returns `None` when nothing remains.
pub fn render_sort(sorts: &[Sort]) -> Option<Document> {
    let mut doc = Document::new();
    for sort in sorts.iter().filter(|s| !s.field.is_empty()) {
        doc.insert(sort.field.clone(), sort.direction.as_i32());
    }
    if doc.is_empty() { None } else { Some(doc) }
}
