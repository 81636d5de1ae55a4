use serde::{Deserialize, Serialize};

/// BSON operator names emitted by the renderers.
pub mod ops {
    pub const EQ: &str = "$eq";
    pub const NE: &str = "$ne";
    pub const GT: &str = "$gt";
    pub const GTE: &str = "$gte";
    pub const LT: &str = "$lt";
    pub const LTE: &str = "$lte";
    pub const IN: &str = "$in";
    pub const NIN: &str = "$nin";
    pub const AND: &str = "$and";
    pub const OR: &str = "$or";
    pub const NOR: &str = "$nor";
    pub const EXISTS: &str = "$exists";
    pub const ELEM_MATCH: &str = "$elemMatch";

    pub const LOOKUP: &str = "$lookup";
    pub const MATCH: &str = "$match";
    pub const PROJECT: &str = "$project";
    pub const FACET: &str = "$facet";
    pub const GROUP: &str = "$group";
    pub const SUM: &str = "$sum";
    pub const LIMIT: &str = "$limit";
    pub const SKIP: &str = "$skip";
    pub const SORT: &str = "$sort";
    pub const COUNT: &str = "$count";

    pub const SET: &str = "$set";
    pub const UNSET: &str = "$unset";
    pub const INC: &str = "$inc";
    pub const CURRENT_DATE: &str = "$currentDate";
}

/// Comparison operator of a single predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    /// Parse a comparison symbol (`=`, `!=`, `>`, `>=`, `<`, `<=`).
    ///
    /// Anything unrecognized is an equality.
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.trim() {
            "!=" | "<>" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            _ => Operator::Eq,
        }
    }

    /// The BSON operator key, e.g. `$gt`.
    pub fn as_bson_key(self) -> &'static str {
        match self {
            Operator::Eq => ops::EQ,
            Operator::Ne => ops::NE,
            Operator::Gt => ops::GT,
            Operator::Gte => ops::GTE,
            Operator::Lt => ops::LT,
            Operator::Lte => ops::LTE,
        }
    }
}

impl From<&str> for Operator {
    fn from(symbol: &str) -> Self {
        Operator::from_symbol(symbol)
    }
}
