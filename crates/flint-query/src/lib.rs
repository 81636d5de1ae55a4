mod conditions;
mod error;
mod id;
mod operator;
mod pagination;
mod pipeline;
mod projection;
mod sort;
mod stage;

pub use conditions::{ConditionSet, Membership, Predicate};
pub use error::RenderError;
pub use id::{ID_FIELD, to_object_id, to_object_ids};
pub use operator::{Operator, ops};
pub use pagination::{DEFAULT_PAGE_SIZE, Limit, Pagination};
pub use pipeline::Pipeline;
pub use projection::{ProjectionSpec, Selection};
pub use sort::{SORT_KEYWORDS, Sort, SortDirection, render_sort};
pub use stage::{
    FACET_COUNT, FACET_RESULT, FACET_TOTAL, FacetPage, FacetStage, LookupStage, MatchStage,
    ProjectStage, Stage,
};
