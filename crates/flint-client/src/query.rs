use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use flint_query::{
    ConditionSet, FacetStage, ID_FIELD, Limit, Operator, Pagination, Pipeline, ProjectionSpec,
    Selection, Sort, Stage, ops, render_sort, to_object_id,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::driver::{
    AggregateOptions, BoxError, Deadline, DeleteResult, Driver, FindOneAndUpdateOptions,
    FindOneOptions, FindOptions, InsertManyResult, InsertOneOptions, InsertOneResult, Namespace,
    UpdateOptions, UpdateResult,
};
use crate::error::Error;
use crate::hooks::{self, HookPhase, Hooks};
use crate::rows::Rows;
use crate::update::UpdateFields;

/// Fluent query against one collection.
///
/// Built by chaining `with_*`/`where_*` calls on a value from
/// [`Client::query`](crate::Client::query), then executed by one of the
/// listing, aggregation, or write methods. Execution borrows the builder, so
/// the same builder can run more than once.
pub struct QueryBuilder<D: Driver> {
    driver: Arc<D>,
    config: Arc<ClientConfig>,
    database: String,
    collection: String,
    timeout: Duration,
    condition: Option<Document>,
    conditions: ConditionSet,
    pipeline: Pipeline,
    projection: ProjectionSpec,
    limit: Limit,
    sort: Vec<Sort>,
    last_id: Option<String>,
    aggregate_options: AggregateOptions,
    update_options: UpdateOptions,
    insert_options: InsertOneOptions,
    find_one_options: FindOneOptions,
    find_one_and_update_options: FindOneAndUpdateOptions,
}

impl<D: Driver> Clone for QueryBuilder<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            config: Arc::clone(&self.config),
            database: self.database.clone(),
            collection: self.collection.clone(),
            timeout: self.timeout,
            condition: self.condition.clone(),
            conditions: self.conditions.clone(),
            pipeline: self.pipeline.clone(),
            projection: self.projection.clone(),
            limit: self.limit,
            sort: self.sort.clone(),
            last_id: self.last_id.clone(),
            aggregate_options: self.aggregate_options.clone(),
            update_options: self.update_options.clone(),
            insert_options: self.insert_options.clone(),
            find_one_options: self.find_one_options.clone(),
            find_one_and_update_options: self.find_one_and_update_options.clone(),
        }
    }
}

impl<D: Driver> QueryBuilder<D> {
    pub(crate) fn new(driver: Arc<D>, config: Arc<ClientConfig>) -> Self {
        Self {
            database: config.database.clone(),
            collection: config.collection.clone(),
            timeout: config.query_timeout(),
            limit: Limit::new(1, config.page_size),
            driver,
            config,
            condition: None,
            conditions: ConditionSet::new(),
            pipeline: Pipeline::new(),
            projection: ProjectionSpec::new(),
            sort: Vec::new(),
            last_id: None,
            aggregate_options: AggregateOptions {
                allow_disk_use: Some(false),
                ..AggregateOptions::default()
            },
            update_options: UpdateOptions::default(),
            insert_options: InsertOneOptions::default(),
            find_one_options: FindOneOptions::default(),
            find_one_and_update_options: FindOneAndUpdateOptions::default(),
        }
    }

    // ── Target and limits ───────────────────────────────────────

    pub fn with_db(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_coll(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `filter` verbatim instead of the accumulated conditions.
    pub fn with_condition(mut self, filter: Document) -> Self {
        self.condition = Some(filter);
        self
    }

    /// Set page and size. Non-positive values keep the previous setting.
    pub fn with_limit(mut self, limit: Limit) -> Self {
        if limit.page > 0 {
            self.limit.page = limit.page;
        }
        if limit.size > 0 {
            self.limit.size = limit.size;
        }
        self
    }

    pub fn with_size(mut self, size: i64) -> Self {
        if size > 0 {
            self.limit.size = size;
        }
        self
    }

    /// Resume a last-id listing after the document with this hex `_id`.
    pub fn with_last_id(mut self, last_id: impl Into<String>) -> Self {
        self.last_id = Some(last_id.into());
        self
    }

    /// Add a sort key; `direction` is `asc`/`desc` (case-insensitive), anything
    /// else sorts ascending.
    pub fn with_sort(mut self, field: impl Into<String>, direction: &str) -> Self {
        self.sort.push(Sort::new(field, direction));
        self
    }

    /// Append stages to the aggregation pipeline, skipping `None` entries.
    pub fn fill_pipeline<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Option<Stage>>,
    {
        self.pipeline.append(stages);
        self
    }

    pub fn add_stage(mut self, stage: impl Into<Stage>) -> Self {
        self.pipeline.push(stage);
        self
    }

    // ── Conditions ──────────────────────────────────────────────

    /// AND a `field <op> value` predicate. `op` may be an [`Operator`] or a
    /// symbol such as `">="`.
    pub fn where_conditions(
        mut self,
        field: impl Into<String>,
        op: impl Into<Operator>,
        value: impl Into<Bson>,
    ) -> Self {
        self.conditions.push_where(field, op.into(), value);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.where_conditions(field, Operator::Eq, value)
    }

    pub fn where_not_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.where_conditions(field, Operator::Ne, value)
    }

    pub fn where_gt(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.where_conditions(field, Operator::Gt, value)
    }

    pub fn where_gte(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.where_conditions(field, Operator::Gte, value)
    }

    pub fn where_lt(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.where_conditions(field, Operator::Lt, value)
    }

    pub fn where_lte(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.where_conditions(field, Operator::Lte, value)
    }

    /// OR a `field <op> value` predicate.
    pub fn or_where_conditions(
        mut self,
        field: impl Into<String>,
        op: impl Into<Operator>,
        value: impl Into<Bson>,
    ) -> Self {
        self.conditions.push_or_where(field, op.into(), value);
        self
    }

    pub fn or_where_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.or_where_conditions(field, Operator::Eq, value)
    }

    pub fn or_where_not_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.or_where_conditions(field, Operator::Ne, value)
    }

    pub fn or_where_gt(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.or_where_conditions(field, Operator::Gt, value)
    }

    pub fn or_where_gte(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.or_where_conditions(field, Operator::Gte, value)
    }

    pub fn or_where_lt(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.or_where_conditions(field, Operator::Lt, value)
    }

    pub fn or_where_lte(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.or_where_conditions(field, Operator::Lte, value)
    }

    pub fn in_where(mut self, field: impl Into<String>, values: impl Into<Bson>) -> Self {
        self.conditions.push_in(field, values);
        self
    }

    pub fn not_in_where(mut self, field: impl Into<String>, values: impl Into<Bson>) -> Self {
        self.conditions.push_not_in(field, values);
        self
    }

    /// Record a negated equality. It is not part of the rendered filter.
    pub fn not(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.conditions.push_not(field, value);
        self
    }

    // ── Projection ──────────────────────────────────────────────

    /// Replace the field selection.
    pub fn select<I, S>(mut self, selections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selection>,
    {
        self.projection.replace(selections);
        self
    }

    pub fn add_select(mut self, selection: impl Into<Selection>) -> Self {
        self.projection.push(selection);
        self
    }

    // ── Per-call driver options ─────────────────────────────────

    pub fn with_aggregate_options(mut self, options: AggregateOptions) -> Self {
        self.aggregate_options = options;
        self
    }

    pub fn with_update_options(mut self, options: UpdateOptions) -> Self {
        self.update_options = options;
        self
    }

    pub fn with_insert_options(mut self, options: InsertOneOptions) -> Self {
        self.insert_options = options;
        self
    }

    pub fn with_find_one_options(mut self, options: FindOneOptions) -> Self {
        self.find_one_options = options;
        self
    }

    pub fn with_find_one_and_update_options(mut self, options: FindOneAndUpdateOptions) -> Self {
        self.find_one_and_update_options = options;
        self
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }

    /// The filter sent to the store: the override if one was set, otherwise
    /// the rendered conditions.
    pub fn effective_filter(&self) -> Document {
        match &self.condition {
            Some(filter) => filter.clone(),
            None => self.conditions.render(),
        }
    }

    pub fn build_projection(&self) -> Option<Document> {
        self.projection.render()
    }

    /// Paging state for the requested page, before any total is known.
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit.page, self.limit.size)
    }

    /// The aggregation pipeline as sent by [`Self::aggregate_with_pagination`]:
    /// the appended stages followed by the paging facet.
    pub fn pipeline_documents(&self) -> Result<Vec<Document>, Error> {
        let mut pipeline = self.pipeline.clone();
        pipeline.push(self.paging_facet());
        Ok(pipeline.render()?)
    }

    fn paging_facet(&self) -> FacetStage {
        let (limit, offset) = self.pagination().calculate_offset();
        let mut facet = FacetStage::new();
        if let Some(sort) = render_sort(&self.sort) {
            facet.set_sort(sort);
        }
        facet.set_skip(offset).set_limit(limit);
        facet
    }

    pub fn namespace(&self) -> Result<Namespace, Error> {
        if self.database.is_empty() || self.collection.is_empty() {
            return Err(Error::Config(
                "both a database and a collection are required".into(),
            ));
        }
        Ok(Namespace::new(&self.database, &self.collection))
    }

    // ── Execution helpers ───────────────────────────────────────

    fn begin(&self) -> Result<(Namespace, Deadline), Error> {
        Ok((self.namespace()?, Deadline::after(self.timeout)))
    }

    fn filter_for(&self, ns: &Namespace, op: &'static str) -> Document {
        let negations = self.conditions.negations().len();
        if negations > 0 && self.condition.is_none() {
            warn!(namespace = %ns, op, negations, "negated conditions are not part of the filter");
        }
        let filter = self.effective_filter();
        debug!(namespace = %ns, op, filter = %filter, "executing");
        filter
    }

    fn after_hook<M: Hooks + ?Sized>(
        &self,
        model: &mut M,
        phase: HookPhase,
        ns: &Namespace,
    ) -> Result<(), Error> {
        hooks::run(model, phase).inspect_err(|e| {
            warn!(namespace = %ns, error = %e, "write committed but its hook failed");
        })
    }

    fn stream<F>(&self, rows: &mut Rows<D::Cursor>, mut callback: F) -> Result<(), Error>
    where
        F: FnMut(&Document) -> Result<(), BoxError>,
    {
        for row in rows {
            let doc = row?;
            callback(&doc).map_err(Error::from_callback)?;
        }
        Ok(())
    }

    // ── Listing ─────────────────────────────────────────────────

    /// Stream every matching document into `callback`.
    ///
    /// A callback error stops the iteration and is returned; the cursor is
    /// closed either way.
    pub fn list<F>(&self, callback: F) -> Result<(), Error>
    where
        F: FnMut(&Document) -> Result<(), BoxError>,
    {
        let (ns, deadline) = self.begin()?;
        let filter = self.filter_for(&ns, "list");
        let options = FindOptions {
            sort: render_sort(&self.sort),
            projection: self.build_projection(),
            ..FindOptions::default()
        };

        let cursor = self
            .driver
            .find(&ns, &filter, &options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;
        let mut rows = Rows::new(cursor, deadline);
        self.stream(&mut rows, callback)?;
        rows.close()
    }

    /// Stream one page of matching documents and report the paging state.
    ///
    /// Totals come from an exact count when a filter applies and from the
    /// collection estimate otherwise.
    pub fn list_with_pagination<F>(&self, callback: F) -> Result<Pagination, Error>
    where
        F: FnMut(&Document) -> Result<(), BoxError>,
    {
        let (ns, deadline) = self.begin()?;
        let filter = self.filter_for(&ns, "list_with_pagination");
        let mut pagination = self.pagination();
        let (limit, offset) = pagination.calculate_offset();
        let options = FindOptions {
            limit: Some(limit),
            skip: Some(offset),
            sort: render_sort(&self.sort),
            projection: self.build_projection(),
        };

        let total = if filter.is_empty() {
            self.driver.estimated_document_count(&ns, &deadline)
        } else {
            self.driver.count_documents(&ns, &filter, &deadline)
        }
        .map_err(|e| Error::from_driver(e, &deadline))?;

        let cursor = self
            .driver
            .find(&ns, &filter, &options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;
        let mut rows = Rows::new(cursor, deadline);
        self.stream(&mut rows, callback)?;
        rows.close()?;

        pagination.with_total(i64::try_from(total).unwrap_or(i64::MAX));
        Ok(pagination)
    }

    /// Stream the page after the last-id token, in `_id` order.
    ///
    /// Returns the token for the next page: the hex `_id` of the last
    /// streamed document when more documents remain, otherwise an empty
    /// string.
    pub fn list_with_last_id<F>(&self, mut callback: F) -> Result<String, Error>
    where
        F: FnMut(&Document) -> Result<(), BoxError>,
    {
        let (ns, deadline) = self.begin()?;
        let mut filter = self.filter_for(&ns, "list_with_last_id");

        if let Some(token) = self.last_id.as_deref().filter(|t| !t.is_empty()) {
            let after = to_object_id(token)
                .ok_or_else(|| Error::InvalidCursor(format!("{token:?} is not an ObjectId")))?;
            let mut conditions = self.conditions.clone();
            conditions.push_where(ID_FIELD, Operator::Gt, after);
            filter = match &self.condition {
                // the override is kept intact and narrowed by the cursor
                Some(over) => {
                    doc! { (ops::AND): [over.clone(), { (ID_FIELD): { (ops::GT): after } }] }
                }
                None => conditions.render(),
            };
        }

        let size = self.pagination().effective_size();
        let options = FindOptions {
            limit: Some(size),
            sort: Some(doc! { (ID_FIELD): 1 }),
            projection: self.build_projection(),
            ..FindOptions::default()
        };

        let cursor = self
            .driver
            .find(&ns, &filter, &options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;
        let mut rows = Rows::new(cursor, deadline);
        let mut last: Option<ObjectId> = None;
        self.stream(&mut rows, |doc| {
            match doc.get(ID_FIELD) {
                Some(Bson::ObjectId(id)) => last = Some(*id),
                _ => {
                    return Err(Error::InvalidCursor(
                        "streamed document has no ObjectId _id".into(),
                    )
                    .into());
                }
            }
            callback(doc)
        })?;
        rows.close()?;

        let remaining = self
            .driver
            .count_documents(&ns, &filter, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;

        match last {
            Some(id) if remaining > u64::try_from(size).unwrap_or(u64::MAX) => Ok(id.to_hex()),
            _ => Ok(String::new()),
        }
    }

    // ── Aggregation ─────────────────────────────────────────────

    /// Run the pipeline with a paging facet appended and hand the rows to
    /// `callback`, which returns the total match count (typically read with
    /// [`FacetPage::from_document`](flint_query::FacetPage::from_document)).
    pub fn aggregate_with_pagination<F>(&self, callback: F) -> Result<Pagination, Error>
    where
        F: FnOnce(&mut Rows<D::Cursor>) -> Result<i64, BoxError>,
    {
        let (ns, deadline) = self.begin()?;
        let pipeline = self.pipeline_documents()?;
        debug!(namespace = %ns, stages = pipeline.len(), "executing aggregate_with_pagination");

        let cursor = self
            .driver
            .aggregate(&ns, &pipeline, &self.aggregate_options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;
        let mut rows = Rows::new(cursor, deadline);
        let total = callback(&mut rows).map_err(Error::from_callback)?;
        rows.close()?;

        let mut pagination = self.pagination();
        pagination.with_total(total);
        Ok(pagination)
    }

    // ── Single documents ────────────────────────────────────────

    pub fn find_one(&self) -> Result<Option<Document>, Error> {
        let (ns, deadline) = self.begin()?;
        let filter = self.filter_for(&ns, "find_one");
        self.driver
            .find_one(&ns, &filter, &self.find_one_options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))
    }

    pub fn find_one_and_update(&self, update: Document) -> Result<Option<Document>, Error> {
        let (ns, deadline) = self.begin()?;
        let filter = self.filter_for(&ns, "find_one_and_update");
        self.driver
            .find_one_and_update(
                &ns,
                &filter,
                &update,
                &self.find_one_and_update_options,
                &deadline,
            )
            .map_err(|e| Error::from_driver(e, &deadline))
    }

    pub fn find_one_and_delete(&self) -> Result<Option<Document>, Error> {
        let (ns, deadline) = self.begin()?;
        let filter = self.filter_for(&ns, "find_one_and_delete");
        self.driver
            .find_one_and_delete(&ns, &filter, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))
    }

    pub fn delete_many(&self) -> Result<DeleteResult, Error> {
        let (ns, deadline) = self.begin()?;
        let filter = self.filter_for(&ns, "delete_many");
        self.driver
            .delete_many(&ns, &filter, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))
    }

    /// Update the first matching document with a raw update document.
    pub fn update_raw(&self, update: Document) -> Result<UpdateResult, Error> {
        let (ns, deadline) = self.begin()?;
        let filter = self.filter_for(&ns, "update_raw");
        self.driver
            .update_one(&ns, &filter, &update, &self.update_options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))
    }

    // ── Model writes ────────────────────────────────────────────

    pub fn insert_one<M>(&self, model: &mut M) -> Result<InsertOneResult, Error>
    where
        M: Serialize + Hooks,
    {
        let (ns, deadline) = self.begin()?;
        hooks::run(model, HookPhase::BeforeInsert)?;
        let doc = to_document(model)?;
        debug!(namespace = %ns, "executing insert_one");

        let result = self
            .driver
            .insert_one(&ns, doc, &self.insert_options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;
        self.after_hook(model, HookPhase::AfterInsert, &ns)?;
        Ok(result)
    }

    pub fn insert_many(&self, docs: Vec<Document>) -> Result<InsertManyResult, Error> {
        let (ns, deadline) = self.begin()?;
        debug!(namespace = %ns, count = docs.len(), "executing insert_many");
        self.driver
            .insert_many(&ns, docs, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))
    }

    /// Write the updatable fields of `model` to the first matching document
    /// and stamp its updated-at field.
    pub fn update<M>(&self, model: &mut M, fields: &UpdateFields) -> Result<UpdateResult, Error>
    where
        M: Serialize + Hooks,
    {
        let (ns, deadline) = self.begin()?;
        hooks::run(model, HookPhase::BeforeUpdate)?;
        let update = fields.build(&to_document(model)?, &self.config);
        let filter = self.filter_for(&ns, "update");

        let result = self
            .driver
            .update_one(&ns, &filter, &update, &self.update_options, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;
        self.after_hook(model, HookPhase::AfterUpdate, &ns)?;
        Ok(result)
    }

    /// Delete the first document matching the filter on behalf of `model`.
    pub fn delete<M>(&self, model: &mut M) -> Result<DeleteResult, Error>
    where
        M: Hooks + ?Sized,
    {
        let (ns, deadline) = self.begin()?;
        hooks::run(model, HookPhase::BeforeDelete)?;
        let filter = self.filter_for(&ns, "delete");

        let removed = self
            .driver
            .find_one_and_delete(&ns, &filter, &deadline)
            .map_err(|e| Error::from_driver(e, &deadline))?;
        self.after_hook(model, HookPhase::AfterDelete, &ns)?;
        Ok(DeleteResult {
            deleted_count: u64::from(removed.is_some()),
        })
    }
}

fn to_document<M: Serialize + ?Sized>(model: &M) -> Result<Document, Error> {
    bson::serialize_to_document(model).map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::Client;
    use crate::memory::MemoryDriver;
    use flint_query::{LookupStage, MatchStage};

    fn client() -> Client<MemoryDriver> {
        Client::builder()
            .driver(MemoryDriver::new())
            .database("db")
            .collection("people")
            .build()
            .unwrap()
    }

    #[test]
    fn starts_from_config() {
        let q = client().query();
        assert_eq!(q.namespace().unwrap(), Namespace::new("db", "people"));
        assert_eq!(q.pagination(), Pagination::new(1, 20));
        assert!(q.effective_filter().is_empty());
    }

    #[test]
    fn override_wins_over_conditions() {
        let q = client()
            .query()
            .where_eq("a", 1)
            .with_condition(doc! { "b": 2 });
        assert_eq!(q.effective_filter(), doc! { "b": 2 });
    }

    #[test]
    fn symbols_map_to_operators() {
        let q = client().query().where_conditions("age", ">=", 18);
        assert_eq!(
            q.effective_filter(),
            doc! { "$and": [{ "age": { "$gte": 18 } }] }
        );
    }

    #[test]
    fn or_not_eq_renders_ne() {
        let q = client().query().or_where_not_eq("status", "closed");
        assert_eq!(
            q.effective_filter(),
            doc! { "$or": [{ "status": { "$ne": "closed" } }] }
        );
    }

    #[test]
    fn non_positive_limits_keep_previous_values() {
        let q = client()
            .query()
            .with_limit(Limit::new(3, 10))
            .with_limit(Limit::new(0, -5))
            .with_size(0);
        assert_eq!(q.pagination(), Pagination::new(3, 10));
    }

    #[test]
    fn facet_is_appended_last_with_sort_skip_limit() {
        let mut m = MatchStage::new();
        m.add_condition("active", true);
        let q = client()
            .query()
            .fill_pipeline([
                Some(Stage::from(LookupStage::new("orders", "_id", "user", "orders"))),
                None,
                Some(Stage::from(m)),
            ])
            .with_sort("name", "desc")
            .with_limit(Limit::new(3, 10));

        let docs = q.pipeline_documents().unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(
            docs[2],
            doc! { "$facet": {
                "result": [{ "$sort": { "name": -1 } }, { "$skip": 20_i64 }, { "$limit": 10_i64 }],
                "total": [{ "$group": { "_id": Bson::Null, "count": { "$sum": 1 } } }],
            } }
        );
    }

    #[test]
    fn projection_renders_selections() {
        let q = client()
            .query()
            .select(["name", "email"])
            .add_select(Selection::elem_match("items", "sku", "a1"));
        assert_eq!(
            q.build_projection(),
            Some(doc! { "name": 1, "email": 1, "items": { "$elemMatch": { "sku": "a1" } } })
        );
    }

    #[test]
    fn empty_namespace_fails_at_execution() {
        let q = client().query().with_coll("");
        assert!(matches!(q.find_one(), Err(Error::Config(_))));
    }

    #[test]
    fn invalid_last_id_is_rejected() {
        let q = client().query().with_last_id("not-hex");
        let err = q.list_with_last_id(|_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::InvalidCursor(_)));
    }
}
