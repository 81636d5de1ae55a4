mod aggregate;
mod cursor;
mod filter;
mod update;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bson::oid::ObjectId;
use bson::{Bson, Document};

use crate::driver::{
    AggregateOptions, DeleteResult, Deadline, Driver, DriverError, FindOneAndUpdateOptions,
    FindOneOptions, FindOptions, InsertManyResult, InsertOneOptions, InsertOneResult, Namespace,
    ReturnDocument, UpdateOptions, UpdateResult,
};

use aggregate::{Aggregator, project};
pub use cursor::MemoryCursor;
use filter::{Expression, compare_by, matches, parse_filter, sort_documents};
use update::{apply_update, has_id, upsert_seed};

type Collections = HashMap<Namespace, Vec<Document>>;

/// In-process [`Driver`] holding every collection in memory.
///
/// Understands the filter, update, and pipeline subset the query builder
/// renders. Keeps a log of driver calls and a count of open cursors so tests
/// can see what the builder asked for and whether it cleaned up.
#[derive(Default)]
pub struct MemoryDriver {
    collections: RwLock<Collections>,
    open_cursors: Arc<AtomicUsize>,
    calls: Mutex<Vec<&'static str>>,
    last_aggregate_options: Mutex<Option<AggregateOptions>>,
    latency: Duration,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, bounded by the caller's deadline.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Load documents directly, bypassing the call log. Missing `_id`s are
    /// generated.
    pub fn seed(
        &self,
        ns: &Namespace,
        docs: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<Bson>, DriverError> {
        let mut collections = self.write()?;
        let coll = collections.entry(ns.clone()).or_default();
        docs.into_iter().map(|doc| insert_into(coll, doc)).collect()
    }

    /// Snapshot of a collection's documents in insertion order.
    pub fn documents(&self, ns: &Namespace) -> Result<Vec<Document>, DriverError> {
        Ok(self.read()?.get(ns).cloned().unwrap_or_default())
    }

    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Names of the driver methods called so far, oldest first.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_aggregate_options(&self) -> Option<AggregateOptions> {
        self.last_aggregate_options
            .lock()
            .ok()
            .and_then(|o| o.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, DriverError> {
        self.collections
            .read()
            .map_err(|e| DriverError::backend(format!("collections lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, DriverError> {
        self.collections
            .write()
            .map_err(|e| DriverError::backend(format!("collections lock poisoned: {e}")))
    }

    fn enter(&self, op: &'static str, deadline: &Deadline) -> Result<(), DriverError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(op);
        }
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency.min(deadline.remaining()));
        }
        deadline.check()
    }

    fn cursor(&self, docs: Vec<Document>) -> MemoryCursor {
        MemoryCursor::new(docs, self.open_cursors.clone())
    }
}

fn insert_into(coll: &mut Vec<Document>, mut doc: Document) -> Result<Bson, DriverError> {
    let id = match doc.get("_id").cloned() {
        Some(id) => id,
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            let mut with_id = Document::new();
            with_id.insert("_id", id.clone());
            for (k, v) in doc {
                with_id.insert(k, v);
            }
            doc = with_id;
            id
        }
    };
    if has_id(coll, &id) {
        return Err(DriverError::backend(format!("duplicate key: _id {id}")));
    }
    coll.push(doc);
    Ok(id)
}

fn to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Documents matching `expr`, checking the deadline as the scan goes.
fn scan(
    docs: Option<&Vec<Document>>,
    expr: &Expression,
    deadline: &Deadline,
) -> Result<Vec<Document>, DriverError> {
    let mut out = Vec::new();
    for doc in docs.into_iter().flatten() {
        deadline.check()?;
        if matches(doc, expr) {
            out.push(doc.clone());
        }
    }
    Ok(out)
}

/// Position of the first match, honouring an optional sort.
fn first_match(
    docs: &[Document],
    expr: &Expression,
    sort: Option<&Document>,
    deadline: &Deadline,
) -> Result<Option<usize>, DriverError> {
    let mut hits = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        deadline.check()?;
        if matches(doc, expr) {
            if sort.is_none() {
                return Ok(Some(i));
            }
            hits.push(i);
        }
    }
    if let Some(spec) = sort {
        hits.sort_by(|&a, &b| compare_by(spec, &docs[a], &docs[b]));
    }
    Ok(hits.first().copied())
}

fn apply_projection(doc: Document, projection: Option<&Document>) -> Result<Document, DriverError> {
    match projection {
        Some(spec) => project(&doc, spec),
        None => Ok(doc),
    }
}

impl Driver for MemoryDriver {
    type Cursor = MemoryCursor;

    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        options: &FindOptions,
        deadline: &Deadline,
    ) -> Result<MemoryCursor, DriverError> {
        self.enter("find", deadline)?;
        let expr = parse_filter(filter)?;
        let mut docs = scan(self.read()?.get(ns), &expr, deadline)?;

        if let Some(sort) = &options.sort {
            sort_documents(&mut docs, sort);
        }
        let skip = to_usize(options.skip.unwrap_or(0));
        let limit = match options.limit {
            Some(n) if n != 0 => to_usize(n.abs()),
            _ => usize::MAX,
        };
        let docs = docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| apply_projection(d, options.projection.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.cursor(docs))
    }

    fn find_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        options: &FindOneOptions,
        deadline: &Deadline,
    ) -> Result<Option<Document>, DriverError> {
        self.enter("find_one", deadline)?;
        let expr = parse_filter(filter)?;
        let mut docs = scan(self.read()?.get(ns), &expr, deadline)?;
        if let Some(sort) = &options.sort {
            sort_documents(&mut docs, sort);
        }
        docs.into_iter()
            .nth(to_usize(options.skip.unwrap_or(0)))
            .map(|d| apply_projection(d, options.projection.as_ref()))
            .transpose()
    }

    fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: &[Document],
        options: &AggregateOptions,
        deadline: &Deadline,
    ) -> Result<MemoryCursor, DriverError> {
        self.enter("aggregate", deadline)?;
        if let Ok(mut last) = self.last_aggregate_options.lock() {
            *last = Some(options.clone());
        }
        let collections = self.read()?;
        let input = collections.get(ns).cloned().unwrap_or_default();
        let aggregator = Aggregator {
            collections: &*collections,
            database: &ns.database,
            deadline,
        };
        let docs = aggregator.run(input, pipeline)?;
        Ok(self.cursor(docs))
    }

    fn count_documents(
        &self,
        ns: &Namespace,
        filter: &Document,
        deadline: &Deadline,
    ) -> Result<u64, DriverError> {
        self.enter("count_documents", deadline)?;
        let expr = parse_filter(filter)?;
        let n = scan(self.read()?.get(ns), &expr, deadline)?.len();
        Ok(n as u64)
    }

    fn estimated_document_count(
        &self,
        ns: &Namespace,
        deadline: &Deadline,
    ) -> Result<u64, DriverError> {
        self.enter("estimated_document_count", deadline)?;
        Ok(self.read()?.get(ns).map_or(0, Vec::len) as u64)
    }

    fn insert_one(
        &self,
        ns: &Namespace,
        doc: Document,
        _options: &InsertOneOptions,
        deadline: &Deadline,
    ) -> Result<InsertOneResult, DriverError> {
        self.enter("insert_one", deadline)?;
        let mut collections = self.write()?;
        let inserted_id = insert_into(collections.entry(ns.clone()).or_default(), doc)?;
        Ok(InsertOneResult { inserted_id })
    }

    fn insert_many(
        &self,
        ns: &Namespace,
        docs: Vec<Document>,
        deadline: &Deadline,
    ) -> Result<InsertManyResult, DriverError> {
        self.enter("insert_many", deadline)?;
        let mut collections = self.write()?;
        let coll = collections.entry(ns.clone()).or_default();
        let inserted_ids = docs
            .into_iter()
            .map(|doc| insert_into(coll, doc))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InsertManyResult { inserted_ids })
    }

    fn update_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
        deadline: &Deadline,
    ) -> Result<UpdateResult, DriverError> {
        self.enter("update_one", deadline)?;
        let expr = parse_filter(filter)?;
        let mut collections = self.write()?;
        let coll = collections.entry(ns.clone()).or_default();

        match first_match(coll, &expr, None, deadline)? {
            Some(i) => {
                let modified = apply_update(&mut coll[i], update)?;
                Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_id: None,
                })
            }
            None if options.upsert == Some(true) => {
                let mut doc = upsert_seed(filter);
                apply_update(&mut doc, update)?;
                let id = insert_into(coll, doc)?;
                Ok(UpdateResult {
                    upserted_id: Some(id),
                    ..UpdateResult::default()
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }

    fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
        options: &FindOneAndUpdateOptions,
        deadline: &Deadline,
    ) -> Result<Option<Document>, DriverError> {
        self.enter("find_one_and_update", deadline)?;
        let expr = parse_filter(filter)?;
        let mut collections = self.write()?;
        let coll = collections.entry(ns.clone()).or_default();

        let found = match first_match(coll, &expr, options.sort.as_ref(), deadline)? {
            Some(i) => {
                let before = coll[i].clone();
                apply_update(&mut coll[i], update)?;
                match options.return_document {
                    ReturnDocument::Before => Some(before),
                    ReturnDocument::After => Some(coll[i].clone()),
                }
            }
            None if options.upsert == Some(true) => {
                let mut doc = upsert_seed(filter);
                apply_update(&mut doc, update)?;
                insert_into(coll, doc)?;
                match options.return_document {
                    ReturnDocument::Before => None,
                    ReturnDocument::After => coll.last().cloned(),
                }
            }
            None => None,
        };

        found
            .map(|d| apply_projection(d, options.projection.as_ref()))
            .transpose()
    }

    fn find_one_and_delete(
        &self,
        ns: &Namespace,
        filter: &Document,
        deadline: &Deadline,
    ) -> Result<Option<Document>, DriverError> {
        self.enter("find_one_and_delete", deadline)?;
        let expr = parse_filter(filter)?;
        let mut collections = self.write()?;
        let Some(coll) = collections.get_mut(ns) else {
            return Ok(None);
        };
        Ok(first_match(coll, &expr, None, deadline)?.map(|i| coll.remove(i)))
    }

    fn delete_many(
        &self,
        ns: &Namespace,
        filter: &Document,
        deadline: &Deadline,
    ) -> Result<DeleteResult, DriverError> {
        self.enter("delete_many", deadline)?;
        let expr = parse_filter(filter)?;
        let mut collections = self.write()?;
        let Some(coll) = collections.get_mut(ns) else {
            return Ok(DeleteResult::default());
        };
        let before = coll.len();
        coll.retain(|d| !matches(d, &expr));
        Ok(DeleteResult {
            deleted_count: (before - coll.len()) as u64,
        })
    }
}
