use std::fmt;
use std::time::{Duration, Instant};

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Opaque error from a driver, a callback, or a hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("{0}")]
    Backend(BoxError),
}

impl DriverError {
    pub fn backend(e: impl Into<BoxError>) -> Self {
        DriverError::Backend(e.into())
    }
}

/// Database + collection pair addressed by a driver call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Point in time by which an operation has to finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    pub fn check(&self) -> Result<(), DriverError> {
        if self.is_expired() {
            Err(DriverError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

// ── Per-call options ────────────────────────────────────────────
//
// Passed to the driver untouched; the builder never inspects them beyond
// filling the paging fields of `FindOptions` itself.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    pub allow_disk_use: Option<bool>,
    pub batch_size: Option<u32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub upsert: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOneOptions {
    pub bypass_document_validation: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    pub return_document: ReturnDocument,
    pub upsert: Option<bool>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

// ── Results ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

// ── Seams ───────────────────────────────────────────────────────

/// A server-side result stream.
///
/// Callers must call [`Cursor::close`] once they stop reading, whether or not
/// the stream was exhausted.
pub trait Cursor: Send {
    /// Next document, or `None` once the stream is exhausted.
    fn next_document(&mut self, deadline: &Deadline) -> Option<Result<Document, DriverError>>;

    /// Release the stream. Calling it more than once is a no-op.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// The document store the builder renders queries for.
///
/// Every call receives the deadline of the surrounding operation and should
/// give up with [`DriverError::DeadlineExceeded`] once it passes.
pub trait Driver: Send + Sync {
    type Cursor: Cursor;

    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        options: &FindOptions,
        deadline: &Deadline,
    ) -> Result<Self::Cursor, DriverError>;

    fn find_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        options: &FindOneOptions,
        deadline: &Deadline,
    ) -> Result<Option<Document>, DriverError>;

    fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: &[Document],
        options: &AggregateOptions,
        deadline: &Deadline,
    ) -> Result<Self::Cursor, DriverError>;

    fn count_documents(
        &self,
        ns: &Namespace,
        filter: &Document,
        deadline: &Deadline,
    ) -> Result<u64, DriverError>;

    /// Collection size from metadata, without scanning.
    fn estimated_document_count(
        &self,
        ns: &Namespace,
        deadline: &Deadline,
    ) -> Result<u64, DriverError>;

    fn insert_one(
        &self,
        ns: &Namespace,
        doc: Document,
        options: &InsertOneOptions,
        deadline: &Deadline,
    ) -> Result<InsertOneResult, DriverError>;

    fn insert_many(
        &self,
        ns: &Namespace,
        docs: Vec<Document>,
        deadline: &Deadline,
    ) -> Result<InsertManyResult, DriverError>;

    fn update_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
        deadline: &Deadline,
    ) -> Result<UpdateResult, DriverError>;

    fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
        options: &FindOneAndUpdateOptions,
        deadline: &Deadline,
    ) -> Result<Option<Document>, DriverError>;

    fn find_one_and_delete(
        &self,
        ns: &Namespace,
        filter: &Document,
        deadline: &Deadline,
    ) -> Result<Option<Document>, DriverError>;

    fn delete_many(
        &self,
        ns: &Namespace,
        filter: &Document,
        deadline: &Deadline,
    ) -> Result<DeleteResult, DriverError>;
}
