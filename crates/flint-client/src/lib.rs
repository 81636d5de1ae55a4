mod client;
mod config;
mod driver;
mod error;
mod hooks;
#[cfg(feature = "memory")]
pub mod memory;
mod query;
mod rows;
mod update;

pub use client::{Client, ClientBuilder};
pub use config::{
    ClientConfig, DEFAULT_QUERY_TIMEOUT_MS, DEFAULT_SKIP_WHEN_UPDATING, DEFAULT_UPDATED_AT_FIELD,
};
pub use driver::{
    AggregateOptions, BoxError, Cursor, Deadline, DeleteResult, Driver, DriverError,
    FindOneAndUpdateOptions, FindOneOptions, FindOptions, InsertManyResult, InsertOneOptions,
    InsertOneResult, Namespace, ReturnDocument, UpdateOptions, UpdateResult,
};
pub use error::Error;
pub use hooks::{HookPhase, Hooks};
#[cfg(feature = "memory")]
pub use memory::MemoryDriver;
pub use query::QueryBuilder;
pub use rows::Rows;
pub use update::UpdateFields;
