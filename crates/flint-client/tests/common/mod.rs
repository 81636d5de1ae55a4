#![allow(dead_code)]

use std::sync::Arc;

use bson::oid::ObjectId;
use bson::{Document, doc};
use flint_client::{Client, MemoryDriver, Namespace};

pub const DATABASE: &str = "crm";
pub const COLLECTION: &str = "accounts";

pub fn ns() -> Namespace {
    Namespace::new(DATABASE, COLLECTION)
}

/// Deterministic ObjectId whose order follows `n`.
pub fn oid(n: u32) -> ObjectId {
    let mut bytes = [0u8; 12];
    bytes[8..].copy_from_slice(&n.to_be_bytes());
    ObjectId::from_bytes(bytes)
}

pub fn account(n: u32) -> Document {
    let status = if n % 2 == 0 { "active" } else { "paused" };
    doc! {
        "_id": oid(n),
        "name": format!("acct-{n:03}"),
        "score": n as i32,
        "status": status,
    }
}

pub fn client_for(driver: Arc<MemoryDriver>) -> Client<MemoryDriver> {
    Client::builder()
        .shared_driver(driver)
        .database(DATABASE)
        .collection(COLLECTION)
        .build()
        .unwrap()
}

/// Driver holding accounts 1..=n, plus a client bound to it.
pub fn seeded(n: u32) -> (Arc<MemoryDriver>, Client<MemoryDriver>) {
    let driver = Arc::new(MemoryDriver::new());
    driver.seed(&ns(), (1..=n).map(account)).unwrap();
    let client = client_for(driver.clone());
    (driver, client)
}

pub fn names(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .map(|d| d.get_str("name").unwrap().to_string())
        .collect()
}
