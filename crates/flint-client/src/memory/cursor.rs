use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bson::Document;

use crate::driver::{Cursor, Deadline, DriverError};

/// Cursor over a materialized result set.
///
/// Registers itself in the driver's open-cursor count until closed. Dropping
/// without closing leaves the count raised so leaks stay visible.
pub struct MemoryCursor {
    docs: std::vec::IntoIter<Document>,
    open: Arc<AtomicUsize>,
    closed: bool,
}

impl MemoryCursor {
    pub(crate) fn new(docs: Vec<Document>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            docs: docs.into_iter(),
            open,
            closed: false,
        }
    }
}

impl Cursor for MemoryCursor {
    fn next_document(&mut self, deadline: &Deadline) -> Option<Result<Document, DriverError>> {
        if self.closed {
            return None;
        }
        if deadline.is_expired() {
            return Some(Err(DriverError::DeadlineExceeded));
        }
        self.docs.next().map(Ok)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            self.closed = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
