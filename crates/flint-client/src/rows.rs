use bson::Document;
use tracing::warn;

use crate::driver::{Cursor, Deadline};
use crate::error::Error;

/// Streamed results of a find or aggregate call.
///
/// Re-checks the operation deadline before every document and closes the
/// underlying cursor when dropped, so early returns never leak it.
pub struct Rows<C: Cursor> {
    cursor: C,
    deadline: Deadline,
    finished: bool,
    closed: bool,
}

impl<C: Cursor> Rows<C> {
    pub(crate) fn new(cursor: C, deadline: Deadline) -> Self {
        Self {
            cursor,
            deadline,
            finished: false,
            closed: false,
        }
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Close the cursor, reporting a failure instead of logging it.
    pub(crate) fn close(mut self) -> Result<(), Error> {
        self.closed = true;
        self.cursor
            .close()
            .map_err(|e| Error::from_driver(e, &self.deadline))
    }
}

impl<C: Cursor> Iterator for Rows<C> {
    type Item = Result<Document, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.deadline.is_expired() {
            self.finished = true;
            return Some(Err(Error::Timeout(self.deadline.budget())));
        }
        match self.cursor.next_document(&self.deadline) {
            Some(Ok(doc)) => Some(Ok(doc)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(Error::from_driver(e, &self.deadline)))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl<C: Cursor> Drop for Rows<C> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.cursor.close() {
                warn!(error = %e, "failed to close cursor");
            }
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryCursor;
    use bson::doc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn rows(n: i32, budget: Duration) -> (Rows<MemoryCursor>, Arc<AtomicUsize>) {
        let open = Arc::new(AtomicUsize::new(0));
        let docs = (0..n).map(|i| doc! { "i": i }).collect();
        let cursor = MemoryCursor::new(docs, open.clone());
        (Rows::new(cursor, Deadline::after(budget)), open)
    }

    #[test]
    fn drop_closes_an_unfinished_cursor() {
        let (mut rows, open) = rows(3, Duration::from_secs(5));
        assert!(rows.next().unwrap().is_ok());
        assert_eq!(open.load(Ordering::SeqCst), 1);
        drop(rows);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn expired_deadline_ends_the_stream() {
        let (mut rows, open) = rows(3, Duration::ZERO);
        assert!(matches!(rows.next(), Some(Err(Error::Timeout(_)))));
        assert!(rows.next().is_none());
        rows.close().unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }
}
