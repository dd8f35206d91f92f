//! Streaming execution
//!
//! A [`RowSequence`] owns a live cursor and delivers mapped rows one at a
//! time, applying the residual actions the planner left in memory. It can
//! be consumed through [`RowSequence::next_row`], as an [`Iterator`] or as
//! a [`futures::Stream`]. A [`CloseHandle`] closes it from any thread.
//!
//! States: `Created -> Open -> (Exhausted | Closed)`. Any traversal after
//! close fails with [`QueryError::ResourceClosed`].

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::QueryError;
use crate::pipeline::Stage;
use crate::replay::{replay, Rows};
use crate::row::{FieldAccess, RowMapper};
use crate::source::{PartitionStrategy, RowCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Created,
    Open,
    Exhausted,
    Closed,
}

struct Shared {
    closed: AtomicBool,
    cursor: Mutex<Option<Box<dyn RowCursor>>>,
}

impl Shared {
    fn new(cursor: Box<dyn RowCursor>) -> Self {
        Self {
            closed: AtomicBool::new(false),
            cursor: Mutex::new(Some(cursor)),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // A fetch in progress holds the lock and drops the cursor itself
        // once it sees the flag.
        if let Some(mut slot) = self.cursor.try_lock() {
            if let Some(cursor) = slot.take() {
                let unread = cursor.remaining().unwrap_or(0);
                if unread > 0 {
                    warn!(unread, "Closing row sequence with unread rows");
                }
            }
        }
        debug!("Row sequence closed");
    }

    fn release(&self) {
        self.cursor.lock().take();
    }
}

/// Closes a [`RowSequence`] from another thread. Closing is immediate and
/// idempotent.
#[derive(Clone)]
pub struct CloseHandle {
    shared: Arc<Shared>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl std::fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Pulls raw rows from the shared cursor and maps them.
struct CursorRows<T> {
    shared: Arc<Shared>,
    mapper: Arc<dyn RowMapper<T>>,
}

impl<T> Iterator for CursorRows<T> {
    type Item = Result<T, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.shared.is_closed() {
            return Some(Err(QueryError::ResourceClosed));
        }

        let mut slot = self.shared.cursor.lock();
        let cursor = slot.as_mut()?;
        let fetched = cursor.next_raw();

        if self.shared.is_closed() {
            slot.take();
            return Some(Err(QueryError::ResourceClosed));
        }

        match fetched {
            Ok(Some(raw)) => {
                trace!(columns = raw.columns().len(), "Fetched row");
                Some(self.mapper.map_row(&raw).map_err(QueryError::from))
            }
            Ok(None) => {
                // hand the connection back as soon as the cursor is drained
                slot.take();
                None
            }
            Err(e) => {
                slot.take();
                Some(Err(QueryError::Backend(e)))
            }
        }
    }
}

pub struct RowSequence<T> {
    shared: Arc<Shared>,
    mapper: Arc<dyn RowMapper<T>>,
    residual: Vec<Stage<T>>,
    rows: Option<Rows<T>>,
    state: SequenceState,
    failed: bool,
}

impl<T> RowSequence<T>
where
    T: FieldAccess + Send + 'static,
{
    pub fn new(
        cursor: Box<dyn RowCursor>,
        mapper: Arc<dyn RowMapper<T>>,
        residual: Vec<Stage<T>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(cursor)),
            mapper,
            residual,
            rows: None,
            state: SequenceState::Created,
            failed: false,
        }
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> SequenceState {
        if self.shared.is_closed() {
            SequenceState::Closed
        } else {
            self.state
        }
    }

    /// Next row, `Ok(None)` once exhausted.
    pub fn next_row(&mut self) -> Result<Option<T>, QueryError> {
        if self.shared.is_closed() {
            self.state = SequenceState::Closed;
            self.rows = None;
            return Err(QueryError::ResourceClosed);
        }
        if self.state == SequenceState::Exhausted {
            return Ok(None);
        }

        if self.rows.is_none() {
            let base: Rows<T> = Box::new(CursorRows {
                shared: Arc::clone(&self.shared),
                mapper: Arc::clone(&self.mapper),
            });
            self.rows = Some(replay(base, std::mem::take(&mut self.residual)));
            self.state = SequenceState::Open;
        }
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };

        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => {
                if self.shared.is_closed() {
                    self.state = SequenceState::Closed;
                }
                Err(e)
            }
            None => {
                self.state = SequenceState::Exhausted;
                self.rows = None;
                self.shared.release();
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) {
        self.shared.close();
        self.rows = None;
        self.state = SequenceState::Closed;
    }

    /// Split an unread sequence into independent sequences over segments of
    /// its cursor. Sequences whose cursor cannot be segmented, that were
    /// already read from, or whose residual actions need to see every row
    /// come back whole.
    pub fn partition(self, strategy: PartitionStrategy) -> Vec<RowSequence<T>> {
        let row_local = self.residual.iter().all(|s| s.action.is_row_local());
        if self.state() != SequenceState::Created || !row_local {
            debug!(state = ?self.state(), row_local, "Row sequence not partitioned");
            return vec![self];
        }

        let segments = match self.shared.cursor.lock().as_mut() {
            Some(cursor) => cursor.split_off(strategy),
            None => Vec::new(),
        };
        if segments.is_empty() {
            return vec![self];
        }

        debug!(segments = segments.len(), ?strategy, "Partitioned row sequence");
        segments
            .into_iter()
            .map(|cursor| RowSequence::new(cursor, Arc::clone(&self.mapper), self.residual.clone()))
            .collect()
    }
}

impl<T> Drop for RowSequence<T> {
    fn drop(&mut self) {
        self.rows = None;
        self.shared.release();
    }
}

impl<T> Iterator for RowSequence<T>
where
    T: FieldAccess + Send + 'static,
{
    type Item = Result<T, QueryError>;

    /// Yields a failure once, then ends.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Rows are already buffered or fetched synchronously, so every poll is
/// ready.
impl<T> Stream for RowSequence<T>
where
    T: FieldAccess + Send + 'static,
{
    type Item = Result<T, QueryError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().next())
    }
}
