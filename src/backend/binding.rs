//! Bounded access to a session's backend connection.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ExplorerError, ExplorerResult};

/// Serializes use of one backend connection.
///
/// Each population borrows a slot for its whole duration. A queue with
/// capacity 1 gives callers exclusive use of the connection.
pub struct BindingQueue<C> {
    connection: Arc<C>,
    slots: Arc<Semaphore>,
    capacity: u32,
}

impl<C> BindingQueue<C> {
    /// Exclusive access, one borrower at a time.
    pub fn new(connection: C) -> Self {
        Self::with_capacity(connection, 1)
    }

    pub fn with_capacity(connection: C, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            connection: Arc::new(connection),
            slots: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    /// Borrow the connection, waiting at most `timeout` for a free slot.
    pub async fn acquire(&self, timeout: Duration) -> ExplorerResult<BoundConnection<C>> {
        match tokio::time::timeout(timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(BoundConnection {
                connection: self.connection.clone(),
                _permit: permit,
            }),
            Ok(Err(_)) => Err(ExplorerError::ConnectionClosed),
            Err(_) => Err(ExplorerError::timeout("connection acquire", timeout)),
        }
    }

    /// Wait until every borrowed slot is returned. Returns `false` if the
    /// deadline passed first or the queue was already closed.
    ///
    /// The drained slots are held until [`close`](Self::close) so no new
    /// borrower slips in.
    pub async fn drain(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.slots.acquire_many(self.capacity)).await {
            Ok(Ok(permits)) => {
                permits.forget();
                true
            }
            _ => false,
        }
    }

    /// Refuse all further borrowers. Waiting borrowers fail immediately.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Number of slots currently free.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// The underlying connection, for teardown.
    pub fn connection(&self) -> &C {
        &self.connection
    }
}

/// A borrowed connection. The slot is returned on drop.
pub struct BoundConnection<C> {
    connection: Arc<C>,
    _permit: OwnedSemaphorePermit,
}

impl<C> Deref for BoundConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}
