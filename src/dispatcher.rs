//! Round-robin credential selection

use crate::client::ImageBackend;
use crate::pool::ClientPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks the client that serves the next job
///
/// The cursor is advanced with a single atomic `fetch_add`, so every call
/// observes a distinct cursor value no matter how many tasks dispatch at
/// once. It advances by exactly one per dispatch regardless of what the
/// selected client does with the job. Wrapping at `usize::MAX` only skews
/// one rotation.
pub struct Dispatcher {
    backends: Arc<[Arc<dyn ImageBackend>]>,
    cursor: AtomicUsize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool_size", &self.backends.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher over an initialized pool, starting at its first client
    pub fn new(pool: ClientPool) -> Self {
        Self {
            backends: pool.into_backends().into(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Select the next client
    pub fn select(&self) -> Arc<dyn ImageBackend> {
        let ticket = self.cursor.fetch_add(1, Ordering::Relaxed);
        // A ClientPool is never empty
        let index = ticket % self.backends.len();
        let backend = Arc::clone(&self.backends[index]);
        tracing::debug!(
            credential = %backend.credential_id(),
            index,
            pool_size = self.backends.len(),
            "dispatching to credential"
        );
        backend
    }

    /// Number of clients rotated over
    pub fn pool_size(&self) -> usize {
        self.backends.len()
    }
}
