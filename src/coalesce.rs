//! Single-flight table for in-flight work keyed by string.
//!
//! At most one future runs per key. Later callers for the same key join
//! the running one and receive a clone of its result, success or error.
//!
//! The work is spawned onto the runtime so it runs to completion even if
//! every caller stops waiting. The entry is removed by the task itself
//! the moment the work settles, after any side effects the work performs
//! (e.g. writing a cache entry), so a caller arriving later always finds
//! either the pending entry or the side effect.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::{CryptarchError, Result};

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Entry<T> {
    id: u64,
    future: SharedResult<T>,
}

/// How a caller got hold of an in-flight result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flight {
    /// This caller started the work.
    Started,
    /// Work for the key was already running; this caller joined it.
    Joined,
}

pub(crate) struct InFlight<T: Clone> {
    pending: Arc<Mutex<HashMap<String, Entry<T>>>>,
    next_id: AtomicU64,
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join the work running for `key`, or start it with `start`.
    ///
    /// `start` is only invoked when nothing is in flight for `key`.
    /// Requires a tokio runtime context.
    pub(crate) fn join_or_start<F, Fut>(&self, key: &str, start: F) -> (SharedResult<T>, Flight)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        if let Some(entry) = pending.get(key) {
            return (entry.future.clone(), Flight::Joined);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let work = start();
        let table = Arc::clone(&self.pending);
        let owned_key = key.to_owned();
        // The spawned task cannot remove its entry before it is inserted:
        // removal takes the same lock we are holding.
        let handle = tokio::spawn(async move {
            let result = work.await;
            let mut pending = lock(&table);
            if pending.get(&owned_key).is_some_and(|e| e.id == id) {
                pending.remove(&owned_key);
            }
            result
        });

        let future = async move {
            handle.await.unwrap_or_else(|e| {
                Err(CryptarchError::Transport(format!(
                    "in-flight task failed: {e}"
                )))
            })
        }
        .boxed()
        .shared();

        pending.insert(
            key.to_owned(),
            Entry {
                id,
                future: future.clone(),
            },
        );
        (future, Flight::Started)
    }

    /// Number of keys currently in flight.
    pub(crate) fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        lock(&self.pending).contains_key(key)
    }

    /// Forget every in-flight entry. Running work is not cancelled, but
    /// new callers start fresh instead of joining it.
    pub(crate) fn clear(&self) {
        lock(&self.pending).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
