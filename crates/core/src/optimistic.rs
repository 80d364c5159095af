//! Optimistic update with rollback.
//!
//! [`Optimistic`] holds one value that the UI shows. A mutation is applied locally straight away,
//! persisted, and reverted to the exact pre-mutation snapshot if persistence fails. Nothing is
//! retried.
//!
//! Mutations are tagged in issue order. Only the most recently issued mutation may change the
//! value when it completes: a failure that arrives after a newer mutation was issued is reported
//! to its caller but does not roll anything back. A detached coordinator ignores completions
//! altogether.

use crate::error::{ApiResult, DiscussionError, DiscussionResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
struct Slot<T> {
    value: T,
    latest_tag: u64,
    detached: bool,
}

#[derive(Debug)]
pub struct Optimistic<T> {
    slot: Arc<Mutex<Slot<T>>>,
    notify: Arc<watch::Sender<T>>,
}

impl<T> Clone for Optimistic<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Optimistic<T> {
    pub fn new(initial: T) -> Self {
        let (notify, _) = watch::channel(initial.clone());
        Self {
            slot: Arc::new(Mutex::new(Slot {
                value: initial,
                latest_tag: 0,
                detached: false,
            })),
            notify: Arc::new(notify),
        }
    }

    pub fn current(&self) -> T {
        self.slot.lock().value.clone()
    }

    /// Receive the value every time it is applied, confirmed or rolled back.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.notify.subscribe()
    }

    /// Stop applying completions of in-flight mutations.
    pub fn detach(&self) {
        self.slot.lock().detached = true;
    }

    /// Apply `change` locally, then persist the result with `persist`.
    ///
    /// Returns the value that was applied. On failure the value in place before this call is
    /// restored (unless a newer mutation has been issued since) and the collaborator's error is
    /// returned as [`DiscussionError::Mutation`].
    pub async fn mutate<F, P, Fut>(&self, change: F, persist: P) -> DiscussionResult<T>
    where
        F: FnOnce(&T) -> T,
        P: FnOnce(T) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let (previous, next, tag) = {
            let mut slot = self.slot.lock();
            let previous = slot.value.clone();
            let next = change(&previous);
            slot.latest_tag += 1;
            slot.value = next.clone();
            (previous, next, slot.latest_tag)
        };
        self.notify.send_replace(next.clone());

        let outcome = persist(next.clone()).await;

        let mut slot = self.slot.lock();
        let superseded = slot.latest_tag != tag;
        if slot.detached || superseded {
            tracing::debug!(
                tag,
                latest = slot.latest_tag,
                detached = slot.detached,
                "ignoring completion of superseded mutation"
            );
            return outcome.map(|_| next).map_err(DiscussionError::Mutation);
        }

        match outcome {
            Ok(_) => {
                let confirmed = slot.value.clone();
                drop(slot);
                self.notify.send_replace(confirmed);
                Ok(next)
            }
            Err(e) => {
                tracing::warn!(error = %e, "mutation failed, restoring previous state");
                slot.value = previous.clone();
                drop(slot);
                self.notify.send_replace(previous);
                Err(DiscussionError::Mutation(e))
            }
        }
    }
}
