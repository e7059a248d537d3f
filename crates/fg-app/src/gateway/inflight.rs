use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use fg_core::cache::CacheKey;
use fg_core::error::GatewayError;
use fg_core::response::GatewayResponse;

pub(crate) type SharedResponse =
    Shared<BoxFuture<'static, Result<GatewayResponse, GatewayError>>>;

/// Network calls currently running for cacheable GETs, keyed by cache key.
///
/// A second caller for the same key joins the running call instead of
/// starting another one. Entries carry a generation so a finished call never
/// removes a newer one installed under the same key.
#[derive(Default)]
pub(crate) struct InflightRequests {
    calls: Mutex<HashMap<CacheKey, (u64, SharedResponse)>>,
    generation: AtomicU64,
}

impl InflightRequests {
    /// Joins the call running for `key`, or installs the one built by `start`.
    /// `start` receives the generation to hand back to [`Self::finish`].
    pub(crate) fn join_or_start<F>(&self, key: &CacheKey, start: F) -> SharedResponse
    where
        F: FnOnce(u64) -> BoxFuture<'static, Result<GatewayResponse, GatewayError>>,
    {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, running)) = calls.get(key) {
            // A completed call whose cleanup has not run yet is not joined.
            if running.peek().is_none() {
                return running.clone();
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let call = start(generation).shared();
        calls.insert(key.clone(), (generation, call.clone()));
        call
    }

    pub(crate) fn finish(&self, key: &CacheKey, generation: u64) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if calls.get(key).is_some_and(|(g, _)| *g == generation) {
            calls.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
