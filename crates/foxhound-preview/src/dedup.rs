//! Request deduplication and debouncing
//!
//! Authoritative refreshes go through three layers:
//!
//! - [`Debouncer`]: a per-key timer map. Scheduling a key that already has
//!   a pending timer cancels it and starts a new one with the latest
//!   arguments, so a burst of edits to one entity collapses into a single
//!   trailing call. Different keys never coalesce.
//! - [`RequestDeduplicator`]: issues the fetch and applies the response only
//!   if no newer request for the same slot started meanwhile. There is no
//!   cancellation of in-flight fetches; superseded responses are dropped.
//! - [`RefreshScheduler`]: ties the two together for the rest of the engine.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::PreviewError;
use crate::models::EntityType;
use crate::source::SourceTable;
use crate::store::{RefreshKey, Store, StoreAction};

struct PendingCall<A> {
    generation: u64,
    args: A,
    handle: JoinHandle<()>,
}

struct DebounceState<K, A> {
    calls: HashMap<K, PendingCall<A>>,
    generation: u64,
}

/// Per-key trailing-edge debouncer
pub struct Debouncer<K, A> {
    delay: Duration,
    state: Arc<Mutex<DebounceState<K, A>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, A> Debouncer<K, A>
where
    K: Eq + Hash + Clone + Send + 'static,
    A: Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(DebounceState {
                calls: HashMap::new(),
                generation: 0,
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `run(args)` once `delay` passes without another call for `key`
    ///
    /// A pending call for the same key is cancelled and its arguments are
    /// replaced by `args`. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: K, args: A, run: F)
    where
        F: FnOnce(A) -> BoxFuture<'static, ()> + Send + 'static,
    {
        let mut state = lock(&self.state);
        state.generation += 1;
        let generation = state.generation;

        let shared = Arc::clone(&self.state);
        let timer_key = key.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let args = {
                let mut state = lock(&shared);
                let current = state.calls.get(&timer_key).map(|call| call.generation);
                if current == Some(generation) {
                    state.calls.remove(&timer_key).map(|call| call.args)
                } else {
                    None
                }
            };

            if let Some(args) = args {
                run(args).await;
            }
        });

        let call = PendingCall {
            generation,
            args,
            handle,
        };
        if let Some(replaced) = state.calls.insert(key, call) {
            replaced.handle.abort();
        }
    }

    /// Whether a call for `key` is waiting on its timer
    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.state).calls.contains_key(key)
    }

    /// Number of keys with a pending call
    pub fn pending_count(&self) -> usize {
        lock(&self.state).calls.len()
    }

    /// Arguments of the pending call for `key`
    pub fn pending_args(&self, key: &K) -> Option<A>
    where
        A: Clone,
    {
        lock(&self.state).calls.get(key).map(|call| call.args.clone())
    }

    /// Drop every pending call without running it
    pub fn cancel_all(&self) {
        let mut state = lock(&self.state);
        for (_, call) in state.calls.drain() {
            call.handle.abort();
        }
    }
}

/// Result of one authoritative refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response was applied to the store
    Applied,
    /// A newer request started before this one finished; response dropped
    Superseded,
    /// No fetch capability is registered for the target
    Unsupported,
    /// The fetch failed; the error was logged
    Failed,
}

/// A refresh to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshRequest {
    Entity {
        entity_type: EntityType,
        entity_id: u64,
        slug: String,
    },
    SiteTitle,
}

impl RefreshRequest {
    pub fn key(&self) -> RefreshKey {
        match self {
            RefreshRequest::Entity {
                entity_type,
                entity_id,
                ..
            } => RefreshKey::Entity(*entity_type, *entity_id),
            RefreshRequest::SiteTitle => RefreshKey::SiteTitle,
        }
    }
}

/// Issues fetches and suppresses stale responses
#[derive(Debug, Clone)]
pub struct RequestDeduplicator {
    store: Arc<Store>,
    sources: SourceTable,
}

impl RequestDeduplicator {
    pub fn new(store: Arc<Store>, sources: SourceTable) -> Self {
        Self { store, sources }
    }

    pub fn sources(&self) -> &SourceTable {
        &self.sources
    }

    /// Perform a refresh
    pub async fn refresh(&self, request: RefreshRequest) -> RefreshOutcome {
        match request {
            RefreshRequest::Entity {
                entity_type,
                entity_id,
                slug,
            } => {
                self.request_entity_refresh(entity_type, entity_id, &slug)
                    .await
            }
            RefreshRequest::SiteTitle => self.request_title_refresh().await,
        }
    }

    /// Fetch an entity by slug and apply it unless superseded
    pub async fn request_entity_refresh(
        &self,
        entity_type: EntityType,
        entity_id: u64,
        slug: &str,
    ) -> RefreshOutcome {
        let Some(source) = self.sources.entity(entity_type) else {
            return RefreshOutcome::Unsupported;
        };

        let key = RefreshKey::Entity(entity_type, entity_id);
        let epoch = self.store.begin_request(key);
        debug!("Refreshing {} {} ({}), epoch {}", entity_type, entity_id, slug, epoch);

        let record = match source.fetch_by_slug(slug).await {
            Ok(record) => record,
            Err(e) => {
                log_failure(&format!("Refresh of {} {}", entity_type, entity_id), &e);
                return RefreshOutcome::Failed;
            }
        };

        if self
            .store
            .dispatch_if_current(key, epoch, StoreAction::entity_success(record))
        {
            RefreshOutcome::Applied
        } else {
            debug!(
                "Discarding stale response for {} {} (epoch {})",
                entity_type, entity_id, epoch
            );
            RefreshOutcome::Superseded
        }
    }

    /// Fetch the rendered site title and apply it unless superseded
    pub async fn request_title_refresh(&self) -> RefreshOutcome {
        let Some(source) = self.sources.title() else {
            return RefreshOutcome::Unsupported;
        };

        let epoch = self.store.begin_request(RefreshKey::SiteTitle);
        let title = match source.fetch_title().await {
            Ok(title) => title,
            Err(e) => {
                log_failure("Site title refresh", &e);
                return RefreshOutcome::Failed;
            }
        };

        let action = StoreAction::SiteTitleReceive { title };
        if self
            .store
            .dispatch_if_current(RefreshKey::SiteTitle, epoch, action)
        {
            RefreshOutcome::Applied
        } else {
            debug!("Discarding stale site title (epoch {})", epoch);
            RefreshOutcome::Superseded
        }
    }
}

fn log_failure(what: &str, err: &PreviewError) {
    if err.is_transient() {
        warn!("{} failed, the next edit will retry: {}", what, err);
    } else {
        warn!("{} failed: {}", what, err);
    }
}

/// Debounced and immediate refreshes on top of a [`RequestDeduplicator`]
pub struct RefreshScheduler {
    dedup: RequestDeduplicator,
    debouncer: Debouncer<RefreshKey, RefreshRequest>,
}

impl RefreshScheduler {
    pub fn new(dedup: RequestDeduplicator, debounce: Duration) -> Self {
        Self {
            dedup,
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn dedup(&self) -> &RequestDeduplicator {
        &self.dedup
    }

    pub fn debouncer(&self) -> &Debouncer<RefreshKey, RefreshRequest> {
        &self.debouncer
    }

    /// Refresh after the debounce window, coalescing with later edits
    pub fn schedule(&self, request: RefreshRequest) {
        let dedup = self.dedup.clone();
        self.debouncer.schedule(request.key(), request, move |request| {
            Box::pin(async move {
                dedup.refresh(request).await;
            })
        });
    }

    /// Refresh right away, bypassing the debouncer
    pub fn refresh_now(&self, request: RefreshRequest) -> JoinHandle<RefreshOutcome> {
        let dedup = self.dedup.clone();
        tokio::spawn(async move { dedup.refresh(request).await })
    }

    /// Cancel all pending debounced refreshes
    pub fn shutdown(&self) {
        self.debouncer.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_same_key() {
        let debouncer = Debouncer::new(Duration::from_millis(1000));
        let calls = Arc::new(Mutex::new(Vec::new()));

        for value in 1..=5 {
            let calls = Arc::clone(&calls);
            debouncer.schedule("post-1", value, move |v| {
                Box::pin(async move {
                    calls.lock().unwrap().push(v);
                })
            });
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        assert!(debouncer.is_pending(&"post-1"));
        assert_eq!(debouncer.pending_args(&"post-1"), Some(5));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(*calls.lock().unwrap(), vec![5]);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_keeps_keys_apart() {
        let debouncer = Debouncer::new(Duration::from_millis(1000));
        let count = Arc::new(AtomicUsize::new(0));

        for key in ["post-1", "post-2", "post-1"] {
            let count = Arc::clone(&count);
            debouncer.schedule(key, (), move |_| {
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                })
            });
        }
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        debouncer.schedule(1u64, (), move |_| {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        debouncer.cancel_all();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_entity_type_is_noop() {
        let store = Arc::new(Store::new());
        let dedup = RequestDeduplicator::new(Arc::clone(&store), SourceTable::new());

        let outcome = dedup
            .request_entity_refresh(EntityType::Page, 3, "about")
            .await;
        assert_eq!(outcome, RefreshOutcome::Unsupported);
        assert_eq!(store.current_epoch(RefreshKey::Entity(EntityType::Page, 3)), 0);
        assert_eq!(dedup.request_title_refresh().await, RefreshOutcome::Unsupported);
    }
}
