//! One-shot destroy timers, at most one pending per session id.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sessionkit_core::{ProviderRef, SessionResult};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

type Timers = Arc<Mutex<HashMap<String, Timer>>>;

struct Timer {
    token: u64,
    task: AbortHandle,
}

/// Schedules `Provider::destroy` for a session once its lifetime elapses.
///
/// Scheduling an id that already has a pending timer aborts the old one.
/// Dropping the scheduler aborts every pending timer.
pub struct ExpiryScheduler {
    handle: Handle,
    /// Private runtime, only when created outside of one
    runtime: Option<Runtime>,
    timers: Timers,
    next_token: AtomicU64,
}

impl ExpiryScheduler {
    /// Use the ambient tokio runtime, or start a one-worker runtime when there
    /// is none.
    pub fn new() -> SessionResult<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self::with_handle(handle));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("session-expiry")
            .enable_time()
            .build()?;
        let mut scheduler = Self::with_handle(runtime.handle().clone());
        scheduler.runtime = Some(runtime);
        Ok(scheduler)
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
        }
    }

    /// Destroy session `id` in `provider` after `after` has elapsed.
    ///
    /// The destroy result is discarded: an explicit destroy that won the race
    /// leaves the timer observing `NotFound`.
    pub fn schedule(&self, id: &str, after: Duration, provider: ProviderRef) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let key = id.to_string();

        // Held across spawn so the task cannot look itself up before it is
        // registered.
        let mut pending = lock(&self.timers);
        let task = self.handle.spawn(async move {
            tokio::time::sleep(after).await;

            {
                let mut timers = lock(&timers);
                if timers.get(&key).is_some_and(|t| t.token == token) {
                    timers.remove(&key);
                }
            }

            // Providers do blocking io
            let id = key.clone();
            match tokio::task::spawn_blocking(move || provider.destroy(&id)).await {
                Ok(Ok(())) => debug!("Expired session destroyed: {}", key),
                Ok(Err(e)) => debug!(error = %e, "Expiry timer found nothing to destroy for {}", key),
                Err(e) => warn!(error = %e, "Expiry destroy task failed for {}", key),
            }
        });

        let timer = Timer {
            token,
            task: task.abort_handle(),
        };
        if let Some(previous) = pending.insert(id.to_string(), timer) {
            previous.task.abort();
        }
    }

    /// Abort the pending timer for `id`, returning whether there was one
    pub fn cancel(&self, id: &str) -> bool {
        match lock(&self.timers).remove(id) {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        lock(&self.timers).contains_key(id)
    }

    /// Number of pending timers
    pub fn pending(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl fmt::Debug for ExpiryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryScheduler")
            .field("pending", &self.pending())
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        for (_, timer) in lock(&self.timers).drain() {
            timer.task.abort();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn lock(timers: &Mutex<HashMap<String, Timer>>) -> MutexGuard<'_, HashMap<String, Timer>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionkit_core::{Provider, Session};
    use sessionkit_memory::MemoryProvider;

    fn provider_with(ids: &[&str]) -> Arc<MemoryProvider> {
        let provider = Arc::new(MemoryProvider::new());
        for id in ids {
            provider.init(&Session::new(*id, 60)).unwrap();
        }
        provider
    }

    #[tokio::test]
    async fn test_timer_destroys_session() {
        let provider = provider_with(&["a"]);
        let scheduler = ExpiryScheduler::new().unwrap();

        scheduler.schedule("a", Duration::from_millis(10), provider.clone());
        assert!(scheduler.is_scheduled("a"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(provider.read("a").unwrap_err().is_not_found());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_reschedule_cancels_previous_timer() {
        let provider = provider_with(&["a"]);
        let scheduler = ExpiryScheduler::new().unwrap();

        scheduler.schedule("a", Duration::from_millis(10), provider.clone());
        scheduler.schedule("a", Duration::from_secs(3600), provider.clone());
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(provider.read("a").is_ok());
        assert!(scheduler.is_scheduled("a"));
    }

    #[tokio::test]
    async fn test_cancel() {
        let provider = provider_with(&["a"]);
        let scheduler = ExpiryScheduler::new().unwrap();

        scheduler.schedule("a", Duration::from_millis(10), provider.clone());
        assert!(scheduler.cancel("a"));
        assert!(!scheduler.cancel("a"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(provider.read("a").is_ok());
    }

    #[tokio::test]
    async fn test_timer_tolerates_already_destroyed_session() {
        let provider = provider_with(&["a"]);
        let scheduler = ExpiryScheduler::new().unwrap();

        scheduler.schedule("a", Duration::from_millis(10), provider.clone());
        provider.destroy("a").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.pending(), 0);
    }

    #[derive(Debug, Default)]
    struct ThreadRecorder {
        inner: MemoryProvider,
        destroyed_on: Mutex<Option<std::thread::ThreadId>>,
    }

    impl Provider for ThreadRecorder {
        fn init(&self, session: &Session) -> SessionResult<()> {
            self.inner.init(session)
        }

        fn read(&self, id: &str) -> SessionResult<Session> {
            self.inner.read(id)
        }

        fn destroy(&self, id: &str) -> SessionResult<()> {
            *self.destroyed_on.lock().unwrap() = Some(std::thread::current().id());
            self.inner.destroy(id)
        }

        fn commit(&self, id: &str) -> SessionResult<()> {
            self.inner.commit(id)
        }
    }

    #[tokio::test]
    async fn test_destroy_runs_on_blocking_pool() {
        let provider = Arc::new(ThreadRecorder::default());
        provider.init(&Session::new("a", 60)).unwrap();
        let scheduler = ExpiryScheduler::new().unwrap();

        scheduler.schedule("a", Duration::from_millis(10), provider.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(provider.read("a").unwrap_err().is_not_found());
        // the current-thread test runtime would run destroy here otherwise
        let destroyed_on = provider.destroyed_on.lock().unwrap().unwrap();
        assert_ne!(destroyed_on, std::thread::current().id());
    }

    #[test]
    fn test_private_runtime_outside_tokio() {
        let provider = provider_with(&["a", "b"]);
        let scheduler = ExpiryScheduler::new().unwrap();

        scheduler.schedule("a", Duration::ZERO, provider.clone());
        scheduler.schedule("b", Duration::from_secs(3600), provider.clone());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while provider.read("a").is_ok() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(provider.read("a").unwrap_err().is_not_found());
        assert!(provider.read("b").is_ok());

        drop(scheduler);
        assert!(provider.read("b").is_ok());
    }
}
