//! Named debounce timers
//!
//! A registry of delayed callbacks keyed by name. Resetting a name
//! cancels the pending run and reschedules, so a burst of resets
//! coalesces into a single invocation of the last callback.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Entry {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    next_generation: u64,
    tasks: HashMap<String, Entry>,
}

pub struct TimeoutManager {
    inner: Arc<Mutex<Inner>>,
}

impl TimeoutManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_generation: 0,
                tasks: HashMap::new(),
            })),
        }
    }

    /// Schedule `f` to run after `delay`, cancelling any pending callback
    /// registered under the same name. Must be called from within a tokio
    /// runtime.
    pub fn reset<F>(&self, name: &str, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.tasks.remove(name) {
            entry.handle.abort();
        }
        let generation = inner.next_generation;
        inner.next_generation += 1;

        let key = name.to_string();
        let registry = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut inner = registry.lock();
                // A newer reset owns the name now; that task will run instead.
                match inner.tasks.get(&key) {
                    Some(entry) if entry.generation == generation => {
                        inner.tasks.remove(&key);
                    }
                    _ => return,
                }
            }
            f();
        });

        inner.tasks.insert(
            name.to_string(),
            Entry {
                generation,
                handle,
            },
        );
    }

    /// Drop a pending callback without running it. Returns whether one
    /// was pending.
    pub fn cancel(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.tasks.remove(name) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.inner.lock().tasks.contains_key(name)
    }
}

impl Default for TimeoutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TimeoutManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_burst_coalesces_to_one_run() {
        let manager = TimeoutManager::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            manager.reset("save", Duration::from_millis(40), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!manager.is_pending("save"));
    }

    #[tokio::test]
    async fn test_cancel_prevents_run() {
        let manager = TimeoutManager::new();
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let counter = Arc::clone(&counter);
            manager.reset("save", Duration::from_millis(40), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(manager.cancel("save"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_independent_names() {
        let manager = TimeoutManager::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for name in ["a", "b"] {
            let counter = Arc::clone(&counter);
            manager.reset(name, Duration::from_millis(30), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
