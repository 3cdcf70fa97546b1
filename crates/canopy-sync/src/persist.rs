//! Debounced snapshot persistence
//!
//! Wraps the snapshot store behind the named-debounce registry so a
//! burst of tree mutations coalesces into a single write of the last
//! serialized state. Scheduling requires a tokio runtime; the write
//! itself happens on a background task.

use std::time::Duration;

use canopy_store::{Database, TimeoutManager};

pub struct PersistenceBridge {
    db: Database,
    timeouts: TimeoutManager,
    key: String,
    delay: Duration,
    enabled: bool,
}

impl PersistenceBridge {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(750);

    pub fn new(db: Database, key: impl Into<String>, delay: Duration) -> Self {
        Self {
            db,
            timeouts: TimeoutManager::new(),
            key: key.into(),
            delay,
            enabled: true,
        }
    }

    fn timer_name(&self) -> String {
        format!("snapshot:{}", self.key)
    }

    /// Read the last persisted snapshot, if any.
    pub fn load(&self) -> canopy_store::Result<Option<String>> {
        self.db.load_snapshot(&self.key)
    }

    /// Queue a write of `snapshot_json`, replacing any queued one. The
    /// last snapshot scheduled before the delay elapses is what lands.
    pub fn schedule(&self, snapshot_json: String) {
        if !self.enabled {
            return;
        }
        let db = self.db.clone();
        let key = self.key.clone();
        self.timeouts.reset(&self.timer_name(), self.delay, move || {
            if let Err(e) = db.save_snapshot(&key, &snapshot_json) {
                tracing::warn!(key = %key, error = %e, "Snapshot write failed");
            }
        });
    }

    /// Write immediately, dropping any queued write.
    pub fn flush(&self, snapshot_json: &str) -> canopy_store::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.timeouts.cancel(&self.timer_name());
        self.db.save_snapshot(&self.key, snapshot_json)
    }

    /// Stop writing for good; a torn-down tree must not reach storage.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.timeouts.cancel(&self.timer_name());
        tracing::debug!(key = %self.key, "Snapshot writes disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_coalesces_to_last_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let bridge = PersistenceBridge::new(db.clone(), "tree", Duration::from_millis(30));

        for i in 0..5 {
            bridge.schedule(format!("[{}]", i));
        }
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(db.load_snapshot("tree").unwrap().as_deref(), Some("[4]"));
    }

    #[tokio::test]
    async fn test_disable_drops_queued_write() {
        let db = Database::open_in_memory().unwrap();
        let mut bridge = PersistenceBridge::new(db.clone(), "tree", Duration::from_millis(30));

        bridge.schedule("[1]".to_string());
        bridge.disable();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(db.load_snapshot("tree").unwrap(), None);

        bridge.schedule("[2]".to_string());
        assert!(bridge.flush("[3]").is_ok());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(db.load_snapshot("tree").unwrap(), None);
    }

    #[tokio::test]
    async fn test_flush_skips_debounce() {
        let db = Database::open_in_memory().unwrap();
        let bridge = PersistenceBridge::new(db.clone(), "tree", Duration::from_secs(60));

        bridge.schedule("[queued]".to_string());
        bridge.flush("[now]").unwrap();
        assert_eq!(db.load_snapshot("tree").unwrap().as_deref(), Some("[now]"));

        // the queued write was cancelled along the way
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(db.load_snapshot("tree").unwrap().as_deref(), Some("[now]"));
    }
}
