//! Last published exposition text.
//!
//! The poller replaces the whole snapshot in one write; readers clone an
//! `Arc` and never observe a half-written render.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock as StdRwLock};

use crate::error::{ExporterError, Result};

/// Text served before the first successful cycle.
pub const PLACEHOLDER: &str = "# No prometheus metrics yet, waiting for background refresh.";

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Nothing published yet.
    Pending,
    Ready {
        text: String,
        published_at: DateTime<Utc>,
        /// Number of the poll cycle that produced this text.
        cycle: u64,
    },
}

impl Snapshot {
    pub fn is_ready(&self) -> bool {
        matches!(self, Snapshot::Ready { .. })
    }

    /// Exposition text, or the placeholder before the first publish.
    pub fn text(&self) -> &str {
        match self {
            Snapshot::Pending => PLACEHOLDER,
            Snapshot::Ready { text, .. } => text,
        }
    }
}

#[derive(Debug)]
pub struct SnapshotStore {
    current: StdRwLock<Arc<Snapshot>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self {
            current: StdRwLock::new(Arc::new(Snapshot::Pending)),
        }
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the published snapshot wholesale.
    pub fn publish(&self, text: String, cycle: u64) {
        let next = Arc::new(Snapshot::Ready {
            text,
            published_at: Utc::now(),
            cycle,
        });
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// The snapshot as of this call.
    pub fn current(&self) -> Result<Arc<Snapshot>> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| ExporterError::SnapshotUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_pending_with_placeholder() {
        let store = SnapshotStore::new();
        let snap = store.current().unwrap();
        assert!(!snap.is_ready());
        assert_eq!(snap.text(), PLACEHOLDER);
    }

    #[test]
    fn test_publish_replaces_whole_value() {
        let store = SnapshotStore::new();
        store.publish("a 1\n".into(), 1);
        let held = store.current().unwrap();
        store.publish("b 2\n".into(), 2);

        // A reader holding the old Arc keeps a consistent view.
        assert_eq!(held.text(), "a 1\n");
        let now = store.current().unwrap();
        assert_eq!(now.text(), "b 2\n");
        assert!(matches!(*now, Snapshot::Ready { cycle: 2, .. }));
    }

    #[test]
    fn test_concurrent_readers_see_complete_renders() {
        let store = Arc::new(SnapshotStore::new());
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500u64 {
                    store.publish(format!("x {i}\ny {i}\n"), i);
                }
            })
        };

        for _ in 0..500 {
            let snap = store.current().unwrap();
            if let Snapshot::Ready { text, cycle, .. } = &*snap {
                assert_eq!(text, &format!("x {cycle}\ny {cycle}\n"));
            }
        }
        writer.join().unwrap();
    }
}
