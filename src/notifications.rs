use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// An in-app alert raised by the moisture monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub plant_id: String,
    pub plant_name: String,
}

/// Process-wide, newest-first collection of notification records.
///
/// Records live until the user clears them; nothing is persisted. The
/// collection sits behind a mutex so a single store can be shared as
/// `Arc<NotificationStore>` and every operation is atomic.
#[derive(Debug, Default)]
pub struct NotificationStore {
    records: Mutex<Vec<NotificationRecord>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new notification and return it.
    ///
    /// The record gets a fresh UUID and the current instant and is placed in
    /// front of every existing record.
    pub fn add(&self, message: &str, plant_id: &str, plant_name: &str) -> NotificationRecord {
        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
            plant_id: plant_id.to_string(),
            plant_name: plant_name.to_string(),
        };
        debug!("Adding notification {} for plant {}", record.id, plant_id);
        self.lock().insert(0, record.clone());
        record
    }

    /// Remove the record with `id`. Unknown ids are ignored.
    pub fn remove(&self, id: &str) {
        self.lock().retain(|record| record.id != id);
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Snapshot of the records, newest first.
    pub fn list(&self) -> Vec<NotificationRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NotificationRecord>> {
        // each mutation is a single Vec call, so a poisoned list is still consistent
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_newest_first() {
        let store = NotificationStore::new();
        let first = store.add("first", "p1", "Fern");
        let second = store.add("second", "p2", "Ficus");

        let records = store.list();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, second.id);
        assert_eq!(records[1].id, first.id);
        assert_ne!(first.id, second.id);
        assert_eq!(records[0].plant_name, "Ficus");
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let store = NotificationStore::new();
        store.add("first", "p1", "Fern");
        let before = store.list();
        store.remove("missing");
        assert_eq!(store.list(), before);
    }

    #[test]
    fn test_clear() {
        let store = NotificationStore::new();
        store.add("a", "p1", "Fern");
        store.add("b", "p1", "Fern");
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_adds() {
        let store = Arc::new(NotificationStore::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.add("dry", &format!("p{}", i), "Plant");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 100);
    }
}
