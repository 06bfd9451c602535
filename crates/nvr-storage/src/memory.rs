//! In-memory settings store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use nvr_models::{CameraId, CameraSettings};
use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::repository::SettingsRepository;

/// Settings held in a map, for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    records: RwLock<BTreeMap<CameraId, CameraSettings>>,
    fail_saves: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = CameraSettings>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record.camera_id, record);
            }
        }
        store
    }

    /// Stored record, without falling back to defaults.
    pub fn get(&self, camera_id: CameraId) -> Option<CameraSettings> {
        self.records.read().get(&camera_id).cloned()
    }

    /// Make following saves fail with an IO error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsRepository for MemoryConfigStore {
    async fn load(&self, camera_id: CameraId) -> StorageResult<CameraSettings> {
        Ok(self
            .get(camera_id)
            .unwrap_or_else(|| CameraSettings::defaults(camera_id)))
    }

    async fn save(&self, settings: &CameraSettings) -> StorageResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("settings store unavailable")));
        }
        self.records
            .write()
            .insert(settings.camera_id, settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvr_models::DetectorFlags;

    #[tokio::test]
    async fn round_trips_and_defaults() {
        let store = MemoryConfigStore::new();
        assert_eq!(
            store.load(CameraId(7)).await.unwrap(),
            CameraSettings::defaults(CameraId(7))
        );

        let flags = DetectorFlags {
            vehicle: true,
            ..DetectorFlags::NONE
        };
        store
            .save(&CameraSettings::new(CameraId(7), 50, flags))
            .await
            .unwrap();
        assert_eq!(store.load(CameraId(7)).await.unwrap().flags(), flags);
    }

    #[tokio::test]
    async fn failing_saves_leave_records_untouched() {
        let store = MemoryConfigStore::with_records([CameraSettings::defaults(CameraId(0))]);
        store.fail_saves(true);
        let result = store
            .save(&CameraSettings::new(CameraId(0), 5, DetectorFlags::NONE))
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(CameraId(0)).unwrap().threshold, 1000);
    }
}
