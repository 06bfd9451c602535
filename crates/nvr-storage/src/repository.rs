//! Settings load/save contract.

use async_trait::async_trait;
use nvr_models::{CameraId, CameraSettings};

use crate::error::StorageResult;

/// Persisted settings, one record per camera.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Stored record for `camera_id`, or defaults when none exists.
    async fn load(&self, camera_id: CameraId) -> StorageResult<CameraSettings>;

    /// Replace the whole record for `settings.camera_id`.
    async fn save(&self, settings: &CameraSettings) -> StorageResult<()>;
}
