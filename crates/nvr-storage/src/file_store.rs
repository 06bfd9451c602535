//! JSON file settings store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nvr_models::{CameraId, CameraSettings};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::legacy;
use crate::repository::SettingsRepository;

/// One `camera_{id}.json` file per camera under a settings directory.
///
/// Saves go to `camera_{id}.json.tmp` first and are renamed over the
/// target, so a reader sees either the old or the new record. When no JSON
/// record exists a legacy `camera_{id}.py` file is read as plain data.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, camera_id: CameraId) -> PathBuf {
        self.dir.join(format!("camera_{}.json", camera_id))
    }

    pub fn legacy_path(&self, camera_id: CameraId) -> PathBuf {
        self.dir.join(format!("camera_{}.py", camera_id))
    }

    async fn read_optional(path: &Path) -> StorageResult<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn check_id(camera_id: CameraId, settings: CameraSettings, path: &Path) -> StorageResult<CameraSettings> {
        if settings.camera_id != camera_id {
            return Err(StorageError::invalid_record(format!(
                "{} holds camera {} instead of {}",
                path.display(),
                settings.camera_id,
                camera_id
            )));
        }
        Ok(settings)
    }
}

#[async_trait]
impl SettingsRepository for FileConfigStore {
    async fn load(&self, camera_id: CameraId) -> StorageResult<CameraSettings> {
        let path = self.record_path(camera_id);
        if let Some(contents) = Self::read_optional(&path).await? {
            let settings: CameraSettings = serde_json::from_str(&contents)?;
            debug!(camera_id = %camera_id, path = %path.display(), "Loaded camera settings");
            return Self::check_id(camera_id, settings, &path);
        }

        let legacy_path = self.legacy_path(camera_id);
        if let Some(contents) = Self::read_optional(&legacy_path).await? {
            let settings = legacy::parse(camera_id, &contents)?;
            info!(
                camera_id = %camera_id,
                path = %legacy_path.display(),
                "Loaded legacy camera settings"
            );
            return Self::check_id(camera_id, settings, &legacy_path);
        }

        debug!(camera_id = %camera_id, "No stored settings, using defaults");
        Ok(CameraSettings::defaults(camera_id))
    }

    async fn save(&self, settings: &CameraSettings) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.record_path(settings.camera_id);
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(settings)?;

        fs::write(&tmp_path, &body).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(camera_id = %settings.camera_id, path = %path.display(), "Saved camera settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvr_models::DetectorFlags;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_record_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path());
        let settings = store.load(CameraId(4)).await.unwrap();
        assert_eq!(settings, CameraSettings::defaults(CameraId(4)));
    }

    #[tokio::test]
    async fn save_then_load_replaces_whole_record() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path().join("camsettings"));

        let flags = DetectorFlags {
            face: true,
            explosion: true,
            ..DetectorFlags::NONE
        };
        store
            .save(&CameraSettings::new(CameraId(0), 800, flags))
            .await
            .unwrap();
        store
            .save(&CameraSettings::new(CameraId(0), 900, DetectorFlags::NONE))
            .await
            .unwrap();

        let loaded = store.load(CameraId(0)).await.unwrap();
        assert_eq!(loaded.threshold, 900);
        assert_eq!(loaded.flags(), DetectorFlags::NONE);
        assert!(!store.record_path(CameraId(0)).with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn legacy_file_is_read_when_json_missing() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path());
        std::fs::write(
            store.legacy_path(CameraId(1)),
            "camera_id = 1\nthreshold = 1200\nenable_person_detection = True\n",
        )
        .unwrap();

        let loaded = store.load(CameraId(1)).await.unwrap();
        assert_eq!(loaded.threshold, 1200);
        assert!(loaded.enable_person_detection);

        // A JSON record takes precedence once written.
        store.save(&CameraSettings::defaults(CameraId(1))).await.unwrap();
        assert_eq!(store.load(CameraId(1)).await.unwrap().threshold, 1000);
    }

    #[tokio::test]
    async fn mismatched_camera_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path());
        std::fs::write(store.record_path(CameraId(3)), r#"{"camera_id": 5}"#).unwrap();

        let err = store.load(CameraId(3)).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path());
        std::fs::write(store.record_path(CameraId(0)), "{not json").unwrap();
        assert!(matches!(
            store.load(CameraId(0)).await,
            Err(StorageError::Json(_))
        ));
    }
}
