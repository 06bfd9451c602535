//! Persisted per-camera settings.

use serde::{Deserialize, Serialize};

use crate::camera::CameraId;
use crate::detector::DetectorFlags;

/// Motion sensitivity used when no record exists for a camera.
pub const DEFAULT_MOTION_THRESHOLD: u32 = 1000;

/// Settings record for one camera.
///
/// Created from defaults when nothing is persisted and always saved as a
/// full record, never merged field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub camera_id: CameraId,
    /// Minimum moving-region area in source pixels.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub enable_face_detection: bool,
    #[serde(default)]
    pub enable_person_detection: bool,
    #[serde(default)]
    pub enable_vehicle_detection: bool,
    #[serde(default)]
    pub enable_animal_detection: bool,
    #[serde(default)]
    pub enable_explosion_detection: bool,
}

fn default_threshold() -> u32 {
    DEFAULT_MOTION_THRESHOLD
}

impl CameraSettings {
    /// Defaults: threshold 1000, every annotation detector disabled.
    pub fn defaults(camera_id: CameraId) -> Self {
        Self::new(camera_id, DEFAULT_MOTION_THRESHOLD, DetectorFlags::NONE)
    }

    pub fn new(camera_id: CameraId, threshold: u32, flags: DetectorFlags) -> Self {
        Self {
            camera_id,
            threshold,
            enable_face_detection: flags.face,
            enable_person_detection: flags.person,
            enable_vehicle_detection: flags.vehicle,
            enable_animal_detection: flags.animal,
            enable_explosion_detection: flags.explosion,
        }
    }

    pub fn flags(&self) -> DetectorFlags {
        DetectorFlags {
            face: self.enable_face_detection,
            person: self.enable_person_detection,
            vehicle: self.enable_vehicle_detection,
            animal: self.enable_animal_detection,
            explosion: self.enable_explosion_detection,
        }
    }

    /// Copy of this record with the detector flags replaced.
    pub fn with_flags(&self, flags: DetectorFlags) -> Self {
        Self::new(self.camera_id, self.threshold, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = CameraSettings::defaults(CameraId(3));
        assert_eq!(settings.threshold, 1000);
        assert_eq!(settings.flags(), DetectorFlags::NONE);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: CameraSettings =
            serde_json::from_str(r#"{"camera_id": 2, "enable_person_detection": true}"#).unwrap();
        assert_eq!(settings.camera_id, CameraId(2));
        assert_eq!(settings.threshold, DEFAULT_MOTION_THRESHOLD);
        assert!(settings.enable_person_detection);
        assert!(!settings.enable_face_detection);
    }

    #[test]
    fn serializes_with_settings_field_names() {
        let value = serde_json::to_value(CameraSettings::defaults(CameraId(0))).unwrap();
        for key in [
            "camera_id",
            "threshold",
            "enable_face_detection",
            "enable_person_detection",
            "enable_vehicle_detection",
            "enable_animal_detection",
            "enable_explosion_detection",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
