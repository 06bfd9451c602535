//! Reader for legacy `camera_{id}.py` settings files.
//!
//! These files hold one `key = value` assignment per line. They are parsed
//! as data: `True`/`False` and integers are understood, blank lines and `#`
//! comments are skipped, unknown keys are ignored. Nothing is executed.

use nvr_models::{CameraId, CameraSettings};

use crate::error::{StorageError, StorageResult};

fn parse_bool(key: &str, value: &str) -> StorageResult<bool> {
    match value {
        "True" | "true" | "1" => Ok(true),
        "False" | "false" | "0" => Ok(false),
        other => Err(StorageError::invalid_record(format!(
            "{} must be True or False, got {:?}",
            key, other
        ))),
    }
}

fn parse_u32(key: &str, value: &str) -> StorageResult<u32> {
    value.parse::<u32>().map_err(|_| {
        StorageError::invalid_record(format!("{} must be a non-negative integer, got {:?}", key, value))
    })
}

/// Parse legacy settings, starting from the defaults for `camera_id`.
pub fn parse(camera_id: CameraId, contents: &str) -> StorageResult<CameraSettings> {
    let mut settings = CameraSettings::defaults(camera_id);

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(StorageError::invalid_record(format!(
                "line {}: expected `key = value`",
                index + 1
            )));
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "camera_id" => settings.camera_id = CameraId(parse_u32(key, value)?),
            "threshold" => settings.threshold = parse_u32(key, value)?,
            "enable_face_detection" => settings.enable_face_detection = parse_bool(key, value)?,
            "enable_person_detection" => settings.enable_person_detection = parse_bool(key, value)?,
            "enable_vehicle_detection" => {
                settings.enable_vehicle_detection = parse_bool(key, value)?
            }
            "enable_animal_detection" => settings.enable_animal_detection = parse_bool(key, value)?,
            "enable_explosion_detection" => {
                settings.enable_explosion_detection = parse_bool(key, value)?
            }
            _ => {}
        }
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_written_settings() {
        let contents = "camera_id = 2\n\
                        threshold = 1500\n\
                        enable_face_detection = True\n\
                        enable_person_detection = False\n\
                        enable_vehicle_detection = False\n\
                        enable_animal_detection = True\n\
                        enable_explosion_detection = False\n";
        let settings = parse(CameraId(2), contents).unwrap();
        assert_eq!(settings.camera_id, CameraId(2));
        assert_eq!(settings.threshold, 1500);
        assert!(settings.enable_face_detection);
        assert!(settings.enable_animal_detection);
        assert!(!settings.enable_person_detection);
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let settings = parse(CameraId(1), "# only a comment\n\nthreshold = 700\n").unwrap();
        assert_eq!(settings.camera_id, CameraId(1));
        assert_eq!(settings.threshold, 700);
        assert!(!settings.enable_face_detection);
    }

    #[test]
    fn code_is_not_accepted_as_values() {
        let err = parse(CameraId(0), "enable_face_detection = __import__('os')\n").unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord(_)));
        assert!(parse(CameraId(0), "import os\n").is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let settings = parse(CameraId(0), "resolution = 42\n").unwrap();
        assert_eq!(settings, CameraSettings::defaults(CameraId(0)));
    }
}
