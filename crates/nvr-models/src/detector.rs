//! Detector kind definitions.
//!
//! Every camera runs the `Motion` detector on each captured frame. The
//! remaining kinds are annotation passes that are switched on per camera:
//!
//! - `Face`: face boxes
//! - `Person`: person boxes
//! - `Vehicle`: car, motorcycle, bus and truck boxes
//! - `Animal`: bird and mammal boxes
//! - `Explosion`: explosion/fire boxes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of detector that can run against a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Motion,
    Face,
    Person,
    Vehicle,
    Animal,
    Explosion,
}

impl DetectorKind {
    /// Annotation detectors in the order they are applied to a frame.
    ///
    /// Each detector consumes the previous detector's output.
    pub const ANNOTATION_ORDER: [DetectorKind; 5] = [
        DetectorKind::Face,
        DetectorKind::Person,
        DetectorKind::Vehicle,
        DetectorKind::Animal,
        DetectorKind::Explosion,
    ];

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Motion => "motion",
            DetectorKind::Face => "face",
            DetectorKind::Person => "person",
            DetectorKind::Vehicle => "vehicle",
            DetectorKind::Animal => "animal",
            DetectorKind::Explosion => "explosion",
        }
    }

    /// Label drawn next to boxes produced by this detector.
    pub fn label(&self) -> &'static str {
        match self {
            DetectorKind::Motion => "Motion",
            DetectorKind::Face => "Face",
            DetectorKind::Person => "Person",
            DetectorKind::Vehicle => "Vehicle",
            DetectorKind::Animal => "Animal",
            DetectorKind::Explosion => "Explosion",
        }
    }

    /// Returns true for the kinds gated by per-camera flags.
    pub fn is_annotation(&self) -> bool {
        !matches!(self, DetectorKind::Motion)
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DetectorKind {
    type Err = DetectorKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "motion" => Ok(DetectorKind::Motion),
            "face" => Ok(DetectorKind::Face),
            "person" => Ok(DetectorKind::Person),
            "vehicle" => Ok(DetectorKind::Vehicle),
            "animal" => Ok(DetectorKind::Animal),
            "explosion" => Ok(DetectorKind::Explosion),
            _ => Err(DetectorKindParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown detector kind: {0}")]
pub struct DetectorKindParseError(String);

/// Per-camera enable flags for the annotation detectors.
///
/// Copied and replaced as a whole so readers never see a mix of two
/// updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectorFlags {
    pub face: bool,
    pub person: bool,
    pub vehicle: bool,
    pub animal: bool,
    pub explosion: bool,
}

impl DetectorFlags {
    /// All annotation detectors disabled.
    pub const NONE: DetectorFlags = DetectorFlags {
        face: false,
        person: false,
        vehicle: false,
        animal: false,
        explosion: false,
    };

    pub fn is_enabled(&self, kind: DetectorKind) -> bool {
        match kind {
            DetectorKind::Motion => true,
            DetectorKind::Face => self.face,
            DetectorKind::Person => self.person,
            DetectorKind::Vehicle => self.vehicle,
            DetectorKind::Animal => self.animal,
            DetectorKind::Explosion => self.explosion,
        }
    }

    /// Set the flag for `kind`. Motion is always on and is ignored.
    pub fn set(&mut self, kind: DetectorKind, enabled: bool) {
        match kind {
            DetectorKind::Motion => {}
            DetectorKind::Face => self.face = enabled,
            DetectorKind::Person => self.person = enabled,
            DetectorKind::Vehicle => self.vehicle = enabled,
            DetectorKind::Animal => self.animal = enabled,
            DetectorKind::Explosion => self.explosion = enabled,
        }
    }

    /// Enabled annotation detectors in application order.
    pub fn enabled_in_order(&self) -> impl Iterator<Item = DetectorKind> + '_ {
        DetectorKind::ANNOTATION_ORDER
            .into_iter()
            .filter(move |kind| self.is_enabled(*kind))
    }

    pub fn any_enabled(&self) -> bool {
        self.enabled_in_order().next().is_some()
    }

    /// Viewer-facing summary: `ON`/`OFF` for face, person, vehicle and
    /// animal joined by `", "`.
    pub fn to_config_string(&self) -> String {
        [self.face, self.person, self.vehicle, self.animal]
            .iter()
            .map(|enabled| if *enabled { "ON" } else { "OFF" })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_order_is_fixed() {
        let flags = DetectorFlags {
            face: true,
            person: false,
            vehicle: true,
            animal: true,
            explosion: true,
        };
        let order: Vec<_> = flags.enabled_in_order().collect();
        assert_eq!(
            order,
            vec![
                DetectorKind::Face,
                DetectorKind::Vehicle,
                DetectorKind::Animal,
                DetectorKind::Explosion
            ]
        );
    }

    #[test]
    fn config_string_omits_explosion() {
        let mut flags = DetectorFlags::NONE;
        flags.set(DetectorKind::Face, true);
        flags.set(DetectorKind::Explosion, true);
        assert_eq!(flags.to_config_string(), "ON, OFF, OFF, OFF");
        assert_eq!(DetectorFlags::NONE.to_config_string(), "OFF, OFF, OFF, OFF");
    }

    #[test]
    fn motion_cannot_be_disabled() {
        let mut flags = DetectorFlags::NONE;
        flags.set(DetectorKind::Motion, false);
        assert!(flags.is_enabled(DetectorKind::Motion));
        assert!(!flags.any_enabled());
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in DetectorKind::ANNOTATION_ORDER {
            assert_eq!(kind.as_str().parse::<DetectorKind>().unwrap(), kind);
        }
        assert!("smoke".parse::<DetectorKind>().is_err());
    }
}
