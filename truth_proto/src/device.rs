use std::fmt;

use serde::{Deserialize, Serialize};

/// Device triple naming an entity (or its container) on the server.
///
/// A triple whose `kind` is zero means "no device"; used as a parent it marks
/// a top-level entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId {
    pub port: u16,
    pub kind: u16,
    pub index: u16,
}

impl DeviceId {
    pub const NONE: DeviceId = DeviceId {
        port: 0,
        kind: 0,
        index: 0,
    };

    pub fn new(port: u16, kind: u16, index: u16) -> Self {
        Self { port, kind, index }
    }

    pub fn is_none(&self) -> bool {
        self.kind == 0
    }

    pub fn device_kind(&self) -> DeviceKind {
        DeviceKind::from_code(self.kind)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.port, self.device_kind(), self.index)
    }
}

/// Device type codes understood by the diagnostics output. Unknown codes are
/// carried through unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    None,
    Player,
    Misc,
    Gripper,
    Position,
    Sonar,
    Laser,
    Vision,
    Ptz,
    Audio,
    LaserBeacon,
    Broadcast,
    Speech,
    Gps,
    Truth,
    Unknown(u16),
}

impl DeviceKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => DeviceKind::None,
            1 => DeviceKind::Player,
            2 => DeviceKind::Misc,
            3 => DeviceKind::Gripper,
            4 => DeviceKind::Position,
            5 => DeviceKind::Sonar,
            6 => DeviceKind::Laser,
            7 => DeviceKind::Vision,
            8 => DeviceKind::Ptz,
            9 => DeviceKind::Audio,
            10 => DeviceKind::LaserBeacon,
            11 => DeviceKind::Broadcast,
            12 => DeviceKind::Speech,
            13 => DeviceKind::Gps,
            15 => DeviceKind::Truth,
            other => DeviceKind::Unknown(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            DeviceKind::None => 0,
            DeviceKind::Player => 1,
            DeviceKind::Misc => 2,
            DeviceKind::Gripper => 3,
            DeviceKind::Position => 4,
            DeviceKind::Sonar => 5,
            DeviceKind::Laser => 6,
            DeviceKind::Vision => 7,
            DeviceKind::Ptz => 8,
            DeviceKind::Audio => 9,
            DeviceKind::LaserBeacon => 10,
            DeviceKind::Broadcast => 11,
            DeviceKind::Speech => 12,
            DeviceKind::Gps => 13,
            DeviceKind::Truth => 15,
            DeviceKind::Unknown(code) => *code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::None => "None",
            DeviceKind::Player => "Player",
            DeviceKind::Misc => "Misc",
            DeviceKind::Gripper => "Gripper",
            DeviceKind::Position => "Position",
            DeviceKind::Sonar => "Sonar",
            DeviceKind::Laser => "Laser",
            DeviceKind::Vision => "Vision",
            DeviceKind::Ptz => "PTZ",
            DeviceKind::Audio => "Audio",
            DeviceKind::LaserBeacon => "LaserBcn",
            DeviceKind::Broadcast => "Broadcast",
            DeviceKind::Speech => "Speech",
            DeviceKind::Gps => "GPS",
            DeviceKind::Truth => "Truth",
            DeviceKind::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Unknown(code) => write!(f, "Unknown({})", code),
            known => f.write_str(known.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_kind_means_no_parent() {
        assert!(DeviceId::NONE.is_none());
        assert!(DeviceId::new(6665, 0, 3).is_none());
        assert!(!DeviceId::new(6665, 4, 0).is_none());
    }

    #[test]
    fn unknown_codes_pass_through() {
        let kind = DeviceKind::from_code(4242);
        assert_eq!(kind, DeviceKind::Unknown(4242));
        assert_eq!(kind.code(), 4242);
        assert_eq!(kind.to_string(), "Unknown(4242)");
    }

    #[test]
    fn display_uses_device_names() {
        let id = DeviceId::new(6665, 6, 1);
        assert_eq!(id.to_string(), "6665:Laser:1");
    }
}
