use std::f64::consts::PI;
use std::fmt;

use crate::device::DeviceId;
use crate::record::{hostname_from_wire, hostname_to_wire, TruthRecord};

const METERS_PER_MILLIMETER: f64 = 0.001;
const MILLIMETERS_PER_METER: f64 = 1000.0;
const SNAP_EPSILON: f64 = 1e-6;

/// Stable key the server assigns to every simulated entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position in meters and heading in radians, simulation frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub th: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, th: f64) -> Self {
        Self { x, y, th }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Packed `0xRRGGBB` value, the form most drawing backends accept.
    pub fn to_rgb(&self) -> u32 {
        (u32::from(self.red) << 16) | (u32::from(self.green) << 8) | u32::from(self.blue)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.to_rgb())
    }
}

/// Decoded snapshot of one entity. Values are replaced wholesale; use
/// [`Truth::with_pose`] to derive a moved copy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Truth {
    pub stage_id: EntityId,
    pub hostname: String,
    pub stage_type: i32,
    pub id: DeviceId,
    pub parent: DeviceId,
    pub pose: Pose,
    pub width: f64,
    pub height: f64,
    pub rotdx: f64,
    pub rotdy: f64,
    pub color: Color,
}

impl Truth {
    /// All-zero value standing in for an entity that has not been seen yet.
    pub fn placeholder(stage_id: EntityId) -> Self {
        Self {
            stage_id,
            ..Self::default()
        }
    }

    pub fn with_pose(&self, pose: Pose) -> Self {
        Self {
            pose,
            ..self.clone()
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} type {} host {} id {} parent {} pose [{:.2},{:.2},{:.2}] size [{:.2},{:.2}] color {}",
            self.stage_id,
            self.stage_type,
            self.hostname,
            self.id,
            self.parent,
            self.pose.x,
            self.pose.y,
            self.pose.th,
            self.width,
            self.height,
            self.color,
        )
    }
}

/// Wrap an angle into `(-PI, PI]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Truncate toward zero, snapping values that sit within float noise of an
/// integer onto it first.
fn truncate_scaled(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        value.trunc()
    }
}

pub fn meters_from_wire(millimeters: i32) -> f64 {
    f64::from(millimeters) * METERS_PER_MILLIMETER
}

pub fn meters_to_wire(meters: f64) -> i32 {
    truncate_scaled(meters * MILLIMETERS_PER_METER) as i32
}

fn short_meters_from_wire(millimeters: i16) -> f64 {
    f64::from(millimeters) * METERS_PER_MILLIMETER
}

fn short_meters_to_wire(meters: f64) -> i16 {
    truncate_scaled(meters * MILLIMETERS_PER_METER) as i16
}

pub fn heading_from_wire(degrees: u16) -> f64 {
    normalize_angle(f64::from(degrees).to_radians())
}

pub fn heading_to_wire(radians: f64) -> u16 {
    let degrees = truncate_scaled(radians.to_degrees().rem_euclid(360.0));
    (degrees as u16) % 360
}

pub fn decode_truth(record: &TruthRecord) -> Truth {
    Truth {
        stage_id: EntityId(record.stage_id),
        hostname: hostname_from_wire(&record.hostname),
        stage_type: record.stage_type,
        id: record.id,
        parent: record.parent,
        pose: Pose {
            x: meters_from_wire(record.x),
            y: meters_from_wire(record.y),
            th: heading_from_wire(record.th),
        },
        width: meters_from_wire(record.w),
        height: meters_from_wire(record.h),
        rotdx: short_meters_from_wire(record.rotdx),
        rotdy: short_meters_from_wire(record.rotdy),
        color: Color::new(record.red, record.green, record.blue),
    }
}

/// Encode a truth for the wire. The echo flag is left clear; the writer task
/// sets it on the way out.
pub fn encode_truth(truth: &Truth) -> TruthRecord {
    TruthRecord {
        stage_id: truth.stage_id.0,
        hostname: hostname_to_wire(&truth.hostname),
        stage_type: truth.stage_type,
        id: truth.id,
        parent: truth.parent,
        x: meters_to_wire(truth.pose.x),
        y: meters_to_wire(truth.pose.y),
        th: heading_to_wire(truth.pose.th),
        w: meters_to_wire(truth.width),
        h: meters_to_wire(truth.height),
        rotdx: short_meters_to_wire(truth.rotdx),
        rotdy: short_meters_to_wire(truth.rotdy),
        red: truth.color.red,
        green: truth.color.green,
        blue: truth.color.blue,
        echo_request: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MM: f64 = 1e-3;

    fn truth_at(x: f64, y: f64, th: f64) -> Truth {
        Truth {
            stage_id: EntityId(12),
            hostname: "bigbox".to_string(),
            stage_type: 4,
            id: DeviceId::new(6665, 4, 0),
            parent: DeviceId::NONE,
            pose: Pose::new(x, y, th),
            width: 0.44,
            height: 0.38,
            rotdx: 0.0,
            rotdy: 0.0,
            color: Color::new(255, 0, 0),
        }
    }

    #[test]
    fn position_encodes_to_millimeters() {
        let record = encode_truth(&truth_at(1.234, -5.678, 0.0));
        assert_eq!(record.x, 1234);
        assert_eq!(record.y, -5678);

        let decoded = decode_truth(&record);
        assert!((decoded.pose.x - 1.234).abs() < 1e-9);
        assert!((decoded.pose.y + 5.678).abs() < 1e-9);
    }

    #[test]
    fn encoding_truncates_toward_zero() {
        assert_eq!(meters_to_wire(1.2349), 1234);
        assert_eq!(meters_to_wire(-1.2349), -1234);
        assert_eq!(meters_to_wire(0.0004), 0);
    }

    #[test]
    fn decode_of_encode_is_identity_within_precision() {
        let original = truth_at(3.1416, 2.7182, 1.0);
        let round = decode_truth(&encode_truth(&original));
        assert!((round.pose.x - original.pose.x).abs() < MM);
        assert!((round.pose.y - original.pose.y).abs() < MM);
        assert!((round.width - original.width).abs() < MM);
        assert!((round.height - original.height).abs() < MM);
        assert!((round.pose.th - original.pose.th).abs() < 1.0f64.to_radians());
        assert_eq!(round.hostname, original.hostname);
        assert_eq!(round.color, original.color);
        assert_eq!(round.stage_id, original.stage_id);
    }

    #[test]
    fn heading_uses_whole_degrees() {
        assert_eq!(heading_to_wire(90f64.to_radians()), 90);
        assert_eq!(heading_to_wire(-90f64.to_radians()), 270);
        assert_eq!(heading_to_wire(2.0 * PI), 0);
        assert!((heading_from_wire(270) + PI / 2.0).abs() < 1e-12);
        assert!((heading_from_wire(180) - PI).abs() < 1e-12);
    }

    #[test]
    fn normalize_wraps_into_half_open_range() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_type_codes_pass_through() {
        let mut record = encode_truth(&truth_at(0.0, 0.0, 0.0));
        record.stage_type = 9_999;
        record.parent = DeviceId::new(1, 777, 2);
        let decoded = decode_truth(&record);
        assert_eq!(decoded.stage_type, 9_999);
        assert_eq!(decoded.parent.kind, 777);
        assert_eq!(encode_truth(&decoded).stage_type, 9_999);
    }

    #[test]
    fn out_of_range_positions_saturate() {
        assert_eq!(meters_to_wire(1e12), i32::MAX);
        assert_eq!(meters_to_wire(-1e12), i32::MIN);
    }

    #[test]
    fn with_pose_replaces_only_the_pose() {
        let original = truth_at(1.0, 1.0, 0.0);
        let moved = original.with_pose(Pose::new(2.0, 2.0, 0.5));
        assert_eq!(moved.pose, Pose::new(2.0, 2.0, 0.5));
        assert_eq!(moved.hostname, original.hostname);
        assert_eq!(original.pose, Pose::new(1.0, 1.0, 0.0));
    }
}
