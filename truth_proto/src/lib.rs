//! Wire shapes and codecs for the truth and environment streams.
//!
//! Records are fixed-layout, big-endian and carry no length prefixes. The
//! [`record`] module owns the byte layout; [`truth`] converts records into
//! real-valued domain values and back.

mod device;
mod record;
mod truth;

pub use device::{DeviceId, DeviceKind};
pub use record::{
    decode_environment_header, decode_pixel_sample, decode_pixel_samples, decode_truth_record,
    encode_environment_header, encode_pixel_sample, encode_truth_record, hostname_from_wire,
    hostname_to_wire, EnvironmentHeader, PixelSample, TruthRecord, WireError,
    ENVIRONMENT_HEADER_LEN, HOSTNAME_LEN, PIXEL_SAMPLE_LEN, TRUTH_RECORD_LEN,
};
pub use truth::{
    decode_truth, encode_truth, heading_from_wire, heading_to_wire, meters_from_wire,
    meters_to_wire, normalize_angle, Color, EntityId, Pose, Truth,
};
