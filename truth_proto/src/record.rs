use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceId;

/// Size of the NUL-padded hostname buffer carried by every truth record.
pub const HOSTNAME_LEN: usize = 32;
/// Encoded size of a [`TruthRecord`].
pub const TRUTH_RECORD_LEN: usize = 78;
/// Encoded size of an [`EnvironmentHeader`].
pub const ENVIRONMENT_HEADER_LEN: usize = 20;
/// Encoded size of a [`PixelSample`].
pub const PIXEL_SAMPLE_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("failed to decode record: {0}")]
    Decode(#[from] bincode::Error),
}

/// One entity update as it travels on the truth stream.
///
/// Positions and sizes are millimeters, heading is whole degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthRecord {
    pub stage_id: i32,
    pub hostname: [u8; HOSTNAME_LEN],
    pub stage_type: i32,
    pub id: DeviceId,
    pub parent: DeviceId,
    pub x: i32,
    pub y: i32,
    pub th: u16,
    pub w: i32,
    pub h: i32,
    pub rotdx: i16,
    pub rotdy: i16,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    #[serde(with = "wire_flag")]
    pub echo_request: bool,
}

/// Fixed header preceding the occupied-cell list of the environment stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentHeader {
    pub width: i32,
    pub height: i32,
    pub ppm: f64,
    pub num_pixels: i32,
}

/// One occupied cell of the environment image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSample {
    pub x: i16,
    pub y: i16,
}

mod wire_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .reject_trailing_bytes()
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), WireError> {
    if bytes.len() != expected {
        return Err(WireError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

pub fn encode_truth_record(record: &TruthRecord) -> Vec<u8> {
    wire_options()
        .serialize(record)
        .expect("fixed-layout truth record serialization")
}

pub fn decode_truth_record(bytes: &[u8]) -> Result<TruthRecord, WireError> {
    check_len(bytes, TRUTH_RECORD_LEN)?;
    Ok(wire_options().deserialize(bytes)?)
}

pub fn encode_environment_header(header: &EnvironmentHeader) -> Vec<u8> {
    wire_options()
        .serialize(header)
        .expect("fixed-layout environment header serialization")
}

pub fn decode_environment_header(bytes: &[u8]) -> Result<EnvironmentHeader, WireError> {
    check_len(bytes, ENVIRONMENT_HEADER_LEN)?;
    Ok(wire_options().deserialize(bytes)?)
}

pub fn encode_pixel_sample(sample: &PixelSample) -> Vec<u8> {
    wire_options()
        .serialize(sample)
        .expect("fixed-layout pixel sample serialization")
}

pub fn decode_pixel_sample(bytes: &[u8]) -> Result<PixelSample, WireError> {
    check_len(bytes, PIXEL_SAMPLE_LEN)?;
    Ok(wire_options().deserialize(bytes)?)
}

/// Decode a contiguous block of pixel samples. The block length must be an
/// exact multiple of [`PIXEL_SAMPLE_LEN`].
pub fn decode_pixel_samples(bytes: &[u8]) -> Result<Vec<PixelSample>, WireError> {
    if bytes.len() % PIXEL_SAMPLE_LEN != 0 {
        return Err(WireError::Length {
            expected: (bytes.len() / PIXEL_SAMPLE_LEN + 1) * PIXEL_SAMPLE_LEN,
            actual: bytes.len(),
        });
    }
    bytes
        .chunks_exact(PIXEL_SAMPLE_LEN)
        .map(decode_pixel_sample)
        .collect()
}

/// Read the text up to the first NUL of a hostname buffer.
pub fn hostname_from_wire(buffer: &[u8; HOSTNAME_LEN]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(HOSTNAME_LEN);
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

/// Pack a hostname into a NUL-padded buffer, keeping at least one trailing
/// NUL and never splitting a UTF-8 sequence.
pub fn hostname_to_wire(hostname: &str) -> [u8; HOSTNAME_LEN] {
    let mut buffer = [0u8; HOSTNAME_LEN];
    let mut end = hostname.len().min(HOSTNAME_LEN - 1);
    while !hostname.is_char_boundary(end) {
        end -= 1;
    }
    buffer[..end].copy_from_slice(&hostname.as_bytes()[..end]);
    buffer
}
