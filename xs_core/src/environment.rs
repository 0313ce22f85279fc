//! One-shot download of the static occupancy map.

use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use truth_proto::{
    decode_environment_header, decode_pixel_samples, EnvironmentHeader, PixelSample, WireError,
    ENVIRONMENT_HEADER_LEN, PIXEL_SAMPLE_LEN,
};

use crate::transport::{read_full, Connection, TransportError};
use crate::view::Viewport;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("environment transfer failed: {0}")]
    Transport(#[from] TransportError),
    #[error("environment header is malformed: {0}")]
    Header(String),
    #[error("environment claims {count} occupied cells: {reason}")]
    Count { count: i64, reason: String },
    #[error("environment sample {index} at ({x}, {y}) lies outside the map")]
    Sample { index: usize, x: i16, y: i16 },
    #[error("environment payload could not be decoded: {0}")]
    Wire(#[from] WireError),
}

/// Samples decoded per read while downloading the pixel block.
const SAMPLE_CHUNK: usize = 4096;

/// Occupied cell in the display frame (y grows downward from the top row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub width: i32,
    pub height: i32,
    pub ppm: f64,
    cells: Vec<Cell>,
    scaled: Vec<Cell>,
}

impl Environment {
    /// Build from a header and raw samples in the server frame. The vertical
    /// axis is inverted here, exactly once.
    pub fn from_samples(header: &EnvironmentHeader, samples: &[PixelSample]) -> Self {
        let cells: Vec<Cell> = samples
            .iter()
            .map(|sample| Cell {
                x: i32::from(sample.x),
                y: header.height.saturating_sub(i32::from(sample.y)),
            })
            .collect();
        let scaled = cells.clone();
        Self {
            width: header.width,
            height: header.height,
            ppm: header.ppm,
            cells,
            scaled,
        }
    }

    pub fn header(&self) -> EnvironmentHeader {
        EnvironmentHeader {
            width: self.width,
            height: self.height,
            ppm: self.ppm,
            num_pixels: self.cells.len() as i32,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn scaled_cells(&self) -> &[Cell] {
        &self.scaled
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Recompute the scaled, panned copy for the current view.
    pub fn rescale(&mut self, viewport: &Viewport) {
        let ratio = viewport.cell_ratio();
        self.scaled = self
            .cells
            .iter()
            .map(|cell| Cell {
                x: ((f64::from(cell.x) * ratio) as i32).saturating_sub(viewport.pan_x),
                y: ((f64::from(cell.y) * ratio) as i32).saturating_sub(viewport.pan_y),
            })
            .collect();
    }

    /// Extent of the world in meters, `(width, height)`.
    pub fn world_bounds(&self) -> (f64, f64) {
        (
            f64::from(self.width) / self.ppm,
            f64::from(self.height) / self.ppm,
        )
    }

    /// Clamp a world position into the environment.
    pub fn clamp_position(&self, x: f64, y: f64) -> (f64, f64) {
        let (max_x, max_y) = self.world_bounds();
        (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
    }
}

fn validate_header(header: &EnvironmentHeader) -> Result<usize, EnvironmentError> {
    if header.width < 0 || header.height < 0 {
        return Err(EnvironmentError::Header(format!(
            "negative dimensions {}x{}",
            header.width, header.height
        )));
    }
    if !header.ppm.is_finite() || header.ppm <= 0.0 {
        return Err(EnvironmentError::Header(format!(
            "invalid pixels-per-meter {}",
            header.ppm
        )));
    }
    let count = i64::from(header.num_pixels);
    if count < 0 {
        return Err(EnvironmentError::Count {
            count,
            reason: "negative count".to_string(),
        });
    }
    let cells = i64::from(header.width) * i64::from(header.height);
    if count > cells {
        return Err(EnvironmentError::Count {
            count,
            reason: format!("exceeds the {} cells of the map", cells),
        });
    }
    Ok(count as usize)
}

fn check_sample(
    header: &EnvironmentHeader,
    index: usize,
    sample: &PixelSample,
) -> Result<(), EnvironmentError> {
    let (x, y) = (i32::from(sample.x), i32::from(sample.y));
    if (0..=header.width).contains(&x) && (0..=header.height).contains(&y) {
        Ok(())
    } else {
        Err(EnvironmentError::Sample {
            index,
            x: sample.x,
            y: sample.y,
        })
    }
}

/// Read `count` samples in fixed-size chunks, so a header that overstates
/// its count fails on the short stream before anything large is allocated.
fn read_samples<R: Read + ?Sized>(
    reader: &mut R,
    header: &EnvironmentHeader,
    count: usize,
) -> Result<Vec<PixelSample>, EnvironmentError> {
    let expected = count * PIXEL_SAMPLE_LEN;
    let mut samples = Vec::with_capacity(count.min(SAMPLE_CHUNK));
    let mut chunk = vec![0u8; count.min(SAMPLE_CHUNK) * PIXEL_SAMPLE_LEN];
    while samples.len() < count {
        let take = (count - samples.len()).min(SAMPLE_CHUNK) * PIXEL_SAMPLE_LEN;
        let done = samples.len() * PIXEL_SAMPLE_LEN;
        read_full(reader, &mut chunk[..take]).map_err(|err| match err {
            TransportError::Closed { received, .. } => EnvironmentError::Count {
                count: count as i64,
                reason: format!(
                    "stream ended after {} of {} pixel bytes",
                    done + received,
                    expected
                ),
            },
            other => EnvironmentError::Transport(other),
        })?;
        for sample in decode_pixel_samples(&chunk[..take])? {
            check_sample(header, samples.len(), &sample)?;
            samples.push(sample);
        }
    }
    Ok(samples)
}

/// Read a header and its pixel block from `reader`.
pub fn read_environment<R: Read + ?Sized>(reader: &mut R) -> Result<Environment, EnvironmentError> {
    let mut header_bytes = [0u8; ENVIRONMENT_HEADER_LEN];
    read_full(reader, &mut header_bytes)?;
    let header = decode_environment_header(&header_bytes)?;
    let count = validate_header(&header)?;
    debug!(
        target: "xs::env",
        width = header.width,
        height = header.height,
        ppm = header.ppm,
        num_pixels = count,
        "environment.header"
    );

    let samples = read_samples(reader, &header, count)?;

    Ok(Environment::from_samples(&header, &samples))
}

/// Connect to the environment endpoint, download the map and close.
pub fn download_environment(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<Environment, EnvironmentError> {
    let mut connection = Connection::connect(host, port, timeout)?;
    let peer = connection.peer();
    let result = read_environment(&mut connection);
    connection.shutdown();
    let environment = result?;
    info!(
        target: "xs::env",
        %peer,
        width = environment.width,
        height = environment.height,
        cells = environment.len(),
        "environment.downloaded"
    );
    Ok(environment)
}
