use serde::Deserialize;

use truth_proto::EnvironmentHeader;

/// Initial view parameters, read from the client config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub window_width: i32,
    pub window_height: i32,
    pub zoom: f64,
    pub pan_percent_x: i32,
    pub pan_percent_y: i32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            window_width: 400,
            window_height: 400,
            zoom: 1.0,
            pan_percent_x: 0,
            pan_percent_y: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Mapping between the simulation frame (meters, y up) and a display window
/// (pixels, y down) showing a zoomed, panned image of the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub window_width: i32,
    pub window_height: i32,
    pub image_width: i32,
    pub image_height: i32,
    pub pan_x: i32,
    pub pan_y: i32,
    pub ppm: f64,
    env_width: i32,
    env_height: i32,
    env_ppm: f64,
}

impl Viewport {
    pub fn new(header: &EnvironmentHeader, config: &ViewConfig) -> Self {
        let mut viewport = Self {
            window_width: config.window_width.max(1),
            window_height: config.window_height.max(1),
            image_width: (config.zoom * f64::from(header.width)) as i32,
            image_height: (config.zoom * f64::from(header.height)) as i32,
            pan_x: 0,
            pan_y: 0,
            ppm: header.ppm,
            env_width: header.width.max(1),
            env_height: header.height.max(1),
            env_ppm: header.ppm,
        };
        viewport.calc_ppm();
        viewport.pan_x = pan_offset(
            viewport.image_width,
            viewport.window_width,
            config.pan_percent_x,
        );
        viewport.pan_y = pan_offset(
            viewport.image_height,
            viewport.window_height,
            config.pan_percent_y,
        );
        viewport.bounds_check();
        viewport
    }

    /// Display pixels per meter: the larger of the two axis scales.
    fn calc_ppm(&mut self) {
        let ppm_w = (f64::from(self.image_width) / f64::from(self.env_width)) * self.env_ppm;
        let ppm_h = (f64::from(self.image_height) / f64::from(self.env_height)) * self.env_ppm;
        self.ppm = ppm_w.max(ppm_h);
    }

    /// Keep the window inside the image.
    pub fn bounds_check(&mut self) {
        self.pan_x = clamp_pan(i64::from(self.pan_x), self.image_width, self.window_width);
        self.pan_y = clamp_pan(i64::from(self.pan_y), self.image_height, self.window_height);
    }

    pub fn zoom(&mut self, ratio: f64) {
        self.image_width = (f64::from(self.image_width) * ratio) as i32;
        self.image_height = (f64::from(self.image_height) * ratio) as i32;
        self.calc_ppm();
        self.bounds_check();
    }

    /// Step the pan by a fifth of the window. Returns whether it moved.
    pub fn pan(&mut self, direction: PanDirection) -> bool {
        let before = (self.pan_x, self.pan_y);
        match direction {
            PanDirection::Left => self.pan_x -= self.window_width / 5,
            PanDirection::Right => self.pan_x += self.window_width / 5,
            PanDirection::Up => self.pan_y -= self.window_height / 5,
            PanDirection::Down => self.pan_y += self.window_height / 5,
        }
        self.bounds_check();
        before != (self.pan_x, self.pan_y)
    }

    pub fn resize(&mut self, window_width: i32, window_height: i32) {
        self.window_width = window_width.max(1);
        self.window_height = window_height.max(1);
        self.calc_ppm();
        self.bounds_check();
    }

    /// Ratio between display pixels and environment cells.
    pub fn cell_ratio(&self) -> f64 {
        self.ppm / self.env_ppm
    }

    pub fn screen_to_world(&self, sx: i32, sy: i32) -> (f64, f64) {
        let x = f64::from(sx + self.pan_x) / self.ppm;
        let y = f64::from((self.image_height - self.pan_y) - sy) / self.ppm;
        (x, y)
    }

    pub fn world_to_screen(&self, x: f64, y: f64) -> (i32, i32) {
        let sx = (x * self.ppm) as i32 - self.pan_x;
        let sy = (self.image_height - self.pan_y) - (y * self.ppm) as i32;
        (sx, sy)
    }
}

/// Offset `percent` of the way across the slack between image and window.
fn pan_offset(image: i32, window: i32, percent: i32) -> i32 {
    let slack = i64::from(image) - i64::from(window);
    clamp_pan(slack * i64::from(percent) / 100, image, window)
}

/// Limit a pan to `0..=image - window`, or 0 when the window is larger.
fn clamp_pan(pan: i64, image: i32, window: i32) -> i32 {
    let max = (i64::from(image) - i64::from(window)).max(0);
    pan.clamp(0, max) as i32
}
