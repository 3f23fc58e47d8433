// Raw BGR frames and mosaic placement rectangles

use std::fmt;

use super::{Result, VideoError};

/// Bytes per pixel (B, G, R)
pub const CHANNELS: usize = 3;

/// A fixed-size 8-bit BGR pixel buffer (height × width × 3).
///
/// Frames carry no timestamp or identity; ordering is implied by the
/// sequence they arrive in.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing pixel buffer. The buffer must be tightly packed.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(VideoError::InvalidFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// A frame where every pixel has the same BGR value
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&bgr);
        }
        Self { width, height, data }
    }

    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * CHANNELS],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// BGR value at (x, y). Panics when out of bounds, like slice indexing.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, bgr: [u8; 3]) {
        if x < self.width && y < self.height {
            let i = self.offset(x, y);
            self.data[i..i + CHANNELS].copy_from_slice(&bgr);
        }
    }

    /// Nearest-neighbour resize. Returns a plain copy when the size already matches.
    pub fn resize(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.width == 0 || self.height == 0 {
            return Frame::black(width, height);
        }

        let mut out = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        // Map each destination column once; rows reuse it.
        let columns: Vec<usize> = (0..width)
            .map(|x| ((x as u64 * self.width as u64) / width as u64) as usize * CHANNELS)
            .collect();

        for y in 0..height {
            let src_y = ((y as u64 * self.height as u64) / height as u64) as usize;
            let row = &self.data[src_y * self.width as usize * CHANNELS..][..self.width as usize * CHANNELS];
            for &col in &columns {
                out.extend_from_slice(&row[col..col + CHANNELS]);
            }
        }

        Frame {
            width,
            height,
            data: out,
        }
    }

    /// Copy `src` into this frame with its top-left corner at (x, y).
    pub fn blit(&mut self, src: &Frame, x: u32, y: u32) -> Result<()> {
        if x as u64 + src.width as u64 > self.width as u64
            || y as u64 + src.height as u64 > self.height as u64
        {
            return Err(VideoError::InvalidFrame(format!(
                "{}x{} frame at ({}, {}) does not fit in {}x{}",
                src.width, src.height, x, y, self.width, self.height
            )));
        }

        let row_bytes = src.width as usize * CHANNELS;
        for row in 0..src.height {
            let dst = self.offset(x, y + row);
            let from = row as usize * row_bytes;
            self.data[dst..dst + row_bytes].copy_from_slice(&src.data[from..from + row_bytes]);
        }
        Ok(())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Placement of a channel on the mosaic, in grid units: columns `x1..x2`, rows `y1..y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GridRect {
    pub x1: u32,
    pub x2: u32,
    pub y1: u32,
    pub y2: u32,
}

impl GridRect {
    pub const fn new(x1: u32, x2: u32, y1: u32, y2: u32) -> Self {
        Self { x1, x2, y1, y2 }
    }

    /// Default placement for camera slots 1-4 (1-based)
    pub fn for_slot(slot: usize) -> Option<GridRect> {
        match slot {
            1 => Some(GridRect::new(1, 2, 0, 1)), // top-right
            2 => Some(GridRect::new(0, 1, 0, 1)), // top-left
            3 => Some(GridRect::new(0, 1, 1, 2)), // bottom-left
            4 => Some(GridRect::new(1, 2, 1, 2)), // bottom-right
            _ => None,
        }
    }

    /// Pixel origin of the rectangle for a given unit size
    pub fn origin(&self, unit: u32) -> (u32, u32) {
        (self.x1 * unit, self.y1 * unit)
    }

    /// Whether the rectangle covers exactly one cell of a 2×2 grid
    pub fn is_unit_cell(&self) -> bool {
        self.x2 == self.x1 + 1 && self.y2 == self.y1 + 1 && self.x2 <= 2 && self.y2 <= 2
    }
}
