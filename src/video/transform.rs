// Image transform seams: lens rectification and the "disconnected" placeholder.
//
// Real fisheye correction lives outside this crate; channels only see the
// `Rectifier` trait. The defaults here keep frames untouched and draw a
// simple crossed-out tile for channels without live video.

use std::sync::Arc;

use super::Frame;

/// Lens correction applied to every captured frame before resizing
pub trait Rectifier: Send + Sync {
    fn rectify(&self, frame: Frame) -> Frame;
}

/// Leaves frames unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Rectifier for Passthrough {
    fn rectify(&self, frame: Frame) -> Frame {
        frame
    }
}

/// Renders the tile shown for a channel that cannot produce video
pub trait PlaceholderRenderer: Send + Sync {
    fn render_disconnected(&self, size: u32) -> Frame;
}

/// Dark tile with a border and a red diagonal cross
#[derive(Debug, Clone, Copy)]
pub struct CrossPlaceholder {
    pub background: [u8; 3],
    pub stroke: [u8; 3],
    /// Stroke thickness as a fraction of the tile size
    pub thickness: f32,
}

impl Default for CrossPlaceholder {
    fn default() -> Self {
        Self {
            background: [40, 40, 40],
            stroke: [0, 0, 200],
            thickness: 0.02,
        }
    }
}

impl PlaceholderRenderer for CrossPlaceholder {
    fn render_disconnected(&self, size: u32) -> Frame {
        let mut frame = Frame::filled(size, size, self.background);
        if size == 0 {
            return frame;
        }

        let half = ((size as f32 * self.thickness) / 2.0).max(1.0) as i64;
        let last = size as i64 - 1;
        for y in 0..size as i64 {
            for x in 0..size as i64 {
                let on_diagonal = (x - y).abs() <= half || (x + y - last).abs() <= half;
                let on_border = x < half || y < half || last - x < half || last - y < half;
                if on_diagonal || on_border {
                    frame.put_pixel(x as u32, y as u32, self.stroke);
                }
            }
        }
        frame
    }
}

/// The pair of external transforms every channel needs
#[derive(Clone)]
pub struct Transforms {
    pub rectifier: Arc<dyn Rectifier>,
    pub placeholder: Arc<dyn PlaceholderRenderer>,
}

impl Transforms {
    pub fn new(rectifier: Arc<dyn Rectifier>, placeholder: Arc<dyn PlaceholderRenderer>) -> Self {
        Self {
            rectifier,
            placeholder,
        }
    }
}

impl Default for Transforms {
    fn default() -> Self {
        Self {
            rectifier: Arc::new(Passthrough),
            placeholder: Arc::new(CrossPlaceholder::default()),
        }
    }
}
