// 2×2 mosaic composition
//
// The compositor owns up to four channels and one canvas of
// (2 × unit) × (2 × unit) pixels. Each pull copies every channel's latest
// frame into its cell and then releases synchronized channels so they decode
// their next frame.

use std::collections::HashSet;
use std::time::Duration;

use super::{CameraChannel, CaptureError, ChannelSettings, Result, MAX_CHANNELS};
use crate::config::CameraConfig;
use crate::devices::GstCaptureSource;
use crate::video::{Frame, GridRect, Transforms};

pub struct MosaicCompositor {
    unit: u32,
    canvas: Frame,
    channels: Vec<CameraChannel>,
}

impl MosaicCompositor {
    /// Compose the given channels. Placements must be distinct single cells of the 2×2 grid.
    pub fn new(unit: u32, channels: Vec<CameraChannel>) -> Result<Self> {
        if unit == 0 {
            return Err(CaptureError::Placement("unit size must be positive".into()));
        }
        if channels.len() > MAX_CHANNELS {
            return Err(CaptureError::Placement(format!(
                "{} channels given, at most {} fit the mosaic",
                channels.len(),
                MAX_CHANNELS
            )));
        }

        let mut used = HashSet::new();
        for channel in &channels {
            let rect = channel.placement();
            if !rect.is_unit_cell() {
                return Err(CaptureError::Placement(format!(
                    "cam{} placement {:?} is not a single grid cell",
                    channel.slot(),
                    rect
                )));
            }
            if !used.insert((rect.x1, rect.y1)) {
                return Err(CaptureError::Placement(format!(
                    "cam{} overlaps another channel at {:?}",
                    channel.slot(),
                    rect
                )));
            }
        }

        let mut mosaic = Self {
            unit,
            canvas: Frame::black(unit * 2, unit * 2),
            channels,
        };
        // Paint every cell once so disabled slots show their placeholder
        // even before the first pull.
        mosaic.paint();
        Ok(mosaic)
    }

    /// Build the four slots from configuration, opening a GStreamer source for
    /// each configured address and leaving the rest disabled.
    pub fn from_config(config: &CameraConfig, transforms: Transforms) -> Result<Self> {
        let mut channels = Vec::with_capacity(MAX_CHANNELS);

        for slot in 1..=MAX_CHANNELS {
            let source = config.sources.iter().find(|s| s.slot as usize == slot);
            let placement = source
                .and_then(|s| s.placement)
                .or_else(|| GridRect::for_slot(slot))
                .ok_or_else(|| CaptureError::Placement(format!("no placement for slot {}", slot)))?;

            let mut settings = ChannelSettings::new(slot, config.unit_size, placement);
            settings.pacing = config.pacing;
            settings.reopen_threshold = config.reopen_threshold;
            settings.loop_interval = Duration::from_micros(config.loop_interval_us);
            settings.snapshot_dir = config.snapshot_dir.clone();

            let channel = match source {
                Some(source) => {
                    let capture = GstCaptureSource::new(
                        source.address.clone(),
                        Duration::from_millis(config.read_timeout_ms),
                    );
                    CameraChannel::spawn(settings, Box::new(capture), &transforms)?
                }
                None => {
                    log::info!("cam{}: no source configured, slot disabled", slot);
                    CameraChannel::disabled(&settings, &transforms)
                }
            };
            channels.push(channel);
        }

        Self::new(config.unit_size, channels)
    }

    fn paint(&mut self) {
        let unit = self.unit;
        for channel in &self.channels {
            let frame = channel.current_frame();
            let (x, y) = channel.placement().origin(unit);

            let result = if frame.width() == unit && frame.height() == unit {
                self.canvas.blit(&frame, x, y)
            } else {
                self.canvas.blit(&frame.resize(unit, unit), x, y)
            };
            if let Err(e) = result {
                log::warn!("cam{}: cannot place frame: {}", channel.slot(), e);
            }
        }
    }

    /// Compose the latest frames and release synchronized channels.
    ///
    /// The canvas is reused: the returned reference reflects this pull only
    /// until the next call.
    pub fn get_frame(&mut self) -> &Frame {
        self.paint();
        for channel in self.channels.iter().filter(|c| c.is_enabled()) {
            channel.release();
        }
        &self.canvas
    }

    pub fn unit_size(&self) -> u32 {
        self.unit
    }

    pub fn channels(&self) -> &[CameraChannel] {
        &self.channels
    }

    /// Stop every acquisition thread
    pub fn shutdown(&mut self) {
        for channel in &mut self.channels {
            channel.shutdown();
        }
    }
}
