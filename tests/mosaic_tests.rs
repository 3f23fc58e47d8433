mod common;

use std::time::Duration;

use camgrid_lib::capture::{CameraChannel, CaptureError, ChannelSettings, MosaicCompositor, PacingMode};
use camgrid_lib::config::CameraConfig;
use camgrid_lib::video::{Frame, GridRect};
use common::*;

const UNIT: u32 = 8;
const TIMEOUT: Duration = Duration::from_secs(5);

fn live(slot: usize, bgr: [u8; 3], pacing: PacingMode) -> CameraChannel {
    let mut settings = ChannelSettings::new(slot, UNIT, GridRect::for_slot(slot).unwrap());
    settings.pacing = pacing;
    settings.loop_interval = Duration::from_micros(50);
    let source = ScriptedSource::new(vec![], Then::Repeat(Frame::filled(3, 3, bgr)));
    CameraChannel::spawn(settings, Box::new(source), &transforms()).unwrap()
}

fn disabled(slot: usize) -> CameraChannel {
    let settings = ChannelSettings::new(slot, UNIT, GridRect::for_slot(slot).unwrap());
    CameraChannel::disabled(&settings, &transforms())
}

/// Centre pixel of a grid cell
fn cell(canvas: &Frame, col: u32, row: u32) -> [u8; 3] {
    canvas.pixel(col * UNIT + UNIT / 2, row * UNIT + UNIT / 2)
}

#[test]
fn canvas_has_fixed_size_and_placeholders() {
    let mut mosaic = MosaicCompositor::new(
        UNIT,
        vec![disabled(1), disabled(2), disabled(3), disabled(4)],
    )
    .unwrap();

    let canvas = mosaic.get_frame();
    assert_eq!((canvas.width(), canvas.height()), (2 * UNIT, 2 * UNIT));
    for (col, row) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        assert_eq!(cell(canvas, col, row), PLACEHOLDER_BGR);
    }
}

#[test]
fn live_channels_fill_their_cells() {
    let red = [0, 0, 255];
    let green = [0, 255, 0];
    let mut mosaic = MosaicCompositor::new(
        UNIT,
        vec![
            live(1, red, PacingMode::FreeRun),
            disabled(2),
            live(3, green, PacingMode::FreeRun),
        ],
    )
    .unwrap();

    assert!(wait_until(TIMEOUT, || mosaic
        .channels()
        .iter()
        .filter(|c| c.is_enabled())
        .all(|c| c.stats().frames_captured() > 0)));

    let canvas = mosaic.get_frame();
    // Slot 1 top-right, slot 2 top-left, slot 3 bottom-left
    assert_eq!(cell(canvas, 1, 0), red);
    assert_eq!(cell(canvas, 0, 0), PLACEHOLDER_BGR);
    assert_eq!(cell(canvas, 0, 1), green);
    // Unassigned cell stays black
    assert_eq!(cell(canvas, 1, 1), [0, 0, 0]);

    mosaic.shutdown();
}

#[test]
fn pulls_release_synchronized_channels() {
    let mut mosaic =
        MosaicCompositor::new(UNIT, vec![live(4, [9, 9, 9], PacingMode::Synchronized)]).unwrap();
    let captured = |m: &MosaicCompositor| m.channels()[0].stats().frames_captured();

    assert!(wait_until(TIMEOUT, || captured(&mosaic) == 1));
    for pull in 1..=3u64 {
        mosaic.get_frame();
        assert!(wait_until(TIMEOUT, || captured(&mosaic) == pull + 1));
    }
    assert_eq!(cell(mosaic.get_frame(), 1, 1), [9, 9, 9]);
}

#[test]
fn rejects_overlapping_or_too_many_channels() {
    let result = MosaicCompositor::new(UNIT, vec![disabled(1), disabled(1)]);
    assert!(matches!(result, Err(CaptureError::Placement(_))));

    let five = vec![disabled(1), disabled(2), disabled(3), disabled(4), disabled(4)];
    assert!(matches!(
        MosaicCompositor::new(UNIT, five),
        Err(CaptureError::Placement(_))
    ));

    let settings = ChannelSettings::new(1, UNIT, GridRect::new(0, 2, 0, 1));
    let wide = CameraChannel::disabled(&settings, &transforms());
    assert!(MosaicCompositor::new(UNIT, vec![wide]).is_err());
}

#[test]
fn config_without_sources_disables_every_slot() {
    let config = CameraConfig {
        unit_size: UNIT,
        ..CameraConfig::default()
    };
    let mut mosaic = MosaicCompositor::from_config(&config, transforms()).unwrap();

    assert_eq!(mosaic.channels().len(), 4);
    assert!(mosaic.channels().iter().all(|c| !c.is_enabled()));
    assert_eq!(cell(mosaic.get_frame(), 1, 1), PLACEHOLDER_BGR);
}

