mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use camgrid_lib::capture::{CameraChannel, ChannelSettings, PacingMode};
use camgrid_lib::video::{Frame, GridRect};
use common::*;

const SIZE: u32 = 4;
const TIMEOUT: Duration = Duration::from_secs(5);
const BLUE: [u8; 3] = [255, 0, 0];

fn settings(pacing: PacingMode, threshold: u32) -> ChannelSettings {
    let mut settings = ChannelSettings::new(1, SIZE, GridRect::for_slot(1).unwrap());
    settings.pacing = pacing;
    settings.reopen_threshold = threshold;
    settings.loop_interval = Duration::from_micros(50);
    settings
}

#[test]
fn live_frames_are_resized_to_target() {
    let source = ScriptedSource::new(vec![], Then::Repeat(Frame::filled(16, 16, BLUE)));
    let channel =
        CameraChannel::spawn(settings(PacingMode::FreeRun, 100), Box::new(source), &transforms())
            .unwrap();

    assert!(wait_until(TIMEOUT, || channel.stats().frames_captured() > 0));
    let frame = channel.current_frame();
    assert_eq!((frame.width(), frame.height()), (SIZE, SIZE));
    assert_eq!(frame.pixel(3, 3), BLUE);
}

#[test]
fn recovers_after_transient_failures() {
    let mut script = vec![Step::Frame(tagged(9))];
    script.extend(std::iter::repeat(Step::Fail).take(20));
    let source = ScriptedSource::new(script, Then::Repeat(tagged(42)));
    let opens = source.opens();

    let channel =
        CameraChannel::spawn(settings(PacingMode::FreeRun, 100), Box::new(source), &transforms())
            .unwrap();

    assert!(wait_until(TIMEOUT, || tag_of(&channel.current_frame()) == 42));
    assert!(!channel.stats().is_failing());
    assert_eq!(channel.stats().consecutive_failures(), 0);
    // Twenty failures stay below the threshold: no reopen
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(channel.stats().reopens(), 0);
}

#[test]
fn dead_source_keeps_placeholder() {
    let source = ScriptedSource::new(vec![Step::Frame(tagged(9))], Then::FailForever);
    let channel = CameraChannel::spawn(
        settings(PacingMode::FreeRun, 1_000_000),
        Box::new(source),
        &transforms(),
    )
    .unwrap();

    assert!(wait_until(TIMEOUT, || channel.stats().is_failing()
        && channel.current_frame().pixel(0, 0) == PLACEHOLDER_BGR));
    assert!(channel.is_enabled());
}

#[test]
fn reopens_after_threshold_exceeded() {
    // 101 consecutive failures with the default threshold of 100
    let script = std::iter::repeat(Step::Fail).take(101).collect();
    let source = ScriptedSource::new(script, Then::Repeat(tagged(5)));
    let opens = source.opens();
    let reads = source.reads();

    let channel =
        CameraChannel::spawn(settings(PacingMode::FreeRun, 100), Box::new(source), &transforms())
            .unwrap();

    assert!(wait_until(TIMEOUT, || channel.stats().frames_captured() > 0));
    assert!(reads.load(Ordering::SeqCst) > 101);
    // Initial open plus exactly one forced reopen
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    assert_eq!(channel.stats().reopens(), 1);
    assert_eq!(channel.stats().consecutive_failures(), 0);
}

#[test]
fn failed_initial_open_keeps_retrying() {
    let source = ScriptedSource::new(vec![Step::Fail; 3], Then::Repeat(tagged(8))).failing_open();
    let channel = CameraChannel::spawn(
        settings(PacingMode::FreeRun, 1),
        Box::new(source),
        &transforms(),
    )
    .unwrap();

    assert!(wait_until(TIMEOUT, || tag_of(&channel.current_frame()) == 8));
    assert!(channel.stats().reopens() >= 1);
}

#[test]
fn synchronized_channel_waits_for_release() {
    let source = ScriptedSource::new(vec![], Then::Count);
    let channel = CameraChannel::spawn(
        settings(PacingMode::Synchronized, 100),
        Box::new(source),
        &transforms(),
    )
    .unwrap();

    assert!(wait_until(TIMEOUT, || channel.stats().frames_captured() == 1));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(channel.stats().frames_captured(), 1);
    assert_eq!(tag_of(&channel.current_frame()), 1);

    channel.release();
    assert!(wait_until(TIMEOUT, || channel.stats().frames_captured() == 2));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(channel.stats().frames_captured(), 2);
    assert_eq!(tag_of(&channel.current_frame()), 2);
}

#[test]
fn free_run_channel_does_not_wait() {
    let source = ScriptedSource::new(vec![], Then::Count);
    let channel =
        CameraChannel::spawn(settings(PacingMode::FreeRun, 100), Box::new(source), &transforms())
            .unwrap();

    assert!(wait_until(TIMEOUT, || channel.stats().frames_captured() > 10));
}

#[test]
fn shutdown_stops_a_blocked_channel() {
    let source = ScriptedSource::new(vec![], Then::Count);
    let mut channel = CameraChannel::spawn(
        settings(PacingMode::Synchronized, 100),
        Box::new(source),
        &transforms(),
    )
    .unwrap();

    assert!(wait_until(TIMEOUT, || channel.stats().frames_captured() == 1));
    channel.shutdown();
    let captured = channel.stats().frames_captured();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(channel.stats().frames_captured(), captured);
}

#[test]
fn disabled_channel_shows_placeholder() {
    let channel = CameraChannel::disabled(&settings(PacingMode::FreeRun, 100), &transforms());
    assert!(!channel.is_enabled());
    let frame = channel.current_frame();
    assert_eq!((frame.width(), frame.height()), (SIZE, SIZE));
    assert_eq!(frame.pixel(0, 0), PLACEHOLDER_BGR);
    channel.release();
}

