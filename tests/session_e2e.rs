//! End-to-end tests: shapes -> frame -> session -> mock device.
//!
//! These drive the public API only, using the in-memory adapter from the
//! `testutils` feature.

#![cfg(feature = "testutils")]

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use laser_shutter::testutils::{MockAdapter, MockCall};
use laser_shutter::{
    build_frame, ColorRGBA, DeviceError, DeviceOp, DeviceSession, Error, Frame, Point2D,
    SessionConfig, ShapeDescriptor,
};

fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .with_ready_timeout(Duration::from_millis(5))
        .with_poll_interval(Duration::from_millis(1))
}

fn open(mock: &MockAdapter) -> DeviceSession {
    DeviceSession::builder(mock.clone())
        .config(fast_config())
        .open()
        .unwrap()
}

fn square_frame() -> Frame {
    let square = ShapeDescriptor::closed([
        Point2D::new(-0.5, -0.5),
        Point2D::new(0.5, -0.5),
        Point2D::new(0.5, 0.5),
        Point2D::new(-0.5, 0.5),
    ])
    .with_spacing(0.25)
    .with_point_repeat(2);
    build_frame(&[square], &[ColorRGBA::WHITE; 4]).unwrap()
}

fn shutter_calls(mock: &MockAdapter) -> Vec<bool> {
    mock.calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::Shutter(open) => Some(open),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_full_lifecycle() {
    let mock = MockAdapter::with_devices(2);
    let mut session = DeviceSession::builder(mock.clone())
        .config(fast_config())
        .device_chooser(|devices| {
            devices
                .iter()
                .position(|d| d.name == "mock-1")
                .unwrap_or(0)
        })
        .open()
        .unwrap();
    assert_eq!(session.descriptor().index, 1);

    let frame = square_frame();
    // 4 edges of length 1.0 at spacing 0.25 -> 4 intermediates each
    assert_eq!(frame.len(), 1 + 4 * (4 + 2) + 1);

    let hold = session.open_shutter().unwrap();
    session.write_frame(&frame).unwrap();
    drop(hold);
    session.close().unwrap();

    assert_eq!(mock.written_frames(), vec![frame.points().to_vec()]);
    assert_eq!(shutter_calls(&mock), vec![true, false]);

    let calls = mock.calls();
    assert_eq!(calls[0], MockCall::Enumerate);
    assert_eq!(calls[1], MockCall::Open(1));
    assert!(matches!(calls.last(), Some(MockCall::Close(_))));
    assert!(!mock.is_open());
}

#[test]
fn test_scope_exit_closes_device() {
    let mock = MockAdapter::with_devices(1);
    {
        let session = open(&mock);
        let _hold = session.open_shutter().unwrap();
        session.write_frame(&square_frame()).unwrap();
    }
    assert!(!mock.is_open());
    assert!(!mock.shutter_open());
}

#[test]
fn test_reinitializing_open_session_is_invalid_state() {
    let mock = MockAdapter::with_devices(1);
    let mut session = open(&mock);
    assert!(session.reopen().unwrap_err().is_invalid_state());
    assert_eq!(mock.count_calls(|c| matches!(c, MockCall::Open(_))), 1);
}

// =============================================================================
// Shutter Tests
// =============================================================================

#[test]
fn test_concurrent_holds_toggle_shutter_once() {
    let mock = MockAdapter::with_devices(1);
    let session = open(&mock);
    let frame = square_frame();
    let barrier = Barrier::new(3);

    thread::scope(|s| {
        for _ in 0..3 {
            s.spawn(|| {
                let hold = session.open_shutter().unwrap();
                barrier.wait();
                session.write_frame(&frame).unwrap();
                barrier.wait();
                drop(hold);
            });
        }
    });

    assert_eq!(shutter_calls(&mock), vec![true, false]);
    assert_eq!(mock.written_frames().len(), 3);
    assert!(!session.is_shutter_open());
}

#[test]
fn test_writes_keep_issue_order() {
    let mock = MockAdapter::with_devices(1);
    let session = open(&mock);
    let frames: Vec<Frame> = (1..=5)
        .map(|n| {
            let line = ShapeDescriptor::new([Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)])
                .with_interpolation_count(n)
                .with_blanks(0, 0);
            build_frame(&[line], &[ColorRGBA::WHITE; 2]).unwrap()
        })
        .collect();

    let _hold = session.open_shutter().unwrap();
    for frame in &frames {
        session.write_frame(frame).unwrap();
    }

    let lengths: Vec<usize> = mock.written_frames().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![3, 4, 5, 6, 7]);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_rejected_write_leaves_shutter_open() {
    let mock = MockAdapter::with_devices(1).fail_writes(-7);
    let session = open(&mock);
    let hold = session.open_shutter().unwrap();

    match session.write_frame(&square_frame()).unwrap_err() {
        Error::Device(DeviceError::Rejected { op, code }) => {
            assert_eq!(op, DeviceOp::Write);
            assert_eq!(code, -7);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(session.is_shutter_open());
    assert!(mock.shutter_open());
    assert_eq!(shutter_calls(&mock), vec![true]);

    drop(hold);
    assert_eq!(shutter_calls(&mock), vec![true, false]);
}

#[test]
fn test_timeout_then_retry() {
    // 5 polls per write: the first write exhausts them, the second sees
    // two more busy polls then ready
    let mock = MockAdapter::with_devices(1).busy_for(7);
    let session = open(&mock);
    let frame = square_frame();

    let err = session.write_frame(&frame).unwrap_err();
    assert!(err.is_timeout());
    assert!(mock.written_frames().is_empty());

    session.write_frame(&frame).unwrap();
    assert_eq!(mock.written_frames().len(), 1);
}

#[test]
fn test_malformed_shapes_never_reach_device() {
    let mock = MockAdapter::with_devices(1);
    let session = open(&mock);
    let line = ShapeDescriptor::new([Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)]);

    let err: Error = build_frame(&[line], &[ColorRGBA::WHITE]).unwrap_err().into();
    assert!(err.is_config());
    assert!(mock.written_frames().is_empty());
    drop(session);
}

// =============================================================================
// Frame Content Tests
// =============================================================================

#[test]
fn test_line_with_single_intermediate() {
    let line = ShapeDescriptor::new([Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)])
        .with_spacing(0.6)
        .with_blanks(1, 1);
    let frame = build_frame(&[line], &[ColorRGBA::WHITE; 2]).unwrap();

    let lit: Vec<bool> = frame.points().iter().map(|p| !p.is_blank()).collect();
    assert_eq!(lit, vec![false, true, true, true, false]);

    let xs: Vec<i16> = frame.points().iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0, 0, 16384, 32767, 32767]);
}

#[test]
fn test_debug_positions_follow_frame() {
    let frame = square_frame();
    let positions = frame.positions();
    assert_eq!(positions.len(), frame.len());
    // Closed shape: start blank sits on the last vertex
    assert!((positions[0].x + 0.5).abs() < 1e-4);
    assert!((positions[0].y - 0.5).abs() < 1e-4);
}
