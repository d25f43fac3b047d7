//! Built-in test pattern: a circle whose rainbow coloring rotates per frame.
//!
//! Useful for checking that a device is wired up before any shape input
//! exists.

use std::f32::consts::{FRAC_PI_4, TAU};

use log::debug;

use crate::error::Result;
use crate::session::DeviceSession;
use crate::types::{to_device_point, ColorRGBA, Frame, LaserPoint, Point2D};

/// Points per demo frame.
pub const DEMO_POINT_COUNT: usize = 300;
/// Frames in a full demo run.
pub const DEMO_FRAME_COUNT: u32 = 400;

/// Circle radius in normalized units, just inside the scan limits.
const DEMO_RADIUS: f32 = 32_700.0 / 32_767.0;
/// Frames per radian of color rotation.
const PHASE_FRAMES: f32 = 50.0;

/// Maps a sine/cosine value onto a color channel. Saturates at 254/255.
fn channel(wave: f32) -> f32 {
    (wave * 127.0 + 127.0) / 255.0
}

/// Builds demo frame `frame_index` with `point_count` points.
///
/// The circle starts at the top and runs clockwise; every point is lit.
pub fn demo_frame(frame_index: u32, point_count: usize) -> Frame {
    let phase = frame_index as f32 / PHASE_FRAMES;
    (0..point_count)
        .map(|i| {
            let angle = i as f32 * TAU / point_count as f32;
            let position = Point2D::new(angle.sin() * DEMO_RADIUS, angle.cos() * DEMO_RADIUS);
            let color = ColorRGBA::rgb(
                channel((angle + phase).sin()),
                channel((angle - phase).cos()),
                channel((angle + FRAC_PI_4 + phase).cos()),
            );
            to_device_point(&LaserPoint::new(position, color))
        })
        .collect()
}

/// Lazily yields `frame_count` demo frames of `point_count` points each.
pub fn demo_frames(frame_count: u32, point_count: usize) -> impl Iterator<Item = Frame> {
    (0..frame_count).map(move |index| demo_frame(index, point_count))
}

impl DeviceSession {
    /// Plays `frame_count` demo frames with the shutter held open.
    ///
    /// Stops at the first failed write. Use [`DEMO_FRAME_COUNT`] for a full
    /// color cycle.
    pub fn render_demo_frames(&self, frame_count: u32) -> Result<()> {
        let mut hold = self.open_shutter()?;
        debug!("demo: rendering {} frames", frame_count);
        let written = demo_frames(frame_count, DEMO_POINT_COUNT)
            .try_for_each(|frame| self.write_frame(&frame));
        let released = hold.release();
        written.and(released)
    }
}
