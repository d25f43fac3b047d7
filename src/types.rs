//! Point, color and frame types.
//!
//! Shapes are described in normalized space; the pipeline projects each
//! sample into fixed-point device space as its final step. The projection is
//! done by the explicit [`to_device_point`] / [`from_device_point`] pair so it
//! can be audited and tested in isolation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Full-scale positive device coordinate.
pub const POSITION_MAX: i16 = i16::MAX;
/// Full-scale negative device coordinate.
pub const POSITION_MIN: i16 = i16::MIN;
/// Full-scale color/intensity channel value.
pub const CHANNEL_MAX: u16 = u16::MAX;

/// A 2-D position.
///
/// Coordinates are normalized:
/// - x: -1.0 (left) to 1.0 (right)
/// - y: -1.0 (bottom) to 1.0 (top)
///
/// Values outside that range are accepted and saturate at projection time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    /// The origin.
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    /// Creates a new point.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point2D) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation from `self` (t = 0) to `other` (t = 1).
    pub fn lerp(self, other: Point2D, t: f32) -> Point2D {
        Point2D {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl From<(f32, f32)> for Point2D {
    fn from((x, y): (f32, f32)) -> Self {
        Point2D { x, y }
    }
}

/// An RGBA color with channels in `[0, 1]`.
///
/// Alpha doubles as the beam-enable signal: a color with alpha 0 is blanked,
/// whatever its RGB channels say.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColorRGBA {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRGBA {
    /// Fully transparent black; the color carried by blank points.
    pub const BLANK: ColorRGBA = ColorRGBA::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque white.
    pub const WHITE: ColorRGBA = ColorRGBA::new(1.0, 1.0, 1.0, 1.0);

    /// Creates a new color.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Returns true if this color switches the beam off, i.e. its alpha
    /// projects to zero intensity.
    pub fn is_blank(&self) -> bool {
        project_channel(self.a) == 0
    }
}

/// A normalized sample: position plus color, before projection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaserPoint {
    pub position: Point2D,
    pub color: ColorRGBA,
}

impl LaserPoint {
    /// Creates a new laser point.
    pub fn new(position: Point2D, color: ColorRGBA) -> Self {
        Self { position, color }
    }

    /// Creates a blanked point (laser off) at the given position.
    pub fn blanked(position: Point2D) -> Self {
        Self {
            position,
            color: ColorRGBA::BLANK,
        }
    }
}

/// A fixed-point device sample.
///
/// `intensity == 0` means the beam is off for this sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DevicePoint {
    pub x: i16,
    pub y: i16,
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub intensity: u16,
}

impl DevicePoint {
    /// Creates a beam-off sample at the given device position.
    pub fn blank(x: i16, y: i16) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    /// Returns true if the beam is off for this sample.
    pub fn is_blank(&self) -> bool {
        self.intensity == 0
    }
}

// =============================================================================
// Projection
// =============================================================================

/// Projects one normalized axis value into the signed device range.
///
/// Positive values scale by 32767 and negative values by 32768 so both ends
/// of `[-1, 1]` reach full scale. The result saturates at
/// `[POSITION_MIN, POSITION_MAX]`; NaN maps to the center.
pub fn project_axis(value: f32) -> i16 {
    if value.is_nan() {
        return 0;
    }
    let scaled = if value >= 0.0 {
        value * POSITION_MAX as f32
    } else {
        value * -(POSITION_MIN as f32)
    };
    scaled
        .round()
        .clamp(POSITION_MIN as f32, POSITION_MAX as f32) as i16
}

/// Projects one `[0, 1]` color channel into `[0, CHANNEL_MAX]`, saturating.
pub fn project_channel(value: f32) -> u16 {
    if value.is_nan() {
        return 0;
    }
    (value * CHANNEL_MAX as f32)
        .round()
        .clamp(0.0, CHANNEL_MAX as f32) as u16
}

/// Projects a normalized sample into device space.
///
/// Any color whose alpha projects to zero intensity (alpha 0 included)
/// produces an all-zero color regardless of RGB.
pub fn to_device_point(point: &LaserPoint) -> DevicePoint {
    let x = project_axis(point.position.x);
    let y = project_axis(point.position.y);
    let color = &point.color;
    let intensity = project_channel(color.a);
    if intensity == 0 {
        return DevicePoint::blank(x, y);
    }
    DevicePoint {
        x,
        y,
        r: project_channel(color.r),
        g: project_channel(color.g),
        b: project_channel(color.b),
        intensity,
    }
}

/// Maps a device sample back into normalized space.
///
/// This is the inverse of [`to_device_point`] up to quantization.
pub fn from_device_point(point: &DevicePoint) -> LaserPoint {
    fn axis(v: i16) -> f32 {
        if v >= 0 {
            v as f32 / POSITION_MAX as f32
        } else {
            v as f32 / -(POSITION_MIN as f32)
        }
    }
    fn channel(v: u16) -> f32 {
        v as f32 / CHANNEL_MAX as f32
    }
    LaserPoint {
        position: Point2D::new(axis(point.x), axis(point.y)),
        color: ColorRGBA::new(
            channel(point.r),
            channel(point.g),
            channel(point.b),
            channel(point.intensity),
        ),
    }
}

// =============================================================================
// Frame
// =============================================================================

/// One ordered point sequence submitted to the device for one playback cycle.
///
/// Its length is exactly what the pipeline produced; nothing here truncates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    points: Vec<DevicePoint>,
}

impl Frame {
    /// Creates a frame from device points.
    pub fn new(points: Vec<DevicePoint>) -> Self {
        Self { points }
    }

    /// The device points, in playback order.
    pub fn points(&self) -> &[DevicePoint] {
        &self.points
    }

    /// Number of points in the frame.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the frame holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Normalized positions of every point, for previewing a frame.
    pub fn positions(&self) -> Vec<Point2D> {
        self.points
            .iter()
            .map(|p| from_device_point(p).position)
            .collect()
    }

    /// Consumes the frame, returning its points.
    pub fn into_points(self) -> Vec<DevicePoint> {
        self.points
    }
}

impl FromIterator<DevicePoint> for Frame {
    fn from_iter<I: IntoIterator<Item = DevicePoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a DevicePoint;
    type IntoIter = std::slice::Iter<'a, DevicePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
