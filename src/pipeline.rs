//! Shape-to-point pipeline.
//!
//! Turns a set of [`ShapeDescriptor`]s plus one flat color sequence into the
//! ordered device points of a single frame. For each shape, in order:
//!
//! 1. `start_blanks` beam-off points at the start anchor.
//! 2. For every vertex: the interpolated points leading into it (carrying the
//!    vertex's color; only position interpolates), then the vertex itself
//!    `point_repeat` times.
//! 3. `end_blanks` beam-off points at the end anchor.
//!
//! Colors are consumed one per vertex from a single running index that never
//! resets between shapes. All input is validated before the first point is
//! produced, so a stream that starts always runs to completion and its length
//! is known up front.
//!
//! # Example
//!
//! ```
//! use laser_shutter::{build_frame, ColorRGBA, Point2D, ShapeDescriptor};
//!
//! let line = ShapeDescriptor::new([Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)])
//!     .with_spacing(0.6)
//!     .with_blanks(1, 1);
//! let frame = build_frame(&[line], &[ColorRGBA::WHITE; 2]).unwrap();
//! assert_eq!(frame.len(), 5);
//! ```

use std::iter::FusedIterator;

use log::debug;

use crate::error::ConfigError;
use crate::shape::{ShapeDescriptor, MAX_FRAME_POINTS};
use crate::types::{to_device_point, ColorRGBA, DevicePoint, Frame, LaserPoint, Point2D};

/// Validates shapes and colors and produces [`PointStream`]s.
#[derive(Debug, Clone, Copy)]
pub struct PointStreamBuilder<'a> {
    shapes: &'a [ShapeDescriptor],
    colors: &'a [ColorRGBA],
}

impl<'a> PointStreamBuilder<'a> {
    /// Creates a builder over caller-owned shapes and colors.
    pub fn new(shapes: &'a [ShapeDescriptor], colors: &'a [ColorRGBA]) -> Self {
        Self { shapes, colors }
    }

    /// Validates the input and returns a lazy stream of device points.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidRepeat`] / [`ConfigError::InvalidSpacing`] for a
    ///   malformed shape.
    /// - [`ConfigError::LengthMismatch`] unless there is exactly one color per
    ///   vertex across all shapes.
    /// - [`ConfigError::FrameTooLarge`] if the frame would hold more than
    ///   [`MAX_FRAME_POINTS`] points.
    pub fn build(&self) -> Result<PointStream<'a>, ConfigError> {
        let mut vertices = 0usize;
        let mut total = 0usize;
        for (index, shape) in self.shapes.iter().enumerate() {
            shape.validate(index)?;
            vertices += shape.vertices.len();
            total = shape
                .point_count()
                .and_then(|count| total.checked_add(count))
                .filter(|&n| n <= MAX_FRAME_POINTS)
                .ok_or(ConfigError::FrameTooLarge {
                    shape: index,
                    limit: MAX_FRAME_POINTS,
                })?;
        }
        if vertices != self.colors.len() {
            return Err(ConfigError::LengthMismatch {
                expected: vertices,
                actual: self.colors.len(),
            });
        }
        Ok(PointStream {
            shapes: self.shapes,
            colors: self.colors,
            shape_index: 0,
            vertex_index: 0,
            color_index: 0,
            segment: Segment::default(),
            phase: Phase::ShapeStart,
            remaining: total,
        })
    }

    /// Builds the stream and collects it into a [`Frame`].
    pub fn build_frame(&self) -> Result<Frame, ConfigError> {
        let stream = self.build()?;
        let frame: Frame = stream.collect();
        debug!(
            "built frame: {} shapes, {} colors, {} points",
            self.shapes.len(),
            self.colors.len(),
            frame.len()
        );
        Ok(frame)
    }
}

/// Builds one frame from `shapes` and their flat `colors`.
///
/// Shorthand for `PointStreamBuilder::new(shapes, colors).build_frame()`.
pub fn build_frame(shapes: &[ShapeDescriptor], colors: &[ColorRGBA]) -> Result<Frame, ConfigError> {
    PointStreamBuilder::new(shapes, colors).build_frame()
}

/// The segment currently being drawn: interpolation into `to`, then dwell on it.
#[derive(Debug, Clone, Copy, Default)]
struct Segment {
    from: Point2D,
    to: Point2D,
    color: ColorRGBA,
    steps: usize,
    /// Next interpolation index, `1..=steps`.
    k: usize,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    ShapeStart,
    StartBlanks { left: u32, anchor: Point2D },
    VertexStart,
    Interpolate,
    Dwell { left: u32 },
    EndBlanks { left: u32, anchor: Point2D },
    Done,
}

/// Lazy, single-pass sequence of device points for one frame.
///
/// Created by [`PointStreamBuilder::build`]. Re-run the builder for the next
/// frame.
#[derive(Debug, Clone)]
pub struct PointStream<'a> {
    shapes: &'a [ShapeDescriptor],
    colors: &'a [ColorRGBA],
    shape_index: usize,
    vertex_index: usize,
    /// Global color cursor; never reset between shapes.
    color_index: usize,
    segment: Segment,
    phase: Phase,
    remaining: usize,
}

impl PointStream<'_> {
    fn emit(&mut self, point: LaserPoint) -> Option<DevicePoint> {
        self.remaining = self.remaining.saturating_sub(1);
        Some(to_device_point(&point))
    }
}

impl Iterator for PointStream<'_> {
    type Item = DevicePoint;

    fn next(&mut self) -> Option<DevicePoint> {
        loop {
            match self.phase {
                Phase::Done => return None,
                Phase::ShapeStart => {
                    let Some(shape) = self.shapes.get(self.shape_index) else {
                        self.phase = Phase::Done;
                        continue;
                    };
                    match shape.anchors() {
                        Some((start, _)) => {
                            self.vertex_index = 0;
                            self.phase = Phase::StartBlanks {
                                left: shape.start_blanks,
                                anchor: start,
                            };
                        }
                        None => self.shape_index += 1,
                    }
                }
                Phase::StartBlanks { left, anchor } => {
                    if left > 0 {
                        self.phase = Phase::StartBlanks {
                            left: left - 1,
                            anchor,
                        };
                        return self.emit(LaserPoint::blanked(anchor));
                    }
                    self.phase = Phase::VertexStart;
                }
                Phase::VertexStart => {
                    let shape = &self.shapes[self.shape_index];
                    let Some(&vertex) = shape.vertices.get(self.vertex_index) else {
                        let (_, end) = shape.anchors().unwrap_or_default();
                        self.phase = Phase::EndBlanks {
                            left: shape.end_blanks,
                            anchor: end,
                        };
                        continue;
                    };
                    // Count validated in build(): one color per vertex.
                    let color = self.colors[self.color_index];
                    self.color_index += 1;

                    let prev = shape.predecessor(self.vertex_index);
                    self.segment = Segment {
                        from: prev.unwrap_or(vertex),
                        to: vertex,
                        color,
                        steps: prev.map_or(0, |p| shape.interpolation.steps(p, vertex)),
                        k: 1,
                    };
                    self.phase = Phase::Interpolate;
                }
                Phase::Interpolate => {
                    let seg = self.segment;
                    if seg.k <= seg.steps {
                        self.segment.k += 1;
                        let t = seg.k as f32 / (seg.steps + 1) as f32;
                        return self.emit(LaserPoint::new(seg.from.lerp(seg.to, t), seg.color));
                    }
                    self.phase = Phase::Dwell {
                        left: self.shapes[self.shape_index].point_repeat,
                    };
                }
                Phase::Dwell { left } => {
                    if left > 0 {
                        self.phase = Phase::Dwell { left: left - 1 };
                        let seg = self.segment;
                        return self.emit(LaserPoint::new(seg.to, seg.color));
                    }
                    self.vertex_index += 1;
                    self.phase = Phase::VertexStart;
                }
                Phase::EndBlanks { left, anchor } => {
                    if left > 0 {
                        self.phase = Phase::EndBlanks {
                            left: left - 1,
                            anchor,
                        };
                        return self.emit(LaserPoint::blanked(anchor));
                    }
                    self.shape_index += 1;
                    self.phase = Phase::ShapeStart;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PointStream<'_> {}

impl FusedIterator for PointStream<'_> {}
