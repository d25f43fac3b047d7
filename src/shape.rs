//! Shape descriptors consumed by the point pipeline.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Point2D;

/// Smallest spacing used for distance-based interpolation.
///
/// Keeps coincident vertices and tiny spacings from blowing up the step count.
pub const MIN_SPACING: f32 = 0.0001;

/// Most points a single frame may hold.
pub const MAX_FRAME_POINTS: usize = 1 << 24;

/// How intermediate points are inserted between consecutive vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interpolation {
    /// One intermediate point per `spacing` units of segment length
    /// (`floor(distance / spacing)` points per segment).
    Distance(f32),
    /// A fixed number of intermediate points per segment.
    Count(u32),
}

impl Interpolation {
    /// Number of intermediate points between `from` and `to`.
    ///
    /// Distance-based counts saturate at [`MAX_FRAME_POINTS`]. With the
    /// vertex itself added, an oversized segment always exceeds the frame
    /// limit.
    pub fn steps(&self, from: Point2D, to: Point2D) -> usize {
        match *self {
            Interpolation::Distance(spacing) => {
                let steps = (from.distance(to) / spacing.max(MIN_SPACING)).floor();
                if steps.is_nan() || steps <= 0.0 {
                    0
                } else {
                    steps.min(MAX_FRAME_POINTS as f32) as usize
                }
            }
            Interpolation::Count(n) => n as usize,
        }
    }
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Distance(1.0)
    }
}

/// One polyline to draw.
///
/// Colors are not stored per shape: the pipeline draws them from a single
/// flat sequence in global vertex order across all shapes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ShapeDescriptor {
    /// Vertices in drawing order.
    pub vertices: Vec<Point2D>,
    /// Whether the shape wraps from its last vertex back to its first.
    pub closed: bool,
    /// Copies emitted for each vertex (dwell).
    pub point_repeat: u32,
    /// Intermediate point density.
    pub interpolation: Interpolation,
    /// Beam-off points emitted at the start anchor.
    pub start_blanks: u32,
    /// Beam-off points emitted at the end anchor.
    pub end_blanks: u32,
}

impl Default for ShapeDescriptor {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            closed: false,
            point_repeat: 1,
            interpolation: Interpolation::default(),
            start_blanks: 1,
            end_blanks: 1,
        }
    }
}

impl ShapeDescriptor {
    /// Creates an open shape with default settings.
    pub fn new(vertices: impl IntoIterator<Item = Point2D>) -> Self {
        Self {
            vertices: vertices.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Creates a closed shape with default settings.
    pub fn closed(vertices: impl IntoIterator<Item = Point2D>) -> Self {
        Self::new(vertices).with_closed(true)
    }

    /// Set whether the shape is closed (builder pattern).
    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    /// Set the per-vertex repeat count (builder pattern).
    pub fn with_point_repeat(mut self, repeat: u32) -> Self {
        self.point_repeat = repeat;
        self
    }

    /// Use distance-based interpolation (builder pattern).
    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.interpolation = Interpolation::Distance(spacing);
        self
    }

    /// Use count-based interpolation (builder pattern).
    pub fn with_interpolation_count(mut self, count: u32) -> Self {
        self.interpolation = Interpolation::Count(count);
        self
    }

    /// Set start and end blank counts (builder pattern).
    pub fn with_blanks(mut self, start: u32, end: u32) -> Self {
        self.start_blanks = start;
        self.end_blanks = end;
        self
    }

    /// Returns the `(start, end)` anchors used for blanking.
    ///
    /// A closed shape anchors both ends on its last vertex, so the start
    /// blank and the wrap-around segment originate at the closing point.
    /// Returns `None` for a shape without vertices.
    pub fn anchors(&self) -> Option<(Point2D, Point2D)> {
        let first = *self.vertices.first()?;
        let last = *self.vertices.last()?;
        if self.closed {
            Some((last, last))
        } else {
            Some((first, last))
        }
    }

    /// Checks the per-shape scalars. `index` identifies the shape in errors.
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.point_repeat < 1 {
            return Err(ConfigError::InvalidRepeat {
                shape: index,
                repeat: self.point_repeat,
            });
        }
        if let Interpolation::Distance(spacing) = self.interpolation {
            if !(spacing.is_finite() && spacing > 0.0) {
                return Err(ConfigError::InvalidSpacing {
                    shape: index,
                    spacing,
                });
            }
        }
        Ok(())
    }

    /// The point interpolation into `vertices[index]` starts from, if any.
    ///
    /// Shapes with fewer than two vertices have no predecessors at all.
    pub fn predecessor(&self, index: usize) -> Option<Point2D> {
        if self.vertices.len() < 2 {
            return None;
        }
        match index {
            0 if self.closed => self.vertices.last().copied(),
            0 => None,
            i => self.vertices.get(i - 1).copied(),
        }
    }

    /// Exact number of points this shape contributes to a frame, or `None`
    /// if the count does not fit in a `usize`.
    ///
    /// A shape without vertices contributes nothing, blanks included.
    pub fn point_count(&self) -> Option<usize> {
        if self.vertices.is_empty() {
            return Some(0);
        }
        let blanks = (self.start_blanks as usize).checked_add(self.end_blanks as usize)?;
        let dwell = self.vertices.len().checked_mul(self.point_repeat as usize)?;
        let mut count = blanks.checked_add(dwell)?;
        for (i, &vertex) in self.vertices.iter().enumerate() {
            if let Some(prev) = self.predecessor(i) {
                count = count.checked_add(self.interpolation.steps(prev, vertex))?;
            }
        }
        Some(count)
    }
}
