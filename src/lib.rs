//! Frame generation and shutter control for galvanometer laser projectors.
//!
//! This crate turns 2-D vector shapes with per-vertex color into the flat,
//! time-ordered point stream a fixed-rate laser DAC plays back, and manages
//! the hardware shutter that several callers may want open at once.
//!
//! # Overview
//!
//! - [`PointStreamBuilder`] / [`build_frame`]: shapes + colors → [`Frame`]
//!   (interpolated, blanked, repeated), fully validated up front.
//! - [`ReferenceGuard`] / [`ScopedHold`]: reference-counted activation. The
//!   activate callback fires on the first hold, deactivate on the last
//!   release.
//! - [`DeviceSession`]: one opened device with a shutter guard, readiness
//!   polling and ordered frame writes.
//! - [`DeviceAdapter`]: the trait a vendor integration implements. Transport
//!   and binary point layout stay behind it.
//!
//! # Coordinate System
//!
//! Shapes use normalized coordinates:
//! - X: -1.0 (left) to 1.0 (right)
//! - Y: -1.0 (bottom) to 1.0 (top)
//! - Colors: 0.0 to 1.0 for R, G, B and alpha; alpha 0 blanks the beam
//!
//! Frames hold [`DevicePoint`]s: `i16` positions and `u16` color/intensity.
//!
//! # Example
//!
//! ```ignore
//! use laser_shutter::{build_frame, ColorRGBA, DeviceSession, Point2D, ShapeDescriptor};
//!
//! let square = ShapeDescriptor::closed([
//!     Point2D::new(-0.5, -0.5),
//!     Point2D::new(0.5, -0.5),
//!     Point2D::new(0.5, 0.5),
//!     Point2D::new(-0.5, 0.5),
//! ])
//! .with_spacing(0.05);
//! let frame = build_frame(&[square], &[ColorRGBA::WHITE; 4])?;
//!
//! let session = DeviceSession::builder(my_adapter).open()?;
//! let _shutter = session.open_shutter()?;
//! session.write_frame(&frame)?;
//! ```
//!
//! # Features
//!
//! - `serde`: `Serialize`/`Deserialize` for shapes, points and configs
//! - `testutils`: exports [`testutils::MockAdapter`], an in-memory device

pub mod demo;
pub mod device;
mod error;
pub mod guard;
pub mod pipeline;
pub mod session;
pub mod shape;
pub mod types;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

// Error types
pub use error::{ConfigError, DeviceError, DeviceOp, Error, Result};

// Geometry and device points
pub use types::{
    from_device_point, to_device_point, ColorRGBA, DevicePoint, Frame, LaserPoint, Point2D,
};

// Frame generation
pub use pipeline::{build_frame, PointStream, PointStreamBuilder};
pub use shape::{Interpolation, ShapeDescriptor, MAX_FRAME_POINTS};

// Shutter guard
pub use guard::{ReferenceGuard, ScopedHold};

// Devices and sessions
pub use device::{DeviceAdapter, DeviceDescriptor, DeviceHandle, DeviceStatus};
pub use session::{DeviceSession, SessionBuilder, SessionConfig};

// Demo pattern
pub use demo::{demo_frame, demo_frames};
