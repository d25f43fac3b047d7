//! Device adapter boundary.
//!
//! This module provides the [`DeviceAdapter`] trait that vendor integrations
//! implement. Transport, discovery and the binary point layout of a given
//! DAC all live behind it; the rest of the crate only sees device points,
//! handles and status values.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DeviceOp, Error, Result};
use crate::types::DevicePoint;

/// Status code vendor libraries use for success.
pub const STATUS_OK: i32 = 0;
/// Status code vendor libraries use for a generic failure.
pub const STATUS_ERROR: i32 = -1;

/// Repeat count asking the device to loop the frame until the next write.
pub const REPEAT_FOREVER: i32 = -1;

/// Opaque handle to an opened device, issued by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceHandle(pub u32);

/// A device reported by [`DeviceAdapter::enumerate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceDescriptor {
    /// Position in the enumeration order; what [`DeviceAdapter::open`] takes.
    pub index: usize,
    /// Human-readable name (often the device's MAC address or serial).
    pub name: String,
}

impl DeviceDescriptor {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// Readiness reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceStatus {
    /// The device can accept a frame.
    Ready,
    /// The device is still playing the previous frame.
    Busy,
    /// The device reported a fault.
    Error,
}

/// Converts a vendor status code into a `Result`, tagging failures with `op`.
///
/// Helper for adapters that wrap C-style libraries returning `0` on success.
pub fn check_status(op: DeviceOp, code: i32) -> Result<()> {
    if code == STATUS_OK {
        Ok(())
    } else {
        Err(Error::rejected(op, code))
    }
}

/// Adapter trait for one family of laser DACs.
///
/// # Contract
///
/// - Failures are reported as `Err`, preferably `Error::Device(DeviceError::Rejected { .. })`
///   naming the failing operation (see [`check_status`]).
/// - `status` must be cheap: sessions poll it in a tight loop before every
///   write.
/// - `write` submits a complete frame; the adapter converts the points into
///   its native layout.
pub trait DeviceAdapter: Send + 'static {
    /// Lists the devices this adapter can open, in index order.
    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Opens the device at `index`.
    fn open(&mut self, index: usize) -> Result<DeviceHandle>;

    /// Closes a handle returned by [`open`](DeviceAdapter::open).
    fn close(&mut self, handle: DeviceHandle) -> Result<()>;

    /// Returns the current readiness of the device.
    fn status(&mut self, handle: DeviceHandle) -> Result<DeviceStatus>;

    /// Writes one frame.
    ///
    /// `repeat_count` is the number of times the device plays the frame;
    /// [`REPEAT_FOREVER`] loops it until the next write.
    fn write(
        &mut self,
        handle: DeviceHandle,
        points: &[DevicePoint],
        points_per_second: u32,
        repeat_count: i32,
    ) -> Result<()>;

    /// Opens or closes the hardware shutter.
    fn set_shutter(&mut self, handle: DeviceHandle, open: bool) -> Result<()>;

    /// Stops output. Defaults to doing nothing for devices without a stop
    /// command.
    fn stop(&mut self, _handle: DeviceHandle) -> Result<()> {
        Ok(())
    }
}
