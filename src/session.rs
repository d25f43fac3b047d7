//! Device sessions.
//!
//! A [`DeviceSession`] owns one opened device: its adapter, its handle and a
//! [`ReferenceGuard`] bound to the hardware shutter. Sessions are built with
//! [`DeviceSession::builder`] and close their handle when dropped.
//!
//! # Example
//!
//! ```ignore
//! let session = DeviceSession::builder(adapter)
//!     .config(SessionConfig::default().with_points_per_second(30_000))
//!     .device_index(0)
//!     .open()?;
//!
//! let hold = session.open_shutter()?;
//! session.write_frame(&frame)?;
//! drop(hold); // last hold closes the shutter
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::{debug, warn};

use crate::device::{
    DeviceAdapter, DeviceDescriptor, DeviceHandle, DeviceStatus, REPEAT_FOREVER, STATUS_ERROR,
};
use crate::error::{ConfigError, DeviceError, DeviceOp, Error, Result};
use crate::guard::{ReferenceGuard, ScopedHold};
use crate::types::{DevicePoint, Frame};

// =============================================================================
// Session Config
// =============================================================================

/// Playback and readiness-poll settings for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Playback rate handed to every write.
    pub points_per_second: u32,
    /// Times the device plays each frame; [`REPEAT_FOREVER`] loops until
    /// the next write.
    pub repeat_count: i32,
    /// How long `write_frame` waits for the device to report ready.
    pub ready_timeout: Duration,
    /// Delay between readiness polls.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            points_per_second: 15_000,
            repeat_count: REPEAT_FOREVER,
            ready_timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl SessionConfig {
    /// Set the playback rate (builder pattern).
    pub fn with_points_per_second(mut self, points_per_second: u32) -> Self {
        self.points_per_second = points_per_second;
        self
    }

    /// Set the frame repeat count (builder pattern).
    pub fn with_repeat_count(mut self, repeat_count: i32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    /// Set the readiness timeout (builder pattern).
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the readiness poll interval (builder pattern).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Number of status queries a write makes before giving up. Always at
    /// least one.
    pub fn max_polls(&self) -> u32 {
        let polls = self.ready_timeout.as_nanos() / self.poll_interval.as_nanos().max(1);
        polls.clamp(1, u32::MAX as u128) as u32
    }

    fn validate(&self) -> Result<()> {
        if self.points_per_second == 0 {
            return Err(Error::invalid_config("points_per_second cannot be 0"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_config("poll_interval cannot be 0"));
        }
        if self.repeat_count < REPEAT_FOREVER {
            return Err(Error::invalid_config(format!(
                "repeat_count must be >= {}, got {}",
                REPEAT_FOREVER, self.repeat_count
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Shared Device State
// =============================================================================

/// Adapter plus handle, shared between the session and its shutter guard.
struct DeviceState {
    adapter: Box<dyn DeviceAdapter>,
    /// `None` once the session is closed.
    handle: Option<DeviceHandle>,
}

impl DeviceState {
    fn handle(&self) -> Result<DeviceHandle> {
        self.handle
            .ok_or_else(|| Error::invalid_state("device session is closed"))
    }
}

type SharedDevice = Arc<Mutex<DeviceState>>;

fn lock(device: &SharedDevice) -> MutexGuard<'_, DeviceState> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Binds a guard to the shutter of `device`.
///
/// Deactivating after the session closed is a no-op: `close` already forced
/// the shutter shut.
fn shutter_guard(device: &SharedDevice) -> ReferenceGuard {
    let on = Arc::clone(device);
    let off = Arc::clone(device);
    ReferenceGuard::new(
        move || {
            let mut device = lock(&on);
            let handle = device.handle()?;
            debug!("session: opening shutter");
            device.adapter.set_shutter(handle, true)
        },
        move || {
            let mut device = lock(&off);
            match device.handle {
                Some(handle) => {
                    debug!("session: closing shutter");
                    device.adapter.set_shutter(handle, false)
                }
                None => Ok(()),
            }
        },
    )
}

// =============================================================================
// Session Builder
// =============================================================================

enum DeviceSelection {
    Index(usize),
    Chooser(Box<dyn FnOnce(&[DeviceDescriptor]) -> usize + Send>),
}

/// Builder returned by [`DeviceSession::builder`].
pub struct SessionBuilder {
    adapter: Box<dyn DeviceAdapter>,
    config: SessionConfig,
    selection: DeviceSelection,
}

impl SessionBuilder {
    /// Use the given session config.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Open the device at `index` in enumeration order (default 0).
    pub fn device_index(mut self, index: usize) -> Self {
        self.selection = DeviceSelection::Index(index);
        self
    }

    /// Pick the device from the enumerated list with a callback.
    pub fn device_chooser<F>(mut self, chooser: F) -> Self
    where
        F: FnOnce(&[DeviceDescriptor]) -> usize + Send + 'static,
    {
        self.selection = DeviceSelection::Chooser(Box::new(chooser));
        self
    }

    /// Enumerates devices, opens the selected one and returns the session.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the config is invalid, no device is found or the
    ///   selected index is out of range.
    /// - Whatever the adapter reports for enumerate/open.
    pub fn open(self) -> Result<DeviceSession> {
        let SessionBuilder {
            mut adapter,
            config,
            selection,
        } = self;
        config.validate()?;

        let devices = adapter.enumerate()?;
        if devices.is_empty() {
            return Err(Error::invalid_config("no devices found"));
        }
        let index = match selection {
            DeviceSelection::Index(index) => index,
            DeviceSelection::Chooser(choose) => choose(&devices),
        };
        let descriptor = devices.get(index).cloned().ok_or_else(|| {
            Error::invalid_config(format!(
                "device index {} out of range ({} devices found)",
                index,
                devices.len()
            ))
        })?;

        let handle = adapter.open(descriptor.index)?;
        debug!(
            "session: opened device {} ({}) at {} pps",
            descriptor.index, descriptor.name, config.points_per_second
        );

        let device = Arc::new(Mutex::new(DeviceState {
            adapter,
            handle: Some(handle),
        }));
        let shutter = shutter_guard(&device);
        Ok(DeviceSession {
            device,
            descriptor,
            config,
            shutter,
        })
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Device Session
// =============================================================================

/// One opened device with a reference-counted shutter.
///
/// All methods take `&self` except [`close`](DeviceSession::close) and
/// [`reopen`](DeviceSession::reopen), so a session can be shared across
/// threads by reference. Adapter calls are serialized by an internal lock;
/// writes reach the adapter in the order they were issued.
pub struct DeviceSession {
    device: SharedDevice,
    descriptor: DeviceDescriptor,
    config: SessionConfig,
    shutter: ReferenceGuard,
}

impl DeviceSession {
    /// Starts building a session over `adapter`.
    pub fn builder(adapter: impl DeviceAdapter) -> SessionBuilder {
        SessionBuilder {
            adapter: Box::new(adapter),
            config: SessionConfig::default(),
            selection: DeviceSelection::Index(0),
        }
    }

    /// Returns the device this session opened.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true once [`close`](DeviceSession::close) has run.
    pub fn is_closed(&self) -> bool {
        lock(&self.device).handle.is_none()
    }

    /// Returns true while any shutter hold is outstanding.
    pub fn is_shutter_open(&self) -> bool {
        self.shutter.is_active()
    }

    /// Takes a shutter hold. The first outstanding hold opens the hardware
    /// shutter; dropping the last one closes it.
    pub fn open_shutter(&self) -> Result<ScopedHold> {
        lock(&self.device).handle()?;
        self.shutter.acquire()
    }

    /// Queries the device's readiness.
    pub fn status(&self) -> Result<DeviceStatus> {
        let mut device = lock(&self.device);
        let handle = device.handle()?;
        device.adapter.status(handle)
    }

    /// Writes one frame once the device reports ready.
    ///
    /// Polls the device status up to `ready_timeout`, one query per
    /// `poll_interval`. Does not check the shutter: writing with no hold
    /// outstanding is allowed. A failed write leaves the shutter untouched.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the session is closed.
    /// - `ConfigError::EmptyFrame` for a frame without points.
    /// - `DeviceError::Timeout` if the device never reported ready.
    /// - `DeviceError::Rejected` if the device reported an error status or
    ///   the adapter refused the write.
    pub fn write_frame(&self, frame: &Frame) -> Result<()> {
        let mut device = lock(&self.device);
        let handle = device.handle()?;
        if frame.is_empty() {
            return Err(ConfigError::EmptyFrame.into());
        }

        self.wait_ready(&mut device, handle)?;
        device.adapter.write(
            handle,
            frame.points(),
            self.config.points_per_second,
            self.config.repeat_count,
        )?;
        debug!(
            "session: wrote {} points at {} pps",
            frame.len(),
            self.config.points_per_second
        );
        Ok(())
    }

    fn wait_ready(&self, device: &mut DeviceState, handle: DeviceHandle) -> Result<()> {
        let started = Instant::now();
        let polls = self.config.max_polls();
        for poll in 0..polls {
            match device.adapter.status(handle)? {
                DeviceStatus::Ready => return Ok(()),
                DeviceStatus::Busy => {}
                DeviceStatus::Error => return Err(Error::rejected(DeviceOp::Status, STATUS_ERROR)),
            }
            if poll + 1 < polls {
                thread::sleep(self.config.poll_interval);
            }
        }
        Err(DeviceError::Timeout {
            op: DeviceOp::Write,
            waited: started.elapsed(),
        }
        .into())
    }

    /// Writes `frame` with the shutter held open for the duration of the
    /// write.
    ///
    /// If no hold is outstanding the shutter opens before the write and
    /// closes after it. A write error takes precedence over a shutter-close
    /// error.
    pub fn write_frame_with_shutter(&self, frame: &Frame) -> Result<()> {
        let mut hold = self.open_shutter()?;
        let written = self.write_frame(frame);
        let released = hold.release();
        written.and(released)
    }

    /// Parks the beam: writes a single blank point at the origin.
    pub fn park(&self) -> Result<()> {
        self.write_frame(&Frame::new(vec![DevicePoint::blank(0, 0)]))
    }

    /// Stops output and closes the device handle.
    ///
    /// A shutter left open by outstanding holds is forced shut first; those
    /// holds stay valid and release without touching the device. Every step
    /// is attempted even if an earlier one fails; the first error is
    /// returned.
    ///
    /// Returns `InvalidState` if the session is already closed.
    pub fn close(&mut self) -> Result<()> {
        let shutter_open = self.shutter.is_active();
        let mut device = lock(&self.device);
        let handle = device
            .handle
            .take()
            .ok_or_else(|| Error::invalid_state("device session already closed"))?;

        let mut result = Ok(());
        if shutter_open {
            debug!("session: forcing shutter closed");
            result = result.and(device.adapter.set_shutter(handle, false));
        }
        let stopped = device.adapter.stop(handle);
        result = result.and(stopped);
        let closed = device.adapter.close(handle);
        result = result.and(closed);

        debug!("session: closed device {}", self.descriptor.index);
        result
    }

    /// Opens the same device again after [`close`](DeviceSession::close).
    ///
    /// Returns `InvalidState` if the session is still open or holds from
    /// before the close are still outstanding.
    pub fn reopen(&mut self) -> Result<()> {
        if self.shutter.is_active() {
            return Err(Error::invalid_state(
                "cannot reopen while shutter holds are outstanding",
            ));
        }
        let mut device = lock(&self.device);
        if device.handle.is_some() {
            return Err(Error::invalid_state("device session is already open"));
        }
        let handle = device.adapter.open(self.descriptor.index)?;
        device.handle = Some(handle);
        debug!("session: reopened device {}", self.descriptor.index);
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!("session: failed to close device on drop: {}", e);
        }
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("descriptor", &self.descriptor)
            .field("config", &self.config)
            .field("shutter_open", &self.is_shutter_open())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockAdapter, MockCall};

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

    fn frame(n: usize) -> Frame {
        (0..n).map(|i| DevicePoint::blank(i as i16, 0)).collect()
    }

    // ==========================================================================
    // Config Tests
    // ==========================================================================

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.points_per_second, 15_000);
        assert_eq!(config.repeat_count, REPEAT_FOREVER);
        assert_eq!(config.ready_timeout, Duration::from_millis(300));
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.max_polls(), 300);
    }

    #[test]
    fn test_max_polls_is_at_least_one() {
        let config = SessionConfig::default().with_ready_timeout(Duration::ZERO);
        assert_eq!(config.max_polls(), 1);
    }

    #[test]
    fn test_invalid_config_rejected_before_enumerate() {
        let mock = MockAdapter::with_devices(1);
        let err = DeviceSession::builder(mock.clone())
            .config(SessionConfig::default().with_points_per_second(0))
            .open()
            .unwrap_err();
        assert!(err.is_config());
        assert!(mock.calls().is_empty());
    }

    // ==========================================================================
    // Open Tests
    // ==========================================================================

    #[test]
    fn test_open_selects_index() {
        let mock = MockAdapter::with_devices(3);
        let session = DeviceSession::builder(mock.clone())
            .device_index(2)
            .open()
            .unwrap();
        assert_eq!(session.descriptor().name, "mock-2");
        assert_eq!(mock.calls(), vec![MockCall::Enumerate, MockCall::Open(2)]);
    }

    #[test]
    fn test_open_with_chooser() {
        let mock = MockAdapter::with_devices(3);
        let session = DeviceSession::builder(mock.clone())
            .device_chooser(|devices| devices.len() - 1)
            .open()
            .unwrap();
        assert_eq!(session.descriptor().index, 2);
    }

    #[test]
    fn test_open_without_devices() {
        let err = DeviceSession::builder(MockAdapter::with_devices(0))
            .open()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_open_index_out_of_range() {
        let mock = MockAdapter::with_devices(2);
        let err = DeviceSession::builder(mock.clone())
            .device_index(2)
            .open()
            .unwrap_err();
        assert!(err.is_config());
        assert!(!mock.is_open());
    }

    #[test]
    fn test_enumerate_rejected_by_adapter() {
        let mock = MockAdapter::with_devices(1).fail_enumerate(-4);
        let err = DeviceSession::builder(mock.clone()).open().unwrap_err();
        match err {
            Error::Device(DeviceError::Rejected { op, code }) => {
                assert_eq!(op, DeviceOp::Enumerate);
                assert_eq!(code, -4);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(mock.calls(), vec![MockCall::Enumerate]);
    }

    #[test]
    fn test_open_rejected_by_adapter() {
        let mock = MockAdapter::with_devices(1).fail_open(-3);
        let err = DeviceSession::builder(mock).open().unwrap_err();
        match err {
            Error::Device(DeviceError::Rejected { op, code }) => {
                assert_eq!(op, DeviceOp::Open);
                assert_eq!(code, -3);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    // ==========================================================================
    // Write Tests
    // ==========================================================================

    #[test]
    fn test_write_passes_rate_and_repeat() {
        let mock = MockAdapter::with_devices(1);
        let session = DeviceSession::builder(mock.clone())
            .config(fast_config().with_points_per_second(30_000).with_repeat_count(2))
            .open()
            .unwrap();

        session.write_frame(&frame(4)).unwrap();
        let writes: Vec<_> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Write { .. }))
            .collect();
        assert_eq!(writes.len(), 1);
        match &writes[0] {
            MockCall::Write {
                points,
                points_per_second,
                repeat_count,
            } => {
                assert_eq!(points.len(), 4);
                assert_eq!(*points_per_second, 30_000);
                assert_eq!(*repeat_count, 2);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_write_polls_until_ready() {
        let mock = MockAdapter::with_devices(1).busy_for(3);
        let session = DeviceSession::builder(mock.clone())
            .config(fast_config().with_ready_timeout(Duration::from_millis(10)))
            .open()
            .unwrap();

        session.write_frame(&frame(1)).unwrap();
        assert_eq!(mock.count_calls(|c| *c == MockCall::Status), 4);
        assert_eq!(mock.written_frames().len(), 1);
    }

    #[test]
    fn test_write_times_out() {
        let mock = MockAdapter::with_devices(1).never_ready();
        let session = open(&mock);

        let err = session.write_frame(&frame(1)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(mock.count_calls(|c| *c == MockCall::Status), 5);
        assert!(mock.written_frames().is_empty());
    }

    #[test]
    fn test_error_status_is_rejected() {
        let mock = MockAdapter::with_devices(1).report_error();
        let session = open(&mock);

        match session.write_frame(&frame(1)).unwrap_err() {
            Error::Device(DeviceError::Rejected { op, .. }) => assert_eq!(op, DeviceOp::Status),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(mock.count_calls(|c| *c == MockCall::Status), 1);
    }

    #[test]
    fn test_empty_frame_rejected() {
        let mock = MockAdapter::with_devices(1);
        let session = open(&mock);
        let err = session.write_frame(&Frame::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::EmptyFrame)));
        assert_eq!(mock.count_calls(|c| *c == MockCall::Status), 0);
    }

    #[test]
    fn test_park_writes_single_blank() {
        let mock = MockAdapter::with_devices(1);
        let session = open(&mock);
        session.park().unwrap();
        assert_eq!(mock.written_frames(), vec![vec![DevicePoint::blank(0, 0)]]);
    }

    // ==========================================================================
    // Shutter Tests
    // ==========================================================================

    #[test]
    fn test_shutter_follows_holds() {
        let mock = MockAdapter::with_devices(1);
        let session = open(&mock);

        let a = session.open_shutter().unwrap();
        let b = session.open_shutter().unwrap();
        assert!(mock.shutter_open());
        assert!(session.is_shutter_open());

        drop(a);
        assert!(mock.shutter_open());
        drop(b);
        assert!(!mock.shutter_open());
        assert!(!session.is_shutter_open());

        assert_eq!(mock.count_calls(|c| *c == MockCall::Shutter(true)), 1);
        assert_eq!(mock.count_calls(|c| *c == MockCall::Shutter(false)), 1);
    }

    #[test]
    fn test_failed_shutter_open_leaves_guard_inactive() {
        let mock = MockAdapter::with_devices(1).fail_shutter(-2);
        let session = open(&mock);

        let err = session.open_shutter().unwrap_err();
        assert!(err.is_rejected());
        assert!(!session.is_shutter_open());

        mock.heal_shutter();
        let _hold = session.open_shutter().unwrap();
        assert!(mock.shutter_open());
    }

    #[test]
    fn test_write_with_shutter_uses_temporary_hold() {
        let mock = MockAdapter::with_devices(1);
        let session = open(&mock);

        session.write_frame_with_shutter(&frame(2)).unwrap();
        assert!(!session.is_shutter_open());
        let shutter_calls: Vec<_> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Shutter(_) | MockCall::Write { .. }))
            .map(|c| match c {
                MockCall::Shutter(open) => if open { "open" } else { "close" },
                _ => "write",
            })
            .collect();
        assert_eq!(shutter_calls, vec!["open", "write", "close"]);
    }

    #[test]
    fn test_write_with_shutter_keeps_existing_hold() {
        let mock = MockAdapter::with_devices(1);
        let session = open(&mock);
        let _hold = session.open_shutter().unwrap();

        session.write_frame_with_shutter(&frame(2)).unwrap();
        assert!(session.is_shutter_open());
        assert!(mock.shutter_open());
        assert_eq!(mock.count_calls(|c| matches!(c, MockCall::Shutter(_))), 1);
    }

    #[test]
    fn test_failed_write_with_shutter_restores_state() {
        let mock = MockAdapter::with_devices(1).fail_writes(STATUS_ERROR);
        let session = open(&mock);

        assert!(session.write_frame_with_shutter(&frame(1)).unwrap_err().is_rejected());
        assert!(!session.is_shutter_open());
        assert!(!mock.shutter_open());
    }

    // ==========================================================================
    // Lifecycle Tests
    // ==========================================================================

    #[test]
    fn test_close_twice_is_invalid_state() {
        let mock = MockAdapter::with_devices(1);
        let mut session = open(&mock);
        session.close().unwrap();
        assert!(session.is_closed());
        assert!(!mock.is_open());
        assert!(session.close().unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_use_after_close_is_invalid_state() {
        let mock = MockAdapter::with_devices(1);
        let mut session = open(&mock);
        session.close().unwrap();

        assert!(session.write_frame(&frame(1)).unwrap_err().is_invalid_state());
        assert!(session.open_shutter().unwrap_err().is_invalid_state());
        assert!(session.status().unwrap_err().is_invalid_state());
        assert!(session.park().unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_close_forces_shutter_shut() {
        let mock = MockAdapter::with_devices(1);
        let mut session = open(&mock);
        let hold = session.open_shutter().unwrap();

        session.close().unwrap();
        assert!(!mock.shutter_open());

        // Releasing after close does not touch the device
        drop(hold);
        assert_eq!(mock.count_calls(|c| *c == MockCall::Shutter(false)), 1);
    }

    #[test]
    fn test_close_attempts_every_step() {
        let mock = MockAdapter::with_devices(1);
        let mut session = open(&mock);
        let _hold = session.open_shutter().unwrap();
        let mock = mock.fail_shutter(-5);

        assert!(session.close().unwrap_err().is_rejected());
        assert!(session.is_closed());
        assert!(!mock.is_open());
        let calls = mock.calls();
        let tail = &calls[calls.len() - 3..];
        assert!(matches!(tail[0], MockCall::Shutter(false)));
        assert_eq!(tail[1], MockCall::Stop);
        assert!(matches!(tail[2], MockCall::Close(_)));
    }

    #[test]
    fn test_failed_close_still_releases_handle() {
        let mock = MockAdapter::with_devices(1).fail_close(-6);
        let mut session = open(&mock);

        match session.close().unwrap_err() {
            Error::Device(DeviceError::Rejected { op, code }) => {
                assert_eq!(op, DeviceOp::Close);
                assert_eq!(code, -6);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(session.is_closed());
        assert!(!mock.is_open());
        assert!(session.close().unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_failed_close_on_drop_is_not_fatal() {
        let mock = MockAdapter::with_devices(1).fail_close(-6);
        let session = open(&mock);
        let _hold = session.open_shutter().unwrap();
        drop(session);

        assert!(!mock.is_open());
        assert!(!mock.shutter_open());
        let calls = mock.calls();
        let tail = &calls[calls.len() - 3..];
        assert_eq!(tail[0], MockCall::Shutter(false));
        assert_eq!(tail[1], MockCall::Stop);
        assert!(matches!(tail[2], MockCall::Close(_)));
    }

    #[test]
    fn test_drop_closes_handle() {
        let mock = MockAdapter::with_devices(1);
        let session = open(&mock);
        drop(session);
        assert!(!mock.is_open());
        assert_eq!(mock.count_calls(|c| matches!(c, MockCall::Close(_))), 1);
    }

    #[test]
    fn test_drop_after_close_does_not_close_again() {
        let mock = MockAdapter::with_devices(1);
        let mut session = open(&mock);
        session.close().unwrap();
        drop(session);
        assert_eq!(mock.count_calls(|c| matches!(c, MockCall::Close(_))), 1);
    }

    #[test]
    fn test_hold_outliving_session() {
        let mock = MockAdapter::with_devices(1);
        let session = open(&mock);
        let mut hold = session.open_shutter().unwrap();
        drop(session);

        assert!(hold.release().unwrap_err().is_invalid_state());
        drop(hold);
    }

    #[test]
    fn test_reopen() {
        let mock = MockAdapter::with_devices(1);
        let mut session = open(&mock);
        assert!(session.reopen().unwrap_err().is_invalid_state());

        session.close().unwrap();
        session.reopen().unwrap();
        assert!(!session.is_closed());
        assert!(mock.is_open());
        session.write_frame(&frame(1)).unwrap();
    }

    #[test]
    fn test_reopen_with_outstanding_hold() {
        let mock = MockAdapter::with_devices(1);
        let mut session = open(&mock);
        let hold = session.open_shutter().unwrap();
        session.close().unwrap();

        assert!(session.reopen().unwrap_err().is_invalid_state());
        drop(hold);
        session.reopen().unwrap();
    }
}
