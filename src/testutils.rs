//! In-memory device adapter for tests.
//!
//! Only available with the `testutils` feature (always on for this crate's
//! own unit tests).
//!
//! [`MockAdapter`] is cheap to clone; clones share state, so a test can hand
//! one clone to a session and inspect the recorded calls through another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::device::{
    check_status, DeviceAdapter, DeviceDescriptor, DeviceHandle, DeviceStatus, STATUS_OK,
};
use crate::error::{DeviceOp, Result};
use crate::types::DevicePoint;

/// A call received by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Enumerate,
    Open(usize),
    Close(DeviceHandle),
    Status,
    Write {
        points: Vec<DevicePoint>,
        points_per_second: u32,
        repeat_count: i32,
    },
    Shutter(bool),
    Stop,
}

#[derive(Debug)]
struct MockState {
    devices: Vec<DeviceDescriptor>,
    calls: Vec<MockCall>,
    busy_polls: usize,
    never_ready: bool,
    report_error: bool,
    enumerate_code: i32,
    open_code: i32,
    write_code: i32,
    shutter_code: i32,
    close_code: i32,
    open_handle: Option<DeviceHandle>,
    next_handle: u32,
    shutter_open: bool,
}

/// Scriptable [`DeviceAdapter`] that records every call.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockAdapter {
    /// Creates a mock exposing `device_count` devices named `mock-0`, `mock-1`, ...
    pub fn with_devices(device_count: usize) -> Self {
        let devices = (0..device_count)
            .map(|i| DeviceDescriptor::new(i, format!("mock-{}", i)))
            .collect();
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices,
                calls: Vec::new(),
                busy_polls: 0,
                never_ready: false,
                report_error: false,
                enumerate_code: STATUS_OK,
                open_code: STATUS_OK,
                write_code: STATUS_OK,
                shutter_code: STATUS_OK,
                close_code: STATUS_OK,
                open_handle: None,
                next_handle: 1,
                shutter_open: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report `Busy` for the next `polls` status queries, then `Ready`.
    pub fn busy_for(self, polls: usize) -> Self {
        self.state().busy_polls = polls;
        self
    }

    /// Report `Busy` forever.
    pub fn never_ready(self) -> Self {
        self.state().never_ready = true;
        self
    }

    /// Report `Error` from every status query.
    pub fn report_error(self) -> Self {
        self.state().report_error = true;
        self
    }

    /// Make `enumerate` return the given status code.
    pub fn fail_enumerate(self, code: i32) -> Self {
        self.state().enumerate_code = code;
        self
    }

    /// Make `open` return the given status code.
    pub fn fail_open(self, code: i32) -> Self {
        self.state().open_code = code;
        self
    }

    /// Make `write` return the given status code.
    pub fn fail_writes(self, code: i32) -> Self {
        self.state().write_code = code;
        self
    }

    /// Make `set_shutter` return the given status code.
    pub fn fail_shutter(self, code: i32) -> Self {
        self.state().shutter_code = code;
        self
    }

    /// Make `close` return the given status code.
    pub fn fail_close(self, code: i32) -> Self {
        self.state().close_code = code;
        self
    }

    /// Restore successful shutter calls.
    pub fn heal_shutter(&self) {
        self.state().shutter_code = STATUS_OK;
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Number of calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    /// Points of every accepted write, in order.
    pub fn written_frames(&self) -> Vec<Vec<DevicePoint>> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Write { points, .. } => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether the simulated hardware shutter is open.
    pub fn shutter_open(&self) -> bool {
        self.state().shutter_open
    }

    /// Whether a handle is currently open.
    pub fn is_open(&self) -> bool {
        self.state().open_handle.is_some()
    }
}

impl DeviceAdapter for MockAdapter {
    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let mut state = self.state();
        state.calls.push(MockCall::Enumerate);
        check_status(DeviceOp::Enumerate, state.enumerate_code)?;
        Ok(state.devices.clone())
    }

    fn open(&mut self, index: usize) -> Result<DeviceHandle> {
        let mut state = self.state();
        state.calls.push(MockCall::Open(index));
        check_status(DeviceOp::Open, state.open_code)?;
        let handle = DeviceHandle(state.next_handle);
        state.next_handle += 1;
        state.open_handle = Some(handle);
        Ok(handle)
    }

    fn close(&mut self, handle: DeviceHandle) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::Close(handle));
        // The handle is gone even when the library reports a failure.
        state.open_handle = None;
        check_status(DeviceOp::Close, state.close_code)
    }

    fn status(&mut self, _handle: DeviceHandle) -> Result<DeviceStatus> {
        let mut state = self.state();
        state.calls.push(MockCall::Status);
        if state.report_error {
            return Ok(DeviceStatus::Error);
        }
        if state.never_ready {
            return Ok(DeviceStatus::Busy);
        }
        if state.busy_polls > 0 {
            state.busy_polls -= 1;
            return Ok(DeviceStatus::Busy);
        }
        Ok(DeviceStatus::Ready)
    }

    fn write(
        &mut self,
        _handle: DeviceHandle,
        points: &[DevicePoint],
        points_per_second: u32,
        repeat_count: i32,
    ) -> Result<()> {
        let mut state = self.state();
        check_status(DeviceOp::Write, state.write_code)?;
        state.calls.push(MockCall::Write {
            points: points.to_vec(),
            points_per_second,
            repeat_count,
        });
        Ok(())
    }

    fn set_shutter(&mut self, _handle: DeviceHandle, open: bool) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::Shutter(open));
        check_status(DeviceOp::Shutter { open }, state.shutter_code)?;
        state.shutter_open = open;
        Ok(())
    }

    fn stop(&mut self, _handle: DeviceHandle) -> Result<()> {
        self.state().calls.push(MockCall::Stop);
        Ok(())
    }
}
