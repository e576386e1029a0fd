//! Transport seam between the session and the physical device.
//!
//! The session talks to a [`Transport`], not to `hidapi` directly, so tests
//! run against [`mock::MockTransport`] with scripted response frames while
//! production uses [`HidTransport`] over the real USB HID connection.

use hid_finch_protocol::{PRODUCT_ID, REPORT_SIZE, VENDOR_ID};
use hidapi::HidApi;

use crate::{SessionError, SessionResult};

/// Blocking 9-byte report transport.
pub trait Transport: Send {
    /// Write one full report.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] when the underlying write fails.
    fn write_report(&mut self, report: &[u8; REPORT_SIZE]) -> SessionResult<usize>;

    /// Block until one full report has been read into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] when the underlying read fails.
    fn read_report(&mut self, buf: &mut [u8; REPORT_SIZE]) -> SessionResult<usize>;
}

/// `hidapi`-backed transport for the physical robot.
pub struct HidTransport {
    device: hidapi::HidDevice,
}

impl HidTransport {
    /// Open the unique device matching the Finch vendor/product pair.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DeviceNotFound`] when no matching device is
    /// present or it is already claimed by another process, and
    /// [`SessionError::Io`] when the HID backend itself fails to
    /// initialize.
    pub fn open() -> SessionResult<Self> {
        let api = HidApi::new().map_err(|e| SessionError::io(e.to_string()))?;
        let device = api
            .open(VENDOR_ID, PRODUCT_ID)
            .map_err(|e| SessionError::DeviceNotFound(e.to_string()))?;
        Ok(Self { device })
    }
}

impl Transport for HidTransport {
    fn write_report(&mut self, report: &[u8; REPORT_SIZE]) -> SessionResult<usize> {
        Ok(self.device.write(report)?)
    }

    fn read_report(&mut self, buf: &mut [u8; REPORT_SIZE]) -> SessionResult<usize> {
        Ok(self.device.read(buf)?)
    }
}

pub mod mock {
    //! Scripted transport for tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory transport: reads pop scripted frames, writes append to a
    /// shared history. Clones share state, so a test can keep one handle
    /// for assertions while the session owns the other across the
    /// keep-alive thread boundary.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        read_queue: Arc<Mutex<VecDeque<[u8; REPORT_SIZE]>>>,
        write_history: Arc<Mutex<Vec<[u8; REPORT_SIZE]>>>,
        fail_writes: Arc<AtomicBool>,
        fail_reads: Arc<AtomicBool>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the next frame the device "sends back".
        pub fn queue_read(&self, frame: [u8; REPORT_SIZE]) {
            let mut queue = self.read_queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.push_back(frame);
        }

        /// Script a response frame with the payload at bytes 0.. and the
        /// echoed tag at byte 7.
        pub fn queue_response(&self, payload: &[u8], tag: u8) {
            let mut frame = [0u8; REPORT_SIZE];
            frame[..payload.len()].copy_from_slice(payload);
            frame[7] = tag;
            self.queue_read(frame);
        }

        pub fn write_history(&self) -> Vec<[u8; REPORT_SIZE]> {
            let history = self.write_history.lock().unwrap_or_else(|e| e.into_inner());
            history.clone()
        }

        /// Total writes seen, the zero-I/O probe for validation tests.
        pub fn write_count(&self) -> usize {
            let history = self.write_history.lock().unwrap_or_else(|e| e.into_inner());
            history.len()
        }

        /// Number of writes carrying the given opcode byte.
        pub fn writes_of(&self, opcode: u8) -> usize {
            let history = self.write_history.lock().unwrap_or_else(|e| e.into_inner());
            history.iter().filter(|frame| frame[1] == opcode).count()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }
    }

    impl Transport for MockTransport {
        fn write_report(&mut self, report: &[u8; REPORT_SIZE]) -> SessionResult<usize> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(SessionError::io("injected write failure"));
            }
            let mut history = self.write_history.lock().unwrap_or_else(|e| e.into_inner());
            history.push(*report);
            Ok(REPORT_SIZE)
        }

        fn read_report(&mut self, buf: &mut [u8; REPORT_SIZE]) -> SessionResult<usize> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(SessionError::io("injected read failure"));
            }
            let mut queue = self.read_queue.lock().unwrap_or_else(|e| e.into_inner());
            let frame = queue
                .pop_front()
                .ok_or_else(|| SessionError::io("no frame queued"))?;
            *buf = frame;
            Ok(REPORT_SIZE)
        }
    }
}
