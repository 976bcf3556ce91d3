//! Captures kernel error text and re-raises it as a host error.
//!
//! The kernel reports errors by writing them to its error stream. Once
//! [`ErrorBridge::install`] has replaced that stream with a capture buffer,
//! [`ErrorBridge::capture`] turns a failed kernel call into
//! [`HostError::ErrorException`] carrying exactly the text the kernel wrote.
//!
//! Translation can be switched off per thread, e.g. while the kernel itself
//! is expected to handle an error. The host error then only carries the
//! kernel's message. The buffer is reset in both cases.

use std::{
    cell::{Cell, RefCell},
    io::{self, Write},
    rc::Rc,
};

use log::debug;

use crate::{
    host::error::HostError,
    kernel::{Kernel, error::KernelError},
};

thread_local! {
    static ERROR_HANDLER_ENABLED: Cell<bool> = const { Cell::new(true) };
}

pub fn error_handler_enabled() -> bool {
    ERROR_HANDLER_ENABLED.with(Cell::get)
}

/// Switches error translation on or off and returns the previous state.
pub fn set_error_handler_enabled(enabled: bool) -> bool {
    ERROR_HANDLER_ENABLED.with(|flag| flag.replace(enabled))
}

/// Disables error translation until the returned guard is dropped.
pub fn suppress_error_handler() -> SuppressGuard {
    SuppressGuard {
        previous: set_error_handler_enabled(false),
    }
}

#[must_use = "the handler is re-enabled as soon as the guard is dropped"]
pub struct SuppressGuard {
    previous: bool,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        set_error_handler_enabled(self.previous);
    }
}

/// In-memory error stream shared between the kernel and the bridge.
///
/// Every raise writes one record and then flushes, so a flush closes the
/// current record. Text from errors that escaped without being captured
/// stays in front of the latest record.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Rc<RefCell<CaptureState>>);

#[derive(Debug, Default)]
struct CaptureState {
    bytes: Vec<u8>,
    record_start: usize,
    record_open: bool,
}

impl CaptureBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow().bytes).into_owned()
    }

    /// Text of the most recent record.
    pub fn last_record(&self) -> String {
        let state = self.0.borrow();
        String::from_utf8_lossy(&state.bytes[state.record_start..]).into_owned()
    }

    /// Bytes written before the most recent record.
    pub fn stale_len(&self) -> usize {
        self.0.borrow().record_start
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().bytes.is_empty()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.0.borrow_mut();
        if !state.record_open {
            state.record_start = state.bytes.len();
            state.record_open = true;
        }
        state.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().record_open = false;
        Ok(())
    }
}

#[derive(Debug)]
pub struct ErrorBridge {
    buffer: RefCell<CaptureBuffer>,
}

impl ErrorBridge {
    /// Installs a fresh capture buffer as the kernel's error stream.
    pub fn install(kernel: &mut Kernel) -> ErrorBridge {
        let buffer = CaptureBuffer::default();
        kernel.set_error_output(Box::new(buffer.clone()));
        ErrorBridge {
            buffer: RefCell::new(buffer),
        }
    }

    /// Text written to the current buffer and not yet captured.
    pub fn pending_text(&self) -> String {
        self.buffer.borrow().text()
    }

    /// Swaps in an empty buffer and returns the old one.
    fn reset(&self, kernel: &mut Kernel) -> CaptureBuffer {
        let fresh = CaptureBuffer::default();
        kernel.set_error_output(Box::new(fresh.clone()));
        self.buffer.replace(fresh)
    }

    /// Translates a kernel error into a host error.
    ///
    /// The buffer is reset either way. Only the record written for `error`
    /// is reported; text left by errors that were never captured is dropped.
    pub fn capture<T>(
        &self,
        kernel: &mut Kernel,
        result: Result<T, KernelError>,
    ) -> Result<T, HostError> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        let buffer = self.reset(kernel);
        if buffer.stale_len() > 0 {
            debug!("dropping {} bytes of uncaptured error text", buffer.stale_len());
        }
        if !error_handler_enabled() {
            return Err(HostError::ErrorException(error.message));
        }
        let text = if buffer.is_empty() {
            format!("{}\n", error)
        } else {
            buffer.last_record()
        };
        debug!("captured kernel error: {}", text.trim_end());
        Err(HostError::ErrorException(text))
    }
}
