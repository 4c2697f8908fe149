//! Hardware abstraction layer.
//!
//! The interpreter touches the outside world through this trait only:
//! console bytes go out via `write`/`flush`, and the scheduler parks the
//! CPU via `idle_cpu` when no task is ready. Hosts on real hardware supply
//! their UART and WFI here; the default implementation targets a POSIX-ish
//! std environment.

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Host hooks required by the interpreter.
pub trait Hal: Send + Sync {
    /// Write bytes to a descriptor (1 = console out).
    fn write(&self, fd: i32, buf: &[u8]) -> i32;

    /// Flush a descriptor.
    fn flush(&self, fd: i32) -> i32;

    /// Nothing to run: yield the CPU for about one tick.
    fn idle_cpu(&self);

    /// One-time hardware setup (timers, UART). Default: nothing.
    fn init(&self) {}

    /// Critical-section hooks for hosts whose tick source is a real
    /// interrupt. The std scheduler synchronizes with locks instead, so
    /// the defaults do nothing.
    fn enable_irq(&self) {}
    fn disable_irq(&self) {}
}

/// Shared handle to the host HAL.
pub type HalRef = Arc<dyn Hal>;

/// Default std-backed HAL.
#[derive(Debug, Default)]
pub struct StdHal;

impl Hal for StdHal {
    fn write(&self, _fd: i32, buf: &[u8]) -> i32 {
        let mut out = std::io::stdout().lock();
        match out.write_all(buf) {
            Ok(()) => buf.len() as i32,
            Err(_) => -1,
        }
    }

    fn flush(&self, _fd: i32) -> i32 {
        let mut out = std::io::stdout().lock();
        match out.flush() {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    fn idle_cpu(&self) {
        std::thread::sleep(Duration::from_millis(crate::config::TICK_UNIT_MS as u64));
    }
}

/// HAL that records console output, for tests and headless hosts.
#[derive(Debug, Default)]
pub struct CaptureHal {
    buf: Mutex<Vec<u8>>,
}

impl CaptureHal {
    pub fn new() -> CaptureHal {
        CaptureHal::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl Hal for CaptureHal {
    fn write(&self, _fd: i32, buf: &[u8]) -> i32 {
        self.buf.lock().extend_from_slice(buf);
        buf.len() as i32
    }

    fn flush(&self, _fd: i32) -> i32 {
        0
    }

    fn idle_cpu(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_hal_records() {
        let hal = CaptureHal::new();
        hal.write(1, b"hello ");
        hal.write(1, b"world");
        assert_eq!(hal.contents(), "hello world");
    }
}
