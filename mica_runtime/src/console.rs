//! Console output, routed through the HAL.
//!
//! Runtime diagnostics and the `puts`/`print`/`p` built-ins all land here,
//! so a capturing HAL sees everything the interpreter says.

use crate::hal::HalRef;

const CONSOLE_FD: i32 = 1;

/// Byte-oriented console over the host HAL.
#[derive(Clone)]
pub struct Console {
    hal: HalRef,
}

impl Console {
    pub fn new(hal: HalRef) -> Console {
        Console { hal }
    }

    pub fn write(&self, bytes: &[u8]) {
        self.hal.write(CONSOLE_FD, bytes);
    }

    pub fn print(&self, s: &str) {
        self.write(s.as_bytes());
    }

    pub fn putchar(&self, c: u8) {
        self.write(&[c]);
    }

    /// Diagnostic line (undefined method, uninitialized constant, ...).
    pub fn diag(&self, msg: std::fmt::Arguments<'_>) {
        self.print(&format!("{}\n", msg));
    }

    pub fn flush(&self) {
        self.hal.flush(CONSOLE_FD);
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Console")
    }
}
