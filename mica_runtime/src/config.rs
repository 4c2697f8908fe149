//! Capacity and timing constants.
//!
//! These mirror the compile-time tuning knobs an embedder sets for the
//! target hardware. Capacities are deliberately small: the interpreter is
//! sized for tens of kilobytes of pool, not megabytes.

/// Maximum number of concurrently existing VMs.
pub const MAX_VM_COUNT: usize = 5;

/// Register file size per VM.
pub const MAX_REGS_SIZE: usize = 100;

/// Symbol table capacity. The table never shrinks.
pub const MAX_SYMBOLS_COUNT: usize = 300;

/// Milliseconds represented by one scheduler tick.
pub const TICK_UNIT_MS: u32 = 1;

/// Scheduling quantum, in ticks.
pub const TIMESLICE: u32 = 10;
