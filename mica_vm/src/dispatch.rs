//! Dispatch loop control flow.

use mica_runtime::RuntimeError;

/// What an opcode handler tells the dispatch loop.
#[derive(Debug)]
pub enum ControlFlow {
    /// Proceed to the next instruction (after the preemption check).
    Continue,
    /// Stop dispatch for this VM (STOP, ABORT, top-level return).
    Halt,
    /// Unrecoverable failure: the VM is aborted and reaped with the error's
    /// code word. Only out-of-memory from constructors and structurally
    /// broken code take this path; ordinary misuse prints a diagnostic and
    /// continues.
    Fatal(RuntimeError),
}
