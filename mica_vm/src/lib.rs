//! Register-based bytecode VM with a cooperative multi-VM scheduler.
//!
//! This crate executes RITE containers produced by the external compiler:
//!
//! - **Dispatch** ([`vm`], [`ops`]): a register-window interpreter over the
//!   fixed instruction set, preemptible only at instruction boundaries
//! - **Scheduler** ([`scheduler`]): multiple VMs on one thread, priority
//!   queues with round-robin ties, timer-driven time slicing
//! - **Built-ins** ([`builtins`]): the standard method library plus the
//!   host registration surface
//! - **Embedding** ([`Interp`]): the host-facing API
//!
//! # Example
//!
//! ```ignore
//! let mut interp = Interp::new(40 * 1024);
//! interp.define_method("blink", |ctx| { /* toggle a GPIO */ });
//! interp.create_task(BYTECODE, 0)?;
//! let err = interp.run();   // 0 = every task halted cleanly
//! ```

pub mod builtins;
pub mod dispatch;
pub mod ops;
pub mod scheduler;
pub mod vm;

pub use dispatch::ControlFlow;
pub use scheduler::{Scheduler, SchedulerShared};
pub use vm::{CallInfo, Exec, Vm, VmFlags, VmSignals};

use mica_bytecode::LoadError;
use mica_runtime::{BuiltinFn, HalRef, Runtime, RuntimeError, Statistics};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// The embeddable interpreter: one runtime, one scheduler, up to
/// `MAX_VM_COUNT` concurrent tasks.
pub struct Interp {
    rt: Runtime,
    sched: Scheduler,
}

impl Interp {
    /// Build an interpreter over a fresh memory pool of `pool_size` bytes.
    pub fn new(pool_size: usize) -> Interp {
        Interp::with_hal(pool_size, Arc::new(mica_runtime::StdHal))
    }

    /// Build an interpreter with a host-supplied HAL.
    pub fn with_hal(pool_size: usize, hal: HalRef) -> Interp {
        let mut rt = Runtime::with_hal(pool_size, hal.clone());
        builtins::install(&mut rt);
        Interp {
            rt,
            sched: Scheduler::new(hal),
        }
    }

    /// Register a host built-in on the root class, callable from every
    /// task.
    pub fn define_method(&mut self, name: &str, f: BuiltinFn) {
        builtins::define(&mut self.rt, mica_runtime::object::registry::OBJECT, name, f);
    }

    /// Load a bytecode blob and register it as a ready task.
    pub fn create_task(&mut self, bytecode: &[u8], priority: u8) -> Result<(), RuntimeError> {
        let irep = mica_bytecode::load(bytecode)
            .map_err(|e: LoadError| RuntimeError::BytecodeFormat(e.to_string()))?;
        let Some(vm_id) = self.sched.alloc_vm_id() else {
            return Err(RuntimeError::TypeError("too many tasks".into()));
        };
        // Charge the pool for the loaded code, tagged with the owning VM so
        // teardown reclaims it.
        let footprint = irep.memory_footprint();
        if self.rt.pool.alloc(vm_id, footprint).is_none() {
            self.sched.free_vm_id(vm_id);
            return Err(RuntimeError::OutOfMemory);
        }
        let vm = Vm::new(vm_id, Arc::new(irep));
        self.sched.spawn(vm, priority);
        Ok(())
    }

    /// Run until every task halts. Returns 0 on a clean halt, else the
    /// first VM error word observed.
    pub fn run(&mut self) -> u32 {
        self.sched.run(&mut self.rt)
    }

    /// Advance the scheduler by one tick (host timer entry point).
    pub fn tick(&self) {
        self.sched.tick();
    }

    /// Spawn a background thread ticking every `period`. The thread stops
    /// when the interpreter is dropped.
    pub fn start_ticker(&mut self, period: Duration) {
        self.sched.set_external_ticker();
        let weak: Weak<SchedulerShared> = Arc::downgrade(&self.sched.shared());
        std::thread::spawn(move || loop {
            std::thread::sleep(period);
            match weak.upgrade() {
                Some(shared) => shared.tick(),
                None => break,
            }
        });
    }

    /// Pool usage snapshot.
    pub fn statistics(&self) -> Statistics {
        self.rt.statistics()
    }

    /// Tear down every task and recycle all VM ids.
    pub fn cleanup(&mut self) {
        self.sched.cleanup(&mut self.rt);
    }

    /// Shared-state access for embedders extending the class hierarchy.
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.rt
    }

    /// Read-only runtime access.
    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }
}

/// Convenience: load one blob, run it to completion, return the error
/// word.
pub fn run(bytecode: &[u8], pool_size: usize) -> Result<u32, RuntimeError> {
    let mut interp = Interp::new(pool_size);
    interp.create_task(bytecode, 0)?;
    Ok(interp.run())
}

pub use mica_bytecode::{dump, load, Irep};
pub use mica_runtime::{BuiltinCall, CaptureHal, Hal, StdHal, Value};
