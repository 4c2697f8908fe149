//! Cooperative multi-VM scheduler.
//!
//! One physical thread executes VMs; time slicing is interrupt-driven.
//! [`SchedulerShared::tick`] is the only code that may run in a timer
//! context: it touches word-sized atomics and a short critical section on
//! the control-block list, nothing else. Everything heavier happens on the
//! run loop's thread.
//!
//! States: Dormant (never runnable again), Ready, Running (at most one),
//! Waiting (parked until a wakeup tick). Priority 0 is highest; equal
//! priorities rotate round-robin. When nothing is ready the loop calls the
//! HAL's idle hook and, unless the host drives ticks itself, advances the
//! tick counter so sleepers make progress.

use crate::vm::{Exec, Vm, VmFlags, VmSignals};
use mica_runtime::config::TIMESLICE;
use mica_runtime::{HalRef, Runtime, WaitReason};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

pub const STATE_DORMANT: u8 = 0;
pub const STATE_READY: u8 = 1;
pub const STATE_RUNNING: u8 = 2;
pub const STATE_WAITING: u8 = 3;

// =============================================================================
// Control blocks
// =============================================================================

/// Per-task state shared with the tick context.
#[derive(Debug)]
pub struct TaskCtrl {
    pub state: AtomicU8,
    pub priority: u8,
    wakeup: AtomicU32,
    slice: AtomicU32,
    signals: Arc<VmSignals>,
}

/// Scheduler state shared with the tick context.
#[derive(Debug, Default)]
pub struct SchedulerShared {
    tick: AtomicU32,
    ctrls: Mutex<Vec<Arc<TaskCtrl>>>,
}

impl SchedulerShared {
    /// Current tick count.
    #[inline]
    pub fn now(&self) -> u32 {
        self.tick.load(Ordering::Acquire)
    }

    /// One scheduling unit: age the running task's quantum, promote due
    /// sleepers, and preempt the running task when its quantum is spent or
    /// a higher-priority sleeper woke up. Signal-safe by construction.
    pub fn tick(&self) {
        let now = self.tick.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        let ctrls = self.ctrls.lock();

        let mut promoted: Option<u8> = None;
        for c in ctrls.iter() {
            match c.state.load(Ordering::Acquire) {
                STATE_RUNNING => {
                    let s = c.slice.load(Ordering::Acquire);
                    if s > 0 {
                        c.slice.store(s - 1, Ordering::Release);
                        if s == 1 {
                            c.signals.set_preempt();
                        }
                    }
                }
                STATE_WAITING => {
                    if due(c.wakeup.load(Ordering::Acquire), now) {
                        c.state.store(STATE_READY, Ordering::Release);
                        promoted = Some(promoted.map_or(c.priority, |p| p.min(c.priority)));
                    }
                }
                _ => {}
            }
        }

        if let Some(p) = promoted {
            for c in ctrls.iter() {
                if c.state.load(Ordering::Acquire) == STATE_RUNNING && c.priority > p {
                    c.signals.set_preempt();
                }
            }
        }
    }
}

/// Wrapping "deadline reached" test.
#[inline]
fn due(wakeup: u32, now: u32) -> bool {
    now.wrapping_sub(wakeup) < u32::MAX / 2
}

// =============================================================================
// Scheduler
// =============================================================================

struct Task {
    vm: Vm,
    ctrl: Arc<TaskCtrl>,
}

/// Owns the tasks and the run loop.
pub struct Scheduler {
    tasks: Vec<Task>,
    shared: Arc<SchedulerShared>,
    hal: HalRef,
    /// One bit per live VM id; bit n = id n+1.
    vm_id_bits: u32,
    rr_cursor: usize,
    /// Set when the host drives `tick` itself (timer thread or ISR shim);
    /// the idle path then stops self-ticking.
    external_ticker: bool,
    error: u32,
}

impl Scheduler {
    pub fn new(hal: HalRef) -> Scheduler {
        Scheduler {
            tasks: Vec::new(),
            shared: Arc::new(SchedulerShared::default()),
            hal,
            vm_id_bits: 0,
            rr_cursor: 0,
            external_ticker: false,
            error: 0,
        }
    }

    /// Handle for timer threads.
    pub fn shared(&self) -> Arc<SchedulerShared> {
        self.shared.clone()
    }

    /// Mark that the host calls `tick` from its own timer.
    pub fn set_external_ticker(&mut self) {
        self.external_ticker = true;
    }

    /// Advance one scheduling unit (host-driven tick entry point).
    pub fn tick(&self) {
        self.shared.tick();
    }

    // =========================================================================
    // Task management
    // =========================================================================

    /// Claim a free VM id from the bitmap (ids start at 1).
    pub fn alloc_vm_id(&mut self) -> Option<u8> {
        let max = mica_runtime::config::MAX_VM_COUNT as u32;
        for n in 0..max {
            if self.vm_id_bits & (1 << n) == 0 {
                self.vm_id_bits |= 1 << n;
                return Some((n + 1) as u8);
            }
        }
        None
    }

    /// Return a VM id to the bitmap.
    pub fn free_vm_id(&mut self, id: u8) {
        if id >= 1 {
            self.vm_id_bits &= !(1 << (id - 1) as u32);
        }
    }

    /// Register a VM as a ready task.
    pub fn spawn(&mut self, vm: Vm, priority: u8) {
        let ctrl = Arc::new(TaskCtrl {
            state: AtomicU8::new(STATE_READY),
            priority,
            wakeup: AtomicU32::new(0),
            slice: AtomicU32::new(TIMESLICE),
            signals: vm.signals.clone(),
        });
        self.shared.ctrls.lock().push(ctrl.clone());
        self.tasks.push(Task { vm, ctrl });
    }

    /// Number of tasks that can still run.
    pub fn live_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.ctrl.state.load(Ordering::Acquire) != STATE_DORMANT)
            .count()
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    /// Run until every task is dormant. Returns the first nonzero error
    /// word any VM died with, else 0.
    pub fn run(&mut self, rt: &mut Runtime) -> u32 {
        loop {
            let Some(idx) = self.pick_next() else {
                if self.live_tasks() == 0 {
                    break;
                }
                self.hal.idle_cpu();
                if !self.external_ticker {
                    self.shared.tick();
                }
                continue;
            };

            let task = &mut self.tasks[idx];
            task.ctrl.state.store(STATE_RUNNING, Ordering::Release);
            task.ctrl.slice.store(TIMESLICE, Ordering::Release);

            let exec = task.vm.run(rt);
            match exec {
                Exec::Halted => self.teardown(rt, idx),
                Exec::Preempted => {
                    if self.tasks[idx].vm.error_code != 0 {
                        // A built-in flagged an unrecoverable failure.
                        self.teardown(rt, idx);
                    } else if let Some(WaitReason::Ticks(t)) = self.tasks[idx].vm.wait.take() {
                        let ctrl = &self.tasks[idx].ctrl;
                        ctrl.wakeup.store(
                            self.shared.now().wrapping_add(t.max(1)),
                            Ordering::Release,
                        );
                        ctrl.state.store(STATE_WAITING, Ordering::Release);
                    } else {
                        self.tasks[idx].ctrl.state.store(STATE_READY, Ordering::Release);
                    }
                }
            }
            self.rr_cursor = idx + 1;
        }
        self.error
    }

    /// Highest-priority ready task; equal priorities rotate from the
    /// cursor.
    fn pick_next(&self) -> Option<usize> {
        let n = self.tasks.len();
        if n == 0 {
            return None;
        }
        let mut best: Option<(u8, usize, usize)> = None; // (prio, rotation, index)
        for i in 0..n {
            let t = &self.tasks[i];
            if t.ctrl.state.load(Ordering::Acquire) != STATE_READY {
                continue;
            }
            let rotation = (i + n - self.rr_cursor % n) % n;
            let key = (t.ctrl.priority, rotation, i);
            if best.map_or(true, |b| (key.0, key.1) < (b.0, b.1)) {
                best = Some(key);
            }
        }
        best.map(|(_, _, i)| i)
    }

    /// Reap a finished VM: release its registers, protect globally-escaped
    /// values, sweep everything it still owns, recycle its id.
    fn teardown(&mut self, rt: &mut Runtime, idx: usize) {
        let task = &mut self.tasks[idx];
        let vm_id = task.vm.id;

        if !task.vm.flags.contains(VmFlags::REGS_RELEASED) {
            task.vm.release_all_regs(rt);
        }
        rt.clear_global_vm_ids();
        rt.heap.free_all(&mut rt.pool, vm_id);
        rt.pool.free_all(vm_id);

        task.ctrl.state.store(STATE_DORMANT, Ordering::Release);
        if self.error == 0 {
            self.error = task.vm.error_code;
        }
        self.free_vm_id(vm_id);
    }

    /// Drop every task and recycle all VM ids (host-level cleanup).
    pub fn cleanup(&mut self, rt: &mut Runtime) {
        for idx in 0..self.tasks.len() {
            if self.tasks[idx].ctrl.state.load(Ordering::Acquire) != STATE_DORMANT {
                self.teardown(rt, idx);
            }
        }
        self.tasks.clear();
        self.shared.ctrls.lock().clear();
        self.vm_id_bits = 0;
        self.rr_cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn vm_ids_come_from_a_bitmap() {
        let mut s = Scheduler::new(Arc::new(mica_runtime::CaptureHal::new()));
        let a = s.alloc_vm_id().unwrap();
        let b = s.alloc_vm_id().unwrap();
        assert_eq!((a, b), (1, 2));
        s.free_vm_id(a);
        assert_eq!(s.alloc_vm_id(), Some(1));
    }

    #[test]
    fn vm_id_pool_is_bounded() {
        let mut s = Scheduler::new(Arc::new(mica_runtime::CaptureHal::new()));
        for _ in 0..mica_runtime::config::MAX_VM_COUNT {
            assert!(s.alloc_vm_id().is_some());
        }
        assert_eq!(s.alloc_vm_id(), None);
    }

    #[test]
    fn tick_promotes_due_sleepers() {
        let shared = SchedulerShared::default();
        let ctrl = Arc::new(TaskCtrl {
            state: AtomicU8::new(STATE_WAITING),
            priority: 0,
            wakeup: AtomicU32::new(2),
            slice: AtomicU32::new(TIMESLICE),
            signals: crate::vm::VmSignals::new(),
        });
        shared.ctrls.lock().push(ctrl.clone());

        shared.tick(); // now = 1, not due
        assert_eq!(ctrl.state.load(Ordering::Acquire), STATE_WAITING);
        shared.tick(); // now = 2, due
        assert_eq!(ctrl.state.load(Ordering::Acquire), STATE_READY);
    }

    #[test]
    fn tick_preempts_exhausted_quantum() {
        let shared = SchedulerShared::default();
        let signals = crate::vm::VmSignals::new();
        let ctrl = Arc::new(TaskCtrl {
            state: AtomicU8::new(STATE_RUNNING),
            priority: 0,
            wakeup: AtomicU32::new(0),
            slice: AtomicU32::new(2),
            signals: signals.clone(),
        });
        shared.ctrls.lock().push(ctrl);

        shared.tick();
        assert!(!signals.take_preempt());
        shared.tick();
        assert!(signals.take_preempt());
    }
}
