//! Per-VM execution state and the instruction dispatch loop.
//!
//! A VM owns a fixed register file and executes one IREP tree. The active
//! call frame is a contiguous window into the file starting at `current`;
//! register 0 of any window is `self`. Saved frames live on the call-info
//! stack; a method call advances the window by the send's A operand, so
//! caller argument slots become the callee's low registers without copying.
//!
//! Dispatch is cooperative: the loop checks the preemption flag between
//! instructions and nowhere else, so a context switch can only happen at an
//! instruction boundary. The flag is set by the scheduler tick (from a
//! timer context) or by a built-in that parks the VM.
//!
//! Procs capture no environment: upvar access walks live call-info frames.
//! A proc used after its defining frame returned is undefined behavior.

use crate::dispatch::ControlFlow;
use crate::ops;
use bitflags::bitflags;
use mica_bytecode::{Instruction, Irep, Opcode};
use mica_runtime::config::MAX_REGS_SIZE;
use mica_runtime::object::registry;
use mica_runtime::{ClassId, Runtime, RuntimeError, SymId, Value, WaitReason};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// =============================================================================
// Call-info
// =============================================================================

/// Saved frame data enabling return from a method call.
#[derive(Debug)]
pub struct CallInfo {
    /// Caller's window base.
    pub current: usize,
    /// Caller's executing unit.
    pub pc_irep: Arc<Irep>,
    /// Caller's resume point.
    pub pc: usize,
    /// Method symbol of the call (`None` for EXEC/CALL frames).
    pub mid: Option<SymId>,
    /// Argument count the caller passed.
    pub n_args: usize,
    /// Caller's open class.
    pub target_class: ClassId,
}

// =============================================================================
// Signals
// =============================================================================

/// Cross-thread flags for one VM. The scheduler tick may run in a timer
/// thread, so this is the only state it shares with the dispatch loop.
#[derive(Debug, Default)]
pub struct VmSignals {
    preempt: AtomicBool,
}

impl VmSignals {
    pub fn new() -> Arc<VmSignals> {
        Arc::new(VmSignals::default())
    }

    /// Request a dispatch-loop exit at the next instruction boundary.
    #[inline]
    pub fn set_preempt(&self) {
        self.preempt.store(true, Ordering::Release);
    }

    /// Consume the request.
    #[inline]
    pub fn take_preempt(&self) -> bool {
        self.preempt.swap(false, Ordering::AcqRel)
    }
}

bitflags! {
    /// VM lifecycle flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VmFlags: u8 {
        /// Dispatch has finished; the VM is ready for teardown.
        const HALTED = 1 << 0;
        /// STOP already released the register file.
        const REGS_RELEASED = 1 << 1;
    }
}

/// Why the dispatch loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exec {
    /// Preemption flag was set; the VM is still runnable (or parked, when
    /// [`Vm::wait`] is set).
    Preempted,
    /// The VM halted; reap it.
    Halted,
}

// =============================================================================
// VM
// =============================================================================

/// One virtual machine.
#[derive(Debug)]
pub struct Vm {
    /// VM id, also the ownership tag for pool and heap allocations.
    pub id: u8,
    /// Top-level unit (EXEC resolves child bodies against it).
    pub irep: Arc<Irep>,
    /// Currently executing unit.
    pub pc_irep: Arc<Irep>,
    /// Index into `pc_irep.code`.
    pub pc: usize,
    /// Register file.
    pub regs: Box<[Value]>,
    /// Base of the active window.
    pub current: usize,
    /// Saved frames, innermost last.
    pub callinfo: Vec<CallInfo>,
    /// Class currently open for METHOD definitions.
    pub target_class: ClassId,
    /// Nonzero after an unrecoverable failure; the scheduler reaps on it.
    pub error_code: u32,
    pub flags: VmFlags,
    pub signals: Arc<VmSignals>,
    /// Set by a built-in to park this VM; consumed by the scheduler.
    pub wait: Option<WaitReason>,
}

impl Vm {
    /// Create a VM bound to a loaded top-level IREP.
    pub fn new(id: u8, irep: Arc<Irep>) -> Vm {
        let mut vm = Vm {
            id,
            pc_irep: irep.clone(),
            irep,
            pc: 0,
            regs: vec![Value::Nil; MAX_REGS_SIZE].into_boxed_slice(),
            current: 0,
            callinfo: Vec::new(),
            target_class: registry::OBJECT,
            error_code: 0,
            flags: VmFlags::empty(),
            signals: VmSignals::new(),
            wait: None,
        };
        vm.begin();
        vm
    }

    /// Reset execution state: `self` is the Object class at the top level.
    pub fn begin(&mut self) {
        self.pc_irep = self.irep.clone();
        self.pc = 0;
        self.current = 0;
        self.regs.fill(Value::Nil);
        self.regs[0] = Value::Class(registry::OBJECT);
        self.callinfo.clear();
        self.target_class = registry::OBJECT;
        self.error_code = 0;
        self.flags = VmFlags::empty();
        self.wait = None;
    }

    // =========================================================================
    // Register window access
    // =========================================================================

    /// Read window register `i`.
    #[inline]
    pub fn reg(&self, i: usize) -> Value {
        self.regs[self.current + i]
    }

    /// Write window register `i` without releasing the old value. Only for
    /// slots known to hold non-refcounted values.
    #[inline]
    pub fn set_reg(&mut self, i: usize, v: Value) {
        self.regs[self.current + i] = v;
    }

    /// Replace window register `i`, releasing what it held.
    pub fn replace(&mut self, rt: &mut Runtime, i: usize, v: Value) {
        let old = std::mem::replace(&mut self.regs[self.current + i], v);
        rt.release(old);
    }

    /// Move a value out of window register `i`, leaving EMPTY (no release).
    #[inline]
    pub fn take_reg(&mut self, i: usize) -> Value {
        std::mem::replace(&mut self.regs[self.current + i], Value::Empty)
    }

    /// Release an absolute register slot, leaving EMPTY. Releasing an
    /// already-emptied slot is a no-op, which makes the call/return paths
    /// safe to overlap.
    pub fn release_abs(&mut self, rt: &mut Runtime, abs: usize) {
        if abs < self.regs.len() {
            let old = std::mem::replace(&mut self.regs[abs], Value::Empty);
            rt.release(old);
        }
    }

    /// Release the whole register file (STOP, teardown).
    pub fn release_all_regs(&mut self, rt: &mut Runtime) {
        for i in 0..self.regs.len() {
            self.release_abs(rt, i);
        }
        self.flags.insert(VmFlags::REGS_RELEASED);
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Save the current frame onto the call-info stack.
    pub fn push_callinfo(&mut self, mid: Option<SymId>, n_args: usize) {
        self.callinfo.push(CallInfo {
            current: self.current,
            pc_irep: self.pc_irep.clone(),
            pc: self.pc,
            mid,
            n_args,
            target_class: self.target_class,
        });
    }

    /// Switch to a callee frame whose window starts `ra` slots above the
    /// current base. Fails when the register file cannot hold the callee's
    /// window.
    pub fn enter_frame(&mut self, irep: Arc<Irep>, ra: usize) -> Result<(), RuntimeError> {
        let base = self.current + ra;
        if base + irep.nregs as usize > self.regs.len() {
            return Err(RuntimeError::BytecodeFormat(
                "register window overflow".into(),
            ));
        }
        self.pc = 0;
        self.pc_irep = irep;
        self.current = base;
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Execute instructions until halt or preemption.
    pub fn run(&mut self, rt: &mut Runtime) -> Exec {
        loop {
            match self.step(rt) {
                ControlFlow::Continue => {
                    if self.signals.take_preempt() {
                        return Exec::Preempted;
                    }
                }
                ControlFlow::Halt => {
                    self.flags.insert(VmFlags::HALTED);
                    self.signals.take_preempt();
                    return Exec::Halted;
                }
                ControlFlow::Fatal(e) => {
                    rt.console.diag(format_args!("{}", e));
                    self.error_code = e.code();
                    self.flags.insert(VmFlags::HALTED);
                    self.signals.take_preempt();
                    return Exec::Halted;
                }
            }
        }
    }

    /// Fetch, decode and execute one instruction.
    pub fn step(&mut self, rt: &mut Runtime) -> ControlFlow {
        let Some(word) = self.pc_irep.fetch(self.pc) else {
            return ControlFlow::Fatal(RuntimeError::BytecodeFormat(
                "program counter out of range".into(),
            ));
        };
        self.pc += 1;
        let inst = Instruction(word);

        let Some(op) = inst.opcode() else {
            rt.console
                .diag(format_args!("skip OP=0x{:02x}", inst.op()));
            return ControlFlow::Continue;
        };

        match op {
            Opcode::Nop => ControlFlow::Continue,
            Opcode::Move => ops::load_store::op_move(self, rt, inst),
            Opcode::LoadL => ops::load_store::op_loadl(self, rt, inst),
            Opcode::LoadI => ops::load_store::op_loadi(self, rt, inst),
            Opcode::LoadSym => ops::load_store::op_loadsym(self, rt, inst),
            Opcode::LoadNil => ops::load_store::op_loadnil(self, rt, inst),
            Opcode::LoadSelf => ops::load_store::op_loadself(self, rt, inst),
            Opcode::LoadT => ops::load_store::op_loadt(self, rt, inst),
            Opcode::LoadF => ops::load_store::op_loadf(self, rt, inst),
            Opcode::GetGlobal => ops::variables::op_getglobal(self, rt, inst),
            Opcode::SetGlobal => ops::variables::op_setglobal(self, rt, inst),
            Opcode::GetIv => ops::variables::op_getiv(self, rt, inst),
            Opcode::SetIv => ops::variables::op_setiv(self, rt, inst),
            // GETMCNST resolves through the same constant store.
            Opcode::GetConst | Opcode::GetMCnst => ops::variables::op_getconst(self, rt, inst),
            Opcode::SetConst => ops::variables::op_setconst(self, rt, inst),
            Opcode::GetUpvar => ops::variables::op_getupvar(self, rt, inst),
            Opcode::SetUpvar => ops::variables::op_setupvar(self, rt, inst),
            Opcode::Jmp => ops::control::op_jmp(self, rt, inst),
            Opcode::JmpIf => ops::control::op_jmpif(self, rt, inst),
            Opcode::JmpNot => ops::control::op_jmpnot(self, rt, inst),
            Opcode::Send => ops::calls::op_send(self, rt, inst, false),
            Opcode::SendB => ops::calls::op_send(self, rt, inst, true),
            Opcode::Call => ops::calls::op_call(self, rt, inst),
            Opcode::Super => ops::calls::op_super(self, rt, inst),
            Opcode::ArgAry => ops::control::op_argary(self, rt, inst),
            Opcode::Enter => ops::control::op_enter(self, rt, inst),
            Opcode::Return => ops::control::op_return(self, rt, inst),
            Opcode::BlkPush => ops::control::op_blkpush(self, rt, inst),
            Opcode::Add => ops::arithmetic::op_add(self, rt, inst),
            Opcode::AddI => ops::arithmetic::op_addi(self, rt, inst),
            Opcode::Sub => ops::arithmetic::op_sub(self, rt, inst),
            Opcode::SubI => ops::arithmetic::op_subi(self, rt, inst),
            Opcode::Mul => ops::arithmetic::op_mul(self, rt, inst),
            Opcode::Div => ops::arithmetic::op_div(self, rt, inst),
            Opcode::Eq => ops::arithmetic::op_eq(self, rt, inst),
            Opcode::Lt => ops::arithmetic::op_lt(self, rt, inst),
            Opcode::Le => ops::arithmetic::op_le(self, rt, inst),
            Opcode::Gt => ops::arithmetic::op_gt(self, rt, inst),
            Opcode::Ge => ops::arithmetic::op_ge(self, rt, inst),
            Opcode::Array => ops::containers::op_array(self, rt, inst),
            Opcode::String => ops::containers::op_string(self, rt, inst),
            Opcode::StrCat => ops::containers::op_strcat(self, rt, inst),
            Opcode::Hash => ops::containers::op_hash(self, rt, inst),
            Opcode::Lambda => ops::containers::op_lambda(self, rt, inst),
            Opcode::Range => ops::containers::op_range(self, rt, inst),
            Opcode::Class => ops::classes::op_class(self, rt, inst),
            Opcode::Exec => ops::classes::op_exec(self, rt, inst),
            Opcode::Method => ops::classes::op_method(self, rt, inst),
            Opcode::SClass => ops::classes::op_sclass(self, rt, inst),
            Opcode::TClass => ops::classes::op_tclass(self, rt, inst),
            Opcode::Stop => ops::control::op_stop(self, rt, inst),
            Opcode::Abort => ops::control::op_abort(self, rt, inst),
        }
    }
}
