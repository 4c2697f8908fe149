//! Procs, method records and the built-in call surface.

use crate::runtime::Runtime;
use crate::symbol::SymId;
use crate::value::Value;
use mica_bytecode::Irep;
use std::sync::Arc;

/// A proc captured by LAMBDA: a bytecode body with no heap environment.
/// Upvar access walks the live call-info chain, so a proc must not outlive
/// the frame that created it.
#[derive(Debug)]
pub struct RProc {
    pub irep: Arc<Irep>,
}

impl RProc {
    pub fn payload_size(&self) -> usize {
        std::mem::size_of::<RProc>()
    }
}

// =============================================================================
// Methods
// =============================================================================

/// Host built-in signature: the canonical `(vm, argv, argc)` shape, carried
/// by a [`BuiltinCall`] so built-ins written outside this crate see one
/// coherent borrow of the VM's argument window and control fields.
pub type BuiltinFn = fn(&mut BuiltinCall<'_>);

/// How a method executes when dispatch finds it.
#[derive(Clone)]
pub enum MethodKind {
    /// Host function, invoked synchronously.
    Builtin(BuiltinFn),
    /// Bytecode body; dispatch pushes a call-info and enters it.
    Bytecode(Arc<Irep>),
    /// `Proc#call`: re-enters bytecode through the receiver proc, so the
    /// dispatcher must not release the argument slots.
    ProcCall,
    /// `Object#new`: allocates the instance, then runs `initialize` through
    /// a synthetic call stub.
    New,
}

impl std::fmt::Debug for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodKind::Builtin(_) => write!(f, "Builtin"),
            MethodKind::Bytecode(_) => write!(f, "Bytecode"),
            MethodKind::ProcCall => write!(f, "ProcCall"),
            MethodKind::New => write!(f, "New"),
        }
    }
}

/// One entry in a class's method chain.
#[derive(Debug, Clone)]
pub struct Method {
    pub sym_id: SymId,
    pub kind: MethodKind,
}

// =============================================================================
// Built-in call surface
// =============================================================================

/// Why a VM voluntarily leaves the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Sleep for the given number of scheduler ticks.
    Ticks(u32),
}

/// Everything a built-in method sees.
///
/// `argv` is the receiver's register window: `argv[0]` is the receiver and
/// doubles as the return slot, `argv[1..=argc]` are the arguments,
/// `argv[argc + 1]` the block. Helpers mirror the embedding macros of the
/// C-side API (`GET_INT_ARG`, `SET_RETURN`, ...).
pub struct BuiltinCall<'a> {
    pub rt: &'a mut Runtime,
    pub argv: &'a mut [Value],
    pub argc: usize,
    /// Id of the calling VM, for tagging allocations.
    pub vm_id: u8,
    /// Set to park the calling task; observed by the scheduler.
    pub wait: &'a mut Option<WaitReason>,
    /// Set nonzero to have the scheduler reap the calling VM.
    pub error_code: &'a mut u32,
}

impl BuiltinCall<'_> {
    /// Argument `n` (1-based; 0 is the receiver).
    #[inline]
    pub fn arg(&self, n: usize) -> Value {
        self.argv.get(n).copied().unwrap_or(Value::Empty)
    }

    /// Fixnum argument `n`, or `None` with no diagnostic.
    #[inline]
    pub fn arg_fixnum(&self, n: usize) -> Option<i64> {
        self.arg(n).as_fixnum()
    }

    /// Replace the return slot, releasing what it held.
    pub fn set_return(&mut self, v: Value) {
        let old = self.argv[0];
        self.rt.release(old);
        self.argv[0] = v;
    }

    #[inline]
    pub fn return_nil(&mut self) {
        self.set_return(Value::Nil);
    }

    #[inline]
    pub fn return_fixnum(&mut self, n: i64) {
        self.set_return(Value::Fixnum(n));
    }

    #[inline]
    pub fn return_bool(&mut self, b: bool) {
        self.set_return(Value::bool_value(b));
    }

    /// Park the calling task for `ticks` scheduler ticks.
    #[inline]
    pub fn sleep_ticks(&mut self, ticks: u32) {
        *self.wait = Some(WaitReason::Ticks(ticks));
    }
}
