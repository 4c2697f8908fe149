//! Control flow: jumps, argument setup, return, halt.

use crate::dispatch::ControlFlow;
use crate::vm::{Vm, VmFlags};
use mica_bytecode::instruction::{RETURN_BREAK, RETURN_NORMAL};
use mica_bytecode::Instruction;
use mica_runtime::Runtime;

/// JMP: pc += sBx (pc already advanced past this instruction).
pub fn op_jmp(vm: &mut Vm, _rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    jump(vm, inst.sbx());
    ControlFlow::Continue
}

/// JMPIF: if R(A) then pc += sBx
pub fn op_jmpif(vm: &mut Vm, _rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    if vm.reg(inst.a()).is_truthy() {
        jump(vm, inst.sbx());
    }
    ControlFlow::Continue
}

/// JMPNOT: if not R(A) then pc += sBx
pub fn op_jmpnot(vm: &mut Vm, _rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    if !vm.reg(inst.a()).is_truthy() {
        jump(vm, inst.sbx());
    }
    ControlFlow::Continue
}

#[inline]
fn jump(vm: &mut Vm, sbx: i32) {
    // -1 compensates the fetch increment.
    let target = vm.pc as i64 + sbx as i64 - 1;
    vm.pc = target.max(0) as usize;
}

/// ENTER: marshal arguments against the declared signature (Ax packs
/// 5:5:1:5:5:1:1). With optional parameters present, skip past the default
/// initializers the caller's argument count already covers.
pub fn op_enter(vm: &mut Vm, _rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ax = inst.ax();
    let mandatory = (ax >> 18) & 0x1f;
    let optional = (ax >> 13) & 0x1f;
    if optional > 0 {
        let n_args = vm.callinfo.last().map(|ci| ci.n_args).unwrap_or(0);
        let skip = n_args as i64 - mandatory as i64;
        if skip > 0 {
            vm.pc += skip as usize;
        }
    }
    ControlFlow::Continue
}

/// ARGARY: argument-array semantics are unspecified for block invocation
/// in this dialect; deliberately a no-op.
pub fn op_argary(_vm: &mut Vm, _rt: &mut Runtime, _inst: Instruction) -> ControlFlow {
    ControlFlow::Continue
}

/// RETURN: move R(A) into the window's return slot, then unwind one frame
/// (B = normal) or every frame sharing this window base plus one
/// (B = break, the block-break path).
pub fn op_return(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();

    // Return value moves (not dups) into window slot 0.
    if ra != 0 {
        let ret = vm.take_reg(ra);
        vm.replace(rt, 0, ret);
    }

    match inst.b() {
        RETURN_NORMAL => {
            let Some(ci) = vm.callinfo.pop() else {
                // Top-level return halts the VM.
                return ControlFlow::Halt;
            };
            let callee_base = vm.current;
            let callee_nregs = vm.pc_irep.nregs as usize;

            vm.current = ci.current;
            vm.pc_irep = ci.pc_irep;
            vm.pc = ci.pc;
            vm.target_class = ci.target_class;

            // Clear the callee's stacked arguments and locals.
            for i in 1..callee_nregs {
                vm.release_abs(rt, callee_base + i);
            }
        }
        RETURN_BREAK => {
            let Some(tail) = vm.callinfo.last() else {
                return ControlFlow::Halt;
            };
            let reg_top = tail.current;
            while vm.callinfo.len() > 1
                && vm.callinfo.last().map(|ci| ci.current) == Some(reg_top)
            {
                vm.callinfo.pop();
            }
            match vm.callinfo.pop() {
                Some(ci) => {
                    vm.current = ci.current;
                    vm.pc_irep = ci.pc_irep;
                    vm.pc = ci.pc;
                    vm.target_class = ci.target_class;
                }
                None => return ControlFlow::Halt,
            }
        }
        other => {
            rt.console
                .diag(format_args!("unsupported return mode {}", other));
        }
    }
    ControlFlow::Continue
}

/// BLKPUSH: R(A) := block argument (the slot after the marshalled args).
pub fn op_blkpush(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let offset = inst.bx() >> 10;
    let blk = vm.reg(offset + 1);
    rt.dup(blk);
    vm.replace(rt, inst.a(), blk);
    ControlFlow::Continue
}

/// STOP: release the register file and halt.
pub fn op_stop(vm: &mut Vm, rt: &mut Runtime, _inst: Instruction) -> ControlFlow {
    vm.release_all_regs(rt);
    ControlFlow::Halt
}

/// ABORT: halt without touching the registers.
pub fn op_abort(vm: &mut Vm, _rt: &mut Runtime, _inst: Instruction) -> ControlFlow {
    vm.flags.insert(VmFlags::HALTED);
    ControlFlow::Halt
}
