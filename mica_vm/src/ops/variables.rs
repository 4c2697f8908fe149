//! Variable access: globals, constants, instance variables, upvars.

use crate::dispatch::ControlFlow;
use crate::ops::resolve_sym;
use crate::vm::Vm;
use mica_bytecode::Instruction;
use mica_runtime::{Runtime, RuntimeError, Value};

/// GETGLOBAL: R(A) := getglobal(Syms(Bx)); unset globals read nil.
pub fn op_getglobal(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let v = match resolve_sym(vm, rt, inst.bx()) {
        Some(sym) => rt.globals.get(sym).unwrap_or(Value::Nil),
        None => Value::Nil,
    };
    rt.dup(v);
    vm.replace(rt, inst.a(), v);
    ControlFlow::Continue
}

/// SETGLOBAL: setglobal(Syms(Bx), R(A))
pub fn op_setglobal(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    if let Some(sym) = resolve_sym(vm, rt, inst.bx()) {
        let v = vm.reg(inst.a());
        rt.dup(v);
        rt.global_set(sym, v);
    }
    ControlFlow::Continue
}

/// GETIV: R(A) := ivget(Syms(Bx)); the symbol is spelled `@name` in the
/// bytecode and the sigil is stripped before interning.
pub fn op_getiv(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let sym = ivar_sym(vm, rt, inst.bx());
    let v = match (sym, vm.reg(0)) {
        (Some(sym), Value::Object(r)) => rt
            .heap
            .instance(r)
            .map(|i| i.getiv(sym))
            .unwrap_or(Value::Nil),
        _ => Value::Nil,
    };
    rt.dup(v);
    vm.replace(rt, inst.a(), v);
    ControlFlow::Continue
}

/// SETIV: ivset(Syms(Bx), R(A))
pub fn op_setiv(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let Some(sym) = ivar_sym(vm, rt, inst.bx()) else {
        return ControlFlow::Continue;
    };
    match vm.reg(0) {
        Value::Object(r) => {
            let v = vm.reg(inst.a());
            rt.dup(v);
            if let Err(e) = rt.heap.instance_setiv(&mut rt.pool, r, sym, v) {
                return ControlFlow::Fatal(e);
            }
        }
        _ => {
            rt.console
                .diag(format_args!("TypeError: self has no instance variables"));
        }
    }
    ControlFlow::Continue
}

/// GETCONST / GETMCNST: R(A) := constget(Syms(Bx))
pub fn op_getconst(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let Some(sym) = resolve_sym(vm, rt, inst.bx()) else {
        vm.replace(rt, inst.a(), Value::Empty);
        return ControlFlow::Continue;
    };
    match rt.consts.get(sym) {
        Some(v) => {
            rt.dup(v);
            vm.replace(rt, inst.a(), v);
        }
        None => {
            let name = rt.sym_name(sym).to_owned();
            rt.console.diag(format_args!(
                "{}",
                RuntimeError::UninitializedConstant(name)
            ));
            vm.replace(rt, inst.a(), Value::Empty);
        }
    }
    ControlFlow::Continue
}

/// SETCONST: constset(Syms(Bx), R(A))
pub fn op_setconst(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    if let Some(sym) = resolve_sym(vm, rt, inst.bx()) {
        let v = vm.reg(inst.a());
        rt.dup(v);
        rt.const_set(sym, v);
    }
    ControlFlow::Continue
}

/// GETUPVAR: R(A) := uvget(B, C)
///
/// C is the lexical depth; the owning frame sits `depth*2 + 1` entries up
/// the call-info stack and its saved window base addresses the variable.
pub fn op_getupvar(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let Some(up_base) = upvar_base(vm, rt, inst.c()) else {
        vm.replace(rt, inst.a(), Value::Nil);
        return ControlFlow::Continue;
    };
    let abs = up_base + inst.b();
    let v = vm.regs.get(abs).copied().unwrap_or(Value::Nil);
    rt.dup(v);
    vm.replace(rt, inst.a(), v);
    ControlFlow::Continue
}

/// SETUPVAR: uvset(B, C, R(A))
pub fn op_setupvar(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let Some(up_base) = upvar_base(vm, rt, inst.c()) else {
        return ControlFlow::Continue;
    };
    let abs = up_base + inst.b();
    let v = vm.reg(inst.a());
    rt.dup(v);
    if abs < vm.regs.len() {
        let old = std::mem::replace(&mut vm.regs[abs], v);
        rt.release(old);
    }
    ControlFlow::Continue
}

/// Window base of the frame `depth` lexical levels up.
fn upvar_base(vm: &Vm, rt: &mut Runtime, depth: usize) -> Option<usize> {
    let hops = depth * 2 + 1;
    let len = vm.callinfo.len();
    if hops >= len {
        rt.console
            .diag(format_args!("upvar depth {} exceeds call stack", depth));
        return None;
    }
    Some(vm.callinfo[len - 1 - hops].current)
}

/// Intern an ivar symbol ordinal, stripping the leading `@`.
fn ivar_sym(vm: &Vm, rt: &mut Runtime, n: usize) -> Option<mica_runtime::SymId> {
    let irep = vm.pc_irep.clone();
    let name = irep.sym_name(n)?;
    let stripped = name.strip_prefix('@').unwrap_or(name);
    rt.sym(stripped)
}
