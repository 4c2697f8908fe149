//! Class machinery: CLASS, EXEC, METHOD, SCLASS, TCLASS.

use crate::dispatch::ControlFlow;
use crate::ops::resolve_sym;
use crate::vm::Vm;
use mica_bytecode::Instruction;
use mica_runtime::object::registry;
use mica_runtime::{MethodKind, Runtime, RuntimeError, Value};

/// CLASS: R(A) := newclass(Syms(B), R(A+1))
///
/// R(A+1) holds the superclass, or non-class (usually nil) for a plain
/// `Object` subclass. Reopening an existing class returns it untouched.
pub fn op_class(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let irep = vm.pc_irep.clone();
    let Some(name) = irep.sym_name(inst.b()) else {
        rt.console
            .diag(format_args!("bad symbol ordinal {}", inst.b()));
        return ControlFlow::Continue;
    };
    let super_id = match vm.reg(ra + 1) {
        Value::Class(c) => c,
        _ => registry::OBJECT,
    };
    let Some(cls) = rt.define_class(name, super_id) else {
        rt.console
            .diag(format_args!("{}", RuntimeError::SymbolTableFull));
        return ControlFlow::Continue;
    };
    vm.replace(rt, ra, Value::Class(cls));
    ControlFlow::Continue
}

/// EXEC: run SEQ[Bx] of the top-level unit with R(A) as receiver, opening
/// its class for METHOD definitions.
pub fn op_exec(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let recv = vm.reg(ra);
    let Some(body) = vm.irep.reps.get(inst.bx()).cloned() else {
        return ControlFlow::Fatal(RuntimeError::BytecodeFormat(
            "EXEC child index out of range".into(),
        ));
    };
    vm.push_callinfo(None, 0);
    if let Err(e) = vm.enter_frame(body, ra) {
        vm.callinfo.pop();
        return ControlFlow::Fatal(e);
    }
    vm.target_class = rt.class_of(recv);
    ControlFlow::Continue
}

/// METHOD: install the proc in R(A+1) as Syms(B) on the class in R(A).
pub fn op_method(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let Value::Class(cls) = vm.reg(ra) else {
        rt.console
            .diag(format_args!("TypeError: METHOD target is not a class"));
        return ControlFlow::Continue;
    };
    let Value::Proc(proc_ref) = vm.reg(ra + 1) else {
        rt.console
            .diag(format_args!("TypeError: METHOD body is not a proc"));
        return ControlFlow::Continue;
    };
    let Some(sym) = resolve_sym(vm, rt, inst.b()) else {
        return ControlFlow::Continue;
    };
    let Some(irep) = rt.heap.proc(proc_ref).map(|p| p.irep.clone()) else {
        return ControlFlow::Continue;
    };
    rt.classes.define_method(cls, sym, MethodKind::Bytecode(irep));
    // The proc's body now lives in the method chain; drop the proc object.
    vm.replace(rt, ra + 1, Value::Empty);
    ControlFlow::Continue
}

/// SCLASS: singleton classes are not supported; deliberately a no-op.
pub fn op_sclass(_vm: &mut Vm, _rt: &mut Runtime, _inst: Instruction) -> ControlFlow {
    ControlFlow::Continue
}

/// TCLASS: R(A) := the class currently open for definitions.
pub fn op_tclass(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let target = vm.target_class;
    vm.replace(rt, inst.a(), Value::Class(target));
    ControlFlow::Continue
}
