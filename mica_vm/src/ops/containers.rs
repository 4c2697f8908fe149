//! Constructor opcodes: ARRAY, STRING, STRCAT, HASH, LAMBDA, RANGE.
//!
//! Constructors take ownership of their source registers by moving them
//! (the slots are left EMPTY, not released). Out-of-memory from any
//! constructor aborts the VM.

use crate::dispatch::ControlFlow;
use crate::vm::Vm;
use mica_bytecode::{Instruction, PoolValue};
#[cfg(feature = "string")]
use mica_runtime::MethodKind;
use mica_runtime::{Runtime, RuntimeError, Value};

/// ARRAY: R(A) := [R(B), R(B+1) .. R(B+C-1)]
pub fn op_array(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let (ra, rb, rc) = (inst.a(), inst.b(), inst.c());
    let value = match rt.heap.new_array(&mut rt.pool, vm.id, rc) {
        Ok(v) => v,
        Err(e) => return ControlFlow::Fatal(e),
    };
    let aref = match value.heap_ref() {
        Some(r) => r,
        None => return ControlFlow::Fatal(RuntimeError::OutOfMemory),
    };
    for i in 0..rc {
        let elem = vm.take_reg(rb + i);
        if let Err(e) = rt.heap.array_push(&mut rt.pool, aref, elem) {
            return ControlFlow::Fatal(e);
        }
    }
    vm.replace(rt, ra, value);
    ControlFlow::Continue
}

/// STRING: R(A) := str_dup(Pool(Bx))
#[cfg(feature = "string")]
pub fn op_string(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let irep = vm.pc_irep.clone();
    let Some(PoolValue::Str(bytes)) = irep.pools.get(inst.bx()) else {
        rt.console
            .diag(format_args!("TypeError: STRING on a non-string literal"));
        return ControlFlow::Continue;
    };
    let value = match rt.heap.new_string(&mut rt.pool, vm.id, bytes) {
        Ok(v) => v,
        Err(e) => return ControlFlow::Fatal(e),
    };
    vm.replace(rt, inst.a(), value);
    ControlFlow::Continue
}

#[cfg(not(feature = "string"))]
pub fn op_string(_vm: &mut Vm, rt: &mut Runtime, _inst: Instruction) -> ControlFlow {
    rt.console.diag(format_args!("Not supported!"));
    ControlFlow::Continue
}

/// STRCAT: R(A) := R(A) + to_s(R(B))
#[cfg(feature = "string")]
pub fn op_strcat(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let (ra, rb) = (inst.a(), inst.b());

    // Convert the right operand with its builtin to_s, when it has one.
    if let Some(to_s) = rt.sym("to_s") {
        let cls = rt.class_of(vm.reg(rb));
        if let Some(method) = rt.classes.find_method(cls, to_s) {
            if let MethodKind::Builtin(f) = method.kind.clone() {
                crate::ops::calls::call_builtin(vm, rt, f, rb, 0);
            }
        }
    }

    let bytes = match (vm.reg(ra), vm.reg(rb)) {
        (Value::String(x), Value::String(y)) => {
            match (rt.heap.string(x), rt.heap.string(y)) {
                (Some(sx), Some(sy)) => {
                    let mut joined = Vec::with_capacity(sx.len() + sy.len());
                    joined.extend_from_slice(sx.as_bytes());
                    joined.extend_from_slice(sy.as_bytes());
                    joined
                }
                _ => return ControlFlow::Continue,
            }
        }
        _ => {
            rt.console
                .diag(format_args!("TypeError: cannot concatenate non-strings"));
            return ControlFlow::Continue;
        }
    };
    let value = match rt.heap.new_string(&mut rt.pool, vm.id, &bytes) {
        Ok(v) => v,
        Err(e) => return ControlFlow::Fatal(e),
    };
    vm.replace(rt, ra, value);
    ControlFlow::Continue
}

#[cfg(not(feature = "string"))]
pub fn op_strcat(_vm: &mut Vm, rt: &mut Runtime, _inst: Instruction) -> ControlFlow {
    rt.console.diag(format_args!("Not supported!"));
    ControlFlow::Continue
}

/// HASH: R(A) := { R(B) => R(B+1), .. } with C pairs, source order kept.
pub fn op_hash(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let (ra, rb, rc) = (inst.a(), inst.b(), inst.c());
    let value = match rt.heap.new_hash(&mut rt.pool, vm.id, rc) {
        Ok(v) => v,
        Err(e) => return ControlFlow::Fatal(e),
    };
    let href = match value.heap_ref() {
        Some(r) => r,
        None => return ControlFlow::Fatal(RuntimeError::OutOfMemory),
    };
    for i in 0..rc {
        let key = vm.take_reg(rb + i * 2);
        let val = vm.take_reg(rb + i * 2 + 1);
        if let Err(e) = rt.heap.hash_push_pair(&mut rt.pool, href, key, val) {
            return ControlFlow::Fatal(e);
        }
    }
    vm.replace(rt, ra, value);
    ControlFlow::Continue
}

/// LAMBDA: R(A) := proc over child unit SEQ[Bz]
pub fn op_lambda(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let irep = vm.pc_irep.clone();
    let Some(child) = irep.reps.get(inst.bz()) else {
        return ControlFlow::Fatal(RuntimeError::BytecodeFormat(
            "LAMBDA child index out of range".into(),
        ));
    };
    let value = match rt.heap.new_proc(&mut rt.pool, vm.id, child.clone()) {
        Ok(v) => v,
        Err(e) => return ControlFlow::Fatal(e),
    };
    vm.replace(rt, inst.a(), value);
    ControlFlow::Continue
}

/// RANGE: R(A) := R(B) .. R(B+1), C nonzero for an exclusive end.
pub fn op_range(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let (ra, rb, rc) = (inst.a(), inst.b(), inst.c());
    let first = vm.reg(rb);
    let last = vm.reg(rb + 1);
    rt.dup(first);
    rt.dup(last);
    let value = match rt.heap.new_range(&mut rt.pool, vm.id, first, last, rc != 0) {
        Ok(v) => v,
        Err(e) => return ControlFlow::Fatal(e),
    };
    vm.replace(rt, ra, value);
    ControlFlow::Continue
}
