//! Load opcode handlers: registers, literals, symbols, self.

use crate::dispatch::ControlFlow;
use crate::ops::resolve_sym;
use crate::vm::Vm;
use mica_bytecode::{Instruction, PoolValue};
use mica_runtime::{Runtime, Value};

/// MOVE: R(A) := R(B)
pub fn op_move(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let v = vm.reg(inst.b());
    rt.dup(v);
    vm.replace(rt, inst.a(), v);
    ControlFlow::Continue
}

/// LOADL: R(A) := Pool(Bx)
pub fn op_loadl(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let irep = vm.pc_irep.clone();
    let v = match irep.pools.get(inst.bx()) {
        Some(PoolValue::Fixnum(n)) => Value::Fixnum(*n),
        #[cfg(feature = "float")]
        Some(PoolValue::Float(d)) => Value::Float(*d),
        #[cfg(feature = "string")]
        Some(PoolValue::Str(bytes)) => {
            match rt.heap.new_string(&mut rt.pool, vm.id, bytes) {
                Ok(v) => v,
                Err(e) => return ControlFlow::Fatal(e),
            }
        }
        #[cfg(not(feature = "string"))]
        Some(PoolValue::Str(_)) => Value::Nil,
        None => Value::Nil,
    };
    vm.replace(rt, inst.a(), v);
    ControlFlow::Continue
}

/// LOADI: R(A) := sBx
pub fn op_loadi(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    vm.replace(rt, inst.a(), Value::Fixnum(inst.sbx() as i64));
    ControlFlow::Continue
}

/// LOADSYM: R(A) := Syms(Bx)
pub fn op_loadsym(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let v = match resolve_sym(vm, rt, inst.bx()) {
        Some(sym) => Value::Symbol(sym),
        None => Value::Nil,
    };
    vm.replace(rt, inst.a(), v);
    ControlFlow::Continue
}

/// LOADNIL: R(A) := nil
pub fn op_loadnil(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    vm.replace(rt, inst.a(), Value::Nil);
    ControlFlow::Continue
}

/// LOADSELF: R(A) := R(0)
pub fn op_loadself(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let this = vm.reg(0);
    rt.dup(this);
    vm.replace(rt, inst.a(), this);
    ControlFlow::Continue
}

/// LOADT: R(A) := true
pub fn op_loadt(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    vm.replace(rt, inst.a(), Value::True);
    ControlFlow::Continue
}

/// LOADF: R(A) := false
pub fn op_loadf(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    vm.replace(rt, inst.a(), Value::False);
    ControlFlow::Continue
}
