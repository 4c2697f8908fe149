//! Arithmetic and comparison handlers.
//!
//! Each fast-paths the pure fixnum/fixnum and fixnum/float operand shapes;
//! any other receiver falls back to a regular SEND with the operator
//! symbol (the B field of these opcodes names it). Fixnum arithmetic wraps
//! in two's-complement; fixnum division truncates toward zero and a zero
//! divisor prints a diagnostic and yields nil.

use crate::dispatch::ControlFlow;
use crate::ops::calls::op_send_fallback;
use crate::vm::Vm;
use mica_bytecode::Instruction;
use mica_runtime::{Runtime, RuntimeError, Value};

/// ADD: R(A) := R(A) + R(A+1)
pub fn op_add(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Fixnum(x.wrapping_add(y)));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x as f64 + y));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Float(x + y as f64));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x + y));
            ControlFlow::Continue
        }
        _ => op_send_fallback(vm, rt, inst),
    }
}

/// SUB: R(A) := R(A) - R(A+1)
pub fn op_sub(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Fixnum(x.wrapping_sub(y)));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x as f64 - y));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Float(x - y as f64));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x - y));
            ControlFlow::Continue
        }
        _ => op_send_fallback(vm, rt, inst),
    }
}

/// MUL: R(A) := R(A) * R(A+1)
pub fn op_mul(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Fixnum(x.wrapping_mul(y)));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x as f64 * y));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Float(x * y as f64));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x * y));
            ControlFlow::Continue
        }
        _ => op_send_fallback(vm, rt, inst),
    }
}

/// DIV: R(A) := R(A) / R(A+1)
pub fn op_div(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(_), Value::Fixnum(0)) => {
            rt.console
                .diag(format_args!("{}", RuntimeError::ZeroDivision));
            vm.set_reg(ra, Value::Nil);
            ControlFlow::Continue
        }
        (Value::Fixnum(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Fixnum(x.wrapping_div(y)));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x as f64 / y));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => {
            vm.set_reg(ra, Value::Float(x / y as f64));
            ControlFlow::Continue
        }
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => {
            vm.set_reg(ra, Value::Float(x / y));
            ControlFlow::Continue
        }
        _ => op_send_fallback(vm, rt, inst),
    }
}

/// ADDI: R(A) := R(A) + C
pub fn op_addi(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    match vm.reg(ra) {
        Value::Fixnum(x) => {
            vm.set_reg(ra, Value::Fixnum(x.wrapping_add(inst.c() as i64)));
        }
        #[cfg(feature = "float")]
        Value::Float(x) => {
            vm.set_reg(ra, Value::Float(x + inst.c() as f64));
        }
        _ => {
            rt.console.diag(format_args!(
                "{}",
                RuntimeError::TypeError("non-numeric operand for ADDI".into())
            ));
        }
    }
    ControlFlow::Continue
}

/// SUBI: R(A) := R(A) - C
pub fn op_subi(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    match vm.reg(ra) {
        Value::Fixnum(x) => {
            vm.set_reg(ra, Value::Fixnum(x.wrapping_sub(inst.c() as i64)));
        }
        #[cfg(feature = "float")]
        Value::Float(x) => {
            vm.set_reg(ra, Value::Float(x - inst.c() as f64));
        }
        _ => {
            rt.console.diag(format_args!(
                "{}",
                RuntimeError::TypeError("non-numeric operand for SUBI".into())
            ));
        }
    }
    ControlFlow::Continue
}

/// EQ: R(A) := R(A) == R(A+1), by total-order comparison.
pub fn op_eq(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let equal = rt.compare(vm.reg(ra), vm.reg(ra + 1)) == 0;
    vm.replace(rt, ra + 1, Value::Empty);
    vm.replace(rt, ra, Value::bool_value(equal));
    ControlFlow::Continue
}

/// LT: R(A) := R(A) < R(A+1)
pub fn op_lt(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let result = match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(x), Value::Fixnum(y)) => x < y,
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => (x as f64) < y,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => x < y as f64,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => x < y,
        _ => return op_send_fallback(vm, rt, inst),
    };
    vm.set_reg(ra, Value::bool_value(result));
    ControlFlow::Continue
}

/// LE: R(A) := R(A) <= R(A+1)
pub fn op_le(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let result = match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(x), Value::Fixnum(y)) => x <= y,
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => (x as f64) <= y,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => x <= y as f64,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => x <= y,
        _ => return op_send_fallback(vm, rt, inst),
    };
    vm.set_reg(ra, Value::bool_value(result));
    ControlFlow::Continue
}

/// GT: R(A) := R(A) > R(A+1)
pub fn op_gt(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let result = match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(x), Value::Fixnum(y)) => x > y,
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => (x as f64) > y,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => x > y as f64,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => x > y,
        _ => return op_send_fallback(vm, rt, inst),
    };
    vm.set_reg(ra, Value::bool_value(result));
    ControlFlow::Continue
}

/// GE: R(A) := R(A) >= R(A+1)
pub fn op_ge(vm: &mut Vm, rt: &mut Runtime, inst: Instruction) -> ControlFlow {
    let ra = inst.a();
    let result = match (vm.reg(ra), vm.reg(ra + 1)) {
        (Value::Fixnum(x), Value::Fixnum(y)) => x >= y,
        #[cfg(feature = "float")]
        (Value::Fixnum(x), Value::Float(y)) => (x as f64) >= y,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Fixnum(y)) => x >= y as f64,
        #[cfg(feature = "float")]
        (Value::Float(x), Value::Float(y)) => x >= y,
        _ => return op_send_fallback(vm, rt, inst),
    };
    vm.set_reg(ra, Value::bool_value(result));
    ControlFlow::Continue
}
