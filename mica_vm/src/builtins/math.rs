//! Math class (feature `math`).

use super::define;
use mica_runtime::object::registry;
use mica_runtime::{BuiltinCall, Runtime, Value};

pub fn install(rt: &mut Runtime) {
    if let Some(math) = rt.define_class("Math", registry::OBJECT) {
        define(rt, math, "sqrt", sqrt);
        define(rt, math, "sin", sin);
        define(rt, math, "cos", cos);
    }
}

fn numeric_arg(ctx: &BuiltinCall<'_>) -> Option<f64> {
    match ctx.arg(1) {
        Value::Fixnum(n) => Some(n as f64),
        Value::Float(d) => Some(d),
        _ => None,
    }
}

fn sqrt(ctx: &mut BuiltinCall<'_>) {
    match numeric_arg(ctx) {
        Some(x) => ctx.set_return(Value::Float(x.sqrt())),
        None => ctx.return_nil(),
    }
}

fn sin(ctx: &mut BuiltinCall<'_>) {
    match numeric_arg(ctx) {
        Some(x) => ctx.set_return(Value::Float(x.sin())),
        None => ctx.return_nil(),
    }
}

fn cos(ctx: &mut BuiltinCall<'_>) {
    match numeric_arg(ctx) {
        Some(x) => ctx.set_return(Value::Float(x.cos())),
        None => ctx.return_nil(),
    }
}
