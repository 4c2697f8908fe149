//! Fixnum and Float methods not covered by opcodes.

use super::define;
use super::object::string_return;
use mica_runtime::object::registry;
use mica_runtime::{BuiltinCall, Runtime, RuntimeError, Value};

pub fn install(rt: &mut Runtime) {
    define(rt, registry::FIXNUM, "%", fixnum_mod);
    define(rt, registry::FIXNUM, "to_s", fixnum_to_s);
    #[cfg(feature = "float")]
    {
        define(rt, registry::FLOAT, "to_i", float_to_i);
        define(rt, registry::FLOAT, "to_s", float_to_s);
    }
    define(rt, registry::SYMBOL, "to_s", symbol_to_s);
}

/// `%` - modulo with the sign of the divisor.
fn fixnum_mod(ctx: &mut BuiltinCall<'_>) {
    let (Some(x), Some(y)) = (ctx.arg_fixnum(0), ctx.arg_fixnum(1)) else {
        ctx.return_nil();
        return;
    };
    if y == 0 {
        ctx.rt
            .console
            .diag(format_args!("{}", RuntimeError::ZeroDivision));
        ctx.return_nil();
        return;
    }
    let mut r = x.wrapping_rem(y);
    if r != 0 && (r < 0) != (y < 0) {
        r = r.wrapping_add(y);
    }
    ctx.return_fixnum(r);
}

fn fixnum_to_s(ctx: &mut BuiltinCall<'_>) {
    let Some(n) = ctx.arg_fixnum(0) else {
        ctx.return_nil();
        return;
    };
    string_return(ctx, n.to_string().as_bytes());
}

#[cfg(feature = "float")]
fn float_to_i(ctx: &mut BuiltinCall<'_>) {
    let Value::Float(d) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    ctx.return_fixnum(d as i64);
}

#[cfg(feature = "float")]
fn float_to_s(ctx: &mut BuiltinCall<'_>) {
    let Value::Float(d) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    string_return(ctx, format!("{:?}", d).as_bytes());
}

fn symbol_to_s(ctx: &mut BuiltinCall<'_>) {
    let Value::Symbol(s) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let name = ctx.rt.sym_name(s).to_owned();
    string_return(ctx, name.as_bytes());
}
