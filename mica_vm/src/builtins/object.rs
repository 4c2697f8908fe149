//! Object methods: console output, scheduling, identity.

use super::{define, define_kind};
use mica_runtime::config::TICK_UNIT_MS;
use mica_runtime::object::registry;
use mica_runtime::{BuiltinCall, MethodKind, Runtime, Value};

pub fn install(rt: &mut Runtime) {
    define(rt, registry::OBJECT, "puts", puts);
    define(rt, registry::OBJECT, "print", print);
    define(rt, registry::OBJECT, "p", p);
    define(rt, registry::OBJECT, "!", not);
    define(rt, registry::OBJECT, "!=", neq);
    define(rt, registry::OBJECT, "class", class);
    define(rt, registry::OBJECT, "sleep", sleep);
    define(rt, registry::OBJECT, "sleep_ms", sleep_ms);
    define(rt, registry::OBJECT, "memory_statistics", memory_statistics);
    define_kind(rt, registry::OBJECT, "new", MethodKind::New);
    define_kind(rt, registry::PROC, "call", MethodKind::ProcCall);

    define(rt, registry::NIL_CLASS, "to_s", nil_to_s);
    define(rt, registry::TRUE_CLASS, "to_s", true_to_s);
    define(rt, registry::FALSE_CLASS, "to_s", false_to_s);
}

/// `puts` - display each argument on its own line; bare `puts` emits one
/// empty line.
fn puts(ctx: &mut BuiltinCall<'_>) {
    if ctx.argc == 0 {
        ctx.rt.console.print("\n");
    }
    for n in 1..=ctx.argc {
        let line = ctx.rt.display_value(ctx.arg(n));
        ctx.rt.console.print(&line);
        ctx.rt.console.print("\n");
    }
    ctx.return_nil();
}

/// `print` - like `puts` without the newlines.
fn print(ctx: &mut BuiltinCall<'_>) {
    for n in 1..=ctx.argc {
        let s = ctx.rt.display_value(ctx.arg(n));
        ctx.rt.console.print(&s);
    }
    ctx.return_nil();
}

/// `p` - inspect each argument on its own line.
fn p(ctx: &mut BuiltinCall<'_>) {
    for n in 1..=ctx.argc {
        let line = ctx.rt.inspect_value(ctx.arg(n));
        ctx.rt.console.print(&line);
        ctx.rt.console.print("\n");
    }
    ctx.return_nil();
}

/// `!` - logical negation.
fn not(ctx: &mut BuiltinCall<'_>) {
    let falsy = !ctx.arg(0).is_truthy();
    ctx.return_bool(falsy);
}

/// `!=` - negated total-order equality.
fn neq(ctx: &mut BuiltinCall<'_>) {
    let differs = ctx.rt.compare(ctx.arg(0), ctx.arg(1)) != 0;
    ctx.return_bool(differs);
}

/// `class` - receiver's class object.
fn class(ctx: &mut BuiltinCall<'_>) {
    let cls = ctx.rt.class_of(ctx.arg(0));
    ctx.set_return(Value::Class(cls));
}

/// `sleep n` - park the task for `n` seconds (fixnum or float).
fn sleep(ctx: &mut BuiltinCall<'_>) {
    let per_sec = (1000 / TICK_UNIT_MS) as u64;
    let ticks = match ctx.arg(1) {
        Value::Fixnum(secs) => {
            Some((secs.max(0) as u64).saturating_mul(per_sec).min(u32::MAX as u64) as u32)
        }
        #[cfg(feature = "float")]
        Value::Float(secs) => Some((secs.max(0.0) * 1000.0 / TICK_UNIT_MS as f64) as u32),
        _ => None,
    };
    if let Some(t) = ticks {
        ctx.sleep_ticks(t);
    }
    ctx.return_nil();
}

/// `sleep_ms n` - park the task for `n` milliseconds.
fn sleep_ms(ctx: &mut BuiltinCall<'_>) {
    if let Some(ms) = ctx.arg_fixnum(1) {
        ctx.sleep_ticks(ms.max(0) as u32 / TICK_UNIT_MS.max(1));
    }
    ctx.return_nil();
}

/// `memory_statistics` - print the pool snapshot (diagnostic hook).
fn memory_statistics(ctx: &mut BuiltinCall<'_>) {
    let s = ctx.rt.statistics();
    ctx.rt.console.diag(format_args!(
        "memory total:{} used:{} free:{} fragment:{}",
        s.total, s.used, s.free, s.fragment
    ));
    ctx.return_nil();
}

fn nil_to_s(ctx: &mut BuiltinCall<'_>) {
    string_return(ctx, b"");
}

fn true_to_s(ctx: &mut BuiltinCall<'_>) {
    string_return(ctx, b"true");
}

fn false_to_s(ctx: &mut BuiltinCall<'_>) {
    string_return(ctx, b"false");
}

#[cfg(feature = "string")]
pub(crate) fn string_return(ctx: &mut BuiltinCall<'_>, bytes: &[u8]) {
    match ctx.rt.heap.new_string(&mut ctx.rt.pool, ctx.vm_id, bytes) {
        Ok(v) => ctx.set_return(v),
        Err(e) => *ctx.error_code = e.code(),
    }
}

#[cfg(not(feature = "string"))]
pub(crate) fn string_return(ctx: &mut BuiltinCall<'_>, _bytes: &[u8]) {
    ctx.return_nil();
}
