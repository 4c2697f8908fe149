//! Array, string, hash and range methods.

use super::define;
use super::object::string_return;
use mica_runtime::object::registry;
use mica_runtime::{BuiltinCall, Runtime, Value};

pub fn install(rt: &mut Runtime) {
    define(rt, registry::ARRAY, "[]", array_get);
    define(rt, registry::ARRAY, "[]=", array_set);
    define(rt, registry::ARRAY, "size", array_size);
    define(rt, registry::ARRAY, "length", array_size);
    define(rt, registry::ARRAY, "push", array_push);
    define(rt, registry::ARRAY, "<<", array_push);
    define(rt, registry::ARRAY, "pop", array_pop);
    define(rt, registry::ARRAY, "first", array_first);
    define(rt, registry::ARRAY, "last", array_last);
    define(rt, registry::ARRAY, "empty?", array_empty);

    #[cfg(feature = "string")]
    {
        define(rt, registry::STRING, "+", string_add);
        define(rt, registry::STRING, "size", string_size);
        define(rt, registry::STRING, "length", string_size);
        define(rt, registry::STRING, "to_i", string_to_i);
        define(rt, registry::STRING, "to_s", string_to_s);
        define(rt, registry::STRING, "empty?", string_empty);
    }

    define(rt, registry::HASH, "[]", hash_get);
    define(rt, registry::HASH, "[]=", hash_set);
    define(rt, registry::HASH, "size", hash_size);
    define(rt, registry::HASH, "length", hash_size);
    define(rt, registry::HASH, "key?", hash_has_key);
    define(rt, registry::HASH, "keys", hash_keys);
    define(rt, registry::HASH, "values", hash_values);
    define(rt, registry::HASH, "empty?", hash_empty);

    define(rt, registry::RANGE, "first", range_first);
    define(rt, registry::RANGE, "last", range_last);
    define(rt, registry::RANGE, "exclude_end?", range_exclude_end);
}

// =============================================================================
// Array
// =============================================================================

fn array_get(ctx: &mut BuiltinCall<'_>) {
    let (Value::Array(r), Some(i)) = (ctx.arg(0), ctx.arg_fixnum(1)) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.rt.heap.array(r).map(|a| a.get(i)).unwrap_or(Value::Nil);
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn array_set(ctx: &mut BuiltinCall<'_>) {
    let (Value::Array(r), Some(i)) = (ctx.arg(0), ctx.arg_fixnum(1)) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.arg(2);
    ctx.rt.dup(v);
    if let Err(e) = ctx.rt.heap.array_set(&mut ctx.rt.pool, r, i, v) {
        *ctx.error_code = e.code();
        return;
    }
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn array_size(ctx: &mut BuiltinCall<'_>) {
    let Value::Array(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let len = ctx.rt.heap.array(r).map(|a| a.len()).unwrap_or(0);
    ctx.return_fixnum(len as i64);
}

/// `push` / `<<` answer the receiver, so they chain.
fn array_push(ctx: &mut BuiltinCall<'_>) {
    let Value::Array(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.arg(1);
    ctx.rt.dup(v);
    if let Err(e) = ctx.rt.heap.array_push(&mut ctx.rt.pool, r, v) {
        *ctx.error_code = e.code();
    }
}

fn array_pop(ctx: &mut BuiltinCall<'_>) {
    let Value::Array(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.rt.heap.array_pop(r);
    ctx.set_return(v);
}

fn array_first(ctx: &mut BuiltinCall<'_>) {
    let Value::Array(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.rt.heap.array(r).map(|a| a.get(0)).unwrap_or(Value::Nil);
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn array_last(ctx: &mut BuiltinCall<'_>) {
    let Value::Array(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.rt.heap.array(r).map(|a| a.get(-1)).unwrap_or(Value::Nil);
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn array_empty(ctx: &mut BuiltinCall<'_>) {
    let Value::Array(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let empty = ctx.rt.heap.array(r).map(|a| a.is_empty()).unwrap_or(true);
    ctx.return_bool(empty);
}

// =============================================================================
// String
// =============================================================================

#[cfg(feature = "string")]
fn string_add(ctx: &mut BuiltinCall<'_>) {
    let (Value::String(x), Value::String(y)) = (ctx.arg(0), ctx.arg(1)) else {
        ctx.rt
            .console
            .diag(format_args!("TypeError: no implicit conversion into String"));
        ctx.return_nil();
        return;
    };
    let joined = match (ctx.rt.heap.string(x), ctx.rt.heap.string(y)) {
        (Some(sx), Some(sy)) => {
            let mut out = Vec::with_capacity(sx.len() + sy.len());
            out.extend_from_slice(sx.as_bytes());
            out.extend_from_slice(sy.as_bytes());
            out
        }
        _ => {
            ctx.return_nil();
            return;
        }
    };
    string_return(ctx, &joined);
}

#[cfg(feature = "string")]
fn string_size(ctx: &mut BuiltinCall<'_>) {
    let Value::String(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let len = ctx.rt.heap.string(r).map(|s| s.len()).unwrap_or(0);
    ctx.return_fixnum(len as i64);
}

#[cfg(feature = "string")]
fn string_to_i(ctx: &mut BuiltinCall<'_>) {
    let Value::String(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let n = ctx.rt.heap.string(r).map(|s| s.to_i(10)).unwrap_or(0);
    ctx.return_fixnum(n);
}

/// `to_s` on a string answers the receiver unchanged.
#[cfg(feature = "string")]
fn string_to_s(_ctx: &mut BuiltinCall<'_>) {}

#[cfg(feature = "string")]
fn string_empty(ctx: &mut BuiltinCall<'_>) {
    let Value::String(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let empty = ctx.rt.heap.string(r).map(|s| s.is_empty()).unwrap_or(true);
    ctx.return_bool(empty);
}

// =============================================================================
// Hash
// =============================================================================

fn hash_get(ctx: &mut BuiltinCall<'_>) {
    let Value::Hash(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.rt.heap.hash_get(r, ctx.arg(1));
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn hash_set(ctx: &mut BuiltinCall<'_>) {
    let Value::Hash(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let (k, v) = (ctx.arg(1), ctx.arg(2));
    ctx.rt.dup(k);
    ctx.rt.dup(v);
    if let Err(e) = ctx.rt.heap.hash_set(&mut ctx.rt.pool, r, k, v) {
        *ctx.error_code = e.code();
        return;
    }
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn hash_size(ctx: &mut BuiltinCall<'_>) {
    let Value::Hash(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let len = ctx.rt.heap.hash(r).map(|h| h.len()).unwrap_or(0);
    ctx.return_fixnum(len as i64);
}

fn hash_has_key(ctx: &mut BuiltinCall<'_>) {
    let Value::Hash(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let found = ctx.rt.heap.hash_index_of(r, ctx.arg(1)).is_some();
    ctx.return_bool(found);
}

fn hash_keys(ctx: &mut BuiltinCall<'_>) {
    hash_halves(ctx, 0);
}

fn hash_values(ctx: &mut BuiltinCall<'_>) {
    hash_halves(ctx, 1);
}

/// Shared body of `keys`/`values`: collect every other slot into a new
/// array.
fn hash_halves(ctx: &mut BuiltinCall<'_>, offset: usize) {
    let Value::Hash(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let items: Vec<Value> = match ctx.rt.heap.hash(r) {
        Some(h) => h.data.iter().skip(offset).step_by(2).copied().collect(),
        None => Vec::new(),
    };
    let arr = match ctx.rt.heap.new_array(&mut ctx.rt.pool, ctx.vm_id, items.len()) {
        Ok(v) => v,
        Err(e) => {
            *ctx.error_code = e.code();
            return;
        }
    };
    if let Some(aref) = arr.heap_ref() {
        for v in items {
            ctx.rt.dup(v);
            if let Err(e) = ctx.rt.heap.array_push(&mut ctx.rt.pool, aref, v) {
                *ctx.error_code = e.code();
                ctx.rt.release(arr);
                return;
            }
        }
    }
    ctx.set_return(arr);
}

fn hash_empty(ctx: &mut BuiltinCall<'_>) {
    let Value::Hash(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let empty = ctx.rt.heap.hash(r).map(|h| h.is_empty()).unwrap_or(true);
    ctx.return_bool(empty);
}

// =============================================================================
// Range
// =============================================================================

fn range_first(ctx: &mut BuiltinCall<'_>) {
    let Value::Range(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.rt.heap.range(r).map(|rr| rr.first).unwrap_or(Value::Nil);
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn range_last(ctx: &mut BuiltinCall<'_>) {
    let Value::Range(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let v = ctx.rt.heap.range(r).map(|rr| rr.last).unwrap_or(Value::Nil);
    ctx.rt.dup(v);
    ctx.set_return(v);
}

fn range_exclude_end(ctx: &mut BuiltinCall<'_>) {
    let Value::Range(r) = ctx.arg(0) else {
        ctx.return_nil();
        return;
    };
    let ex = ctx.rt.heap.range(r).map(|rr| rr.exclusive).unwrap_or(false);
    ctx.return_bool(ex);
}
