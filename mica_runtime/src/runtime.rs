//! The process-wide runtime aggregate.
//!
//! Everything shared by every VM - the fixed pool, the heap, the symbol
//! table, the global/constant stores and the class registry - lives in one
//! `Runtime` passed explicitly to every entry point. The cooperative
//! scheduling invariant makes this safe: only the running VM touches it.

use crate::alloc::{MemoryPool, Statistics};
use crate::console::Console;
use crate::globals::{ConstScope, GlobalScope};
use crate::hal::{HalRef, StdHal};
use crate::heap::Heap;
use crate::object::registry::{self, ClassRegistry};
use crate::symbol::{SymId, SymbolTable};
use crate::value::{ClassId, Value};
use std::sync::Arc;

/// Shared interpreter state.
#[derive(Debug)]
pub struct Runtime {
    pub pool: MemoryPool,
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub globals: GlobalScope,
    pub consts: ConstScope,
    pub classes: ClassRegistry,
    pub console: Console,
}

impl Runtime {
    /// Build a runtime over a fresh pool of `pool_size` bytes, with console
    /// output on stdout.
    pub fn new(pool_size: usize) -> Runtime {
        Runtime::with_hal(pool_size, Arc::new(StdHal))
    }

    /// Build a runtime with a host-supplied HAL.
    pub fn with_hal(pool_size: usize, hal: HalRef) -> Runtime {
        let mut symbols = SymbolTable::new();
        let classes = ClassRegistry::new(&mut symbols);
        let mut rt = Runtime {
            pool: MemoryPool::new(pool_size),
            heap: Heap::new(),
            symbols,
            globals: GlobalScope::new(),
            consts: ConstScope::new(),
            classes,
            console: Console::new(hal),
        };
        // Built-in class names resolve as constants.
        for i in 0..rt.classes.len() {
            let id = ClassId(i as u16);
            if let Some(c) = rt.classes.get(id) {
                rt.consts.set(c.sym_id, Value::Class(id));
            }
        }
        rt
    }

    // =========================================================================
    // Value plumbing
    // =========================================================================

    #[inline]
    pub fn dup(&mut self, v: Value) {
        self.heap.dup(v);
    }

    #[inline]
    pub fn release(&mut self, v: Value) {
        self.heap.release(&mut self.pool, v);
    }

    #[inline]
    pub fn compare(&self, a: Value, b: Value) -> i32 {
        self.heap.compare(a, b)
    }

    /// Intern a name. `None` when the symbol table is full.
    #[inline]
    pub fn sym(&mut self, name: &str) -> Option<SymId> {
        self.symbols.str_to_symid(name)
    }

    /// Spelling of an interned symbol, or a placeholder.
    pub fn sym_name(&self, sym: SymId) -> &str {
        self.symbols.symid_to_str(sym).unwrap_or("?")
    }

    /// Class of a value for method dispatch. A class receiver dispatches
    /// through its own chain (that is how `new` reaches `Object#new`).
    pub fn class_of(&self, v: Value) -> ClassId {
        match v {
            Value::Empty | Value::Nil => registry::NIL_CLASS,
            Value::False => registry::FALSE_CLASS,
            Value::True => registry::TRUE_CLASS,
            Value::Fixnum(_) => registry::FIXNUM,
            #[cfg(feature = "float")]
            Value::Float(_) => registry::FLOAT,
            Value::Symbol(_) => registry::SYMBOL,
            Value::Class(c) => c,
            Value::Object(r) => self
                .heap
                .instance(r)
                .map(|i| i.class)
                .unwrap_or(registry::OBJECT),
            Value::Proc(_) => registry::PROC,
            Value::Array(_) => registry::ARRAY,
            #[cfg(feature = "string")]
            Value::String(_) => registry::STRING,
            Value::Range(_) => registry::RANGE,
            Value::Hash(_) => registry::HASH,
        }
    }

    /// Define (or reopen) a class and bind its name as a constant.
    pub fn define_class(&mut self, name: &str, super_id: ClassId) -> Option<ClassId> {
        let sym = self.sym(name)?;
        let id = self.classes.define_class(sym, super_id);
        if self.consts.get(sym).is_none() {
            self.consts.set(sym, Value::Class(id));
        }
        Some(id)
    }

    /// Store a global; the value must already be duplicated by the caller.
    pub fn global_set(&mut self, sym: SymId, v: Value) {
        if let Some(old) = self.globals.set(sym, v) {
            self.release(old);
        }
    }

    /// Store a constant; the value must already be duplicated by the caller.
    pub fn const_set(&mut self, sym: SymId, v: Value) {
        if let Some(old) = self.consts.set(sym, v) {
            self.release(old);
        }
    }

    /// Untag everything reachable from the global and constant stores, so a
    /// terminating VM's bulk sweep spares it.
    pub fn clear_global_vm_ids(&mut self) {
        let roots: Vec<Value> = self
            .globals
            .values()
            .chain(self.consts.values())
            .collect();
        for v in roots {
            self.heap.clear_vm_id(&mut self.pool, v);
        }
    }

    /// Pool usage snapshot.
    #[inline]
    pub fn statistics(&self) -> Statistics {
        self.pool.statistics()
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// `puts`-style rendering.
    pub fn display_value(&self, v: Value) -> String {
        match v {
            Value::Empty | Value::Nil => String::new(),
            #[cfg(feature = "string")]
            Value::String(r) => self
                .heap
                .string(r)
                .map(|s| s.to_display().into_owned())
                .unwrap_or_default(),
            other => self.inspect_value(other),
        }
    }

    /// `p`-style rendering.
    pub fn inspect_value(&self, v: Value) -> String {
        match v {
            Value::Empty | Value::Nil => "nil".into(),
            Value::False => "false".into(),
            Value::True => "true".into(),
            Value::Fixnum(n) => n.to_string(),
            #[cfg(feature = "float")]
            Value::Float(d) => format!("{:?}", d),
            Value::Symbol(s) => format!(":{}", self.sym_name(s)),
            Value::Class(c) => self
                .classes
                .get(c)
                .map(|cls| self.sym_name(cls.sym_id).to_string())
                .unwrap_or_else(|| "?".into()),
            Value::Object(r) => {
                let name = self
                    .heap
                    .instance(r)
                    .and_then(|i| self.classes.get(i.class))
                    .map(|c| self.sym_name(c.sym_id))
                    .unwrap_or("?");
                format!("#<{}>", name)
            }
            Value::Proc(_) => "#<Proc>".into(),
            Value::Array(r) => match self.heap.array(r) {
                Some(a) => {
                    let items: Vec<String> =
                        a.data.iter().map(|e| self.inspect_value(*e)).collect();
                    format!("[{}]", items.join(", "))
                }
                None => "[]".into(),
            },
            #[cfg(feature = "string")]
            Value::String(r) => match self.heap.string(r) {
                Some(s) => format!("\"{}\"", s.to_display()),
                None => "\"\"".into(),
            },
            Value::Range(r) => match self.heap.range(r) {
                Some(rr) => format!(
                    "{}{}{}",
                    self.inspect_value(rr.first),
                    if rr.exclusive { "..." } else { ".." },
                    self.inspect_value(rr.last)
                ),
                None => "..".into(),
            },
            Value::Hash(r) => match self.heap.hash(r) {
                Some(h) => {
                    let items: Vec<String> = (0..h.data.len())
                        .step_by(2)
                        .map(|i| {
                            format!(
                                "{}=>{}",
                                self.inspect_value(h.data[i]),
                                self.inspect_value(h.data[i + 1])
                            )
                        })
                        .collect();
                    format!("{{{}}}", items.join(", "))
                }
                None => "{}".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::CaptureHal;

    fn runtime() -> Runtime {
        Runtime::with_hal(16 * 1024, Arc::new(CaptureHal::new()))
    }

    #[test]
    fn builtin_class_constants_resolve() {
        let mut rt = runtime();
        let sym = rt.sym("Object").unwrap();
        assert_eq!(rt.consts.get(sym), Some(Value::Class(registry::OBJECT)));
    }

    #[test]
    fn class_of_dispatch_targets() {
        let mut rt = runtime();
        assert_eq!(rt.class_of(Value::Fixnum(1)), registry::FIXNUM);
        assert_eq!(rt.class_of(Value::Nil), registry::NIL_CLASS);
        let cls = rt.define_class("Widget", registry::OBJECT).unwrap();
        assert_eq!(rt.class_of(Value::Class(cls)), cls);
        let inst = rt.heap.new_instance(&mut rt.pool, 1, cls);
        let inst = inst.unwrap();
        assert_eq!(rt.class_of(inst), cls);
    }

    #[test]
    fn global_set_releases_displaced() {
        let mut rt = runtime();
        let sym = rt.sym("$x").unwrap();
        let arr = rt.heap.new_array(&mut rt.pool, 1, 0).unwrap();
        rt.global_set(sym, arr);
        assert_eq!(rt.heap.live(), 1);
        rt.global_set(sym, Value::Fixnum(7));
        assert_eq!(rt.heap.live(), 0);
        assert_eq!(rt.globals.get(sym), Some(Value::Fixnum(7)));
    }

    #[test]
    fn inspect_renders_containers() {
        let mut rt = runtime();
        let v = rt.heap.new_array(&mut rt.pool, 1, 2).unwrap();
        let r = v.heap_ref().unwrap();
        rt.heap.array_push(&mut rt.pool, r, Value::Fixnum(1)).unwrap();
        rt.heap.array_push(&mut rt.pool, r, Value::Nil).unwrap();
        assert_eq!(rt.inspect_value(v), "[1, nil]");
        rt.release(v);
    }
}
