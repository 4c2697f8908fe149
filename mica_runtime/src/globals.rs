//! Global and constant variable stores.
//!
//! Both are process-wide, shared by every VM, and keyed by interned symbol
//! id. Values stored here are owned by the store: setters take an
//! already-duplicated value and hand back the displaced one for the caller
//! to release.

use crate::symbol::SymId;
use crate::value::Value;
use rustc_hash::FxHashMap;

/// `$`-variable store.
#[derive(Debug, Default)]
pub struct GlobalScope {
    bindings: FxHashMap<SymId, Value>,
}

impl GlobalScope {
    pub fn new() -> GlobalScope {
        GlobalScope::default()
    }

    #[inline]
    pub fn get(&self, sym: SymId) -> Option<Value> {
        self.bindings.get(&sym).copied()
    }

    /// Store a binding; returns the displaced value, if any.
    #[inline]
    pub fn set(&mut self, sym: SymId, value: Value) -> Option<Value> {
        self.bindings.insert(sym, value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.bindings.values().copied()
    }
}

/// Constant store. Class definitions also register here so `GETCONST` on a
/// class name resolves.
#[derive(Debug, Default)]
pub struct ConstScope {
    bindings: FxHashMap<SymId, Value>,
}

impl ConstScope {
    pub fn new() -> ConstScope {
        ConstScope::default()
    }

    #[inline]
    pub fn get(&self, sym: SymId) -> Option<Value> {
        self.bindings.get(&sym).copied()
    }

    #[inline]
    pub fn set(&mut self, sym: SymId, value: Value) -> Option<Value> {
        self.bindings.insert(sym, value)
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.bindings.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returns_displaced() {
        let mut g = GlobalScope::new();
        assert_eq!(g.set(SymId(1), Value::Fixnum(7)), None);
        assert_eq!(g.set(SymId(1), Value::Fixnum(8)), Some(Value::Fixnum(7)));
        assert_eq!(g.get(SymId(1)), Some(Value::Fixnum(8)));
        assert_eq!(g.get(SymId(2)), None);
    }
}
