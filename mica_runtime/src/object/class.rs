//! Class records.
//!
//! A class is a name, an optional superclass and a chain of method records.
//! The chain is ordered: method definition prepends, so the newest
//! definition wins a front-to-back scan, and the registry unlinks one older
//! duplicate at define time to keep the chain from growing unboundedly.

use crate::object::proc::Method;
use crate::symbol::SymId;
use crate::value::ClassId;
use smallvec::SmallVec;

/// A class record. The distinguished root class `Object` has no superclass
/// and carries the host-registered built-in methods.
#[derive(Debug)]
pub struct Class {
    /// Interned class name.
    pub sym_id: SymId,
    /// Superclass, `None` only for `Object`.
    pub super_id: Option<ClassId>,
    /// Method chain, newest first.
    pub procs: SmallVec<[Method; 4]>,
}

impl Class {
    pub fn new(sym_id: SymId, super_id: Option<ClassId>) -> Class {
        Class {
            sym_id,
            super_id,
            procs: SmallVec::new(),
        }
    }

    /// First method in the chain with the given name.
    #[inline]
    pub fn find_local(&self, sym: SymId) -> Option<&Method> {
        self.procs.iter().find(|m| m.sym_id == sym)
    }

    /// Prepend a method and unlink one later method with the same name.
    pub fn define(&mut self, method: Method) {
        let sym = method.sym_id;
        self.procs.insert(0, method);
        if let Some(dup) = self.procs.iter().skip(1).position(|m| m.sym_id == sym) {
            self.procs.remove(dup + 1);
        }
    }

    /// Number of methods in the chain.
    #[inline]
    pub fn method_count(&self) -> usize {
        self.procs.len()
    }
}
