//! Global class table.
//!
//! Classes live in a single vector indexed by [`ClassId`]; the built-in
//! classes occupy fixed ids assigned at construction. Method lookup walks
//! the superclass chain from the receiver's class to the root.

use crate::object::class::Class;
use crate::object::proc::{Method, MethodKind};
use crate::symbol::{SymId, SymbolTable};
use crate::value::ClassId;

// Fixed ids for the built-in classes, in construction order.
pub const OBJECT: ClassId = ClassId(0);
pub const NIL_CLASS: ClassId = ClassId(1);
pub const FALSE_CLASS: ClassId = ClassId(2);
pub const TRUE_CLASS: ClassId = ClassId(3);
pub const FIXNUM: ClassId = ClassId(4);
pub const FLOAT: ClassId = ClassId(5);
pub const SYMBOL: ClassId = ClassId(6);
pub const STRING: ClassId = ClassId(7);
pub const ARRAY: ClassId = ClassId(8);
pub const RANGE: ClassId = ClassId(9);
pub const HASH: ClassId = ClassId(10);
pub const PROC: ClassId = ClassId(11);

const BUILTIN_NAMES: &[&str] = &[
    "Object",
    "NilClass",
    "FalseClass",
    "TrueClass",
    "Fixnum",
    "Float",
    "Symbol",
    "String",
    "Array",
    "Range",
    "Hash",
    "Proc",
];

/// The process-wide class table.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<Class>,
}

impl ClassRegistry {
    /// Build the registry with the built-in hierarchy: every built-in class
    /// descends directly from `Object`.
    pub fn new(symbols: &mut SymbolTable) -> ClassRegistry {
        let mut reg = ClassRegistry {
            classes: Vec::with_capacity(BUILTIN_NAMES.len()),
        };
        for (i, name) in BUILTIN_NAMES.iter().enumerate() {
            // The fresh table always has room for the built-in names.
            let sym = symbols
                .str_to_symid(name)
                .unwrap_or(SymId(u16::MAX));
            let super_id = if i == 0 { None } else { Some(OBJECT) };
            reg.classes.push(Class::new(sym, super_id));
        }
        reg
    }

    #[inline]
    pub fn get(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(id.0 as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut Class> {
        self.classes.get_mut(id.0 as usize)
    }

    /// Define (or reopen) a class. An existing class with the same name is
    /// returned untouched; otherwise a new record is chained.
    pub fn define_class(&mut self, name_sym: SymId, super_id: ClassId) -> ClassId {
        if let Some(i) = self.classes.iter().position(|c| c.sym_id == name_sym) {
            return ClassId(i as u16);
        }
        self.classes.push(Class::new(name_sym, Some(super_id)));
        ClassId((self.classes.len() - 1) as u16)
    }

    /// Install a method on a class (prepend + dedup, see [`Class::define`]).
    pub fn define_method(&mut self, cls: ClassId, sym: SymId, kind: MethodKind) {
        if let Some(class) = self.get_mut(cls) {
            class.define(Method { sym_id: sym, kind });
        }
    }

    /// Walk the superclass chain from `start` and return the first method
    /// matching `sym`.
    pub fn find_method(&self, start: ClassId, sym: SymId) -> Option<&Method> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let class = self.get(id)?;
            if let Some(m) = class.find_local(sym) {
                return Some(m);
            }
            cur = class.super_id;
        }
        None
    }

    /// Like [`find_method`](Self::find_method), but starts the walk at the
    /// superclass of `below` (SUPER dispatch). Also reports the class that
    /// defined the method.
    pub fn find_super_method(&self, below: ClassId, sym: SymId) -> Option<(ClassId, &Method)> {
        let mut cur = self.get(below)?.super_id;
        while let Some(id) = cur {
            let class = self.get(id)?;
            if let Some(m) = class.find_local(sym) {
                return Some((id, m));
            }
            cur = class.super_id;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
