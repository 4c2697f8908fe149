//! Opcode handlers, grouped by role.

pub mod arithmetic;
pub mod calls;
pub mod classes;
pub mod containers;
pub mod control;
pub mod load_store;
pub mod variables;

use crate::vm::Vm;
use mica_runtime::{Runtime, SymId};

/// Resolve the B-field symbol ordinal of the current unit to an interned
/// id, printing a diagnostic when the table is full or the ordinal is
/// out of range.
pub(crate) fn resolve_sym(vm: &Vm, rt: &mut Runtime, n: usize) -> Option<SymId> {
    let irep = vm.pc_irep.clone();
    let Some(name) = irep.sym_name(n) else {
        rt.console
            .diag(format_args!("bad symbol ordinal {}", n));
        return None;
    };
    let sym = rt.sym(name);
    if sym.is_none() {
        rt.console.diag(format_args!(
            "{}",
            mica_runtime::RuntimeError::SymbolTableFull
        ));
    }
    sym
}
