//! Built-in method library.
//!
//! Everything here is registered on the built-in classes at interpreter
//! startup, before any task runs. Built-ins follow the host convention:
//! read arguments out of the receiver window, write the result into slot 0.

mod containers;
#[cfg(feature = "math")]
mod math;
mod numeric;
mod object;

use mica_runtime::{BuiltinFn, ClassId, MethodKind, Runtime};

/// Register the whole library.
pub fn install(rt: &mut Runtime) {
    object::install(rt);
    containers::install(rt);
    numeric::install(rt);
    #[cfg(feature = "math")]
    math::install(rt);
}

/// Register one built-in function.
pub(crate) fn define(rt: &mut Runtime, cls: ClassId, name: &str, f: BuiltinFn) {
    if let Some(sym) = rt.sym(name) {
        rt.classes.define_method(cls, sym, MethodKind::Builtin(f));
    }
}

/// Register a special-kind method (`new`, `Proc#call`).
pub(crate) fn define_kind(rt: &mut Runtime, cls: ClassId, name: &str, kind: MethodKind) {
    if let Some(sym) = rt.sym(name) {
        rt.classes.define_method(cls, sym, kind);
    }
}
