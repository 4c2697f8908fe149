#![allow(dead_code)]
//! Test support: hand-assembled IREPs and capture-console interpreters.
//!
//! The compiler that produces RITE containers is external to this
//! repository, so tests synthesize instruction words and containers
//! directly.

use mica_bytecode::instruction::{mk_abc, mk_abx, mk_asbx, mk_ax, mk_bz};
use mica_bytecode::{dump, Irep, Opcode, PoolValue};
use mica_runtime::CaptureHal;
use mica_vm::Interp;
use std::sync::Arc;

pub use mica_bytecode::Opcode as Op;

/// Assemble an IREP from parts.
pub fn irep(
    nregs: u16,
    code: Vec<u32>,
    pools: Vec<PoolValue>,
    syms: &[&str],
    reps: Vec<Irep>,
) -> Irep {
    Irep {
        nlocals: 0,
        nregs,
        code,
        pools,
        sym_names: syms.iter().map(|s| (*s).into()).collect(),
        reps: reps.into_iter().map(Arc::new).collect(),
    }
}

/// Serialize an IREP tree into a loadable container.
pub fn blob(top: &Irep) -> Vec<u8> {
    dump(top)
}

/// Interpreter with a capturing console.
pub fn capture_interp(pool_size: usize) -> (Interp, Arc<CaptureHal>) {
    let hal = Arc::new(CaptureHal::new());
    let interp = Interp::with_hal(pool_size, hal.clone());
    (interp, hal)
}

// Shorthand instruction constructors.

pub fn abc(op: Opcode, a: usize, b: usize, c: usize) -> u32 {
    mk_abc(op, a, b, c)
}

pub fn abx(op: Opcode, a: usize, bx: usize) -> u32 {
    mk_abx(op, a, bx)
}

pub fn asbx(op: Opcode, a: usize, sbx: i32) -> u32 {
    mk_asbx(op, a, sbx)
}

pub fn ax(op: Opcode, v: u32) -> u32 {
    mk_ax(op, v)
}

pub fn bz(op: Opcode, a: usize, child: usize) -> u32 {
    mk_bz(op, a, child, 0)
}

/// ENTER word for `mandatory` required and `optional` defaulted
/// parameters.
pub fn enter_sig(mandatory: u32, optional: u32) -> u32 {
    mk_ax(Opcode::Enter, (mandatory << 18) | (optional << 13))
}
