//! Bytecode model for the mica virtual machine.
//!
//! This crate holds everything the VM needs to know about compiled code:
//!
//! - [`Opcode`] - the closed, numbered instruction set
//! - [`instruction`] - 32-bit field extraction and construction helpers
//! - [`Irep`] - an immutable compiled unit (code, literal pool, symbols,
//!   nested children)
//! - [`loader`] - the RITE container parser and serializer
//!
//! The compiler that produces RITE containers is external; this crate only
//! loads and re-serializes them. The opcode numbering and the container
//! layout are part of the wire format and must not change.

pub mod instruction;
pub mod irep;
pub mod loader;

pub use instruction::{Instruction, Opcode};
pub use irep::{Irep, PoolValue};
pub use loader::{dump, load, LoadError};
