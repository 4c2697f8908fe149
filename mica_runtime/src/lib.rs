//! Runtime value system for the mica virtual machine.
//!
//! This crate provides everything below the bytecode layer:
//!
//! - **Fixed pool** ([`alloc`]): a first-fit block allocator over one
//!   contiguous region, with per-VM ownership tags and bulk reclamation
//! - **Symbols** ([`symbol`]): a capped process-wide intern table
//! - **Values** ([`value`], [`heap`]): a `Copy` tagged value type with
//!   explicit reference counting in a slab
//! - **Containers** ([`types`]): array, byte string, range and
//!   insertion-ordered hash
//! - **Object model** ([`object`]): classes, single-inheritance method
//!   lookup, procs and instances
//! - **Shared stores** ([`globals`]): global and constant variables
//! - **Host seam** ([`hal`], [`console`]): the handful of hooks the
//!   embedder must provide
//!
//! The [`Runtime`] aggregate ties these together and is passed explicitly
//! into every VM entry point; the cooperative scheduler guarantees only one
//! VM uses it at a time.

pub mod alloc;
pub mod config;
pub mod console;
pub mod error;
pub mod globals;
pub mod hal;
pub mod heap;
pub mod object;
pub mod symbol;
pub mod types;
pub mod value;

mod runtime;

pub use alloc::{BlockHandle, MemoryPool, Statistics};
pub use console::Console;
pub use error::RuntimeError;
pub use hal::{CaptureHal, Hal, HalRef, StdHal};
pub use heap::{Heap, HeapObject};
pub use object::{BuiltinCall, BuiltinFn, Method, MethodKind, WaitReason};
pub use runtime::Runtime;
pub use symbol::{SymId, SymbolTable};
pub use value::{ClassId, HeapRef, Value};
