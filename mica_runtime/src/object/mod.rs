//! Object model: classes, methods, procs and instances.

pub mod class;
pub mod instance;
pub mod proc;
pub mod registry;

pub use class::Class;
pub use instance::RInstance;
pub use proc::{BuiltinCall, BuiltinFn, Method, MethodKind, RProc, WaitReason};
pub use registry::ClassRegistry;
