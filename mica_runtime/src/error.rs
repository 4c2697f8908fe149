//! Runtime error kinds.
//!
//! The interpreter does not unwind: most of these are printed as console
//! diagnostics and execution continues with a nil result. Only out-of-memory
//! from a constructor aborts a VM; the numeric code ends up in the VM's
//! `error_code` word and becomes the scheduler's return value.

use std::fmt;

/// Closed set of runtime failure kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The fixed pool could not satisfy an allocation.
    OutOfMemory,
    /// Method lookup missed. Carries "Class#method".
    UndefinedMethod(String),
    /// Constant lookup missed.
    UninitializedConstant(String),
    /// Operand types did not match a fast path that cannot fall back.
    TypeError(String),
    /// The bytecode container was structurally invalid.
    BytecodeFormat(String),
    /// The intern table is at capacity.
    SymbolTableFull,
    /// Integer division by zero.
    ZeroDivision,
}

impl RuntimeError {
    /// Numeric error word reported by `run()`. Zero is reserved for a
    /// normal halt.
    pub fn code(&self) -> u32 {
        match self {
            RuntimeError::OutOfMemory => 1,
            RuntimeError::UndefinedMethod(_) => 2,
            RuntimeError::UninitializedConstant(_) => 3,
            RuntimeError::TypeError(_) => 4,
            RuntimeError::BytecodeFormat(_) => 5,
            RuntimeError::SymbolTableFull => 6,
            RuntimeError::ZeroDivision => 7,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::OutOfMemory => write!(f, "NoMemoryError: out of memory"),
            RuntimeError::UndefinedMethod(m) => write!(f, "NoMethodError: undefined method '{}'", m),
            RuntimeError::UninitializedConstant(c) => {
                write!(f, "NameError: uninitialized constant {}", c)
            }
            RuntimeError::TypeError(m) => write!(f, "TypeError: {}", m),
            RuntimeError::BytecodeFormat(m) => write!(f, "bytecode format error: {}", m),
            RuntimeError::SymbolTableFull => write!(f, "symbol table full"),
            RuntimeError::ZeroDivision => write!(f, "ZeroDivisionError: divided by 0"),
        }
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_nonzero() {
        let all = [
            RuntimeError::OutOfMemory,
            RuntimeError::UndefinedMethod(String::new()),
            RuntimeError::UninitializedConstant(String::new()),
            RuntimeError::TypeError(String::new()),
            RuntimeError::BytecodeFormat(String::new()),
            RuntimeError::SymbolTableFull,
            RuntimeError::ZeroDivision,
        ];
        let mut codes: Vec<u32> = all.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert!(codes.iter().all(|&c| c != 0));
    }
}
