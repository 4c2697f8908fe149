//! Compiled unit representation.
//!
//! An `Irep` is the immutable result of loading one method body: its code
//! array, literal pool, symbol spellings and nested child units (blocks,
//! lambdas, method bodies defined inside it). Parents own their children;
//! sharing (a proc capturing a child irep) goes through `Arc`.

use std::sync::Arc;

/// A literal pool entry.
///
/// Strings are raw byte sequences - the source language does not promise
/// valid UTF-8 in string literals.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolValue {
    Str(Box<[u8]>),
    Fixnum(i64),
    #[cfg(feature = "float")]
    Float(f64),
}

/// An immutable compiled unit.
///
/// Structural equality (derived) compares code, pools, symbol spellings and
/// children - the loader round-trip tests rely on it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Irep {
    /// Local variable count.
    pub nlocals: u16,
    /// Registers this frame requires.
    pub nregs: u16,
    /// 32-bit instruction words, already in host byte order.
    pub code: Vec<u32>,
    /// Literal pool, indexed by LOADL / STRING.
    pub pools: Vec<PoolValue>,
    /// Symbol spellings, indexed by the B field of name-carrying opcodes.
    /// Interning happens lazily at execution time.
    pub sym_names: Vec<Box<str>>,
    /// Child units.
    pub reps: Vec<Arc<Irep>>,
}

impl Irep {
    /// Fetch the instruction word at `pc`, if in range.
    #[inline]
    pub fn fetch(&self, pc: usize) -> Option<u32> {
        self.code.get(pc).copied()
    }

    /// Symbol spelling for ordinal `n`.
    #[inline]
    pub fn sym_name(&self, n: usize) -> Option<&str> {
        self.sym_names.get(n).map(|s| s.as_ref())
    }

    /// Approximate memory footprint of this unit and all children, used to
    /// charge the fixed pool for loaded code.
    pub fn memory_footprint(&self) -> usize {
        let mut bytes = std::mem::size_of::<Irep>();
        bytes += self.code.len() * 4;
        for p in &self.pools {
            bytes += std::mem::size_of::<PoolValue>();
            if let PoolValue::Str(s) = p {
                bytes += s.len();
            }
        }
        for s in &self.sym_names {
            bytes += s.len() + std::mem::size_of::<Box<str>>();
        }
        for r in &self.reps {
            bytes += r.memory_footprint();
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Irep {
            nlocals: 1,
            nregs: 4,
            code: vec![1, 2, 3],
            pools: vec![PoolValue::Fixnum(7)],
            sym_names: vec!["puts".into()],
            reps: vec![],
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.code[1] = 9;
        assert_ne!(a, b);
    }

    #[test]
    fn footprint_counts_children() {
        let child = Arc::new(Irep {
            code: vec![0; 8],
            ..Default::default()
        });
        let parent = Irep {
            reps: vec![child.clone()],
            ..Default::default()
        };
        assert!(parent.memory_footprint() > child.memory_footprint());
    }
}
