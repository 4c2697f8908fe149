//! Hash payload.
//!
//! An ordered `[k0, v0, k1, v1, ...]` sequence with linear key search:
//! tables on the target hardware hold a handful of entries, and insertion
//! order falls out for free. Key comparison needs the heap (keys may be
//! heap values), so lookup lives on [`crate::heap::Heap`].

use crate::value::Value;

/// Flat key/value sequence in insertion order.
#[derive(Debug, Default)]
pub struct RHash {
    pub data: Vec<Value>,
}

impl RHash {
    pub fn with_capacity(pairs: usize) -> RHash {
        RHash {
            data: Vec::with_capacity(pairs * 2),
        }
    }

    /// Number of key/value pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / 2
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = Value> + '_ {
        self.data.iter().step_by(2).copied()
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.data.iter().skip(1).step_by(2).copied()
    }

    pub fn payload_size(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<Value>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_and_order() {
        let h = RHash {
            data: vec![
                Value::Fixnum(1),
                Value::True,
                Value::Fixnum(2),
                Value::False,
            ],
        };
        assert_eq!(h.len(), 2);
        let keys: Vec<_> = h.keys().collect();
        assert_eq!(keys, vec![Value::Fixnum(1), Value::Fixnum(2)]);
        let vals: Vec<_> = h.values().collect();
        assert_eq!(vals, vec![Value::True, Value::False]);
    }
}
