//! Dynamic array payload.

use crate::value::Value;

/// Growable value sequence. Growth is geometric; the heap re-charges the
/// pool before any capacity change.
#[derive(Debug, Default)]
pub struct RArray {
    pub data: Vec<Value>,
}

impl RArray {
    pub fn with_capacity(cap: usize) -> RArray {
        RArray {
            data: Vec::with_capacity(cap),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Indexed read with negative-index support. Out of range reads nil.
    pub fn get(&self, index: i64) -> Value {
        let len = self.data.len() as i64;
        let i = if index < 0 { len + index } else { index };
        if i < 0 || i >= len {
            Value::Nil
        } else {
            self.data[i as usize]
        }
    }

    /// Bytes this payload charges against the pool.
    pub fn payload_size(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<Value>()
    }
}
