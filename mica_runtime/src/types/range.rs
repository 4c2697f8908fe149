//! Range payload.

use crate::value::Value;

/// Two endpoint values and an exclusive-end flag. Endpoints are owned
/// (duplicated on construction, released with the range).
#[derive(Debug)]
pub struct RRange {
    pub first: Value,
    pub last: Value,
    pub exclusive: bool,
}

impl RRange {
    pub fn new(first: Value, last: Value, exclusive: bool) -> RRange {
        RRange {
            first,
            last,
            exclusive,
        }
    }

    /// Fixnum membership test; `None` when the endpoints are not fixnums.
    pub fn contains_fixnum(&self, n: i64) -> Option<bool> {
        let (first, last) = (self.first.as_fixnum()?, self.last.as_fixnum()?);
        Some(if self.exclusive {
            first <= n && n < last
        } else {
            first <= n && n <= last
        })
    }

    pub fn payload_size(&self) -> usize {
        2 * std::mem::size_of::<Value>()
    }
}
