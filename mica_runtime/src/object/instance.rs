//! Instance payload.

use crate::symbol::SymId;
use crate::value::{ClassId, Value};

/// An instance of a user-defined class: class pointer plus an ordered
/// instance-variable list. Instances on the target hardware carry a handful
/// of ivars, so a linear list beats a map.
#[derive(Debug)]
pub struct RInstance {
    pub class: ClassId,
    pub ivars: Vec<(SymId, Value)>,
}

impl RInstance {
    pub fn new(class: ClassId) -> RInstance {
        RInstance {
            class,
            ivars: Vec::new(),
        }
    }

    /// Read an instance variable; unset reads nil.
    pub fn getiv(&self, sym: SymId) -> Value {
        self.ivars
            .iter()
            .find(|(s, _)| *s == sym)
            .map(|(_, v)| *v)
            .unwrap_or(Value::Nil)
    }

    /// Position of an ivar slot, if set.
    pub fn ivar_index(&self, sym: SymId) -> Option<usize> {
        self.ivars.iter().position(|(s, _)| *s == sym)
    }

    pub fn payload_size(&self) -> usize {
        self.ivars.capacity() * std::mem::size_of::<(SymId, Value)>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_ivar_reads_nil() {
        let i = RInstance::new(ClassId(0));
        assert_eq!(i.getiv(SymId(3)), Value::Nil);
    }
}
