//! Refcounted object slab.
//!
//! Heap-backed values live in slots here; a slot carries the reference
//! count, the owning VM id and the pool block charged for the payload.
//! `dup` and `release` are the only refcount operations: registers and
//! containers hold plain `Copy` values, so ownership discipline is explicit
//! at every store site, exactly like the C runtime this models.
//!
//! Releasing to zero destroys the object, releases everything it contained
//! (via a worklist, so deep structures cannot overflow the stack) and
//! returns the payload charge to the pool. Cycles never reach zero; they
//! are reclaimed at VM teardown by [`Heap::free_all`].

use crate::alloc::MemoryPool;
use crate::error::RuntimeError;
use crate::object::instance::RInstance;
use crate::object::proc::RProc;
use crate::symbol::SymId;
use crate::types::array::RArray;
use crate::types::hash::RHash;
use crate::types::range::RRange;
#[cfg(feature = "string")]
use crate::types::string::RString;
use crate::value::{ClassId, HeapRef, Value};
use rustc_hash::FxHashSet;

// =============================================================================
// Slots
// =============================================================================

/// Payload of a heap slot.
#[derive(Debug)]
pub enum HeapObject {
    Array(RArray),
    #[cfg(feature = "string")]
    Str(RString),
    Range(RRange),
    Hash(RHash),
    Instance(RInstance),
    Proc(RProc),
}

impl HeapObject {
    /// Bytes charged against the pool for this payload.
    pub fn payload_size(&self) -> usize {
        match self {
            HeapObject::Array(a) => a.payload_size(),
            #[cfg(feature = "string")]
            HeapObject::Str(s) => s.payload_size(),
            HeapObject::Range(r) => r.payload_size(),
            HeapObject::Hash(h) => h.payload_size(),
            HeapObject::Instance(i) => i.payload_size(),
            HeapObject::Proc(p) => p.payload_size(),
        }
    }

    /// The `Value` variant wrapping a reference to this payload.
    fn wrap(&self, r: HeapRef) -> Value {
        match self {
            HeapObject::Array(_) => Value::Array(r),
            #[cfg(feature = "string")]
            HeapObject::Str(_) => Value::String(r),
            HeapObject::Range(_) => Value::Range(r),
            HeapObject::Hash(_) => Value::Hash(r),
            HeapObject::Instance(_) => Value::Object(r),
            HeapObject::Proc(_) => Value::Proc(r),
        }
    }
}

/// One refcounted object.
#[derive(Debug)]
pub struct HeapSlot {
    pub ref_count: u32,
    pub vm_id: u8,
    pub block: crate::alloc::BlockHandle,
    pub object: HeapObject,
}

/// The slab.
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Option<HeapSlot>>,
    free: Vec<u32>,
}

impl Heap {
    pub fn new() -> Heap {
        Heap::default()
    }

    /// Number of live objects.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    // =========================================================================
    // Allocation and refcounting
    // =========================================================================

    /// Move `object` into a fresh slot with `ref_count == 1`, charging the
    /// pool for its payload.
    pub fn alloc(
        &mut self,
        pool: &mut MemoryPool,
        vm_id: u8,
        object: HeapObject,
    ) -> Result<Value, RuntimeError> {
        let block = pool
            .alloc(vm_id, object.payload_size())
            .ok_or(RuntimeError::OutOfMemory)?;
        let slot = HeapSlot {
            ref_count: 1,
            vm_id,
            block,
            object,
        };
        let idx = match self.free.pop() {
            Some(i) => {
                self.slots[i as usize] = Some(slot);
                i
            }
            None => {
                self.slots.push(Some(slot));
                (self.slots.len() - 1) as u32
            }
        };
        let r = HeapRef(idx);
        Ok(self.object(r).map(|o| o.wrap(r)).unwrap_or(Value::Nil))
    }

    #[inline]
    pub fn slot(&self, r: HeapRef) -> Option<&HeapSlot> {
        self.slots.get(r.0 as usize)?.as_ref()
    }

    #[inline]
    pub fn slot_mut(&mut self, r: HeapRef) -> Option<&mut HeapSlot> {
        self.slots.get_mut(r.0 as usize)?.as_mut()
    }

    #[inline]
    pub fn object(&self, r: HeapRef) -> Option<&HeapObject> {
        self.slot(r).map(|s| &s.object)
    }

    /// Increment the reference count of a heap-backed value; no-op for
    /// immediate values.
    pub fn dup(&mut self, v: Value) {
        if let Some(r) = v.heap_ref() {
            if let Some(slot) = self.slot_mut(r) {
                debug_assert!(slot.ref_count > 0);
                slot.ref_count += 1;
            }
        }
    }

    /// Decrement the reference count; at zero, destroy the object, release
    /// its contents and return its pool charge.
    pub fn release(&mut self, pool: &mut MemoryPool, v: Value) {
        let mut work = vec![v];
        while let Some(v) = work.pop() {
            let Some(r) = v.heap_ref() else { continue };
            let Some(slot) = self.slot_mut(r) else { continue };
            debug_assert!(slot.ref_count > 0);
            slot.ref_count -= 1;
            if slot.ref_count > 0 {
                continue;
            }
            if let Some(slot) = self.slots[r.0 as usize].take() {
                pool.free(slot.block);
                self.free.push(r.0);
                push_contained(&slot.object, &mut work);
            }
        }
    }

    /// Destroy every slot tagged with `vm_id`, refcounts notwithstanding.
    /// This is the teardown sweep that also reclaims reference cycles.
    pub fn free_all(&mut self, pool: &mut MemoryPool, vm_id: u8) {
        for i in 0..self.slots.len() {
            let tagged = matches!(&self.slots[i], Some(s) if s.vm_id == vm_id);
            if tagged {
                if let Some(slot) = self.slots[i].take() {
                    pool.free(slot.block);
                    self.free.push(i as u32);
                }
            }
        }
    }

    /// Clear the owning-VM tag on `v` and everything reachable from it, so
    /// values that escaped into the global stores survive their creator's
    /// teardown sweep.
    pub fn clear_vm_id(&mut self, pool: &mut MemoryPool, v: Value) {
        let mut seen: FxHashSet<u32> = FxHashSet::default();
        let mut work = vec![v];
        while let Some(v) = work.pop() {
            let Some(r) = v.heap_ref() else { continue };
            if !seen.insert(r.0) {
                continue;
            }
            let Some(slot) = self.slot_mut(r) else { continue };
            slot.vm_id = 0;
            let block = slot.block;
            pool.retag(block, 0);
            if let Some(slot) = self.slots[r.0 as usize].as_ref() {
                push_contained(&slot.object, &mut work);
            }
        }
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn new_array(
        &mut self,
        pool: &mut MemoryPool,
        vm_id: u8,
        cap: usize,
    ) -> Result<Value, RuntimeError> {
        self.alloc(pool, vm_id, HeapObject::Array(RArray::with_capacity(cap)))
    }

    #[cfg(feature = "string")]
    pub fn new_string(
        &mut self,
        pool: &mut MemoryPool,
        vm_id: u8,
        bytes: &[u8],
    ) -> Result<Value, RuntimeError> {
        self.alloc(pool, vm_id, HeapObject::Str(RString::from_bytes(bytes)))
    }

    /// Endpoints must already be duplicated by the caller; they are owned by
    /// the range from here on.
    pub fn new_range(
        &mut self,
        pool: &mut MemoryPool,
        vm_id: u8,
        first: Value,
        last: Value,
        exclusive: bool,
    ) -> Result<Value, RuntimeError> {
        self.alloc(
            pool,
            vm_id,
            HeapObject::Range(RRange::new(first, last, exclusive)),
        )
    }

    pub fn new_hash(
        &mut self,
        pool: &mut MemoryPool,
        vm_id: u8,
        pairs: usize,
    ) -> Result<Value, RuntimeError> {
        self.alloc(pool, vm_id, HeapObject::Hash(RHash::with_capacity(pairs)))
    }

    pub fn new_instance(
        &mut self,
        pool: &mut MemoryPool,
        vm_id: u8,
        class: ClassId,
    ) -> Result<Value, RuntimeError> {
        self.alloc(pool, vm_id, HeapObject::Instance(RInstance::new(class)))
    }

    pub fn new_proc(
        &mut self,
        pool: &mut MemoryPool,
        vm_id: u8,
        irep: std::sync::Arc<mica_bytecode::Irep>,
    ) -> Result<Value, RuntimeError> {
        self.alloc(pool, vm_id, HeapObject::Proc(RProc { irep }))
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    pub fn array(&self, r: HeapRef) -> Option<&RArray> {
        match self.object(r)? {
            HeapObject::Array(a) => Some(a),
            _ => None,
        }
    }

    #[cfg(feature = "string")]
    pub fn string(&self, r: HeapRef) -> Option<&RString> {
        match self.object(r)? {
            HeapObject::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn range(&self, r: HeapRef) -> Option<&RRange> {
        match self.object(r)? {
            HeapObject::Range(rr) => Some(rr),
            _ => None,
        }
    }

    pub fn hash(&self, r: HeapRef) -> Option<&RHash> {
        match self.object(r)? {
            HeapObject::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn instance(&self, r: HeapRef) -> Option<&RInstance> {
        match self.object(r)? {
            HeapObject::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn instance_mut(&mut self, r: HeapRef) -> Option<&mut RInstance> {
        match &mut self.slot_mut(r)?.object {
            HeapObject::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn proc(&self, r: HeapRef) -> Option<&RProc> {
        match self.object(r)? {
            HeapObject::Proc(p) => Some(p),
            _ => None,
        }
    }

    // =========================================================================
    // Container mutation (pool charge stays in sync)
    // =========================================================================

    /// Grow a slot's pool charge to `want` bytes before a capacity change.
    fn recharge(
        &mut self,
        pool: &mut MemoryPool,
        r: HeapRef,
        want: usize,
    ) -> Result<(), RuntimeError> {
        let slot = self.slot_mut(r).ok_or(RuntimeError::OutOfMemory)?;
        let block = pool
            .realloc(slot.block, want)
            .ok_or(RuntimeError::OutOfMemory)?;
        slot.block = block;
        Ok(())
    }

    /// Append to an array. `v` is owned by the array afterwards.
    pub fn array_push(
        &mut self,
        pool: &mut MemoryPool,
        r: HeapRef,
        v: Value,
    ) -> Result<(), RuntimeError> {
        let value_size = std::mem::size_of::<Value>();
        let (len, cap) = match self.array(r) {
            Some(a) => (a.len(), a.data.capacity()),
            None => return Err(RuntimeError::TypeError("not an array".into())),
        };
        if len == cap {
            let new_cap = (cap * 2).max(4);
            self.recharge(pool, r, new_cap * value_size)?;
            if let Some(HeapObject::Array(a)) = self.slot_mut(r).map(|s| &mut s.object) {
                a.data.reserve_exact(new_cap - len);
            }
        }
        if let Some(HeapObject::Array(a)) = self.slot_mut(r).map(|s| &mut s.object) {
            a.data.push(v);
        }
        Ok(())
    }

    /// Store into an array, releasing the displaced element and nil-filling
    /// any gap. `v` is owned by the array afterwards.
    pub fn array_set(
        &mut self,
        pool: &mut MemoryPool,
        r: HeapRef,
        index: i64,
        v: Value,
    ) -> Result<(), RuntimeError> {
        let len = match self.array(r) {
            Some(a) => a.len() as i64,
            None => return Err(RuntimeError::TypeError("not an array".into())),
        };
        let i = if index < 0 { len + index } else { index };
        if i < 0 {
            return Err(RuntimeError::TypeError("index out of range".into()));
        }
        let mut cur = len;
        while cur < i {
            self.array_push(pool, r, Value::Nil)?;
            cur += 1;
        }
        if cur == i {
            return self.array_push(pool, r, v);
        }
        let old = match self.slot_mut(r).map(|s| &mut s.object) {
            Some(HeapObject::Array(a)) => std::mem::replace(&mut a.data[i as usize], v),
            _ => return Err(RuntimeError::TypeError("not an array".into())),
        };
        self.release(pool, old);
        Ok(())
    }

    /// Remove and return the last element; ownership moves to the caller.
    pub fn array_pop(&mut self, r: HeapRef) -> Value {
        match self.slot_mut(r).map(|s| &mut s.object) {
            Some(HeapObject::Array(a)) => a.data.pop().unwrap_or(Value::Nil),
            _ => Value::Nil,
        }
    }

    /// Position of `key` in a hash, by semantic comparison.
    pub fn hash_index_of(&self, r: HeapRef, key: Value) -> Option<usize> {
        let h = self.hash(r)?;
        (0..h.data.len())
            .step_by(2)
            .find(|&i| self.compare(h.data[i], key) == 0)
    }

    /// Read a hash value; missing keys read nil. No ownership transfer.
    pub fn hash_get(&self, r: HeapRef, key: Value) -> Value {
        match self.hash_index_of(r, key) {
            Some(i) => self.hash(r).map_or(Value::Nil, |h| h.data[i + 1]),
            None => Value::Nil,
        }
    }

    /// Insert or overwrite a hash entry. Both `key` and `value` are owned by
    /// the hash afterwards; an overwritten key/value pair is released.
    pub fn hash_set(
        &mut self,
        pool: &mut MemoryPool,
        r: HeapRef,
        key: Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let value_size = std::mem::size_of::<Value>();
        if let Some(i) = self.hash_index_of(r, key) {
            let old = match self.slot_mut(r).map(|s| &mut s.object) {
                Some(HeapObject::Hash(h)) => std::mem::replace(&mut h.data[i + 1], value),
                _ => return Err(RuntimeError::TypeError("not a hash".into())),
            };
            // The stored key stays; the caller's duplicate of it is released.
            self.release(pool, key);
            self.release(pool, old);
            return Ok(());
        }
        let (len, cap) = match self.hash(r) {
            Some(h) => (h.data.len(), h.data.capacity()),
            None => return Err(RuntimeError::TypeError("not a hash".into())),
        };
        if len + 2 > cap {
            let new_cap = (cap * 2).max(8);
            self.recharge(pool, r, new_cap * value_size)?;
            if let Some(HeapObject::Hash(h)) = self.slot_mut(r).map(|s| &mut s.object) {
                h.data.reserve_exact(new_cap - len);
            }
        }
        if let Some(HeapObject::Hash(h)) = self.slot_mut(r).map(|s| &mut s.object) {
            h.data.push(key);
            h.data.push(value);
        }
        Ok(())
    }

    /// Append a key/value pair without key deduplication (HASH literal
    /// construction mirrors the source sequence verbatim). Both values are
    /// owned by the hash afterwards.
    pub fn hash_push_pair(
        &mut self,
        pool: &mut MemoryPool,
        r: HeapRef,
        key: Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let value_size = std::mem::size_of::<Value>();
        let (len, cap) = match self.hash(r) {
            Some(h) => (h.data.len(), h.data.capacity()),
            None => return Err(RuntimeError::TypeError("not a hash".into())),
        };
        if len + 2 > cap {
            let new_cap = (cap * 2).max(8);
            self.recharge(pool, r, new_cap * value_size)?;
            if let Some(HeapObject::Hash(h)) = self.slot_mut(r).map(|s| &mut s.object) {
                h.data.reserve_exact(new_cap - len);
            }
        }
        if let Some(HeapObject::Hash(h)) = self.slot_mut(r).map(|s| &mut s.object) {
            h.data.push(key);
            h.data.push(value);
        }
        Ok(())
    }

    /// Set an instance variable. `v` is owned by the instance afterwards.
    pub fn instance_setiv(
        &mut self,
        pool: &mut MemoryPool,
        r: HeapRef,
        sym: SymId,
        v: Value,
    ) -> Result<(), RuntimeError> {
        let entry_size = std::mem::size_of::<(SymId, Value)>();
        let existing = self.instance(r).and_then(|i| i.ivar_index(sym));
        match existing {
            Some(i) => {
                let old = match self.instance_mut(r) {
                    Some(inst) => std::mem::replace(&mut inst.ivars[i].1, v),
                    None => return Err(RuntimeError::TypeError("not an instance".into())),
                };
                self.release(pool, old);
            }
            None => {
                let (len, cap) = match self.instance(r) {
                    Some(i) => (i.ivars.len(), i.ivars.capacity()),
                    None => return Err(RuntimeError::TypeError("not an instance".into())),
                };
                if len == cap {
                    let new_cap = (cap * 2).max(4);
                    self.recharge(pool, r, new_cap * entry_size)?;
                    if let Some(inst) = self.instance_mut(r) {
                        inst.ivars.reserve_exact(new_cap - len);
                    }
                }
                if let Some(inst) = self.instance_mut(r) {
                    inst.ivars.push((sym, v));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Total-order comparison: 0 / positive / negative.
    ///
    /// Across tags, fixnum and float promote to a numeric comparison and
    /// EMPTY compares equal to NIL; anything else orders by tag. Heap types
    /// compare structurally; identity-only types (class, object, proc)
    /// compare by handle.
    pub fn compare(&self, a: Value, b: Value) -> i32 {
        if a.tag() != b.tag() {
            #[cfg(feature = "float")]
            {
                if let (Value::Fixnum(x), Value::Float(y)) = (a, b) {
                    return cmp_float(x as f64, y);
                }
                if let (Value::Float(x), Value::Fixnum(y)) = (a, b) {
                    return cmp_float(x, y as f64);
                }
            }
            if matches!((a, b), (Value::Empty, Value::Nil) | (Value::Nil, Value::Empty)) {
                return 0;
            }
            return a.tag() - b.tag();
        }

        match (a, b) {
            (Value::Empty, _) | (Value::Nil, _) | (Value::False, _) | (Value::True, _) => 0,
            (Value::Fixnum(x), Value::Fixnum(y)) => cmp_i64(x, y),
            (Value::Symbol(x), Value::Symbol(y)) => cmp_i64(x.0 as i64, y.0 as i64),
            #[cfg(feature = "float")]
            (Value::Float(x), Value::Float(y)) => cmp_float(x, y),
            (Value::Class(x), Value::Class(y)) => cmp_i64(x.0 as i64, y.0 as i64),
            (Value::Object(x), Value::Object(y)) | (Value::Proc(x), Value::Proc(y)) => {
                cmp_i64(x.0 as i64, y.0 as i64)
            }
            (Value::Array(x), Value::Array(y)) => self.compare_arrays(x, y),
            #[cfg(feature = "string")]
            (Value::String(x), Value::String(y)) => match (self.string(x), self.string(y)) {
                (Some(sx), Some(sy)) => sx.compare(sy),
                _ => 1,
            },
            (Value::Range(x), Value::Range(y)) => self.compare_ranges(x, y),
            (Value::Hash(x), Value::Hash(y)) => self.compare_hashes(x, y),
            _ => 1,
        }
    }

    fn compare_arrays(&self, x: HeapRef, y: HeapRef) -> i32 {
        let (Some(ax), Some(ay)) = (self.array(x), self.array(y)) else {
            return 1;
        };
        for (ex, ey) in ax.data.iter().zip(ay.data.iter()) {
            let c = self.compare(*ex, *ey);
            if c != 0 {
                return c;
            }
        }
        cmp_i64(ax.len() as i64, ay.len() as i64)
    }

    fn compare_ranges(&self, x: HeapRef, y: HeapRef) -> i32 {
        let (Some(rx), Some(ry)) = (self.range(x), self.range(y)) else {
            return 1;
        };
        let c = self.compare(rx.first, ry.first);
        if c != 0 {
            return c;
        }
        let c = self.compare(rx.last, ry.last);
        if c != 0 {
            return c;
        }
        rx.exclusive as i32 - ry.exclusive as i32
    }

    /// Hashes compare by size, then key set, then per-key values; entry
    /// order does not participate.
    fn compare_hashes(&self, x: HeapRef, y: HeapRef) -> i32 {
        let (Some(hx), Some(hy)) = (self.hash(x), self.hash(y)) else {
            return 1;
        };
        let c = cmp_i64(hx.len() as i64, hy.len() as i64);
        if c != 0 {
            return c;
        }
        for i in (0..hx.data.len()).step_by(2) {
            let key = hx.data[i];
            match self.hash_index_of(y, key) {
                None => return 1,
                Some(j) => {
                    let c = self.compare(hx.data[i + 1], hy.data[j + 1]);
                    if c != 0 {
                        return c;
                    }
                }
            }
        }
        0
    }
}

/// Values owned by `object`, queued for release when it is destroyed.
fn push_contained(object: &HeapObject, work: &mut Vec<Value>) {
    match object {
        HeapObject::Array(a) => work.extend_from_slice(&a.data),
        HeapObject::Hash(h) => work.extend_from_slice(&h.data),
        HeapObject::Range(r) => {
            work.push(r.first);
            work.push(r.last);
        }
        HeapObject::Instance(i) => work.extend(i.ivars.iter().map(|(_, v)| *v)),
        HeapObject::Proc(_) => {}
        #[cfg(feature = "string")]
        HeapObject::Str(_) => {}
    }
}

#[inline]
fn cmp_i64(x: i64, y: i64) -> i32 {
    match x.cmp(&y) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// NaN compares as "less": equal and greater both test false.
#[cfg(feature = "float")]
#[inline]
fn cmp_float(x: f64, y: f64) -> i32 {
    -1 + (x == y) as i32 + (x > y) as i32 * 2
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (MemoryPool, Heap) {
        (MemoryPool::new(8 * 1024), Heap::new())
    }

    #[test]
    fn dup_release_balances() {
        let (mut pool, mut heap) = setup();
        let baseline = pool.statistics().used;
        let v = heap.new_array(&mut pool, 1, 3).unwrap();
        heap.dup(v);
        heap.dup(v);
        heap.release(&mut pool, v);
        heap.release(&mut pool, v);
        assert_eq!(heap.live(), 1);
        heap.release(&mut pool, v);
        assert_eq!(heap.live(), 0);
        assert_eq!(pool.statistics().used, baseline);
    }

    #[test]
    fn release_cascades_into_elements() {
        let (mut pool, mut heap) = setup();
        let inner = heap.new_array(&mut pool, 1, 1).unwrap();
        let outer = heap.new_array(&mut pool, 1, 1).unwrap();
        let outer_ref = outer.heap_ref().unwrap();
        // outer owns inner.
        heap.array_push(&mut pool, outer_ref, inner).unwrap();
        assert_eq!(heap.live(), 2);
        heap.release(&mut pool, outer);
        assert_eq!(heap.live(), 0);
        assert_eq!(pool.statistics().used, 0);
    }

    #[test]
    fn array_set_fills_gap_with_nil() {
        let (mut pool, mut heap) = setup();
        let v = heap.new_array(&mut pool, 1, 0).unwrap();
        let r = v.heap_ref().unwrap();
        heap.array_set(&mut pool, r, 2, Value::Fixnum(9)).unwrap();
        let a = heap.array(r).unwrap();
        assert_eq!(a.data, vec![Value::Nil, Value::Nil, Value::Fixnum(9)]);
    }

    #[test]
    fn hash_insert_overwrite_and_order() {
        let (mut pool, mut heap) = setup();
        let v = heap.new_hash(&mut pool, 1, 0).unwrap();
        let r = v.heap_ref().unwrap();
        heap.hash_set(&mut pool, r, Value::Fixnum(1), Value::True).unwrap();
        heap.hash_set(&mut pool, r, Value::Fixnum(2), Value::False).unwrap();
        heap.hash_set(&mut pool, r, Value::Fixnum(1), Value::Nil).unwrap();
        let h = heap.hash(r).unwrap();
        assert_eq!(h.len(), 2);
        // Overwrite kept insertion order.
        assert_eq!(h.data[0], Value::Fixnum(1));
        assert_eq!(h.data[1], Value::Nil);
        assert_eq!(heap.hash_get(r, Value::Fixnum(2)), Value::False);
        assert_eq!(heap.hash_get(r, Value::Fixnum(7)), Value::Nil);
    }

    #[test]
    fn free_all_reclaims_cycles() {
        let (mut pool, mut heap) = setup();
        let a = heap.new_array(&mut pool, 3, 1).unwrap();
        let b = heap.new_array(&mut pool, 3, 1).unwrap();
        let (ra, rb) = (a.heap_ref().unwrap(), b.heap_ref().unwrap());
        // a <-> b cycle; both counts go to 2.
        heap.dup(b);
        heap.array_push(&mut pool, ra, b).unwrap();
        heap.dup(a);
        heap.array_push(&mut pool, rb, a).unwrap();
        heap.release(&mut pool, a);
        heap.release(&mut pool, b);
        // Unreachable but alive: the cycle holds itself.
        assert_eq!(heap.live(), 2);
        heap.free_all(&mut pool, 3);
        assert_eq!(heap.live(), 0);
        assert_eq!(pool.statistics().used, 0);
    }

    #[test]
    fn clear_vm_id_protects_from_sweep() {
        let (mut pool, mut heap) = setup();
        let outer = heap.new_array(&mut pool, 2, 1).unwrap();
        let inner = heap.new_array(&mut pool, 2, 1).unwrap();
        heap.array_push(&mut pool, outer.heap_ref().unwrap(), inner).unwrap();
        heap.clear_vm_id(&mut pool, outer);
        heap.free_all(&mut pool, 2);
        assert_eq!(heap.live(), 2);
    }

    #[test]
    fn compare_total_order() {
        let (mut pool, mut heap) = setup();
        assert_eq!(heap.compare(Value::Nil, Value::Empty), 0);
        assert_eq!(heap.compare(Value::Fixnum(3), Value::Fixnum(3)), 0);
        assert!(heap.compare(Value::Fixnum(2), Value::Fixnum(5)) < 0);
        assert!(heap.compare(Value::Nil, Value::Fixnum(0)) < 0);

        let a = heap.new_array(&mut pool, 1, 2).unwrap();
        let b = heap.new_array(&mut pool, 1, 2).unwrap();
        let (ra, rb) = (a.heap_ref().unwrap(), b.heap_ref().unwrap());
        heap.array_push(&mut pool, ra, Value::Fixnum(1)).unwrap();
        heap.array_push(&mut pool, rb, Value::Fixnum(1)).unwrap();
        assert_eq!(heap.compare(a, b), 0);
        heap.array_push(&mut pool, rb, Value::Fixnum(2)).unwrap();
        assert!(heap.compare(a, b) < 0);
        assert!(heap.compare(b, a) > 0);
    }

    #[cfg(feature = "float")]
    #[test]
    fn compare_promotes_numerics() {
        let (_, heap) = setup();
        assert_eq!(heap.compare(Value::Fixnum(2), Value::Float(2.0)), 0);
        assert!(heap.compare(Value::Fixnum(2), Value::Float(2.5)) < 0);
        assert!(heap.compare(Value::Float(3.5), Value::Fixnum(3)) > 0);
        // NaN: neither equal nor greater.
        assert_eq!(heap.compare(Value::Float(f64::NAN), Value::Float(f64::NAN)), -1);
    }

    #[cfg(feature = "string")]
    #[test]
    fn compare_strings_by_bytes() {
        let (mut pool, mut heap) = setup();
        let a = heap.new_string(&mut pool, 1, b"abc").unwrap();
        let b = heap.new_string(&mut pool, 1, b"abd").unwrap();
        assert_eq!(heap.compare(a, a), 0);
        assert!(heap.compare(a, b) < 0);
    }
}
