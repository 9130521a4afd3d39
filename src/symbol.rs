//! Symbol interning.
//!
//! Maps a 64-bit FNV-1a hash of a symbol's byte sequence to a bucket; each
//! bucket is the head of a chain of colliding `Object::Symbol`s, linked
//! through the symbol object's own `next` field (not a separate Rust
//! structure) so that the weak-table compaction pass in `alloc::Heap::flip`
//! can walk it without a second lookup structure.
//!
//! Interning is the only place the "two structurally equal symbol
//! byte-sequences resolve to the same heap object" invariant is
//! established; `gensym` deliberately bypasses this table so generated
//! symbols are never interned.

use crate::alloc::{move_ref, Heap, Object};
use crate::value::{HeapRef, Value};

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub struct SymbolTable {
    buckets: Vec<Option<HeapRef>>,
    count: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { buckets: vec![None; 16], count: 0 }
    }

    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    /// Look up `bytes` (already upper-cased by the caller) in `heap`,
    /// interning a fresh symbol if no match exists. Returns the symbol's
    /// `HeapRef`.
    pub fn intern(&mut self, heap: &mut Heap, bytes: &[u8]) -> HeapRef {
        let hash = fnv1a(bytes);
        let idx = self.bucket_index(hash);
        let mut cursor = self.buckets[idx];
        while let Some(r) = cursor {
            match heap.get(r) {
                Object::Symbol { bytes: existing, next } => {
                    if existing.as_ref() == bytes {
                        return r;
                    }
                    cursor = *next;
                }
                _ => unreachable!("symbol bucket chain contains a non-symbol"),
            }
        }
        let head = self.buckets[idx];
        let r = heap.alloc(Object::Symbol { bytes: bytes.into(), next: head });
        self.buckets[idx] = Some(r);
        self.count += 1;
        if self.count > self.buckets.len() {
            self.grow(heap);
        }
        r
    }

    /// Double the bucket count, re-threading every existing chain into its
    /// new bucket (a symbol's new bucket can differ from its old one, so
    /// `next` is rewritten as each symbol is re-inserted, not just the
    /// chain head moved).
    fn grow(&mut self, heap: &mut Heap) {
        let new_len = self.buckets.len() * 2;
        let mut new_buckets: Vec<Option<HeapRef>> = vec![None; new_len];
        for &head in &self.buckets {
            let mut cursor = head;
            while let Some(r) = cursor {
                let (bytes, next) = match heap.get(r) {
                    Object::Symbol { bytes, next } => (bytes.clone(), *next),
                    _ => unreachable!(),
                };
                cursor = next;
                let idx = (fnv1a(&bytes) as usize) & (new_len - 1);
                let new_head = new_buckets[idx];
                if let Object::Symbol { next, .. } = heap.get_mut(r) {
                    *next = new_head;
                }
                new_buckets[idx] = Some(r);
            }
        }
        self.buckets = new_buckets;
    }

    /// The weak-table GC pass: walk the *old* table's chains (against
    /// `from`); a symbol whose `from`-slot was already moved (`Gone`,
    /// meaning some other strong root reached it) survives and is rehashed
    /// into a fresh table against `to`. A symbol whose `from`-slot is still
    /// `Clear` had no other reachable reference and is dropped.
    pub(crate) fn compact(&mut self, from: &mut Heap, to: &mut Heap) {
        let old_buckets = std::mem::replace(&mut self.buckets, vec![None; 16]);
        self.count = 0;
        for head in old_buckets {
            let mut cursor = head;
            while let Some(old_ref) = cursor {
                let next_old = match from.peek_symbol_next(old_ref) {
                    Some(n) => n,
                    None => break, // already moved out by a previous chain traversal
                };
                if from.is_gone(old_ref) {
                    let new_ref = move_ref(old_ref, from, to);
                    let bytes = match to.get(new_ref) {
                        Object::Symbol { bytes, .. } => bytes.clone(),
                        _ => unreachable!(),
                    };
                    self.insert_rehashed(to, new_ref, &bytes);
                }
                cursor = next_old;
            }
        }
        if self.count > self.buckets.len() {
            self.grow(to);
        }
    }

    fn insert_rehashed(&mut self, to: &mut Heap, r: HeapRef, bytes: &[u8]) {
        if self.count >= self.buckets.len() {
            // Grow eagerly against `to` so the freshly-rehashed chain we're
            // building is addressed by the table's final bucket count. Must
            // go through `grow` itself, not a bare bucket-array swap, so the
            // entries rehashed so far in this pass are carried over instead
            // of dropped.
            self.grow(to);
        }
        let idx = (fnv1a(bytes) as usize) & (self.buckets.len() - 1);
        let head = self.buckets[idx];
        if let Object::Symbol { next, .. } = to.get_mut(r) {
            *next = head;
        }
        self.buckets[idx] = Some(r);
        self.count += 1;
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Heap;

    #[test]
    fn interning_same_bytes_returns_same_ref() {
        let mut heap = Heap::new(4096);
        let mut table = SymbolTable::new();
        let a = table.intern(&mut heap, b"HELLO");
        let b = table.intern(&mut heap, b"HELLO");
        assert_eq!(a, b);
    }

    #[test]
    fn interning_different_bytes_returns_different_refs() {
        let mut heap = Heap::new(4096);
        let mut table = SymbolTable::new();
        let a = table.intern(&mut heap, b"HELLO");
        let b = table.intern(&mut heap, b"WORLD");
        assert_ne!(a, b);
    }

    #[test]
    fn value_for_interned_symbol_is_pointer_stable() {
        let mut heap = Heap::new(4096);
        let mut table = SymbolTable::new();
        let a = Value::Symbol(table.intern(&mut heap, b"X"));
        let b = Value::Symbol(table.intern(&mut heap, b"X"));
        assert_eq!(a, b);
    }

    #[test]
    fn growing_past_multiple_thresholds_keeps_every_symbol_reachable() {
        let mut heap = Heap::new(1 << 20);
        let mut table = SymbolTable::new();
        let names: Vec<String> = (0..50).map(|i| format!("SYM{i}")).collect();
        let refs: Vec<HeapRef> = names.iter().map(|n| table.intern(&mut heap, n.as_bytes())).collect();
        for (n, r) in names.iter().zip(refs.iter()) {
            assert_eq!(table.intern(&mut heap, n.as_bytes()), *r, "{n} was orphaned by a bucket grow");
        }
    }
}
