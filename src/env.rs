//! Tables and the environment chain built from them.
//!
//! A `Table` is an open-addressed hash table: parallel key/value `Vec`s,
//! linear probing, power-of-two capacity, `Value::Nil` marking an empty
//! slot. The hash is over a key's raw payload bits, never its structural
//! contents, so heap-backed keys (pairs, strings, ...) compare and hash by
//! `HeapRef` — reference equality, not `equal?`.
//!
//! An environment is a `Value` — a proper list of `Table`s, innermost frame
//! first — not a separate Rust type, so it moves through a GC flip the same
//! way any other `Value` does.

use crate::alloc::{Heap, Object};
use crate::error::{LispError, LispResult};
use crate::value::{eq, HeapRef, Value};

const MIN_TABLE_CAPACITY: usize = 16;

fn mix(tag: u64, bits: u64) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut h = OFFSET ^ tag;
    h = h.wrapping_mul(PRIME);
    h ^= bits;
    h.wrapping_mul(PRIME)
}

/// Hash a key's raw payload bits. Heap-backed variants hash their
/// `HeapRef`, so two structurally-equal-but-distinct heap objects hash
/// (and compare) differently — callers that want `equal?` semantics must
/// build that on top.
fn hash_key(key: Value) -> u64 {
    match key {
        Value::Nil => mix(0, 0),
        Value::Int(n) => mix(1, n as u64),
        Value::Real(r) => mix(2, r.to_bits()),
        Value::Char(c) => mix(3, c as u64),
        Value::Bool(b) => mix(4, b as u64),
        Value::Func(f) => mix(5, f as usize as u64),
        Value::HostPtr(p) => mix(6, p.0 as usize as u64),
        Value::Pair(r)
        | Value::Symbol(r)
        | Value::Str(r)
        | Value::Lambda(r)
        | Value::Table(r)
        | Value::Vector(r)
        | Value::Promise(r)
        | Value::Jump(r) => mix(7, ((r.page as u64) << 32) | r.slot as u64),
    }
}

/// Allocate a fresh, empty table sized for at least `capacity` entries
/// before it would need to grow (rounded up to a power of two, minimum
/// `MIN_TABLE_CAPACITY`).
pub(crate) fn new_table(heap: &mut Heap, capacity: usize) -> HeapRef {
    let cap = capacity.max(MIN_TABLE_CAPACITY).next_power_of_two();
    heap.alloc(Object::Table {
        keys: vec![Value::Nil; cap],
        vals: vec![Value::Nil; cap],
        size: 0,
    })
}

fn table_parts(heap: &Heap, r: HeapRef) -> (&[Value], &[Value]) {
    match heap.get(r) {
        Object::Table { keys, vals, .. } => (keys, vals),
        _ => unreachable!("expected a table"),
    }
}

/// Look up `key` in table `r`. `None` if absent.
pub(crate) fn table_get(heap: &Heap, r: HeapRef, key: Value) -> Option<Value> {
    let (keys, vals) = table_parts(heap, r);
    let cap = keys.len();
    if cap == 0 {
        return None;
    }
    let mut idx = (hash_key(key) as usize) & (cap - 1);
    for _ in 0..cap {
        match keys[idx] {
            Value::Nil => return None,
            k if eq(&k, &key) => return Some(vals[idx]),
            _ => {}
        }
        idx = (idx + 1) & (cap - 1);
    }
    None
}

/// Insert or overwrite `key` -> `val` in table `r`, growing it first if
/// this insertion would push it to (or past) half capacity.
pub(crate) fn table_insert(heap: &mut Heap, r: HeapRef, key: Value, val: Value) {
    let (size, cap) = match heap.get(r) {
        Object::Table { keys, size, .. } => (*size, keys.len()),
        _ => unreachable!("expected a table"),
    };
    if table_get(heap, r, key).is_none() && (size + 1) * 2 >= cap.max(1) {
        table_grow(heap, r);
    }
    table_insert_raw(heap, r, key, val);
}

fn table_insert_raw(heap: &mut Heap, r: HeapRef, key: Value, val: Value) {
    let (keys, vals, size) = match heap.get_mut(r) {
        Object::Table { keys, vals, size } => (keys, vals, size),
        _ => unreachable!("expected a table"),
    };
    let cap = keys.len();
    let mut idx = (hash_key(key) as usize) & (cap - 1);
    loop {
        match keys[idx] {
            Value::Nil => {
                keys[idx] = key;
                vals[idx] = val;
                *size += 1;
                return;
            }
            k if eq(&k, &key) => {
                vals[idx] = val;
                return;
            }
            _ => {}
        }
        idx = (idx + 1) & (cap - 1);
    }
}

fn table_grow(heap: &mut Heap, r: HeapRef) {
    let (old_keys, old_vals) = match heap.get(r) {
        Object::Table { keys, vals, .. } => (keys.clone(), vals.clone()),
        _ => unreachable!("expected a table"),
    };
    let new_cap = (old_keys.len() * 2).max(MIN_TABLE_CAPACITY);
    match heap.get_mut(r) {
        Object::Table { keys, vals, size } => {
            *keys = vec![Value::Nil; new_cap];
            *vals = vec![Value::Nil; new_cap];
            *size = 0;
        }
        _ => unreachable!("expected a table"),
    }
    for (k, v) in old_keys.into_iter().zip(old_vals.into_iter()) {
        if !k.nullp() {
            table_insert_raw(heap, r, k, v);
        }
    }
}

pub(crate) fn table_len(heap: &Heap, r: HeapRef) -> usize {
    match heap.get(r) {
        Object::Table { size, .. } => *size,
        _ => unreachable!("expected a table"),
    }
}

/// Push a fresh frame in front of `parent`, sized for `frame_capacity`
/// bindings (typically the lambda's parameter count).
pub(crate) fn extend(heap: &mut Heap, parent: Value, frame_capacity: usize) -> Value {
    let table = new_table(heap, frame_capacity);
    let pair = heap.alloc(Object::Pair { car: Value::Table(table), cdr: parent });
    Value::Pair(pair)
}

fn frame_of(heap: &Heap, env: Value) -> Option<(HeapRef, Value)> {
    match env {
        Value::Pair(p) => match heap.get(p) {
            Object::Pair { car: Value::Table(t), cdr } => Some((*t, *cdr)),
            _ => None,
        },
        _ => None,
    }
}

/// Scan frames innermost-first; the first frame containing `key` wins.
pub(crate) fn lookup(heap: &Heap, env: Value, key: Value) -> Option<Value> {
    let mut cursor = env;
    while let Some((frame, parent)) = frame_of(heap, cursor) {
        if let Some(v) = table_get(heap, frame, key) {
            return Some(v);
        }
        cursor = parent;
    }
    None
}

/// Bind `key` in the innermost (leftmost) frame, shadowing any outer
/// binding of the same name.
pub(crate) fn define(heap: &mut Heap, env: Value, key: Value, val: Value) {
    if let Some((frame, _)) = frame_of(heap, env) {
        table_insert(heap, frame, key, val);
    }
}

pub(crate) fn symbol_name(heap: &Heap, key: Value) -> String {
    match key {
        Value::Symbol(r) => match heap.get(r) {
            Object::Symbol { bytes, .. } => String::from_utf8_lossy(bytes).into_owned(),
            _ => unreachable!("expected a symbol"),
        },
        _ => "<non-symbol>".to_string(),
    }
}

/// Mutate the first frame that already binds `key`. `UndefinedVar` if no
/// frame does — `set!` never creates a new binding.
pub(crate) fn set(heap: &mut Heap, env: Value, key: Value, val: Value) -> LispResult<()> {
    let mut cursor = env;
    while let Some((frame, parent)) = frame_of(heap, cursor) {
        if table_get(heap, frame, key).is_some() {
            table_insert(heap, frame, key, val);
            return Ok(());
        }
        cursor = parent;
    }
    Err(LispError::undefined_var(&symbol_name(heap, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    #[test]
    fn insert_then_get_round_trips() {
        let mut heap = Heap::new(4096);
        let t = new_table(&mut heap, 4);
        table_insert(&mut heap, t, Value::Int(1), Value::Int(100));
        assert_eq!(table_get(&heap, t, Value::Int(1)), Some(Value::Int(100)));
        assert_eq!(table_get(&heap, t, Value::Int(2)), None);
    }

    #[test]
    fn insert_grows_past_half_load() {
        let mut heap = Heap::new(1 << 20);
        let t = new_table(&mut heap, 4);
        for i in 0..20 {
            table_insert(&mut heap, t, Value::Int(i), Value::Int(i * 2));
        }
        assert_eq!(table_len(&heap, t), 20);
        for i in 0..20 {
            assert_eq!(table_get(&heap, t, Value::Int(i)), Some(Value::Int(i * 2)));
        }
    }

    #[test]
    fn define_lookup_and_set_across_frames() {
        let mut heap = Heap::new(4096);
        let mut symbols = SymbolTable::new();
        let x = Value::Symbol(symbols.intern(&mut heap, b"X"));
        let global = extend(&mut heap, Value::Nil, 4);
        define(&mut heap, global, x, Value::Int(1));
        let inner = extend(&mut heap, global, 4);
        assert_eq!(lookup(&heap, inner, x), Some(Value::Int(1)));
        set(&mut heap, inner, x, Value::Int(2)).unwrap();
        assert_eq!(lookup(&heap, global, x), Some(Value::Int(2)));
        assert_eq!(lookup(&heap, inner, x), Some(Value::Int(2)));
    }

    #[test]
    fn set_on_undefined_variable_errors() {
        let mut heap = Heap::new(4096);
        let mut symbols = SymbolTable::new();
        let y = Value::Symbol(symbols.intern(&mut heap, b"Y"));
        let env = extend(&mut heap, Value::Nil, 4);
        let err = set(&mut heap, env, y, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::UndefinedVar);
    }
}
