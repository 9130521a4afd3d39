//! Helpers for walking and building proper (and improper) lists of
//! `Value`s over a `Heap`. A "list" here is never a separate Rust type —
//! just the ordinary `Pair` chain terminated by `Value::Nil` that the
//! reader and evaluator both already produce.

use crate::alloc::{Heap, Object};
use crate::error::{LispError, LispResult};
use crate::value::{HeapRef, Value};

pub(crate) fn cons(heap: &mut Heap, car: Value, cdr: Value) -> Value {
    Value::Pair(heap.alloc(Object::Pair { car, cdr }))
}

/// Build a list from `items`, in order, terminated by `tail`.
pub(crate) fn cons_list(heap: &mut Heap, items: Vec<Value>, tail: Value) -> Value {
    let mut result = tail;
    for item in items.into_iter().rev() {
        result = cons(heap, item, result);
    }
    result
}

pub(crate) fn pair_parts(heap: &Heap, r: HeapRef) -> (Value, Value) {
    match heap.get(r) {
        Object::Pair { car, cdr } => (*car, *cdr),
        _ => unreachable!("expected a pair"),
    }
}

pub(crate) fn car(heap: &Heap, v: Value) -> LispResult<Value> {
    match v {
        Value::Pair(r) => Ok(pair_parts(heap, r).0),
        _ => Err(LispError::form_syntax("expected a pair")),
    }
}

pub(crate) fn cdr(heap: &Heap, v: Value) -> LispResult<Value> {
    match v {
        Value::Pair(r) => Ok(pair_parts(heap, r).1),
        _ => Err(LispError::form_syntax("expected a pair")),
    }
}

/// The `index`th element of a proper list, counting from zero.
pub(crate) fn nth(heap: &Heap, mut list: Value, mut index: usize) -> LispResult<Value> {
    loop {
        match list {
            Value::Pair(r) => {
                let (car, cdr) = pair_parts(heap, r);
                if index == 0 {
                    return Ok(car);
                }
                index -= 1;
                list = cdr;
            }
            _ => return Err(LispError::form_syntax("missing operand")),
        }
    }
}

pub(crate) fn nth_opt(heap: &Heap, mut list: Value, mut index: usize) -> Option<Value> {
    loop {
        match list {
            Value::Pair(r) => {
                let (car, cdr) = pair_parts(heap, r);
                if index == 0 {
                    return Some(car);
                }
                index -= 1;
                list = cdr;
            }
            _ => return None,
        }
    }
}

/// Collect a proper list into a `Vec`, in order. `FormSyntax` if the list
/// is improper (a non-`Nil` tail).
pub(crate) fn list_to_vec(heap: &Heap, mut list: Value) -> LispResult<Vec<Value>> {
    let mut items = Vec::new();
    loop {
        match list {
            Value::Nil => return Ok(items),
            Value::Pair(r) => {
                let (car, cdr) = pair_parts(heap, r);
                items.push(car);
                list = cdr;
            }
            _ => return Err(LispError::form_syntax("improper list")),
        }
    }
}

pub(crate) fn list_len(heap: &Heap, list: Value) -> usize {
    list_to_vec(heap, list).map(|v| v.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cons_list_round_trips_through_list_to_vec() {
        let mut heap = Heap::new(4096);
        let items = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
        let list = cons_list(&mut heap, items.clone(), Value::Nil);
        assert_eq!(list_to_vec(&heap, list).unwrap(), items);
    }

    #[test]
    fn list_to_vec_rejects_improper_tail() {
        let mut heap = Heap::new(4096);
        let list = cons(&mut heap, Value::Int(1), Value::Int(2));
        assert!(list_to_vec(&heap, list).is_err());
    }
}
