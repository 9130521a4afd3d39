//! Printing values back out as text.
//!
//! `Mode::Write` produces read-back-able syntax: strings are quoted with
//! escapes, characters use `#\name` where one exists. `Mode::Display` is
//! for human consumption: strings and characters print their raw bytes,
//! nothing is quoted or escaped. Both modes render lists, dotted tails,
//! vectors, and tables the same way; lambdas, natives, and continuations
//! are always opaque, since none of them have a literal read syntax.

use crate::alloc::{Heap, Object};
use crate::value::{Value, EOF_CHAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Write,
    Display,
}

const NAMED_CHARS: &[(&str, i32)] = &[
    ("EOF", -1),
    ("NUL", 0),
    ("SOH", 1),
    ("STX", 2),
    ("ETX", 3),
    ("EOT", 4),
    ("ENQ", 5),
    ("ACK", 6),
    ("BEL", 7),
    ("backspace", 8),
    ("tab", 9),
    ("newline", 10),
    ("VT", 11),
    ("page", 12),
    ("return", 13),
    ("SO", 14),
    ("SI", 15),
    ("DLE", 16),
    ("DC1", 17),
    ("DC2", 18),
    ("DC3", 19),
    ("DC4", 20),
    ("NAK", 21),
    ("SYN", 22),
    ("ETB", 23),
    ("CAN", 24),
    ("EM", 25),
    ("SUB", 26),
    ("altmode", 27),
    ("FS", 28),
    ("GS", 29),
    ("RS", 30),
    ("backnext", 31),
    ("space", 32),
];

fn char_name(code: i32) -> Option<&'static str> {
    NAMED_CHARS.iter().find(|&&(_, c)| c == code).map(|&(n, _)| n)
}

/// Render `v` as text in the given `mode`.
pub fn print(heap: &Heap, v: Value, mode: Mode) -> String {
    let mut out = String::new();
    write_value(heap, v, mode, &mut out);
    out
}

fn write_value(heap: &Heap, v: Value, mode: Mode, out: &mut String) {
    match v {
        Value::Nil => out.push_str("()"),
        Value::Bool(true) => out.push_str("#t"),
        Value::Bool(false) => out.push_str("#f"),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Real(r) => write_real(r, out),
        Value::Char(c) => write_char(c, mode, out),
        Value::Func(f) => out.push_str(&format!("<c-func-{:x}>", f as usize)),
        Value::HostPtr(p) => out.push_str(&format!("<host-ptr-{:x}>", p.0 as usize)),
        Value::Pair(_) => write_list(heap, v, mode, out),
        Value::Symbol(r) => write_symbol(heap, r, out),
        Value::Str(r) => write_str(heap, r, mode, out),
        Value::Lambda(_) => out.push_str("<lambda>"),
        Value::Table(r) => write_table(heap, r, mode, out),
        Value::Vector(r) => write_vector(heap, r, mode, out),
        Value::Promise(_) => out.push_str("<promise>"),
        Value::Jump(_) => out.push_str("<jump>"),
    }
}

fn write_real(r: f64, out: &mut String) {
    if r.fract() == 0.0 && r.is_finite() {
        out.push_str(&format!("{r:.1}"));
    } else {
        out.push_str(&r.to_string());
    }
}

fn write_char(c: i32, mode: Mode, out: &mut String) {
    match mode {
        Mode::Display => {
            if c == EOF_CHAR {
                out.push_str("#\\EOF");
            } else {
                out.push(c as u8 as char);
            }
        }
        Mode::Write => match char_name(c) {
            Some(name) => {
                out.push_str("#\\");
                out.push_str(name);
            }
            None => {
                out.push_str("#\\");
                out.push(c as u8 as char);
            }
        },
    }
}

fn write_symbol(heap: &Heap, r: crate::value::HeapRef, out: &mut String) {
    match heap.get(r) {
        Object::Symbol { bytes, .. } => out.push_str(&String::from_utf8_lossy(bytes)),
        _ => unreachable!("expected a symbol"),
    }
}

fn write_str(heap: &Heap, r: crate::value::HeapRef, mode: Mode, out: &mut String) {
    let bytes = match heap.get(r) {
        Object::Str { bytes } => bytes.clone(),
        _ => unreachable!("expected a string"),
    };
    match mode {
        Mode::Display => out.push_str(&String::from_utf8_lossy(&bytes)),
        Mode::Write => {
            out.push('"');
            for &b in &bytes {
                match b {
                    b'"' => out.push_str("\\\""),
                    b'\\' => out.push_str("\\\\"),
                    b'\n' => out.push_str("\\n"),
                    b'\t' => out.push_str("\\t"),
                    0x0c => out.push_str("\\f"),
                    _ => out.push(b as char),
                }
            }
            out.push('"');
        }
    }
}

fn write_list(heap: &Heap, v: Value, mode: Mode, out: &mut String) {
    out.push('(');
    let mut cursor = v;
    let mut first = true;
    loop {
        match cursor {
            Value::Pair(r) => {
                if !first {
                    out.push(' ');
                }
                first = false;
                let (car, cdr) = match heap.get(r) {
                    Object::Pair { car, cdr } => (*car, *cdr),
                    _ => unreachable!(),
                };
                write_value(heap, car, mode, out);
                cursor = cdr;
            }
            Value::Nil => break,
            other => {
                out.push_str(" . ");
                write_value(heap, other, mode, out);
                break;
            }
        }
    }
    out.push(')');
}

fn write_vector(heap: &Heap, r: crate::value::HeapRef, mode: Mode, out: &mut String) {
    let items = match heap.get(r) {
        Object::Vector { items } => items.clone(),
        _ => unreachable!("expected a vector"),
    };
    out.push_str("#(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_value(heap, *item, mode, out);
    }
    out.push(')');
}

fn write_table(heap: &Heap, r: crate::value::HeapRef, mode: Mode, out: &mut String) {
    let (keys, vals) = match heap.get(r) {
        Object::Table { keys, vals, .. } => (keys.clone(), vals.clone()),
        _ => unreachable!("expected a table"),
    };
    out.push('{');
    let mut first = true;
    for (k, val) in keys.iter().zip(vals.iter()) {
        if k.nullp() {
            continue;
        }
        if !first {
            out.push(' ');
        }
        first = false;
        write_value(heap, *k, mode, out);
        out.push(':');
        out.push(' ');
        write_value(heap, *val, mode, out);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::Context;

    #[test]
    fn write_mode_quotes_strings_with_escapes() {
        let mut ctx = Context::new(Config::default());
        let v = ctx.read_str(r#""a\nb""#).unwrap();
        assert_eq!(ctx.print_write(v), "\"a\\nb\"");
    }

    #[test]
    fn display_mode_prints_raw_string_bytes() {
        let mut ctx = Context::new(Config::default());
        let v = ctx.read_str(r#""a\nb""#).unwrap();
        assert_eq!(ctx.print_display(v), "a\nb");
    }

    #[test]
    fn writes_dotted_pair_and_proper_list() {
        let mut ctx = Context::new(Config::default());
        let v = ctx.read_str("(1 . 2)").unwrap();
        assert_eq!(ctx.print_write(v), "(1 . 2)");
        let v = ctx.read_str("(1 2 3)").unwrap();
        assert_eq!(ctx.print_write(v), "(1 2 3)");
    }

    #[test]
    fn writes_a_named_character() {
        let mut ctx = Context::new(Config::default());
        let v = ctx.read_str(r"#\newline").unwrap();
        assert_eq!(ctx.print_write(v), "#\\newline");
    }

    #[test]
    fn lambda_prints_as_opaque_tag() {
        let mut ctx = Context::new(Config::default());
        let v = ctx.eval_str("(lambda (x) x)").unwrap();
        assert_eq!(ctx.print_write(v), "<lambda>");
    }
}
