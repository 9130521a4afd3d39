//! End-to-end scenarios against the public `Context` API, plus a handful of
//! property-based invariants. Everything here treats the interpreter as a
//! black box: only `femtoscheme`'s public surface (`Context`, `Config`,
//! `Value`) is touched.

use femtoscheme::{Config, Context, Value};
use proptest::prelude::*;

#[test]
fn arithmetic_with_mixed_int_and_real() {
    let mut ctx = Context::new(Config::default());
    assert_eq!(ctx.eval_str("(+ 1 2 3)").unwrap(), Value::Int(6));
    assert_eq!(ctx.eval_str("(+ 1 2.0)").unwrap(), Value::Real(3.0));
}

#[test]
fn nested_closures_capture_their_own_frame() {
    let mut ctx = Context::new(Config::default());
    let v = ctx.eval_str("((lambda (x) ((lambda (y) (+ x y)) 10)) 5)").unwrap();
    assert_eq!(v, Value::Int(15));
}

#[test]
fn list_manipulation_uppercases_symbols_on_read() {
    let mut ctx = Context::new(Config::default());
    let a = ctx.eval_str("(car (quote (a b c)))").unwrap();
    assert_eq!(ctx.print_write(a), "A");
    let b = ctx.eval_str("(cdr (quote (a . b)))").unwrap();
    assert_eq!(ctx.print_write(b), "B");
}

#[test]
fn quasiquote_inside_let_splices_a_bound_value() {
    let mut ctx = Context::new(Config::default());
    let v = ctx.eval_str("(let ((x 5)) `(a ,x b))").unwrap();
    assert_eq!(ctx.print_write(v), "(A 5 B)");
}

#[test]
fn vector_literal_reports_its_length() {
    let mut ctx = Context::new(Config::default());
    let v = ctx.eval_str("(vector-length (quote #(1 2 3)))").unwrap();
    assert_eq!(v, Value::Int(3));
}

#[test]
fn vector_ref_and_set_round_trip() {
    let mut ctx = Context::new(Config::default());
    ctx.eval_str("(define v (quote #(1 2 3)))").unwrap();
    assert_eq!(ctx.eval_str("(vector-ref v 1)").unwrap(), Value::Int(2));
    ctx.eval_str("(vector-set! v 1 99)").unwrap();
    assert_eq!(ctx.eval_str("(vector-ref v 1)").unwrap(), Value::Int(99));
}

#[test]
fn vector_ref_out_of_range_is_an_error() {
    let mut ctx = Context::new(Config::default());
    ctx.eval_str("(define v (quote #(1 2 3)))").unwrap();
    let err = ctx.eval_str("(vector-ref v 9)").unwrap_err();
    assert_eq!(err.kind, femtoscheme::ErrorKind::OutOfBounds);
}

#[test]
fn call_cc_escapes_the_enclosing_arithmetic() {
    let mut ctx = Context::new(Config::default());
    let v = ctx.eval_str("(+ 1 (call/cc (lambda (k) (+ 2 (k 10)))))").unwrap();
    assert_eq!(v, Value::Int(11));
}

#[test]
fn call_cc_with_no_escape_returns_the_body_value() {
    let mut ctx = Context::new(Config::default());
    let v = ctx.eval_str("(call/cc (lambda (k) (+ 1 2)))").unwrap();
    assert_eq!(v, Value::Int(3));
}

#[test]
fn invoking_a_stale_continuation_is_a_runtime_error() {
    let mut ctx = Context::new(Config::default());
    ctx.eval_str("(define saved #f)").unwrap();
    ctx.eval_str("(call/cc (lambda (k) (set! saved k)))").unwrap();
    let err = ctx.eval_str("(saved 1)").unwrap_err();
    assert_eq!(err.kind, femtoscheme::ErrorKind::Runtime);
}

#[test]
fn unterminated_form_is_a_read_syntax_error_and_gc_stays_clean() {
    let mut ctx = Context::new(Config::default());
    let err = ctx.read_str("(foo").unwrap_err();
    assert_eq!(err.kind, femtoscheme::ErrorKind::ReadSyntax);
    ctx.collect(Value::Nil);
    // No panic, no leaked from-space: the context is still usable.
    assert_eq!(ctx.eval_str("(+ 1 1)").unwrap(), Value::Int(2));
}

#[test]
fn gc_reclaims_a_million_transient_pairs() {
    let mut ctx = Context::new(Config::default());
    ctx.collect(Value::Nil);
    let before = ctx.gc_stats().bytes_live;
    for _ in 0..1_000_000 {
        ctx.eval_str("(cons 1 2)").unwrap();
    }
    ctx.collect(Value::Nil);
    let after = ctx.gc_stats().bytes_live;
    // Every transient pair was garbage; live bytes shouldn't have grown
    // materially across a million throwaway allocations.
    assert!(after <= before + 4096, "before={before} after={after}");
}

#[test]
fn deep_self_recursion_runs_in_bounded_rust_stack() {
    let mut ctx = Context::new(Config::default());
    ctx.eval_str(
        "(define (count-down n) (if (= n 0) 0 (count-down (- n 1))))",
    )
    .unwrap();
    let v = ctx.eval_str("(count-down 100000)").unwrap();
    assert_eq!(v, Value::Int(0));
}

#[test]
fn macro_closure_sees_the_environment_where_it_was_defined() {
    let mut ctx = Context::new(Config::default());
    ctx.eval_str(
        "(define-macro given-ten (lambda (expr) (cons (quote +) (cons 10 (cons expr (quote ()))))))",
    )
    .unwrap();
    let v = ctx.eval_str("(given-ten 5)").unwrap();
    assert_eq!(v, Value::Int(15));
}

proptest! {
    #[test]
    fn integer_addition_round_trips_through_read_write(a in -1000i64..1000, b in -1000i64..1000) {
        let mut ctx = Context::new(Config::default());
        let src = format!("(+ {a} {b})");
        let v = ctx.eval_str(&src).unwrap();
        prop_assert_eq!(v, Value::Int(a + b));
    }

    #[test]
    fn mixing_in_a_real_always_promotes_the_whole_sum(a in -1000i64..1000, b in -1000i64..1000) {
        let mut ctx = Context::new(Config::default());
        let src = format!("(+ {a} {b}.0)");
        let v = ctx.eval_str(&src).unwrap();
        prop_assert_eq!(v, Value::Real((a + b) as f64));
    }

    #[test]
    fn interning_the_same_name_twice_yields_pointer_equal_symbols(n in 1u32..50) {
        let mut ctx = Context::new(Config::default());
        let name = format!("sym{n}");
        let a = ctx.intern(&name);
        let b = ctx.intern(&name);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn a_value_survives_a_collection_it_is_rooted_against(n in -10000i64..10000) {
        let mut ctx = Context::new(Config::default());
        let v = ctx.eval_str(&format!("(cons {n} {n})")).unwrap();
        let moved = ctx.collect(v);
        assert_eq!(ctx.print_write(moved), format!("({n} . {n})"));
    }

    #[test]
    fn closures_over_different_captures_stay_independent(a in -100i64..100, b in -100i64..100) {
        let mut ctx = Context::new(Config::default());
        ctx.eval_str("(define make-adder (lambda (n) (lambda (x) (+ x n))))").unwrap();
        ctx.eval_str(&format!("(define add-a (make-adder {a}))")).unwrap();
        ctx.eval_str(&format!("(define add-b (make-adder {b}))")).unwrap();
        let va = ctx.eval_str("(add-a 0)").unwrap();
        let vb = ctx.eval_str("(add-b 0)").unwrap();
        prop_assert_eq!(va, Value::Int(a));
        prop_assert_eq!(vb, Value::Int(b));
    }

    #[test]
    fn call_cc_identity_when_the_continuation_is_never_invoked(n in -1000i64..1000) {
        let mut ctx = Context::new(Config::default());
        let src = format!("(call/cc (lambda (k) {n}))");
        let v = ctx.eval_str(&src).unwrap();
        prop_assert_eq!(v, Value::Int(n));
    }
}
