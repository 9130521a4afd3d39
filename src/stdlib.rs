//! The bootstrap standard library: native arithmetic, pair/predicate
//! procedures, and I/O, installed into every fresh `Context`'s global
//! environment; plus the handful of syntactic macros (`define`, `set!`,
//! `lambda`, `let`) that rewrite ordinary Scheme surface syntax onto the
//! primitive reserved forms the evaluator actually understands. The
//! primitive names (`_DEF`, `_SET!`, `/\_`) are reserved precisely so they
//! never collide with these user-facing spellings.

use std::io::Write;

use crate::context::Context;
use crate::error::{LispError, LispResult};
use crate::list;
use crate::value::{eq, Value};

pub(crate) fn install(ctx: &mut Context) {
    install_natives(ctx);
    install_macros(ctx);
}

fn install_natives(ctx: &mut Context) {
    ctx.install_natives(&[
        ("+", add),
        ("-", sub),
        ("*", mul),
        ("/", div),
        ("=", num_eq),
        ("<", num_lt),
        (">", num_gt),
        ("<=", num_le),
        (">=", num_ge),
        ("cons", cons),
        ("car", car),
        ("cdr", cdr),
        ("list", list_proc),
        ("not", not),
        ("eq?", eq_p),
        ("null?", null_p),
        ("pair?", pair_p),
        ("symbol?", symbol_p),
        ("string?", string_p),
        ("number?", number_p),
        ("procedure?", procedure_p),
        ("display", display),
        ("write", write_proc),
        ("apply", apply_proc),
        ("length", length),
        ("vector-length", vector_length),
        ("vector-ref", vector_ref),
        ("vector-set!", vector_set),
    ]);
}

fn install_macros(ctx: &mut Context) {
    let bindings: &[(&str, crate::value::NativeFn)] =
        &[("define", macro_define), ("set!", macro_set), ("lambda", macro_lambda), ("let", macro_let)];
    for &(name, f) in bindings {
        let sym = ctx.intern(name);
        crate::env::table_insert(&mut ctx.heap, ctx.macros, sym, Value::Func(f));
    }
}

fn want_numbers(args: &[Value]) -> LispResult<Vec<f64>> {
    args.iter().map(|v| v.as_real()).collect()
}

fn all_ints(args: &[Value]) -> bool {
    args.iter().all(|v| v.fixnump())
}

fn add(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if all_ints(args) {
        let mut sum = 0i64;
        for v in args {
            sum += v.as_int()?;
        }
        Ok(Value::Int(sum))
    } else {
        Ok(Value::Real(want_numbers(args)?.into_iter().sum()))
    }
}

fn sub(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if args.is_empty() {
        return Err(LispError::too_few_args("-"));
    }
    if all_ints(args) {
        let mut it = args.iter();
        let first = it.next().unwrap().as_int()?;
        if args.len() == 1 {
            return Ok(Value::Int(-first));
        }
        let mut acc = first;
        for v in it {
            acc -= v.as_int()?;
        }
        Ok(Value::Int(acc))
    } else {
        let nums = want_numbers(args)?;
        if nums.len() == 1 {
            return Ok(Value::Real(-nums[0]));
        }
        let mut acc = nums[0];
        for n in &nums[1..] {
            acc -= n;
        }
        Ok(Value::Real(acc))
    }
}

fn mul(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if all_ints(args) {
        let mut prod = 1i64;
        for v in args {
            prod *= v.as_int()?;
        }
        Ok(Value::Int(prod))
    } else {
        Ok(Value::Real(want_numbers(args)?.into_iter().product()))
    }
}

fn div(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if args.is_empty() {
        return Err(LispError::too_few_args("/"));
    }
    let nums = want_numbers(args)?;
    if nums.len() == 1 {
        return Ok(Value::Real(1.0 / nums[0]));
    }
    let mut acc = nums[0];
    for n in &nums[1..] {
        acc /= n;
    }
    Ok(Value::Real(acc))
}

fn chain<F: Fn(f64, f64) -> bool>(args: &[Value], f: F) -> LispResult<Value> {
    let nums = want_numbers(args)?;
    Ok(Value::Bool(nums.windows(2).all(|w| f(w[0], w[1]))))
}

fn num_eq(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    chain(args, |a, b| a == b)
}
fn num_lt(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    chain(args, |a, b| a < b)
}
fn num_gt(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    chain(args, |a, b| a > b)
}
fn num_le(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    chain(args, |a, b| a <= b)
}
fn num_ge(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    chain(args, |a, b| a >= b)
}

fn cons(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if args.len() != 2 {
        return Err(LispError::too_few_args("cons"));
    }
    Ok(list::cons(&mut ctx.heap, args[0], args[1]))
}

fn car(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let v = args.first().ok_or_else(|| LispError::too_few_args("car"))?;
    list::car(&ctx.heap, *v)
}

fn cdr(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let v = args.first().ok_or_else(|| LispError::too_few_args("cdr"))?;
    list::cdr(&ctx.heap, *v)
}

fn list_proc(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    Ok(list::cons_list(&mut ctx.heap, args.to_vec(), Value::Nil))
}

fn length(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let v = args.first().ok_or_else(|| LispError::too_few_args("length"))?;
    Ok(Value::Int(ctx.list_to_vec(*v)?.len() as i64))
}

fn vector_length(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    match args.first() {
        Some(Value::Vector(r)) => Ok(Value::Int(crate::alloc::vector_len(&ctx.heap, *r) as i64)),
        _ => Err(LispError::arg_type("expected a vector")),
    }
}

fn vector_ref(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let (r, idx) = match (args.first(), args.get(1)) {
        (Some(Value::Vector(r)), Some(i)) => (*r, i.as_int()? as usize),
        _ => return Err(LispError::arg_type("expected (vector-ref vector index)")),
    };
    crate::alloc::vector_get(&ctx.heap, r, idx)
}

fn vector_set(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let (r, idx, val) = match (args.first(), args.get(1), args.get(2)) {
        (Some(Value::Vector(r)), Some(i), Some(v)) => (*r, i.as_int()? as usize, *v),
        _ => return Err(LispError::arg_type("expected (vector-set! vector index value)")),
    };
    crate::alloc::vector_set(&mut ctx.heap, r, idx, val)?;
    Ok(Value::Nil)
}

fn not(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let v = args.first().ok_or_else(|| LispError::too_few_args("not"))?;
    Ok(Value::Bool(!v.truthy()))
}

fn eq_p(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if args.len() != 2 {
        return Err(LispError::too_few_args("eq?"));
    }
    Ok(Value::Bool(eq(&args[0], &args[1])))
}

fn null_p(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    Ok(Value::Bool(args.first().map(|v| v.nullp()).unwrap_or(false)))
}
fn pair_p(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    Ok(Value::Bool(args.first().map(|v| v.pairp()).unwrap_or(false)))
}
fn symbol_p(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    Ok(Value::Bool(args.first().map(|v| v.symbolp()).unwrap_or(false)))
}
fn string_p(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    Ok(Value::Bool(matches!(args.first(), Some(Value::Str(_)))))
}
fn number_p(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    Ok(Value::Bool(args.first().map(|v| v.numberp()).unwrap_or(false)))
}
fn procedure_p(_ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    Ok(Value::Bool(args.first().map(|v| v.callablep()).unwrap_or(false)))
}

fn display(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let v = args.first().copied().unwrap_or(Value::Nil);
    let text = ctx.print_display(v);
    let _ = ctx.out().write_all(text.as_bytes());
    Ok(Value::Nil)
}

fn write_proc(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let v = args.first().copied().unwrap_or(Value::Nil);
    let text = ctx.print_write(v);
    let _ = ctx.out().write_all(text.as_bytes());
    Ok(Value::Nil)
}

/// `(apply proc arg1 ... argn arglist)`: the last argument is spread as a
/// list of trailing arguments.
fn apply_proc(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let (proc, rest) = args.split_first().ok_or_else(|| LispError::too_few_args("apply"))?;
    let (last, fixed) = rest.split_last().ok_or_else(|| LispError::too_few_args("apply"))?;
    let mut full = fixed.to_vec();
    full.extend(ctx.list_to_vec(*last)?);
    ctx.apply(*proc, &full)
}

fn macro_define(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let target = args.first().copied().ok_or_else(|| LispError::too_few_args("define"))?;
    let def = ctx.reserved.def;
    if target.symbolp() {
        let value_expr = args.get(1).copied().unwrap_or(Value::Nil);
        return Ok(list::cons_list(&mut ctx.heap, vec![def, target, value_expr], Value::Nil));
    }
    // (define (NAME . PARAMS) BODY...) -> (_def NAME (lambda PARAMS BODY...))
    // `lambda` here is the surface macro, re-expanded by the caller's
    // recursive walk — not the `/\_` primitive directly.
    let name = list::car(&ctx.heap, target)?;
    let params = list::cdr(&ctx.heap, target)?;
    let lambda_sym = ctx.intern("lambda");
    let body = args[1..].to_vec();
    let mut lambda_form = vec![lambda_sym, params];
    lambda_form.extend(body);
    let lambda_value = list::cons_list(&mut ctx.heap, lambda_form, Value::Nil);
    Ok(list::cons_list(&mut ctx.heap, vec![def, name, lambda_value], Value::Nil))
}

fn macro_set(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if args.len() != 2 {
        return Err(LispError::form_syntax("set! takes exactly two operands"));
    }
    let setbang = ctx.reserved.setbang;
    Ok(list::cons_list(&mut ctx.heap, vec![setbang, args[0], args[1]], Value::Nil))
}

fn macro_lambda(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    if args.is_empty() {
        return Err(LispError::form_syntax("lambda requires a parameter list"));
    }
    let lambda_prim = ctx.reserved.lambda;
    let mut form = vec![lambda_prim];
    form.extend(args.iter().copied());
    Ok(list::cons_list(&mut ctx.heap, form, Value::Nil))
}

/// `(let ((name expr)...) body...)` -> `((lambda (name...) body...) expr...)`
fn macro_let(ctx: &mut Context, args: &[Value]) -> LispResult<Value> {
    let bindings = args.first().copied().ok_or_else(|| LispError::form_syntax("let requires bindings"))?;
    let binding_list = ctx.list_to_vec(bindings)?;
    let mut names = Vec::with_capacity(binding_list.len());
    let mut inits = Vec::with_capacity(binding_list.len());
    for b in binding_list {
        names.push(list::car(&ctx.heap, b)?);
        inits.push(list::car(&ctx.heap, list::cdr(&ctx.heap, b)?)?);
    }
    let params = list::cons_list(&mut ctx.heap, names, Value::Nil);
    let lambda_sym = ctx.intern("lambda");
    let mut lambda_form = vec![lambda_sym, params];
    lambda_form.extend(args[1..].iter().copied());
    let lambda_value = list::cons_list(&mut ctx.heap, lambda_form, Value::Nil);
    let mut call = vec![lambda_value];
    call.extend(inits);
    Ok(list::cons_list(&mut ctx.heap, call, Value::Nil))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn arithmetic_promotes_to_real_when_mixed() {
        let mut ctx = Context::new(Config::default());
        assert_eq!(ctx.eval_str("(+ 1 2 3)").unwrap(), Value::Int(6));
        assert_eq!(ctx.eval_str("(+ 1 2.0)").unwrap(), Value::Real(3.0));
    }

    #[test]
    fn define_and_lambda_and_let_desugar_correctly() {
        let mut ctx = Context::new(Config::default());
        assert_eq!(ctx.eval_str("(define x 5) x").unwrap(), Value::Int(5));
        assert_eq!(ctx.eval_str("((lambda (a b) (+ a b)) 2 3)").unwrap(), Value::Int(5));
        assert_eq!(ctx.eval_str("(let ((a 2) (b 3)) (* a b))").unwrap(), Value::Int(6));
    }

    #[test]
    fn function_shorthand_define_builds_a_lambda() {
        let mut ctx = Context::new(Config::default());
        ctx.eval_str("(define (square x) (* x x))").unwrap();
        assert_eq!(ctx.eval_str("(square 7)").unwrap(), Value::Int(49));
    }

    #[test]
    fn car_cdr_and_predicates() {
        let mut ctx = Context::new(Config::default());
        assert_eq!(ctx.eval_str("(car (cons 1 2))").unwrap(), Value::Int(1));
        assert_eq!(ctx.eval_str("(null? '())").unwrap(), Value::Bool(true));
        assert_eq!(ctx.eval_str("(pair? (cons 1 2))").unwrap(), Value::Bool(true));
    }
}
