//! The tree-walking evaluator.
//!
//! `eval` loops instead of recursing on tail position: a lambda call in
//! tail position rewrites `expr`/`env` and `continue`s rather than calling
//! back into `eval`, so self-recursive Scheme procedures run in O(1) Rust
//! stack. Escaping continuations are a second, orthogonal control-flow
//! channel: applying a captured `Jump` raises `Unwind::Jump` instead of
//! returning a value, and it propagates up through `?` past ordinary
//! `eval`/`apply` frames until the `call/cc` that minted it catches its own
//! id back out in `call_cc` below.

use crate::alloc::Object;
use crate::context::Context;
use crate::error::LispError;
use crate::list;
use crate::value::{eq, HeapRef, Value};

/// What unwinds a `?` chain besides an ordinary error: either a ready
/// `LispError`, or a continuation invocation still looking for the
/// `call/cc` frame that captured it.
pub(crate) enum Unwind {
    Error(LispError),
    Jump(u64, Value),
}

impl From<LispError> for Unwind {
    fn from(e: LispError) -> Self {
        Unwind::Error(e)
    }
}

impl Unwind {
    /// Collapse a `Jump` that reached the top of `eval`/`apply` without
    /// being caught into an ordinary error — it named an id no enclosing
    /// `call/cc` recognizes.
    pub(crate) fn into_lisp_error(self) -> LispError {
        match self {
            Unwind::Error(e) => e,
            Unwind::Jump(..) => LispError::runtime("continuation invoked outside its call/cc"),
        }
    }
}

type EvalResult = Result<Value, Unwind>;

fn push_root(ctx: &mut Context, v: Value) -> Result<(), Unwind> {
    if ctx.value_stack.len() >= ctx.config.stack_depth {
        return Err(Unwind::Error(LispError::runtime("value stack overflow")));
    }
    ctx.value_stack.push(v);
    Ok(())
}

fn pop_root(ctx: &mut Context) {
    ctx.value_stack.pop();
}

fn lambda_parts(ctx: &Context, r: HeapRef) -> (Value, Value, Value) {
    match ctx.heap.get(r) {
        Object::Lambda { params, body, env } => (*params, *body, *env),
        _ => unreachable!("expected a lambda"),
    }
}

/// Evaluate `expr` in `env`, looping on tail calls.
pub(crate) fn eval(ctx: &mut Context, mut expr: Value, mut env: Value) -> EvalResult {
    loop {
        if expr.self_evaluating() {
            return Ok(expr);
        }
        match expr {
            Value::Symbol(_) => {
                return crate::env::lookup(&ctx.heap, env, expr).ok_or_else(|| {
                    Unwind::Error(LispError::undefined_var(&crate::env::symbol_name(&ctx.heap, expr)))
                });
            }
            Value::Pair(p) => {
                let (op, args) = list::pair_parts(&ctx.heap, p);

                if eq(&op, &ctx.reserved.quote) {
                    return Ok(list::nth(&ctx.heap, args, 0)?);
                }
                if eq(&op, &ctx.reserved.if_) {
                    let test = eval(ctx, list::nth(&ctx.heap, args, 0)?, env)?;
                    expr = if test.truthy() {
                        list::nth(&ctx.heap, args, 1)?
                    } else {
                        match list::nth_opt(&ctx.heap, args, 2) {
                            Some(alt) => alt,
                            None => return Ok(Value::Nil),
                        }
                    };
                    continue;
                }
                if eq(&op, &ctx.reserved.begin) {
                    let mut items = list::list_to_vec(&ctx.heap, args)?;
                    let Some(last) = items.pop() else { return Ok(Value::Nil) };
                    for item in items {
                        eval(ctx, item, env)?;
                    }
                    expr = last;
                    continue;
                }
                if eq(&op, &ctx.reserved.def) {
                    let name = list::nth(&ctx.heap, args, 0)?;
                    let v = eval(ctx, list::nth(&ctx.heap, args, 1)?, env)?;
                    crate::env::define(&mut ctx.heap, env, name, v);
                    return Ok(Value::Nil);
                }
                if eq(&op, &ctx.reserved.setbang) {
                    let name = list::nth(&ctx.heap, args, 0)?;
                    let v = eval(ctx, list::nth(&ctx.heap, args, 1)?, env)?;
                    crate::env::set(&mut ctx.heap, env, name, v)?;
                    return Ok(Value::Nil);
                }
                if eq(&op, &ctx.reserved.lambda) {
                    let params = list::nth(&ctx.heap, args, 0)?;
                    let body = list::cdr(&ctx.heap, args)?;
                    let r = ctx.heap.alloc(Object::Lambda { params, body, env });
                    return Ok(Value::Lambda(r));
                }
                if eq(&op, &ctx.reserved.call_cc) {
                    let proc_expr = list::nth(&ctx.heap, args, 0)?;
                    let proc = eval(ctx, proc_expr, env)?;
                    return call_cc(ctx, proc);
                }

                // Application: evaluate operator and operands, then dispatch.
                // `env` stays rooted across both sub-evaluations — a native
                // invoked from either one could collect.
                push_root(ctx, env)?;
                let opv = eval(ctx, op, env);
                let opv = match opv {
                    Ok(v) => v,
                    Err(e) => {
                        pop_root(ctx); // env
                        return Err(e);
                    }
                };
                if let Err(e) = push_root(ctx, opv) {
                    pop_root(ctx); // env
                    return Err(e);
                }
                let argv = eval_args(ctx, args, env);
                pop_root(ctx); // opv
                pop_root(ctx); // env
                let argv = argv?;

                match opv {
                    Value::Lambda(lr) => {
                        let (params, body, closure_env) = lambda_parts(ctx, lr);
                        let new_env = bind_params(ctx, params, &argv, closure_env)?;
                        let mut items = list::list_to_vec(&ctx.heap, body)?;
                        let Some(last) = items.pop() else { return Ok(Value::Nil) };
                        for item in items {
                            eval(ctx, item, new_env)?;
                        }
                        expr = last;
                        env = new_env;
                        continue;
                    }
                    Value::Func(f) => return f(ctx, &argv).map_err(Unwind::Error),
                    Value::Jump(jr) => return apply_jump(ctx, jr, &argv),
                    other => {
                        return Err(Unwind::Error(LispError::bad_op(format!(
                            "{} is not callable",
                            other.kind_name()
                        ))))
                    }
                }
            }
            _ => unreachable!("self_evaluating already returned"),
        }
    }
}

/// Evaluate `proc` applied to already-evaluated `argv`. Used wherever a
/// call isn't in tail position: `call/cc`'s own invocation of its
/// argument, `apply`, macro expansion.
pub(crate) fn apply(ctx: &mut Context, proc: Value, argv: &[Value]) -> EvalResult {
    match proc {
        Value::Lambda(lr) => {
            let (params, body, closure_env) = lambda_parts(ctx, lr);
            let new_env = bind_params(ctx, params, argv, closure_env)?;
            eval_body(ctx, body, new_env)
        }
        Value::Func(f) => f(ctx, argv).map_err(Unwind::Error),
        Value::Jump(jr) => apply_jump(ctx, jr, argv),
        other => Err(Unwind::Error(LispError::bad_op(format!("{} is not callable", other.kind_name())))),
    }
}

fn eval_body(ctx: &mut Context, body: Value, env: Value) -> EvalResult {
    let mut items = list::list_to_vec(&ctx.heap, body)?;
    let Some(last) = items.pop() else { return Ok(Value::Nil) };
    for item in items {
        eval(ctx, item, env)?;
    }
    eval(ctx, last, env)
}

/// Evaluate each element of `list` left to right, pushing each result as a
/// root before evaluating the next so earlier arguments survive a GC flip
/// triggered by a later one.
fn eval_args(ctx: &mut Context, mut list: Value, env: Value) -> Result<Vec<Value>, Unwind> {
    let mut count = 0usize;
    loop {
        match list {
            Value::Nil => break,
            Value::Pair(r) => {
                let (car, cdr) = crate::list::pair_parts(&ctx.heap, r);
                let v = eval(ctx, car, env)?;
                push_root(ctx, v)?;
                count += 1;
                list = cdr;
            }
            _ => return Err(Unwind::Error(LispError::form_syntax("improper argument list"))),
        }
    }
    let start = ctx.value_stack.len() - count;
    let argv: Vec<Value> = ctx.value_stack[start..].to_vec();
    ctx.value_stack.truncate(start);
    Ok(argv)
}

/// Bind `argv` into a fresh frame under `parent` according to `params`: a
/// proper list of names (exact arity), a list with a symbol tail (rest
/// args collect there), or a bare symbol (collects every argument).
fn bind_params(ctx: &mut Context, params: Value, argv: &[Value], parent: Value) -> Result<Value, Unwind> {
    let new_env = crate::env::extend(&mut ctx.heap, parent, argv.len().max(1));
    if let Value::Symbol(_) = params {
        let rest = list::cons_list(&mut ctx.heap, argv.to_vec(), Value::Nil);
        crate::env::define(&mut ctx.heap, new_env, params, rest);
        return Ok(new_env);
    }
    let mut cursor = params;
    let mut i = 0usize;
    loop {
        match cursor {
            Value::Nil => {
                if i < argv.len() {
                    return Err(Unwind::Error(LispError::too_many_args("lambda")));
                }
                return Ok(new_env);
            }
            Value::Pair(r) => {
                let (name, rest) = list::pair_parts(&ctx.heap, r);
                if i >= argv.len() {
                    return Err(Unwind::Error(LispError::too_few_args("lambda")));
                }
                crate::env::define(&mut ctx.heap, new_env, name, argv[i]);
                i += 1;
                cursor = rest;
            }
            Value::Symbol(_) => {
                let rest = list::cons_list(&mut ctx.heap, argv[i..].to_vec(), Value::Nil);
                crate::env::define(&mut ctx.heap, new_env, cursor, rest);
                return Ok(new_env);
            }
            _ => return Err(Unwind::Error(LispError::form_syntax("malformed parameter list"))),
        }
    }
}

/// `call/cc`: mint a fresh `Jump` tagged with a new id and the current
/// value-stack depth, apply `proc` to it, and catch exactly the `Unwind`
/// this frame minted. A jump naming a different id passes straight
/// through — it belongs to an outer (or unrelated) `call/cc`.
pub(crate) fn call_cc(ctx: &mut Context, proc: Value) -> EvalResult {
    ctx.jump_counter += 1;
    let id = ctx.jump_counter;
    let depth = ctx.value_stack.len();
    let jr = ctx.heap.alloc(Object::Jump { id, depth, valid: true });
    let jump_val = Value::Jump(jr);
    push_root(ctx, jump_val)?;
    let result = apply(ctx, proc, &[jump_val]);
    pop_root(ctx);
    invalidate_jump(ctx, jr);
    match result {
        Ok(v) => Ok(v),
        Err(Unwind::Jump(jid, value)) if jid == id => {
            ctx.value_stack.truncate(depth);
            Ok(value)
        }
        Err(other) => Err(other),
    }
}

fn invalidate_jump(ctx: &mut Context, jr: HeapRef) {
    if let Object::Jump { valid, .. } = ctx.heap.get_mut(jr) {
        *valid = false;
    }
}

/// Apply a previously captured continuation: raise `Unwind::Jump` so it
/// propagates up to the matching `call_cc` frame, or a runtime error if
/// that frame has already returned.
fn apply_jump(ctx: &mut Context, jr: HeapRef, argv: &[Value]) -> EvalResult {
    let (id, valid) = match ctx.heap.get(jr) {
        Object::Jump { id, valid, .. } => (*id, *valid),
        _ => unreachable!("expected a jump"),
    };
    if !valid {
        return Err(Unwind::Error(LispError::runtime(
            "continuation invoked after its capture frame returned",
        )));
    }
    let value = argv.first().copied().unwrap_or(Value::Nil);
    Err(Unwind::Jump(id, value))
}
