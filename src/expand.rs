//! Macro expansion.
//!
//! `expand` walks a form post-order, rewriting sugar and user macros away
//! before `eval` ever sees it. `quote` is shape-checked and left alone.
//! `quasiquote` is rewritten into nested `cons`/`quote` calls that build the
//! structure at eval time; the rewrite never splices a `,@` result into its
//! surrounding list itself (`UNQUOTESPLICE` is threaded through verbatim as
//! data for whatever consumes the quasiquoted list downstream) — only a
//! bare `,@` with no enclosing quasiquoted list is rejected outright.
//! `define-macro` evaluates its right-hand side immediately in the global
//! environment and erases to `Nil`; any other `(OP . args)` where `OP`
//! names a macro is expanded by applying the macro to the unevaluated
//! `args` and recursively re-expanding the result.

use crate::context::Context;
use crate::error::{LispError, LispResult};
use crate::list;
use crate::value::{eq, Value};

fn is_bare_splice(ctx: &Context, x: Value) -> bool {
    match x {
        Value::Pair(r) => {
            let (car, _) = list::pair_parts(&ctx.heap, r);
            eq(&car, &ctx.reserved.unquote_splice)
        }
        _ => false,
    }
}

fn expand_quasiquote(ctx: &mut Context, x: Value) -> LispResult<Value> {
    match x {
        Value::Pair(r) => {
            let (car, cdr) = list::pair_parts(&ctx.heap, r);
            if eq(&car, &ctx.reserved.unquote) {
                let inner = list::car(&ctx.heap, cdr)?;
                return expand(ctx, inner);
            }
            let qcar = expand_quasiquote(ctx, car)?;
            let qcdr = expand_quasiquote(ctx, cdr)?;
            let cons_sym = ctx.reserved.cons;
            Ok(list::cons_list(&mut ctx.heap, vec![cons_sym, qcar, qcdr], Value::Nil))
        }
        atom => {
            let quote_sym = ctx.reserved.quote;
            Ok(list::cons_list(&mut ctx.heap, vec![quote_sym, atom], Value::Nil))
        }
    }
}

fn expand_list(ctx: &mut Context, list: Value) -> LispResult<Value> {
    match list {
        Value::Nil => Ok(Value::Nil),
        Value::Pair(r) => {
            let (car, cdr) = crate::list::pair_parts(&ctx.heap, r);
            let car2 = expand(ctx, car)?;
            let cdr2 = expand_list(ctx, cdr)?;
            Ok(crate::list::cons(&mut ctx.heap, car2, cdr2))
        }
        dotted_tail => expand(ctx, dotted_tail),
    }
}

/// Expand `form`, recursively, to the form `eval` can walk directly.
pub(crate) fn expand(ctx: &mut Context, form: Value) -> LispResult<Value> {
    let Value::Pair(r) = form else { return Ok(form) };
    let (op, args) = list::pair_parts(&ctx.heap, r);

    if eq(&op, &ctx.reserved.quote) {
        if list::list_len(&ctx.heap, args) != 1 {
            return Err(LispError::form_syntax("quote takes exactly one operand"));
        }
        return Ok(form);
    }

    if eq(&op, &ctx.reserved.quasiquote) {
        let x = list::nth(&ctx.heap, args, 0)?;
        if is_bare_splice(ctx, x) {
            return Err(LispError::form_syntax("unquote-splice is not valid outside a quasiquoted list"));
        }
        return expand_quasiquote(ctx, x);
    }

    if eq(&op, &ctx.reserved.define_macro) {
        let name = list::nth(&ctx.heap, args, 0)?;
        let proc_expr = list::nth(&ctx.heap, args, 1)?;
        let globals = ctx.globals;
        let proc = crate::eval::eval(ctx, proc_expr, globals).map_err(|u| u.into_lisp_error())?;
        if !proc.lambdap() {
            return Err(LispError::form_syntax("define-macro right-hand side must evaluate to a lambda"));
        }
        let macros = ctx.macros;
        crate::env::table_insert(&mut ctx.heap, macros, name, proc);
        return Ok(Value::Nil);
    }

    if op.symbolp() {
        if let Some(macro_proc) = crate::env::table_get(&ctx.heap, ctx.macros, op) {
            let argv = list::list_to_vec(&ctx.heap, args)?;
            let expanded_once = crate::eval::apply(ctx, macro_proc, &argv).map_err(|u| u.into_lisp_error())?;
            return expand(ctx, expanded_once);
        }
    }

    let op2 = expand(ctx, op)?;
    let args2 = expand_list(ctx, args)?;
    Ok(crate::list::cons(&mut ctx.heap, op2, args2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn quote_is_left_untouched() {
        let mut ctx = Context::new(Config::default());
        let form = ctx.read_str("(quote (1 2))").unwrap();
        let expanded = ctx.macroexpand(form).unwrap();
        assert_eq!(expanded, form);
    }

    #[test]
    fn bare_splice_outside_quasiquote_errors() {
        let mut ctx = Context::new(Config::default());
        let form = ctx.read_str("(quasiquote (unquote-splice 1))").unwrap();
        assert!(ctx.macroexpand(form).is_err());
    }

    #[test]
    fn quasiquote_rewrites_unquote_and_builds_cons_spine() {
        let mut ctx = Context::new(Config::default());
        let form = ctx.read_str("(quasiquote ((unquote (quote 1)) 2))").unwrap();
        let expanded = ctx.macroexpand(form).unwrap();
        let value = ctx.eval(expanded).unwrap();
        let items = list::list_to_vec(&ctx.heap, value).unwrap();
        assert_eq!(items, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn define_macro_installs_into_macro_table_and_erases() {
        let mut ctx = Context::new(Config::default());
        let form = ctx
            .read_str("(define-macro twice (lambda (x) (cons (quote quote) (cons x (quote ())))))")
            .unwrap();
        let expanded = ctx.macroexpand(form).unwrap();
        assert_eq!(expanded, Value::Nil);
        let name = ctx.intern("twice");
        assert!(crate::env::table_get(&ctx.heap, ctx.macros, name).is_some());
    }
}
