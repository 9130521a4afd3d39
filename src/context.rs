//! The embedding surface: `Context` owns every piece of interpreter state
//! and is the crate's one entry point for a host application.
//!
//! A `Context` is not `Clone` or `Send` — it owns a heap, a value stack
//! used as GC roots, and a symbol table, and nothing about those is safe to
//! share across threads without a lock the crate doesn't impose on the
//! embedder. A host wanting concurrency runs one `Context` per worker.

use std::io::{self, Read, Write};

use crate::alloc::Heap;
use crate::config::Config;
use crate::env;
use crate::error::{LispError, LispResult};
use crate::eval;
use crate::expand;
use crate::list;
use crate::printer;
use crate::read;
use crate::stdlib;
use crate::symbol::SymbolTable;
use crate::value::{HeapRef, NativeFn, Value};

/// Reserved primitive symbols, cached once at startup for pointer-equality
/// comparison in `eval`/`expand` instead of a hash lookup on every form.
pub(crate) struct Reserved {
    pub(crate) if_: Value,
    pub(crate) begin: Value,
    pub(crate) quote: Value,
    pub(crate) quasiquote: Value,
    pub(crate) unquote: Value,
    pub(crate) unquote_splice: Value,
    pub(crate) def: Value,
    pub(crate) define_macro: Value,
    pub(crate) setbang: Value,
    pub(crate) lambda: Value,
    pub(crate) call_cc: Value,
    pub(crate) cons: Value,
}

impl Reserved {
    fn new(heap: &mut Heap, symbols: &mut SymbolTable) -> Self {
        let sym = |heap: &mut Heap, symbols: &mut SymbolTable, name: &[u8]| Value::Symbol(symbols.intern(heap, name));
        Reserved {
            if_: sym(heap, symbols, b"IF"),
            begin: sym(heap, symbols, b"BEGIN"),
            quote: sym(heap, symbols, b"QUOTE"),
            quasiquote: sym(heap, symbols, b"QUASIQUOTE"),
            unquote: sym(heap, symbols, b"UNQUOTE"),
            unquote_splice: sym(heap, symbols, b"UNQUOTESPLICE"),
            def: sym(heap, symbols, b"_DEF"),
            define_macro: sym(heap, symbols, b"DEFINE-MACRO"),
            setbang: sym(heap, symbols, b"_SET!"),
            lambda: sym(heap, symbols, b"/\\_"),
            call_cc: sym(heap, symbols, b"CALL/CC"),
            cons: sym(heap, symbols, b"CONS"),
        }
    }

    /// Every cached reserved value, as mutable roots for a GC flip.
    fn roots_mut(&mut self) -> [&mut Value; 12] {
        [
            &mut self.if_,
            &mut self.begin,
            &mut self.quote,
            &mut self.quasiquote,
            &mut self.unquote,
            &mut self.unquote_splice,
            &mut self.def,
            &mut self.define_macro,
            &mut self.setbang,
            &mut self.lambda,
            &mut self.call_cc,
            &mut self.cons,
        ]
    }
}

pub struct Context {
    pub(crate) heap: Heap,
    pub(crate) symbols: SymbolTable,
    pub(crate) globals: Value,
    pub(crate) macros: HeapRef,
    pub(crate) reserved: Reserved,
    pub(crate) value_stack: Vec<Value>,
    pub(crate) jump_counter: u64,
    gensym_counter: u64,
    pub config: Config,
    in_stream: Box<dyn Read>,
    out_stream: Box<dyn Write>,
    err_stream: Box<dyn Write>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let mut heap = Heap::new(config.page_size);
        let mut symbols = SymbolTable::new();
        let reserved = Reserved::new(&mut heap, &mut symbols);
        let globals = env::extend(&mut heap, Value::Nil, 64);
        let macros = env::new_table(&mut heap, 16);
        let mut ctx = Context {
            heap,
            symbols,
            globals,
            macros,
            reserved,
            value_stack: Vec::with_capacity(config.stack_depth),
            jump_counter: 0,
            gensym_counter: 0,
            config,
            in_stream: Box::new(io::stdin()),
            out_stream: Box::new(io::stdout()),
            err_stream: Box::new(io::stderr()),
        };
        stdlib::install(&mut ctx);
        ctx
    }

    /// Redirect the context's default input/output/error streams. Any of
    /// the three may be swapped independently by the embedder; the others
    /// keep whatever they were.
    pub fn set_in_stream(&mut self, r: Box<dyn Read>) {
        self.in_stream = r;
    }
    pub fn set_out_stream(&mut self, w: Box<dyn Write>) {
        self.out_stream = w;
    }
    pub fn set_err_stream(&mut self, w: Box<dyn Write>) {
        self.err_stream = w;
    }
    pub(crate) fn out(&mut self) -> &mut dyn Write {
        &mut *self.out_stream
    }
    pub(crate) fn err(&mut self) -> &mut dyn Write {
        &mut *self.err_stream
    }

    /// Read one top-level form (or a `(begin ...)` wrapping several) from
    /// an in-memory string.
    pub fn read_str(&mut self, src: &str) -> LispResult<Value> {
        read::read_str(&mut self.heap, &mut self.symbols, &self.config, src)
    }

    /// Read one top-level form from an arbitrary byte stream.
    pub fn read_stream<R: Read>(&mut self, r: R) -> LispResult<Value> {
        read::read_stream(&mut self.heap, &mut self.symbols, &self.config, r)
    }

    /// Read the next form from the context's own configured input stream.
    pub fn read_default(&mut self) -> LispResult<Value> {
        let mut bytes = Vec::new();
        self.in_stream
            .read_to_end(&mut bytes)
            .map_err(|e| LispError::new(crate::error::ErrorKind::FileOpen, e.to_string()))?;
        read::read_stream(&mut self.heap, &mut self.symbols, &self.config, io::Cursor::new(bytes))
    }

    pub fn macroexpand(&mut self, form: Value) -> LispResult<Value> {
        expand::expand(self, form)
    }

    /// Evaluate `form` in the global environment.
    pub fn eval(&mut self, form: Value) -> LispResult<Value> {
        let env = self.globals;
        self.eval_in(form, env)
    }

    /// Evaluate `form` in a specific (e.g. closure-captured) environment.
    pub fn eval_in(&mut self, form: Value, env: Value) -> LispResult<Value> {
        eval::eval(self, form, env).map_err(|u| u.into_lisp_error())
    }

    /// Read, expand, and evaluate `src` as a whole — the convenience path
    /// most callers want.
    pub fn eval_str(&mut self, src: &str) -> LispResult<Value> {
        let form = self.read_str(src)?;
        let expanded = self.macroexpand(form)?;
        self.eval(expanded)
    }

    pub fn apply(&mut self, proc: Value, args: &[Value]) -> LispResult<Value> {
        eval::apply(self, proc, args).map_err(|u| u.into_lisp_error())
    }

    /// Equivalent to evaluating `(call/cc proc)`, for hosts that already
    /// hold a procedure value rather than source text.
    pub fn call_cc(&mut self, proc: Value) -> LispResult<Value> {
        eval::call_cc(self, proc).map_err(|u| u.into_lisp_error())
    }

    /// Install a batch of host-written native procedures into the global
    /// environment, each under its (upper-cased on intern) name.
    pub fn install_natives(&mut self, bindings: &[(&str, NativeFn)]) {
        for &(name, f) in bindings {
            let sym = self.intern(name);
            env::define(&mut self.heap, self.globals, sym, Value::Func(f));
        }
    }

    /// Intern `name` (case-folded to upper-case, matching the reader).
    pub fn intern(&mut self, name: &str) -> Value {
        let upper = name.to_ascii_uppercase();
        Value::Symbol(self.symbols.intern(&mut self.heap, upper.as_bytes()))
    }

    /// A fresh, never-interned symbol, distinct from every other symbol
    /// (including one generated from the same base name).
    pub fn gensym(&mut self, base: &str) -> Value {
        self.gensym_counter += 1;
        let bytes = format!("{base}%{}", self.gensym_counter).into_bytes();
        let r = self.heap.alloc(crate::alloc::Object::Symbol { bytes: bytes.into(), next: None });
        Value::Symbol(r)
    }

    pub fn print_write(&self, v: Value) -> String {
        printer::print(&self.heap, v, printer::Mode::Write)
    }

    pub fn print_display(&self, v: Value) -> String {
        printer::print(&self.heap, v, printer::Mode::Display)
    }

    pub fn gc_stats(&self) -> crate::alloc::GcStats {
        self.heap.stats
    }

    /// Run one copying collection. `save_root` is returned with its
    /// (possibly moved) value so a caller mid-computation doesn't lose
    /// track of a value it isn't ready to commit into the environment yet.
    pub fn collect(&mut self, save_root: Value) -> Value {
        let Context { heap, symbols, globals, macros, reserved, value_stack, .. } = self;
        let mut macros_value = Value::Table(*macros);
        let mut roots: Vec<&mut Value> = Vec::with_capacity(2 + 12 + value_stack.len());
        roots.push(globals);
        roots.push(&mut macros_value);
        roots.extend(reserved.roots_mut());
        roots.extend(value_stack.iter_mut());
        let moved = heap.flip(&mut roots, save_root, symbols);
        *macros = match macros_value {
            Value::Table(r) => r,
            _ => unreachable!("macro table root changed type across a flip"),
        };
        moved
    }

    pub(crate) fn list_to_vec(&self, v: Value) -> LispResult<Vec<Value>> {
        list::list_to_vec(&self.heap, v)
    }
}
