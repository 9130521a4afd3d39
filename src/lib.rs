//! `femtoscheme`: an embeddable, garbage-collected, tree-walking Scheme
//! interpreter.
//!
//! A host embeds the language by creating a [`Context`], feeding it source
//! through [`Context::read_str`]/[`Context::read_stream`], optionally
//! [`Context::macroexpand`]ing the result, then [`Context::eval`]uating it.
//! [`Context::install_natives`] registers host-written procedures; values
//! move freely in and out of Rust through the [`Value`] enum.
//!
//! ```
//! use femtoscheme::{Config, Context};
//!
//! let mut ctx = Context::new(Config::default());
//! let result = ctx.eval_str("(+ 1 2 3)").unwrap();
//! assert_eq!(ctx.print_write(result), "6");
//! ```

mod alloc;
mod config;
mod context;
mod env;
mod error;
mod eval;
mod expand;
mod list;
mod printer;
mod read;
mod stdlib;
mod symbol;
mod value;

pub use alloc::GcStats;
pub use config::Config;
pub use context::Context;
pub use error::{ErrorKind, LispError, LispResult};
pub use printer::Mode as PrintMode;
pub use value::{HeapRef, NativeFn, RawHostPtr, Tag, Value, EOF_CHAR};
