//! Lowering C++ bodies to C.
//!
//! [`Locator`] recovers the source text of every callable in a
//! [`ProgramModel`](xc8pp_model::ProgramModel); [`Rewriter`] turns that text
//! into C using a per-callable [`Scope`].

pub mod lexer;
mod locate;
mod rewrite;
mod scope;

pub use locate::{index_file, Definition, FileIndex, GlobalInit, Locator, ParamText};
pub use rewrite::{split_args, Rewriter};
pub use scope::{infer_missing_params, scan_locals, Binding, BindingKind, Scope};
