//! Source texts and byte spans shared by the xc8pp crates.

mod source;
mod span;

pub use source::{FileKind, SourceCorpus, SourceFile};
pub use span::Span;
