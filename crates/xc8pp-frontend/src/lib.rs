//! Declaration front end for xc8pp.
//!
//! Runs the external compiler in dump mode and turns its line-oriented
//! output into a flat stream of [`DeclEvent`]s.

mod dump;
mod filter;
mod invoke;
pub mod stubs;

pub use dump::{
    parse_dump, CallableDecl, DeclEvent, DumpParser, LocalDecl, ParamDecl, RecordKeyword,
};
pub use invoke::{
    CancelToken, CannedFrontend, ClangFrontend, DeclarationSource, DumpFileSource, FrontendError,
    FrontendOptions,
};
pub use stubs::StubRegistry;

use std::path::Path;

/// Dump `path` and parse the declarations that belong to `origins`.
///
/// An empty `origins` slice keeps every declaration the filters allow.
pub fn analyze(
    source: &dyn DeclarationSource,
    path: &Path,
    origins: &[&Path],
) -> Result<Vec<DeclEvent>, FrontendError> {
    let dump = source.dump(path)?;
    let parser = if origins.is_empty() {
        DumpParser::new()
    } else {
        DumpParser::new().with_origins(origins.iter().copied())
    };
    Ok(parser.parse(&dump))
}
