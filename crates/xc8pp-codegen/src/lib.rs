//! C generation for xc8pp.
//!
//! [`generate_unit`] writes a whole program as one header and source pair.
//! [`generate_batch`] spreads it over a shared header, one header per
//! class-mapped stem, and one translation unit per input stem.

mod batch;
mod emit;
mod unit;

pub use batch::{generate_batch, BatchLayout};
pub use emit::{guard_name, reindent, CWriter, Emitter};
pub use unit::generate_unit;

/// Generation settings, taken from `[target]` and `[output]` of `xc8pp.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Emit `#include <xc.h>` in translation units.
    pub device_header: bool,
    /// File name of the batch-mode shared header.
    pub shared_header: String,
    /// Default for `_XTAL_FREQ` when the build does not define it.
    pub xtal_freq: u64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            device_header: true,
            shared_header: "shared_definitions.h".to_string(),
            xtal_freq: 4_000_000,
        }
    }
}

/// One generated file, named relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

impl GeneratedFile {
    pub fn is_header(&self) -> bool {
        self.name.ends_with(".h")
    }
}
