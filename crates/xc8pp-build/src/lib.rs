//! Project configuration for the xc8pp translator.
//!
//! Every section is optional; command-line flags override file values.
//!
//! # Example
//!
//! ```toml
//! # xc8pp.toml
//! [project]
//! name = "arduino-multi"
//!
//! [target]
//! device = "PIC16F876A"
//! xtal_freq = 4000000
//! includes = ["include"]
//! defines = ["DEBUG=1"]
//!
//! [frontend]
//! clang = "clang"
//! std = "c++17"
//! timeout_secs = 30
//!
//! [output]
//! shared_header = "shared_definitions.h"
//! ```

mod config;
mod error;

pub use config::{CliOverrides, FrontendConfig, OutputConfig, ProjectConfig, ProjectMeta, TargetConfig};
pub use error::{BuildError, Result};

/// Name of the configuration file looked up next to the inputs.
pub const CONFIG_FILE_NAME: &str = "xc8pp.toml";
