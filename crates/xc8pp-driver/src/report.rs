//! Run summaries, printed by the CLI or serialized with `--json`.

use std::path::PathBuf;

use serde::Serialize;
use xc8pp_model::ProgramModel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub name: String,
    pub methods: Vec<String>,
    pub fields: Vec<String>,
}

/// A name with two or more signatures and the C names they got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverloadSummary {
    pub name: String,
    pub mangled: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub classes: Vec<ClassSummary>,
    pub overloads: Vec<OverloadSummary>,
    pub has_main: bool,
}

impl ModelSummary {
    pub fn of(model: &ProgramModel) -> Self {
        let classes = model
            .classes
            .values()
            .map(|c| ClassSummary {
                name: c.name.to_string(),
                methods: c.methods.keys().map(|m| m.to_string()).collect(),
                fields: c.fields.iter().map(|f| f.name.to_string()).collect(),
            })
            .collect();
        let overloads = model
            .functions
            .values()
            .filter(|set| set.is_overloaded())
            .map(|set| OverloadSummary {
                name: set.name.to_string(),
                mangled: set.signatures.iter().map(|f| f.c_name.to_string()).collect(),
            })
            .collect();
        Self {
            classes,
            overloads,
            has_main: model.main.is_some(),
        }
    }
}

/// Result of a single-file run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub outputs: Vec<PathBuf>,
    #[serde(flatten)]
    pub model: ModelSummary,
    pub warnings: Vec<String>,
}

/// A file the batch skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of a batch run. `failures` names exactly the files whose analysis failed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub analyzed: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<Failure>,
    /// Outputs that could not be written.
    pub write_errors: Vec<Failure>,
    #[serde(flatten)]
    pub model: ModelSummary,
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && self.write_errors.is_empty()
    }
}
