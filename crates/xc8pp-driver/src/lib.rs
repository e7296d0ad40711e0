//! Run orchestration for xc8pp.
//!
//! A run reads the inputs and their related files, folds every file's
//! declarations into one [`ProgramModel`], fills callable bodies from the
//! source corpus and writes the generated C.

mod discover;
mod report;

pub use discover::{quoted_includes, related_files, stem_siblings};
pub use report::{BatchReport, ClassSummary, Failure, ModelSummary, OverloadSummary, RunReport};

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use xc8pp_build::ProjectConfig;
use xc8pp_codegen::{generate_batch, generate_unit, GenerateOptions, GeneratedFile};
use xc8pp_common::SourceCorpus;
use xc8pp_frontend::{
    analyze, ClangFrontend, DeclarationSource, DumpFileSource, FrontendError, FrontendOptions,
    StubRegistry,
};
use xc8pp_lower::Locator;
use xc8pp_model::{ModelBuilder, ModelError, ProgramModel};

#[derive(Debug, Error, Diagnostic)]
pub enum DriverError {
    #[error("no input files")]
    #[diagnostic(code(xc8pp::driver::no_inputs))]
    NoInputs,

    #[error("failed to read {}", path.display())]
    #[diagnostic(code(xc8pp::driver::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    #[diagnostic(code(xc8pp::driver::write))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare front-end stub headers")]
    #[diagnostic(
        code(xc8pp::driver::stubs),
        help("pass `--no-stubs` to analyze against the real device headers")
    )]
    Stubs(#[source] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Frontend(#[from] FrontendError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Where declarations come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Run the compiler in dump mode.
    #[default]
    Clang,
    /// Read dumps saved next to the sources as `<file>.ast`.
    DumpFiles,
}

/// Orchestrates analysis, body resolution and generation.
pub struct Driver {
    source: Box<dyn DeclarationSource>,
    options: GenerateOptions,
    stubs: StubRegistry,
}

impl Driver {
    pub fn new(source: Box<dyn DeclarationSource>, options: GenerateOptions) -> Self {
        Self {
            source,
            options,
            stubs: StubRegistry::new(),
        }
    }

    /// Driver for a project configuration. Relative include directories
    /// resolve against `base_dir`.
    pub fn from_config(config: &ProjectConfig, base_dir: &Path, backend: Backend) -> Result<Self> {
        let options = GenerateOptions {
            device_header: config.output.device_header,
            shared_header: config.output.shared_header.clone(),
            xtal_freq: config.target.xtal_freq,
        };
        let mut stubs = StubRegistry::new();
        let source: Box<dyn DeclarationSource> = match backend {
            Backend::DumpFiles => Box::new(DumpFileSource::default()),
            Backend::Clang => {
                let mut frontend = FrontendOptions::new()
                    .timeout(Duration::from_secs(config.frontend.timeout_secs));
                frontend.clang = config.frontend.clang.clone();
                frontend.std = config.frontend.std.clone();
                frontend.extra_args = config.frontend.extra_args.clone();
                for dir in &config.target.includes {
                    frontend = frontend.include_dir(base_dir.join(dir));
                }
                for def in &config.target.defines {
                    frontend = frontend.define(def.clone());
                }
                if !config.defines_macro("_XTAL_FREQ") {
                    frontend = frontend.define(format!("_XTAL_FREQ={}", config.target.xtal_freq));
                }
                if config.frontend.stubs {
                    let dir = stubs
                        .ensure_device_header(&config.target.device, config.target.xtal_freq)
                        .map_err(DriverError::Stubs)?;
                    frontend = frontend.include_dir(dir);
                }
                Box::new(ClangFrontend::new(frontend))
            }
        };
        Ok(Self {
            source,
            options,
            stubs,
        })
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Translate one input and its stem sibling into `<stem>.h` and `<stem>.c`.
    ///
    /// `output` is a `.c` path or a directory; by default the input's
    /// directory. Any analysis failure ends the run.
    pub fn transpile(&self, input: &Path, output: Option<&Path>) -> Result<RunReport> {
        let (model, warnings) = self.model_for(input)?;
        let (dir, stem) = output_target(input, output);
        let generated = generate_unit(&model, &stem, &file_name(input), &self.options);
        let outputs = generated
            .iter()
            .map(|file| write_output(&dir, file))
            .collect::<Result<Vec<_>>>()?;
        Ok(RunReport {
            input: input.to_path_buf(),
            outputs,
            model: ModelSummary::of(&model),
            warnings,
        })
    }

    /// Build the model for one input without generating anything.
    pub fn inspect(&self, input: &Path) -> Result<(ProgramModel, RunReport)> {
        let (model, warnings) = self.model_for(input)?;
        let report = RunReport {
            input: input.to_path_buf(),
            outputs: Vec::new(),
            model: ModelSummary::of(&model),
            warnings,
        };
        Ok((model, report))
    }

    /// Translate many inputs into `output_dir`. Files that cannot be read or
    /// analyzed are recorded in the report and skipped.
    pub fn batch(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<BatchReport> {
        if inputs.is_empty() {
            return Err(DriverError::NoInputs);
        }
        let files = related_files(inputs);
        let mut failures = Vec::new();
        let corpus = self.load_corpus(&files, Some(&mut failures))?;
        let readable: Vec<PathBuf> = files
            .into_iter()
            .filter(|f| corpus.get(f).is_some())
            .collect();
        let (builder, analyzed) = self.fold(&readable, &corpus, Some(&mut failures))?;
        let (model, warnings) = self.resolve(builder, &corpus)?;

        let mut outputs = Vec::new();
        let mut write_errors = Vec::new();
        if analyzed.is_empty() {
            warn!("no file could be analyzed, nothing to generate");
        } else {
            for file in generate_batch(&model, &analyzed, &self.options) {
                match write_output(output_dir, &file) {
                    Ok(path) => outputs.push(path),
                    Err(error) => {
                        warn!(%error, "skipping output");
                        write_errors.push(Failure {
                            path: output_dir.join(&file.name),
                            message: error.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            analyzed = analyzed.len(),
            failed = failures.len(),
            outputs = outputs.len(),
            "batch finished"
        );
        Ok(BatchReport {
            analyzed,
            outputs,
            failures,
            write_errors,
            model: ModelSummary::of(&model),
            warnings,
        })
    }

    /// Remove stub headers now rather than when the driver is dropped.
    pub fn cleanup(&mut self) {
        self.stubs.cleanup();
    }

    fn model_for(&self, input: &Path) -> Result<(ProgramModel, Vec<String>)> {
        let files = related_files(&[input.to_path_buf()]);
        let corpus = self.load_corpus(&files, None)?;
        let (builder, _) = self.fold(&files, &corpus, None)?;
        self.resolve(builder, &corpus)
    }

    /// Read `files` and every local header they include. Unreadable inputs
    /// go to `failures` when given and end the run otherwise.
    fn load_corpus(
        &self,
        files: &[PathBuf],
        mut failures: Option<&mut Vec<Failure>>,
    ) -> Result<SourceCorpus> {
        let mut corpus = SourceCorpus::new();
        let mut pending: Vec<PathBuf> = files.to_vec();
        let mut next = 0;
        while let Some(path) = pending.get(next).cloned() {
            next += 1;
            if corpus.get(&path).is_some() {
                continue;
            }
            match corpus.load(&path) {
                Ok(file) => {
                    for include in quoted_includes(&path, &file.content) {
                        if !pending.contains(&include) {
                            pending.push(include);
                        }
                    }
                }
                Err(source) if next <= files.len() => match failures.as_deref_mut() {
                    Some(failures) => {
                        warn!(path = %path.display(), error = %source, "cannot read input, skipping");
                        failures.push(Failure {
                            message: format!("failed to read {}: {source}", path.display()),
                            path,
                        });
                    }
                    None => return Err(DriverError::Read { path, source }),
                },
                Err(error) => {
                    debug!(path = %path.display(), %error, "skipping unreadable include");
                }
            }
        }
        Ok(corpus)
    }

    /// Fold the declarations of every file into one builder, in order.
    fn fold(
        &self,
        files: &[PathBuf],
        corpus: &SourceCorpus,
        mut failures: Option<&mut Vec<Failure>>,
    ) -> Result<(ModelBuilder, Vec<PathBuf>)> {
        let origins: Vec<&Path> = corpus.paths().collect();
        let mut builder = ModelBuilder::new();
        let mut analyzed = Vec::new();
        for file in files {
            match analyze(self.source.as_ref(), file, &origins) {
                Ok(events) => {
                    info!(
                        path = %file.display(),
                        frontend = self.source.name(),
                        events = events.len(),
                        "folded declarations"
                    );
                    builder = builder.absorb(events);
                    analyzed.push(file.clone());
                }
                Err(error) => match failures.as_deref_mut() {
                    Some(failures) => {
                        warn!(path = %file.display(), %error, "analysis failed, skipping file");
                        failures.push(Failure {
                            path: file.clone(),
                            message: error.to_string(),
                        });
                    }
                    None => return Err(error.into()),
                },
            }
        }
        Ok((builder, analyzed))
    }

    fn resolve(
        &self,
        builder: ModelBuilder,
        corpus: &SourceCorpus,
    ) -> Result<(ProgramModel, Vec<String>)> {
        let mut model = builder.finish()?;
        let warnings = Locator::new(corpus)
            .fill(&mut model)
            .into_iter()
            .map(|name| format!("no body found for `{name}`, emitted a default return"))
            .collect();
        Ok((model, warnings))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "out".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Output directory and stem for a single-file run.
fn output_target(input: &Path, output: Option<&Path>) -> (PathBuf, String) {
    let parent = |p: &Path| p.parent().map(Path::to_path_buf).unwrap_or_default();
    match output {
        Some(path) if path.extension().is_some_and(|e| e == "c") => (parent(path), file_stem(path)),
        Some(dir) => (dir.to_path_buf(), file_stem(input)),
        None => (parent(input), file_stem(input)),
    }
}

fn write_output(dir: &Path, file: &GeneratedFile) -> Result<PathBuf> {
    let path = dir.join(&file.name);
    std::fs::create_dir_all(dir)
        .and_then(|()| std::fs::write(&path, &file.contents))
        .map_err(|source| DriverError::Write {
            path: path.clone(),
            source,
        })?;
    info!(path = %path.display(), bytes = file.contents.len(), "wrote");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_target() {
        let input = Path::new("/src/led.cpp");
        assert_eq!(
            output_target(input, None),
            (PathBuf::from("/src"), "led".to_string())
        );
        assert_eq!(
            output_target(input, Some(Path::new("/out/firmware.c"))),
            (PathBuf::from("/out"), "firmware".to_string())
        );
        assert_eq!(
            output_target(input, Some(Path::new("/out"))),
            (PathBuf::from("/out"), "led".to_string())
        );
        assert_eq!(
            output_target(Path::new("led.cpp"), None),
            (PathBuf::new(), "led".to_string())
        );
    }
}
