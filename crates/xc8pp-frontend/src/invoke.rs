//! Running the external declaration front end.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Why a file could not be analyzed.
#[derive(Debug, Error, Diagnostic)]
pub enum FrontendError {
    #[error("failed to start front end `{program}`")]
    #[diagnostic(
        code(xc8pp::frontend::spawn),
        help("install clang or point `[frontend] clang` in xc8pp.toml at it")
    )]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis of {} failed ({status}): {summary}", path.display())]
    #[diagnostic(code(xc8pp::frontend::failed))]
    Failed {
        path: PathBuf,
        status: String,
        /// First diagnostic line, for reports.
        summary: String,
        stderr: String,
    },

    #[error("analysis of {} timed out after {secs}s", path.display())]
    #[diagnostic(
        code(xc8pp::frontend::timeout),
        help("raise `[frontend] timeout_secs` in xc8pp.toml")
    )]
    Timeout { path: PathBuf, secs: u64 },

    #[error("analysis of {} was cancelled", path.display())]
    #[diagnostic(code(xc8pp::frontend::cancelled))]
    Cancelled { path: PathBuf },

    #[error("failed to read declarations for {}", path.display())]
    #[diagnostic(code(xc8pp::frontend::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FrontendError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FrontendError::Spawn { .. } => None,
            FrontendError::Failed { path, .. }
            | FrontendError::Timeout { path, .. }
            | FrontendError::Cancelled { path }
            | FrontendError::Io { path, .. } => Some(path),
        }
    }
}

/// Anything that can produce a declaration dump for a source file.
pub trait DeclarationSource {
    fn dump(&self, path: &Path) -> Result<String, FrontendError>;

    /// Short name for logs and reports.
    fn name(&self) -> &'static str;
}

/// Shared flag that aborts running front-end calls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Command line settings for [`ClangFrontend`].
#[derive(Debug, Clone)]
pub struct FrontendOptions {
    /// Compiler executable.
    pub clang: String,
    /// Language standard (`-std=`).
    pub std: String,
    /// Include directories (-I flags)
    pub includes: Vec<PathBuf>,
    /// Preprocessor defines (-D flags)
    pub defines: Vec<String>,
    pub extra_args: Vec<String>,
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl Default for FrontendOptions {
    fn default() -> Self {
        Self {
            clang: "clang".to_string(),
            std: "c++17".to_string(),
            includes: Vec::new(),
            defines: Vec::new(),
            extra_args: Vec::new(),
            timeout: Duration::from_secs(60),
            cancel: CancelToken::new(),
        }
    }
}

impl FrontendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an include directory.
    pub fn include_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.includes.push(path.as_ref().to_path_buf());
        self
    }

    /// Add a preprocessor define.
    pub fn define(mut self, def: impl Into<String>) -> Self {
        self.defines.push(def.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs `clang -Xclang -ast-dump` with a deadline.
#[derive(Debug, Clone)]
pub struct ClangFrontend {
    options: FrontendOptions,
}

impl ClangFrontend {
    pub fn new(options: FrontendOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FrontendOptions {
        &self.options
    }

    /// Build the front-end command for one file.
    pub fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.options.clang);
        cmd.args(["-Xclang", "-ast-dump", "-fsyntax-only", "-fno-color-diagnostics"]);
        cmd.args(["-x", "c++"]);
        cmd.arg(format!("-std={}", self.options.std));

        for dir in &self.options.includes {
            cmd.arg("-I");
            cmd.arg(dir);
        }
        for def in &self.options.defines {
            cmd.arg(format!("-D{}", def));
        }
        cmd.args(&self.options.extra_args);
        cmd.arg(path);
        cmd
    }

    fn wait(&self, path: &Path, child: &mut Child) -> Result<ExitStatus, FrontendError> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(source) => {
                    kill(child);
                    return Err(FrontendError::Io {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
            if self.options.cancel.is_cancelled() {
                kill(child);
                return Err(FrontendError::Cancelled {
                    path: path.to_path_buf(),
                });
            }
            if started.elapsed() >= self.options.timeout {
                kill(child);
                return Err(FrontendError::Timeout {
                    path: path.to_path_buf(),
                    secs: self.options.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Drain a pipe on its own thread so a chatty child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

impl DeclarationSource for ClangFrontend {
    fn dump(&self, path: &Path) -> Result<String, FrontendError> {
        if self.options.cancel.is_cancelled() {
            return Err(FrontendError::Cancelled {
                path: path.to_path_buf(),
            });
        }

        let mut cmd = self.command(path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(
            program = ?cmd.get_program(),
            args = ?cmd.get_args().collect::<Vec<_>>(),
            "running front end"
        );

        let mut child = cmd.spawn().map_err(|source| FrontendError::Spawn {
            program: self.options.clang.clone(),
            source,
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(path, &mut child)?;
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !status.success() {
            let summary = stderr
                .lines()
                .find(|l| l.contains("error"))
                .or_else(|| stderr.lines().next())
                .unwrap_or("no diagnostics")
                .trim()
                .to_string();
            return Err(FrontendError::Failed {
                path: path.to_path_buf(),
                status: status.to_string(),
                summary,
                stderr,
            });
        }

        info!(path = %path.display(), bytes = stdout.len(), "analyzed");
        Ok(stdout)
    }

    fn name(&self) -> &'static str {
        "clang"
    }
}

/// Reads a dump saved next to the source as `<file>.<extension>`.
#[derive(Debug, Clone)]
pub struct DumpFileSource {
    extension: String,
}

impl Default for DumpFileSource {
    fn default() -> Self {
        Self {
            extension: "ast".to_string(),
        }
    }
}

impl DumpFileSource {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn dump_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
    }
}

impl DeclarationSource for DumpFileSource {
    fn dump(&self, path: &Path) -> Result<String, FrontendError> {
        let dump_path = self.dump_path(path);
        std::fs::read_to_string(&dump_path).map_err(|source| FrontendError::Io {
            path: dump_path,
            source,
        })
    }

    fn name(&self) -> &'static str {
        "dump"
    }
}

/// In-memory dumps keyed by file name. Unknown files fail analysis.
#[derive(Debug, Clone, Default)]
pub struct CannedFrontend {
    dumps: FxHashMap<String, String>,
}

impl CannedFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: impl Into<String>, dump: impl Into<String>) -> Self {
        self.dumps.insert(file_name.into(), dump.into());
        self
    }
}

impl DeclarationSource for CannedFrontend {
    fn dump(&self, path: &Path) -> Result<String, FrontendError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.dumps
            .get(name)
            .cloned()
            .ok_or_else(|| FrontendError::Failed {
                path: path.to_path_buf(),
                status: "exit status: 1".to_string(),
                summary: format!("{name}: no canned dump"),
                stderr: String::new(),
            })
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let frontend = ClangFrontend::new(
            FrontendOptions::new()
                .include_dir("include")
                .define("LED_COUNT=4"),
        );
        let cmd = frontend.command(Path::new("led.cpp"));
        let args: Vec<_> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(cmd.get_program(), "clang");
        assert_eq!(
            args,
            vec![
                "-Xclang",
                "-ast-dump",
                "-fsyntax-only",
                "-fno-color-diagnostics",
                "-x",
                "c++",
                "-std=c++17",
                "-I",
                "include",
                "-DLED_COUNT=4",
                "led.cpp",
            ]
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let frontend = ClangFrontend::new(FrontendOptions {
            clang: "xc8pp-no-such-compiler".to_string(),
            ..Default::default()
        });
        let err = frontend.dump(Path::new("led.cpp")).unwrap_err();
        assert!(matches!(err, FrontendError::Spawn { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let frontend = ClangFrontend::new(FrontendOptions::new().cancel_token(cancel));
        let err = frontend.dump(Path::new("led.cpp")).unwrap_err();
        assert!(matches!(err, FrontendError::Cancelled { .. }));
        assert_eq!(err.path(), Some(Path::new("led.cpp")));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let frontend =
            ClangFrontend::new(FrontendOptions::new().timeout(Duration::from_millis(100)));
        let mut cmd = Command::new("sleep");
        cmd.arg("5").stdout(Stdio::null()).stderr(Stdio::null());
        let mut child = cmd.spawn().unwrap();
        let started = Instant::now();
        let err = frontend.wait(Path::new("slow.cpp"), &mut child).unwrap_err();
        assert!(matches!(err, FrontendError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_dump_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("led.cpp");
        std::fs::write(dir.path().join("led.cpp.ast"), "TranslationUnitDecl 0x1\n").unwrap();

        let backend = DumpFileSource::default();
        assert_eq!(backend.dump(&source).unwrap(), "TranslationUnitDecl 0x1\n");
        assert!(matches!(
            backend.dump(&dir.path().join("missing.cpp")),
            Err(FrontendError::Io { .. })
        ));
    }

    #[test]
    fn test_canned_frontend() {
        let canned = CannedFrontend::new().with("led.cpp", "dump");
        assert_eq!(canned.dump(Path::new("/x/led.cpp")).unwrap(), "dump");
        assert!(canned.dump(Path::new("/x/other.cpp")).is_err());
    }
}
