use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xc8pp_build::{CliOverrides, ProjectConfig};
use xc8pp_driver::{Backend, Driver, ModelSummary};

#[derive(Parser)]
#[command(name = "xc8pp")]
#[command(author, version, about = "Translate a C++ subset to C for the XC8 compiler")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one source file (and its header) into a .c/.h pair
    Transpile {
        /// Source file to translate
        input: PathBuf,

        /// Output .c file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Translate several files into a shared header and one unit per file
    Batch {
        /// Source files to translate
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print the classes, overloads and main function found in a file
    Dump {
        /// Source file to inspect
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Options shared by every subcommand.
#[derive(Args)]
struct TargetArgs {
    /// Project file (default: xc8pp.toml next to the first input or above it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target device, e.g. PIC16F876A
    #[arg(long)]
    device: Option<String>,

    /// Include directory
    #[arg(short = 'I', long = "include")]
    includes: Vec<String>,

    /// Preprocessor define, NAME or NAME=VALUE
    #[arg(short = 'D', long = "define")]
    defines: Vec<String>,

    /// Compiler used to produce declaration dumps
    #[arg(long)]
    clang: Option<String>,

    /// Seconds before a front-end call is abandoned
    #[arg(long)]
    timeout: Option<u64>,

    /// Do not synthesize stub device headers
    #[arg(long)]
    no_stubs: bool,

    /// Where declarations come from
    #[arg(long, value_enum, default_value = "clang")]
    frontend: FrontendKind,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FrontendKind {
    /// Run clang in AST dump mode
    Clang,
    /// Read `<file>.ast` dumps saved next to the sources
    Dump,
}

impl TargetArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            device: self.device.clone(),
            includes: self.includes.clone(),
            defines: self.defines.clone(),
            clang: self.clang.clone(),
            timeout_secs: self.timeout,
            no_stubs: self.no_stubs,
        }
    }

    /// Load the project file, apply flags, and build a driver.
    fn driver(&self, first_input: &Path) -> Result<Driver> {
        let input_dir = first_input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let config_path = self
            .config
            .clone()
            .or_else(|| ProjectConfig::discover(input_dir));

        let mut config = match &config_path {
            Some(path) => {
                debug!(path = %path.display(), "loading project file");
                ProjectConfig::from_file(path)
                    .map_err(|e| miette::miette!("{}: {}", path.display(), e))?
            }
            None => ProjectConfig::default(),
        };
        config.merge_cli(&self.overrides());
        config
            .validate()
            .map_err(|e| miette::miette!("invalid options: {}", e))?;

        let base_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(input_dir)
            .to_path_buf();
        let backend = match self.frontend {
            FrontendKind::Clang => Backend::Clang,
            FrontendKind::Dump => Backend::DumpFiles,
        };
        Ok(Driver::from_config(&config, &base_dir, backend)?)
    }
}

fn print_json<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| miette::miette!("Failed to serialize report: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn print_summary(model: &ModelSummary) {
    for class in &model.classes {
        println!(
            "class {} ({} fields, {} methods)",
            class.name,
            class.fields.len(),
            class.methods.len()
        );
    }
    for set in &model.overloads {
        println!("overload {} -> {}", set.name, set.mangled.join(", "));
    }
    if model.has_main {
        println!("main");
    }
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}

/// `RUST_LOG` wins unless `-v` asks for debug output.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("xc8pp=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xc8pp=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Transpile {
            input,
            output,
            target,
        } => {
            let mut driver = target.driver(&input)?;
            let report = driver.transpile(&input, output.as_deref());
            driver.cleanup();
            let report = report?;

            if target.json {
                print_json(&report)?;
            } else {
                print_warnings(&report.warnings);
                for path in &report.outputs {
                    println!("{} -> {}", input.display(), path.display());
                }
            }
        }

        Commands::Batch {
            inputs,
            output,
            target,
        } => {
            let mut driver = target.driver(&inputs[0])?;
            let report = driver.batch(&inputs, &output);
            driver.cleanup();
            let report = report?;

            if target.json {
                print_json(&report)?;
            } else {
                print_warnings(&report.warnings);
                for path in &report.outputs {
                    println!("wrote {}", path.display());
                }
                for failure in report.failures.iter().chain(&report.write_errors) {
                    eprintln!("{}: {}", failure.path.display(), failure.message);
                }
            }
            if !report.succeeded() {
                return Err(miette::miette!(
                    "{} of {} files failed",
                    report.failures.len() + report.write_errors.len(),
                    inputs.len()
                ));
            }
        }

        Commands::Dump { input, target } => {
            let mut driver = target.driver(&input)?;
            let result = driver.inspect(&input);
            driver.cleanup();
            let (_, report) = result?;

            if target.json {
                print_json(&report)?;
            } else {
                print_warnings(&report.warnings);
                print_summary(&report.model);
            }
        }
    }

    Ok(())
}
