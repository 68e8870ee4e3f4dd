//! sqlharvest CLI - Analyze SQL embedded in Java sources and MyBatis mappers

mod commands;

use clap::{Args, Parser, Subcommand};
use sqlharvest::config::{self, HarvestConfig};
use sqlharvest::output::{emit_error, OutputMode};
use sqlharvest::ui;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sqlharvest")]
#[command(version)]
#[command(about = "Extract embedded SQL, run a SQL analyzer over it, and map findings back to source")]
#[command(long_about = r#"
sqlharvest pulls SQL out of the files it lives in, so a SQL-only analyzer can check it:
  • String literals passed to JDBC/JPA calls and MyBatis annotations in Java
  • Statement elements of MyBatis XML mappers

Every statement becomes a standalone snippet. Findings on snippets are mapped
back to the Java or XML file they came from.

Example usage:
  sqlharvest analyze --rules rules/sql.yaml src/
  sqlharvest extract --output-dir tmp/sql-extract src/main/resources
  sqlharvest init
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (defaults to ./sqlharvest.toml when present)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScanArgs {
    /// Files or directories to scan
    targets: Vec<PathBuf>,

    /// Directory for snippets and reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Eligible file extensions, comma separated
    #[arg(short, long = "ext", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Skip files matched by .gitignore/.ignore
    #[arg(long)]
    respect_ignore: bool,
}

impl ScanArgs {
    fn apply(self, config: &mut HarvestConfig) {
        if !self.targets.is_empty() {
            config.targets = self.targets;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if !self.extensions.is_empty() {
            config.extensions = self.extensions;
        }
        if self.respect_ignore {
            config.respect_ignore_files = true;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract SQL, run the analyzer, and remap its findings
    Analyze {
        #[command(flatten)]
        scan: ScanArgs,

        /// Rule configuration passed to the analyzer
        #[arg(short, long)]
        rules: Option<String>,

        /// Analyzer executable
        #[arg(short, long)]
        analyzer: Option<PathBuf>,
    },

    /// Extract SQL into snippets without running the analyzer
    Extract {
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Analyze { .. } => "analyze",
            Commands::Extract { .. } => "extract",
            Commands::Init { .. } => "init",
            Commands::Version => "version",
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HarvestConfig> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file {} not found", path.display());
        }
    }
    Ok(config::load_config(path.map(PathBuf::as_path))?.unwrap_or_default())
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    match cli.command {
        Commands::Analyze { scan, rules, analyzer } => {
            let mut config = load_config(cli.config_file.as_ref())?;
            scan.apply(&mut config);
            if let Some(rules) = rules {
                config.rules = Some(rules);
            }
            if let Some(program) = analyzer {
                config.analyzer.program = program;
            }
            commands::run_analyze(config, output_mode)
        }
        Commands::Extract { scan } => {
            let mut config = load_config(cli.config_file.as_ref())?;
            scan.apply(&mut config);
            commands::run_extract(config, output_mode)
        }
        Commands::Init { force } => {
            let path = cli.config_file.unwrap_or_else(config::default_config_path);
            commands::run_init(&path, force, output_mode)
        }
        Commands::Version => commands::run_version(output_mode),
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = OutputMode::from_json_flag(cli.json);
    let command = cli.command.name();

    if let Err(err) = run(cli, output_mode) {
        let message = format!("{:#}", err);
        ui::error(&message);
        if let Err(emit_err) = emit_error(output_mode, command, &message) {
            tracing::error!("Failed to print error envelope: {}", emit_err);
        }
        std::process::exit(1);
    }
}
