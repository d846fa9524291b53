//! girscan command-line tool
//!
//! Turns front-end scan units into GIR, re-writes existing GIR files and
//! checks documentation comments.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::scan::ScanArgs;
use output::{resolve_color_choice, DiagnosticFormat, Reporter};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "girscan")]
#[command(about = "GObject introspection scanner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log pipeline progress (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to color diagnostics: auto, always, never
    #[arg(long, global = true, value_name = "WHEN")]
    color: Option<String>,

    /// Diagnostic output format
    #[arg(long, global = true, value_enum, default_value_t = DiagnosticFormat::Human)]
    diagnostics_format: DiagnosticFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan units into a GIR document
    Scan(ScanArgs),

    /// Read a GIR file and write it back out
    Passthrough {
        /// GIR file to read
        gir: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the documentation comments of a scan unit
    DocCheck {
        /// Scan unit (JSON)
        unit: PathBuf,
        /// Print every parsed block in canonical form
        #[arg(long)]
        rewrite: bool,
        /// Warning names or codes to silence
        #[arg(long, value_name = "WARNING")]
        disable: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let reporter = Reporter::new(
        cli.diagnostics_format,
        resolve_color_choice(cli.color.as_deref()),
    );

    match cli.command {
        Commands::Scan(args) => commands::scan::execute(args, &reporter),
        Commands::Passthrough { gir, output } => commands::passthrough::execute(gir, output),
        Commands::DocCheck {
            unit,
            rewrite,
            disable,
        } => commands::doc_check::execute(unit, rewrite, disable, &reporter),
    }
}
