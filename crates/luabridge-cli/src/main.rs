//! Luabridge command-line driver
//!
//! Runs Lua scripts inside a bridged state with a couple of host functions
//! registered, so failures crossing between Rust and Lua can be tried out
//! from the shell.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Filter used when neither `LUABRIDGE_LOG` nor `RUST_LOG` is set
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "luabridge")]
#[command(about = "Run Lua code through the luabridge protected-call layer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Lua file
    Run {
        /// Input file
        file: PathBuf,
        /// Do not open the Lua standard libraries
        #[arg(long)]
        bare: bool,
    },

    /// Evaluate an inline chunk and print its results
    Eval {
        /// Lua source
        code: String,
        /// Do not open the Lua standard libraries
        #[arg(long)]
        bare: bool,
    },
}

fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter_expr = std::env::var("LUABRIDGE_LOG")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok());

    let builder = fmt().with_writer(std::io::stderr);

    let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
        Some(filter) => builder.with_env_filter(filter),
        None => builder.with_env_filter(DEFAULT_LOG_FILTER),
    };

    let _ = builder.try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, bare } => commands::run::execute(&file, bare),
        Commands::Eval { code, bare } => commands::eval::execute(&code, bare),
    }
}
