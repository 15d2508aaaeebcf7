mod commands;
mod console;
mod fixtures;
mod tui;
mod ui;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::ListArgs;
use console::Setup;

const LOG_FILE: &str = "nbconsole.log";

#[derive(Parser)]
#[command(name = "nbconsole")]
#[command(about = "Manage notebook development instances", long_about = None)]
struct Cli {
    /// Config file; otherwise NBCONSOLE_CONFIG or nbconsole.yml is searched for
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console (default)
    Tui,
    /// Print instances matching a filter
    List {
        /// Substring of id or name
        #[arg(short, long)]
        search: Option<String>,
        /// Substring of any key=value tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Project id, or "all"
        #[arg(short, long)]
        project: Option<String>,
        /// First creation day, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last creation day, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(short, long)]
        ignore_case: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print the detail-view deep link for an instance
    Link { id: String },
    /// Scripted lifecycle walkthrough
    Demo,
    /// Generate a TUI panel module
    Scaffold {
        name: String,
        /// Output directory (defaults to the current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(short, long)]
        force: bool,
    },
}

/// Log to stderr, or to a file while the TUI owns the terminal.
fn init_logging(tui: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if !tui {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
        return;
    }
    match File::create(LOG_FILE) {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}

fn exit_on_err(result: Result<(), String>) -> io::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let tui = matches!(cli.command, None | Some(Commands::Tui));
    init_logging(tui);

    // Scaffolding needs no listing
    if let Some(Commands::Scaffold { name, out, force }) = &cli.command {
        return exit_on_err(commands::run_scaffold(name, out.clone(), *force));
    }

    let setup = match Setup::load(cli.config.as_deref()) {
        Ok(setup) => setup,
        Err(e) => return exit_on_err(Err(e)),
    };

    match cli.command {
        Some(Commands::List {
            search,
            tag,
            project,
            from,
            to,
            ignore_case,
            json,
        }) => {
            let args = ListArgs {
                search,
                tag,
                project,
                from,
                to,
                ignore_case,
                json,
            };
            exit_on_err(commands::run_list(&setup, args).await)
        }
        Some(Commands::Link { id }) => exit_on_err(commands::run_link(&setup, &id).await),
        Some(Commands::Demo) => exit_on_err(commands::run_demo(&setup).await),
        Some(Commands::Scaffold { .. }) => Ok(()),
        Some(Commands::Tui) | None => tui::run_tui(&setup).await,
    }
}
