mod config;
mod logging;
mod notion;

use blocksync_sync::{Session, SyncConfig};
use clap::{Parser, Subcommand};
use config::API_KEY_ENV;
use notion::NotionTransport;
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Sync markdown files with Notion pages", long_about = None)]
struct Cli {
    /// Notion integration token
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Blocks per append request (at most 100)
    #[arg(long, global = true, default_value_t = blocksync_sync::MAX_BATCH_SIZE)]
    batch_size: usize,

    /// Pause between append requests, in milliseconds
    #[arg(long, global = true, default_value_t = 100)]
    throttle_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a page as a markdown file
    Pull {
        /// Page id or page URL
        page: String,
        /// Directory for the file (defaults to <tmp>/notion)
        #[arg(long, short)]
        output_dir: Option<PathBuf>,
    },
    /// Replace a page's content with a local markdown file
    Push {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Compare a local markdown file with its page
    Diff { file: PathBuf },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let session = session(&cli);

    match &cli.command {
        Commands::Pull { page, output_dir } => pull_command(&session, page, output_dir.as_deref()),
        Commands::Push { file, json } => push_command(&session, file, *json),
        Commands::Diff { file } => diff_command(&session, file),
    }
}

fn fail(err: impl Display) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

fn session(cli: &Cli) -> Session<NotionTransport> {
    let current_dir = env::current_dir().unwrap_or_else(|err| fail(err));
    let api_key =
        config::resolve_api_key(cli.api_key.as_deref(), &current_dir).unwrap_or_else(|err| fail(err));
    let config = SyncConfig {
        batch_size: cli.batch_size,
        throttle: Duration::from_millis(cli.throttle_ms),
        ..SyncConfig::default()
    };
    Session::with_config(NotionTransport::new(api_key), config)
}

fn pull_command(session: &Session<NotionTransport>, page: &str, output_dir: Option<&Path>) {
    let result = session.pull(page, output_dir).unwrap_or_else(|err| fail(err));
    println!(
        "Pulled \"{}\" to {}",
        result.document.title,
        result.path.display()
    );
}

fn push_command(session: &Session<NotionTransport>, file: &Path, json: bool) {
    let report = session.push(file).unwrap_or_else(|err| fail(err));
    if json {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|err| fail(err));
        println!("{output}");
        return;
    }
    println!("Pushed {}: {report}", file.display());
    for warning in &report.warnings {
        println!("  {warning}");
    }
}

fn diff_command(session: &Session<NotionTransport>, file: &Path) {
    let report = session.diff(file).unwrap_or_else(|err| fail(err));
    print!("{report}");
    if report.has_changes() {
        std::process::exit(2);
    }
    println!();
}
