//! CLI entry point for `mailsweep`.

use std::time::Duration;

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};

use mailsweep::actions::{self, FilterOptions};
use mailsweep::client::HttpMailClient;
use mailsweep::rules::Predicate;
use mailsweep::store::MailStore;
use mailsweep::{config, ingest, rules};

#[derive(Parser)]
#[command(name = "mailsweep", version, about = "Pull a remote mailbox into local storage and apply rule-based bulk actions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new messages from a folder into the local store
    Fetch {
        /// Source folder to pull messages from
        #[arg(default_value = "inbox")]
        folder: String,
    },
    /// Apply the configured rules to a folder and act on the matches
    Filter {
        /// Folder whose messages are matched against the rules
        folder: String,

        /// Whether all rules must match or any single one suffices
        #[arg(short, long, value_enum)]
        predicate: Predicate,

        /// Move matching messages to this folder
        #[arg(short, long)]
        move_to: Option<String>,

        /// Remove the unread marker from matching messages
        #[arg(short = 'r', long)]
        mark_read: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Fetch { folder } => cmd_fetch(&config, &folder),
        Commands::Filter {
            folder,
            predicate,
            move_to,
            mark_read,
        } => cmd_filter(
            &config,
            FilterOptions {
                folder,
                predicate,
                move_to,
                mark_read,
            },
        ),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailsweep.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Fetch new messages into the local store and print a summary.
fn cmd_fetch(config: &config::Config, folder: &str) -> anyhow::Result<()> {
    let client = HttpMailClient::connect(config)?;
    let mut store = MailStore::open(&config::db_path(config), &config::attachments_dir(config))?;

    let summary = ingest::run_fetch(
        &client,
        &mut store,
        folder,
        Duration::from_secs(config.network.max_run_secs),
    )?;

    println!();
    println!("  {:<20} {}", "Folder", folder);
    println!("  {:<20} {}", "Listed", summary.listed);
    println!("  {:<20} {}", "Saved", summary.saved);
    println!("  {:<20} {}", "Already stored", summary.skipped);
    println!("  {:<20} {}", "Failed", summary.failed);
    if summary.stopped_early {
        println!("  (run time limit reached, remaining messages deferred)");
    }
    println!();

    Ok(())
}

/// Compile the rules, search the folder, and apply the requested actions.
fn cmd_filter(config: &config::Config, opts: FilterOptions) -> anyhow::Result<()> {
    let rules = rules::load_rules(&config::rules_path(config))?;
    let client = HttpMailClient::connect(config)?;

    let summary = actions::run_filter(&client, &opts, &rules, Utc::now())?;

    println!();
    println!("  {:<20} {}", "Query", summary.query);
    println!("  {:<20} {}", "Matched", summary.matched);
    println!(
        "  {:<20} {}",
        "Actions",
        if summary.modified {
            "applied"
        } else {
            "none"
        }
    );
    println!();

    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsweep", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
