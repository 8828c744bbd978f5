use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use wakmeter_cli::{commands, readline};
use wakmeter_core::{AppConfig, LogFileRole, ResetScope, Tracker};

#[tokio::main]
async fn main() -> Result<(), String> {
    let _log_guard = init_logging();

    let config = AppConfig::load();
    let tracker = Arc::new(Tracker::start(config).await);
    commands::print_startup(&tracker).await;
    let signal_task = tokio::spawn(commands::print_signals(tracker.subscribe()));

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &tracker).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    tracker.shutdown().await;
    signal_task.abort();
    Ok(())
}

/// Log to a daily file under `WAKMETER_LOG_DIR` when set, stderr otherwise.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if let Ok(dir) = std::env::var("WAKMETER_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(dir, "wakmeter.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .init();
        return Some(guard);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    None
}

#[derive(Parser)]
#[command(version, about = "wakmeter session tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResetArg {
    Ledger,
    Roster,
    Full,
}

impl From<ResetArg> for ResetScope {
    fn from(arg: ResetArg) -> Self {
        match arg {
            ResetArg::Ledger => ResetScope::Ledger,
            ResetArg::Roster => ResetScope::Roster,
            ResetArg::Full => ResetScope::Full,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start tailing another log file
    Watch {
        #[arg(short, long)]
        path: PathBuf,
        #[arg(short, long, default_value = "game")]
        role: LogFileRole,
    },
    Unwatch {
        #[arg(short, long)]
        path: PathBuf,
    },
    /// Read new lines now instead of waiting for the timer
    Reread {
        #[arg(short, long)]
        path: PathBuf,
    },
    Roster {
        /// Include hidden characters
        #[arg(short, long)]
        all: bool,
    },
    SetMain {
        #[arg(short, long)]
        name: String,
    },
    Add {
        #[arg(short, long)]
        name: String,
    },
    Remove {
        #[arg(short, long)]
        name: String,
    },
    Hide {
        #[arg(short, long)]
        name: String,
    },
    Show {
        #[arg(short, long)]
        name: String,
    },
    /// Mark a character as one of your own
    Mine {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        remove: bool,
    },
    Loot,
    Fav {
        #[arg(short, long)]
        character: String,
        #[arg(short, long)]
        item: String,
    },
    DeleteLoot {
        #[arg(short, long)]
        character: String,
        #[arg(short, long)]
        item: String,
        /// Remove only this many instead of the whole entry
        #[arg(short, long)]
        quantity: Option<u64>,
    },
    Sales,
    Xp,
    Reset {
        #[arg(value_enum)]
        scope: ResetArg,
    },
    Stats,
    Config,
    /// Store a new log directory, used from the next start
    SetDirectory {
        #[arg(short, long)]
        path: String,
    },
    Exit,
}

async fn respond(line: &str, tracker: &Tracker) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "wakmeter".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match cli.command {
        Some(Commands::Watch { path, role }) => commands::watch(tracker, path, role).await,
        Some(Commands::Unwatch { path }) => commands::unwatch(tracker, &path).await,
        Some(Commands::Reread { path }) => commands::reread(tracker, &path).await,
        Some(Commands::Roster { all }) => commands::show_roster(tracker, all),
        Some(Commands::SetMain { name }) => commands::set_main(tracker, &name),
        Some(Commands::Add { name }) => commands::add_character(tracker, &name),
        Some(Commands::Remove { name }) => commands::remove_character(tracker, &name),
        Some(Commands::Hide { name }) => commands::set_visibility(tracker, &name, false),
        Some(Commands::Show { name }) => commands::set_visibility(tracker, &name, true),
        Some(Commands::Mine { name, remove }) => commands::my_character(tracker, &name, remove),
        Some(Commands::Loot) => commands::show_loot(tracker),
        Some(Commands::Fav { character, item }) => {
            commands::toggle_favorite(tracker, &character, &item)
        }
        Some(Commands::DeleteLoot {
            character,
            item,
            quantity,
        }) => commands::delete_loot(tracker, &character, &item, quantity),
        Some(Commands::Sales) => commands::show_sales(tracker),
        Some(Commands::Xp) => commands::show_xp(tracker),
        Some(Commands::Reset { scope }) => commands::reset(tracker, scope.into()).await,
        Some(Commands::Stats) => commands::show_stats(tracker).await,
        Some(Commands::Config) => commands::show_config(tracker),
        Some(Commands::SetDirectory { path }) => commands::set_directory(tracker, path),
        Some(Commands::Exit) => {
            commands::exit();
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
