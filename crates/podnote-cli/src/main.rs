mod cmd_backup;
mod cmd_config;
mod cmd_gc;
mod cmd_history;
mod cmd_last_played;
mod cmd_note;
mod cmd_status;

use anyhow::Context;
use clap::{Parser, Subcommand};
use podnote_store::{FileBackend, PodStore, StorePaths};
use std::path::{Path, PathBuf};

/// Log filter variable, e.g. `PODNOTE_LOG=podnote_store=debug`.
const LOG_ENV: &str = "PODNOTE_LOG";

#[derive(Parser)]
#[command(name = "podnote", version, about = "Podcast listening history, notes and backups")]
struct Cli {
    /// Data directory (defaults to $PODNOTE_HOME, then the per-user data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listening history
    History {
        #[command(subcommand)]
        cmd: HistoryCmd,
    },
    /// Per-episode notes
    Note {
        #[command(subcommand)]
        cmd: NoteCmd,
    },
    /// Resume pointer
    LastPlayed {
        #[command(subcommand)]
        cmd: LastPlayedCmd,
    },
    /// Export, inspect and restore backups
    Backup {
        #[command(subcommand)]
        cmd: BackupCmd,
    },
    /// Evict expired history and orphaned cache entries
    Gc {
        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Show storage usage and collection counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage config.json
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum HistoryCmd {
    /// List history, most recently played first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an episode or move it to the top
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        /// Show (podcast) name
        #[arg(long)]
        show: String,
        #[arg(long)]
        duration_ms: Option<u64>,
        /// Cover image URL
        #[arg(long)]
        cover: Option<String>,
    },
    /// Apply a JSON patch, e.g. '{"lastPositionMs": 60000}'
    Update {
        id: String,
        #[arg(long)]
        patch: String,
    },
    /// Remove one episode (its notes are kept)
    Delete { id: String },
    /// Remove every history entry
    Clear,
}

#[derive(Subcommand)]
enum NoteCmd {
    /// Add a note to an episode
    Add {
        episode: String,
        #[arg(long)]
        text: String,
        /// Quoted transcript text
        #[arg(long)]
        quote: Option<String>,
        /// Playback position in milliseconds
        #[arg(long, default_value_t = 0)]
        at_ms: u64,
        /// thought, question, action or quote
        #[arg(long)]
        category: Option<String>,
        /// Tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List an episode's notes
    List {
        episode: String,
        #[arg(long)]
        category: Option<String>,
        /// Match any of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Case-insensitive text search
        #[arg(long)]
        search: Option<String>,
        /// created, updated or timestamp
        #[arg(long, default_value = "created")]
        sort: String,
        /// Oldest first
        #[arg(long)]
        asc: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply a JSON patch to one note
    Edit {
        episode: String,
        note_id: String,
        #[arg(long)]
        patch: String,
    },
    /// Delete one note
    Delete { episode: String, note_id: String },
    /// Totals across all episodes
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LastPlayedCmd {
    /// Show the resume pointer
    Show,
    /// Set the resume pointer
    Set { episode: String, offset_ms: u64 },
    /// Clear the resume pointer
    Clear,
}

#[derive(Subcommand)]
enum BackupCmd {
    /// Write a snapshot of all collections
    Export {
        /// Output file (defaults to a timestamped name in the current dir)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print to stdout instead of writing a file
        #[arg(long, conflicts_with = "out")]
        stdout: bool,
    },
    /// Summarize a backup file without restoring it
    Info { file: PathBuf },
    /// Restore from a backup file
    Restore {
        file: PathBuf,
        /// Restore without the preview step
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. retention_days)
        key: String,
        /// Config value (number)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(root: &Path) -> anyhow::Result<PodStore<FileBackend>> {
    podnote_store::open(StorePaths::discover(root))
        .with_context(|| format!("cannot open store at {}", root.display()))
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let root = cli.data_dir.unwrap_or_else(StorePaths::default_root);
    tracing::debug!(root = %root.display(), "data dir");

    match cli.cmd {
        Command::History { cmd } => {
            let mut store = open_store(&root)?;
            match cmd {
                HistoryCmd::List { json } => cmd_history::list(&mut store, json),
                HistoryCmd::Add {
                    id,
                    title,
                    show,
                    duration_ms,
                    cover,
                } => cmd_history::add(&mut store, &id, &title, &show, duration_ms, cover),
                HistoryCmd::Update { id, patch } => cmd_history::update(&mut store, &id, &patch),
                HistoryCmd::Delete { id } => cmd_history::delete(&mut store, &id),
                HistoryCmd::Clear => cmd_history::clear(&mut store),
            }
        }
        Command::Note { cmd } => {
            let mut store = open_store(&root)?;
            match cmd {
                NoteCmd::Add {
                    episode,
                    text,
                    quote,
                    at_ms,
                    category,
                    tags,
                } => cmd_note::add(
                    &mut store,
                    &episode,
                    cmd_note::AddArgs {
                        text,
                        quote,
                        at_ms,
                        category: category.as_deref(),
                        tags,
                    },
                ),
                NoteCmd::List {
                    episode,
                    category,
                    tags,
                    search,
                    sort,
                    asc,
                    json,
                } => {
                    let filter =
                        cmd_note::build_filter(category.as_deref(), tags, search, &sort, asc)?;
                    cmd_note::list(&mut store, &episode, &filter, json)
                }
                NoteCmd::Edit {
                    episode,
                    note_id,
                    patch,
                } => cmd_note::edit(&mut store, &episode, &note_id, &patch),
                NoteCmd::Delete { episode, note_id } => {
                    cmd_note::delete(&mut store, &episode, &note_id)
                }
                NoteCmd::Stats { json } => cmd_note::stats(&mut store, json),
            }
        }
        Command::LastPlayed { cmd } => {
            let mut store = open_store(&root)?;
            match cmd {
                LastPlayedCmd::Show => cmd_last_played::show(&mut store),
                LastPlayedCmd::Set { episode, offset_ms } => {
                    cmd_last_played::set(&mut store, &episode, offset_ms)
                }
                LastPlayedCmd::Clear => cmd_last_played::clear(&mut store),
            }
        }
        Command::Backup { cmd } => match cmd {
            BackupCmd::Export { out, stdout } => {
                let mut store = open_store(&root)?;
                cmd_backup::export(&mut store, out.as_deref(), stdout)
            }
            BackupCmd::Info { file } => cmd_backup::info(&file),
            BackupCmd::Restore { file, force } => {
                let mut store = open_store(&root)?;
                cmd_backup::restore(&mut store, &file, force)
            }
        },
        Command::Gc { dry_run } => {
            let mut store = open_store(&root)?;
            cmd_gc::execute(&mut store, dry_run)
        }
        Command::Status { json } => {
            let mut store = open_store(&root)?;
            cmd_status::execute(&mut store, &root, json)
        }
        Command::Config { cmd } => {
            let paths = StorePaths::discover(&root);
            match cmd {
                ConfigCmd::Set { key, value } => cmd_config::set(&paths, &key, &value),
                ConfigCmd::Get { key } => cmd_config::get(&paths, &key),
                ConfigCmd::List => cmd_config::list(&paths),
            }
        }
    }
}
