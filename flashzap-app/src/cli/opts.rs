use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, ValueEnum)]
pub enum StoreKind {
    Json,
    Sqlite,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "flashzap", version, about = "FlashZap: AI-graded spaced repetition flashcards")]
pub struct Cli {
    /// Storage backend
    #[arg(long, value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite DB path when --store sqlite (defaults to app data dir)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Config file (defaults to the app config dir, if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Card operations
    #[command(subcommand)]
    Card(CardCmd),
    /// Import cards from a JSON file: [{"front": "...", "back": "..."}, ...]
    Import { path: PathBuf },
    /// Review due cards, graded by the AI grader
    Review(ReviewCmd),
    /// Launch Axum HTTP API
    Api(ApiCmd),
}

#[derive(Debug, Subcommand, Clone)]
pub enum CardCmd {
    Add {
        #[arg(long)]
        front: String,
        #[arg(long)]
        back: String,
    },
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = flashzap_core::DEFAULT_PER_PAGE)]
        per_page: usize,
    },
    Show { card_id: String },
    Edit(CardEdit),
    Rm { card_id: String },
}

#[derive(Debug, Args, Clone)]
pub struct CardEdit {
    pub card_id: String,
    #[arg(long)]
    pub front: Option<String>,
    #[arg(long)]
    pub back: Option<String>,
    /// Lower the mastery level (raising is refused)
    #[arg(long)]
    pub mastery: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    /// Keep the store's order instead of shuffling the deck
    #[arg(long)]
    pub no_shuffle: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ApiCmd {
    /// Bind address (host:port); overrides the config file
    #[arg(long)]
    pub addr: Option<String>,
}
