use crate::api::server as api_server;
use crate::cli::opts::*;
use crate::config::Settings;

use anyhow::{anyhow, Result};
use chrono::Utc;
use flashzap_core::{
    add_card, delete_card, edit_card, import_cards, list_page, Card, CardChanges, GradingOracle,
    PageRequest, Repository, ReviewError, ReviewOutcome, ReviewQueue,
};
use flashzap_grader::LlmGrader;
use flashzap_json::paths::data_root;
use flashzap_json::JsonStore;
use flashzap_sqlite::SqliteRepo;
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub async fn run_cli(args: Cli, settings: Settings) -> Result<()> {
    let repo = open_repo(&args.store, args.db_path.clone()).await?;
    match args.cmd {
        Command::Card(cmd) => card_cmd(repo, &settings, cmd).await,
        Command::Import { path } => import_cmd(repo, path).await,
        Command::Review(cmd) => review_cmd(repo, &settings, cmd).await,
        Command::Api(api) => {
            let addr_text = api.addr.unwrap_or_else(|| settings.api.addr.clone());
            let addr: std::net::SocketAddr = addr_text.parse()?;
            let oracle = grader(&settings)?;
            api_server::run(repo, oracle, &settings, addr).await
        }
    }
}

pub async fn open_repo(store: &StoreKind, db_path: Option<PathBuf>) -> Result<Arc<dyn Repository>> {
    match store {
        StoreKind::Json => {
            let s = JsonStore::open_default().await?;
            Ok(Arc::new(s))
        }
        StoreKind::Sqlite => {
            let p = db_path.unwrap_or_else(|| data_root().join("flashzap.sqlite3"));
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let s = SqliteRepo::open_file(&p).await?;
            Ok(Arc::new(s))
        }
    }
}

fn grader(settings: &Settings) -> Result<Arc<dyn GradingOracle>> {
    let g = LlmGrader::new(settings.grader.clone())?;
    if !g.is_available() {
        warn!("GEMINI_API_KEY is not set; grading will fail until it is");
    }
    Ok(Arc::new(g))
}

async fn card_cmd(repo: Arc<dyn Repository>, settings: &Settings, cmd: CardCmd) -> Result<()> {
    match cmd {
        CardCmd::Add { front, back } => {
            let c = add_card(&*repo, &front, &back).await?;
            println!("{}", c.id);
        }
        CardCmd::List { page, per_page } => {
            let p = list_page(&*repo, PageRequest { page, per_page }).await?;
            for c in &p.cards {
                println!("{}\t{}\t{}\tlevel={}\tdue={}", c.id, c.front, c.back, c.mastery_level, due_label(c));
            }
            println!("page {}/{} ({} cards)", p.page, p.total_pages.max(1), p.total);
        }
        CardCmd::Show { card_id } => {
            let c = repo.get_card(parse_uuid(&card_id)?).await?;
            println!("id:     {}", c.id);
            println!("front:  {}", c.front);
            println!("back:   {}", c.back);
            println!("level:  {}", c.mastery_level);
            println!("due:    {}", due_label(&c));
        }
        CardCmd::Edit(e) => {
            let id = parse_uuid(&e.card_id)?;
            let changes = CardChanges {
                front: e.front,
                back: e.back,
                mastery_level: e.mastery,
            };
            if changes.is_empty() {
                anyhow::bail!("nothing to edit: pass --front, --back or --mastery");
            }
            let today = Utc::now().date_naive();
            edit_card(&*repo, id, changes, &settings.srs, today).await?;
            println!("ok");
        }
        CardCmd::Rm { card_id } => {
            delete_card(&*repo, parse_uuid(&card_id)?).await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn import_cmd(repo: Arc<dyn Repository>, path: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&path).map_err(|e| anyhow!("cannot read {}: {e}", path.display()))?;
    let added = import_cards(&*repo, &text).await?;
    println!("Successfully imported {} cards.", added.len());
    Ok(())
}

async fn review_cmd(repo: Arc<dyn Repository>, settings: &Settings, cmd: ReviewCmd) -> Result<()> {
    let mut policy = settings.review_policy();
    if cmd.no_shuffle {
        policy.shuffle = false;
    }
    let today = Utc::now().date_naive();
    let mut queue = ReviewQueue::start(repo, grader(settings)?, policy, today).await?;

    if queue.is_drained() {
        println!("Great job! No cards are due for review.");
        return Ok(());
    }

    while let Some(card) = queue.peek_next().cloned() {
        println!("\n[{} left] {}", queue.remaining(), card.front);
        let Some(answer) = read_line("Your answer (or 'exit')> ")? else {
            break;
        };
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("exit") {
            break;
        }
        if answer.is_empty() {
            continue;
        }

        println!("Grading...");
        match queue.submit_answer(card.id, answer).await {
            Ok(out) => print_outcome(&out),
            Err(ReviewError::Oracle(e)) => {
                warn!(error = %e, card_id = %card.id, "grading failed");
                println!("Sorry, the AI grading service is currently unavailable.");
            }
            Err(e) => return Err(e.into()),
        }
        if read_line("Press Enter to continue...")?.is_none() {
            break;
        }
    }

    println!("Review session ended.");
    Ok(())
}

fn print_outcome(out: &ReviewOutcome) {
    println!("────── {} ──────", out.grade.as_str());
    println!("Feedback: {}", out.feedback);
    println!("Mastery level: {} → {}", out.old_level, out.new_level);
    if out.requeued {
        println!("This card will come back later in this session.");
    } else {
        println!("Next review: {}", out.next_review_date);
    }
}

// ===== Helpers =====
fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| anyhow!("invalid card id: {s}"))
}

fn due_label(c: &Card) -> String {
    c.next_review_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "new".to_string())
}

/// `None` on end of input.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    stdout().flush().ok();
    let mut s = String::new();
    if stdin().read_line(&mut s)? == 0 {
        return Ok(None);
    }
    Ok(Some(s))
}
