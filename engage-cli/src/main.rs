use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engage_server::{
    clients::{build_generator, SlackClient, UnipileClient},
    config::Settings,
    db::{
        repositories::{PoolRepository, ReviewRepository, TargetRepository},
        Database,
    },
    pacing::Pacer,
    pipeline::{EnqueueReport, Pipeline, RunOptions},
    pool::{lookback_cutoff, PoolRefresher, RefreshReport},
    review::{ReviewMachine, ReviewOutcome},
    selection,
    sync::{SyncReport, TargetSync},
};
use engage_types::{Candidate, Disposition};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Engage batch runner
///
/// Finds recent posts from a saved people search, drafts a comment for a
/// fair sample of them and sends each draft to Slack for review.
#[derive(Parser, Debug)]
#[command(name = "engage")]
#[command(about = "Draft LinkedIn comments for human review", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override `settings.toml` and the environment
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Path to the SQLite database file
    #[arg(long, global = true, env = "DATABASE_PATH")]
    database: Option<String>,

    /// Record decisions without publishing anything
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Number of reviews to enqueue
    #[arg(long, global = true)]
    budget: Option<usize>,

    /// Stop the people search after this many records
    #[arg(long, global = true)]
    max_people: Option<usize>,

    /// Only consider posts from the last N days
    #[arg(long, global = true)]
    lookback_days: Option<i64>,

    /// Verbose logging; keeps posts without a usable timestamp
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync, refresh, select, draft and send reviews
    Run,
    /// Refresh the target registry from the saved search
    Sync,
    /// Pull recent posts for every resolved target
    Refresh,
    /// Print a fair sample of eligible posts without queueing them
    Select,
    /// Create or migrate the database schema
    InitDb,
    /// Row counts and the pending review queue
    Status,
    /// Apply a review decision by hand
    Decide {
        #[command(subcommand)]
        decision: Decision,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Decision {
    /// Publish the drafted comment
    Approve { social_id: String },
    /// Publish replacement text instead of the draft
    Edit { social_id: String, text: String },
    /// Drop the post without commenting
    Skip { social_id: String },
}

impl Overrides {
    fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.database {
            settings.database.path = path.clone();
        }
        if self.dry_run {
            settings.run.dry_run = true;
        }
        if let Some(budget) = self.budget {
            settings.run.budget = budget;
        }
        if let Some(max_people) = self.max_people {
            settings.unipile.max_people = max_people;
        }
        if let Some(days) = self.lookback_days {
            settings.run.lookback_days = days;
        }
        if self.debug {
            settings.run.debug = true;
        }
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug {
        "engage=debug,engage_server=debug"
    } else {
        "engage=info,engage_server=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(settings: &Settings) -> Result<Database> {
    let db = Database::new(&settings.database.path)
        .with_context(|| format!("Failed to open database {}", settings.database.path))?;
    db.initialize().context("Failed to initialize database schema")?;
    Ok(db)
}

fn print_sync(report: &SyncReport) {
    println!();
    println!("Target sync");
    println!("===========");
    println!("Pages fetched: {}", report.pages);
    println!("People seen: {}", report.people_seen);
    println!("Targets upserted: {}", report.upserted);
    println!("Resolved: {} ({} from cache)", report.resolved, report.cached);
    println!("Skipped records: {}", report.skipped);
    println!("Lookup failures: {}", report.lookup_failures);
}

fn print_refresh(report: &RefreshReport) {
    println!();
    println!("Pool refresh");
    println!("============");
    println!("Targets: {} ({} failed)", report.targets, report.failed_targets);
    println!("Posts seen: {}", report.posts_seen);
    println!("Posts upserted: {}", report.upserted);
    println!("Outside lookback window: {}", report.out_of_window);
    println!(
        "Unparsed timestamps: {} dropped, {} kept",
        report.unparsed_dropped, report.unparsed_kept
    );
    println!("Missing post id: {}", report.missing_id);
}

fn print_enqueue(report: &EnqueueReport) {
    println!();
    println!("Review queue");
    println!("============");
    println!("Selected: {}", report.selected);
    println!("Enqueued: {}", report.enqueued);
    println!("Already queued: {}", report.already_queued);
    println!("Generation failures: {}", report.generation_failures);
    println!("Notification failures: {}", report.notify_failures);
}

fn print_candidates(candidates: &[Candidate]) {
    println!();
    if candidates.is_empty() {
        println!("No eligible posts.");
        return;
    }
    println!("Selected {} post(s):", candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        let created = candidate
            .entry
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {}. {} [{}] {}",
            i + 1,
            candidate.author_name,
            created,
            candidate.entry.social_id
        );
        println!("     {}", preview(&candidate.entry.text, 100));
    }
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}...", flat.chars().take(max).collect::<String>())
    }
}

async fn run_batch(settings: &Settings, db: &Database) -> Result<()> {
    settings.ensure_batch_ready()?;

    let source = UnipileClient::new(&settings.unipile)?;
    let notifier = SlackClient::new(&settings.slack)?;
    let generator = build_generator(&settings.generation)?;
    let pipeline = Pipeline::new(
        db,
        Arc::new(source),
        generator,
        Arc::new(notifier),
        Pacer::new(settings.pacing.clone()),
    );

    let report = pipeline.run(&RunOptions::from_settings(settings)).await?;
    println!("Run {}", report.run_id);
    print_sync(&report.sync);
    print_refresh(&report.refresh);
    print_enqueue(&report.enqueue);
    Ok(())
}

async fn sync_targets(settings: &Settings, db: &Database) -> Result<()> {
    settings.ensure_source_ready()?;
    let source = UnipileClient::new(&settings.unipile)?;
    let targets = TargetRepository::new(db.pool.clone());
    let pacer = Pacer::new(settings.pacing.clone());

    let report = TargetSync::new(&source, &targets, &pacer)
        .run(&settings.unipile.search_url, settings.unipile.max_people)
        .await?;
    print_sync(&report);
    Ok(())
}

async fn refresh_pool(settings: &Settings, db: &Database) -> Result<()> {
    settings.ensure_source_ready()?;
    let source = UnipileClient::new(&settings.unipile)?;
    let targets = TargetRepository::new(db.pool.clone());
    let pool = PoolRepository::new(db.pool.clone());
    let pacer = Pacer::new(settings.pacing.clone());
    let options = RunOptions::from_settings(settings);

    let report = PoolRefresher::new(&source, &targets, &pool, &pacer)
        .run(&options.refresh_options(), Utc::now())
        .await?;
    print_refresh(&report);
    Ok(())
}

fn select_sample(settings: &Settings, db: &Database) -> Result<()> {
    let pool = PoolRepository::new(db.pool.clone());
    let cutoff = lookback_cutoff(Utc::now(), settings.run.lookback_days);
    let mut rng = rand::rng();
    let candidates = selection::select(&pool, cutoff, settings.run.budget, &mut rng)?;
    print_candidates(&candidates);
    Ok(())
}

fn show_status(db: &Database) -> Result<()> {
    let targets = TargetRepository::new(db.pool.clone());
    let pool = PoolRepository::new(db.pool.clone());
    let reviews = ReviewRepository::new(db.pool.clone());

    let all_targets = targets.list_all()?;
    let unresolved: Vec<_> = all_targets
        .iter()
        .filter(|t| t.resolved_identifier.is_none())
        .collect();
    println!(
        "Targets: {} ({} unresolved)",
        all_targets.len(),
        unresolved.len()
    );
    for target in &unresolved {
        println!("  unresolved: {} {}", target.display_name, target.canonical_url);
    }
    println!("Pool entries: {}", pool.count()?);
    println!("Comments posted: {}", reviews.count_comments()?);
    println!(
        "Handled: {} posted, {} skipped",
        reviews.count_handled(Disposition::Posted)?,
        reviews.count_handled(Disposition::Skipped)?
    );

    let pending = reviews.list_pending()?;
    println!("Pending reviews: {}", pending.len());
    for review in &pending {
        println!(
            "  {} [{}] {}",
            review.created_at.format("%Y-%m-%d %H:%M"),
            review.profile_name,
            review.social_id
        );
        println!("     {}", preview(&review.generated_text, 100));
    }
    Ok(())
}

async fn decide(settings: &Settings, db: &Database, decision: Decision) -> Result<()> {
    settings.ensure_server_ready()?;

    let machine = ReviewMachine::new(
        ReviewRepository::new(db.pool.clone()),
        Arc::new(UnipileClient::new(&settings.unipile)?),
        Arc::new(SlackClient::new(&settings.slack)?),
        Pacer::disabled(),
        settings.run.dry_run,
    );

    let (social_id, outcome) = match decision {
        Decision::Approve { social_id } => {
            let outcome = machine.approve(&social_id, None).await?;
            (social_id, outcome)
        }
        Decision::Edit { social_id, text } => {
            let outcome = machine.edit(&social_id, &text, None).await?;
            (social_id, outcome)
        }
        Decision::Skip { social_id } => {
            let outcome = machine.skip(&social_id, None).await?;
            (social_id, outcome)
        }
    };

    println!("{}: {}", social_id, outcome.label());
    match outcome {
        ReviewOutcome::PublishFailed(reason) => {
            anyhow::bail!("Publish failed, the review stays pending: {}", reason)
        }
        ReviewOutcome::EmptyEdit => anyhow::bail!("Replacement text is empty"),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.overrides.debug);

    let mut settings = Settings::new().context("Failed to load settings")?;
    cli.overrides.apply(&mut settings);
    if settings.run.dry_run {
        tracing::warn!("DRY RUN: nothing will be published");
    }

    let db = open_database(&settings)?;

    match cli.command {
        Command::Run => run_batch(&settings, &db).await,
        Command::Sync => sync_targets(&settings, &db).await,
        Command::Refresh => refresh_pool(&settings, &db).await,
        Command::Select => select_sample(&settings, &db),
        Command::InitDb => {
            println!("Database ready: {}", settings.database.path);
            Ok(())
        }
        Command::Status => show_status(&db),
        Command::Decide { decision } => decide(&settings, &db, decision).await,
    }
}
