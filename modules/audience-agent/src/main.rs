use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use audience_ledger::{
    analyze, ApifyFetcher, AudienceReport, BatchStore, Credentials, FileConfig, LedgerStore,
    PathsConfig, Priority, ProspectFile, ScrapeConfig, ScrapeOrchestrator, ScrapeType,
    TargetQueue,
};

#[derive(Parser)]
#[command(name = "audience")]
#[command(
    about = "Scrape follower lists, reconcile them against the audience tracker, and recommend follows"
)]
#[command(version)]
struct Cli {
    /// Directory holding the tracker, seed and data files
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    /// TOML config file (relative paths resolve against --dir)
    #[arg(short, long, global = true, default_value = "audience.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape followers/following of one account
    Scrape {
        username: String,

        #[arg(long = "type", default_value = "followers")]
        scrape_type: ScrapeType,

        /// Defaults to scrape.single_max_pages
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Scrape followers of every pending target account
    ScrapeAll {
        /// Defaults to scrape.max_pages
        #[arg(long)]
        max_pages: Option<u32>,

        /// Only scrape P1 or P2 targets
        #[arg(long)]
        priority: Option<Priority>,
    },

    /// Reconcile scraped batches against the tracker and write prospects
    Analyze {
        /// Also add new prospects to the tracker
        #[arg(long)]
        merge: bool,
    },

    /// Show the audience health dashboard
    Report,

    /// Show target accounts still to scrape
    Targets,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("audience=info".parse()?)
                .add_directive("apify_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.dir.join(&cli.config);
    let config = FileConfig::load(&config_path)?;
    let paths = config.paths.resolve(&cli.dir);

    match cli.command {
        Commands::Scrape {
            username,
            scrape_type,
            max_pages,
        } => {
            let max_pages = max_pages.unwrap_or(config.scrape.single_max_pages);
            cmd_scrape(&config, &paths, &username, scrape_type, max_pages).await
        }
        Commands::ScrapeAll {
            max_pages,
            priority,
        } => {
            let max_pages = max_pages.unwrap_or(config.scrape.max_pages);
            cmd_scrape_all(&config, &paths, max_pages, priority).await
        }
        Commands::Analyze { merge } => cmd_analyze(&config, &paths, merge),
        Commands::Report => cmd_report(&paths),
        Commands::Targets => cmd_targets(&paths),
    }
}

fn build_orchestrator(
    config: &FileConfig,
    paths: &PathsConfig,
    max_pages: u32,
) -> Result<ScrapeOrchestrator<ApifyFetcher>> {
    let credentials = Credentials::from_env(&paths.cookies)?;
    let fetcher = ApifyFetcher::new(&credentials, config.scrape.poll_settings());
    Ok(ScrapeOrchestrator::new(
        fetcher,
        TargetQueue::load(&paths.targets),
        BatchStore::new(&paths.data_dir),
        config.classifier(),
        ScrapeConfig {
            pacing: config.scrape.pacing(),
            max_pages,
            scrape_type: ScrapeType::Followers,
        },
    ))
}

async fn cmd_scrape(
    config: &FileConfig,
    paths: &PathsConfig,
    username: &str,
    scrape_type: ScrapeType,
    max_pages: u32,
) -> Result<()> {
    let orchestrator = build_orchestrator(config, paths, max_pages)?;
    println!("Starting scrape: @{username} ({scrape_type}, max {max_pages} pages)...");

    match orchestrator.scrape_one(username, scrape_type, max_pages).await {
        Ok(outcome) => println!("{outcome}"),
        Err(e) => {
            warn!(username, error = %e, "Scrape failed");
            println!("ERROR: {e}");
        }
    }
    Ok(())
}

async fn cmd_scrape_all(
    config: &FileConfig,
    paths: &PathsConfig,
    max_pages: u32,
    priority: Option<Priority>,
) -> Result<()> {
    let mut orchestrator = build_orchestrator(config, paths, max_pages)?;
    let cancel = orchestrator.cancel_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping; the current target stays pending");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let stats = orchestrator
        .run(priority)
        .await
        .context("Failed to persist target queue")?;
    println!("{stats}");
    println!("\nRun 'audience analyze' to process results.");
    Ok(())
}

fn cmd_analyze(config: &FileConfig, paths: &PathsConfig, merge: bool) -> Result<()> {
    let store = BatchStore::new(&paths.data_dir);
    let ledger_store = LedgerStore::new(&paths.ledger);
    let prospect_file = ProspectFile::new(&paths.prospects);

    match analyze(&store, &ledger_store, &prospect_file, &config.classifier(), merge)? {
        Some(summary) => {
            println!("{summary}");
            println!("\nSaved: {}", prospect_file.path().display());
        }
        None => println!(
            "No scraped data found in {}. Run 'scrape' first.",
            paths.data_dir.display()
        ),
    }
    Ok(())
}

fn cmd_report(paths: &PathsConfig) -> Result<()> {
    let ledger_store = LedgerStore::new(&paths.ledger);
    if !ledger_store.path().exists() {
        println!("No tracker found at {}.", ledger_store.path().display());
        return Ok(());
    }
    let ledger = ledger_store.load()?;

    let prospect_file = ProspectFile::new(&paths.prospects);
    let prospects = if prospect_file.path().exists() {
        Some(prospect_file.load()?)
    } else {
        None
    };

    let report = AudienceReport::build(&ledger, prospects.as_deref(), chrono::Local::now());
    println!("{report}");
    Ok(())
}

fn cmd_targets(paths: &PathsConfig) -> Result<()> {
    let queue = TargetQueue::load(&paths.targets);
    if queue.is_fallback() {
        info!(path = %queue.path().display(), "Showing built-in targets");
    }

    let p1 = queue.next_batch(Some(Priority::P1));
    let p2 = queue.pending(Priority::P2);

    println!("\n=== ICP TARGET ACCOUNTS ===");
    println!("P1 (scrape first): {}", p1.len());
    println!("P2:                {}", p2);
    println!("Total not yet scraped: {}", p1.len() + p2);

    println!("\n--- P1 PRIORITY ---");
    for (i, target) in p1.iter().enumerate() {
        println!("  {}. @{}", i + 1, target.username);
    }

    println!("\nTo scrape one:    audience scrape <username>");
    println!("To scrape all P1: audience scrape-all --priority P1");
    println!("To scrape all:    audience scrape-all");
    Ok(())
}
