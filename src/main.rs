//! ajum-index main entry point
//!
//! This is the command-line interface for indexing, caching and querying
//! the AJuM book-review database.

use ajum_index::config::{load_config_with_hash, validate, Config, Overrides};
use ajum_index::crawler::{Coordinator, SearchQuery, Shutdown};
use ajum_index::output;
use ajum_index::ReviewId;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// ajum-index: a polite client for the AJuM review database
///
/// Builds an ISBN index of all reviews, fetches and caches the review pages
/// and merges them into a local JSON database.
#[derive(Parser, Debug)]
#[command(name = "ajum-index")]
#[command(version)]
#[command(about = "Polite indexing and caching client for the AJuM review database", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Seconds to wait between two requests
    #[arg(long, global = true)]
    timer: Option<f64>,

    /// Contact address sent in the "From" header
    #[arg(long, global = true)]
    is_from: Option<String>,

    /// User agent sent with every request
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Index file
    #[arg(long, global = true)]
    index_file: Option<PathBuf>,

    /// Database file
    #[arg(long, global = true)]
    db_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Indexes all reviews per ISBN
    Index {
        /// Drop ISBNs with a bad checksum
        #[arg(long)]
        strict: bool,

        /// Number of concurrent workers
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Index file to write (defaults to --index-file)
        #[arg(value_name = "OUTFILE")]
        outfile: Option<PathBuf>,
    },

    /// Builds the local database from the index
    Build {
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Index file to read (defaults to --index-file)
        #[arg(value_name = "INDEX")]
        index: Option<PathBuf>,

        /// Database file to write (defaults to --db-file)
        #[arg(value_name = "DBFILE")]
        database: Option<PathBuf>,
    },

    /// Adds reviews missing from the local database
    Update {
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Backs up the remote database into a timestamped file
    Backup {
        /// Include archived reviews
        #[arg(long)]
        archived: bool,

        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Shows a single review
    Show {
        /// Review ID
        id: String,
    },

    /// Queries the remote database
    Query(QueryArgs),

    /// Removes all cached pages
    Clear,

    /// Shows statistics of the local files
    Stats,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Free-text search
    #[arg(long, default_value = "")]
    search_term: String,

    /// Keyword
    #[arg(long, default_value = "")]
    tag: String,

    #[arg(long, default_value = "")]
    title: String,

    /// Author first name
    #[arg(long, default_value = "")]
    first_name: String,

    /// Author last name
    #[arg(long, default_value = "")]
    last_name: String,

    #[arg(long, default_value = "")]
    illustrator: String,

    #[arg(long, default_value = "")]
    rating: String,

    /// Field of application
    #[arg(long, default_value = "")]
    application: String,

    #[arg(long, default_value = "")]
    media_type: String,

    /// Reading age, e.g. 8-9
    #[arg(long, default_value = "")]
    age: String,

    #[arg(long, default_value = "")]
    genre: String,

    /// Include archived reviews
    #[arg(long)]
    archived: bool,

    /// Only Heinrich-Wolgast prize laureates
    #[arg(long)]
    wolgast: bool,

    /// Only print the number of hits
    #[arg(long)]
    count: bool,

    #[arg(short, long)]
    jobs: Option<usize>,
}

impl From<QueryArgs> for SearchQuery {
    fn from(args: QueryArgs) -> Self {
        Self {
            search_term: args.search_term,
            tag: args.tag,
            title: args.title,
            first_name: args.first_name,
            last_name: args.last_name,
            illustrator: args.illustrator,
            rating: args.rating,
            application: args.application,
            media_type: args.media_type,
            age: args.age,
            genre: args.genre,
            archive: args.archived,
            wolgast: args.wolgast,
        }
    }
}

impl Command {
    fn jobs(&self) -> Option<usize> {
        match self {
            Self::Index { jobs, .. }
            | Self::Build { jobs, .. }
            | Self::Update { jobs }
            | Self::Backup { jobs, .. } => *jobs,
            Self::Query(args) => args.jobs,
            Self::Show { .. } | Self::Clear | Self::Stats => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(&cli)?;
    let shutdown = Shutdown::new();
    install_interrupt_handler(shutdown.clone());

    let coordinator = Coordinator::new(config, shutdown).context("Failed to set up client")?;
    let verbose = cli.verbose > 0;

    // Each handler reports whether the command produced anything useful
    let useful = match cli.command {
        Command::Index { strict, outfile, .. } => handle_index(&coordinator, strict, outfile).await?,
        Command::Build {
            index, database, ..
        } => handle_build(&coordinator, index, database, verbose).await?,
        Command::Update { .. } => handle_update(&coordinator, verbose).await?,
        Command::Backup { archived, .. } => handle_backup(&coordinator, archived, verbose).await?,
        Command::Show { id } => handle_show(&coordinator, id).await?,
        Command::Query(args) => {
            let count = args.count;
            handle_query(&coordinator, args.into(), count).await?
        }
        Command::Clear => handle_clear(&coordinator)?,
        Command::Stats => handle_stats(&coordinator)?,
    };

    Ok(if useful {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Loads the config file (if any) and applies the command line on top
fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    config.apply(Overrides {
        timer: cli.timer,
        from: cli.is_from.clone(),
        user_agent: cli.user_agent.clone(),
        cache_dir: cli.cache_dir.clone(),
        index_file: cli.index_file.clone(),
        db_file: cli.db_file.clone(),
        jobs: cli.command.jobs(),
    });
    validate(&config).context("Invalid configuration")?;

    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ajum_index=info,warn"),
            1 => EnvFilter::new("ajum_index=debug,info"),
            2 => EnvFilter::new("ajum_index=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Lets running units finish on ctrl-c; unstarted ones are skipped
fn install_interrupt_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing running requests");
            shutdown.trigger();
        }
    });
}

async fn handle_index(
    coordinator: &Coordinator,
    strict: bool,
    outfile: Option<PathBuf>,
) -> anyhow::Result<bool> {
    tracing::info!("Indexing reviews ({} mode)", if strict { "strict" } else { "lenient" });
    let summary = coordinator.index(strict, outfile.as_deref()).await?;
    output::print_index_summary(&summary);
    Ok(!summary.report.index.is_empty())
}

async fn handle_build(
    coordinator: &Coordinator,
    index: Option<PathBuf>,
    db_file: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<bool> {
    let report = coordinator
        .build(index.as_deref(), db_file.as_deref())
        .await?;
    output::print_build_summary(&report, verbose);
    Ok(!report.database.is_empty())
}

async fn handle_update(coordinator: &Coordinator, verbose: bool) -> anyhow::Result<bool> {
    let report = coordinator.update().await?;
    output::print_build_summary(&report, verbose);
    Ok(!report.database.is_empty())
}

async fn handle_backup(
    coordinator: &Coordinator,
    archived: bool,
    verbose: bool,
) -> anyhow::Result<bool> {
    let summary = coordinator.backup(archived).await?;
    output::print_backup_summary(&summary, verbose);
    Ok(summary.path.is_some())
}

async fn handle_show(coordinator: &Coordinator, id: String) -> anyhow::Result<bool> {
    let record = coordinator.show(&ReviewId::new(id)).await?;
    output::print_record(&record);
    Ok(true)
}

async fn handle_query(
    coordinator: &Coordinator,
    query: SearchQuery,
    count: bool,
) -> anyhow::Result<bool> {
    let result = coordinator.query(&query, count).await?;

    if count {
        println!("{}", result.hits);
        return Ok(true);
    }

    for record in &result.records {
        output::print_record(record);
    }
    println!(
        "{} hits, {} reviews fetched, {} failed",
        result.hits,
        result.records.len(),
        result.failures.len()
    );
    Ok(!result.records.is_empty())
}

fn handle_clear(coordinator: &Coordinator) -> anyhow::Result<bool> {
    let removed = coordinator.clear()?;
    println!(
        "Removed {} entries from {}",
        removed,
        coordinator.config().paths.cache_dir.display()
    );
    Ok(true)
}

fn handle_stats(coordinator: &Coordinator) -> anyhow::Result<bool> {
    let stats = coordinator.stats()?;
    output::print_statistics(&stats);
    Ok(true)
}
