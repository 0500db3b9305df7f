use archivist::artifact_store::ArtifactStore;
use archivist::capture::render::NullRenderer;
use archivist::change_detector::{self, Verdict};
use archivist::{catalog, config, csv_import, db, diff, scheduler};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "archivist", about = "Captures and diffs a curated set of public websites")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Scheduler indefinitely.
    Server,
    /// Capture a single site by domain, outside the regular schedule.
    Crawl {
        #[arg(long)]
        domain: String,
    },
    /// Force generation of a Diff between two specific Snapshots.
    Diff {
        #[arg(long = "site-id")]
        site_id: i32,
        #[arg(long)]
        snapshot1: i32,
        #[arg(long)]
        snapshot2: i32,
    },
    /// Ingest Sites from a CISA-format CSV inventory.
    Import {
        #[arg(long)]
        file: PathBuf,
        #[arg(long = "priority-file")]
        priority_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let config = config::get();
    init_tracing(config.log_filter.as_deref());

    if let Err(err) = catalog::initialize() {
        tracing::error!("could not initialize catalog: {err}");
        std::process::exit(1);
    }

    let cli = Cli::parse();
    let store = Arc::new(ArtifactStore::new(config.data_dir.clone()));

    let result = match cli.command {
        Command::Server => run_server(config, store).await,
        Command::Crawl { domain } => run_crawl(config, &store, &domain).await,
        Command::Diff { site_id, snapshot1, snapshot2 } => run_diff(config, &store, site_id, snapshot1, snapshot2),
        Command::Import { file, priority_file } => run_import(&file, priority_file.as_deref()),
    };

    if let Err(err) = result {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

async fn run_server(config: &config::Config, store: Arc<ArtifactStore>) -> Result<(), String> {
    tracing::info!(
        "archivist scheduler running on {} threads",
        tokio::runtime::Handle::current().metrics().num_workers()
    );

    let renderer = Arc::new(NullRenderer);
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received shutdown signal"),
            Err(err) => tracing::error!("unable to listen for shutdown signal: {err}"),
        }
    };

    scheduler::run(Arc::new(config.clone()), store, renderer, shutdown).await;
    Ok(())
}

async fn run_crawl(config: &config::Config, store: &ArtifactStore, domain: &str) -> Result<(), String> {
    let mut conn = db::get_connection().map_err(|err| err.to_string())?;
    let site = catalog::find_site_by_domain(&mut conn, domain)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("unknown site {domain}"))?;

    let renderer = NullRenderer;
    let snapshot = archivist::capture::capture_site(&mut conn, store, config, &renderer, &site)
        .await
        .map_err(|err| err.to_string())?;
    tracing::info!(snapshot_id = snapshot.id, "capture complete");

    if snapshot.is_degraded() {
        return Ok(());
    }

    // A manually triggered crawl runs outside the Scheduler's loop, so there's no later tick to
    // drain a diff QueueEntry for it; generate the diff inline instead, same as the `diff`
    // subcommand does for an explicit snapshot pair.
    if let Verdict::Changed { previous } = change_detector::detect(&mut conn, &snapshot).map_err(|err| err.to_string())? {
        let result = diff::process(&mut conn, store, config, &previous, &snapshot).map_err(|err| err.to_string())?;
        tracing::info!(diff_id = result.id, significance = ?result.significance, "change detected, diff generated");
    }
    Ok(())
}

fn run_diff(config: &config::Config, store: &ArtifactStore, site_id: i32, snapshot1: i32, snapshot2: i32) -> Result<(), String> {
    let mut conn = db::get_connection().map_err(|err| err.to_string())?;
    let old = catalog::find_snapshot(&mut conn, snapshot1).map_err(|err| err.to_string())?;
    let new = catalog::find_snapshot(&mut conn, snapshot2).map_err(|err| err.to_string())?;
    if old.site_id != site_id || new.site_id != site_id {
        return Err(format!("snapshots {snapshot1} and {snapshot2} do not both belong to site {site_id}"));
    }

    let result = diff::process(&mut conn, store, config, &old, &new).map_err(|err| err.to_string())?;
    tracing::info!(diff_id = result.id, significance = ?result.significance, "diff complete");
    Ok(())
}

fn run_import(file: &std::path::Path, priority_file: Option<&std::path::Path>) -> Result<(), String> {
    let mut conn = db::get_connection().map_err(|err| err.to_string())?;
    let imported = csv_import::import(&mut conn, file, priority_file).map_err(|err| err.to_string())?;
    tracing::info!(imported, "site import complete");
    Ok(())
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter.map(String::from).unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"))).init();
}
