//! menusync - prints canteen menus and info pages, served from the local
//! cache and refreshed from the canteen API in the background.

mod args;
mod render;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{future, StreamExt};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use menusync_core::api::{ApiClient, InfoSource, MenuSource, RemoteSource};
use menusync_core::store::{CacheKey, JsonFileStore};
use menusync_core::{Config, Outcome, Repository, Snapshot, Subscription, SyncState};

use args::{Args, Command};

/// Log file name inside the cache directory (rotated daily)
const LOG_FILE: &str = "menusync.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to a daily log file when `log_dir`
/// is given. The returned guard must live until exit to flush the file.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", args::USAGE);
        return Ok(());
    }

    let mut config = Config::load()?.with_env_overrides()?;
    if let Some(outlet) = args.outlet {
        config.outlet_id = outlet;
    }
    if let Some(language) = args.language {
        config.language = language;
    }
    if args.save_config {
        config.save()?;
    }

    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)?;
    let _log_guard = init_tracing(args.log_file.then_some(cache_dir.as_path()));
    info!(api = %config.api_base_url, outlet = config.outlet_id, language = %config.language, "menusync starting");

    let client = ApiClient::new(&config.api_base_url)?;
    let freshness = Arc::new(config.freshness());

    match args.command {
        Command::Menu => {
            let store = JsonFileStore::with_freshness(cache_dir.join("menus"), freshness)?;
            let repo = Repository::new("menu", MenuSource::new(client), store);
            run(&repo, config.menu_params(), &args, &config, render::print_menu).await?;
        }
        Command::Info => {
            let store = JsonFileStore::with_freshness(cache_dir.join("info"), freshness)?;
            let repo = Repository::new("info", InfoSource::new(client), store);
            run(&repo, config.info_params(), &args, &config, render::print_info).await?;
        }
    }

    info!("menusync shutting down");
    Ok(())
}

type FileRepository<P, Src> = Repository<P, Src, JsonFileStore<P, <Src as RemoteSource<P>>::Value>>;

/// Show the live view of `params` until it settles, or keep refreshing it
/// on the freshness interval in watch mode.
async fn run<P, Src>(
    repo: &FileRepository<P, Src>,
    params: P,
    args: &Args,
    config: &Config,
    print: fn(&Src::Value),
) -> Result<()>
where
    P: CacheKey + Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
    Src: RemoteSource<P>,
    Src::Value: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
{
    let view = if args.refresh {
        repo.refresh(params.clone()).await
    } else {
        repo.observe(params.clone()).await
    };
    let mut updates = Some(view.subscribe());

    let period = Duration::from_secs(config.stale_minutes.max(1) as u64 * 60);
    let mut ticker = tokio::time::interval(period);
    // First tick completes immediately
    ticker.tick().await;

    let mut announced = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick(), if args.watch => {
                info!("Scheduled refresh");
                updates = Some(repo.refresh(params.clone()).await.subscribe());
            }
            next = next_update(&mut updates) => match next {
                Some(Ok(snapshot)) => {
                    if snapshot.is_syncing() {
                        if !announced {
                            eprintln!("Refreshing...");
                            announced = true;
                        }
                        continue;
                    }
                    announced = false;
                    let age = repo.orchestrator().store().age_display(&params).await;
                    show(&snapshot, age, print);
                    if !args.watch {
                        break;
                    }
                }
                Some(Err(e)) => {
                    repo.close().await;
                    return Err(e.into());
                }
                None => {
                    if !args.watch {
                        break;
                    }
                    warn!("Live view ended, waiting for next refresh");
                    updates = None;
                }
            }
        }
    }

    repo.close().await;
    Ok(())
}

/// Next item of the live view; pends forever while there is none.
async fn next_update<T>(updates: &mut Option<Subscription<T>>) -> Option<Outcome<T>> {
    match updates {
        Some(sub) => sub.next().await,
        None => future::pending().await,
    }
}

fn show<T>(snapshot: &Snapshot<T>, age: Option<String>, print: fn(&T)) {
    match &snapshot.data {
        Some(data) => print(data),
        None => println!("No data saved yet."),
    }

    let status = match &snapshot.sync {
        SyncState::Done(result) => {
            if result.needs_attention() {
                warn!(result = %result, "Refresh did not complete cleanly");
            }
            result.describe()
        }
        SyncState::Failed(e) => format!("Refresh failed: {}", e),
        SyncState::Running => "Refreshing...".to_string(),
    };
    match age {
        Some(age) => eprintln!("{} (saved {})", status, age),
        None => eprintln!("{}", status),
    }
}
