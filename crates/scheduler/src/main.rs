use clap::Parser;
use msg_scheduler::clock::SystemClock;
use msg_scheduler::config::Config;
use msg_scheduler::logging::{DiagnosticFormat, LoggingConfig};
use msg_scheduler::store::Store;
use msg_scheduler::{http_server, tick};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Throttled, durable outbound message scheduler.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Opt {
    /// TOML config file to load.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the listen address from the config file.
    #[arg(long)]
    listen: Option<String>,

    /// Overrides the database URL from the config file (and $DATABASE_URL).
    #[arg(long)]
    database_url: Option<String>,

    /// How diagnostic logs render. full, compact and pretty are intended
    /// for human consumption.
    ///
    /// json outputs machine readable records.
    #[arg(long, default_value = "full")]
    diag_format: DiagnosticFormat,
}

fn main() -> anyhow::Result<()> {
    let opts = Opt::parse();

    LoggingConfig {
        format: opts.diag_format,
        filter_env_var: "MSG_SCHEDULER_LOG",
        default_filter: "msg_scheduler=info,tower_http=info",
    }
    .init()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(opts))
}

async fn run(opts: Opt) -> anyhow::Result<()> {
    let config = Config::load(opts.config.as_deref())?
        .apply_overrides(opts.listen, opts.database_url);

    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;
    tracing::info!(database_url = %redact(&config.database_url), "connected to store");

    let clock: Arc<dyn msg_scheduler::clock::Clock> = Arc::new(SystemClock);
    spawn_tick_loop(store.clone(), clock.clone(), config.tick_interval);

    let state = http_server::AppState {
        store,
        clock,
    };
    let router = http_server::make_router(state);

    let addr: SocketAddr = config.listen.parse()?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn spawn_tick_loop(store: Store, clock: Arc<dyn msg_scheduler::clock::Clock>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match tick::run_tick(&store, clock.as_ref()).await {
                Ok(outcome) => tracing::debug!(?outcome, "tick"),
                Err(err) => tracing::error!(error = %err, "tick failed"),
            }
        }
    });
}

fn redact(database_url: &str) -> String {
    match database_url.split_once('@') {
        Some((_, host_and_db)) => format!("postgres://***@{host_and_db}"),
        None => database_url.to_string(),
    }
}
