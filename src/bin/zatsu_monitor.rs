use std::env;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use zatsu_monitor::config::{DEFAULT_CONFIG_PATH, MonitorTarget, load_monitor_config};
use zatsu_monitor::monitor::{HttpProber, StatusMonitor};
use zatsu_monitor::notifications::service::{HttpNotifierFactory, target_readiness};
use zatsu_monitor::store::{PgStatusStore, RetryPolicy, RetryingStore};
use zatsu_monitor::version::{REVISION, VERSION, version_line};

const STORE_MAX_CONNECTIONS: u32 = 5;

#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// Path to the monitor definition file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Deadline for the whole invocation, shared by every check
    #[arg(long, env = "ZATSU_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Retries for transient status store errors
    #[arg(long, env = "ZATSU_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// PostgreSQL connection string for the status store
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Validate the monitor file and exit without any network access
    #[arg(long)]
    dry_run: bool,
}

fn init_logging() {
    // JSON lines on stdout, picked up by the scheduler's log collector.
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .json()
        .with_current_span(true);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();
}

fn request_id() -> String {
    env::var("AWS_LAMBDA_REQUEST_ID")
        .or_else(|_| env::var("ZATSU_REQUEST_ID"))
        .unwrap_or_else(|_| Uuid::new_v4().to_string())
}

fn print_dry_run(targets: &[MonitorTarget]) {
    let factory = HttpNotifierFactory::new(reqwest::Client::new());
    for target in targets {
        println!("{}: {}", target.name, target_readiness(&factory, target));
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let timeout = Duration::from_secs(args.timeout_secs);
    let deadline = Instant::now() + timeout;
    info!(version = VERSION, revision = REVISION, "started");

    let targets = load_monitor_config(&args.config)?;

    if args.dry_run {
        print_dry_run(&targets);
        return Ok(());
    }

    let database_url = args
        .database_url
        .ok_or("DATABASE_URL must be set in the environment or .env file")?;
    let pg_store = PgStatusStore::connect(&database_url, STORE_MAX_CONNECTIONS, timeout).await?;
    pg_store.ensure_schema().await?;
    let store = RetryingStore::new(pg_store, RetryPolicy::with_max_retries(args.max_retries));

    let prober = HttpProber::new(timeout)?;
    let notifier_client = reqwest::Client::builder().timeout(timeout).build()?;
    let monitor = StatusMonitor::new(
        prober,
        Arc::new(store),
        Arc::new(HttpNotifierFactory::new(notifier_client)),
    );

    monitor.run_all(targets, deadline).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    if env::args().any(|arg| arg == "--version") {
        println!("{}", version_line());
        return Ok(());
    }

    dotenv().ok();
    let args = Args::parse();
    init_logging();

    let span = info_span!("invocation", request_id = %request_id());
    let result = run(args).instrument(span.clone()).await;
    if let Err(e) = &result {
        span.in_scope(|| error!(error = %e, "Invocation aborted."));
    }
    result
}
