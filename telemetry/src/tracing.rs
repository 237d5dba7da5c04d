use std::io;
use std::sync::Once;

use config::environment::Environment;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Name of the environment variable enabling log output in tests.
const ENABLE_TEST_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

/// Crates whose events are shown by default, next to the binary itself.
const DEFAULT_LOG_TARGETS: &[&str] = &["engine", "postgres", "config"];

/// Directory the rolling log files of deployed environments are written to.
const LOG_DIRECTORY: &str = "logs";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to redirect `log` records to tracing: {0}")]
    LogTracer(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Flushes buffered log lines when dropped.
///
/// Keep it alive for the whole lifetime of the process, otherwise log lines written from the
/// background writer may be lost.
#[must_use = "dropping the flusher stops log output"]
#[derive(Debug)]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

fn default_filter(app_name: &str) -> EnvFilter {
    let directives = std::iter::once(app_name)
        .chain(DEFAULT_LOG_TARGETS.iter().copied())
        .map(|target| format!("{}=info", target.replace('-', "_")))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::new(directives)
}

/// Installs the global tracing subscriber for `app_name`.
///
/// `RUST_LOG` overrides the default filter. Deployed environments write JSON lines to a daily
/// rolling file under `logs/`, the dev environment prints human-readable lines to stdout.
/// Records emitted through the `log` crate, e.g. by sqlx, are forwarded as well.
pub fn init_tracing(app_name: &str, environment: Environment) -> Result<LogFlusher, TracingError> {
    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(app_name));
    let (writer, guard) = if environment.is_deployed() {
        let appender = tracing_appender::rolling::daily(LOG_DIRECTORY, format!("{app_name}.log"));
        tracing_appender::non_blocking(appender)
    } else {
        tracing_appender::non_blocking(io::stdout())
    };

    // The subscriber is installed directly since `LogTracer` already owns the `log` facade.
    let registry = tracing_subscriber::registry().with(filter);
    if environment.is_deployed() {
        let subscriber = registry.with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer),
        );
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = registry.with(fmt::layer().with_target(true).with_writer(writer));
        tracing::subscriber::set_global_default(subscriber)?;
    }

    tracing::info!(app = app_name, environment = %environment, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing to the test output, once per test binary.
///
/// Output is only enabled when `ENABLE_TRACING` is set, so regular test runs stay quiet.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        // Another test harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
