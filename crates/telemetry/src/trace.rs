use tracing_appender::non_blocking;
use tracing_subscriber::{prelude::*, EnvFilter};

const ENV_LOG_FORMAT: &str = "MS_LOG_FORMAT";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum TraceInitError {
    ParseError(#[from] tracing_subscriber::filter::ParseError),
    TryInitError(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENV_LOG_FORMAT).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Keeps the non-blocking writer flushing, hold it until exit.
pub struct TraceGuard {
    _non_blocking_worker: non_blocking::WorkerGuard,
}

/// Installs the global subscriber.
///
/// Filter directives come from `RUST_LOG`, default `info`. `log` records are
/// forwarded to the subscriber.
pub fn init() -> Result<TraceGuard, TraceInitError> {
    let env_filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL))?;

    let (non_blocking_stdout, _non_blocking_worker) = non_blocking(std::io::stdout());
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking_stdout);
    let fmt_layer = match LogFormat::from_env() {
        LogFormat::Text => fmt_layer.boxed(),
        LogFormat::Json => fmt_layer.json().with_current_span(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter_layer)
        .try_init()?;

    Ok(TraceGuard {
        _non_blocking_worker,
    })
}
