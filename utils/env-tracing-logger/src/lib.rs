//! Console (and optionally file) logging for the command line tools.
//!
//! The filter is read from `RUST_LOG`. When that is unset, messages at
//! `info` and above are shown.

use time::{UtcOffset, format_description::well_known::Iso8601};
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not determine local UTC offset: {0}")]
    Offset(#[from] time::error::ComponentRange),
    #[error("could not create log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("a global tracing subscriber is already set: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Log to the console only.
pub fn init() -> Result<(), Error> {
    initiate_logging::<&str>(None, false)
}

/// Start logging to file and console, both optional.
pub fn initiate_logging<P: AsRef<std::path::Path>>(
    path: Option<P>,
    disable_console: bool,
) -> Result<(), Error> {
    // Fixed offset: the timezone at the moment logging starts.
    let timer = OffsetTime::new(
        UtcOffset::from_whole_seconds(chrono::Local::now().offset().local_minus_utc())?,
        Iso8601::DEFAULT,
    );

    let file_layer = match &path {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                fmt::layer()
                    .with_timer(timer.clone())
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    let console_layer = if disable_console {
        None
    } else {
        Some(
            fmt::layer()
                .with_timer(timer)
                .with_ansi(!cfg!(windows))
                .with_target(false),
        )
    };

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(default_filter());
    tracing::subscriber::set_global_default(collector)?;

    if let Some(path) = &path {
        tracing::debug!("Logging to file \"{}\".", path.as_ref().display());
    }
    Ok(())
}

fn default_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}
