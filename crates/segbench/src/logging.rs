//! Logging setup.
//!
//! Console lines read `LEVEL | target | message`, colouring fields only on a
//! terminal; the log file prefixes each line with a wall-clock timestamp. `RUST_LOG` overrides the requested level.

use std::{
    fmt,
    fs::{self, File},
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::timestamp::{session, Timestamp};

/// Pipe-separated event format.
#[derive(Debug, Clone, Copy)]
pub struct PipeFormat {
    timestamps: bool,
}

impl PipeFormat {
    pub const fn console() -> Self {
        Self { timestamps: false }
    }

    pub const fn file() -> Self {
        Self { timestamps: true }
    }
}

impl<S, N> FormatEvent<S, N> for PipeFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        if self.timestamps {
            write!(writer, "{} | ", Timestamp::now().log_line())?;
        }
        let metadata = event.metadata();
        write!(writer, "{} | {} | ", metadata.level(), metadata.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber and return the log file path.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created, the
/// level does not parse, or a subscriber is already installed.
pub fn init_logging(level: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let path = dir.join(format!("default_{}.log", session()));
    let file = File::create(&path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid logging level: {level}"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(PipeFormat::console())
                .with_ansi(io::stdout().is_terminal())
                .with_writer(io::stdout),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(PipeFormat::file())
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("logging is already initialized")?;

    Ok(path)
}
