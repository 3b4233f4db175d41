//! Console logging setup.
//!
//! Events are split across two streams by severity: everything from
//! `out_level` up to (not including) `err_level` goes to stdout, `err_level`
//! and above go to stderr.
//!
//! [`LogConfig::init`] installs the process-wide subscriber and has to run
//! before any [`crate::Server`] is built. Spans created earlier are disabled,
//! so their events are lost.

use std::fmt::Display;

use tracing::{error, Level};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::error::{LrpcError, Result};

/// Output stream selected for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Severity thresholds for the console logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub out_level: Level,
    pub err_level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            out_level: Level::INFO,
            err_level: Level::ERROR,
        }
    }
}

impl LogConfig {
    /// Build from level names such as `"info"` and `"error"`.
    pub fn from_names(out_level: &str, err_level: &str) -> Result<Self> {
        Ok(Self {
            out_level: parse_level(out_level)?,
            err_level: parse_level(err_level)?,
        })
    }

    /// Where an event at `level` is written, if anywhere.
    pub fn route(&self, level: &Level) -> Option<Stream> {
        // More verbose levels compare greater.
        if *level <= self.err_level {
            Some(Stream::Stderr)
        } else if *level <= self.out_level {
            Some(Stream::Stdout)
        } else {
            None
        }
    }

    /// Install the global subscriber.
    ///
    /// Fails if a subscriber is already installed.
    pub fn init(&self) -> Result<()> {
        let config = *self;
        let stdout = fmt::layer()
            .with_target(false)
            .compact()
            .with_writer(std::io::stdout)
            .with_filter(filter_fn(move |meta| {
                config.route(meta.level()) == Some(Stream::Stdout)
            }));

        let config = *self;
        let stderr = fmt::layer()
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter_fn(move |meta| {
                config.route(meta.level()) == Some(Stream::Stderr)
            }));

        tracing_subscriber::registry()
            .with(stdout)
            .with(stderr)
            .try_init()
            .map_err(|e| LrpcError::Config {
                message: format!("failed to install logger: {}", e),
            })
    }
}

/// Parse a level name. `fatal` is accepted as an alias of `error`.
pub fn parse_level(name: &str) -> Result<Level> {
    let name = name.trim();
    if name.eq_ignore_ascii_case("fatal") {
        return Ok(Level::ERROR);
    }
    name.parse::<Level>().map_err(|_| LrpcError::Config {
        message: format!("unknown log level: {:?}", name),
    })
}

/// Log `message` at error level and exit the process with status 255.
///
/// Only for start-up paths; never call this while a caller waits for a reply.
pub fn fatal(message: impl Display) -> ! {
    error!("{}", message);
    std::process::exit(255)
}
