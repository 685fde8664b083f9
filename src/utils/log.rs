//! Simple leveled logging.
//!
//! A process-wide level filter plus lightweight [`Logger`] handles carrying
//! a component identifier. Messages go to stderr with an uptime stamp so
//! diagnostic output never interleaves with program output on stdout.

use std::fmt::Display;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Log level for filtering messages.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    /// Parses a level name, case-insensitively.
    pub fn parse(name: &str) -> Option<Level> {
        match name.to_ascii_lowercase().as_str() {
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Warn as u8);
static STARTED: OnceLock<Instant> = OnceLock::new();

/// Initializes the logger with the given level.
pub fn init(level: Level) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns true if the given level should be logged.
#[inline]
fn enabled(level: Level) -> bool {
    level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

fn emit(level: Level, id: &str, message: &str) {
    if !enabled(level) {
        return;
    }
    let uptime = STARTED.get_or_init(Instant::now).elapsed();
    eprintln!(
        "{:10.3}s [{:5}] [{}] {}",
        uptime.as_secs_f64(),
        level,
        id,
        message
    );
}

/// Thread-safe logger handle with an identifier prefix.
///
/// Each handle carries an ID prepended to its messages, differentiating
/// components that log concurrently.
#[derive(Clone)]
pub struct Logger {
    pub id: Arc<str>,
}

impl Logger {
    /// Creates a new logger with the given identifier.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self { id: id.into() }
    }

    /// Logs an info-level message.
    pub fn info(&self, message: &str) {
        emit(Level::Info, &self.id, message);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, message: &str) {
        emit(Level::Warn, &self.id, message);
    }

    /// Logs an error-level message.
    pub fn error(&self, message: &str) {
        emit(Level::Error, &self.id, message);
    }
}
