//! Minimal, zero-dependency logging for the hacker-lang memory subsystems.
//!
//! The collector and the arena allocator report collections, allocator
//! failures and statistics through the macros in this crate. Output goes to
//! stderr so it never mixes with a compiled program's stdout.
//!
//! # Example
//!
//! ```
//! use hl_log::{debug, info, warn, Level};
//!
//! hl_log::set_level(Level::Debug);
//!
//! let cycles = 3;
//! info!("minor collections so far: {}", cycles);
//! debug!("survivors: {:?}", vec![16, 32]);
//! warn!("old generation above threshold");
//! ```
//!
//! # Environment
//!
//! [`init_from_env`] reads `HL_LOG` (`error`, `warn`, `info`, `debug`,
//! `trace`). Setting `NO_COLOR` disables ANSI colors.

use std::fmt::Arguments;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Environment variable consulted by [`init_from_env`].
pub const LEVEL_ENV: &str = "HL_LOG";

/// Log levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Allocator failures and broken invariants
    Error = 0,
    /// Degraded behaviour the caller should know about
    Warn = 1,
    /// Statistics reports
    Info = 2,
    /// One line per collection or chunk event
    Debug = 3,
    /// Per-object detail
    Trace = 4,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case name of this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl std::fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring case. `warning` is accepted for `Warn`.
    ///
    /// ```
    /// use hl_log::Level;
    ///
    /// assert_eq!("debug".parse::<Level>(), Ok(Level::Debug));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Process-wide level filter.
///
/// Only the threshold is shared; the allocators themselves stay per-thread.
pub struct Logger {
    level: AtomicU8,
    color: AtomicBool,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
            color: AtomicBool::new(true),
        }
    }

    /// Sets the minimum level that is emitted.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Returns true if a message at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }

    /// Enables or disables ANSI colors.
    pub fn set_color(&self, enabled: bool) {
        self.color.store(enabled, Ordering::Relaxed);
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, creating it at `Level::Warn` on first use.
///
/// The allocators are quiet by default: collections log at debug and
/// statistics at info.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the minimum level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the minimum level from a level name.
///
/// ```
/// hl_log::set_level_from_str("trace").unwrap();
/// assert!(hl_log::set_level_from_str("chatty").is_err());
/// ```
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Configures the global logger from `HL_LOG` and `NO_COLOR`.
///
/// An unset `HL_LOG` leaves the level untouched. An unparsable value is
/// reported once at warn level and otherwise ignored.
pub fn init_from_env() {
    let logger = get_logger();
    if std::env::var_os("NO_COLOR").is_some() {
        logger.set_color(false);
    }
    if let Ok(value) = std::env::var(LEVEL_ENV) {
        match value.parse::<Level>() {
            Ok(level) => logger.set_level(level),
            Err(err) => crate::warn!("ignoring {}: {}", LEVEL_ENV, err),
        }
    }
}

#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    const RESET: &str = "\x1b[0m";

    let logger = get_logger();
    if !logger.enabled(level) {
        return;
    }

    let name = level.as_str();
    if logger.color.load(Ordering::Relaxed) {
        let color = level.color_code();
        eprintln!("{color}[{name}]{RESET} {target}: {args}");
    } else {
        eprintln!("[{name}] {target}: {args}");
    }
}

/// Logs at an explicit level, tagging the line with the caller's module path.
///
/// ```
/// use hl_log::{log, Level};
///
/// log!(level: Level::Info, "young buffer: {} bytes", 65536);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at the Error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at the Warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at the Info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at the Debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at the Trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}
