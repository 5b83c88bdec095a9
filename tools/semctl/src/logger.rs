use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Environment variable consulted when no `-v` flag is given.
pub const LOG_ENV: &str = "SEMLOCK_LOG";

pub struct StderrLogger {
    max_level: LevelFilter,
}

impl StderrLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Call this once, early in `main`.
    ///
    /// # Errors
    /// Fails if another logger is already installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        // set_logger requires &'static dyn Log
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message"
        eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

/// `-v` flags win; otherwise `env` (the value of [`LOG_ENV`]) names a level;
/// otherwise only warnings and errors are shown.
#[must_use]
pub fn level_from(verbosity: u8, env: Option<&str>) -> LevelFilter {
    match verbosity {
        0 => env
            .and_then(|v| v.trim().parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Warn),
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => Level::Trace.to_level_filter(),
    }
}
