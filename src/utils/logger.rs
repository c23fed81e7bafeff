//! Logger utility for application-wide logging
//!
//! A file-backed journal that doubles as the `log` crate backend. The global
//! instance receives every `info!`/`debug!` record; components that journal
//! their own operations (reader, builder, driver) are handed a `&Logger`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use log::{Log, Record, Level, Metadata, LevelFilter};

/// File journal plus console echo
pub struct Logger {
    /// None for a console-only logger
    file: Mutex<Option<File>>,
    /// Records at or below this level are echoed to stderr
    console_level: LevelFilter,
}

impl Logger {
    /// Creates a logger writing to `log_file`, truncating it
    pub fn new(log_file: &str) -> io::Result<Self> {
        let file = File::create(Path::new(log_file))?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            console_level: LevelFilter::Info,
        })
    }

    /// Creates a logger appending to `log_file`
    pub fn append(log_file: &str) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(log_file)?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            console_level: LevelFilter::Info,
        })
    }

    /// A logger without a journal file, used by tests and dry runs
    pub fn console_only() -> Self {
        Logger {
            file: Mutex::new(None),
            console_level: LevelFilter::Off,
        }
    }

    pub fn with_console_level(mut self, level: LevelFilter) -> Self {
        self.console_level = level;
        self
    }

    /// Appends one line to the journal file
    pub fn log(&self, message: &str) -> io::Result<()> {
        let mut guard = self.file.lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", message)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Installs a logger as the `log` crate backend
    ///
    /// Only the first call takes effect; later calls print a warning.
    pub fn init_global_logger(log_file: &str, console_level: LevelFilter) -> io::Result<()> {
        let global_logger = Logger::append(log_file)?.with_console_level(console_level);

        if log::set_boxed_logger(Box::new(global_logger)).is_err() {
            eprintln!("Warning: Global logger was already initialized");
        }

        log::set_max_level(LevelFilter::Debug.max(console_level));
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug || metadata.level() <= self.console_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("[{}] {}", record.level(), record.args());
            let _ = Logger::log(self, &message);

            if record.level() <= self.console_level {
                eprintln!("{}", message);
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let path_str = path.to_str().unwrap();

        let logger = Logger::new(path_str).unwrap();
        logger.log("first").unwrap();
        logger.log("second").unwrap();

        let again = Logger::append(path_str).unwrap();
        again.log("third").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\nthird\n");
    }

    #[test]
    fn test_console_only_logger_accepts_messages() {
        let logger = Logger::console_only();
        assert!(logger.log("dropped").is_ok());
    }
}
