//! A [`log`] backend that writes to stderr and, optionally, a log file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

//===========================================================================//

/// Logs records at or below `stderr_level` to stderr, and every record up
/// to `Trace` to the log file, if any.
struct Logger {
    stderr_level: log::LevelFilter,
    file: Option<Mutex<BufWriter<File>>>,
}

impl Logger {
    fn max_level(&self) -> log::LevelFilter {
        if self.file.is_some() {
            log::LevelFilter::Trace
        } else {
            self.stderr_level
        }
    }
}

fn format_record(record: &log::Record) -> String {
    format!(
        "[{}:{} {}] {}",
        record.file().unwrap_or("?"),
        record.line().unwrap_or(0),
        record.level(),
        record.args()
    )
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record);
        if record.level() <= self.stderr_level {
            eprintln!("{line}");
        }
        if let Some(ref file) = self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

//===========================================================================//

/// Maps a `-v` count to the level of messages shown on stderr.  Trace
/// messages (one per executed instruction) only ever go to the log file.
pub fn stderr_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

/// Installs the global logger.  Fails if the log file can't be created or
/// a logger is already installed.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> io::Result<()> {
    let file = match log_file {
        Some(path) => Some(Mutex::new(BufWriter::new(File::create(path)?))),
        None => None,
    };
    let logger = Logger { stderr_level: stderr_level(verbosity), file };
    let max_level = logger.max_level();
    log::set_boxed_logger(Box::new(logger))
        .map_err(|error| io::Error::new(io::ErrorKind::AlreadyExists, error))?;
    log::set_max_level(max_level);
    if let Some(path) = log_file {
        log::info!("Log is written to {}", path.display());
    }
    Ok(())
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{Logger, format_record, stderr_level};
    use log::Log;

    #[test]
    fn verbosity_levels() {
        assert_eq!(stderr_level(0), log::LevelFilter::Info);
        assert_eq!(stderr_level(1), log::LevelFilter::Debug);
        assert_eq!(stderr_level(5), log::LevelFilter::Debug);
    }

    #[test]
    fn trace_needs_a_file() {
        let logger =
            Logger { stderr_level: log::LevelFilter::Debug, file: None };
        let trace = log::Metadata::builder().level(log::Level::Trace).build();
        let debug = log::Metadata::builder().level(log::Level::Debug).build();
        assert!(!logger.enabled(&trace));
        assert!(logger.enabled(&debug));
    }

    #[test]
    fn record_format() {
        let line = format_record(
            &log::Record::builder()
                .args(format_args!("hello"))
                .level(log::Level::Warn)
                .file(Some("src/db/sim.rs"))
                .line(Some(42))
                .build(),
        );
        assert_eq!(line, "[src/db/sim.rs:42 WARN] hello");
    }
}

//===========================================================================//
