//! Append-only run log behind the `log` facade.
//!
//! Every record at or above the configured level is appended to the log file
//! as `YYYY-MM-DD HH:MM:SS - LEVEL - message`. With `--verbose`, records are
//! also echoed to stderr.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

pub const SEPARATOR_WIDTH: usize = 80;

struct FileLogger {
    file: Mutex<File>,
    level: LevelFilter,
    echo: bool,
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(
            &chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            record.level(),
            &record.args().to_string(),
        );

        if let Ok(mut file) = self.file.lock() {
            // A full disk must not abort the run.
            let _ = writeln!(file, "{line}");
        }
        if self.echo {
            eprintln!("{line}");
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

fn format_line(timestamp: &str, level: log::Level, message: &str) -> String {
    format!("{timestamp} - {level} - {message}")
}

/// Open `path` for appending and install it as the global logger.
pub fn init(path: &Path, level: LevelFilter, echo: bool) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create log directory {}: {e}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;

    log::set_boxed_logger(Box::new(FileLogger { file: Mutex::new(file), level, echo }))
        .map_err(|e| e.to_string())?;
    log::set_max_level(level);
    Ok(())
}

/// Separator line that frames the start of each run in the log.
pub fn separator() -> String {
    "=".repeat(SEPARATOR_WIDTH)
}
