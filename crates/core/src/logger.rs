use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: Option<File>,
    verbose: bool,
}

/// Initialize the global logger. Clears the log file.
/// Lines are also echoed to stdout; DEBUG lines only when `verbose`.
pub fn init(log_dir: &Path, verbose: bool) {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join("app.log");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .ok();

    LOGGER
        .set(Mutex::new(Logger { file, verbose }))
        .ok();
}

fn write_log(level: &str, prefix: &str, msg: &str) {
    let Some(logger) = LOGGER.get() else { return };
    let Ok(mut l) = logger.lock() else { return };

    let ts = Local::now().format("%H:%M:%S").to_string();
    let line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };

    if let Some(file) = l.file.as_mut() {
        writeln!(file, "{}", line).ok();
    }

    if level != "DEBUG" || l.verbose {
        // stdout carries the run trace, so keep it free of timestamps
        match (level, prefix.is_empty()) {
            ("INFO", true) => println!("{}", msg),
            ("INFO", false) => println!("[{}] {}", prefix, msg),
            (_, true) => println!("{}: {}", level.to_lowercase(), msg),
            (_, false) => println!("{}: [{}] {}", level.to_lowercase(), prefix, msg),
        }
    }
}

pub fn debug(msg: &str) {
    write_log("DEBUG", "", msg);
}

pub fn info(msg: &str) {
    write_log("INFO", "", msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", msg);
}

/// Log under a component prefix, e.g. `[gateway] request timed out`.
pub fn debug_p(prefix: &str, msg: &str) {
    write_log("DEBUG", prefix, msg);
}

pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, msg);
}
