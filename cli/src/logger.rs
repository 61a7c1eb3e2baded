use colored::*;
use dial_overlay_core::paths;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// Colored console output plus a plain copy in the data dir log file.
pub struct DialOverlayLogger {
    level: LevelFilter,
    log_file: Mutex<Option<File>>,
    target_colors: Mutex<HashMap<String, usize>>,
    next_color_index: AtomicUsize,
}

impl DialOverlayLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let level = if quiet {
            LevelFilter::Info
        } else if verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Debug
        };

        let log_file = paths::ensure_data_dir()
            .and_then(|_| paths::log_file_path())
            .and_then(|path| {
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(|e| eprintln!("Warning: Failed to open log file at {:?}: {}", path, e))
                    .ok()
            });

        Self {
            level,
            log_file: Mutex::new(log_file),
            target_colors: Mutex::new(HashMap::new()),
            next_color_index: AtomicUsize::new(0),
        }
    }

    fn color_for_target(&self, target: &str) -> ColoredString {
        // Palette of colors that work well when dimmed
        let colors: &[fn(&str) -> ColoredString] = &[
            |s| s.green(),
            |s| s.yellow(),
            |s| s.blue(),
            |s| s.magenta(),
            |s| s.cyan(),
        ];

        let color_index = *self
            .target_colors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(target.to_string())
            .or_insert_with(|| self.next_color_index.fetch_add(1, Ordering::SeqCst) % colors.len());

        colors[color_index](target)
    }

    fn level_tag(level: Level) -> &'static str {
        match level {
            Level::Error => "[E]",
            Level::Warn => "[W]",
            Level::Info => "[I]",
            Level::Debug => "[D]",
            Level::Trace => "[T]",
        }
    }

    /// `dial_overlay_core::overlay::handle` -> `handle`
    fn short_target<'a>(record: &'a Record) -> &'a str {
        record.target().rsplit("::").next().unwrap_or(record.target())
    }

    fn format_log(&self, record: &Record) -> String {
        let tag = Self::level_tag(record.level());
        let target = Self::short_target(record);
        let target = if target.is_empty() {
            String::new()
        } else {
            format!("[{}] ", self.color_for_target(target).dimmed())
        };

        match record.level() {
            Level::Error => format!("{tag} {target}{}", record.args()).red().bold().to_string(),
            Level::Warn => format!("{tag} {target}{}", record.args()).yellow().bold().to_string(),
            Level::Info => format!("{} {target}{}", tag.green().bold(), record.args()),
            Level::Debug => format!("{} {target}{}", tag.blue().bold(), record.args()),
            Level::Trace => format!("{} {target}{}", tag.white().bold(), record.args()),
        }
    }

    fn format_log_plain(&self, record: &Record) -> String {
        let target = Self::short_target(record);
        if target.is_empty() {
            format!("{} {}", Self::level_tag(record.level()), record.args())
        } else {
            format!(
                "{} [{}] {}",
                Self::level_tag(record.level()),
                target,
                record.args()
            )
        }
    }
}

impl Log for DialOverlayLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        println!("{}", self.format_log(record));

        let mut file = self.log_file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = file.as_mut() {
            let _ = writeln!(file, "{}", self.format_log_plain(record));
        }
    }

    fn flush(&self) {
        if let Some(file) = self
            .log_file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_mut()
        {
            let _ = file.flush();
        }
    }
}

pub fn init_logger(quiet: bool, verbose: bool) -> Result<(), log::SetLoggerError> {
    let logger = DialOverlayLogger::new(quiet, verbose);
    let level = logger.level;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}
