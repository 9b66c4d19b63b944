//! Structured logger with a rotating file sink
//!
//! One log line = one event. Lines are JSON with keys in deterministic
//! order (timestamp, level, event, then fields alphabetically). The file
//! sink rotates when the active file exceeds the size bound, keeping a
//! bounded number of rotated files, newest first.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;

use crate::config::LogConfig;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    fn parse(raw: &str) -> LogLevel {
        match raw.to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => LogLevel::Info,
        }
    }
}

struct FileSink {
    log_dir: PathBuf,
    active: File,
    active_path: PathBuf,
    written: u64,
    max_size: u64,
    max_files: usize,
}

impl FileSink {
    fn open(config: &LogConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.log_dir)?;
        let active_path = config.log_dir.join("atlas.log");
        let active = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active_path)?;
        let written = active.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            log_dir: config.log_dir.clone(),
            active,
            active_path,
            written,
            max_size: config.max_size,
            max_files: config.max_files,
        })
    }

    fn append(&mut self, line: &str) {
        if self.written + line.len() as u64 + 1 > self.max_size {
            let _ = self.rotate();
        }
        if self.active.write_all(line.as_bytes()).is_ok() {
            let _ = self.active.write_all(b"\n");
            self.written += line.len() as u64 + 1;
        }
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let rotated = self.log_dir.join(format!("atlas-{}.log", stamp));
        fs::rename(&self.active_path, &rotated)?;
        self.active = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.active_path)?;
        self.written = 0;
        self.prune();
        Ok(())
    }

    /// Keep only the newest rotated files.
    fn prune(&self) {
        let mut rotated: Vec<PathBuf> = match fs::read_dir(&self.log_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with("atlas-") && n.ends_with(".log"))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => return,
        };
        rotated.sort();
        while rotated.len() > self.max_files.saturating_sub(1) {
            let oldest = rotated.remove(0);
            let _ = fs::remove_file(oldest);
        }
    }
}

/// The logger. Cheap to share behind `Arc`.
pub struct Logger {
    min_level: LogLevel,
    sink: Option<Mutex<FileSink>>,
    /// Mirror lines to stderr
    stderr: bool,
}

impl Logger {
    /// Logger with a file sink under the configured directory.
    pub fn new(config: &LogConfig) -> Self {
        let sink = FileSink::open(config).ok().map(Mutex::new);
        Self {
            min_level: LogLevel::parse(&config.log_level),
            sink,
            stderr: true,
        }
    }

    /// Logger without any sink; for tests and embedded use.
    pub fn disabled() -> Self {
        Self {
            min_level: LogLevel::Fatal,
            sink: None,
            stderr: false,
        }
    }

    /// Log an event with sorted fields.
    pub fn log(&self, level: LogLevel, event: &str, fields: &[(&str, String)]) {
        if level < self.min_level {
            return;
        }
        let line = render(level, event, fields);
        if self.stderr {
            eprintln!("{}", line);
        }
        if let Some(sink) = &self.sink {
            if let Ok(mut sink) = sink.lock() {
                sink.append(&line);
            }
        }
    }

    /// Info shorthand.
    pub fn info(&self, event: &str, fields: &[(&str, String)]) {
        self.log(LogLevel::Info, event, fields);
    }

    /// Warn shorthand.
    pub fn warn(&self, event: &str, fields: &[(&str, String)]) {
        self.log(LogLevel::Warn, event, fields);
    }

    /// Error shorthand.
    pub fn error(&self, event: &str, fields: &[(&str, String)]) {
        self.log(LogLevel::Error, event, fields);
    }
}

/// Render one line: timestamp, level, event, then fields alphabetically.
fn render(level: LogLevel, event: &str, fields: &[(&str, String)]) -> String {
    let mut sorted: Vec<(&str, &String)> = fields.iter().map(|(k, v)| (*k, v)).collect();
    sorted.sort_by_key(|(k, _)| *k);

    let mut line = String::from("{");
    line.push_str(&format!(
        "\"ts\":{},\"level\":{},\"event\":{}",
        serde_json::to_string(&Utc::now().to_rfc3339()).unwrap_or_default(),
        serde_json::to_string(level.as_str()).unwrap_or_default(),
        serde_json::to_string(event).unwrap_or_default(),
    ));
    for (key, value) in sorted {
        line.push_str(&format!(
            ",{}:{}",
            serde_json::to_string(key).unwrap_or_default(),
            serde_json::to_string(value).unwrap_or_default()
        ));
    }
    line.push('}');
    line
}
