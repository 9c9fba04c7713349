use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crossterm::style::Stylize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Stage,
    Success,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Stage => "STAGE",
            Level::Success => "OK",
            Level::Warn => "WARN",
            Level::Error => "FAIL",
        }
    }
}

/// Progress sink threaded through the whole pipeline instead of ad hoc
/// printing, so runs are observable in tests.
pub trait Reporter {
    fn report(&self, level: Level, message: &str);
}

/// Timestamped, colored terminal output.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, level: Level, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let line = format!("{} [{}] {}", timestamp, level.tag(), message);
        let styled = match level {
            Level::Info => line.stylize(),
            Level::Stage => line.cyan(),
            Level::Success => line.green(),
            Level::Warn => line.yellow(),
            Level::Error => line.red(),
        };
        println!("{}", styled);
    }
}

/// Plain append-only log file, one line per report.
pub struct FileReporter {
    file: Mutex<File>,
}

impl FileReporter {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl Reporter for FileReporter {
    fn report(&self, level: Level, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{} [{}] {}", timestamp, level.tag(), message);
        }
    }
}

/// Fans every report out to all attached sinks.
pub struct MultiReporter {
    sinks: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(sinks: Vec<Box<dyn Reporter>>) -> Self {
        Self { sinks }
    }
}

impl Reporter for MultiReporter {
    fn report(&self, level: Level, message: &str) {
        for sink in &self.sinks {
            sink.report(level, message);
        }
    }
}
