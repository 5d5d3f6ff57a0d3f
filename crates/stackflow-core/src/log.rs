//! デプロイログ
//!
//! タイムスタンプとレベル付きのメッセージを追記専用で記録する。
//! ファイルへの追記・コンソール表示・メモリ保持（テスト用）を行う。

use crate::error::{Result, StackError};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// ログファイルに書き出す1行
    pub fn to_line(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level.as_str(),
            self.message
        )
    }
}

pub struct LogSink {
    path: Option<PathBuf>,
    file: Option<File>,
    entries: Vec<LogEntry>,
    echo: bool,
}

impl LogSink {
    /// メモリのみに記録する（コンソール出力なし）
    pub fn memory() -> Self {
        Self {
            path: None,
            file: None,
            entries: Vec::new(),
            echo: false,
        }
    }

    /// ファイルに追記しつつコンソールにも表示する
    pub fn to_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StackError::io(parent, &e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StackError::io(&path, &e))?;

        Ok(Self {
            path: Some(path),
            file: Some(file),
            entries: Vec::new(),
            echo: true,
        })
    }

    /// コンソール表示を止める
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// 指定文字列を含むエントリがあるか
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    pub fn record(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        };

        tracing::debug!(level = level.as_str(), "{}", entry.message);

        if let Some(file) = self.file.as_mut()
            && let Err(e) = writeln!(file, "{}", entry.to_line())
        {
            tracing::warn!("ログファイルへの書き込みに失敗しました: {}", e);
            self.file = None;
        }

        if self.echo {
            print_entry(&entry);
        }

        self.entries.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.record(LogLevel::Success, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(LogLevel::Error, message);
    }

    /// 補足情報（INFO として記録し、インデントして表示）
    pub fn detail(&mut self, message: impl Into<String>) {
        let message = message.into();
        let entry = LogEntry {
            timestamp: Local::now(),
            level: LogLevel::Info,
            message: format!("  → {}", message),
        };
        if let Some(file) = self.file.as_mut()
            && let Err(e) = writeln!(file, "{}", entry.to_line())
        {
            tracing::warn!("ログファイルへの書き込みに失敗しました: {}", e);
            self.file = None;
        }
        if self.echo {
            let timestamp = entry.timestamp.format("%H:%M:%S").to_string();
            println!("[{}]   → {}", timestamp.dimmed(), message.cyan());
        }
        self.entries.push(entry);
    }
}

fn print_entry(entry: &LogEntry) {
    let timestamp = entry.timestamp.format("%H:%M:%S").to_string();
    match entry.level {
        LogLevel::Info => println!("[{}] {} {}", timestamp.dimmed(), "▶".cyan(), entry.message),
        LogLevel::Success => println!(
            "[{}] {} {}",
            timestamp.dimmed(),
            "✓".green().bold(),
            entry.message
        ),
        LogLevel::Warn => println!(
            "[{}] {} {}",
            timestamp.dimmed(),
            "⚠".yellow(),
            entry.message.yellow()
        ),
        LogLevel::Error => eprintln!(
            "[{}] {} {}",
            timestamp.dimmed(),
            "✗".red().bold(),
            entry.message.red()
        ),
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order_and_levels() {
        let mut log = LogSink::memory();
        log.info("開始");
        log.warn("警告");
        log.success("完了");

        let levels: Vec<LogLevel> = log.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Warn, LogLevel::Success]);
        assert!(log.contains("警告"));
        assert!(log.path().is_none());
    }

    #[test]
    fn test_file_sink_appends_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("logs").join("deploy.log");

        {
            let mut log = LogSink::to_file(&path).unwrap().quiet();
            log.info("one");
            log.error("two");
        }
        {
            let mut log = LogSink::to_file(&path).unwrap().quiet();
            log.detail("three");
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[INFO] one"));
        assert!(lines[1].ends_with("[ERROR] two"));
        assert!(lines[2].contains("→ three"));
    }
}
