use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

const RECENT_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of the request journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub level: JournalLevel,
    pub component: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl JournalEntry {
    pub fn new(
        level: JournalLevel,
        component: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, ctx: serde_json::Value) -> Self {
        self.context = Some(ctx);
        self
    }
}

/// Append-only JSONL journal. Keeps the last entries in memory so tests and
/// diagnostics can inspect them without reading the file back.
struct Journal {
    recent: VecDeque<JournalEntry>,
    writer: Option<BufWriter<File>>,
}

impl Journal {
    fn open(file_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
            writer: Some(BufWriter::new(file)),
        })
    }

    fn in_memory() -> Self {
        Self {
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
            writer: None,
        }
    }

    fn record(&mut self, entry: JournalEntry) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&entry) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
        if self.recent.len() >= RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(entry);
    }
}

/// Cloneable handle to the request journal.
#[derive(Clone)]
pub struct SharedJournal(Arc<Mutex<Journal>>);

impl SharedJournal {
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Journal::open(file_path.as_ref())?))))
    }

    /// A journal that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self(Arc::new(Mutex::new(Journal::in_memory())))
    }

    pub fn record(&self, entry: JournalEntry) {
        if let Ok(mut journal) = self.0.lock() {
            journal.record(entry);
        }
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.record(JournalEntry::new(JournalLevel::Info, component, message));
    }

    pub fn warn(&self, component: impl Into<String>, message: impl Into<String>) {
        self.record(JournalEntry::new(JournalLevel::Warn, component, message));
    }

    pub fn error(&self, component: impl Into<String>, message: impl Into<String>) {
        self.record(JournalEntry::new(JournalLevel::Error, component, message));
    }

    pub fn debug(&self, component: impl Into<String>, message: impl Into<String>) {
        self.record(JournalEntry::new(JournalLevel::Debug, component, message));
    }

    pub fn record_with_context(
        &self,
        level: JournalLevel,
        component: impl Into<String>,
        message: impl Into<String>,
        context: serde_json::Value,
    ) {
        self.record(JournalEntry::new(level, component, message).with_context(context));
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<JournalEntry> {
        self.0
            .lock()
            .map(|j| j.recent.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_journal_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("bridge.log");
        let journal = SharedJournal::open(&path).unwrap();

        journal.info("server", "first");
        journal.record_with_context(
            JournalLevel::Warn,
            "proxy",
            "second",
            serde_json::json!({"status": 429}),
        );

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let entry: JournalEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry.level, JournalLevel::Warn);
        assert_eq!(entry.component, "proxy");
        assert_eq!(entry.context.unwrap()["status"], 429);
    }

    #[test]
    fn test_recent_is_newest_first_and_bounded() {
        let journal = SharedJournal::in_memory();
        for i in 0..(RECENT_CAPACITY + 5) {
            journal.debug("test", format!("entry {i}"));
        }

        let recent = journal.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, format!("entry {}", RECENT_CAPACITY + 4));
        assert_eq!(journal.recent(usize::MAX).len(), RECENT_CAPACITY);
    }
}
