//! Plain-text transcript log for the chat REPL.

use crate::core::message::{Turn, TurnRole};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    /// Start logging to `log_file` right away when one is given.
    pub fn new(log_file: Option<PathBuf>) -> io::Result<Self> {
        let mut log = TranscriptLog {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            log.set_log_file(path)?;
        }
        Ok(log)
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> io::Result<String> {
        // Fail now rather than on the first write.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn toggle_logging(&mut self, pause_message: &str) -> Result<String, String> {
        let Some(path) = self.file_path.clone() else {
            return Err("No log file specified. Use /log <filename> to enable logging first.".to_string());
        };
        if self.is_active {
            // Written before pausing so the gap is visible in the file.
            self.log_note(pause_message).map_err(|err| err.to_string())?;
            self.is_active = false;
            Ok(format!("Logging paused (file: {})", path.display()))
        } else {
            self.is_active = true;
            Ok(format!("Logging resumed to: {}", path.display()))
        }
    }

    pub fn log_turn(&self, turn: &Turn) -> io::Result<()> {
        match turn_text(turn) {
            Some(text) => self.write_block(&text),
            None => Ok(()),
        }
    }

    /// Log an out-of-band line such as a model switch or a cleared chat.
    pub fn log_note(&self, note: &str) -> io::Result<()> {
        self.write_block(&format!("## {note}"))
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        let file_name = |path: &Path| {
            path.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }

    fn active_path(&self) -> Option<&Path> {
        self.file_path
            .as_deref()
            .filter(|_| self.is_active)
    }

    fn write_block(&self, content: &str) -> io::Result<()> {
        let Some(file_path) = self.active_path() else {
            return Ok(());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()
    }
}

fn turn_text(turn: &Turn) -> Option<String> {
    match turn.role {
        TurnRole::User => Some(format!("You: {}", turn.content)),
        TurnRole::Assistant if !turn.content.is_empty() => Some(turn.content.clone()),
        TurnRole::Assistant => None,
        TurnRole::System => Some(format!("## {}", turn.content)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn logs_turns_and_pause_markers() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("chat.log");
        let mut log = TranscriptLog::new(Some(path.clone())).expect("log");

        log.log_turn(&Turn::user("hello")).expect("write");
        log.log_turn(&Turn::assistant("hi\nthere", Vec::new()))
            .expect("write");
        log.toggle_logging("Logging paused").expect("pause");
        log.log_turn(&Turn::user("not logged")).expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "You: hello\n\nhi\nthere\n\n## Logging paused\n\n");
        assert_eq!(log.get_status_string(), "paused (chat.log)");
    }

    #[test]
    fn toggling_without_a_file_is_an_error() {
        let mut log = TranscriptLog::new(None).expect("log");
        assert!(log.toggle_logging("x").is_err());
        assert_eq!(log.get_status_string(), "disabled");
    }
}
