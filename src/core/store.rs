//! Durable record of the active conversation.
//!
//! The store holds exactly one conversation under the well-known key
//! [`CONVERSATION_KEY`]. Writes replace the whole record atomically so a
//! crash never leaves a partially written conversation behind.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

use crate::core::error::PersistenceError;
use crate::core::message::Conversation;

pub const CONVERSATION_KEY: &str = "conversation";

/// Current on-disk record format.
pub const RECORD_VERSION: u32 = 1;

pub trait ConversationStore: Send + Sync {
    fn load(&self) -> Result<Option<Conversation>, PersistenceError>;
    fn save(&self, conversation: &Conversation) -> Result<(), PersistenceError>;
}

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    #[serde(flatten)]
    conversation: &'a Conversation,
}

#[derive(Deserialize)]
struct Record {
    #[serde(flatten)]
    conversation: Conversation,
}

#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: Option<u32>,
}

/// JSON file at `<dir>/conversation.json`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{CONVERSATION_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConversationStore for FileStore {
    fn load(&self) -> Result<Option<Conversation>, PersistenceError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_err(err)),
        };
        decode_record(&contents, &self.path).map(Some)
    }

    fn save(&self, conversation: &Conversation) -> Result<(), PersistenceError> {
        let contents = encode_record(conversation)?;
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(|err| self.io_err(err))?;
        }

        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|err| self.io_err(err))?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|err| self.io_err(err))?;
        temp_file
            .as_file_mut()
            .sync_all()
            .map_err(|err| self.io_err(err))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| self.io_err(err.error))?;
        Ok(())
    }
}

/// Keeps the encoded record in memory. Used by one-shot commands and tests.
#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for MemoryStore {
    fn load(&self) -> Result<Option<Conversation>, PersistenceError> {
        let record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        match record.as_deref() {
            Some(contents) => decode_record(contents, Path::new(CONVERSATION_KEY)).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, conversation: &Conversation) -> Result<(), PersistenceError> {
        let contents = encode_record(conversation)?;
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents);
        Ok(())
    }
}

fn encode_record(conversation: &Conversation) -> Result<String, PersistenceError> {
    serde_json::to_string_pretty(&RecordRef {
        version: RECORD_VERSION,
        conversation,
    })
    .map_err(PersistenceError::Encode)
}

fn decode_record(contents: &str, path: &Path) -> Result<Conversation, PersistenceError> {
    let decode_err = |source| PersistenceError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let header: VersionHeader = serde_json::from_str(contents).map_err(decode_err)?;
    match header.version {
        Some(RECORD_VERSION) => {}
        Some(other) => return Err(PersistenceError::UnsupportedVersion(other)),
        None => return Err(PersistenceError::UnsupportedVersion(0)),
    }
    let record: Record = serde_json::from_str(contents).map_err(decode_err)?;
    Ok(record.conversation)
}
