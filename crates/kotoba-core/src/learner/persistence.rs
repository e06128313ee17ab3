//! Per-user snapshot storage.
//!
//! File format (`<user>.lxur`): `KTUR` + version byte + bincode body.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::state::RelationSnapshot;

const MAGIC: &[u8; 4] = b"KTUR";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 5;
const EXTENSION: &str = "lxur";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected KTUR)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Where learner state lives between sessions.
pub trait RelationStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved for the user yet.
    fn load(&self, user_id: &str) -> Result<Option<RelationSnapshot>, PersistenceError>;
    fn save(&self, user_id: &str, snapshot: &RelationSnapshot) -> Result<(), PersistenceError>;
}

pub fn encode_snapshot(snapshot: &RelationSnapshot) -> Result<Vec<u8>, PersistenceError> {
    let body = bincode::serialize(snapshot).map_err(PersistenceError::Serialize)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&body);
    Ok(buf)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<RelationSnapshot, PersistenceError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PersistenceError::InvalidHeader);
    }
    if &bytes[..4] != MAGIC {
        return Err(PersistenceError::InvalidMagic);
    }
    if bytes[4] != VERSION {
        return Err(PersistenceError::UnsupportedVersion(bytes[4]));
    }
    bincode::deserialize(&bytes[HEADER_SIZE..]).map_err(PersistenceError::Deserialize)
}

/// One file per user under a directory.
#[derive(Debug, Clone)]
pub struct FileRelationStore {
    dir: PathBuf,
}

impl FileRelationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `[A-Za-z0-9-]` is kept; every other byte of the UTF-8 id, `_`
    /// included, becomes `_xx` (lowercase hex). Distinct ids never share a
    /// file. The empty id maps to `_`, which no escape produces.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let mut name = String::with_capacity(user_id.len());
        for b in user_id.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' {
                name.push(b as char);
            } else {
                name.push_str(&format!("_{b:02x}"));
            }
        }
        if name.is_empty() {
            name.push('_');
        }
        self.dir.join(format!("{name}.{EXTENSION}"))
    }
}

impl RelationStore for FileRelationStore {
    fn load(&self, user_id: &str) -> Result<Option<RelationSnapshot>, PersistenceError> {
        match fs::read(self.path_for(user_id)) {
            Ok(bytes) => decode_snapshot(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic write: write to .tmp then rename.
    fn save(&self, user_id: &str, snapshot: &RelationSnapshot) -> Result<(), PersistenceError> {
        let bytes = encode_snapshot(snapshot)?;
        let path = self.path_for(user_id);
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process store. Saves can be made to fail for exercising the
/// retry path.
#[derive(Debug, Default)]
pub struct MemoryRelationStore {
    snapshots: Mutex<HashMap<String, RelationSnapshot>>,
    fail_saves: AtomicBool,
}

impl MemoryRelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self, user_id: &str) -> Option<RelationSnapshot> {
        self.snapshots.lock().ok()?.get(user_id).cloned()
    }
}

impl RelationStore for MemoryRelationStore {
    fn load(&self, user_id: &str) -> Result<Option<RelationSnapshot>, PersistenceError> {
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|_| PersistenceError::Unavailable("store lock poisoned".into()))?;
        Ok(snapshots.get(user_id).cloned())
    }

    fn save(&self, user_id: &str, snapshot: &RelationSnapshot) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("saves disabled".into()));
        }
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|_| PersistenceError::Unavailable("store lock poisoned".into()))?;
        snapshots.insert(user_id.to_string(), snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::state::{CoOccurrence, UserRelation};

    fn sample() -> RelationSnapshot {
        RelationSnapshot {
            user_relations: vec![(
                "猫".to_string(),
                vec![UserRelation::new("好き", 0.6, 2, 1_700_000_000)],
            )],
            co_occurrence: vec![(
                "好き".to_string(),
                "猫".to_string(),
                CoOccurrence {
                    count: 2,
                    contexts: vec!["猫が好きです".to_string()],
                    mean_strength: 0.6,
                    scored: 2,
                },
            )],
            term_frequency: vec![("猫".to_string(), 2), ("好き".to_string(), 4)],
            learning_config: None,
            last_saved: 1_700_000_000,
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRelationStore::new(dir.path());
        assert_eq!(store.load("alice").unwrap(), None);
        store.save("alice", &sample()).unwrap();
        assert_eq!(store.load("alice").unwrap(), Some(sample()));
        assert!(!store.path_for("alice").with_extension("tmp").exists());
    }

    #[test]
    fn test_path_is_sanitised() {
        let store = FileRelationStore::new("/data");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/data/_2e_2e_2fetc_2fpasswd.lxur")
        );
        assert_eq!(store.path_for("user-42"), PathBuf::from("/data/user-42.lxur"));
        assert_eq!(store.path_for(""), PathBuf::from("/data/_.lxur"));
    }

    #[test]
    fn test_distinct_ids_get_distinct_files() {
        let store = FileRelationStore::new("/data");
        assert_ne!(store.path_for("a.b"), store.path_for("a_b"));
        assert_ne!(store.path_for("_"), store.path_for(""));
        assert_ne!(store.path_for("たろう"), store.path_for("はなこ"));
        assert_eq!(
            store.path_for("猫"),
            PathBuf::from("/data/_e7_8c_ab.lxur")
        );
    }

    #[test]
    fn test_japanese_users_do_not_share_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRelationStore::new(dir.path());
        store.save("たろう", &sample()).unwrap();
        assert_eq!(store.load("はなこ").unwrap(), None);
        assert_eq!(store.load("たろう").unwrap(), Some(sample()));
    }

    #[test]
    fn test_bad_header_rejected() {
        assert!(matches!(
            decode_snapshot(b"KT"),
            Err(PersistenceError::InvalidHeader)
        ));
        let mut bytes = encode_snapshot(&sample()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(PersistenceError::InvalidMagic)
        ));
        let mut bytes = encode_snapshot(&sample()).unwrap();
        bytes[4] = 7;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(PersistenceError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRelationStore::new(dir.path());
        fs::write(store.path_for("bob"), b"KTUR\x01garbage").unwrap();
        assert!(store.load("bob").is_err());
    }

    #[test]
    fn test_memory_store_failure_toggle() {
        let store = MemoryRelationStore::new();
        store.set_fail_saves(true);
        assert!(store.save("u", &sample()).is_err());
        store.set_fail_saves(false);
        store.save("u", &sample()).unwrap();
        assert_eq!(store.snapshot("u"), Some(sample()));
    }
}
