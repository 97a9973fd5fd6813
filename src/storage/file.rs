use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use super::crypto::{CryptoEnvelope, SealKey};
use super::{KeyValueStore, Snapshot, WriteBatch};
use crate::error::StoreError;

#[derive(Clone)]
pub enum Codec {
    Plain,
    Encrypted { password: String, iterations: u32 },
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Codec::Plain => f.write_str("Plain"),
            Codec::Encrypted { iterations, .. } => f
                .debug_struct("Encrypted")
                .field("iterations", iterations)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Default)]
struct FileState {
    seal: Option<SealKey>,
}

/// The whole store as one JSON snapshot file, re-read on every access so
/// that separate handles on the same file observe each other's commits.
/// Commits hold an exclusive lock on a sibling `<name>.lock` file from the
/// read through the rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    codec: Codec,
    state: Mutex<FileState>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_codec(path, Codec::Plain)
    }

    pub fn open_encrypted(path: impl Into<PathBuf>, password: &str, iterations: u32) -> Self {
        Self::with_codec(
            path,
            Codec::Encrypted {
                password: password.to_string(),
                iterations,
            },
        )
    }

    pub fn with_codec(path: impl Into<PathBuf>, codec: Codec) -> Self {
        Self {
            path: path.into(),
            codec,
            state: Mutex::new(FileState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.codec, Codec::Encrypted { .. })
    }

    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        self.read_snapshot(&mut state)
    }

    fn lock_path(&self) -> PathBuf {
        sibling(self.path.as_path(), ".lock")
    }

    /// Opens the lock file and blocks until this handle holds it exclusively.
    /// Dropping the returned file releases the lock.
    fn lock_exclusive(&self) -> Result<File, StoreError> {
        let lock_path = self.lock_path();
        ensure_parent_dir(lock_path.as_path())?;
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path.as_path())
            .map_err(|err| StoreError::io(lock_path.as_path(), err))?;
        FileExt::lock_exclusive(&lock_file)
            .map_err(|err| StoreError::io(lock_path.as_path(), err))?;
        Ok(lock_file)
    }

    fn label(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn read_snapshot(&self, state: &mut FileState) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::new());
        }
        let raw = fs::read_to_string(self.path.as_path())
            .map_err(|err| StoreError::io(self.path.as_path(), err))?;
        if raw.trim().is_empty() {
            return Ok(Snapshot::new());
        }

        let plaintext = match &self.codec {
            Codec::Plain => raw,
            Codec::Encrypted {
                password,
                iterations,
            } => {
                let envelope: CryptoEnvelope = serde_json::from_str(raw.as_str())
                    .map_err(|err| StoreError::decode(self.label(), err))?;
                let seal = match state.seal.take() {
                    Some(cached) if cached.matches(&envelope) => cached,
                    _ => SealKey::for_envelope(password.as_str(), &envelope, *iterations)?,
                };
                let text = seal.open(&envelope)?;
                state.seal = Some(seal);
                text
            }
        };

        serde_json::from_str::<Snapshot>(plaintext.as_str())
            .map_err(|err| StoreError::decode(self.label(), err))
    }

    fn write_snapshot(&self, state: &mut FileState, snapshot: &Snapshot) -> Result<(), StoreError> {
        let content = match &self.codec {
            Codec::Plain => serde_json::to_string_pretty(snapshot)?,
            Codec::Encrypted {
                password,
                iterations,
            } => {
                let seal = state
                    .seal
                    .get_or_insert_with(|| SealKey::generate(password.as_str(), *iterations));
                let plaintext = serde_json::to_string(snapshot)?;
                serde_json::to_string(&seal.seal(plaintext.as_str())?)?
            }
        };
        write_atomic(self.path.as_path(), content.as_str())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshot()?.get(key).cloned())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.snapshot()?.keys().cloned().collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let lock_file = self.lock_exclusive()?;
        let mut snapshot = self.read_snapshot(&mut state)?;
        batch.apply_to(&mut snapshot)?;
        self.write_snapshot(&mut state, &snapshot)?;
        drop(lock_file);
        debug!(path = %self.path.display(), ops = batch.ops().len(), "storage batch committed");
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))
        }
        _ => Ok(()),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Writes to a fresh temp file in the same directory, syncs it, then renames
/// it over `path`. A crash leaves either the old or the new snapshot.
fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|err| StoreError::io(dir, err))?;
    tmp.write_all(content.as_bytes())
        .map_err(|err| StoreError::io(tmp.path(), err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| StoreError::io(tmp.path(), err))?;
    tmp.persist(path)
        .map_err(|err| StoreError::io(path, err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_reads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("workerbook.json"));
        assert_eq!(store.get("worker-list").unwrap(), None);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn commit_leaves_only_snapshot_and_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let path = nested.join("workerbook.json");
        let store = FileStore::open(path.as_path());
        store.set("last-app-date", json!("2024-06-01")).unwrap();
        store.set("admin", json!("North Console")).unwrap();

        let mut names: Vec<String> = fs::read_dir(nested.as_path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["workerbook.json", "workerbook.json.lock"]);
    }

    #[test]
    fn unparseable_snapshot_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workerbook.json");
        fs::write(path.as_path(), "[1, 2").unwrap();
        let store = FileStore::open(path.as_path());
        assert!(matches!(store.get("anything"), Err(StoreError::Decode { .. })));
    }

    #[test]
    fn encrypted_file_does_not_contain_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workerbook.enc");
        let store = FileStore::open_encrypted(path.as_path(), "pw", 1_000);
        store.set("admin", json!("North Console")).unwrap();

        let raw = fs::read_to_string(path.as_path()).unwrap();
        assert!(!raw.contains("North Console"));
        assert_eq!(store.get("admin").unwrap(), Some(json!("North Console")));
    }
}
