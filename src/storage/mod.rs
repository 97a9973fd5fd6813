pub mod crypto;
pub mod file;
pub mod memory;

use std::path::{Component, PathBuf};

use serde_json::Value;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;

const MAX_KEY_LEN: usize = 200;

/// Whole-store contents, in insertion order.
pub type Snapshot = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { key: String, value: Value },
    Remove { key: String },
}

/// Applies only while `key` still holds `expected` (`None` meaning absent).
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub key: String,
    pub expected: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    guard: Option<Guard>,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guarded(key: impl Into<String>, expected: Option<Value>) -> Self {
        Self {
            guard: Some(Guard {
                key: key.into(),
                expected,
            }),
            ops: Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            key: key.into(),
            value,
        });
        self
    }

    pub fn remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Remove { key: key.into() });
        self
    }

    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    pub fn ops(&self) -> &[WriteOp] {
        self.ops.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks the guard, then applies every op. `snapshot` is untouched on `Conflict`.
    pub(crate) fn apply_to(&self, snapshot: &mut Snapshot) -> Result<(), StoreError> {
        if let Some(guard) = &self.guard {
            if snapshot.get(guard.key.as_str()) != guard.expected.as_ref() {
                return Err(StoreError::Conflict {
                    key: guard.key.clone(),
                });
            }
        }
        for op in &self.ops {
            match op {
                WriteOp::Set { key, value } => {
                    snapshot.insert(key.clone(), value.clone());
                }
                WriteOp::Remove { key } => {
                    snapshot.shift_remove(key.as_str());
                }
            }
        }
        Ok(())
    }
}

/// Narrow persisted key-value interface shared by every backend.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Applies the batch atomically: either every op lands or none does.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set(key, value);
        self.commit(batch)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.remove(key);
        self.commit(batch)
    }
}

pub fn sanitize_relative_path(value: &str) -> Result<PathBuf, StoreError> {
    let mut out = PathBuf::new();
    for component in PathBuf::from(value).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(StoreError::InvalidName(value.to_string())),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(StoreError::InvalidName(value.to_string()));
    }
    Ok(out)
}

/// Validates a key coming from outside the process (CLI, desktop frontend).
pub fn sanitize_key(value: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.chars().count() > MAX_KEY_LEN
        || trimmed.chars().any(|ch| ch.is_control())
    {
        return Err(StoreError::InvalidName(value.to_string()));
    }
    Ok(trimmed.to_string())
}
