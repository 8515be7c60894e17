use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

// Fixed keys of the persisted layout
pub const KEY_VISITS_ACTIVE: &str = "visits_active";
pub const KEY_VISITS_ARCHIVED: &str = "visits_archived";
pub const KEY_HOTELS: &str = "hotels";
pub const KEY_METADATA: &str = "metadata";
pub const KEY_EMAIL_HISTORY: &str = "email_history";
pub const KEY_EMAIL_TEMPLATES: &str = "email_templates";

const FILE_EXT: &str = "json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("quota exceeded writing '{key}': {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { key: String, needed: u64, quota: u64 },

    #[error("poisoned lock")]
    Poisoned,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// String-keyed, whole-value store. A `set` either replaces the whole value
/// or leaves the previous one untouched.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
    /// Bytes currently held, counting keys and values.
    fn used_bytes(&self) -> Result<u64, StorageError>;
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;

        if let Some(quota) = self.quota {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = others + entry_size(key, value);
            if needed > quota {
                return Err(StorageError::QuotaExceeded { key: key.to_string(), needed, quota });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn used_bytes(&self) -> Result<u64, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.iter().map(|(k, v)| entry_size(k, v)).sum())
    }
}

/// Directory-backed store: one `<key>.json` file per key.
#[derive(Debug)]
pub struct FileStore {
    pub dir: PathBuf,
    quota: Option<u64>,
    strict_durability: bool,
    // Serializes quota accounting with the write that follows it
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(dir: &Path, quota: Option<u64>, strict_durability: bool) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            quota,
            strict_durability,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(key), FILE_EXT))
    }

    fn stored_entries(&self) -> io::Result<Vec<(String, u64)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Some(key) = decode_key(stem) else { continue };
            out.push((key, entry.metadata()?.len()));
        }
        Ok(out)
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        if let Some(quota) = self.quota {
            let others: u64 = self
                .stored_entries()?
                .iter()
                .filter(|(k, _)| k != key)
                .map(|(k, len)| k.len() as u64 + len)
                .sum();
            let needed = others + entry_size(key, value);
            if needed > quota {
                return Err(StorageError::QuotaExceeded { key: key.to_string(), needed, quota });
            }
        }

        // Write-then-rename keeps a single key all-or-nothing
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(value.as_bytes())?;
            if self.strict_durability {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.stored_entries()?.into_iter().map(|(k, _)| k).collect();
        keys.sort();
        Ok(keys)
    }

    fn used_bytes(&self) -> Result<u64, StorageError> {
        Ok(self.stored_entries()?.iter().map(|(k, len)| k.len() as u64 + len).sum())
    }
}

/// Keys map to file stems; anything outside `[A-Za-z0-9_-]` is `%XX`-escaped.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn decode_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(20);
        store.set("a", "0123456789").unwrap();

        let err = store.set("b", "0123456789").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 22, quota: 20, .. }));

        // Overwriting an existing key only counts the new value
        store.set("a", "012345678901234567").unwrap();
        assert_eq!(store.used_bytes().unwrap(), 19);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), None, true).unwrap();

        assert_eq!(store.get(KEY_HOTELS).unwrap(), None);
        store.set(KEY_HOTELS, "[]").unwrap();
        store.set("odd key/1", "{}").unwrap();
        assert_eq!(store.get(KEY_HOTELS).unwrap().as_deref(), Some("[]"));
        assert_eq!(store.keys().unwrap(), vec!["hotels".to_string(), "odd key/1".to_string()]);

        store.remove(KEY_HOTELS).unwrap();
        store.remove(KEY_HOTELS).unwrap();
        assert_eq!(store.get(KEY_HOTELS).unwrap(), None);
    }

    #[test]
    fn test_file_store_quota_leaves_old_value() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), Some(32), false).unwrap();

        store.set("k", "small").unwrap();
        assert!(store.set("k", &"x".repeat(64)).is_err());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }

    #[test]
    fn test_key_encoding() {
        assert_eq!(encode_key("visits_active"), "visits_active");
        assert_eq!(encode_key("a b"), "a%20b");
        assert_eq!(decode_key("a%20b").as_deref(), Some("a b"));
        assert_eq!(decode_key("bad%2"), None);
    }
}
