use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Durable key/value backing for session fields. Each field lives under its own key so a
/// partial read during startup leaves the other fields intact.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("session key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("session storage unavailable: {0}")]
    Unavailable(String),
}

pub trait SessionPersistence: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, PersistError>;
    /// Writing an empty value removes the key; absence and empty are equivalent.
    fn save(&self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove(&self, key: &str) -> Result<(), PersistError>;
}

/// One small file per key under a directory.
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    fn key_path(&self, key: &str) -> PathBuf {
        let safe: String = key.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect();
        self.dir.join(safe)
    }
}

impl SessionPersistence for FilePersistence {
    fn load(&self, key: &str) -> Result<Option<String>, PersistError> {
        match std::fs::read_to_string(self.key_path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::Io { key: key.to_string(), source }),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistError> {
        if value.is_empty() { return self.remove(key); }
        let io = |source| PersistError::Io { key: key.to_string(), source };
        std::fs::create_dir_all(&self.dir).map_err(io)?;
        // write-then-rename so a crash never leaves a half-written credential
        let path = self.key_path(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value.as_bytes()).map_err(io)?;
        std::fs::rename(&tmp, &path).map_err(io)
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        match std::fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistError::Io { key: key.to_string(), source }),
        }
    }
}

/// Process-local persistence; can be told to fail writes to exercise degraded paths.
#[derive(Default)]
pub struct MemoryPersistence {
    map: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self { Self::default() }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let m = Self::default();
        {
            let mut map = m.map.lock();
            for (k, v) in entries { map.insert(k.to_string(), v.to_string()); }
        }
        m
    }

    pub fn set_fail_writes(&self, fail: bool) { self.fail_writes.store(fail, Ordering::SeqCst); }

    pub fn get(&self, key: &str) -> Option<String> { self.map.lock().get(key).cloned() }

    pub fn len(&self) -> usize { self.map.lock().len() }

    pub fn is_empty(&self) -> bool { self.map.lock().is_empty() }
}

impl SessionPersistence for MemoryPersistence {
    fn load(&self, key: &str) -> Result<Option<String>, PersistError> { Ok(self.map.lock().get(key).cloned()) }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) { return Err(PersistError::Unavailable("writes disabled".into())); }
        if value.is_empty() { self.map.lock().remove(key); } else { self.map.lock().insert(key.to_string(), value.to_string()); }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) { return Err(PersistError::Unavailable("writes disabled".into())); }
        self.map.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_roundtrip_and_empty_removes() {
        let tmp = tempdir().unwrap();
        let p = FilePersistence::new(tmp.path().join("session"));
        assert_eq!(p.load("complaint_token").unwrap(), None);
        p.save("complaint_token", "tok-1").unwrap();
        assert_eq!(p.load("complaint_token").unwrap().as_deref(), Some("tok-1"));
        p.save("complaint_token", "").unwrap();
        assert_eq!(p.load("complaint_token").unwrap(), None);
        p.remove("complaint_token").unwrap();
    }

    #[test]
    fn memory_write_failures_are_reported() {
        let m = MemoryPersistence::new();
        m.set_fail_writes(true);
        assert!(matches!(m.save("k", "v"), Err(PersistError::Unavailable(_))));
        m.set_fail_writes(false);
        m.save("k", "v").unwrap();
        assert_eq!(m.get("k").as_deref(), Some("v"));
    }
}
