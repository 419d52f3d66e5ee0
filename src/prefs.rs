//! Durable key/value namespaces.
//!
//! A `Preferences` value names one JSON object on disk. Reads always go back
//! to the file so a writer in another process is observed immediately, and
//! commits replace the whole file through a temp file + rename so readers
//! never see a half-written namespace. Writers serialize on an advisory lock
//! held on a `.lock` file next to the namespace, from the load to the rename.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fd_lock::RwLock;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to write preferences {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to lock preferences {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

type Entries = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
}

impl Preferences {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.load().contains_key(key)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.load()
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.load()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub fn edit(&self) -> Editor<'_> {
        Editor {
            prefs: self,
            changes: Vec::new(),
            held: false,
        }
    }

    /// Runs `f` while holding this namespace's write lock, so a read and the
    /// commit that follows it cannot interleave with another writer.
    pub fn locked<T, E>(&self, f: impl FnOnce(&Locked<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<PrefsError>,
    {
        let mut lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock.write().map_err(|source| self.lock_error(source))?;
        f(&Locked { prefs: self })
    }

    fn open_lock_file(&self) -> Result<File, PrefsError> {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        let path = PathBuf::from(name);
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|err| self.lock_error(err))?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| self.lock_error(source))
    }

    fn lock_error(&self, source: io::Error) -> PrefsError {
        PrefsError::Lock {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Entries {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = ?self.path, "unreadable preferences: {err}");
                }
                return Entries::new();
            }
        };
        if content.trim().is_empty() {
            return Entries::new();
        }
        match serde_json::from_str::<Entries>(&content) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = ?self.path, "corrupt preferences, treating as empty: {err}");
                Entries::new()
            }
        }
    }

    fn store(&self, entries: &Entries) -> Result<(), PrefsError> {
        let json = serde_json::to_vec_pretty(entries)?;
        atomic_write(&self.path, &json).map_err(|source| PrefsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// A namespace whose write lock is held; commits made through it do not lock
/// again.
pub struct Locked<'a> {
    prefs: &'a Preferences,
}

impl Locked<'_> {
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.prefs.get_string(key)
    }

    pub fn edit(&self) -> Editor<'_> {
        Editor {
            prefs: self.prefs,
            changes: Vec::new(),
            held: true,
        }
    }
}

enum Change {
    Put(String, Value),
    Remove(String),
}

/// Batches changes to a namespace; nothing touches disk until `commit`.
pub struct Editor<'a> {
    prefs: &'a Preferences,
    changes: Vec<Change>,
    held: bool,
}

impl Editor<'_> {
    pub fn put_bool(mut self, key: &str, value: bool) -> Self {
        self.changes
            .push(Change::Put(key.to_owned(), Value::Bool(value)));
        self
    }

    pub fn put_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.changes
            .push(Change::Put(key.to_owned(), Value::String(value.into())));
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.changes.push(Change::Remove(key.to_owned()));
        self
    }

    pub fn commit(self) -> Result<(), PrefsError> {
        let prefs = self.prefs;
        if self.held {
            self.apply()
        } else {
            prefs.locked(|_| self.apply())
        }
    }

    fn apply(self) -> Result<(), PrefsError> {
        let mut entries = self.prefs.load();
        for change in self.changes {
            match change {
                Change::Put(key, value) => {
                    entries.insert(key, value);
                }
                Change::Remove(key) => {
                    entries.remove(&key);
                }
            }
        }
        self.prefs.store(&entries)
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_defaults() {
        let dir = tempdir().unwrap();
        let prefs = Preferences::open(dir.path().join("nope.json"));
        assert!(!prefs.get_bool("flag", false));
        assert!(prefs.get_bool("flag", true));
        assert_eq!(prefs.get_string("key"), None);
        assert!(!prefs.contains("key"));
    }

    #[test]
    fn commit_then_read_back() {
        let dir = tempdir().unwrap();
        let prefs = Preferences::open(dir.path().join("nested").join("p.json"));
        prefs
            .edit()
            .put_bool("enabled", true)
            .put_string("items", "[]")
            .commit()
            .unwrap();
        assert!(prefs.get_bool("enabled", false));
        assert_eq!(prefs.get_string("items").as_deref(), Some("[]"));

        prefs.edit().remove("items").commit().unwrap();
        assert!(!prefs.contains("items"));
        // unrelated keys survive
        assert!(prefs.get_bool("enabled", false));
    }

    #[test]
    fn second_handle_sees_writes_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let writer = Preferences::open(&path);
        let reader = Preferences::open(&path);
        writer.edit().put_string("k", "v1").commit().unwrap();
        assert_eq!(reader.get_string("k").as_deref(), Some("v1"));
        writer.edit().put_string("k", "v2").commit().unwrap();
        assert_eq!(reader.get_string("k").as_deref(), Some("v2"));
    }

    #[test]
    fn corrupt_file_reads_empty_and_is_replaced_on_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let prefs = Preferences::open(&path);
        assert_eq!(prefs.get_string("k"), None);
        assert!(!prefs.get_bool("flag", false));

        prefs.edit().put_bool("flag", true).commit().unwrap();
        assert!(prefs.get_bool("flag", false));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<Entries>(&raw).is_ok());
    }

    #[test]
    fn concurrent_commits_to_different_keys_all_land() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let writers: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|key| {
                let prefs = Preferences::open(&path);
                std::thread::spawn(move || {
                    for n in 0..25 {
                        let value = n.to_string();
                        prefs.edit().put_string(key, value).commit().unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        let prefs = Preferences::open(&path);
        for key in ["a", "b", "c", "d"] {
            assert_eq!(prefs.get_string(key).as_deref(), Some("24"));
        }
    }

    #[test]
    fn locked_read_modify_write_is_not_interleaved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let prefs = Preferences::open(&path);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        prefs
                            .locked(|locked| {
                                let n: u32 = locked
                                    .get_string("n")
                                    .and_then(|raw| raw.parse().ok())
                                    .unwrap_or(0);
                                locked.edit().put_string("n", (n + 1).to_string()).commit()
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        let prefs = Preferences::open(&path);
        assert_eq!(prefs.get_string("n").as_deref(), Some("80"));
        assert!(dir.path().join("counter.json.lock").exists());
    }

    #[test]
    fn wrong_type_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let prefs = Preferences::open(dir.path().join("p.json"));
        prefs.edit().put_string("flag", "yes").commit().unwrap();
        assert!(!prefs.get_bool("flag", false));
        prefs.edit().put_bool("text", true).commit().unwrap();
        assert_eq!(prefs.get_string("text"), None);
    }
}
