//! File-backed token store

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TokenStore;
use crate::error::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    token: String,
}

/// Token store persisted as a small JSON document.
///
/// The value is cached in memory; writes go to a temporary file that is then
/// renamed over the original, so the file never holds a partial token.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<String>,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading the token if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let token = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<TokenFile>(&contents)?.token,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), has_token = !token.is_empty(), "Opened token store");

        Ok(Self {
            path,
            cached: RwLock::new(token),
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_vec(&TokenFile {
            token: token.to_string(),
        })?;
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Token(format!("failed to replace {}: {e}", self.path.display())))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> String {
        self.cached.read().clone()
    }

    fn set(&self, token: String) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.persist(&token)?;
        *self.cached.write() = token;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::open(dir.path().join("token.json")).unwrap();

        assert_eq!(store.get(), "");
    }

    #[test]
    fn test_token_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.set("abc".to_string()).unwrap();
        store.set("def".to_string()).unwrap();
        drop(store);

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(reopened.get(), "def");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileTokenStore::open(&path),
            Err(Error::Serialization(_))
        ));
    }
}
