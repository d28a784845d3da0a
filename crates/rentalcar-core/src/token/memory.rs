//! In-memory token store

use parking_lot::RwLock;

use super::TokenStore;
use crate::error::Result;

/// Token store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<String>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> String {
        self.token.read().clone()
    }

    fn set(&self, token: String) -> Result<()> {
        *self.token.write() = token;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_before_first_write() {
        assert_eq!(MemoryTokenStore::new().get(), "");
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryTokenStore::new();
        store.set("first".to_string()).unwrap();
        store.set("second".to_string()).unwrap();

        assert_eq!(store.get(), "second");
    }

    #[test]
    fn test_concurrent_reads_see_old_or_new() {
        let store = Arc::new(MemoryTokenStore::new());
        store.set("old".to_string()).unwrap();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || store.set("new".to_string()).unwrap())
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.get())
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            let seen = reader.join().unwrap();
            assert!(seen == "old" || seen == "new");
        }
        assert_eq!(store.get(), "new");
    }
}
