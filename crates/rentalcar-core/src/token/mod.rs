//! Registration token persistence
//!
//! The push platform issues one registration token per installation and may
//! replace it at any time. Only the latest value is kept.

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::TokenConfig;
use crate::error::Result;

/// Holds the current registration token.
///
/// Writes are last-write-wins. A read racing a write sees either the old or
/// the new token. Before the first write `get` returns an empty string.
pub trait TokenStore: Send + Sync {
    /// Current token, or `""` if none has been stored
    fn get(&self) -> String;

    /// Replace the current token
    fn set(&self, token: String) -> Result<()>;
}

/// Build the store described by `config`
pub fn open(config: &TokenConfig) -> Result<Arc<dyn TokenStore>> {
    if config.in_memory {
        return Ok(Arc::new(MemoryTokenStore::new()));
    }

    match config.resolved_path() {
        Some(path) => {
            info!(path = %path.display(), "Using file token store");
            Ok(Arc::new(FileTokenStore::open(path)?))
        }
        None => {
            warn!("No data directory available, token will not survive restarts");
            Ok(Arc::new(MemoryTokenStore::new()))
        }
    }
}
