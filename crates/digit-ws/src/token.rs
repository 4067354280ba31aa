//! Injected credential storage.
//!
//! The client only consumes an opaque bearer token; how it is produced
//! and where it persists is the caller's concern. The trait replaces the
//! browser key-value storage the dashboard origin leaned on.

use parking_lot::RwLock;

/// Storage for the session's bearer token.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    fn remove(&self);
}

/// In-memory token store, good for the life of a session.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn set(&self, token: &str) {
        *self.token.write() = Some(token.to_string());
    }

    fn remove(&self) {
        *self.token.write() = None;
    }
}
