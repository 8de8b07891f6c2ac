use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Where per-user log keys are kept.
pub trait KeyStore: Send + Sync {
    fn logkey(&self, user: u64, canvas: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<(u64, String), String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any key already stored for the pair.
    pub fn insert(&self, user: u64, canvas: impl Into<String>, key: impl Into<String>) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((user, canvas.into()), key.into());
    }
}

impl KeyStore for MemoryKeyStore {
    fn logkey(&self, user: u64, canvas: &str) -> Option<String> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(user, canvas.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_per_user_and_canvas() {
        let store = MemoryKeyStore::new();
        store.insert(1, "76", "first");
        store.insert(1, "76", "second");
        store.insert(2, "76", "other");

        assert_eq!(store.logkey(1, "76").as_deref(), Some("second"));
        assert_eq!(store.logkey(1, "77"), None);
        assert_eq!(store.logkey(2, "76").as_deref(), Some("other"));
        assert_eq!(store.logkey(3, "76"), None);
    }
}
