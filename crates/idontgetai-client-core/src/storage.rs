//! Key/value storage backends tried in order.
//!
//! Browsers can refuse storage outright (privacy modes, sandboxed frames,
//! quota). Each backend reports that as a [`StorageError`] instead of
//! throwing; the chain moves on to the next backend and, when none answers,
//! callers see "absent".

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{backend} is unavailable")]
    Unavailable { backend: &'static str },
    #[error("{backend} rejected the {operation} operation")]
    Rejected {
        backend: &'static str,
        operation: &'static str,
    },
}

pub trait KeyValueStore {
    fn backend_name(&self) -> &'static str;
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// Reads and writes go to the first backend that answers; removals go to all
/// of them so a fallback backend never keeps a record alive.
#[derive(Default)]
pub struct StorageChain {
    backends: Vec<Box<dyn KeyValueStore>>,
}

impl StorageChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_backend(mut self, backend: impl KeyValueStore + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    #[must_use]
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends
            .iter()
            .map(|backend| backend.backend_name())
            .collect()
    }

    pub fn try_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut last_error = None;
        for backend in &self.backends {
            match backend.get_item(key) {
                Ok(value) => return Ok(value),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or(StorageError::Unavailable { backend: "storage" }))
    }

    pub fn try_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut last_error = None;
        for backend in &self.backends {
            match backend.set_item(key, value) {
                Ok(()) => return Ok(()),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or(StorageError::Unavailable { backend: "storage" }))
    }

    /// Best effort read; any failure reads as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!(key, %error, "storage.get_failed");
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        if let Err(error) = self.try_set(key, value) {
            tracing::debug!(key, %error, "storage.set_failed");
        }
    }

    pub fn remove(&self, key: &str) {
        for backend in &self.backends {
            if let Err(error) = backend.remove_item(key) {
                tracing::debug!(key, %error, "storage.remove_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DisabledStore;

    impl KeyValueStore for DisabledStore {
        fn backend_name(&self) -> &'static str {
            "disabled"
        }

        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable {
                backend: "disabled",
            })
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable {
                backend: "disabled",
            })
        }

        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable {
                backend: "disabled",
            })
        }
    }

    #[test]
    fn falls_through_to_next_backend() {
        let chain = StorageChain::new()
            .with_backend(DisabledStore)
            .with_backend(MemoryStore::new());
        chain.set("k", "v");
        assert_eq!(chain.get("k"), Some("v".to_string()));
        assert_eq!(chain.backend_names(), vec!["disabled", "memory"]);
    }

    #[test]
    fn first_available_backend_answers_even_when_empty() {
        let chain = StorageChain::new()
            .with_backend(MemoryStore::new())
            .with_backend(MemoryStore::new());
        assert_eq!(chain.try_get("missing"), Ok(None));
    }

    #[test]
    fn all_backends_disabled_reads_as_absent() {
        let chain = StorageChain::new().with_backend(DisabledStore);
        chain.set("k", "v");
        assert_eq!(chain.get("k"), None);
        assert!(chain.try_set("k", "v").is_err());
        chain.remove("k");
    }

    #[test]
    fn empty_chain_is_unavailable() {
        let chain = StorageChain::new();
        assert_eq!(
            chain.try_get("k"),
            Err(StorageError::Unavailable { backend: "storage" })
        );
    }
}
