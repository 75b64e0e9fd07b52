use std::sync::Mutex;

use uuid::Uuid;

/// Session identity, stable for the lifetime of the process.
///
/// Lazily generated on first read and never rotated afterwards; a fresh
/// process gets a fresh id, the way a fresh browser tab would.
#[derive(Debug, Default)]
pub(crate) struct SessionStore {
    id: Mutex<Option<String>>,
}

impl SessionStore {
    pub(crate) fn id(&self) -> String {
        let mut slot = self.id.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert_with(|| Uuid::new_v4().to_string()).clone()
    }

    /// Drop the stored id, modeling a brand-new session.
    #[cfg(test)]
    pub(crate) fn clear(&self) {
        *self.id.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_across_reads() {
        let store = SessionStore::default();
        assert_eq!(store.id(), store.id());
    }

    #[test]
    fn clearing_yields_a_different_id() {
        let store = SessionStore::default();
        let first = store.id();
        store.clear();
        let second = store.id();
        assert_ne!(first, second);
    }
}
