use crate::models::NoteTag;
use crate::storage::{
    load_string_from_storage, remove_from_storage, save_string_to_storage, NOTE_DRAFT_KEY,
};
use serde::{Deserialize, Serialize};

/// In-progress note, local-only: no id, no timestamps. Survives page
/// reloads until submitted or explicitly discarded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct NoteDraft {
    pub title: String,
    pub content: String,
    pub tag: NoteTag,
}

impl Default for NoteDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            tag: NoteTag::Todo,
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Clone, Debug, Default)]
pub(crate) struct DraftPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tag: Option<NoteTag>,
}

impl NoteDraft {
    pub fn merged(mut self, patch: DraftPatch) -> Self {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(tag) = patch.tag {
            self.tag = tag;
        }
        self
    }
}

/// Durable medium for the serialized draft. The store only ever sees a
/// JSON string, so any medium works (localStorage in the browser, a
/// plain cell in tests).
pub(crate) trait DraftBackend {
    fn load(&self) -> Option<String>;
    fn store(&self, json: &str);
    fn remove(&self);
}

pub(crate) struct LocalStorageBackend;

impl DraftBackend for LocalStorageBackend {
    fn load(&self) -> Option<String> {
        load_string_from_storage(NOTE_DRAFT_KEY)
    }

    fn store(&self, json: &str) {
        save_string_to_storage(NOTE_DRAFT_KEY, json);
    }

    fn remove(&self) {
        remove_from_storage(NOTE_DRAFT_KEY);
    }
}

/// Persisted draft store: in-memory state initialized from the backend
/// at open, written back synchronously on every update. Performs no
/// validation; that stays with the form layer.
pub(crate) struct DraftStore<B: DraftBackend> {
    backend: B,
    current: NoteDraft,
}

impl<B: DraftBackend> DraftStore<B> {
    pub fn open(backend: B) -> Self {
        let current = backend
            .load()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default();
        Self { backend, current }
    }

    pub fn get(&self) -> NoteDraft {
        self.current.clone()
    }

    pub fn set(&mut self, patch: DraftPatch) -> NoteDraft {
        self.current = self.current.clone().merged(patch);
        self.persist();
        self.current.clone()
    }

    pub fn clear(&mut self) -> NoteDraft {
        self.current = NoteDraft::default();
        self.backend.remove();
        self.current.clone()
    }

    fn persist(&self) {
        if let Ok(json) = serde_json::to_string(&self.current) {
            self.backend.store(&json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared cell standing in for localStorage; cloning the backend
    /// simulates a reload against the same durable record.
    #[derive(Clone, Default)]
    struct MemoryBackend {
        cell: Rc<RefCell<Option<String>>>,
    }

    impl DraftBackend for MemoryBackend {
        fn load(&self) -> Option<String> {
            self.cell.borrow().clone()
        }

        fn store(&self, json: &str) {
            *self.cell.borrow_mut() = Some(json.to_string());
        }

        fn remove(&self) {
            *self.cell.borrow_mut() = None;
        }
    }

    #[test]
    fn test_open_without_record_yields_defaults() {
        let store = DraftStore::open(MemoryBackend::default());
        assert_eq!(store.get(), NoteDraft::default());
        assert_eq!(store.get().tag, NoteTag::Todo);
    }

    #[test]
    fn test_set_merges_and_survives_reload() {
        let backend = MemoryBackend::default();

        let mut store = DraftStore::open(backend.clone());
        store.set(DraftPatch {
            title: Some("A".to_string()),
            ..Default::default()
        });
        store.set(DraftPatch {
            tag: Some(NoteTag::Shopping),
            ..Default::default()
        });

        // Simulated reload: a fresh store over the same record.
        let reopened = DraftStore::open(backend);
        assert_eq!(reopened.get().title, "A");
        assert_eq!(reopened.get().tag, NoteTag::Shopping);
        assert_eq!(reopened.get().content, "");
    }

    #[test]
    fn test_partial_patch_keeps_other_fields() {
        let mut store = DraftStore::open(MemoryBackend::default());
        store.set(DraftPatch {
            title: Some("Groceries".to_string()),
            content: Some("milk".to_string()),
            tag: Some(NoteTag::Shopping),
        });
        store.set(DraftPatch {
            content: Some("milk, eggs".to_string()),
            ..Default::default()
        });

        let draft = store.get();
        assert_eq!(draft.title, "Groceries");
        assert_eq!(draft.content, "milk, eggs");
        assert_eq!(draft.tag, NoteTag::Shopping);
    }

    #[test]
    fn test_clear_resets_to_defaults_and_clears_record() {
        let backend = MemoryBackend::default();
        let mut store = DraftStore::open(backend.clone());
        store.set(DraftPatch {
            title: Some("A".to_string()),
            ..Default::default()
        });

        store.clear();
        assert_eq!(store.get(), NoteDraft::default());
        // The cleared state does not survive a reload as old data.
        let reopened = DraftStore::open(backend);
        assert_eq!(reopened.get(), NoteDraft::default());
    }

    #[test]
    fn test_corrupt_record_falls_back_to_defaults() {
        let backend = MemoryBackend::default();
        backend.store("{not json");
        let store = DraftStore::open(backend);
        assert_eq!(store.get(), NoteDraft::default());
    }
}
