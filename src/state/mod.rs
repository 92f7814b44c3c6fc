pub(crate) mod notes_query;

use crate::api::ApiClient;
use crate::cache::{boot_snapshot, hydrate, QueryCache};
use crate::drafts::{DraftPatch, DraftStore, LocalStorageBackend, NoteDraft};
use leptos::prelude::*;
use std::sync::{Arc, Mutex};
use wasm_bindgen::JsCast;

const TOAST_DISMISS_MS: i32 = 3500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ToastKind {
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub(crate) struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub api_client: RwSignal<ApiClient>,

    /// Process-wide query cache, one long-lived instance per client
    /// session. Seeded from the server snapshot before any component
    /// reads it.
    pub cache: QueryCache,

    /// Bumped after every fetch completion. Effects that were denied a
    /// ticket (request de-duplication) track this so they re-read the
    /// cache once the shared flight lands.
    pub cache_revision: RwSignal<u64>,

    /// Mirror of the draft store for reactive reads; writes go through
    /// `set_draft`/`clear_draft` so the durable record stays in sync.
    pub draft: RwSignal<NoteDraft>,
    draft_store: Arc<Mutex<DraftStore<LocalStorageBackend>>>,

    pub toasts: RwSignal<Vec<Toast>>,
    next_toast_id: Arc<Mutex<u64>>,
}

impl AppState {
    pub fn new() -> Self {
        let cache = QueryCache::new();
        if let Some(snapshot) = boot_snapshot() {
            hydrate(&cache, snapshot);
        }

        let draft_store = DraftStore::open(LocalStorageBackend);
        let draft = RwSignal::new(draft_store.get());

        Self {
            api_client: RwSignal::new(ApiClient::from_env()),
            cache,
            cache_revision: RwSignal::new(0),
            draft,
            draft_store: Arc::new(Mutex::new(draft_store)),
            toasts: RwSignal::new(vec![]),
            next_toast_id: Arc::new(Mutex::new(0)),
        }
    }

    pub fn set_draft(&self, patch: DraftPatch) {
        if let Ok(mut store) = self.draft_store.lock() {
            let merged = store.set(patch);
            self.draft.set(merged);
        }
    }

    pub fn clear_draft(&self) {
        if let Ok(mut store) = self.draft_store.lock() {
            let cleared = store.clear();
            self.draft.set(cleared);
        }
    }

    pub fn toast_success(&self, message: impl Into<String>) {
        self.push_toast(ToastKind::Success, message.into());
    }

    pub fn toast_error(&self, message: impl Into<String>) {
        self.push_toast(ToastKind::Error, message.into());
    }

    pub fn dismiss_toast(&self, id: u64) {
        self.toasts.update(|toasts| toasts.retain(|t| t.id != id));
    }

    fn push_toast(&self, kind: ToastKind, message: String) {
        let id = match self.next_toast_id.lock() {
            Ok(mut next) => {
                *next += 1;
                *next
            }
            Err(_) => return,
        };

        self.toasts.update(|toasts| {
            toasts.push(Toast { id, kind, message });
        });

        // Transient: drop off on a timer.
        let Some(win) = web_sys::window() else {
            return;
        };
        let toasts = self.toasts;
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            toasts.update(|list| list.retain(|t| t.id != id));
        });
        let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            TOAST_DISMISS_MS,
        );
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
