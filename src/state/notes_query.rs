use crate::api::ApiErrorKind;
use crate::cache::{QueryCache, QueryKey, QueryPayload, Resource};
use crate::models::{NoteList, NoteTag, NOTES_PER_PAGE};
use crate::search::{SearchDebounce, SEARCH_DEBOUNCE_MS};
use crate::state::AppContext;
use crate::util::now_ms;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::{Arc, Mutex};
use wasm_bindgen::JsCast;

/// Query controller for the notes list slot.
///
/// Responsibilities:
/// - debounce raw search keystrokes into the settled term
/// - assemble the query key and drive the cache/gateway round trip
/// - keep the previous payload visible while the next key loads
/// - suppress late responses for keys the slot has moved away from
///
/// Non-responsibilities:
/// - markup, routing, draft state.
#[derive(Clone)]
pub(crate) struct NotesQueryController {
    app_state: AppContext,
    cache: QueryCache,

    pub page: RwSignal<u32>,
    pub raw_search: RwSignal<String>,
    pub settled_search: RwSignal<String>,
    pub tag: RwSignal<Option<NoteTag>>,

    /// Last payload resolved for this slot; survives key changes until
    /// the new key's fetch lands (no flash-to-empty).
    pub data: RwSignal<Option<NoteList>>,
    /// True only while nothing has ever been shown in the slot.
    pub loading: RwSignal<bool>,
    /// True while any fetch for the current key is outstanding.
    pub fetching: RwSignal<bool>,
    pub error: RwSignal<Option<String>>,

    current_key: Arc<Mutex<Option<QueryKey>>>,
    debounce: Arc<Mutex<SearchDebounce>>,
    debounce_timer: Arc<Mutex<Option<i32>>>,
}

impl NotesQueryController {
    pub fn new(
        app_state: AppContext,
        initial_page: u32,
        initial_search: String,
        initial_tag: Option<NoteTag>,
    ) -> Self {
        let cache = app_state.0.cache.clone();
        Self {
            app_state,
            cache,
            page: RwSignal::new(initial_page.max(1)),
            raw_search: RwSignal::new(initial_search.clone()),
            settled_search: RwSignal::new(initial_search),
            tag: RwSignal::new(initial_tag),
            data: RwSignal::new(None),
            loading: RwSignal::new(true),
            fetching: RwSignal::new(false),
            error: RwSignal::new(None),
            current_key: Arc::new(Mutex::new(None)),
            debounce: Arc::new(Mutex::new(SearchDebounce::default())),
            debounce_timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Called from a tracked effect whenever page/search/tag move.
    pub fn load(&self, page: u32, search: &str, tag: Option<NoteTag>) {
        let key = QueryKey::notes(page, search, tag);

        // Supersede the previous key's flight; its response must be
        // discarded on arrival, not applied to the cache.
        let prev = match self.current_key.lock() {
            Ok(mut current) => current.replace(key.clone()),
            Err(_) => None,
        };
        if let Some(prev) = prev {
            if prev != key {
                self.cache.cancel_in_flight(&prev);
            }
        }

        // A cached entry (fresh or stale) switches the slot atomically.
        // Otherwise the previous payload stays up while we fetch.
        if let Some(entry) = self.cache.lookup(&key) {
            if let Some(list) = entry.payload.as_note_list() {
                self.data.set(Some(list.clone()));
                self.error.set(None);
                self.loading.set(false);
            }
        }

        let Some(ticket) = self.cache.begin_fetch(&key) else {
            // Fresh entry, or an identical request already in flight.
            if !self.cache.is_in_flight(&key) {
                self.fetching.set(false);
            }
            return;
        };

        self.fetching.set(true);
        self.loading.set(self.data.get_untracked().is_none());

        let api = self.app_state.0.api_client.get_untracked();
        let search_term = match &key {
            QueryKey::Notes { search, .. } => search.clone(),
            QueryKey::Note { .. } => None,
        };
        let s2 = self.clone();
        spawn_local(async move {
            let result = api
                .list_notes(page, NOTES_PER_PAGE, search_term.as_deref(), tag)
                .await;

            match result {
                Ok(list) => {
                    let applied = s2.cache.complete_fetch(
                        &ticket,
                        QueryPayload::NoteList(list.clone()),
                        now_ms(),
                    );
                    if applied && s2.is_current(ticket.key()) {
                        s2.data.set(Some(list));
                        s2.error.set(None);
                    }
                }
                Err(e) => {
                    let current = s2.cache.fail_fetch(&ticket) && s2.is_current(ticket.key());
                    if current {
                        s2.error.set(Some(e.to_string()));
                        s2.app_state.0.toast_error("Something went wrong");
                    }
                }
            }

            if s2.is_current(ticket.key()) {
                s2.fetching.set(false);
                s2.loading.set(false);
            }
            s2.app_state.0.cache_revision.update(|v| *v += 1);
        });
    }

    /// Raw keystroke: visible immediately, settled after quiescence.
    pub fn on_search_input(&self, value: String) {
        self.raw_search.set(value.clone());
        if let Ok(mut debounce) = self.debounce.lock() {
            debounce.feed(&value, now_ms());
        }
        self.arm_debounce_timer();
    }

    /// Route tag changed: new filter context, fresh position.
    pub fn set_tag(&self, tag: Option<NoteTag>) {
        self.cancel();
        self.raw_search.set(String::new());
        self.settled_search.set(String::new());
        self.tag.set(tag);
        self.page.set(1);
    }

    pub fn set_page(&self, page: u32) {
        self.page.set(page.max(1));
    }

    /// Non-optimistic delete: the list changes only after the server
    /// confirms, via invalidation + refetch of the current key.
    pub fn delete_note(&self, id: String) {
        let api = self.app_state.0.api_client.get_untracked();
        let s2 = self.clone();
        spawn_local(async move {
            match api.delete_note(&id).await {
                Ok(note) => {
                    s2.cache.invalidate(Resource::Notes);
                    s2.cache.invalidate(Resource::Note);
                    s2.app_state.0.toast_success(format!("Deleted \"{}\"", note.title));
                    s2.reload_current();
                }
                Err(e) => {
                    s2.app_state.0.toast_error(e.to_string());
                    if e.kind == ApiErrorKind::NotFound {
                        // The note is already gone remotely; resync.
                        s2.cache.invalidate(Resource::Notes);
                        s2.reload_current();
                    }
                }
            }
        });
    }

    /// Tears down pending debounce work. Must be called on unmount so
    /// a timer firing after disposal has nothing to update.
    pub fn cancel(&self) {
        if let Ok(mut debounce) = self.debounce.lock() {
            debounce.cancel();
        }
        if let Ok(mut slot) = self.debounce_timer.lock() {
            if let Some(tid) = slot.take() {
                if let Some(win) = web_sys::window() {
                    let _ = win.clear_timeout_with_handle(tid);
                }
            }
        }
    }

    fn reload_current(&self) {
        let page = self.page.get_untracked();
        let search = self.settled_search.get_untracked();
        let tag = self.tag.get_untracked();
        self.load(page, &search, tag);
    }

    fn is_current(&self, key: &QueryKey) -> bool {
        self.current_key
            .lock()
            .map(|current| current.as_ref() == Some(key))
            .unwrap_or(false)
    }

    fn arm_debounce_timer(&self) {
        let Some(win) = web_sys::window() else {
            return;
        };

        if let Ok(mut slot) = self.debounce_timer.lock() {
            if let Some(tid) = slot.take() {
                let _ = win.clear_timeout_with_handle(tid);
            }
        }

        let s2 = self.clone();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            s2.settle_search();
        });
        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                SEARCH_DEBOUNCE_MS as i32,
            )
            .unwrap_or(0);

        if let Ok(mut slot) = self.debounce_timer.lock() {
            *slot = Some(tid);
        }
    }

    fn settle_search(&self) {
        let settled = match self.debounce.lock() {
            Ok(mut debounce) => debounce.try_settle(now_ms()),
            Err(_) => None,
        };

        match settled {
            Some(value) => {
                self.settled_search.set(value);
                // Changing the term invalidates the pagination position.
                self.page.set(1);
            }
            None => {
                // Timer fired ahead of the deadline (clock skew); the
                // pending value is still there, try again shortly.
                let pending = self
                    .debounce
                    .lock()
                    .map(|d| d.has_pending())
                    .unwrap_or(false);
                if pending {
                    self.arm_debounce_timer();
                }
            }
        }
    }
}
