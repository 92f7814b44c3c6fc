use crate::models::{Note, NoteList, NoteTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Resource component of a query key; `invalidate` operates at this
/// granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Resource {
    Notes,
    Note,
}

/// Fingerprint of one server request shape. Two identical keys always
/// resolve to the same cache entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub(crate) enum QueryKey {
    Notes {
        page: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<NoteTag>,
    },
    Note {
        id: String,
    },
}

impl QueryKey {
    /// Blank search normalizes to "absent" here so keys built on the
    /// server and on the client always agree.
    pub fn notes(page: u32, search: &str, tag: Option<NoteTag>) -> Self {
        let search = search.trim();
        Self::Notes {
            page,
            search: if search.is_empty() {
                None
            } else {
                Some(search.to_string())
            },
            tag,
        }
    }

    pub fn note(id: &str) -> Self {
        Self::Note { id: id.to_string() }
    }

    pub fn resource(&self) -> Resource {
        match self {
            Self::Notes { .. } => Resource::Notes,
            Self::Note { .. } => Resource::Note,
        }
    }
}

/// Result payload stored under a key, tagged for the hydration
/// snapshot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum QueryPayload {
    NoteList(NoteList),
    Note(Note),
}

impl QueryPayload {
    pub fn as_note_list(&self) -> Option<&NoteList> {
        match self {
            Self::NoteList(list) => Some(list),
            Self::Note(_) => None,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Self::Note(note) => Some(note),
            Self::NoteList(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CacheEntry {
    pub payload: QueryPayload,
    pub fetched_ms: i64,
    pub stale: bool,
}

/// Names one granted fetch. Completion applies only while the ticket
/// still identifies the key's current flight.
#[derive(Debug)]
pub(crate) struct FetchTicket {
    key: QueryKey,
    id: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<QueryKey, CacheEntry>,
    in_flight: HashMap<QueryKey, u64>,
    next_ticket: u64,
}

/// Client-side query cache. An explicitly constructed, cloneable
/// handle: one long-lived instance per client session, one fresh
/// instance per server-rendered request. Holds no async machinery —
/// callers run the network call between `begin_fetch` and
/// `complete_fetch`/`fail_fetch`.
#[derive(Clone, Default)]
pub(crate) struct QueryCache {
    inner: Arc<Mutex<Inner>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &QueryKey) -> Option<CacheEntry> {
        let inner = self.inner.lock().ok()?;
        inner.entries.get(key).cloned()
    }

    /// Registers a fetch for `key` and returns its ticket, unless one
    /// is already in flight (de-duplication) or the entry is fresh
    /// (nothing to do).
    pub fn begin_fetch(&self, key: &QueryKey) -> Option<FetchTicket> {
        let mut inner = self.inner.lock().ok()?;

        if inner.in_flight.contains_key(key) {
            return None;
        }
        if let Some(entry) = inner.entries.get(key) {
            if !entry.stale {
                return None;
            }
        }

        inner.next_ticket += 1;
        let id = inner.next_ticket;
        inner.in_flight.insert(key.clone(), id);
        Some(FetchTicket {
            key: key.clone(),
            id,
        })
    }

    /// Applies a fetched payload. Returns false (and discards the
    /// payload) when the ticket's flight was superseded or cancelled
    /// before the response arrived.
    pub fn complete_fetch(&self, ticket: &FetchTicket, payload: QueryPayload, now_ms: i64) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };

        if inner.in_flight.get(&ticket.key) != Some(&ticket.id) {
            return false;
        }

        inner.in_flight.remove(&ticket.key);
        inner.entries.insert(
            ticket.key.clone(),
            CacheEntry {
                payload,
                fetched_ms: now_ms,
                stale: false,
            },
        );
        true
    }

    /// Clears the flight on failure so the next `begin_fetch` can
    /// retry. Returns false when the flight was already superseded.
    pub fn fail_fetch(&self, ticket: &FetchTicket) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.in_flight.get(&ticket.key) != Some(&ticket.id) {
            return false;
        }
        inner.in_flight.remove(&ticket.key);
        true
    }

    /// Invalidates the outstanding flight for a key, if any. The
    /// transport request keeps running; its response is discarded on
    /// arrival. Used when a view slot moves to a different key.
    pub fn cancel_in_flight(&self, key: &QueryKey) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.in_flight.remove(key);
        }
    }

    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.in_flight.contains_key(key))
            .unwrap_or(false)
    }

    /// Marks every entry of the resource stale; each stale entry
    /// refetches on its next `begin_fetch`. Idempotent.
    pub fn invalidate(&self, resource: Resource) {
        if let Ok(mut inner) = self.inner.lock() {
            for (key, entry) in inner.entries.iter_mut() {
                if key.resource() == resource {
                    entry.stale = true;
                }
            }
        }
    }

    /// Direct insert of a fresh entry, bypassing fetch scheduling.
    /// Used by server prefetch and client hydration.
    pub fn insert(&self, key: QueryKey, payload: QueryPayload, now_ms: i64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.insert(
                key,
                CacheEntry {
                    payload,
                    fetched_ms: now_ms,
                    stale: false,
                },
            );
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Fresh entries only, for dehydration.
    pub fn snapshot_fresh(&self) -> Vec<(QueryKey, CacheEntry)> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .entries
                    .iter()
                    .filter(|(_, e)| !e.stale)
                    .map(|(k, e)| (k.clone(), e.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_payload(titles: &[&str], total_pages: u32) -> QueryPayload {
        QueryPayload::NoteList(NoteList {
            notes: titles
                .iter()
                .map(|t| Note {
                    id: format!("id-{t}"),
                    title: t.to_string(),
                    content: String::new(),
                    tag: NoteTag::Todo,
                    created_at: String::new(),
                })
                .collect(),
            total_pages,
        })
    }

    #[test]
    fn test_blank_search_normalizes_to_absent() {
        assert_eq!(
            QueryKey::notes(1, "", None),
            QueryKey::notes(1, "   ", None)
        );
        assert_ne!(
            QueryKey::notes(1, "x", None),
            QueryKey::notes(1, "", None)
        );
    }

    #[test]
    fn test_dedup_single_flight_per_key() {
        let cache = QueryCache::new();
        let key = QueryKey::notes(1, "", None);

        let ticket = cache.begin_fetch(&key).expect("first fetch granted");
        // A concurrent caller for the same key gets no ticket: exactly
        // one network request is observed.
        assert!(cache.begin_fetch(&key).is_none());

        assert!(cache.complete_fetch(&ticket, list_payload(&["a"], 1), 100));
        let entry = cache.lookup(&key).expect("entry present");
        assert!(!entry.stale);
        assert_eq!(entry.fetched_ms, 100);

        // Fresh entry: no refetch.
        assert!(cache.begin_fetch(&key).is_none());
    }

    #[test]
    fn test_superseded_response_discarded_on_arrival() {
        let cache = QueryCache::new();
        let k1 = QueryKey::notes(1, "old", None);

        let ticket = cache.begin_fetch(&k1).expect("fetch granted");
        // User moves to a different key before k1 resolves.
        cache.cancel_in_flight(&k1);

        assert!(!cache.complete_fetch(&ticket, list_payload(&["late"], 1), 50));
        assert!(cache.lookup(&k1).is_none());
        // The key can be fetched again later.
        assert!(cache.begin_fetch(&k1).is_some());
    }

    #[test]
    fn test_previous_entry_survives_while_new_key_fetches() {
        let cache = QueryCache::new();
        let k1 = cache_key_page(1);
        let k2 = cache_key_page(2);

        let t1 = cache.begin_fetch(&k1).expect("granted");
        assert!(cache.complete_fetch(&t1, list_payload(&["p1"], 2), 10));

        // k2's fetch is pending; k1's payload is untouched, so the
        // renderer can keep showing it.
        let _t2 = cache.begin_fetch(&k2).expect("granted");
        let prev = cache.lookup(&k1).expect("previous entry kept");
        assert_eq!(
            prev.payload.as_note_list().map(|l| l.notes[0].title.clone()),
            Some("p1".to_string())
        );
        assert!(cache.lookup(&k2).is_none());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let cache = QueryCache::new();
        let key = cache_key_page(1);

        let t = cache.begin_fetch(&key).expect("granted");
        assert!(cache.complete_fetch(&t, list_payload(&["a"], 1), 10));

        cache.invalidate(Resource::Notes);
        cache.invalidate(Resource::Notes);

        // Still exactly one refetch.
        let t = cache.begin_fetch(&key).expect("stale entry refetches");
        assert!(cache.begin_fetch(&key).is_none());
        assert!(cache.complete_fetch(&t, list_payload(&["a", "b"], 1), 20));
        assert!(!cache.lookup(&key).expect("entry").stale);
    }

    #[test]
    fn test_invalidate_only_touches_matching_resource() {
        let cache = QueryCache::new();
        let list_key = cache_key_page(1);
        let note_key = QueryKey::note("n1");

        cache.insert(list_key.clone(), list_payload(&["a"], 1), 10);
        cache.insert(
            note_key.clone(),
            QueryPayload::Note(Note {
                id: "n1".to_string(),
                title: "solo".to_string(),
                content: String::new(),
                tag: NoteTag::Personal,
                created_at: String::new(),
            }),
            10,
        );

        cache.invalidate(Resource::Notes);
        assert!(cache.lookup(&list_key).expect("list entry").stale);
        assert!(!cache.lookup(&note_key).expect("note entry").stale);
    }

    #[test]
    fn test_stale_entry_remains_readable_while_refetching() {
        let cache = QueryCache::new();
        let key = cache_key_page(1);
        cache.insert(key.clone(), list_payload(&["a"], 1), 10);
        cache.invalidate(Resource::Notes);

        let _t = cache.begin_fetch(&key).expect("granted");
        let entry = cache.lookup(&key).expect("stale data still served");
        assert!(entry.stale);
        assert!(entry.payload.as_note_list().is_some());
    }

    #[test]
    fn test_failed_fetch_clears_flight_for_retry() {
        let cache = QueryCache::new();
        let key = cache_key_page(1);

        let t = cache.begin_fetch(&key).expect("granted");
        assert!(cache.fail_fetch(&t));
        assert!(!cache.is_in_flight(&key));
        assert!(cache.begin_fetch(&key).is_some());
    }

    #[test]
    fn test_retry_ticket_supersedes_failed_one() {
        let cache = QueryCache::new();
        let key = cache_key_page(1);

        let t1 = cache.begin_fetch(&key).expect("granted");
        assert!(cache.fail_fetch(&t1));
        let t2 = cache.begin_fetch(&key).expect("retry granted");

        // A very late response for the failed flight must not land.
        assert!(!cache.complete_fetch(&t1, list_payload(&["stale"], 1), 99));
        assert!(cache.complete_fetch(&t2, list_payload(&["fresh"], 1), 100));
        let entry = cache.lookup(&key).expect("entry");
        assert_eq!(
            entry.payload.as_note_list().map(|l| l.notes[0].title.clone()),
            Some("fresh".to_string())
        );
    }

    #[test]
    fn test_snapshot_fresh_skips_stale_entries() {
        let cache = QueryCache::new();
        cache.insert(cache_key_page(1), list_payload(&["a"], 2), 10);
        cache.insert(cache_key_page(2), list_payload(&["b"], 2), 10);
        cache.invalidate(Resource::Notes);
        cache.insert(cache_key_page(3), list_payload(&["c"], 3), 20);

        let fresh = cache.snapshot_fresh();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].0, cache_key_page(3));
    }

    fn cache_key_page(page: u32) -> QueryKey {
        QueryKey::notes(page, "", None)
    }
}
