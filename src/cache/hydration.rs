use super::query::{QueryCache, QueryKey, QueryPayload};
use crate::api::{ApiClient, ApiResult};
use crate::models::{NoteList, NoteTag, NOTES_PER_PAGE};
use serde::{Deserialize, Serialize};

/// Window global carrying the serialized first-page cache, written
/// into the initial page payload by the server renderer.
pub(crate) const BOOT_SNAPSHOT_GLOBAL: &str = "__NOTEHUB_CACHE__";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct DehydratedEntry {
    pub key: QueryKey,
    pub payload: QueryPayload,
    pub fetched_ms: i64,
}

/// Serialize contract between a server-side cache instance and the
/// client session cache. Only fresh entries travel.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct DehydratedCache {
    pub entries: Vec<DehydratedEntry>,
}

impl DehydratedCache {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"entries\":[]}".to_string())
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

pub(crate) fn dehydrate(cache: &QueryCache) -> DehydratedCache {
    DehydratedCache {
        entries: cache
            .snapshot_fresh()
            .into_iter()
            .map(|(key, entry)| DehydratedEntry {
                key,
                payload: entry.payload,
                fetched_ms: entry.fetched_ms,
            })
            .collect(),
    }
}

/// Seeds a cache from a snapshot. Entries already present win over the
/// snapshot; hydration happens before any component reads the cache,
/// so in practice the cache is empty here.
pub(crate) fn hydrate(cache: &QueryCache, snapshot: DehydratedCache) {
    for entry in snapshot.entries {
        if cache.contains(&entry.key) {
            continue;
        }
        cache.insert(entry.key, entry.payload, entry.fetched_ms);
    }
}

/// The default-view key the server prefetches: page 1, no search, tag
/// from the URL segment.
pub(crate) fn default_view_key(tag: Option<NoteTag>) -> QueryKey {
    QueryKey::notes(1, "", tag)
}

/// Stores an already-fetched first page into a cache under the
/// default-view key. Split out from the network call so the seeding
/// logic tests without a server.
pub(crate) fn seed_default_view(
    cache: &QueryCache,
    tag: Option<NoteTag>,
    list: NoteList,
    now_ms: i64,
) -> QueryKey {
    let key = default_view_key(tag);
    cache.insert(key.clone(), QueryPayload::NoteList(list), now_ms);
    key
}

/// Server-side prefetch: fetch the default view eagerly into a fresh
/// cache instance and serialize it for the page payload. Called by the
/// rendering host, not from the wasm bundle itself.
#[allow(dead_code)]
pub(crate) async fn prefetch_notes(
    api: &ApiClient,
    tag: Option<NoteTag>,
    now_ms: i64,
) -> ApiResult<DehydratedCache> {
    let list = api.list_notes(1, NOTES_PER_PAGE, None, tag).await?;
    let cache = QueryCache::new();
    seed_default_view(&cache, tag, list, now_ms);
    Ok(dehydrate(&cache))
}

/// Reads the serialized snapshot the server embedded in the page, if
/// any. Accepts a JSON string or a plain object on the global.
pub(crate) fn boot_snapshot() -> Option<DehydratedCache> {
    let window = web_sys::window()?;
    let raw = js_sys::Reflect::get(&window, &BOOT_SNAPSHOT_GLOBAL.into()).ok()?;
    if raw.is_undefined() || raw.is_null() {
        return None;
    }

    let json = raw
        .as_string()
        .or_else(|| js_sys::JSON::stringify(&raw).ok().and_then(|s| s.as_string()))?;
    DehydratedCache::from_json(&json)
}


// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_boot_snapshot_reads_window_global() {
        let cache = QueryCache::new();
        seed_default_view(
            &cache,
            None,
            NoteList {
                notes: vec![],
                total_pages: 1,
            },
            1,
        );
        let json = dehydrate(&cache).to_json();

        let window = web_sys::window().expect("window should exist in browser tests");
        js_sys::Reflect::set(&window, &BOOT_SNAPSHOT_GLOBAL.into(), &json.into())
            .expect("should set global");

        let snapshot = boot_snapshot().expect("snapshot should parse");
        assert_eq!(snapshot.entries.len(), 1);

        js_sys::Reflect::set(
            &window,
            &BOOT_SNAPSHOT_GLOBAL.into(),
            &wasm_bindgen::JsValue::UNDEFINED,
        )
        .expect("should clear global");
        assert!(boot_snapshot().is_none());
    }
}
