use std::io::Cursor;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{trace, warn};
use tokio::sync::watch;

use arcadia_files::glb::reader::GlbReader;

use crate::assets::fetcher::AssetFetcher;
use crate::assets::loader::avatar_loader::AvatarLoader;
use crate::assets::loader::emote_loader::EmoteLoader;
use crate::assets::loader::model_loader::ModelLoader;
use crate::assets::loader::script_gate::{Admission, ScriptGate};
use crate::assets::url::resolve_asset_url;
use crate::assets::{AssetKind, AssetView, LoadError};

/// The settled outcome every waiter on a key observes. `Ok(None)` is the
/// silent script-rejection outcome.
pub type LoadOutcome = Result<Option<Arc<AssetView>>, LoadError>;

/// The load orchestrator. Fetches and parses each `kind/locator` key exactly
/// once, no matter how many callers ask concurrently, and serves every later
/// request from the resolved table.
///
/// A key is always in exactly one of three states: absent, pending (an entry
/// in the pending table that every concurrent caller awaits) or resolved
/// (an immutable entry in the resolved table). Every failure path removes
/// the pending entry, so a later call retries with a fresh fetch; a resolved
/// entry is never evicted or overwritten.
pub struct AssetCache<F> {
    inner: Arc<CacheInner<F>>,
}

// Not derived: a derived Clone would needlessly require F: Clone.
impl<F> Clone for AssetCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CacheInner<F> {
    fetcher: F,
    assets_root: Option<String>,
    pending: DashMap<String, watch::Receiver<Option<LoadOutcome>>>,
    resolved: DashMap<String, Arc<AssetView>>,
}

fn cache_key(kind: AssetKind, locator: &str) -> String {
    format!("{}/{}", kind.as_str(), locator)
}

impl<F: AssetFetcher> AssetCache<F> {
    pub fn new(fetcher: F, assets_root: Option<String>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                assets_root,
                pending: DashMap::with_capacity(100),
                resolved: DashMap::with_capacity(100),
            }),
        }
    }

    /// Loads the referenced asset, deduplicating against in-flight and
    /// finished loads. `Ok(None)` means the script admission gate turned the
    /// content away, an expected outcome rather than a fault.
    pub async fn load(&self, kind: &str, locator: &str) -> LoadOutcome {
        // Fail fast on unrecognized kinds: no pending entry, no network traffic.
        let kind: AssetKind = kind.parse()?;
        let key = cache_key(kind, locator);

        if let Some(view) = self.inner.resolved.get(&key) {
            return Ok(Some(Arc::clone(view.value())));
        }

        let mut receiver = match self.inner.pending.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                // Re-check under the shard lock: the load may have settled
                // between the probe above and taking this entry.
                if let Some(view) = self.inner.resolved.get(&key) {
                    return Ok(Some(Arc::clone(view.value())));
                }

                let url = resolve_asset_url(locator, self.inner.assets_root.as_deref()).ok_or_else(|| {
                    LoadError::UnresolvableReference {
                        locator: locator.to_owned(),
                    }
                })?;

                let (sender, receiver) = watch::channel(None);
                entry.insert(receiver.clone());

                // The load is spawned, not driven by this future: callers may
                // abandon interest, the fetch still runs to completion and
                // populates the cache for whoever asks next.
                let inner = Arc::clone(&self.inner);
                let task_key = key;
                tokio::spawn(async move {
                    let outcome = inner.perform_load(kind, &task_key, &url).await;
                    if let Ok(Some(view)) = &outcome {
                        inner.resolved.insert(task_key.clone(), Arc::clone(view));
                    }
                    // The resolved entry has to be visible before the key
                    // leaves the pending table, otherwise a racing caller
                    // could observe the key as absent and fetch again.
                    inner.pending.remove(&task_key);
                    // Waiters keep the channel alive through receiver clones;
                    // with none left the result is still in the tables.
                    let _ = sender.send(Some(outcome));
                });

                receiver
            }
        };

        let settled = receiver
            .wait_for(|outcome| outcome.is_some())
            .await
            .expect("load task dropped without publishing an outcome");
        settled.clone().expect("wait_for only returns on a settled outcome")
    }

    /// Resolved-table membership. No side effects, pending loads don't count.
    pub fn has(&self, kind: &str, locator: &str) -> bool {
        let Ok(kind) = kind.parse::<AssetKind>() else {
            return false;
        };
        self.inner.resolved.contains_key(&cache_key(kind, locator))
    }

    /// Resolved-table read. No side effects.
    pub fn get(&self, kind: &str, locator: &str) -> Option<Arc<AssetView>> {
        let kind = kind.parse::<AssetKind>().ok()?;
        self.inner
            .resolved
            .get(&cache_key(kind, locator))
            .map(|view| Arc::clone(view.value()))
    }

    /// Deliberate no-op, kept as the seam for an eager prefetch strategy.
    /// Implementing it must not change anything `load` callers can observe.
    pub fn preload(&self, _kind: &str, _locator: &str) {}
}

impl<F: AssetFetcher> CacheInner<F> {
    async fn perform_load(&self, kind: AssetKind, key: &str, url: &str) -> LoadOutcome {
        trace!("Loading {} from {}", key, url);

        let payload = self.fetcher.fetch(url).await.map_err(|failure| {
            warn!("Fetching {} failed: {}", url, failure.message);
            LoadError::Fetch {
                url: url.to_owned(),
                status: failure.status,
            }
        })?;

        if kind == AssetKind::Script {
            let source = String::from_utf8(payload).map_err(|err| LoadError::Parse(Arc::new(err.into())))?;
            return match ScriptGate::admit(source) {
                Admission::Granted(view) => Ok(Some(Arc::new(AssetView::Script(view)))),
                Admission::Rejected(pattern) => {
                    warn!("Script {} rejected by the admission gate (matched {:?})", key, pattern);
                    Ok(None)
                }
            };
        }

        // The binary decode is pure CPU, keep it off the I/O workers.
        let document = tokio::task::spawn_blocking(move || GlbReader::parse_document(&mut Cursor::new(payload)))
            .await
            .expect("container decode task panicked")
            .map_err(|err| LoadError::Parse(Arc::new(err)))?;
        let document = Arc::new(document);

        let view = match kind {
            AssetKind::Model => AssetView::Model(ModelLoader::load(document)),
            AssetKind::Avatar => AssetView::Avatar(AvatarLoader::load(document)),
            AssetKind::Emote => AssetView::Emote(EmoteLoader::load(document)?),
            AssetKind::Script => unreachable!("scripts bypass the binary decode"),
        };

        Ok(Some(Arc::new(view)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use itertools::Itertools;
    use serde_json::json;

    use super::AssetCache;
    use crate::assets::fetcher::{AssetFetcher, FetchFailure};
    use crate::assets::{AssetView, LoadError};

    enum Response {
        Bytes(Vec<u8>),
        Status(u16),
    }

    /// Counts fetches and optionally stalls them, so tests can pile up
    /// concurrent callers behind one pending entry.
    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        response: Response,
        delay: Option<Duration>,
    }

    impl AssetFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.response {
                Response::Bytes(bytes) => Ok(bytes.clone()),
                Response::Status(status) => Err(FetchFailure {
                    status: Some(*status),
                    message: format!("server answered {}", status),
                }),
            }
        }
    }

    fn cache_with(response: Response, delay: Option<Duration>) -> (AssetCache<CountingFetcher>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CountingFetcher {
            calls: Arc::clone(&calls),
            response,
            delay,
        };
        (AssetCache::new(fetcher, Some("https://assets.test".to_owned())), calls)
    }

    /// A well-formed single-node model container, built the way the parser
    /// crate's own tests build theirs.
    fn model_container() -> Vec<u8> {
        let json = json!({
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "nodes": [
                { "name": "crate", "mesh": 0, "children": [1] },
                { "name": "lid", "mesh": 1 }
            ]
        });

        let mut json_data = serde_json::to_vec(&json).unwrap();
        while json_data.len() % 4 != 0 {
            json_data.push(b' ');
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(b"glTF");
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&((12 + 8 + json_data.len()) as u32).to_le_bytes());
        buf.extend_from_slice(&(json_data.len() as u32).to_le_bytes());
        buf.extend_from_slice(b"JSON");
        buf.extend_from_slice(&json_data);
        buf
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() -> Result<(), anyhow::Error> {
        let (cache, calls) = cache_with(
            Response::Bytes(model_container()),
            Some(Duration::from_millis(25)),
        );

        let handles = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.load("model", "asset://crate.glb").await })
            })
            .collect_vec();

        let mut views = Vec::new();
        for handle in handles {
            views.push(handle.await??.expect("models always produce a view"));
        }

        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert!(views.iter().all(|view| Arc::ptr_eq(view, &views[0])));
        Ok(())
    }

    #[tokio::test]
    async fn resolved_loads_are_served_without_io() -> Result<(), anyhow::Error> {
        let (cache, calls) = cache_with(Response::Bytes(model_container()), None);

        let first = cache.load("model", "asset://crate.glb").await?.expect("view");
        let second = cache.load("model", "asset://crate.glb").await?.expect("view");

        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.has("model", "asset://crate.glb"));
        assert!(cache.get("model", "asset://crate.glb").is_some());
        // Same locator under another kind is a different key.
        assert!(!cache.has("avatar", "asset://crate.glb"));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_failures_leave_the_key_retryable() -> Result<(), anyhow::Error> {
        let (cache, calls) = cache_with(Response::Status(404), None);

        let first = cache.load("model", "asset://gone.glb").await;
        assert!(matches!(
            first,
            Err(LoadError::Fetch {
                status: Some(404),
                ..
            })
        ));
        assert!(!cache.has("model", "asset://gone.glb"));

        // The key is absent again, so the retry performs a fresh fetch.
        let second = cache.load("model", "asset://gone.glb").await;
        assert!(second.is_err());
        assert_eq!(2, calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn parse_failures_propagate_and_clean_up() -> Result<(), anyhow::Error> {
        let (cache, calls) = cache_with(Response::Bytes(b"not a container".to_vec()), None);

        let outcome = cache.load("model", "asset://garbage.glb").await;
        assert!(matches!(outcome, Err(LoadError::Parse(_))));
        assert!(!cache.has("model", "asset://garbage.glb"));
        assert_eq!(1, calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_kinds_fail_before_any_fetch() -> Result<(), anyhow::Error> {
        let (cache, calls) = cache_with(Response::Bytes(model_container()), None);

        let outcome = cache.load("unsupported", "asset://crate.glb").await;
        match outcome {
            Err(LoadError::UnsupportedKind { kind }) => assert_eq!("unsupported", kind),
            other => panic!("Expected UnsupportedKind, got {:?}", other),
        }
        assert_eq!(0, calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_references_fail_without_a_pending_entry() -> Result<(), anyhow::Error> {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CountingFetcher {
            calls: Arc::clone(&calls),
            response: Response::Bytes(model_container()),
            delay: None,
        };
        let cache = AssetCache::new(fetcher, None);

        let outcome = cache.load("model", "asset://crate.glb").await;
        assert!(matches!(outcome, Err(LoadError::UnresolvableReference { .. })));
        assert_eq!(0, calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn forbidden_scripts_resolve_to_no_result() -> Result<(), anyhow::Error> {
        let source = b"world.spawn_portal(\"lobby\")".to_vec();
        let (cache, calls) = cache_with(Response::Bytes(source), None);

        let outcome = cache.load("script", "asset://door.lua").await?;
        assert!(outcome.is_none());
        // Rejections are not cached: the next call screens fresh content.
        assert!(!cache.has("script", "asset://door.lua"));
        assert_eq!(1, calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn benign_scripts_yield_a_script_view() -> Result<(), anyhow::Error> {
        let source = "function on_tick(dt) end";
        let (cache, _) = cache_with(Response::Bytes(source.as_bytes().to_vec()), None);

        let view = cache.load("script", "asset://tick.lua").await?.expect("admitted");
        match view.as_ref() {
            AssetView::Script(script) => assert_eq!(source, script.source()),
            other => panic!("Expected a script view, got {:?}", other),
        }
        assert!(cache.has("script", "asset://tick.lua"));
        Ok(())
    }

    #[tokio::test]
    async fn end_to_end_model_load() -> Result<(), anyhow::Error> {
        let (cache, _) = cache_with(Response::Bytes(model_container()), None);

        let view = cache.load("model", "https://c.d/crate.glb").await?.expect("view");
        let model = view.as_model().expect("model kind");

        let instance = model.instantiate();
        assert_eq!(3, instance.count());
        assert!(instance.find("lid").is_some());
        assert!(model.document().animations.is_empty());
        Ok(())
    }
}
