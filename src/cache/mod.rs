//! Static asset cache: cache-first with network populate, keyed by request
//! path under a named generation directory. Streaming playlist/segment
//! requests always bypass the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::WatchError;

pub const CACHE_GENERATION: &str = "ralphtv-watch-v2";

/// Pre-populated at install time.
pub const STATIC_ASSETS: [&str; 5] = [
    "/",
    "/icon-180.png",
    "/icon-192.png",
    "/icon-512.png",
    "/manifest.json",
];

/// Live playlist/segment requests are never cached, always network-fresh.
pub fn is_stream_request(path: &str) -> bool {
    path.contains(".m3u8") || path.contains(".ts")
}

#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub success: bool,
    pub body: Vec<u8>,
    pub from_cache: bool,
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedAsset, WatchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedAsset, WatchError> {
        let response = self.client.get(url).send().await?;
        let success = response.status().is_success();
        let body = response.bytes().await?.to_vec();
        Ok(FetchedAsset {
            success,
            body,
            from_cache: false,
        })
    }
}

pub struct AssetCache {
    root: PathBuf,
    generation: String,
    fetcher: Arc<dyn AssetFetcher>,
}

impl AssetCache {
    pub fn new(root: impl AsRef<Path>, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            generation: CACHE_GENERATION.to_string(),
            fetcher,
        }
    }

    fn generation_dir(&self) -> PathBuf {
        self.root.join(&self.generation)
    }

    fn entry_path(&self, path: &str) -> PathBuf {
        let digest = md5::compute(path.as_bytes());
        self.generation_dir().join(format!("{digest:x}"))
    }

    /// Pre-populate the cache with the static asset manifest. Per-asset
    /// failures are logged and skipped so install never blocks startup.
    pub async fn install(&self, relay_url: &str) {
        log::info!("Installing asset cache generation {}", self.generation);
        for path in STATIC_ASSETS {
            if let Err(e) = self.fetch(relay_url, path).await {
                log::warn!("Failed to precache {path}: {e}");
            }
        }
    }

    /// Purge every generation directory not matching the current one.
    pub fn activate(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.generation_dir())?;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.file_name().to_string_lossy() != self.generation {
                log::info!("Purging stale cache generation {:?}", entry.file_name());
                std::fs::remove_dir_all(entry.path())?;
            }
        }
        Ok(())
    }

    /// Cache-first fetch: serve the stored copy when present; otherwise hit
    /// the network and store successful responses before returning them.
    /// Stream requests skip the cache entirely in both directions.
    pub async fn fetch(&self, relay_url: &str, path: &str) -> Result<FetchedAsset, WatchError> {
        let url = format!("{}{}", relay_url.trim_end_matches('/'), path);

        if is_stream_request(path) {
            return self.fetcher.get(&url).await;
        }

        let entry = self.entry_path(path);
        if let Ok(body) = tokio::fs::read(&entry).await {
            return Ok(FetchedAsset {
                success: true,
                body,
                from_cache: true,
            });
        }

        let asset = self.fetcher.get(&url).await?;
        if asset.success {
            if let Some(parent) = entry.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&entry, &asset.body).await?;
        }
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        hits: AtomicUsize,
        success: bool,
    }

    impl CountingFetcher {
        fn new(success: bool) -> Self {
            Self {
                hits: AtomicUsize::new(0),
                success,
            }
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl AssetFetcher for CountingFetcher {
        async fn get(&self, url: &str) -> Result<FetchedAsset, WatchError> {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(FetchedAsset {
                success: self.success,
                body: url.as_bytes().to_vec(),
                from_cache: false,
            })
        }
    }

    fn cache_in(dir: &Path, fetcher: Arc<CountingFetcher>) -> AssetCache {
        AssetCache::new(dir, fetcher)
    }

    #[test]
    fn stream_paths_are_detected() {
        assert!(is_stream_request("/hls/stream.m3u8"));
        assert!(is_stream_request("/hls/segment-001.ts"));
        assert!(!is_stream_request("/icon-192.png"));
        assert!(!is_stream_request("/manifest.json"));
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(true));
        let cache = cache_in(dir.path(), fetcher.clone());

        let first = cache.fetch("http://relay.test", "/icon-192.png").await.unwrap();
        assert!(!first.from_cache);
        let second = cache.fetch("http://relay.test", "/icon-192.png").await.unwrap();
        assert!(second.from_cache);
        assert_eq!(first.body, second.body);
        assert_eq!(fetcher.hits(), 1);
    }

    #[tokio::test]
    async fn stream_requests_always_hit_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(true));
        let cache = cache_in(dir.path(), fetcher.clone());

        for _ in 0..3 {
            let asset = cache
                .fetch("http://relay.test", "/hls/stream.m3u8")
                .await
                .unwrap();
            assert!(!asset.from_cache);
        }
        assert_eq!(fetcher.hits(), 3);
    }

    #[tokio::test]
    async fn unsuccessful_responses_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(false));
        let cache = cache_in(dir.path(), fetcher.clone());

        cache.fetch("http://relay.test", "/missing.png").await.unwrap();
        let again = cache.fetch("http://relay.test", "/missing.png").await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(fetcher.hits(), 2);
    }

    #[tokio::test]
    async fn activate_purges_stale_generations() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("ralphtv-watch-v1");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("leftover"), b"old").unwrap();

        let fetcher = Arc::new(CountingFetcher::new(true));
        let cache = cache_in(dir.path(), fetcher);
        cache.activate().unwrap();

        assert!(!stale.exists());
        assert!(dir.path().join(CACHE_GENERATION).exists());
    }

    #[tokio::test]
    async fn install_precaches_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::new(true));
        let cache = cache_in(dir.path(), fetcher.clone());

        cache.install("http://relay.test").await;
        assert_eq!(fetcher.hits(), STATIC_ASSETS.len());

        // All of them now come from cache.
        let asset = cache.fetch("http://relay.test", "/manifest.json").await.unwrap();
        assert!(asset.from_cache);
        assert_eq!(fetcher.hits(), STATIC_ASSETS.len());
    }
}
