//! Compute-once cache of compiled player scripts

use crate::error::TubemapError;
use crate::platform::cipher::CipherProgram;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cipher programs compiled from player scripts, keyed by script URL.
///
/// Concurrent lookups of the same URL share one in-flight load; failed
/// loads are not cached.
#[derive(Clone)]
pub struct PlayerCache {
    cache: Cache<String, Arc<CipherProgram>>,
}

impl PlayerCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, 16)
    }

    /// Create a cache with TTL and max capacity
    pub fn with_capacity(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    /// Cached program for `url`, running `load` if there is none yet
    pub async fn get_or_load<F>(
        &self,
        url: &str,
        load: F,
    ) -> Result<Arc<CipherProgram>, TubemapError>
    where
        F: Future<Output = Result<CipherProgram, TubemapError>>,
    {
        if let Some(hit) = self.cache.get(url).await {
            debug!("Player cache hit: {}", url);
            return Ok(hit);
        }

        debug!("Player cache miss: {}", url);
        self.cache
            .try_get_with(url.to_string(), async { load.await.map(Arc::new) })
            .await
            .map_err(TubemapError::from_shared)
    }

    /// Cached program for `url` without loading
    pub async fn get(&self, url: &str) -> Option<Arc<CipherProgram>> {
        self.cache.get(url).await
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for PlayerCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CipherStage;
    use crate::platform::cipher::CipherOp;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn program() -> CipherProgram {
        CipherProgram::new(vec![CipherOp::Reverse])
    }

    #[tokio::test]
    async fn test_loads_once() {
        let cache = PlayerCache::default();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let entry = cache
                .get_or_load("https://cdn/p.js", async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(program())
                })
                .await
                .unwrap();
            assert_eq!(entry.apply("abc"), "cba");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.get("https://cdn/p.js").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_loads_coalesce() {
        let cache = PlayerCache::default();
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let cache = cache.clone();
            let loads = loads.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("https://cdn/p.js", async {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(program())
                    })
                    .await
            })
        });

        for result in futures::future::join_all(tasks).await {
            tokio_test::assert_ok!(result.unwrap());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = PlayerCache::default();

        let err = cache
            .get_or_load("https://cdn/p.js", async {
                Err(TubemapError::HttpStatus {
                    url: "https://cdn/p.js".to_string(),
                    status: 500,
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TubemapError::HttpStatus { status: 500, .. }));

        let entry = cache
            .get_or_load("https://cdn/p.js", async { Ok(program()) })
            .await;
        tokio_test::assert_ok!(entry);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_get_plain_errors() {
        let cache = PlayerCache::default();

        let tasks = (0..4).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("https://cdn/p.js", async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(TubemapError::cipher(CipherStage::Locator, "no call site"))
                    })
                    .await
            })
        });

        for result in futures::future::join_all(tasks).await {
            let err = result.unwrap().unwrap_err();
            assert!(matches!(
                err,
                TubemapError::Cipher {
                    stage: CipherStage::Locator,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = PlayerCache::default();
        cache
            .get_or_load("a", async { Ok(program()) })
            .await
            .unwrap();
        cache.clear();
        assert!(cache.get("a").await.is_none());
    }
}
