use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Recently uploaded raw messages, keyed by file name.
///
/// There is no per-entry expiry: [`UploadCache::spawn_eviction`] clears the
/// whole cache on a fixed period.
#[derive(Debug, Default)]
pub struct UploadCache {
    entries: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl UploadCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store `bytes` under `key`, replacing an earlier upload of the same name.
    pub async fn insert(&self, key: &str, bytes: Vec<u8>) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Arc::from(bytes));
        log::debug!("Cached upload {key} ({} entries)", entries.len());
    }

    pub async fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        if dropped > 0 {
            log::info!("Cleared {dropped} cached uploads");
        }
    }

    /// Clear the cache every `period`, starting one period from now.
    pub fn spawn_eviction(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = interval(period);
            // The first tick completes immediately.
            timer.tick().await;
            loop {
                timer.tick().await;
                cache.clear().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_and_replace() {
        let cache = UploadCache::new();
        assert!(cache.is_empty().await);
        cache.insert("b.eml", b"first".to_vec()).await;
        cache.insert("a.eml", b"other".to_vec()).await;
        cache.insert("b.eml", b"second".to_vec()).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("b.eml").await.as_deref(), Some(&b"second"[..]));
        assert!(cache.get("missing.eml").await.is_none());
        assert_eq!(cache.keys().await, vec!["a.eml", "b.eml"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_clears_everything_each_period() {
        let cache = UploadCache::new();
        cache.insert("upload.eml", b"data".to_vec()).await;
        let handle = cache.spawn_eviction(Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(cache.len().await, 1);

        tokio::time::sleep(Duration::from_secs(1801)).await;
        assert!(cache.is_empty().await);

        cache.insert("later.eml", b"data".to_vec()).await;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(cache.is_empty().await);
        handle.abort();
    }
}
