use std::collections::HashMap;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::debug;

use super::{watch_stream, CacheKey, CachedData, FreshnessPolicy, LocalStore, MaxAge};
use crate::error::{ErrorKind, Outcome};

/// Store writing one pretty-printed JSON file per key.
///
/// Files hold a `CachedData` envelope. Reactive reads are served from
/// in-process watch slots that mirror every write made through this store.
pub struct JsonFileStore<P, T> {
    cache_dir: PathBuf,
    freshness: Arc<dyn FreshnessPolicy>,
    slots: Mutex<HashMap<String, watch::Sender<Option<T>>>>,
    _key: PhantomData<fn(&P)>,
}

impl<P, T> JsonFileStore<P, T>
where
    P: CacheKey,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(cache_dir: PathBuf) -> Outcome<Self> {
        Self::with_freshness(cache_dir, Arc::new(MaxAge::default()))
    }

    pub fn with_freshness(cache_dir: PathBuf, freshness: Arc<dyn FreshnessPolicy>) -> Outcome<Self> {
        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            ErrorKind::store(format!("Failed to create cache dir {}", cache_dir.display()), e)
        })?;
        Ok(Self {
            cache_dir,
            freshness,
            slots: Mutex::new(HashMap::new()),
            _key: PhantomData,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn slot(&self, name: &str) -> watch::Receiver<Option<T>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(name.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    fn publish(&self, name: &str, value: T) {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(name.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(value));
    }

    async fn load(path: &Path) -> Outcome<Option<CachedData<T>>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ErrorKind::store(
                    format!("Failed to read cache file {}", path.display()),
                    e,
                ))
            }
        };

        let cached: CachedData<T> = serde_json::from_str(&contents).map_err(|e| {
            ErrorKind::store(format!("Failed to parse cache file {}", path.display()), e)
        })?;

        Ok(Some(cached))
    }

    async fn save(path: &Path, cached: &CachedData<T>) -> Outcome<()> {
        let contents = serde_json::to_string_pretty(cached)
            .map_err(|e| ErrorKind::store("Failed to serialize cache entry", e))?;

        // Write then rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(|e| {
            ErrorKind::store(format!("Failed to write cache file {}", tmp.display()), e)
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            ErrorKind::store(format!("Failed to replace cache file {}", path.display()), e)
        })?;
        Ok(())
    }

    /// Human-readable age of the stored data, or `None` if nothing is stored.
    pub async fn age_display(&self, param: &P) -> Option<String> {
        let name = param.cache_name();
        match Self::load(&self.cache_path(&name)).await {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = %name, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }
}

impl<P, T> LocalStore<P, T> for JsonFileStore<P, T>
where
    P: CacheKey + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn write(&self, param: &P, value: T) -> Outcome<()> {
        let name = param.cache_name();
        let cached = CachedData::new(value);
        Self::save(&self.cache_path(&name), &cached).await?;
        debug!(cache = %name, "Cache file written");
        self.publish(&name, cached.data);
        Ok(())
    }

    async fn mark_valid(&self, param: &P) -> Outcome<()> {
        let name = param.cache_name();
        let path = self.cache_path(&name);
        let mut cached = Self::load(&path).await?.ok_or_else(|| {
            ErrorKind::Store(format!("Nothing cached for {} to mark valid", name))
        })?;
        cached.validated_at = Some(Utc::now());
        Self::save(&path, &cached).await
    }

    async fn is_valid(&self, param: &P) -> Outcome<bool> {
        let cached = Self::load(&self.cache_path(&param.cache_name())).await?;
        Ok(cached
            .map(|c| c.is_valid(self.freshness.as_ref(), Utc::now()))
            .unwrap_or(false))
    }

    async fn current(&self, param: &P) -> Outcome<Option<T>> {
        let name = param.cache_name();
        let published = self.slot(&name).borrow().clone();
        match published {
            Some(value) => Ok(Some(value)),
            None => Ok(Self::load(&self.cache_path(&name)).await?.map(|cached| cached.data)),
        }
    }

    fn read(&self, param: &P) -> BoxStream<'static, Outcome<T>> {
        let name = param.cache_name();
        let rx = self.slot(&name);
        let seeded = rx.borrow().is_some();
        let path = self.cache_path(&name);

        // Nothing written in this process yet: start from what is on disk
        let from_disk = stream::once(async move {
            if seeded {
                return None;
            }
            match Self::load(&path).await {
                Ok(Some(cached)) => Some(Ok(cached.data)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        })
        .filter_map(futures::future::ready);

        from_disk.chain(watch_stream(rx, seeded)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AlwaysStale;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
    }

    #[derive(Debug, Clone)]
    struct Key(&'static str);

    impl CacheKey for Key {
        fn cache_name(&self) -> String {
            format!("menu_{}", self.0)
        }
    }

    fn item(name: &str) -> Item {
        Item {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_persists_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<Key, Vec<Item>> =
            JsonFileStore::new(dir.path().to_path_buf()).unwrap();

        store.write(&Key("cs"), vec![item("Goulash")]).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("menu_cs.json")).unwrap();
        let parsed: CachedData<Vec<Item>> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.data, vec![item("Goulash")]);
        assert!(parsed.validated_at.is_none());
        assert_eq!(store.age_display(&Key("cs")).await.as_deref(), Some("just now"));
        assert_eq!(store.age_display(&Key("en")).await, None);
    }

    #[tokio::test]
    async fn test_validity_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store: JsonFileStore<Key, Vec<Item>> =
                JsonFileStore::new(dir.path().to_path_buf()).unwrap();
            store.write(&Key("cs"), vec![item("Soup")]).await.unwrap();
            assert!(!store.is_valid(&Key("cs")).await.unwrap());
            store.mark_valid(&Key("cs")).await.unwrap();
        }

        let reopened: JsonFileStore<Key, Vec<Item>> =
            JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(reopened.is_valid(&Key("cs")).await.unwrap());

        let stale: JsonFileStore<Key, Vec<Item>> =
            JsonFileStore::with_freshness(dir.path().to_path_buf(), Arc::new(AlwaysStale)).unwrap();
        assert!(!stale.is_valid(&Key("cs")).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_valid_without_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<Key, Vec<Item>> =
            JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        let result = store.mark_valid(&Key("cs")).await;
        assert!(matches!(result, Err(ErrorKind::Store(_))));
    }

    #[tokio::test]
    async fn test_read_starts_from_disk_then_follows_writes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store: JsonFileStore<Key, Vec<Item>> =
                JsonFileStore::new(dir.path().to_path_buf()).unwrap();
            store.write(&Key("cs"), vec![item("Old")]).await.unwrap();
        }

        let store: JsonFileStore<Key, Vec<Item>> =
            JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        let mut reads = store.read(&Key("cs"));
        assert_eq!(reads.next().await, Some(Ok(vec![item("Old")])));

        store.write(&Key("cs"), vec![item("New")]).await.unwrap();
        assert_eq!(reads.next().await, Some(Ok(vec![item("New")])));
    }

    #[tokio::test]
    async fn test_current_reads_disk_then_latest_write() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store: JsonFileStore<Key, Vec<Item>> =
                JsonFileStore::new(dir.path().to_path_buf()).unwrap();
            store.write(&Key("cs"), vec![item("Old")]).await.unwrap();
        }

        let store: JsonFileStore<Key, Vec<Item>> =
            JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.current(&Key("cs")).await, Ok(Some(vec![item("Old")])));
        assert_eq!(store.current(&Key("en")).await, Ok(None));

        store.write(&Key("cs"), vec![item("New")]).await.unwrap();
        assert_eq!(store.current(&Key("cs")).await, Ok(Some(vec![item("New")])));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("menu_cs.json"), "{ not json").unwrap();

        let store: JsonFileStore<Key, Vec<Item>> =
            JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(store.is_valid(&Key("cs")).await, Err(ErrorKind::Store(_))));

        let mut reads = store.read(&Key("cs"));
        assert!(matches!(reads.next().await, Some(Err(ErrorKind::Store(_)))));
    }
}
