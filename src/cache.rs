use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::model::{NamespaceScope, ResourceKind, is_fetch_all};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CacheKey {
    pub kind: ResourceKind,
    pub namespace: NamespaceScope,
    pub page: u32,
    pub page_size: u32,
}

impl CacheKey {
    pub fn new(kind: ResourceKind, namespace: &NamespaceScope, page: u32, page_size: u32) -> Self {
        Self {
            kind,
            namespace: namespace.clone(),
            page,
            page_size,
        }
    }

    pub fn is_cacheable(&self) -> bool {
        !is_fetch_all(self.page_size)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-page{}-size{}",
            self.kind, self.namespace, self.page, self.page_size
        )
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Value,
    pub fetched_at: Instant,
}

#[derive(Debug, Clone)]
pub struct PageCache {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry when it is younger than the TTL.
    pub fn get_fresh(&self, key: &CacheKey, now: Instant) -> Option<&CacheEntry> {
        if !key.is_cacheable() {
            return None;
        }
        let entry = self.entries.get(key)?;
        let age = now.saturating_duration_since(entry.fetched_at);
        if age < self.ttl {
            trace!(%key, ?age, "page cache hit");
            Some(entry)
        } else {
            None
        }
    }

    /// Fetch-all pages are refused; returns whether the entry was stored.
    pub fn insert(&mut self, key: CacheKey, payload: Value, fetched_at: Instant) -> bool {
        if !key.is_cacheable() {
            return false;
        }
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                fetched_at,
            },
        );
        true
    }

    pub fn invalidate_kind(&mut self, kind: ResourceKind) {
        self.entries.retain(|key, _| key.kind != kind);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < ttl);
        before - self.entries.len()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &CacheKey) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheKey, Duration, Instant, NamespaceScope, PageCache, ResourceKind};
    use crate::model::FETCH_ALL_PAGE_SIZE;
    use serde_json::json;

    #[test]
    fn key_format_matches_backend_convention() {
        let key = CacheKey::new(ResourceKind::Pods, &NamespaceScope::All, 2, 50);
        assert_eq!(key.to_string(), "pods-all-page2-size50");

        let key = CacheKey::new(
            ResourceKind::Services,
            &NamespaceScope::Named("team-a".to_string()),
            1,
            25,
        );
        assert_eq!(key.to_string(), "services-team-a-page1-size25");
    }

    #[test]
    fn entries_expire_after_ttl() {
        let start = Instant::now();
        let mut cache = PageCache::new(Duration::from_secs(300));
        let key = CacheKey::new(ResourceKind::Pods, &NamespaceScope::All, 1, 50);
        assert!(cache.insert(key.clone(), json!({"data": {}}), start));

        assert!(cache.get_fresh(&key, start + Duration::from_secs(299)).is_some());
        assert!(cache.get_fresh(&key, start + Duration::from_secs(300)).is_none());
        assert_eq!(cache.purge_expired(start + Duration::from_secs(301)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn fetch_all_pages_are_never_stored() {
        let mut cache = PageCache::new(Duration::from_secs(300));
        let key = CacheKey::new(ResourceKind::Pods, &NamespaceScope::All, 1, FETCH_ALL_PAGE_SIZE);
        assert!(!cache.insert(key.clone(), json!({}), Instant::now()));
        assert!(!cache.contains(&key));
    }

    #[test]
    fn invalidate_kind_keeps_other_kinds() {
        let now = Instant::now();
        let mut cache = PageCache::new(Duration::from_secs(300));
        cache.insert(CacheKey::new(ResourceKind::Pods, &NamespaceScope::All, 1, 50), json!({}), now);
        cache.insert(
            CacheKey::new(ResourceKind::Secrets, &NamespaceScope::All, 1, 50),
            json!({}),
            now,
        );
        cache.invalidate_kind(ResourceKind::Pods);
        assert_eq!(cache.len(), 1);
    }
}
