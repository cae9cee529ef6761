//! Expiring credential cache.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedCredential {
    token: String,
    expires_at: Instant,
}

/// Identity → bearer token, each entry living for a fixed TTL.
///
/// Expiry is checked on read; no background sweep runs. When the cache is
/// full, expired entries are purged before the insert.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    inner: Arc<DashMap<String, CachedCredential>>,
    ttl: Duration,
    max_entries: usize,
}

impl CredentialCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Live token for `identity`, dropping the entry if it has expired.
    pub fn get(&self, identity: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entry = self.inner.get(identity)?;
            if entry.expires_at > now {
                return Some(entry.token.clone());
            }
        }
        self.inner
            .remove_if(identity, |_, credential| credential.expires_at <= now);
        None
    }

    pub fn insert(&self, identity: &str, token: &str) {
        if self.inner.len() >= self.max_entries && !self.inner.contains_key(identity) {
            let now = Instant::now();
            self.inner.retain(|_, credential| credential.expires_at > now);
            if self.inner.len() >= self.max_entries {
                tracing::warn!(
                    max_entries = self.max_entries,
                    "Credential cache full; dropping login"
                );
                return;
            }
        }
        self.inner.insert(
            identity.to_string(),
            CachedCredential {
                token: token.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_on_read() {
        let cache = CredentialCache::new(Duration::from_secs(360), 10);
        cache.insert("ada@example.com", "dapi-1");
        assert_eq!(cache.get("ada@example.com").as_deref(), Some("dapi-1"));

        tokio::time::advance(Duration::from_secs(361)).await;
        assert!(cache.get("ada@example.com").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_refreshes_ttl() {
        let cache = CredentialCache::new(Duration::from_secs(10), 10);
        cache.insert("ada", "old");
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert("ada", "new");
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("ada").as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_purges_expired_entries_first() {
        let cache = CredentialCache::new(Duration::from_secs(10), 2);
        cache.insert("a", "1");
        cache.insert("b", "2");
        cache.insert("c", "3");
        assert!(cache.get("c").is_none());

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.insert("c", "3");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn unrelated_identities_are_independent() {
        let cache = CredentialCache::new(Duration::from_secs(60), 10);
        cache.insert("a", "1");
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").as_deref(), Some("1"));
    }
}
