//! Result cache for verified identities.
//!
//! Keys are SHA-256 digests of the method and the raw credential, so neither
//! tokens nor passwords are held in the map. An entry lives until the token
//! expires or the configured TTL elapses, whichever comes first.

use crate::auth::claims::VerifiedIdentity;
use crate::auth::method::AuthenticationMethod;
use crate::auth::resolver::RawCredential;
use crate::observability::metrics;
use common::secret::ExposeSecret;
use ring::digest::{Context, SHA256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// SHA-256 of (method, credential), each field length-prefixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn new(method: AuthenticationMethod, credential: &RawCredential) -> Self {
        let mut context = Context::new(&SHA256);
        update_field(&mut context, method.as_str().as_bytes());
        match credential {
            RawCredential::Bearer(token) => {
                update_field(&mut context, b"bearer");
                update_field(&mut context, token.expose_secret().as_bytes());
            }
            RawCredential::UsernamePassword { username, password } => {
                update_field(&mut context, b"basic");
                update_field(&mut context, username.as_bytes());
                update_field(&mut context, password.expose_secret().as_bytes());
            }
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(context.finish().as_ref());
        CacheKey(key)
    }
}

fn update_field(context: &mut Context, field: &[u8]) {
    context.update(&(field.len() as u64).to_be_bytes());
    context.update(field);
}

struct CacheEntry {
    identity: VerifiedIdentity,
    expires_at: Instant,
}

/// Bounded TTL cache of successful validations.
pub struct TokenCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl TokenCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<VerifiedIdentity> {
        let entries = self.entries.read().await;
        let hit = entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.identity.clone());
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    /// Store a verified identity. Tokens already past `exp` are not stored.
    pub async fn insert(&self, key: CacheKey, identity: VerifiedIdentity) {
        let now_epoch = chrono::Utc::now().timestamp();
        let remaining = identity.expires_at().saturating_sub(now_epoch);
        if remaining <= 0 {
            return;
        }
        let lifetime = self
            .ttl
            .min(Duration::from_secs(u64::try_from(remaining).unwrap_or(0)));

        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            entries.retain(|_, entry| entry.expires_at > now);

            // Still full of live entries: evict the one closest to expiry
            if entries.len() >= self.max_entries {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| *k)
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                identity,
                expires_at: now + lifetime,
            },
        );
        metrics::set_cache_entries(entries.len());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        metrics::set_cache_entries(0);
    }
}
