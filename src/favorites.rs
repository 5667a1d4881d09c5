//! Per-client favorite resorts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::cache::PersistentCache;
use crate::{Result, SnowtripError};

/// Favorites are kept for a year after the last change
const FAVORITES_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Storage for favorite resort ids, keyed by an opaque client id.
///
/// Lists keep insertion order and never hold duplicates.
#[async_trait]
pub trait FavoritesStore: Send + Sync {
    async fn list(&self, client_id: &str) -> Result<Vec<String>>;

    async fn contains(&self, client_id: &str, resort_id: &str) -> Result<bool> {
        Ok(self.list(client_id).await?.iter().any(|id| id == resort_id))
    }

    /// Add or remove `resort_id`; returns whether it is a favorite afterwards.
    async fn toggle(&self, client_id: &str, resort_id: &str) -> Result<bool>;
}

fn toggle_in(list: &mut Vec<String>, resort_id: &str) -> bool {
    if let Some(pos) = list.iter().position(|id| id == resort_id) {
        list.remove(pos);
        false
    } else {
        list.push(resort_id.to_string());
        true
    }
}

/// Favorites held in the persistent cache
pub struct PersistentFavorites {
    cache: Arc<PersistentCache>,
    // serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl PersistentFavorites {
    pub fn new(cache: Arc<PersistentCache>) -> Self {
        Self {
            cache,
            write_lock: Mutex::new(()),
        }
    }

    fn key(client_id: &str) -> String {
        format!("favorites:{client_id}")
    }
}

#[async_trait]
impl FavoritesStore for PersistentFavorites {
    async fn list(&self, client_id: &str) -> Result<Vec<String>> {
        let stored: Option<Vec<String>> = self
            .cache
            .get(&Self::key(client_id))
            .await
            .map_err(|e| SnowtripError::cache(format!("{e:#}")))?;
        Ok(stored.unwrap_or_default())
    }

    async fn toggle(&self, client_id: &str, resort_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.list(client_id).await?;
        let favorite = toggle_in(&mut list, resort_id);
        self.cache
            .put(&Self::key(client_id), list, FAVORITES_TTL)
            .await
            .map_err(|e| SnowtripError::cache(format!("{e:#}")))?;
        debug!("Client {} favorite {} -> {}", client_id, resort_id, favorite);
        Ok(favorite)
    }
}

/// Process-local favorites, lost on restart
#[derive(Default)]
pub struct InMemoryFavorites {
    lists: RwLock<HashMap<String, Vec<String>>>,
}

#[async_trait]
impl FavoritesStore for InMemoryFavorites {
    async fn list(&self, client_id: &str) -> Result<Vec<String>> {
        Ok(self
            .lists
            .read()
            .await
            .get(client_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn toggle(&self, client_id: &str, resort_id: &str) -> Result<bool> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(client_id.to_string()).or_default();
        let favorite = toggle_in(list, resort_id);
        if list.is_empty() {
            lists.remove(client_id);
        }
        Ok(favorite)
    }
}
