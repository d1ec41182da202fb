use async_trait::async_trait;
use sled::{Db, Tree};

use crate::persistence::CacheStore;
use crate::utils::error::CacheError;

/// Cache of derived per-match views, kept in the `cache` tree.
#[derive(Clone, Debug)]
pub struct SledCache {
    tree: Tree,
}

impl SledCache {
    pub fn new(db: &Db) -> Result<Self, CacheError> {
        Ok(Self {
            tree: db.open_tree("cache")?,
        })
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }
}

#[async_trait]
impl CacheStore for SledCache {
    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.tree.remove(key)?.is_some())
    }
}
