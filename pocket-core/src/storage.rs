use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::article::ArticleNode;
use crate::error::StoreError;
use crate::sink::{NodeSink, UpsertOutcome};

pub const NODES_FILE: &str = "nodes.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct NodeData {
    // node id -> node
    nodes: BTreeMap<String, ArticleNode>,
}

#[derive(Debug, Default)]
struct StoreState {
    data: NodeData,
    // ids touched or created during the current run
    seen: HashSet<String>,
    dirty: bool,
}

/// Content-digest keyed node store. In-memory, or backed by `nodes.json` in a directory.
#[derive(Debug, Clone)]
pub struct NodeStore {
    inner: Arc<RwLock<StoreState>>,
    path: Option<PathBuf>,
}

impl NodeStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState::default())),
            path: None,
        }
    }

    /// Loads `nodes.json` from `dir`, falling back to the temp file left by an
    /// interrupted write, then to an empty store.
    pub async fn load_from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(error = %e, path = %dir.display(), "failed to create node store dir");
        }
        let path = dir.join(NODES_FILE);
        let data: NodeData = read_json_with_tmp_fallback(&path).await;
        debug!(nodes = data.nodes.len(), path = %path.display(), "node store loaded");

        Self {
            inner: Arc::new(RwLock::new(StoreState {
                data,
                ..StoreState::default()
            })),
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.data.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, id: &str) -> Option<ArticleNode> {
        self.inner.read().await.data.nodes.get(id).cloned()
    }

    /// Drops every node not touched or created since the store was opened.
    pub async fn sweep_stale(&self) -> Vec<String> {
        let mut inner = self.inner.write().await;
        let StoreState { data, seen, dirty } = &mut *inner;
        let stale: Vec<String> = data
            .nodes
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            data.nodes.remove(id);
        }
        if !stale.is_empty() {
            *dirty = true;
            info!(removed = stale.len(), "swept stale nodes");
        }
        stale
    }

    /// Writes pending changes atomically (temp file + rename). No-op when in memory or clean.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            debug!("node store is in-memory only; skipping persist");
            return Ok(());
        };
        let mut inner = self.inner.write().await;
        if !inner.dirty {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&inner.data)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        inner.dirty = false;
        debug!(nodes = inner.data.nodes.len(), path = %path.display(), "node store persisted");
        Ok(())
    }
}

#[async_trait]
impl NodeSink for NodeStore {
    async fn create_node(&self, node: ArticleNode) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let id = node.id().to_string();
        inner.seen.insert(id.clone());

        let outcome = match inner.data.nodes.get(&id) {
            Some(existing) if existing.content_digest() == node.content_digest() => {
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        inner.data.nodes.insert(id, node);
        inner.dirty = true;
        Ok(outcome)
    }

    async fn touch_node(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.data.nodes.contains_key(id) {
            inner.seen.insert(id.to_string());
            Ok(true)
        } else {
            debug!(id, "touch for unknown node");
            Ok(false)
        }
    }

    async fn nodes_by_type(&self, type_name: &str) -> Vec<ArticleNode> {
        let inner = self.inner.read().await;
        inner
            .data
            .nodes
            .values()
            .filter(|node| node.type_name() == type_name)
            .cloned()
            .collect()
    }
}

async fn read_json_with_tmp_fallback<T: DeserializeOwned + Default>(path: &Path) -> T {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse JSON, trying tmp fallback");
                let tmp = path.with_extension("json.tmp");
                match tokio::fs::read(&tmp).await {
                    Ok(tmp_bytes) => serde_json::from_slice::<T>(&tmp_bytes).unwrap_or_default(),
                    Err(_) => Default::default(),
                }
            }
        },
        Err(_) => Default::default(),
    }
}
