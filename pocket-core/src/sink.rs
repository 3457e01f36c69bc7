use async_trait::async_trait;

use crate::article::ArticleNode;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Same content digest as the stored node; nothing written.
    Unchanged,
}

/// The content graph the sync writes into.
#[async_trait]
pub trait NodeSink: Send + Sync {
    /// Upsert keyed by node id, skipped when the content digest is unchanged.
    async fn create_node(&self, node: ArticleNode) -> Result<UpsertOutcome, StoreError>;

    /// Marks an existing node as still present for this run. Returns false for unknown ids.
    async fn touch_node(&self, id: &str) -> Result<bool, StoreError>;

    async fn nodes_by_type(&self, type_name: &str) -> Vec<ArticleNode>;
}
