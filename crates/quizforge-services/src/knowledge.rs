//! Knowledge Source: the per-conversation knowledge graph / vector index.

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Retrieval mode. `Hybrid` is the default full-index mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    Hybrid,
    Local,
    Global,
}

/// Reply to a knowledge query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeReply {
    /// Relevant passages, most relevant first.
    pub snippets: Vec<String>,
    /// Knowledge-point names the query touched.
    pub knowledge_points: Vec<String>,
}

/// Queryable knowledge index scoped per conversation.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn query(
        &self,
        conversation_id: &str,
        text: &str,
        mode: QueryMode,
    ) -> Result<KnowledgeReply, ServiceError>;
}
