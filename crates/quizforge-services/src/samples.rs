//! Sample ingestion boundary.

use crate::error::ServiceError;
use async_trait::async_trait;
use quizforge_model::SampleDoc;

/// Read-only view of the documents uploaded for a conversation.
///
/// Parsing itself (PDF/PPTX/OCR) happens elsewhere; the pipeline only
/// observes status and extracted text.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn list_samples(&self, conversation_id: &str) -> Result<Vec<SampleDoc>, ServiceError>;
}
