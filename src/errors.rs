use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::ApiResponse;

/// The whole source document is unreadable. Pipeline-fatal: the deck ends
/// in `error` and nothing is committed.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("document '{0}' is not valid UTF-8 text")]
    InvalidEncoding(String),
}

/// One unit's model call or response parse failed. Unit-local: logged,
/// reduces the candidate count, never aborts the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model completion failed: {0}")]
    Completion(#[source] anyhow::Error),

    #[error("model response did not parse as a card list: {0}")]
    MalformedResponse(String),

    #[error("model call exceeded the per-unit timeout of {0}s")]
    Timeout(u64),
}

/// Pipeline-fatal failures. All of these leave the deck in a terminal
/// `error` status except the two guard rejections, which leave it untouched.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("failed to commit generated items: {0}")]
    Commit(#[source] anyhow::Error),

    #[error("deck {0} already has an ingestion in flight")]
    AlreadyGenerating(Uuid),

    #[error("deck {0} not found")]
    DeckNotFound(Uuid),

    #[error("record store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// The caller broke the scheduling contract. Rejected synchronously and
/// never clamped.
#[derive(Debug, thiserror::Error)]
pub enum ContractViolation {
    #[error("quality must be an integer between 0 and 5, got {0}")]
    QualityOutOfRange(i32),
}

/// Centralized error type for consistent API error handling.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("Generation service error: {0}")]
    GenerationService(String),
}

impl From<ContractViolation> for ApiError {
    fn from(violation: ContractViolation) -> Self {
        ApiError::ValidationError(violation.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::AlreadyGenerating(_) => ApiError::Conflict(err.to_string()),
            PipelineError::DeckNotFound(_) => ApiError::NotFound(err.to_string()),
            PipelineError::Extraction(_) => ApiError::ValidationError(err.to_string()),
            PipelineError::Commit(source) | PipelineError::Store(source) => {
                ApiError::DatabaseError(source)
            }
        }
    }
}

/// Error context for structured logging.
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }
}

impl ApiError {
    /// Convert to an HTTP response with consistent structure and logging.
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        let status = match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                StatusCode::NOT_FOUND
            }
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                StatusCode::BAD_REQUEST
            }
            ApiError::Conflict(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Conflicting operation in flight"
                );
                StatusCode::CONFLICT
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::GenerationService(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Generation service error"
                );
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let message = match &self {
            ApiError::DatabaseError(_) => {
                "Database operation failed. Please try again.".to_string()
            }
            ApiError::GenerationService(_) => {
                "AI service temporarily unavailable. Please try again.".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ApiResponse::error(message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_builder() {
        let context = ErrorContext::new("ingest_deck", "deck").with_id("abc");
        assert_eq!(context.operation, "ingest_deck");
        assert_eq!(context.resource_type, "deck");
        assert_eq!(context.resource_id, Some("abc".to_string()));
    }

    #[test]
    fn test_status_code_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                ApiError::NotFound("deck".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::ValidationError("bad quality".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Conflict("already generating".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::DatabaseError(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::GenerationService("llm down".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, expected) in cases {
            let (status, _) = error.to_response_with_context(ErrorContext::new("test", "test"));
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_pipeline_error_conversion() {
        let deck_id = Uuid::new_v4();
        assert!(matches!(
            ApiError::from(PipelineError::AlreadyGenerating(deck_id)),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(PipelineError::DeckNotFound(deck_id)),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(ContractViolation::QualityOutOfRange(9)),
            ApiError::ValidationError(_)
        ));
    }
}
