use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    deck_service::{DeckService, ReviewOutcome},
    errors::{ApiError, ErrorContext},
    generator::ItemGenerator,
    ingestion::IngestionPipeline,
    models::*,
};

use crate::log_pipeline;

#[derive(Clone)]
pub struct AppState {
    pub deck_service: DeckService,
    pub pipeline: IngestionPipeline,
    pub generator: ItemGenerator,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub filename: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub user_id: String,
    pub quality: i32,
}

#[derive(Deserialize)]
pub struct QuizRequest {
    pub types: Option<Vec<String>>,
    pub count: Option<usize>,
}

#[derive(Deserialize)]
pub struct ProgressParams {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

// Deck endpoints

pub async fn create_deck(
    State(state): State<AppState>,
    Json(request): Json<CreateDeckRequest>,
) -> ApiResult<Deck> {
    info!(title = %request.title, parent = ?request.parent_deck_id, "Creating deck");

    match state.deck_service.create_deck(request).await {
        Ok(deck) => Ok(Json(ApiResponse::success(deck))),
        Err(e) => Err(e.to_response_with_context(ErrorContext::new("create_deck", "deck"))),
    }
}

pub async fn list_decks(State(state): State<AppState>) -> ApiResult<Vec<Deck>> {
    debug!("Listing all decks");

    match state.deck_service.list_decks().await {
        Ok(decks) => Ok(Json(ApiResponse::success(decks))),
        Err(e) => Err(ApiError::DatabaseError(e)
            .to_response_with_context(ErrorContext::new("list_decks", "deck"))),
    }
}

pub async fn get_deck(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Deck> {
    match state.deck_service.get_deck(id).await {
        Ok(Some(deck)) => Ok(Json(ApiResponse::success(deck))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Deck with ID '{}' not found", id));
            Err(error.to_response_with_context(
                ErrorContext::new("get_deck", "deck").with_id(&id.to_string()),
            ))
        }
        Err(e) => Err(ApiError::DatabaseError(e).to_response_with_context(
            ErrorContext::new("get_deck", "deck").with_id(&id.to_string()),
        )),
    }
}

pub async fn get_deck_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Item>> {
    match state.deck_service.get_deck_items(id).await {
        Ok(items) => Ok(Json(ApiResponse::success(items))),
        Err(e) => Err(ApiError::DatabaseError(e).to_response_with_context(
            ErrorContext::new("get_deck_items", "deck").with_id(&id.to_string()),
        )),
    }
}

pub async fn get_deck_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeckStats> {
    match state.deck_service.deck_stats(id).await {
        Ok(Some(stats)) => Ok(Json(ApiResponse::success(stats))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Deck with ID '{}' not found", id));
            Err(error.to_response_with_context(
                ErrorContext::new("get_deck_stats", "deck").with_id(&id.to_string()),
            ))
        }
        Err(e) => Err(ApiError::DatabaseError(e).to_response_with_context(
            ErrorContext::new("get_deck_stats", "deck").with_id(&id.to_string()),
        )),
    }
}

/// Fire-and-forget ingestion: accepted runs return 202 immediately and the
/// deck's status is observable by polling `GET /api/decks/{id}`. A second
/// call while one is in flight gets 409.
pub async fn ingest_deck(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), (StatusCode, Json<ApiResponse<()>>)>
{
    let document = Document::from_text(&request.filename, &request.content);

    match state.pipeline.ingest(id, document).await {
        Ok(ticket) => {
            log_pipeline!(accepted, deck_id = id, filename = request.filename);
            // The completion channel is dropped here; the HTTP contract is
            // fire-and-forget.
            drop(ticket);
            Ok((
                StatusCode::ACCEPTED,
                Json(ApiResponse::success(serde_json::json!({
                    "deck_id": id,
                    "status": DeckStatus::Generating,
                }))),
            ))
        }
        Err(e) => {
            log_pipeline!(rejected, deck_id = id, error = e);
            Err(ApiError::from(e).to_response_with_context(
                ErrorContext::new("ingest_deck", "deck").with_id(&id.to_string()),
            ))
        }
    }
}

pub async fn generate_deck_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QuizRequest>,
) -> ApiResult<Vec<QuizQuestion>> {
    let context = || ErrorContext::new("generate_deck_quiz", "deck").with_id(&id.to_string());

    let items = match state.deck_service.get_deck_items(id).await {
        Ok(items) => items,
        Err(e) => return Err(ApiError::DatabaseError(e).to_response_with_context(context())),
    };

    if items.is_empty() {
        let error = ApiError::ValidationError(format!("Deck '{}' has no items to quiz from", id));
        return Err(error.to_response_with_context(context()));
    }

    let types = request
        .types
        .unwrap_or_else(|| vec!["mcq".to_string(), "short".to_string()]);
    let count = request.count.unwrap_or(5);

    match state.generator.generate_quiz(&items, &types, count).await {
        Ok(questions) => Ok(Json(ApiResponse::success(questions))),
        Err(e) => Err(ApiError::GenerationService(e.to_string())
            .to_response_with_context(context())),
    }
}

// Item endpoints

pub async fn create_item(
    State(state): State<AppState>,
    Json(request): Json<CreateItemRequest>,
) -> ApiResult<Item> {
    info!(deck_id = %request.deck_id, term = %request.term, "Creating item");

    match state.deck_service.create_item(request).await {
        Ok(item) => Ok(Json(ApiResponse::success(item))),
        Err(e) => Err(e.to_response_with_context(ErrorContext::new("create_item", "item"))),
    }
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Item> {
    match state.deck_service.get_item(id).await {
        Ok(Some(item)) => Ok(Json(ApiResponse::success(item))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Item with ID '{}' not found", id));
            Err(error.to_response_with_context(
                ErrorContext::new("get_item", "item").with_id(&id.to_string()),
            ))
        }
        Err(e) => Err(ApiError::DatabaseError(e).to_response_with_context(
            ErrorContext::new("get_item", "item").with_id(&id.to_string()),
        )),
    }
}

/// Synchronous review: applies the scheduler and the progress aggregator
/// to one quality signal. Out-of-range quality is rejected with 400, never
/// clamped.
pub async fn review_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<ReviewOutcome> {
    match state
        .deck_service
        .review_item(id, &request.user_id, request.quality)
        .await
    {
        Ok(Some(outcome)) => Ok(Json(ApiResponse::success(outcome))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Item with ID '{}' not found", id));
            Err(error.to_response_with_context(
                ErrorContext::new("review_item", "item").with_id(&id.to_string()),
            ))
        }
        Err(e) => Err(e.to_response_with_context(
            ErrorContext::new("review_item", "item").with_id(&id.to_string()),
        )),
    }
}

pub async fn get_item_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ProgressParams>,
) -> ApiResult<ProgressRecord> {
    match state.deck_service.get_progress(&params.user_id, id).await {
        Ok(Some(progress)) => Ok(Json(ApiResponse::success(progress))),
        Ok(None) => {
            let error = ApiError::NotFound(format!(
                "No progress for user '{}' on item '{}'",
                params.user_id, id
            ));
            Err(error.to_response_with_context(
                ErrorContext::new("get_item_progress", "progress").with_id(&id.to_string()),
            ))
        }
        Err(e) => Err(ApiError::DatabaseError(e).to_response_with_context(
            ErrorContext::new("get_item_progress", "progress").with_id(&id.to_string()),
        )),
    }
}

pub async fn get_due_items(State(state): State<AppState>) -> ApiResult<Vec<Item>> {
    match state.deck_service.get_items_due().await {
        Ok(items) => {
            debug!(due_count = items.len(), "Due items retrieved");
            Ok(Json(ApiResponse::success(items)))
        }
        Err(e) => Err(ApiError::DatabaseError(e)
            .to_response_with_context(ErrorContext::new("get_due_items", "item"))),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/decks", post(create_deck).get(list_decks))
        .route("/api/decks/:id", get(get_deck))
        .route("/api/decks/:id/items", get(get_deck_items))
        .route("/api/decks/:id/stats", get(get_deck_stats))
        .route("/api/decks/:id/ingest", post(ingest_deck))
        .route("/api/decks/:id/quiz", post(generate_deck_quiz))
        .route("/api/items", post(create_item))
        .route("/api/items/:id", get(get_item))
        .route("/api/items/:id/review", post(review_item))
        .route("/api/items/:id/progress", get(get_item_progress))
        .route("/api/reviews/due", get(get_due_items))
        .with_state(state)
}
