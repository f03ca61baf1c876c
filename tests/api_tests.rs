use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use study_system::api::{create_router, AppState};
use study_system::generator::ItemGenerator;
use study_system::ingestion::{IngestionPipeline, IngestionSettings};
use study_system::llm_providers::TextCompleter;
use study_system::{Database, DeckService};
use uuid::Uuid;

/// Routes card prompts and quiz prompts to canned responses by system
/// message, so API tests never talk to a real model.
struct CannedCompleter {
    delay: Duration,
}

#[async_trait]
impl TextCompleter for CannedCompleter {
    async fn complete(&self, system: Option<&str>, _prompt: &str) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let system = system.unwrap_or_default();
        if system.contains("quiz") {
            Ok(r#"[{
                "question": "What is the powerhouse of the cell?",
                "question_type": "mcq",
                "options": ["Mitochondria", "Nucleus", "Ribosome", "Golgi"],
                "answer": "Mitochondria",
                "explanation": "It produces ATP."
            }]"#
                .to_string())
        } else {
            Ok(r#"[{"term": "What is ATP?", "definition": "Cellular energy currency"}]"#
                .to_string())
        }
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

async fn create_test_server_with_delay(delay: Duration) -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let generator = ItemGenerator::new(Arc::new(CannedCompleter { delay }));
    let deck_service = DeckService::new(db.clone());
    let pipeline = IngestionPipeline::new(
        db,
        generator.clone(),
        IngestionSettings {
            min_unit_chars: 10,
            max_concurrent_units: 2,
            unit_timeout_secs: 5,
        },
    );
    let state = AppState {
        deck_service,
        pipeline,
        generator,
    };

    TestServer::new(create_router(state)).unwrap()
}

async fn create_test_server() -> TestServer {
    create_test_server_with_delay(Duration::ZERO).await
}

async fn create_deck(server: &TestServer, title: &str) -> Value {
    let response = server
        .post("/api/decks")
        .json(&json!({ "title": title, "parent_deck_id": null }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"].clone()
}

async fn create_item(server: &TestServer, deck_id: &str, term: &str, definition: &str) -> Value {
    let response = server
        .post("/api/items")
        .json(&json!({
            "deck_id": deck_id,
            "term": term,
            "definition": definition,
            "tags": ["test"]
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"].clone()
}

async fn wait_for_status(server: &TestServer, deck_id: &str, expected: &str) {
    for _ in 0..200 {
        let response = server.get(&format!("/api/decks/{}", deck_id)).await;
        let body: Value = response.json();
        if body["data"]["status"] == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("deck {} never reached status '{}'", deck_id, expected);
}

#[tokio::test]
async fn test_create_and_get_deck() {
    let server = create_test_server().await;

    let deck = create_deck(&server, "Biology").await;
    assert_eq!(deck["title"], "Biology");
    assert_eq!(deck["status"], "idle");

    let deck_id = deck["id"].as_str().unwrap();
    let response = server.get(&format!("/api/decks/{}", deck_id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], deck_id);

    let list: Value = server.get("/api/decks").await.json();
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_deck_rejects_empty_title() {
    let server = create_test_server().await;

    let response = server
        .post("/api/decks")
        .json(&json!({ "title": "   ", "parent_deck_id": null }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_get_nonexistent_deck() {
    let server = create_test_server().await;
    let response = server.get(&format!("/api/decks/{}", Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_flow_updates_item_and_progress() {
    let server = create_test_server().await;
    let deck = create_deck(&server, "Chemistry").await;
    let deck_id = deck["id"].as_str().unwrap();
    let item = create_item(&server, deck_id, "What is NaCl?", "Table salt").await;
    let item_id = item["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/items/{}/review", item_id))
        .json(&json!({ "user_id": "user-1", "quality": 4 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["item"]["repetitions"], 1);
    assert_eq!(body["data"]["item"]["interval"], 1);
    assert_eq!(body["data"]["progress"]["total_reviews"], 1);
    assert_eq!(body["data"]["progress"]["successful_reviews"], 1);

    let response = server
        .post(&format!("/api/items/{}/review", item_id))
        .json(&json!({ "user_id": "user-1", "quality": 5 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["item"]["repetitions"], 2);
    assert_eq!(body["data"]["item"]["interval"], 6);

    let progress: Value = server
        .get(&format!("/api/items/{}/progress?user_id=user-1", item_id))
        .await
        .json();
    assert_eq!(progress["data"]["total_reviews"], 2);
    assert_eq!(progress["data"]["last_quality"], 5);
}

#[tokio::test]
async fn test_review_rejects_out_of_range_quality() {
    let server = create_test_server().await;
    let deck = create_deck(&server, "Chemistry").await;
    let deck_id = deck["id"].as_str().unwrap();
    let item = create_item(&server, deck_id, "What is H2O?", "Water").await;
    let item_id = item["id"].as_str().unwrap();

    for quality in [-1, 6, 9] {
        let response = server
            .post(&format!("/api/items/{}/review", item_id))
            .json(&json!({ "user_id": "user-1", "quality": quality }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // The item is untouched by rejected reviews.
    let body: Value = server.get(&format!("/api/items/{}", item_id)).await.json();
    assert_eq!(body["data"]["repetitions"], 0);
}

#[tokio::test]
async fn test_review_nonexistent_item() {
    let server = create_test_server().await;
    let response = server
        .post(&format!("/api/items/{}/review", Uuid::new_v4()))
        .json(&json!({ "user_id": "user-1", "quality": 3 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_due_items_endpoint() {
    let server = create_test_server().await;
    let deck = create_deck(&server, "History").await;
    let deck_id = deck["id"].as_str().unwrap();
    create_item(&server, deck_id, "When was 1066?", "Battle of Hastings").await;

    // Never-reviewed items are due immediately.
    let body: Value = server.get("/api/reviews/due").await.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // A successful review pushes the item into the future.
    let item_id = body["data"][0]["id"].as_str().unwrap().to_string();
    server
        .post(&format!("/api/items/{}/review", item_id))
        .json(&json!({ "user_id": "user-1", "quality": 5 }))
        .await
        .assert_status_ok();

    let body: Value = server.get("/api/reviews/due").await.json();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_deck_stats_endpoint() {
    let server = create_test_server().await;
    let deck = create_deck(&server, "Physics").await;
    let deck_id = deck["id"].as_str().unwrap();
    create_item(&server, deck_id, "What is force?", "Mass times acceleration").await;

    let body: Value = server
        .get(&format!("/api/decks/{}/stats", deck_id))
        .await
        .json();
    assert_eq!(body["data"]["total_items"], 1);
    assert_eq!(body["data"]["new_items"], 1);
    assert_eq!(body["data"]["due_items"], 1);
}

#[tokio::test]
async fn test_ingest_accepted_and_items_appear() {
    let server = create_test_server().await;
    let deck = create_deck(&server, "Cell biology").await;
    let deck_id = deck["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/decks/{}/ingest", deck_id))
        .json(&json!({
            "filename": "lecture.txt",
            "content": "The mitochondria is the powerhouse of the cell."
        }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "generating");

    wait_for_status(&server, deck_id, "ready").await;

    let items: Value = server
        .get(&format!("/api/decks/{}/items", deck_id))
        .await
        .json();
    let items = items["data"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["term"], "What is ATP?");
    assert_eq!(items[0]["ai_generated"], true);
}

#[tokio::test]
async fn test_ingest_conflict_while_generating() {
    let server = create_test_server_with_delay(Duration::from_millis(200)).await;
    let deck = create_deck(&server, "Slow deck").await;
    let deck_id = deck["id"].as_str().unwrap();

    let request = json!({
        "filename": "lecture.txt",
        "content": "A unit long enough to reach the generator."
    });

    server
        .post(&format!("/api/decks/{}/ingest", deck_id))
        .json(&request)
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = server
        .post(&format!("/api/decks/{}/ingest", deck_id))
        .json(&request)
        .await;
    response.assert_status(StatusCode::CONFLICT);

    wait_for_status(&server, deck_id, "ready").await;
}

#[tokio::test]
async fn test_ingest_unknown_deck() {
    let server = create_test_server().await;
    let response = server
        .post(&format!("/api/decks/{}/ingest", Uuid::new_v4()))
        .json(&json!({ "filename": "lecture.txt", "content": "some content" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quiz_generation_from_deck_items() {
    let server = create_test_server().await;
    let deck = create_deck(&server, "Quiz deck").await;
    let deck_id = deck["id"].as_str().unwrap();
    create_item(&server, deck_id, "What is ATP?", "Cellular energy currency").await;

    let response = server
        .post(&format!("/api/decks/{}/quiz", deck_id))
        .json(&json!({ "types": ["mcq"], "count": 1 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let questions = body["data"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["question_type"], "mcq");
    assert_eq!(questions[0]["answer"], "Mitochondria");
}

#[tokio::test]
async fn test_quiz_on_empty_deck_is_rejected() {
    let server = create_test_server().await;
    let deck = create_deck(&server, "Empty deck").await;
    let deck_id = deck["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/decks/{}/quiz", deck_id))
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subdeck_creation() {
    let server = create_test_server().await;
    let parent = create_deck(&server, "Parent").await;
    let parent_id = parent["id"].as_str().unwrap();

    let response = server
        .post("/api/decks")
        .json(&json!({ "title": "Child", "parent_deck_id": parent_id }))
        .await;
    response.assert_status_ok();
    let child: Value = response.json();
    let child_id = child["data"]["id"].as_str().unwrap();

    // A second level of nesting is rejected.
    let response = server
        .post("/api/decks")
        .json(&json!({ "title": "Grandchild", "parent_deck_id": child_id }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
