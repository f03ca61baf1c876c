use anyhow::Result;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::database::Database;
use crate::errors::ApiError;
use crate::models::*;
use crate::progress;
use crate::scheduler::{self, Quality, ReviewBucket};

/// The outcome of one review event: the item's new scheduling state and
/// the user's updated cumulative progress.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewOutcome {
    pub item: Item,
    pub progress: ProgressRecord,
}

/// Service layer over the record store: deck and item CRUD plus the
/// synchronous review path that drives the scheduler and the progress
/// aggregator together.
#[derive(Clone)]
pub struct DeckService {
    db: Database,
}

impl DeckService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_deck(&self, request: CreateDeckRequest) -> Result<Deck, ApiError> {
        if request.title.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "Deck title cannot be empty".to_string(),
            ));
        }

        if let Some(parent_id) = request.parent_deck_id {
            let parent = self
                .db
                .get_deck(parent_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Parent deck '{}' not found", parent_id)))?;

            // One level of nesting only.
            if parent.parent_deck_id.is_some() {
                return Err(ApiError::ValidationError(
                    "Decks can only be nested one level deep".to_string(),
                ));
            }
        }

        let deck = self.db.create_deck(request).await?;
        info!(deck_id = %deck.id, title = %deck.title, "Deck created");
        Ok(deck)
    }

    pub async fn get_deck(&self, id: Uuid) -> Result<Option<Deck>> {
        self.db.get_deck(id).await
    }

    pub async fn list_decks(&self) -> Result<Vec<Deck>> {
        self.db.list_decks().await
    }

    pub async fn create_item(&self, request: CreateItemRequest) -> Result<Item, ApiError> {
        if request.term.trim().is_empty() || request.definition.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "Item term and definition cannot be empty".to_string(),
            ));
        }

        self.db
            .get_deck(request.deck_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Deck '{}' not found", request.deck_id)))?;

        let item = self.db.create_item(request).await?;
        Ok(item)
    }

    pub async fn get_item(&self, id: Uuid) -> Result<Option<Item>> {
        self.db.get_item(id).await
    }

    pub async fn get_deck_items(&self, deck_id: Uuid) -> Result<Vec<Item>> {
        self.db.get_deck_items(deck_id).await
    }

    pub async fn get_items_due(&self) -> Result<Vec<Item>> {
        self.db.get_items_due(Utc::now()).await
    }

    /// Applies one review event: runs the scheduler on the item's state
    /// and the aggregator on the user's progress record, each exactly
    /// once. Reviews for the same (user, item) are last-writer-wins; the
    /// caller serializes submission per item (one card on screen at a
    /// time).
    pub async fn review_item(
        &self,
        item_id: Uuid,
        user_id: &str,
        quality: i32,
    ) -> Result<Option<ReviewOutcome>, ApiError> {
        let quality = Quality::new(quality)?;

        let mut item = match self.db.get_item(item_id).await? {
            Some(item) => item,
            None => return Ok(None),
        };

        let now = Utc::now();
        item.scheduling = scheduler::schedule(&item.scheduling, quality, now);
        self.db.update_item_after_review(&item).await?;

        let existing = self.db.get_progress(user_id, item_id).await?;
        let updated = progress::record(existing.as_ref(), user_id, item_id, quality, now);
        self.db.upsert_progress(&updated).await?;

        info!(
            item_id = %item_id,
            user_id = %user_id,
            quality = quality.value(),
            interval = item.scheduling.interval,
            repetitions = item.scheduling.repetitions,
            "Item reviewed"
        );

        Ok(Some(ReviewOutcome {
            item,
            progress: updated,
        }))
    }

    pub async fn get_progress(
        &self,
        user_id: &str,
        item_id: Uuid,
    ) -> Result<Option<ProgressRecord>> {
        self.db.get_progress(user_id, item_id).await
    }

    /// Derived bucket counts for a deck's items, for the deck overview UI.
    pub async fn deck_stats(&self, deck_id: Uuid) -> Result<Option<DeckStats>> {
        if self.db.get_deck(deck_id).await?.is_none() {
            return Ok(None);
        }

        let items = self.db.get_deck_items(deck_id).await?;
        let now = Utc::now();

        let mut stats = DeckStats {
            total_items: items.len(),
            new_items: 0,
            learning_items: 0,
            review_items: 0,
            due_items: 0,
        };

        for item in &items {
            match scheduler::bucket(&item.scheduling) {
                ReviewBucket::New => stats.new_items += 1,
                ReviewBucket::Learning => stats.learning_items += 1,
                ReviewBucket::Review => stats.review_items += 1,
            }
            let due = match item.scheduling.next_review {
                None => true,
                Some(next) => next <= now,
            };
            if due {
                stats.due_items += 1;
            }
        }

        Ok(Some(stats))
    }
}
