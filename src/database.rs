use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory sqlite database exists per connection, so the pool
        // must not open a second one.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await?
        } else {
            SqlitePool::connect(database_url).await?
        };

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                parent_deck_id TEXT REFERENCES decks(id),
                status TEXT NOT NULL DEFAULT 'idle',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                deck_id TEXT NOT NULL,
                term TEXT NOT NULL,
                definition TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                ai_generated INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval INTEGER NOT NULL DEFAULT 1,
                repetitions INTEGER NOT NULL DEFAULT 0,
                last_reviewed TEXT,
                next_review TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progress (
                user_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                total_reviews INTEGER NOT NULL DEFAULT 0,
                successful_reviews INTEGER NOT NULL DEFAULT 0,
                average_quality REAL NOT NULL DEFAULT 0.0,
                last_review TEXT NOT NULL,
                last_quality INTEGER NOT NULL,
                PRIMARY KEY (user_id, item_id),
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Deck operations

    pub async fn create_deck(&self, request: CreateDeckRequest) -> Result<Deck> {
        let now = Utc::now();
        let deck = Deck {
            id: Uuid::new_v4(),
            title: request.title,
            parent_deck_id: request.parent_deck_id,
            status: DeckStatus::Idle,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO decks (id, title, parent_deck_id, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(deck.id.to_string())
        .bind(&deck.title)
        .bind(deck.parent_deck_id.map(|id| id.to_string()))
        .bind(deck.status.as_str())
        .bind(deck.created_at.to_rfc3339())
        .bind(deck.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(deck)
    }

    pub async fn get_deck(&self, id: Uuid) -> Result<Option<Deck>> {
        let row = sqlx::query("SELECT * FROM decks WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_deck(&r)).transpose()
    }

    pub async fn list_decks(&self) -> Result<Vec<Deck>> {
        let rows = sqlx::query("SELECT * FROM decks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_deck).collect()
    }

    /// Atomic check-and-set for the at-most-one-ingestion-in-flight guard:
    /// claims the deck by flipping it to `generating` only when no
    /// ingestion is already running. Returns whether the claim succeeded.
    pub async fn try_begin_generation(&self, deck_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE decks SET status = 'generating', updated_at = ?1
            WHERE id = ?2 AND status != 'generating'
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(deck_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_deck_status(&self, deck_id: Uuid, status: DeckStatus) -> Result<()> {
        sqlx::query("UPDATE decks SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(deck_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Item operations

    pub async fn create_item(&self, request: CreateItemRequest) -> Result<Item> {
        let now = Utc::now();
        let position = self.next_position(request.deck_id).await?;

        let item = Item {
            id: Uuid::new_v4(),
            deck_id: request.deck_id,
            term: request.term,
            definition: request.definition,
            tags: request.tags,
            ai_generated: false,
            position,
            scheduling: SchedulingState::default(),
            created_at: now,
        };

        let mut conn = self.pool.acquire().await?;
        self.insert_item(&mut conn, &item).await?;
        Ok(item)
    }

    /// Commits all candidates from one pipeline run in a single
    /// transaction, with default scheduling state and `ai_generated` set.
    /// The transaction is the bulk write's atomicity boundary.
    pub async fn insert_items_bulk(
        &self,
        deck_id: Uuid,
        candidates: &[CandidateItem],
    ) -> Result<Vec<Item>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let offset: i64 = sqlx::query("SELECT COUNT(*) AS n FROM items WHERE deck_id = ?1")
            .bind(deck_id.to_string())
            .fetch_one(&mut *tx)
            .await?
            .get("n");

        let mut items = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            let item = Item {
                id: Uuid::new_v4(),
                deck_id,
                term: candidate.term.clone(),
                definition: candidate.definition.clone(),
                tags: Vec::new(),
                ai_generated: true,
                position: offset + i as i64,
                scheduling: SchedulingState::default(),
                created_at: now,
            };
            self.insert_item(&mut *tx, &item).await?;
            items.push(item);
        }

        tx.commit().await?;
        Ok(items)
    }

    async fn insert_item(
        &self,
        executor: &mut sqlx::SqliteConnection,
        item: &Item,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, deck_id, term, definition, tags, ai_generated, position,
                               ease_factor, interval, repetitions, last_reviewed, next_review,
                               created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.deck_id.to_string())
        .bind(&item.term)
        .bind(&item.definition)
        .bind(serde_json::to_string(&item.tags)?)
        .bind(item.ai_generated)
        .bind(item.position)
        .bind(item.scheduling.ease_factor)
        .bind(item.scheduling.interval)
        .bind(item.scheduling.repetitions)
        .bind(item.scheduling.last_reviewed.map(|d| d.to_rfc3339()))
        .bind(item.scheduling.next_review.map(|d| d.to_rfc3339()))
        .bind(item.created_at.to_rfc3339())
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_item(&self, id: Uuid) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_item(&r)).transpose()
    }

    pub async fn get_deck_items(&self, deck_id: Uuid) -> Result<Vec<Item>> {
        let rows = sqlx::query("SELECT * FROM items WHERE deck_id = ?1 ORDER BY position ASC")
            .bind(deck_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_item).collect()
    }

    /// Items due for review: never reviewed, or next review at or before
    /// `now`.
    pub async fn get_items_due(&self, now: DateTime<Utc>) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM items
            WHERE next_review IS NULL OR next_review <= ?1
            ORDER BY next_review ASC
            "#,
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    pub async fn update_item_after_review(&self, item: &Item) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE items
            SET ease_factor = ?1, interval = ?2, repetitions = ?3,
                last_reviewed = ?4, next_review = ?5
            WHERE id = ?6
            "#,
        )
        .bind(item.scheduling.ease_factor)
        .bind(item.scheduling.interval)
        .bind(item.scheduling.repetitions)
        .bind(item.scheduling.last_reviewed.map(|d| d.to_rfc3339()))
        .bind(item.scheduling.next_review.map(|d| d.to_rfc3339()))
        .bind(item.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn next_position(&self, deck_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM items WHERE deck_id = ?1")
            .bind(deck_id.to_string())
            .fetch_one(&self.pool)
            .await?
            .get("n");
        Ok(count)
    }

    // Progress operations

    pub async fn get_progress(&self, user_id: &str, item_id: Uuid) -> Result<Option<ProgressRecord>> {
        let row = sqlx::query("SELECT * FROM progress WHERE user_id = ?1 AND item_id = ?2")
            .bind(user_id)
            .bind(item_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_progress(&r)).transpose()
    }

    pub async fn upsert_progress(&self, progress: &ProgressRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO progress (user_id, item_id, total_reviews, successful_reviews,
                                  average_quality, last_review, last_quality)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (user_id, item_id) DO UPDATE SET
                total_reviews = excluded.total_reviews,
                successful_reviews = excluded.successful_reviews,
                average_quality = excluded.average_quality,
                last_review = excluded.last_review,
                last_quality = excluded.last_quality
            "#,
        )
        .bind(&progress.user_id)
        .bind(progress.item_id.to_string())
        .bind(progress.total_reviews)
        .bind(progress.successful_reviews)
        .bind(progress.average_quality)
        .bind(progress.last_review.to_rfc3339())
        .bind(progress.last_quality)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_deck(row: &SqliteRow) -> Result<Deck> {
    let status_str: String = row.get("status");
    let status = DeckStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown deck status '{}'", status_str))?;

    Ok(Deck {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        title: row.get("title"),
        parent_deck_id: row
            .get::<Option<String>, _>("parent_deck_id")
            .map(|s| Uuid::parse_str(&s))
            .transpose()?,
        status,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_item(row: &SqliteRow) -> Result<Item> {
    Ok(Item {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        deck_id: Uuid::parse_str(&row.get::<String, _>("deck_id"))?,
        term: row.get("term"),
        definition: row.get("definition"),
        tags: serde_json::from_str(&row.get::<String, _>("tags")).unwrap_or_default(),
        ai_generated: row.get("ai_generated"),
        position: row.get("position"),
        scheduling: SchedulingState {
            ease_factor: row.get("ease_factor"),
            interval: row.get("interval"),
            repetitions: row.get("repetitions"),
            last_reviewed: parse_optional_timestamp(row.get("last_reviewed")),
            next_review: parse_optional_timestamp(row.get("next_review")),
        },
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_progress(row: &SqliteRow) -> Result<ProgressRecord> {
    Ok(ProgressRecord {
        user_id: row.get("user_id"),
        item_id: Uuid::parse_str(&row.get::<String, _>("item_id"))?,
        total_reviews: row.get("total_reviews"),
        successful_reviews: row.get("successful_reviews"),
        average_quality: row.get("average_quality"),
        last_review: parse_timestamp(&row.get::<String, _>("last_review"))?,
        last_quality: row.get("last_quality"),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
