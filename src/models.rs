use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a deck. `Generating` is the only transient state;
/// everything else is terminal until the next ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckStatus {
    Idle,
    Generating,
    Ready,
    Error,
}

impl DeckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeckStatus::Idle => "idle",
            DeckStatus::Generating => "generating",
            DeckStatus::Ready => "ready",
            DeckStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(DeckStatus::Idle),
            "generating" => Some(DeckStatus::Generating),
            "ready" => Some(DeckStatus::Ready),
            "error" => Some(DeckStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: Uuid,
    pub title: String,
    /// Single-level nesting only: a parent deck never has a parent itself.
    pub parent_deck_id: Option<Uuid>,
    pub status: DeckStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-item spaced-repetition state. Invariants: `ease_factor >= 1.3`,
/// `interval >= 1` whenever `repetitions > 0`, and `next_review =
/// last_reviewed + interval days` whenever both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub ease_factor: f64,
    pub interval: i64,
    pub repetitions: i32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub next_review: Option<DateTime<Utc>>,
}

impl Default for SchedulingState {
    fn default() -> Self {
        Self {
            ease_factor: 2.5,
            interval: 1,
            repetitions: 0,
            last_reviewed: None,
            next_review: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub term: String,
    pub definition: String,
    pub tags: Vec<String>,
    pub ai_generated: bool,
    /// Stable position within the deck: input unit order, then intra-unit
    /// candidate order for generated items.
    pub position: i64,
    #[serde(flatten)]
    pub scheduling: SchedulingState,
    pub created_at: DateTime<Utc>,
}

/// Cumulative per-(user, item) review statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub item_id: Uuid,
    pub total_reviews: i64,
    pub successful_reviews: i64,
    pub average_quality: f64,
    pub last_review: DateTime<Utc>,
    pub last_quality: i32,
}

/// One page/section of a source document. In-memory only; `index` is the
/// position in the original document and is kept for traceability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUnit {
    pub index: usize,
    pub text: String,
}

/// An unvalidated term/definition pair proposed by the generator for one
/// content unit, prior to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub term: String,
    pub definition: String,
}

/// A source document handed to the ingestion pipeline: raw bytes plus the
/// filename it arrived under.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    pub fn from_text(filename: impl Into<String>, text: &str) -> Self {
        Self::new(filename, text.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeckRequest {
    pub title: String,
    pub parent_deck_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub deck_id: Uuid,
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Counts of items per derived scheduling bucket for one deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckStats {
    pub total_items: usize,
    pub new_items: usize,
    pub learning_items: usize,
    pub review_items: usize,
    pub due_items: usize,
}

/// A quiz question generated from a deck's items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// "mcq" or "short"
    pub question_type: String,
    pub options: Option<Vec<String>>,
    pub answer: String,
    pub explanation: Option<String>,
}
