use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ProgressRecord;
use crate::scheduler::Quality;

/// Folds one review event into a user's progress record for an item,
/// creating the record on first review. Must be called exactly once per
/// review event, alongside (but independent of) the scheduler.
pub fn record(
    existing: Option<&ProgressRecord>,
    user_id: &str,
    item_id: Uuid,
    quality: Quality,
    now: DateTime<Utc>,
) -> ProgressRecord {
    let q = quality.value() as f64;

    let (total_reviews, successful_reviews, prior_average) = match existing {
        Some(progress) => (
            progress.total_reviews + 1,
            progress.successful_reviews + if quality.is_success() { 1 } else { 0 },
            progress.average_quality,
        ),
        None => (1, if quality.is_success() { 1 } else { 0 }, 0.0),
    };

    // Incremental mean; stable enough for per-item review counts.
    let average_quality = (prior_average * (total_reviews - 1) as f64 + q) / total_reviews as f64;

    ProgressRecord {
        user_id: user_id.to_string(),
        item_id,
        total_reviews,
        successful_reviews,
        average_quality,
        last_review: now,
        last_quality: quality.value() as i32,
    }
}
