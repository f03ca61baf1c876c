use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ContractViolation;
use crate::models::SchedulingState;

/// Lower bound for the ease factor. There is no upper bound.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Recall quality for one review event, validated to 0..=5. A quality of 3
/// or better counts as a successful recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Quality(u8);

impl Quality {
    /// Out-of-range values are a caller contract violation and are
    /// rejected, never clamped.
    pub fn new(value: i32) -> Result<Self, ContractViolation> {
        if (0..=5).contains(&value) {
            Ok(Quality(value as u8))
        } else {
            Err(ContractViolation::QualityOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<i32> for Quality {
    type Error = ContractViolation;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

impl From<Quality> for i32 {
    fn from(quality: Quality) -> i32 {
        quality.0 as i32
    }
}

/// Derived, read-only classification of an item's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewBucket {
    New,
    Learning,
    Review,
}

pub fn bucket(state: &SchedulingState) -> ReviewBucket {
    if state.repetitions == 0 {
        ReviewBucket::New
    } else if state.interval < 6 {
        ReviewBucket::Learning
    } else {
        ReviewBucket::Review
    }
}

/// Applies one SM-2 review to a scheduling state.
///
/// Failed recall (quality < 3) resets repetitions to 0 and the interval to
/// one day. Successful recall grows the interval by the 1 / 6 /
/// round(interval * ease) progression. The ease factor is penalized or
/// rewarded in both branches and floored at [`MIN_EASE_FACTOR`]; the
/// interval multiplication uses the ease factor from before this review.
pub fn schedule(state: &SchedulingState, quality: Quality, now: DateTime<Utc>) -> SchedulingState {
    let q = quality.value() as f64;

    let (repetitions, interval) = if !quality.is_success() {
        (0, 1)
    } else {
        let interval = match state.repetitions {
            0 => 1,
            1 => 6,
            _ => (state.interval as f64 * state.ease_factor).round() as i64,
        };
        (state.repetitions + 1, interval)
    };

    let ease_factor =
        (state.ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASE_FACTOR);

    SchedulingState {
        ease_factor,
        interval,
        repetitions,
        last_reviewed: Some(now),
        next_review: Some(now + Duration::days(interval)),
    }
}
