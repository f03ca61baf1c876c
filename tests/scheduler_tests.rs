use chrono::{Duration, Utc};
use study_system::errors::ContractViolation;
use study_system::models::SchedulingState;
use study_system::progress;
use study_system::scheduler::{self, Quality, ReviewBucket, MIN_EASE_FACTOR};
use uuid::Uuid;

fn quality(value: i32) -> Quality {
    Quality::new(value).unwrap()
}

#[test]
fn test_interval_progression_over_successful_reviews() {
    let now = Utc::now();
    let state = SchedulingState::default();

    // First success: one day out.
    let state = scheduler::schedule(&state, quality(4), now);
    assert_eq!(state.repetitions, 1);
    assert_eq!(state.interval, 1);

    // Second success: six days out.
    let state = scheduler::schedule(&state, quality(4), now);
    assert_eq!(state.repetitions, 2);
    assert_eq!(state.interval, 6);

    // Third success: previous interval times the ease factor as it stood
    // before this review's adjustment.
    let ef_before = state.ease_factor;
    let state = scheduler::schedule(&state, quality(4), now);
    assert_eq!(state.repetitions, 3);
    assert_eq!(state.interval, (6.0 * ef_before).round() as i64);
    assert_eq!(
        state.next_review.unwrap(),
        now + Duration::days(state.interval)
    );
}

#[test]
fn test_failure_resets_repetitions_but_not_ease_history() {
    let now = Utc::now();
    let mut state = SchedulingState::default();
    for _ in 0..3 {
        state = scheduler::schedule(&state, quality(5), now);
    }
    assert_eq!(state.repetitions, 3);
    let ease_before = state.ease_factor;

    for failing in [0, 1, 2] {
        let failed = scheduler::schedule(&state, quality(failing), now);
        assert_eq!(failed.repetitions, 0);
        assert_eq!(failed.interval, 1);
        // The ease factor still takes the penalty for the low quality.
        assert!(failed.ease_factor < ease_before);
        assert_eq!(
            failed.next_review.unwrap(),
            now + Duration::days(1)
        );
    }
}

#[test]
fn test_ease_factor_never_drops_below_floor() {
    let now = Utc::now();
    let mut state = SchedulingState::default();
    for _ in 0..20 {
        state = scheduler::schedule(&state, quality(0), now);
        assert!(state.ease_factor >= MIN_EASE_FACTOR);
    }
    assert!((state.ease_factor - MIN_EASE_FACTOR).abs() < 1e-9);
}

#[test]
fn test_quality_five_raises_ease_quality_four_holds_it() {
    let now = Utc::now();
    let state = SchedulingState::default();

    let after_four = scheduler::schedule(&state, quality(4), now);
    assert!((after_four.ease_factor - 2.5).abs() < 1e-9);

    let after_five = scheduler::schedule(&state, quality(5), now);
    assert!((after_five.ease_factor - 2.6).abs() < 1e-9);
}

#[test]
fn test_quality_validation_boundaries() {
    for valid in 0..=5 {
        assert!(Quality::new(valid).is_ok());
    }
    for invalid in [-1, 6, 100, i32::MIN] {
        assert!(matches!(
            Quality::new(invalid),
            Err(ContractViolation::QualityOutOfRange(_))
        ));
    }
}

#[test]
fn test_bucket_thresholds() {
    let mut state = SchedulingState::default();
    assert_eq!(scheduler::bucket(&state), ReviewBucket::New);

    let now = Utc::now();
    state = scheduler::schedule(&state, quality(4), now);
    assert_eq!(scheduler::bucket(&state), ReviewBucket::Learning);

    state = scheduler::schedule(&state, quality(4), now);
    assert_eq!(scheduler::bucket(&state), ReviewBucket::Review);
}

#[test]
fn test_progress_accumulates_counts_and_mean() {
    let now = Utc::now();
    let item_id = Uuid::new_v4();

    let first = progress::record(None, "user-1", item_id, quality(5), now);
    assert_eq!(first.total_reviews, 1);
    assert_eq!(first.successful_reviews, 1);
    assert!((first.average_quality - 5.0).abs() < 1e-9);

    let second = progress::record(Some(&first), "user-1", item_id, quality(2), now);
    assert_eq!(second.total_reviews, 2);
    assert_eq!(second.successful_reviews, 1);
    assert!((second.average_quality - 3.5).abs() < 1e-9);
    assert_eq!(second.last_quality, 2);

    let third = progress::record(Some(&second), "user-1", item_id, quality(3), now);
    assert_eq!(third.total_reviews, 3);
    assert_eq!(third.successful_reviews, 2);
    assert!((third.average_quality - (10.0 / 3.0)).abs() < 1e-9);
}
