//! Picks the extremal pair out of a match set.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::matcher::MatchedPair;
use crate::reading::TimedValue;

/// The winning score and when it happened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    pub value: f64,
    pub occurred_at: DateTime<Utc>,
}

impl Extremum {
    /// Returns `true` if `self` beats `other`: higher score, or the same
    /// score at an earlier instant. NaN scores never win.
    #[expect(
        clippy::float_cmp,
        reason = "ties are exact score equality by definition"
    )]
    fn beats(&self, other: &Self) -> bool {
        self.value > other.value
            || (self.value == other.value && self.occurred_at < other.occurred_at)
    }
}

/// Keeps the highest-scoring candidate; ties go to the earliest occurrence.
fn keep_best(candidates: impl IntoIterator<Item = Extremum>) -> Option<Extremum> {
    candidates
        .into_iter()
        .filter(|candidate| !candidate.value.is_nan())
        .fold(None, |best, candidate| match best {
            Some(current) if !candidate.beats(&current) => Some(current),
            _ => Some(candidate),
        })
}

/// Scans a match set and keeps the pair maximizing `score`.
///
/// `occurred_at` picks the anchor side whose timestamp is reported.
/// Returns `None` for an empty match set.
pub fn select_max<A, B>(
    pairs: &[MatchedPair<'_, A, B>],
    score: impl Fn(&A, &B) -> f64,
    occurred_at: impl Fn(&A, &B) -> DateTime<Utc>,
) -> Option<Extremum> {
    keep_best(pairs.iter().map(|pair| Extremum {
        value: score(pair.a, pair.b),
        occurred_at: occurred_at(pair.a, pair.b),
    }))
}

/// Returns the largest value of a single sequence, earliest on ties.
pub fn max_reading<T: TimedValue>(readings: &[T]) -> Option<Extremum> {
    keep_best(readings.iter().map(|reading| Extremum {
        value: reading.value(),
        occurred_at: reading.timestamp(),
    }))
}

/// Absolute difference of the two values, the temperature-gap score.
pub fn absolute_difference<A: TimedValue, B: TimedValue>(a: &A, b: &B) -> f64 {
    (a.value() - b.value()).abs()
}
