//! Nearest-within-tolerance join of two reading sequences.
//!
//! # Algorithm Summary
//!
//! Both inputs arrive sorted by timestamp. For every reading `a` of the
//! anchor sequence we look for the reading of the other sequence closest in
//! time, and keep the pair only when that distance is at most the tolerance.
//!
//! Because the anchors are visited in order, the position of "the last
//! candidate not after `a`" only ever moves forward. A single cursor over the
//! candidates therefore serves all anchors, giving an O(n + m) sweep:
//!
//! 1. Advance the cursor past every candidate with timestamp `<= a`.
//! 2. The nearest candidate is either the last one passed (predecessor) or
//!    the one under the cursor (successor).
//! 3. Equidistant candidates resolve to the earlier timestamp; identical
//!    timestamps resolve to the earlier position in the candidate sequence.
//!
//! With [`Pairing::Exclusive`] every candidate is used at most once:
//!
//! 1. Mutual nearest neighbours are paired first (a reverse sweep, another
//!    O(n + m)).
//! 2. Anchors still unpaired then take, in order, their nearest candidate not
//!    yet used within the tolerance. Only anchors with no free candidate in
//!    range are left out.
//!
//! The matcher is pure: inputs are borrowed, never reordered or copied.

use chrono::{DateTime, Duration, Utc};

use crate::reading::{TimedValue, is_chronological};
use crate::types::Delta;

/// An anchor reading paired with its nearest candidate.
#[derive(Debug)]
pub struct MatchedPair<'a, A, B> {
    pub a: &'a A,
    pub b: &'a B,
}

impl<A, B> Clone for MatchedPair<'_, A, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, B> Copy for MatchedPair<'_, A, B> {}

impl<A: TimedValue, B: TimedValue> MatchedPair<'_, A, B> {
    /// Absolute time between the two readings.
    pub fn distance(&self) -> Duration {
        distance(self.a.timestamp(), self.b.timestamp())
    }
}

/// Result of correlating two sequences.
///
/// The two empty variants carry different operational meaning and must stay
/// distinguishable: `NoRecords` means a sensor did not report at all,
/// `NoMatches` means both reported but never within the tolerance.
#[derive(Debug)]
pub enum Correlation<'a, A, B> {
    /// At least one of the sequences was empty.
    NoRecords,
    /// Both sequences had readings, but no pair fell within the tolerance.
    NoMatches,
    /// One or more admissible pairs, in anchor order.
    Matched(Vec<MatchedPair<'a, A, B>>),
}

/// How candidates may be shared between anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pairing {
    /// Each anchor takes its nearest candidate; a candidate may serve many anchors.
    #[default]
    Nearest,
    /// A candidate serves at most one anchor; mutual nearest neighbours pair first.
    Exclusive,
}

/// Correlates `anchors` against `candidates`, classifying empty outcomes.
pub fn correlate<'a, A: TimedValue, B: TimedValue>(
    anchors: &'a [A],
    candidates: &'a [B],
    delta: Delta,
) -> Correlation<'a, A, B> {
    correlate_with(anchors, candidates, delta, Pairing::Nearest)
}

/// Like [`correlate`], with an explicit [`Pairing`] policy.
pub fn correlate_with<'a, A: TimedValue, B: TimedValue>(
    anchors: &'a [A],
    candidates: &'a [B],
    delta: Delta,
    pairing: Pairing,
) -> Correlation<'a, A, B> {
    if anchors.is_empty() || candidates.is_empty() {
        return Correlation::NoRecords;
    }
    let pairs = match pairing {
        Pairing::Nearest => match_nearest(anchors, candidates, delta),
        Pairing::Exclusive => match_exclusive(anchors, candidates, delta),
    };
    tracing::debug!(
        anchors = anchors.len(),
        candidates = candidates.len(),
        matched = pairs.len(),
        %delta,
        ?pairing,
        "correlated sequences"
    );
    if pairs.is_empty() {
        Correlation::NoMatches
    } else {
        Correlation::Matched(pairs)
    }
}

/// Pairs every anchor with its nearest candidate within `delta`.
///
/// Both slices must be sorted by timestamp ascending. Anchors without a
/// candidate inside the tolerance are left out; each returned pair satisfies
/// `|a.timestamp - b.timestamp| <= delta`.
pub fn match_nearest<'a, A: TimedValue, B: TimedValue>(
    anchors: &'a [A],
    candidates: &'a [B],
    delta: Delta,
) -> Vec<MatchedPair<'a, A, B>> {
    nearest_indices(anchors, candidates, delta)
        .into_iter()
        .map(|(ai, bi)| MatchedPair {
            a: &anchors[ai],
            b: &candidates[bi],
        })
        .collect()
}

/// Pairs anchors with candidates within `delta`, using each candidate once.
///
/// Mutual nearest neighbours are paired first. Every anchor left over then
/// takes its nearest unused candidate within the tolerance, visiting anchors
/// in order. Pairs are returned in anchor order.
pub fn match_exclusive<'a, A: TimedValue, B: TimedValue>(
    anchors: &'a [A],
    candidates: &'a [B],
    delta: Delta,
) -> Vec<MatchedPair<'a, A, B>> {
    let mut owner = vec![None; candidates.len()];
    for (bi, ai) in nearest_indices(candidates, anchors, delta) {
        owner[bi] = Some(ai);
    }

    let mut assigned = vec![None; anchors.len()];
    let mut used = vec![false; candidates.len()];
    for (ai, bi) in nearest_indices(anchors, candidates, delta) {
        if owner[bi] == Some(ai) {
            assigned[ai] = Some(bi);
            used[bi] = true;
        }
    }

    let tolerance = delta.as_duration();
    for (ai, anchor) in anchors.iter().enumerate() {
        if assigned[ai].is_some() {
            continue;
        }
        if let Some(bi) = nearest_unused(anchor.timestamp(), candidates, &used, tolerance) {
            assigned[ai] = Some(bi);
            used[bi] = true;
        }
    }

    assigned
        .into_iter()
        .enumerate()
        .filter_map(|(ai, bi)| {
            bi.map(|bi| MatchedPair {
                a: &anchors[ai],
                b: &candidates[bi],
            })
        })
        .collect()
}

/// Closest candidate to `at` not yet marked in `used`, within `tolerance`.
///
/// Same tie rules as the sweep: the earlier timestamp wins, then the earlier
/// position.
fn nearest_unused<B: TimedValue>(
    at: DateTime<Utc>,
    candidates: &[B],
    used: &[bool],
    tolerance: Duration,
) -> Option<usize> {
    let split = candidates.partition_point(|c| c.timestamp() <= at);

    let mut before: Option<usize> = None;
    for bi in (0..split).rev() {
        let stamp = candidates[bi].timestamp();
        if at - stamp > tolerance {
            break;
        }
        if used[bi] {
            continue;
        }
        match before {
            Some(found) if candidates[found].timestamp() != stamp => break,
            _ => before = Some(bi),
        }
    }

    let after = (split..candidates.len())
        .take_while(|&bi| candidates[bi].timestamp() - at <= tolerance)
        .find(|&bi| !used[bi]);

    match (before, after) {
        (Some(b), Some(n)) => {
            if at - candidates[b].timestamp() <= candidates[n].timestamp() - at {
                Some(b)
            } else {
                Some(n)
            }
        }
        (found, None) | (None, found) => found,
    }
}

/// The sweep itself, as `(anchor index, candidate index)` pairs.
fn nearest_indices<A: TimedValue, B: TimedValue>(
    anchors: &[A],
    candidates: &[B],
    delta: Delta,
) -> Vec<(usize, usize)> {
    debug_assert!(is_chronological(anchors), "anchors must be sorted");
    debug_assert!(is_chronological(candidates), "candidates must be sorted");

    let tolerance = delta.as_duration();
    let mut pairs = Vec::new();
    if candidates.is_empty() {
        return pairs;
    }

    // `next`: first candidate strictly after the current anchor.
    // `run_start`: first candidate sharing the timestamp of `candidates[next - 1]`.
    let mut next = 0;
    let mut run_start = 0;

    for (ai, anchor) in anchors.iter().enumerate() {
        let at = anchor.timestamp();
        while next < candidates.len() && candidates[next].timestamp() <= at {
            if next == 0 || candidates[next].timestamp() != candidates[next - 1].timestamp() {
                run_start = next;
            }
            next += 1;
        }

        let predecessor = (next > 0).then_some(run_start);
        let successor = (next < candidates.len()).then_some(next);
        let nearest = match (predecessor, successor) {
            (Some(before), Some(after)) => {
                if at - candidates[before].timestamp() <= candidates[after].timestamp() - at {
                    before
                } else {
                    after
                }
            }
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => continue,
        };

        if distance(at, candidates[nearest].timestamp()) <= tolerance {
            pairs.push((ai, nearest));
        }
    }

    pairs
}

fn distance(x: DateTime<Utc>, y: DateTime<Utc>) -> Duration {
    if x >= y { x - y } else { y - x }
}
