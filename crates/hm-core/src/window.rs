//! Validated query windows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Reasons a requested window is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The start bound lies after the end bound.
    #[error("window start {start} is after window end {end}")]
    StartAfterEnd {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The end bound lies in the future.
    #[error("window end {end} is in the future (now is {now})")]
    EndInFuture {
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Only one of the two bounds was supplied.
    #[error("a window needs both a start and an end, or neither")]
    Incomplete,
}

/// An inclusive `[start, end]` interval that ends no later than "now".
///
/// Only obtainable through validation, so holding one means the bounds are
/// ordered and not in the future as of the moment it was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Validates a window against the given clock reading.
    ///
    /// `start == end` is accepted and selects a single instant.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::StartAfterEnd { start, end });
        }
        if end > now {
            return Err(WindowError::EndInFuture { end, now });
        }
        Ok(Self { start, end })
    }

    /// Validates an optional window.
    ///
    /// Both bounds absent means "all history" and skips validation entirely.
    pub fn optional(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, WindowError> {
        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Self::new(start, end, now).map(Some),
            _ => Err(WindowError::Incomplete),
        }
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns `true` if `timestamp` falls inside the window (bounds included).
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}
