//! Sensor readings retrieved from the log store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, ReadingId, SensorTypeId};

/// A single logged sensor value.
///
/// Readings are immutable once retrieved; the matching and selection code
/// only ever borrows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Unique identifier of the log entry.
    pub id: ReadingId,
    /// When the value was sampled.
    pub timestamp: DateTime<Utc>,
    /// The sampled value. Negative power values denote production or discharge.
    pub value: f64,
    /// The device that produced the value.
    pub device_id: DeviceId,
    /// The kind of sensor that produced the value.
    pub sensor_type_id: SensorTypeId,
}

/// A timestamped scalar suitable for temporal matching.
///
/// This trait allows the matcher and selector to work with different reading
/// representations (e.g., [`Reading`] from a log source, or test fixtures).
pub trait TimedValue {
    /// Returns when the value was sampled.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Returns the sampled value.
    fn value(&self) -> f64;
}

impl TimedValue for Reading {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn value(&self) -> f64 {
        self.value
    }
}

impl<T: TimedValue + ?Sized> TimedValue for &T {
    fn timestamp(&self) -> DateTime<Utc> {
        (**self).timestamp()
    }

    fn value(&self) -> f64 {
        (**self).value()
    }
}

/// Returns `true` if the values are in non-decreasing timestamp order.
pub fn is_chronological<T: TimedValue>(values: &[T]) -> bool {
    values
        .windows(2)
        .all(|pair| pair[0].timestamp() <= pair[1].timestamp())
}
