//! Core type definitions with validation.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The delta was negative or unreasonably large.
    #[error("delta must be between 0 and {max} minutes, got {value}")]
    DeltaOutOfRange { value: i64, max: i64 },

    /// A room dimension was negative or not a finite number.
    #[error("room {field} must be a finite value >= 0, got {value}")]
    InvalidDimension { field: &'static str, value: f64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated reading identifier.
    ReadingId, "reading ID"
);

define_string_id!(
    /// A validated device identifier.
    ///
    /// Every device belongs to exactly one room; see [`crate::topology`].
    DeviceId, "device ID"
);

define_string_id!(
    /// A validated room identifier.
    RoomId, "room ID"
);

define_string_id!(
    /// A validated sensor type identifier (e.g., "`TemperatureSensor`").
    SensorTypeId, "sensor type ID"
);

/// Correlation tolerance in whole minutes.
///
/// Two readings from different sequences whose timestamps are at most this
/// far apart are treated as the same instant. Zero is allowed and means the
/// timestamps must coincide exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Delta(i64);

impl Delta {
    /// Tolerance used when a caller does not pick one.
    pub const DEFAULT_MINUTES: i64 = 5;

    /// Upper bound (~1000 years) so the value always fits a [`Duration`].
    pub const MAX_MINUTES: i64 = 1000 * 365 * 24 * 60;

    /// Creates a delta after range validation.
    pub const fn minutes(value: i64) -> Result<Self, ValidationError> {
        if value < 0 || value > Self::MAX_MINUTES {
            return Err(ValidationError::DeltaOutOfRange {
                value,
                max: Self::MAX_MINUTES,
            });
        }
        Ok(Self(value))
    }

    /// Returns the tolerance in minutes.
    #[must_use]
    pub const fn as_minutes(self) -> i64 {
        self.0
    }

    /// Returns the tolerance as a [`Duration`].
    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::minutes(self.0)
    }
}

impl Default for Delta {
    fn default() -> Self {
        Self(Self::DEFAULT_MINUTES)
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

impl TryFrom<i64> for Delta {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::minutes(value)
    }
}

impl From<Delta> for i64 {
    fn from(delta: Delta) -> Self {
        delta.0
    }
}

impl Serialize for Delta {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Delta {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        Self::minutes(value).map_err(serde::de::Error::custom)
    }
}
