//! Building topology: rooms, devices and indoor/outdoor classification.
//!
//! A room whose height is exactly zero is a virtual room standing for the
//! outside of the house (garden, roof, meter cabinet on the façade). Every
//! other room is indoors. This single-field rule is the whole model; it lives
//! in [`Locale::from_height`] and nowhere else.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::BoxError;
use crate::types::{DeviceId, RoomId, ValidationError};

/// Which side of the building envelope a device sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Outdoor,
    Indoor,
}

impl Locale {
    /// Classifies a room height: exactly `0` is outdoor, anything else indoor.
    #[must_use]
    pub fn from_height(height: f64) -> Self {
        if height == 0.0 {
            Self::Outdoor
        } else {
            Self::Indoor
        }
    }

    /// String representation for display and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Outdoor => "outdoor",
            Self::Indoor => "indoor",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical room dimensions in metres. All values are finite and `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDimensions")]
pub struct RoomDimensions {
    length: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct RawDimensions {
    length: f64,
    width: f64,
    height: f64,
}

impl TryFrom<RawDimensions> for RoomDimensions {
    type Error = ValidationError;

    fn try_from(raw: RawDimensions) -> Result<Self, Self::Error> {
        Self::new(raw.length, raw.width, raw.height)
    }
}

impl RoomDimensions {
    /// Creates dimensions after validation.
    pub fn new(length: f64, width: f64, height: f64) -> Result<Self, ValidationError> {
        for (field, value) in [("length", length), ("width", width), ("height", height)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidDimension { field, value });
            }
        }
        Ok(Self {
            length,
            width,
            height,
        })
    }

    #[must_use]
    pub const fn length(&self) -> f64 {
        self.length
    }

    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }
}

/// A room of the house, or the virtual outdoor room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dimensions: RoomDimensions,
}

impl Room {
    /// Returns which side of the envelope the room is on.
    #[must_use]
    pub fn locale(&self) -> Locale {
        Locale::from_height(self.dimensions.height())
    }
}

/// A device installed in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub room_id: RoomId,
}

/// Resolves devices to rooms.
///
/// Implemented by the SQLite store and by [`crate::source::MemoryLogSource`].
pub trait TopologyLookup {
    /// Error raised when the lookup itself fails (not when an entity is absent).
    type Error: StdError + Send + Sync + 'static;

    /// Finds a device by ID.
    fn device(&self, id: &DeviceId) -> Result<Option<Device>, Self::Error>;

    /// Finds a room by ID.
    fn room(&self, id: &RoomId) -> Result<Option<Room>, Self::Error>;
}

/// Topology resolution errors.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// No device with this ID exists.
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// The device points at a room that does not exist.
    #[error("device {device} references unknown room {room}")]
    UnknownRoom { device: DeviceId, room: RoomId },

    /// The device is on the wrong side of the building envelope.
    #[error("device {device} is {actual}, expected {expected}")]
    InvalidDeviceLocation {
        device: DeviceId,
        expected: Locale,
        actual: Locale,
    },

    /// The underlying lookup failed.
    #[error("topology lookup failed")]
    Lookup(#[source] BoxError),
}

/// Resolves a device to its room and classifies it.
pub fn classify<T: TopologyLookup + ?Sized>(
    lookup: &T,
    device_id: &DeviceId,
) -> Result<Locale, TopologyError> {
    let device = lookup
        .device(device_id)
        .map_err(|err| TopologyError::Lookup(Box::new(err)))?
        .ok_or_else(|| TopologyError::UnknownDevice(device_id.clone()))?;
    let room = lookup
        .room(&device.room_id)
        .map_err(|err| TopologyError::Lookup(Box::new(err)))?
        .ok_or_else(|| TopologyError::UnknownRoom {
            device: device_id.clone(),
            room: device.room_id.clone(),
        })?;
    let locale = room.locale();
    tracing::debug!(device = %device_id, room = %room.id, %locale, "classified device");
    Ok(locale)
}

/// Classifies a device and fails unless it is on the `expected` side.
pub fn require_locale<T: TopologyLookup + ?Sized>(
    lookup: &T,
    device_id: &DeviceId,
    expected: Locale,
) -> Result<(), TopologyError> {
    let actual = classify(lookup, device_id)?;
    if actual == expected {
        Ok(())
    } else {
        Err(TopologyError::InvalidDeviceLocation {
            device: device_id.clone(),
            expected,
            actual,
        })
    }
}
