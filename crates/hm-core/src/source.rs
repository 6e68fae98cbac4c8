//! The log store as seen by the analysis pipelines.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::error::Error as StdError;

use crate::power::pool_streams;
use crate::reading::Reading;
use crate::topology::{Device, Room, TopologyLookup};
use crate::types::{DeviceId, RoomId, SensorTypeId};
use crate::window::TimeWindow;

/// Type-erased error from an adapter.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Range queries over logged readings.
///
/// Every method returns readings sorted by timestamp ascending; the matcher
/// relies on it. Windows are inclusive at both ends.
pub trait LogSource {
    /// Error raised when the store cannot answer.
    type Error: StdError + Send + Sync + 'static;

    /// Readings of one device, optionally restricted to a sensor type and a window.
    ///
    /// `None` for the window means all history.
    fn readings_for_device(
        &self,
        device: &DeviceId,
        sensor_type: Option<&SensorTypeId>,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Reading>, Self::Error>;

    /// Negative readings of `sensor_type` from every device except `excluded`.
    fn negative_readings_excluding(
        &self,
        excluded: &DeviceId,
        sensor_type: &SensorTypeId,
        window: &TimeWindow,
    ) -> Result<Vec<Reading>, Self::Error>;
}

/// A log store and building model held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSource {
    rooms: BTreeMap<RoomId, Room>,
    devices: BTreeMap<DeviceId, Device>,
    readings: Vec<Reading>,
}

impl MemoryLogSource {
    /// Adds or replaces a room.
    pub fn add_room(&mut self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    /// Adds or replaces a device.
    pub fn add_device(&mut self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }

    /// Appends a reading. Insertion order breaks timestamp ties.
    pub fn add_reading(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    fn in_window(reading: &Reading, window: Option<&TimeWindow>) -> bool {
        window.is_none_or(|window| window.contains(reading.timestamp))
    }
}

impl LogSource for MemoryLogSource {
    type Error = Infallible;

    fn readings_for_device(
        &self,
        device: &DeviceId,
        sensor_type: Option<&SensorTypeId>,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Reading>, Self::Error> {
        let mut readings: Vec<Reading> = self
            .readings
            .iter()
            .filter(|r| &r.device_id == device)
            .filter(|r| sensor_type.is_none_or(|kind| &r.sensor_type_id == kind))
            .filter(|r| Self::in_window(r, window))
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    fn negative_readings_excluding(
        &self,
        excluded: &DeviceId,
        sensor_type: &SensorTypeId,
        window: &TimeWindow,
    ) -> Result<Vec<Reading>, Self::Error> {
        let mut per_device: BTreeMap<&DeviceId, Vec<Reading>> = BTreeMap::new();
        for reading in &self.readings {
            if &reading.device_id != excluded
                && &reading.sensor_type_id == sensor_type
                && reading.value < 0.0
                && window.contains(reading.timestamp)
            {
                per_device
                    .entry(&reading.device_id)
                    .or_default()
                    .push(reading.clone());
            }
        }
        Ok(pool_streams(per_device.into_values().map(|mut stream| {
            stream.sort_by_key(|r| r.timestamp);
            stream
        })))
    }
}

impl TopologyLookup for MemoryLogSource {
    type Error = Infallible;

    fn device(&self, id: &DeviceId) -> Result<Option<Device>, Self::Error> {
        Ok(self.devices.get(id).cloned())
    }

    fn room(&self, id: &RoomId) -> Result<Option<Room>, Self::Error> {
        Ok(self.rooms.get(id).cloned())
    }
}
