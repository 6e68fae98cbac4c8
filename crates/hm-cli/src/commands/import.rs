//! Import command for loading rooms, devices and readings into the local `SQLite` store.
//!
//! Input is JSONL on stdin, one record per line, tagged by `type`:
//!
//! ```text
//! {"type":"room","id":"garden","length":10,"width":8,"height":0}
//! {"type":"device","id":"thermo-out","room_id":"garden"}
//! {"type":"reading","timestamp":"2025-03-01T10:00:00Z","value":5.0,"device_id":"thermo-out","sensor_type_id":"TemperatureSensor"}
//! ```

use std::io::BufRead;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hm_core::{Device, DeviceId, Reading, ReadingId, Room, RoomDimensions, RoomId, SensorTypeId};
use hm_db::{Database, deterministic_reading_id};
use serde::{Deserialize, Serialize};

/// Records parsed from one import stream.
#[derive(Debug, Default)]
pub struct ImportBatch {
    pub rooms: Vec<Room>,
    pub devices: Vec<Device>,
    pub readings: Vec<Reading>,
}

/// How many new rows each table received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rooms: usize,
    pub devices: usize,
    pub readings: usize,
}

/// Parses `reader` and stores everything it contains.
pub fn run<R: BufRead>(db: &mut Database, reader: R) -> Result<ImportSummary> {
    let batch = parse_records(reader)?;
    let summary = ImportSummary {
        rooms: db.insert_rooms(&batch.rooms)?,
        devices: db.insert_devices(&batch.devices)?,
        readings: db.insert_readings(&batch.readings)?,
    };
    tracing::info!(?summary, "import complete");
    Ok(summary)
}

/// Parses JSONL import records, skipping blank lines.
pub fn parse_records<R: BufRead>(reader: R) -> Result<ImportBatch> {
    let mut batch = ImportBatch::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: ImportRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        parsed
            .add_to(&mut batch)
            .with_context(|| format!("invalid record on line {}", idx + 1))?;
    }
    Ok(batch)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImportRecord {
    Room {
        id: String,
        #[serde(default)]
        name: Option<String>,
        length: f64,
        width: f64,
        height: f64,
    },
    Device {
        id: String,
        #[serde(default)]
        name: Option<String>,
        room_id: String,
    },
    Reading {
        #[serde(default)]
        id: Option<String>,
        timestamp: String,
        value: f64,
        device_id: String,
        sensor_type_id: String,
    },
}

impl ImportRecord {
    fn add_to(self, batch: &mut ImportBatch) -> Result<()> {
        match self {
            Self::Room {
                id,
                name,
                length,
                width,
                height,
            } => batch.rooms.push(Room {
                id: RoomId::new(id)?,
                name,
                dimensions: RoomDimensions::new(length, width, height)?,
            }),
            Self::Device { id, name, room_id } => batch.devices.push(Device {
                id: DeviceId::new(id)?,
                name,
                room_id: RoomId::new(room_id)?,
            }),
            Self::Reading {
                id,
                timestamp,
                value,
                device_id,
                sensor_type_id,
            } => {
                if !value.is_finite() {
                    anyhow::bail!("reading value must be finite, got {value}");
                }
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .with_context(|| format!("invalid timestamp: {timestamp}"))?
                    .with_timezone(&Utc);
                let device_id = DeviceId::new(device_id)?;
                let sensor_type_id = SensorTypeId::new(sensor_type_id)?;
                let id = match id.filter(|id| !id.trim().is_empty()) {
                    Some(id) => id,
                    None => deterministic_reading_id(&device_id, &sensor_type_id, timestamp),
                };
                batch.readings.push(Reading {
                    id: ReadingId::new(id)?,
                    timestamp,
                    value,
                    device_id,
                    sensor_type_id,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    const HOUSE: &str = r#"
{"type":"room","id":"garden","length":10,"width":8,"height":0}
{"type":"room","id":"kitchen","name":"Kitchen","length":4,"width":3,"height":2.5}
{"type":"device","id":"thermo-out","room_id":"garden"}

{"type":"reading","timestamp":"2025-03-01T10:00:00Z","value":5.0,"device_id":"thermo-out","sensor_type_id":"TemperatureSensor"}
{"type":"reading","id":"r-2","timestamp":"2025-03-01T10:05:00Z","value":6.0,"device_id":"thermo-out","sensor_type_id":"TemperatureSensor"}
"#;

    #[test]
    fn parse_records_sorts_by_kind() {
        let batch = parse_records(Cursor::new(HOUSE)).unwrap();
        assert_eq!(batch.rooms.len(), 2);
        assert_eq!(batch.devices.len(), 1);
        assert_eq!(batch.readings.len(), 2);
        assert_eq!(batch.rooms[1].name.as_deref(), Some("Kitchen"));
        assert_eq!(batch.readings[1].id.as_str(), "r-2");
    }

    #[test]
    fn missing_reading_id_is_derived() {
        let batch = parse_records(Cursor::new(HOUSE)).unwrap();
        let first = &batch.readings[0];
        assert_eq!(
            first.id.as_str(),
            deterministic_reading_id(&first.device_id, &first.sensor_type_id, first.timestamp)
        );
    }

    #[test]
    fn import_twice_inserts_once() {
        let mut db = Database::open_in_memory().unwrap();
        let first = run(&mut db, Cursor::new(HOUSE)).unwrap();
        assert_eq!(
            first,
            ImportSummary {
                rooms: 2,
                devices: 1,
                readings: 2
            }
        );
        let second = run(&mut db, Cursor::new(HOUSE)).unwrap();
        assert_eq!(
            second,
            ImportSummary {
                rooms: 0,
                devices: 0,
                readings: 0
            }
        );
    }

    #[test]
    fn rejects_negative_room_height() {
        let input = r#"{"type":"room","id":"pit","length":1,"width":1,"height":-1}"#;
        let err = parse_records(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("invalid record on line 1"));
    }

    #[test]
    fn rejects_unknown_record_type() {
        let input = r#"{"type":"actuator","id":"valve"}"#;
        let err = parse_records(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("invalid JSON on line 1"));
    }

    #[test]
    fn rejects_bad_timestamp() {
        let input = r#"{"type":"reading","timestamp":"10am","value":1,"device_id":"d","sensor_type_id":"s"}"#;
        let err = parse_records(Cursor::new(input)).unwrap_err();
        assert!(format!("{err:#}").contains("invalid timestamp: 10am"));
    }
}
