//! Storage layer for house readings.
//!
//! Persists rooms, devices and sensor readings with `rusqlite` and serves
//! them back through the [`LogSource`] and [`TopologyLookup`] traits of
//! `hm-core`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared without external
//! synchronization (for example a `Mutex<Database>`).
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with nanosecond precision
//! (e.g., `2025-03-01T10:00:00.000000000Z`), the full resolution of
//! `DateTime<Utc>`. Every stored value has the same width, so:
//! - Lexicographic ordering matches chronological ordering
//! - Range filters can compare the TEXT column directly
//!
//! ## Topology
//!
//! `devices.room_id` is deliberately not a foreign key. Readings and devices
//! may be imported before the rooms they reference; a dangling reference is
//! reported at query time as an unknown room.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use hm_core::Reading;
use hm_core::source::LogSource;
use hm_core::topology::{Device, Room, RoomDimensions, TopologyLookup};
use hm_core::types::{DeviceId, ReadingId, RoomId, SensorTypeId, ValidationError};
use hm_core::window::TimeWindow;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored reading timestamp.
    #[error("invalid timestamp for reading {reading_id}: {timestamp}")]
    TimestampParse {
        reading_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row violates a domain invariant (empty ID, negative dimension).
    #[error("invalid stored value: {0}")]
    Validation(#[from] ValidationError),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

const READING_COLUMNS: &str = "id, timestamp, value, device_id, sensor_type_id";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name TEXT,
                length REAL NOT NULL,
                width REAL NOT NULL,
                height REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS devices (
                id TEXT PRIMARY KEY,
                name TEXT,
                room_id TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_devices_room ON devices(room_id);

            -- Readings table: one logged sensor value per row
            -- timestamp: RFC 3339 UTC, nanosecond precision, fixed width
            -- value: negative power values denote production or discharge
            CREATE TABLE IF NOT EXISTS readings (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                value REAL NOT NULL,
                device_id TEXT NOT NULL,
                sensor_type_id TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_readings_device_time
                ON readings(device_id, sensor_type_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_readings_sensor_time
                ON readings(sensor_type_id, timestamp);
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of rooms, ignoring duplicates by ID.
    pub fn insert_rooms(&mut self, rooms: &[Room]) -> Result<usize, DbError> {
        if rooms.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO rooms (id, name, length, width, height) VALUES (?, ?, ?, ?, ?)",
            )?;
            for room in rooms {
                inserted += stmt.execute(params![
                    room.id.as_str(),
                    room.name,
                    room.dimensions.length(),
                    room.dimensions.width(),
                    room.dimensions.height(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Inserts a batch of devices, ignoring duplicates by ID.
    pub fn insert_devices(&mut self, devices: &[Device]) -> Result<usize, DbError> {
        if devices.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO devices (id, name, room_id) VALUES (?, ?, ?)")?;
            for device in devices {
                inserted += stmt.execute(params![
                    device.id.as_str(),
                    device.name,
                    device.room_id.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Inserts a batch of readings, ignoring duplicates by ID.
    pub fn insert_readings(&mut self, readings: &[Reading]) -> Result<usize, DbError> {
        if readings.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO readings ({READING_COLUMNS}) VALUES (?, ?, ?, ?, ?)"
            ))?;
            for reading in readings {
                inserted += stmt.execute(params![
                    reading.id.as_str(),
                    format_timestamp(reading.timestamp),
                    reading.value,
                    reading.device_id.as_str(),
                    reading.sensor_type_id.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(received = readings.len(), inserted, "stored readings");
        Ok(inserted)
    }

    /// Lists readings of one device ordered by timestamp then ID.
    ///
    /// `sensor_type` and `window` narrow the result when given. The window is
    /// inclusive of both bounds.
    pub fn list_readings(
        &self,
        device: &DeviceId,
        sensor_type: Option<&SensorTypeId>,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Reading>, DbError> {
        let start = window.map(|w| format_timestamp(w.start()));
        let end = window.map(|w| format_timestamp(w.end()));
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE device_id = ?1
              AND (?2 IS NULL OR sensor_type_id = ?2)
              AND (?3 IS NULL OR timestamp >= ?3)
              AND (?4 IS NULL OR timestamp <= ?4)
            ORDER BY timestamp ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map(
            params![device.as_str(), sensor_type.map(SensorTypeId::as_str), start, end],
            RawReading::from_row,
        )?;
        collect_readings(rows)
    }

    /// Lists negative readings of `sensor_type` from every device but `excluded`.
    ///
    /// Ordered by timestamp, then device, then ID, so readings pooled from
    /// several production devices come back as one ordered sequence.
    pub fn list_negative_readings_excluding(
        &self,
        excluded: &DeviceId,
        sensor_type: &SensorTypeId,
        window: &TimeWindow,
    ) -> Result<Vec<Reading>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {READING_COLUMNS}
            FROM readings
            WHERE device_id != ?1
              AND sensor_type_id = ?2
              AND value < 0
              AND timestamp BETWEEN ?3 AND ?4
            ORDER BY timestamp ASC, device_id ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map(
            params![
                excluded.as_str(),
                sensor_type.as_str(),
                format_timestamp(window.start()),
                format_timestamp(window.end()),
            ],
            RawReading::from_row,
        )?;
        collect_readings(rows)
    }

    /// Finds a device by ID.
    pub fn find_device(&self, id: &DeviceId) -> Result<Option<Device>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, room_id FROM devices WHERE id = ?",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, name, room_id)| -> Result<Device, DbError> {
            Ok(Device {
                id: DeviceId::new(id)?,
                name,
                room_id: RoomId::new(room_id)?,
            })
        })
        .transpose()
    }

    /// Finds a room by ID.
    pub fn find_room(&self, id: &RoomId) -> Result<Option<Room>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, length, width, height FROM rooms WHERE id = ?",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, name, length, width, height)| -> Result<Room, DbError> {
            Ok(Room {
                id: RoomId::new(id)?,
                name,
                dimensions: RoomDimensions::new(length, width, height)?,
            })
        })
        .transpose()
    }
}

impl LogSource for Database {
    type Error = DbError;

    fn readings_for_device(
        &self,
        device: &DeviceId,
        sensor_type: Option<&SensorTypeId>,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<Reading>, Self::Error> {
        self.list_readings(device, sensor_type, window)
    }

    fn negative_readings_excluding(
        &self,
        excluded: &DeviceId,
        sensor_type: &SensorTypeId,
        window: &TimeWindow,
    ) -> Result<Vec<Reading>, Self::Error> {
        self.list_negative_readings_excluding(excluded, sensor_type, window)
    }
}

impl TopologyLookup for Database {
    type Error = DbError;

    fn device(&self, id: &DeviceId) -> Result<Option<Device>, Self::Error> {
        self.find_device(id)
    }

    fn room(&self, id: &RoomId) -> Result<Option<Room>, Self::Error> {
        self.find_room(id)
    }
}

/// A reading row before validation.
struct RawReading {
    id: String,
    timestamp: String,
    value: f64,
    device_id: String,
    sensor_type_id: String,
}

impl RawReading {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            value: row.get(2)?,
            device_id: row.get(3)?,
            sensor_type_id: row.get(4)?,
        })
    }

    fn into_reading(self) -> Result<Reading, DbError> {
        let timestamp = parse_timestamp(&self.timestamp, &self.id)?;
        Ok(Reading {
            id: ReadingId::new(self.id)?,
            timestamp,
            value: self.value,
            device_id: DeviceId::new(self.device_id)?,
            sensor_type_id: SensorTypeId::new(self.sensor_type_id)?,
        })
    }
}

fn collect_readings(
    rows: impl Iterator<Item = rusqlite::Result<RawReading>>,
) -> Result<Vec<Reading>, DbError> {
    let mut readings = Vec::new();
    for row in rows {
        readings.push(row?.into_reading()?);
    }
    Ok(readings)
}

/// Derives a stable reading ID from what identifies a sample.
///
/// Re-importing the same sample yields the same ID, so duplicate imports are
/// ignored by the `INSERT OR IGNORE` above.
#[must_use]
pub fn deterministic_reading_id(
    device: &DeviceId,
    sensor_type: &SensorTypeId,
    timestamp: DateTime<Utc>,
) -> String {
    let content = format!(
        "reading|{device}|{sensor_type}|{}",
        format_timestamp(timestamp)
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
}

fn parse_timestamp(timestamp: &str, reading_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            reading_id: reading_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
