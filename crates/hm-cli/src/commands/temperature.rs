//! Temperature-difference command.
//!
//! Reports the instant the gap between an outdoor and an indoor device was
//! widest within a window.

use anyhow::Result;
use chrono::{DateTime, Utc};
use hm_core::{
    AnalysisConfig, Analyzer, Delta, DeviceId, DifferenceQuery, Outcome, TemperatureDifference,
};
use hm_db::Database;

/// Runs the outdoor/indoor correlation.
pub fn run(
    db: &Database,
    config: AnalysisConfig,
    outdoor: &str,
    indoor: &str,
    window: (DateTime<Utc>, DateTime<Utc>),
    delta: Delta,
) -> Result<Outcome<TemperatureDifference>> {
    let query = DifferenceQuery {
        outdoor_device: Some(DeviceId::new(outdoor)?),
        indoor_device: Some(DeviceId::new(indoor)?),
        start: Some(window.0),
        end: Some(window.1),
        delta: Some(delta),
    };
    let analyzer = Analyzer::new(db, db, config);
    Ok(analyzer.max_instantaneous_difference(&query)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hm_core::{AnalysisError, Device, Room, RoomDimensions, RoomId};

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).single().unwrap()
    }

    fn house() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_rooms(&[
            Room {
                id: RoomId::new("garden").unwrap(),
                name: None,
                dimensions: RoomDimensions::new(10.0, 8.0, 0.0).unwrap(),
            },
            Room {
                id: RoomId::new("kitchen").unwrap(),
                name: None,
                dimensions: RoomDimensions::new(4.0, 3.0, 2.5).unwrap(),
            },
        ])
        .unwrap();
        db.insert_devices(&[
            Device {
                id: DeviceId::new("out").unwrap(),
                name: None,
                room_id: RoomId::new("garden").unwrap(),
            },
            Device {
                id: DeviceId::new("in").unwrap(),
                name: None,
                room_id: RoomId::new("kitchen").unwrap(),
            },
        ])
        .unwrap();
        db
    }

    #[test]
    fn empty_store_reports_no_records() {
        let db = house();
        let config = crate::Config::default().analysis().unwrap();
        let outcome = run(
            &db,
            config,
            "out",
            "in",
            (ts(9, 0), ts(11, 0)),
            Delta::default(),
        )
        .unwrap();
        assert_eq!(outcome.no_data_reason(), Some(hm_core::NoDataReason::NoRecords));
    }

    #[test]
    fn swapped_devices_are_a_hard_error() {
        let db = house();
        let config = crate::Config::default().analysis().unwrap();
        let err = run(
            &db,
            config,
            "in",
            "out",
            (ts(9, 0), ts(11, 0)),
            Delta::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::InvalidDeviceLocation { .. })
        ));
    }
}
