//! Net house power: grid draw offset by local production.
//!
//! The grid meter reports what the house takes from the utility. Production
//! and discharge devices (solar inverters, batteries) report negative values
//! for what they feed in. Netting the two gives what the house actually
//! consumed at an instant:
//!
//! ```text
//! net = grid - source        (source <= 0, so net >= grid)
//! ```
//!
//! Source readings from every production device are pooled into one ordered
//! sequence. Readings reported at the same instant are summed into a single
//! sample, so each device's output counts whatever it is named. The pooled
//! samples are then matched against the grid sequence with
//! [`Pairing::Exclusive`]: a sample offsets exactly one grid reading, so the
//! same production is never subtracted twice.
//!
//! Readings are energy-meter values, reported in Wh.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::matcher::{Correlation, Pairing, correlate_with};
use crate::outcome::{NoDataReason, Outcome};
use crate::reading::{Reading, TimedValue};
use crate::selector::{Extremum, max_reading, select_max};
use crate::types::Delta;

/// Whether production readings were available to offset grid draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Offset {
    /// Net consumption was computed from matched grid/source pairs.
    Applied,
    /// No production readings existed; the value is the raw grid maximum.
    Unavailable,
}

/// Peak power drawn by the house.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerPeak {
    pub value: f64,
    pub occurred_at: DateTime<Utc>,
    pub offset: Offset,
}

impl PowerPeak {
    fn new(extremum: Extremum, offset: Offset) -> Self {
        Self {
            value: extremum.value,
            occurred_at: extremum.occurred_at,
            offset,
        }
    }
}

impl fmt::Display for PowerPeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        match self.offset {
            Offset::Applied => write!(
                f,
                "The peak net power consumption of the house within the selected period was {:.1} Wh, at {at}",
                self.value
            ),
            Offset::Unavailable => write!(
                f,
                "The peak power consumption from the grid within the selected period was {:.1} Wh, at {at} \
                 (no production or discharge readings were available to offset it)",
                self.value
            ),
        }
    }
}

/// Computes the peak net consumption.
///
/// `grid` and `sources` must each be sorted by timestamp. Source readings
/// sharing a timestamp are summed first. An empty `sources` is a degraded but
/// successful case: the grid's own maximum is returned with
/// [`Offset::Unavailable`]. Grid readings left without a free source sample
/// within `delta` do not take part in the netted maximum.
pub fn net_power_peak<G: TimedValue, S: TimedValue>(
    grid: &[G],
    sources: &[S],
    delta: Delta,
) -> Outcome<PowerPeak> {
    if grid.is_empty() {
        return Outcome::NoData(NoDataReason::NoRecords);
    }
    let sources = sum_simultaneous(sources);
    if sources.is_empty() {
        tracing::debug!(grid = grid.len(), "no production readings, using raw grid maximum");
        return max_reading(grid).map_or(Outcome::NoData(NoDataReason::NoRecords), |peak| {
            Outcome::Found(PowerPeak::new(peak, Offset::Unavailable))
        });
    }

    match correlate_with(grid, &sources, delta, Pairing::Exclusive) {
        Correlation::NoRecords => Outcome::NoData(NoDataReason::NoRecords),
        Correlation::NoMatches => Outcome::NoData(NoDataReason::NoMatchWithinDelta),
        Correlation::Matched(pairs) => select_max(
            &pairs,
            |draw, source| draw.value() - source.value(),
            |draw, _| draw.timestamp(),
        )
        .map_or(Outcome::NoData(NoDataReason::NoMatchWithinDelta), |peak| {
            Outcome::Found(PowerPeak::new(peak, Offset::Applied))
        }),
    }
}

/// Merges per-device sequences into one chronologically ordered sequence.
///
/// Each input must already be sorted. Readings sharing a timestamp are
/// ordered by device ID, then by their original position, so the pooled
/// order is deterministic regardless of the order of `streams`. Readings are
/// kept individually; [`net_power_peak`] sums the simultaneous ones.
pub fn pool_streams(streams: impl IntoIterator<Item = Vec<Reading>>) -> Vec<Reading> {
    let mut pooled: Vec<Reading> = streams.into_iter().flatten().collect();
    pooled.sort_by(|x, y| {
        x.timestamp
            .cmp(&y.timestamp)
            .then_with(|| x.device_id.cmp(&y.device_id))
    });
    pooled
}

/// Production summed over every device reporting at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PooledSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// How many readings were added together.
    pub readings: usize,
}

impl TimedValue for PooledSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn value(&self) -> f64 {
        self.value
    }
}

/// Collapses a sorted sequence so that each timestamp appears once, carrying
/// the sum of every reading taken at it.
pub fn sum_simultaneous<S: TimedValue>(readings: &[S]) -> Vec<PooledSample> {
    let mut pooled: Vec<PooledSample> = Vec::with_capacity(readings.len());
    for reading in readings {
        match pooled.last_mut() {
            Some(last) if last.timestamp == reading.timestamp() => {
                last.value += reading.value();
                last.readings += 1;
            }
            _ => pooled.push(PooledSample {
                timestamp: reading.timestamp(),
                value: reading.value(),
                readings: 1,
            }),
        }
    }
    pooled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceId, ReadingId, SensorTypeId};
    use chrono::{Duration, TimeZone};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn reading(device: &str, minutes: i64, value: f64) -> Reading {
        Reading {
            id: ReadingId::new(format!("{device}-{minutes}")).unwrap(),
            timestamp: ts(minutes),
            value,
            device_id: DeviceId::new(device).unwrap(),
            sensor_type_id: SensorTypeId::new("EnergyConsumptionSensor").unwrap(),
        }
    }

    fn delta(minutes: i64) -> Delta {
        Delta::minutes(minutes).unwrap()
    }

    #[test]
    fn empty_grid_has_no_records() {
        let sources = vec![reading("solar", 0, -3.0)];
        let outcome = net_power_peak::<Reading, Reading>(&[], &sources, delta(5));
        assert_eq!(outcome, Outcome::NoData(NoDataReason::NoRecords));
    }

    #[test]
    fn missing_production_degrades_to_grid_maximum() {
        let grid = vec![reading("grid", 0, 30.0)];
        let outcome = net_power_peak::<Reading, Reading>(&grid, &[], delta(5));
        let Outcome::Found(peak) = outcome else {
            panic!("expected a degraded peak");
        };
        assert!((peak.value - 30.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(0));
        assert_eq!(peak.offset, Offset::Unavailable);
        assert!(peak.to_string().contains("no production or discharge readings"));
    }

    #[test]
    fn degraded_peak_equals_grid_maximum() {
        let grid = vec![
            reading("grid", 0, 12.0),
            reading("grid", 3, 48.5),
            reading("grid", 9, 7.0),
        ];
        let Outcome::Found(peak) = net_power_peak::<Reading, Reading>(&grid, &[], delta(1)) else {
            panic!("expected a degraded peak");
        };
        let max = max_reading(&grid).unwrap();
        assert!((peak.value - max.value).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, max.occurred_at);
    }

    #[test]
    fn unmatched_grid_readings_are_excluded() {
        let grid = vec![reading("grid", 0, 30.0), reading("grid", 5, 20.0)];
        let sources = vec![reading("solar", 4, -10.0)];
        let Outcome::Found(peak) = net_power_peak(&grid, &sources, delta(5)) else {
            panic!("expected a net peak");
        };
        // The 10:04 sample belongs to 10:05 (1 minute away), leaving 10:00 unmatched.
        assert!((peak.value - 30.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(5));
        assert_eq!(peak.offset, Offset::Applied);
    }

    #[test]
    fn production_sample_is_subtracted_once() {
        let grid = vec![
            reading("grid", 0, 10.0),
            reading("grid", 2, 11.0),
            reading("grid", 4, 12.0),
        ];
        let sources = vec![reading("solar", 2, -100.0)];
        let Outcome::Found(peak) = net_power_peak(&grid, &sources, delta(5)) else {
            panic!("expected a net peak");
        };
        assert!((peak.value - 111.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(2));
    }

    #[test]
    fn grid_point_outside_delta_does_not_count() {
        let grid = vec![reading("grid", 0, 30.0), reading("grid", 5, 20.0)];
        let sources = vec![reading("solar", 4, -10.0)];
        let Outcome::Found(peak) = net_power_peak(&grid, &sources, delta(3)) else {
            panic!("expected a net peak");
        };
        // Only 10:05 is within 3 minutes of the source sample: 20 - (-10) = 30.
        assert!((peak.value - 30.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(5));
        insta::assert_snapshot!(
            peak,
            @"The peak net power consumption of the house within the selected period was 30.0 Wh, at 2025-03-01T10:05:00Z"
        );
    }

    #[test]
    fn unsynchronized_sources_report_no_match() {
        let grid = vec![reading("grid", 0, 30.0)];
        let sources = vec![reading("battery", 30, -2.0)];
        assert_eq!(
            net_power_peak(&grid, &sources, delta(5)),
            Outcome::NoData(NoDataReason::NoMatchWithinDelta)
        );
    }

    #[test]
    fn pooled_sources_interleave_devices() {
        let solar = vec![reading("solar", 1, -4.0), reading("solar", 10, -6.0)];
        let battery = vec![reading("battery", 1, -2.0), reading("battery", 5, -1.0)];
        let pooled = pool_streams([solar, battery]);

        let order: Vec<(String, i64)> = pooled
            .iter()
            .map(|r| (r.device_id.to_string(), (r.timestamp - ts(0)).num_minutes()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("battery".to_string(), 1),
                ("solar".to_string(), 1),
                ("battery".to_string(), 5),
                ("solar".to_string(), 10),
            ]
        );
    }

    #[test]
    fn each_grid_reading_nets_against_its_nearest_source() {
        let grid = vec![reading("grid", 0, 10.0), reading("grid", 10, 15.0)];
        let pooled = pool_streams([
            vec![reading("solar", 1, -20.0), reading("solar", 9, -1.0)],
            vec![reading("battery", 4, -50.0)],
        ]);
        let Outcome::Found(peak) = net_power_peak(&grid, &pooled, delta(5)) else {
            panic!("expected a net peak");
        };
        // 10:00 -> solar@10:01 (30), 10:10 -> solar@10:09 (16).
        assert!((peak.value - 30.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(0));
    }

    #[test]
    fn simultaneous_sources_are_summed() {
        let grid = vec![reading("grid", 0, 30.0)];
        let pooled = pool_streams([
            vec![reading("battery", 0, -5.0)],
            vec![reading("solar", 0, -10.0)],
        ]);
        let Outcome::Found(peak) = net_power_peak(&grid, &pooled, delta(5)) else {
            panic!("expected a net peak");
        };
        assert!((peak.value - 45.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(0));
    }

    #[test]
    fn summed_sources_do_not_depend_on_device_names() {
        let grid = vec![reading("grid", 0, 30.0), reading("grid", 4, 12.0)];
        let peak_with = |battery: &str| {
            let pooled = pool_streams([
                vec![reading(battery, 0, -5.0), reading(battery, 4, -1.0)],
                vec![reading("solar", 0, -10.0)],
            ]);
            net_power_peak(&grid, &pooled, delta(5))
        };
        assert_eq!(peak_with("battery"), peak_with("zbattery"));
        let Outcome::Found(peak) = peak_with("zbattery") else {
            panic!("expected a net peak");
        };
        assert!((peak.value - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sum_simultaneous_counts_contributors() {
        let pooled = pool_streams([
            vec![reading("battery", 1, -2.0), reading("battery", 5, -1.0)],
            vec![reading("solar", 1, -4.0)],
        ]);
        assert_eq!(
            sum_simultaneous(&pooled),
            vec![
                PooledSample {
                    timestamp: ts(1),
                    value: -6.0,
                    readings: 2
                },
                PooledSample {
                    timestamp: ts(5),
                    value: -1.0,
                    readings: 1
                },
            ]
        );
    }

    #[test]
    fn grid_reading_falls_back_to_a_free_source() {
        // 10:02 goes to 10:03, its nearest; 10:00 still has 10:05 in range.
        let grid = vec![reading("grid", 0, 100.0), reading("grid", 3, 10.0)];
        let sources = vec![reading("solar", 2, -1.0), reading("solar", 5, -1.0)];
        let Outcome::Found(peak) = net_power_peak(&grid, &sources, delta(5)) else {
            panic!("expected a net peak");
        };
        assert!((peak.value - 101.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(0));
    }

    #[test]
    fn used_source_is_not_taken_twice_when_another_is_in_range() {
        let grid = vec![reading("grid", 0, 40.0), reading("grid", 2, 45.0)];
        let pooled = pool_streams([
            vec![reading("battery", 1, -50.0)],
            vec![reading("solar", 4, -2.0)],
        ]);
        let Outcome::Found(peak) = net_power_peak(&grid, &pooled, delta(5)) else {
            panic!("expected a net peak");
        };
        // battery@10:01 is equidistant and goes to the earlier 10:00; 10:02
        // nets against solar@10:04 (47) rather than the battery again (95).
        assert!((peak.value - 90.0).abs() < f64::EPSILON);
        assert_eq!(peak.occurred_at, ts(0));
    }
}
