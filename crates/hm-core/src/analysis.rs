//! The two correlation use cases, wired end to end.
//!
//! Each query is a single pass:
//!
//! ```text
//! check arguments -> validate window -> verify topology -> fetch -> (pool) -> match -> select
//! ```
//!
//! Malformed input fails with [`AnalysisError`] before anything is fetched.
//! Sparse data is not an error: it comes back as [`Outcome::NoData`].

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::matcher::{Correlation, correlate};
use crate::outcome::{NoDataReason, Outcome};
use crate::power::{PowerPeak, net_power_peak};
use crate::reading::{Reading, TimedValue};
use crate::selector::{absolute_difference, select_max};
use crate::source::{BoxError, LogSource};
use crate::topology::{Locale, TopologyError, TopologyLookup, require_locale};
use crate::types::{Delta, DeviceId, RoomId, SensorTypeId};
use crate::window::{TimeWindow, WindowError};

/// Hard failures of the analysis pipelines.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A required identifier, window bound or delta was not supplied.
    #[error("{field} is required")]
    InvalidArgument { field: &'static str },

    #[error("invalid time window: {0}")]
    InvalidTimeWindow(#[from] WindowError),

    /// A device is on the wrong side of the building envelope.
    #[error("device {device} is {actual}, expected {expected}")]
    InvalidDeviceLocation {
        device: DeviceId,
        expected: Locale,
        actual: Locale,
    },

    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error("device {device} references unknown room {room}")]
    UnknownRoom { device: DeviceId, room: RoomId },

    /// The log store or topology lookup failed.
    #[error("failed to fetch data")]
    DataFetch(#[source] BoxError),
}

impl From<TopologyError> for AnalysisError {
    fn from(err: TopologyError) -> Self {
        match err {
            TopologyError::UnknownDevice(device) => Self::UnknownDevice(device),
            TopologyError::UnknownRoom { device, room } => Self::UnknownRoom { device, room },
            TopologyError::InvalidDeviceLocation {
                device,
                expected,
                actual,
            } => Self::InvalidDeviceLocation {
                device,
                expected,
                actual,
            },
            TopologyError::Lookup(source) => Self::DataFetch(source),
        }
    }
}

fn fetch_failed<E: std::error::Error + Send + Sync + 'static>(err: E) -> AnalysisError {
    AnalysisError::DataFetch(Box::new(err))
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, AnalysisError> {
    value.ok_or(AnalysisError::InvalidArgument { field })
}

/// Fixed identities the pipelines query by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// The device metering draw from the utility grid. Required for power queries.
    pub grid_meter_device: Option<DeviceId>,
    /// Sensor type of grid and production power readings.
    pub power_sensor_type: SensorTypeId,
    /// Sensor type of temperature readings.
    pub temperature_sensor_type: SensorTypeId,
}

/// Arguments of [`Analyzer::max_instantaneous_difference`].
///
/// Every field is required; `None` fails with [`AnalysisError::InvalidArgument`].
#[derive(Debug, Clone, Default)]
pub struct DifferenceQuery {
    pub outdoor_device: Option<DeviceId>,
    pub indoor_device: Option<DeviceId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub delta: Option<Delta>,
}

/// Arguments of [`Analyzer::peak_net_power`].
#[derive(Debug, Clone, Default)]
pub struct PeakPowerQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub delta: Option<Delta>,
}

/// Largest outdoor/indoor temperature gap, anchored on the outdoor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureDifference {
    pub value: f64,
    pub occurred_at: DateTime<Utc>,
}

impl fmt::Display for TemperatureDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The maximum instantaneous temperature difference within the selected period was {:.1} °C, at {}",
            self.value,
            self.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Runs the correlation use cases against a log store and building model.
pub struct Analyzer<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    topology: &'a T,
    config: AnalysisConfig,
    now: Option<DateTime<Utc>>,
}

impl<'a, S, T> Analyzer<'a, S, T>
where
    S: LogSource + ?Sized,
    T: TopologyLookup + ?Sized,
{
    #[must_use]
    pub const fn new(source: &'a S, topology: &'a T, config: AnalysisConfig) -> Self {
        Self {
            source,
            topology,
            config,
            now: None,
        }
    }

    /// Pins the clock used to reject windows ending in the future.
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn window(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TimeWindow, AnalysisError> {
        let start = required(start, "start")?;
        let end = required(end, "end")?;
        Ok(TimeWindow::new(start, end, self.now())?)
    }

    /// All readings logged by a device, optionally bounded.
    ///
    /// Supply both bounds or neither; no bounds means the full history.
    pub fn device_readings(
        &self,
        device: &DeviceId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reading>, AnalysisError> {
        let window = TimeWindow::optional(start, end, self.now())?;
        let readings = self
            .source
            .readings_for_device(device, None, window.as_ref())
            .map_err(fetch_failed)?;
        tracing::debug!(device = %device, count = readings.len(), "fetched device readings");
        Ok(readings)
    }

    /// Largest temperature gap between an outdoor and an indoor device.
    pub fn max_instantaneous_difference(
        &self,
        query: &DifferenceQuery,
    ) -> Result<Outcome<TemperatureDifference>, AnalysisError> {
        let outdoor = required(query.outdoor_device.as_ref(), "outdoor device")?;
        let indoor = required(query.indoor_device.as_ref(), "indoor device")?;
        let delta = required(query.delta, "delta")?;
        let window = self.window(query.start, query.end)?;

        require_locale(self.topology, outdoor, Locale::Outdoor)?;
        require_locale(self.topology, indoor, Locale::Indoor)?;

        let kind = &self.config.temperature_sensor_type;
        let outside = self
            .source
            .readings_for_device(outdoor, Some(kind), Some(&window))
            .map_err(fetch_failed)?;
        let inside = self
            .source
            .readings_for_device(indoor, Some(kind), Some(&window))
            .map_err(fetch_failed)?;
        tracing::debug!(
            outdoor = outside.len(),
            indoor = inside.len(),
            %delta,
            "fetched temperature readings"
        );

        let outcome = match correlate(&outside, &inside, delta) {
            Correlation::NoRecords => Outcome::NoData(NoDataReason::NoRecords),
            Correlation::NoMatches => Outcome::NoData(NoDataReason::NoMatchWithinDelta),
            Correlation::Matched(pairs) => {
                select_max(&pairs, absolute_difference, |out, _| out.timestamp()).map_or(
                    Outcome::NoData(NoDataReason::NoMatchWithinDelta),
                    |best| {
                        Outcome::Found(TemperatureDifference {
                            value: best.value,
                            occurred_at: best.occurred_at,
                        })
                    },
                )
            }
        };
        tracing::info!(outdoor = %outdoor, indoor = %indoor, result = %outcome, "temperature difference");
        Ok(outcome)
    }

    /// Peak net power drawn by the house.
    pub fn peak_net_power(
        &self,
        query: &PeakPowerQuery,
    ) -> Result<Outcome<PowerPeak>, AnalysisError> {
        let grid_meter = required(self.config.grid_meter_device.as_ref(), "grid meter device")?;
        let delta = required(query.delta, "delta")?;
        let window = self.window(query.start, query.end)?;

        let kind = &self.config.power_sensor_type;
        let grid = self
            .source
            .readings_for_device(grid_meter, Some(kind), Some(&window))
            .map_err(fetch_failed)?;
        let sources = self
            .source
            .negative_readings_excluding(grid_meter, kind, &window)
            .map_err(fetch_failed)?;
        tracing::debug!(
            grid = grid.len(),
            sources = sources.len(),
            %delta,
            "fetched power readings"
        );

        let outcome = net_power_peak(&grid, &sources, delta);
        tracing::info!(grid_meter = %grid_meter, result = %outcome, "peak net power");
        Ok(outcome)
    }
}
