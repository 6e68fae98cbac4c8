//! Core domain logic for house reading correlation.
//!
//! This crate contains the fundamental types and logic for:
//! - Topology: classifying devices as indoor or outdoor from their room
//! - Matching: pairing two irregularly sampled reading sequences within a tolerance
//! - Selection: picking the extremal matched pair
//! - Analysis: the temperature-gap and net-power-peak pipelines

pub mod analysis;
pub mod matcher;
pub mod outcome;
pub mod power;
pub mod reading;
pub mod selector;
pub mod source;
pub mod topology;
pub mod types;
pub mod window;

pub use analysis::{
    AnalysisConfig, AnalysisError, Analyzer, DifferenceQuery, PeakPowerQuery,
    TemperatureDifference,
};
pub use matcher::{Correlation, MatchedPair, Pairing, correlate, match_nearest};
pub use outcome::{NoDataReason, Outcome};
pub use power::{Offset, PooledSample, PowerPeak, sum_simultaneous};
pub use reading::{Reading, TimedValue};
pub use selector::Extremum;
pub use source::{LogSource, MemoryLogSource};
pub use topology::{Device, Locale, Room, RoomDimensions, TopologyLookup, classify};
pub use types::{Delta, DeviceId, ReadingId, RoomId, SensorTypeId, ValidationError};
pub use window::{TimeWindow, WindowError};
