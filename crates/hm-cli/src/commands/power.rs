//! Peak-power command.

use anyhow::Result;
use chrono::{DateTime, Utc};
use hm_core::{AnalysisConfig, Analyzer, Delta, Outcome, PeakPowerQuery, PowerPeak};
use hm_db::Database;

/// Runs the net power peak search over the configured grid meter.
pub fn run(
    db: &Database,
    config: AnalysisConfig,
    window: (DateTime<Utc>, DateTime<Utc>),
    delta: Delta,
) -> Result<Outcome<PowerPeak>> {
    let query = PeakPowerQuery {
        start: Some(window.0),
        end: Some(window.1),
        delta: Some(delta),
    };
    let analyzer = Analyzer::new(db, db, config);
    Ok(analyzer.peak_net_power(&query)?)
}
