//! Soft outcomes of the analysis pipelines.
//!
//! Sparse data is an expected state of a sensor network, so "nothing to
//! report" is a value rather than an error. Malformed input is still an
//! error; see [`crate::analysis::AnalysisError`].

use std::fmt;

use serde::Serialize;

/// Why a pipeline produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    /// One or both sequences were empty for the window: a sensor is not reporting.
    NoRecords,
    /// Both sequences had readings but none within the tolerance: sensors are unsynchronized.
    NoMatchWithinDelta,
}

impl NoDataReason {
    /// Human-readable diagnostic.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NoRecords => "There are no records available for the given period",
            Self::NoMatchWithinDelta => {
                "Readings were found within the provided time span, but with no matches within the provided delta"
            }
        }
    }
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Either a computed value or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    Found(T),
    NoData(NoDataReason),
}

impl<T> Outcome<T> {
    /// Returns the found value, if any.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NoData(_) => None,
        }
    }

    /// Returns the no-data reason, if any.
    pub const fn no_data_reason(&self) -> Option<NoDataReason> {
        match self {
            Self::Found(_) => None,
            Self::NoData(reason) => Some(*reason),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(value) => fmt::Display::fmt(value, f),
            Self::NoData(reason) => fmt::Display::fmt(reason, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_render_distinct_messages() {
        assert_ne!(
            NoDataReason::NoRecords.to_string(),
            NoDataReason::NoMatchWithinDelta.to_string()
        );
        insta::assert_snapshot!(
            NoDataReason::NoRecords,
            @"There are no records available for the given period"
        );
        insta::assert_snapshot!(
            NoDataReason::NoMatchWithinDelta,
            @"Readings were found within the provided time span, but with no matches within the provided delta"
        );
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let found: Outcome<u32> = Outcome::Found(7);
        assert_eq!(
            serde_json::to_string(&found).unwrap(),
            r#"{"status":"found","result":7}"#
        );
        let none: Outcome<u32> = Outcome::NoData(NoDataReason::NoMatchWithinDelta);
        assert_eq!(
            serde_json::to_string(&none).unwrap(),
            r#"{"status":"no_data","result":"no_match_within_delta"}"#
        );
    }

    #[test]
    fn accessors_split_variants() {
        let found: Outcome<u32> = Outcome::Found(1);
        assert_eq!(found.no_data_reason(), None);
        assert_eq!(found.found(), Some(1));

        let none: Outcome<u32> = Outcome::NoData(NoDataReason::NoRecords);
        assert_eq!(none.no_data_reason(), Some(NoDataReason::NoRecords));
        assert_eq!(none.found(), None);
    }
}
