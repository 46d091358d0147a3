//! Store statistics
//!
//! A single unfiltered pass over a store, used to sanity-check simulation
//! output before training on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LoaderError;
use crate::store::{RecordCursor, RecordSource};
use crate::types::{ExposureResult, ExposureType, TestOutcome};

/// Counts gathered over every record of a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub records: u64,
    pub positive: u64,
    pub negative: u64,
    pub undetermined: u64,
    /// Records usable with onset-anchored windows
    pub with_infection_onset: u64,
    pub confirmed_exposures: u64,
    pub unconfirmed_exposures: u64,
    /// Exposures carrying a proximity trace rather than a scalar distance
    pub traced_exposures: u64,
    /// Exposures that would fail feature derivation if admitted
    pub exposures_missing_distance: u64,
    pub earliest_test: Option<DateTime<Utc>>,
    pub latest_test: Option<DateTime<Utc>>,
}

impl StoreSummary {
    /// Scan `source` from its first record
    pub fn scan<S: RecordSource>(source: &S) -> Result<Self, LoaderError> {
        let mut cursor = source.open()?;
        let mut summary = Self::default();
        while !cursor.position().is_exhausted() {
            match cursor.read_next()? {
                Some(record) => summary.add(&record),
                None => break,
            }
        }
        log::debug!("scanned {} records from {}", summary.records, source.describe());
        Ok(summary)
    }

    pub fn add(&mut self, record: &ExposureResult) {
        self.records += 1;
        match record.outcome {
            TestOutcome::Positive => self.positive += 1,
            TestOutcome::Negative => self.negative += 1,
            TestOutcome::Undetermined => self.undetermined += 1,
        }
        if record.infection_onset_time.is_some() {
            self.with_infection_onset += 1;
        }

        if let Some(tested) = record.test_administered_time {
            self.earliest_test = Some(self.earliest_test.map_or(tested, |t| t.min(tested)));
            self.latest_test = Some(self.latest_test.map_or(tested, |t| t.max(tested)));
        }

        for exposure in &record.exposures {
            match exposure.exposure_type {
                ExposureType::Confirmed => self.confirmed_exposures += 1,
                ExposureType::Unconfirmed => self.unconfirmed_exposures += 1,
            }
            if !exposure.proximity_trace.is_empty() {
                self.traced_exposures += 1;
            } else if exposure.distance.is_none() {
                self.exposures_missing_distance += 1;
            }
        }
    }

    pub fn total_exposures(&self) -> u64 {
        self.confirmed_exposures + self.unconfirmed_exposures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySource;
    use crate::types::Exposure;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_scan_counts() {
        let day = |d| Utc.with_ymd_and_hms(2020, 6, d, 0, 0, 0).unwrap();
        let source = MemorySource::new(vec![
            ExposureResult::new(1, TestOutcome::Positive)
                .with_test_administered_time(day(12))
                .with_infection_onset_time(day(5))
                .with_exposure(
                    Exposure::new(day(3), ExposureType::Confirmed)
                        .with_trace(vec![1.0], Duration::minutes(5)),
                )
                .with_exposure(Exposure::new(day(4), ExposureType::Unconfirmed)),
            ExposureResult::new(2, TestOutcome::Negative)
                .with_test_administered_time(day(9))
                .with_exposure(
                    Exposure::new(day(8), ExposureType::Confirmed)
                        .with_distance(2.0, Duration::minutes(15)),
                ),
            ExposureResult::new(3, TestOutcome::Undetermined),
        ]);

        let summary = StoreSummary::scan(&source).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.positive, 1);
        assert_eq!(summary.negative, 1);
        assert_eq!(summary.undetermined, 1);
        assert_eq!(summary.with_infection_onset, 1);
        assert_eq!(summary.confirmed_exposures, 2);
        assert_eq!(summary.unconfirmed_exposures, 1);
        assert_eq!(summary.total_exposures(), 3);
        assert_eq!(summary.traced_exposures, 1);
        assert_eq!(summary.exposures_missing_distance, 1);
        assert_eq!(summary.earliest_test, Some(day(9)));
        assert_eq!(summary.latest_test, Some(day(12)));
    }

    #[test]
    fn test_empty_source() {
        let summary = StoreSummary::scan(&MemorySource::default()).unwrap();
        assert_eq!(summary, StoreSummary::default());
    }
}
