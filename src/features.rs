//! Exposure admission and feature derivation
//!
//! This module decides which of a record's exposures enter a batch and turns
//! each admitted exposure into numeric features:
//! - Type and window admission
//! - Proximity trace, or a single-sample fallback from the scalar distance
//! - Whole-day symptom-onset offset and whole-minute sampling interval
//! - Binary label from the test outcome

use crate::error::InvalidRecordKind;
use crate::types::{Exposure, ExposureFeature, ExposureResult, ExposureType, TestOutcome};
use crate::window::DateWindow;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Exposure-type and time admission policy
#[derive(Debug, Clone, Copy)]
pub struct ExposureFilter {
    include_unconfirmed: bool,
}

impl ExposureFilter {
    pub fn new(include_unconfirmed: bool) -> Self {
        Self {
            include_unconfirmed,
        }
    }

    pub fn admits_type(&self, exposure_type: ExposureType) -> bool {
        match exposure_type {
            ExposureType::Confirmed => true,
            ExposureType::Unconfirmed => self.include_unconfirmed,
        }
    }

    pub fn admits(&self, exposure: &Exposure, window: &DateWindow) -> bool {
        self.admits_type(exposure.exposure_type) && window.contains(exposure.exposure_time)
    }
}

/// Feature deriver for admitted exposures
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Derive the feature tuple of one exposure; `index` is its position in
    /// the parent record and only used for error reporting
    pub fn derive(
        exposure: &Exposure,
        index: usize,
    ) -> Result<ExposureFeature, InvalidRecordKind> {
        let duration_since_symptom_onset_days = exposure
            .duration_since_symptom_onset
            .map(|offset| offset.num_seconds() / SECONDS_PER_DAY);

        let (proximity_trace, temporal_resolution_minutes) = if exposure.proximity_trace.is_empty()
        {
            // No trace recorded: a single sample spanning the whole interaction
            let distance = exposure
                .distance
                .ok_or(InvalidRecordKind::MissingDistance { exposure: index })?;
            let duration = exposure
                .duration
                .ok_or(InvalidRecordKind::MissingDuration { exposure: index })?;
            (vec![distance], duration.num_minutes())
        } else {
            let resolution = exposure
                .proximity_trace_temporal_resolution
                .ok_or(InvalidRecordKind::MissingTemporalResolution { exposure: index })?;
            (exposure.proximity_trace.clone(), resolution.num_minutes())
        };

        Ok(ExposureFeature {
            proximity_trace,
            duration_since_symptom_onset_days,
            temporal_resolution_minutes,
        })
    }

    /// Features of every exposure in `record` admitted by `filter` within `window`,
    /// in record order
    pub fn derive_admitted(
        record: &ExposureResult,
        window: &DateWindow,
        filter: &ExposureFilter,
    ) -> Result<Vec<ExposureFeature>, InvalidRecordKind> {
        record
            .exposures
            .iter()
            .enumerate()
            .filter(|(_, exposure)| filter.admits(exposure, window))
            .map(|(index, exposure)| Self::derive(exposure, index))
            .collect()
    }
}

/// Binary label for a test outcome; only POSITIVE and NEGATIVE have one
pub fn label_for(outcome: TestOutcome) -> Result<u8, InvalidRecordKind> {
    outcome
        .label()
        .ok_or(InvalidRecordKind::InvalidOutcome(outcome))
}
