//! Core types for the exposure loader
//!
//! This module defines the record schema read from a store (exposure results
//! and their exposure events) and the batch structures handed to model code.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label emitted for a positive test outcome
pub const POSITIVE_LABEL: u8 = 1;

/// Label emitted for a negative test outcome
pub const NEGATIVE_LABEL: u8 = 0;

/// Whether an exposure was confirmed by a contact report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExposureType {
    Confirmed,
    Unconfirmed,
}

/// Result of the test attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestOutcome {
    Positive,
    Negative,
    /// Unset, inconclusive, or any outcome name this schema does not know
    #[default]
    #[serde(other)]
    Undetermined,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Positive => "POSITIVE",
            TestOutcome::Negative => "NEGATIVE",
            TestOutcome::Undetermined => "UNDETERMINED",
        }
    }

    /// Binary training label, if the outcome has one
    pub fn label(&self) -> Option<u8> {
        match self {
            TestOutcome::Positive => Some(POSITIVE_LABEL),
            TestOutcome::Negative => Some(NEGATIVE_LABEL),
            TestOutcome::Undetermined => None,
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One simulated proximity interaction between a record's subject and
/// another individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    /// Start of the interaction (UTC)
    pub exposure_time: DateTime<Utc>,
    pub exposure_type: ExposureType,
    /// Identifier of the other individual
    #[serde(default)]
    pub source_uuid: i64,
    /// Distance samples, one per `proximity_trace_temporal_resolution`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proximity_trace: Vec<f32>,
    /// Sampling interval of `proximity_trace`
    #[serde(
        default,
        rename = "proximity_trace_temporal_resolution_secs",
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub proximity_trace_temporal_resolution: Option<Duration>,
    /// Scalar distance, present when no trace was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    /// Length of the interaction
    #[serde(
        default,
        rename = "duration_secs",
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
    /// Exposure time minus the source's symptom onset; negative when the
    /// exposure preceded onset
    #[serde(
        default,
        rename = "duration_since_symptom_onset_secs",
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_since_symptom_onset: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attenuation: Option<f32>,
}

impl Exposure {
    /// Create an exposure with no trace, distance or durations set
    pub fn new(exposure_time: DateTime<Utc>, exposure_type: ExposureType) -> Self {
        Self {
            exposure_time,
            exposure_type,
            source_uuid: 0,
            proximity_trace: Vec::new(),
            proximity_trace_temporal_resolution: None,
            distance: None,
            duration: None,
            duration_since_symptom_onset: None,
            attenuation: None,
        }
    }

    /// Attach a proximity trace sampled every `resolution`
    pub fn with_trace(mut self, trace: Vec<f32>, resolution: Duration) -> Self {
        self.proximity_trace = trace;
        self.proximity_trace_temporal_resolution = Some(resolution);
        self
    }

    /// Attach a scalar distance and interaction duration
    pub fn with_distance(mut self, distance: f32, duration: Duration) -> Self {
        self.distance = Some(distance);
        self.duration = Some(duration);
        self
    }

    pub fn with_symptom_onset_offset(mut self, offset: Duration) -> Self {
        self.duration_since_symptom_onset = Some(offset);
        self
    }

    pub fn with_source(mut self, source_uuid: i64) -> Self {
        self.source_uuid = source_uuid;
        self
    }
}

/// One simulated individual's test result plus their exposure history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureResult {
    #[serde(default)]
    pub agent_uuid: i64,
    #[serde(default)]
    pub outcome: TestOutcome,
    /// Hazard accumulated by the agent at test time
    #[serde(default)]
    pub hazard: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_administered_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_received_time: Option<DateTime<Utc>>,
    /// Known only for individuals whose simulated infection course is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infection_onset_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exposures: Vec<Exposure>,
}

impl ExposureResult {
    pub fn new(agent_uuid: i64, outcome: TestOutcome) -> Self {
        Self {
            agent_uuid,
            outcome,
            hazard: 0.0,
            test_administered_time: None,
            test_received_time: None,
            infection_onset_time: None,
            exposures: Vec::new(),
        }
    }

    pub fn with_test_administered_time(mut self, time: DateTime<Utc>) -> Self {
        self.test_administered_time = Some(time);
        self
    }

    pub fn with_infection_onset_time(mut self, time: DateTime<Utc>) -> Self {
        self.infection_onset_time = Some(time);
        self
    }

    pub fn with_exposure(mut self, exposure: Exposure) -> Self {
        self.exposures.push(exposure);
        self
    }
}

/// Numeric features of one admitted exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureFeature {
    /// Distance samples; a single synthetic sample when the record had no trace
    pub proximity_trace: Vec<f32>,
    /// Whole days since the source's symptom onset, truncated toward zero
    pub duration_since_symptom_onset_days: Option<i64>,
    /// Sampling interval of `proximity_trace` in whole minutes
    pub temporal_resolution_minutes: i64,
}

/// A batch of labeled records.
///
/// `exposures` is flat across all records; `group_sizes[i]` says how many of
/// them belong to the record labeled `labels[i]`, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub exposures: Vec<ExposureFeature>,
    pub labels: Vec<u8>,
    pub group_sizes: Vec<usize>,
}

impl Batch {
    pub fn with_capacity(records: usize) -> Self {
        Self {
            exposures: Vec::new(),
            labels: Vec::with_capacity(records),
            group_sizes: Vec::with_capacity(records),
        }
    }

    /// Number of labeled records in the batch
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append one record's admitted features and its label
    pub fn push_record(&mut self, features: Vec<ExposureFeature>, label: u8) {
        self.group_sizes.push(features.len());
        self.labels.push(label);
        self.exposures.extend(features);
    }

    /// Re-associate the flat feature list with the records it came from.
    ///
    /// Stops at the first group that runs past the end of `exposures`.
    pub fn groups(&self) -> impl Iterator<Item = (u8, &[ExposureFeature])> + '_ {
        let mut start = 0usize;
        self.labels
            .iter()
            .zip(self.group_sizes.iter())
            .map_while(move |(&label, &size)| {
                let end = start.checked_add(size)?;
                let group = self.exposures.get(start..end)?;
                start = end;
                Some((label, group))
            })
    }
}

/// Serde adapter storing an optional duration as whole seconds
pub(crate) mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&duration.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = Option::<i64>::deserialize(deserializer)?;
        seconds
            .map(|s| {
                Duration::try_seconds(s).ok_or_else(|| {
                    serde::de::Error::custom(format!("duration of {s} seconds is out of range"))
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_exposure_result() {
        let json = r#"{
            "agent_uuid": 42,
            "outcome": "POSITIVE",
            "hazard": 0.25,
            "test_administered_time": "2020-06-10T00:00:00Z",
            "infection_onset_time": "2020-06-03T12:00:00Z",
            "exposures": [{
                "exposure_time": "2020-06-02T08:00:00Z",
                "exposure_type": "CONFIRMED",
                "source_uuid": 7,
                "proximity_trace": [1.5, 2.0, 0.5],
                "proximity_trace_temporal_resolution_secs": 300,
                "duration_since_symptom_onset_secs": -86400
            }]
        }"#;

        let record: ExposureResult = serde_json::from_str(json).unwrap();
        assert_eq!(record.agent_uuid, 42);
        assert_eq!(record.outcome, TestOutcome::Positive);
        assert_eq!(
            record.infection_onset_time,
            Some(Utc.with_ymd_and_hms(2020, 6, 3, 12, 0, 0).unwrap())
        );

        let exposure = &record.exposures[0];
        assert_eq!(exposure.exposure_type, ExposureType::Confirmed);
        assert_eq!(exposure.proximity_trace, vec![1.5, 2.0, 0.5]);
        assert_eq!(
            exposure.proximity_trace_temporal_resolution,
            Some(Duration::minutes(5))
        );
        assert_eq!(exposure.duration_since_symptom_onset, Some(Duration::days(-1)));
        assert_eq!(exposure.distance, None);
        assert_eq!(exposure.duration, None);
    }

    #[test]
    fn test_zero_duration_is_not_absent() {
        let json = r#"{
            "exposure_time": "2020-06-02T08:00:00Z",
            "exposure_type": "UNCONFIRMED",
            "duration_since_symptom_onset_secs": 0
        }"#;

        let exposure: Exposure = serde_json::from_str(json).unwrap();
        assert_eq!(exposure.duration_since_symptom_onset, Some(Duration::zero()));
        assert_eq!(exposure.duration, None);
    }

    #[test]
    fn test_unknown_outcome_is_undetermined() {
        let record: ExposureResult =
            serde_json::from_str(r#"{"outcome": "INCONCLUSIVE"}"#).unwrap();
        assert_eq!(record.outcome, TestOutcome::Undetermined);

        let record: ExposureResult = serde_json::from_str("{}").unwrap();
        assert_eq!(record.outcome, TestOutcome::Undetermined);
        assert!(record.exposures.is_empty());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(TestOutcome::Positive.label(), Some(1));
        assert_eq!(TestOutcome::Negative.label(), Some(0));
        assert_eq!(TestOutcome::Undetermined.label(), None);
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let time = Utc.with_ymd_and_hms(2020, 6, 2, 8, 0, 0).unwrap();
        let exposure = Exposure::new(time, ExposureType::Confirmed)
            .with_distance(1.0, Duration::minutes(30));

        let json = serde_json::to_value(&exposure).unwrap();
        assert_eq!(json["duration_secs"], 1800);
        assert_eq!(json["distance"], 1.0);
        assert!(json.get("proximity_trace").is_none());
        assert!(json.get("duration_since_symptom_onset_secs").is_none());
    }

    #[test]
    fn test_batch_groups_follow_group_sizes() {
        let feature = |d: f32| ExposureFeature {
            proximity_trace: vec![d],
            duration_since_symptom_onset_days: None,
            temporal_resolution_minutes: 5,
        };

        let mut batch = Batch::default();
        batch.push_record(vec![feature(1.0), feature(2.0)], 1);
        batch.push_record(vec![], 0);
        batch.push_record(vec![feature(3.0)], 0);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.group_sizes, vec![2, 0, 1]);

        let groups: Vec<_> = batch.groups().collect();
        assert_eq!(groups[0].0, 1);
        assert_eq!(groups[0].1.len(), 2);
        assert!(groups[1].1.is_empty());
        assert_eq!(groups[2].1[0].proximity_trace, vec![3.0]);
    }

    #[test]
    fn test_batch_groups_stop_at_inconsistent_sizes() {
        let json = r#"{
            "exposures": [
                {"proximity_trace": [1.0], "duration_since_symptom_onset_days": null, "temporal_resolution_minutes": 5}
            ],
            "labels": [1, 0],
            "group_sizes": [1, 4]
        }"#;
        let batch: Batch = serde_json::from_str(json).unwrap();

        let groups: Vec<_> = batch.groups().collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, 1);

        let overflowing = Batch {
            exposures: vec![],
            labels: vec![0],
            group_sizes: vec![usize::MAX],
        };
        assert_eq!(overflowing.groups().count(), 0);
    }
}
