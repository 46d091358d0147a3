//! Error types for the exposure loader

use std::fmt;

use thiserror::Error;

use crate::types::TestOutcome;

/// Errors that can occur while reading records or assembling batches
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Corrupt record store: {0}")]
    CorruptStore(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Record cursor is not open; call reset() to reopen the store")]
    NotOpen,

    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecordError),
}

/// Where a record sits in the store it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    /// Zero-based ordinal of the record since the cursor was opened
    pub index: u64,
    /// Cursor position immediately before the record was read
    pub offset: u64,
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{} at offset {}", self.index, self.offset)
    }
}

/// A record whose content cannot be turned into a training example.
///
/// Raised for data-integrity faults only. The batch call that hit it is
/// aborted and nothing accumulated during that call is returned.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid {location} (agent {agent_uuid}): {kind}")]
pub struct InvalidRecordError {
    pub location: RecordLocation,
    pub agent_uuid: i64,
    pub kind: InvalidRecordKind,
}

/// The field that made a record invalid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRecordKind {
    #[error("exposure {exposure} has neither a proximity trace nor a distance")]
    MissingDistance { exposure: usize },

    #[error("exposure {exposure} has no proximity trace and no duration")]
    MissingDuration { exposure: usize },

    #[error("exposure {exposure} has a proximity trace but no temporal resolution")]
    MissingTemporalResolution { exposure: usize },

    #[error("outcome {0} is neither POSITIVE nor NEGATIVE")]
    InvalidOutcome(TestOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_message_names_location_and_field() {
        let err = InvalidRecordError {
            location: RecordLocation { index: 3, offset: 412 },
            agent_uuid: 77,
            kind: InvalidRecordKind::MissingDistance { exposure: 1 },
        };

        assert_eq!(
            err.to_string(),
            "Invalid record #3 at offset 412 (agent 77): exposure 1 has neither a proximity trace nor a distance"
        );
    }

    #[test]
    fn test_invalid_record_converts_into_loader_error() {
        let err: LoaderError = InvalidRecordError {
            location: RecordLocation { index: 0, offset: 8 },
            agent_uuid: 1,
            kind: InvalidRecordKind::InvalidOutcome(TestOutcome::Undetermined),
        }
        .into();

        assert!(matches!(err, LoaderError::InvalidRecord(_)));
        assert!(err.to_string().contains("UNDETERMINED"));
    }
}
