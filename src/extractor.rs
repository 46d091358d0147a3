//! Batch extraction
//!
//! This module provides the public API of the loader. An
//! [`ExposureBatchExtractor`] owns a cursor over a record store and turns
//! consecutive records into labeled batches.
//!
//! Per record:
//! 1. WindowSelector - Pick the anchor and build the inclusive window
//! 2. ExposureFilter - Admit exposures by type and time
//! 3. FeatureDeriver - Turn admitted exposures into numeric features
//! 4. label_for - Map the test outcome to 0 or 1

use std::path::PathBuf;

use crate::config::ExtractorConfig;
use crate::error::{InvalidRecordError, InvalidRecordKind, LoaderError, RecordLocation};
use crate::features::{label_for, ExposureFilter, FeatureDeriver};
use crate::store::{Position, RecordCursor, RecordFile, RecordSource};
use crate::types::{Batch, ExposureFeature, ExposureResult};
use crate::window::WindowSelector;

/// Why a record was left out of a batch without raising an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Onset-anchored windows need an infection onset time
    MissingInfectionOnset,
}

/// Outcome of a record that produced no training example
#[derive(Debug, Clone, PartialEq)]
pub enum RecordRejection {
    /// Expected gap in the data; the record uses no batch budget
    Skip(SkipReason),
    /// Data-integrity fault; the batch call must abort
    Fatal(InvalidRecordError),
}

/// A record's contribution to a batch
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub features: Vec<ExposureFeature>,
    pub label: u8,
}

/// Turns a single record into a labeled example
#[derive(Debug, Clone)]
pub struct RecordProcessor {
    selector: WindowSelector,
    filter: ExposureFilter,
}

impl RecordProcessor {
    pub fn new(selector: WindowSelector, filter: ExposureFilter) -> Self {
        Self { selector, filter }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(
            WindowSelector::from_config(config),
            ExposureFilter::new(config.include_unconfirmed_exposures),
        )
    }

    pub fn process(
        &self,
        record: &ExposureResult,
        location: RecordLocation,
    ) -> Result<LabeledRecord, RecordRejection> {
        let window = self
            .selector
            .window_for(record)
            .ok_or(RecordRejection::Skip(SkipReason::MissingInfectionOnset))?;

        let features = FeatureDeriver::derive_admitted(record, &window, &self.filter)
            .map_err(|kind| fatal(record, location, kind))?;
        let label = label_for(record.outcome).map_err(|kind| fatal(record, location, kind))?;

        Ok(LabeledRecord { features, label })
    }
}

fn fatal(
    record: &ExposureResult,
    location: RecordLocation,
    kind: InvalidRecordKind,
) -> RecordRejection {
    RecordRejection::Fatal(InvalidRecordError {
        location,
        agent_uuid: record.agent_uuid,
        kind,
    })
}

/// Stateful batch extractor over a record store.
///
/// Each [`get_next_batch`](Self::get_next_batch) call continues where the
/// previous one stopped; [`reset`](Self::reset) rewinds to the first record.
/// The cursor is released when the extractor is dropped.
pub struct ExposureBatchExtractor<S: RecordSource = RecordFile> {
    source: S,
    processor: RecordProcessor,
    cursor: Option<S::Cursor>,
    records_read: u64,
}

impl ExposureBatchExtractor<RecordFile> {
    /// Open the record file at `path`
    pub fn open(path: impl Into<PathBuf>, config: &ExtractorConfig) -> Result<Self, LoaderError> {
        Self::with_source(RecordFile::new(path), config)
    }

    /// Open the record file named by `config.source_path`
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, LoaderError> {
        let path = config
            .source_path
            .clone()
            .ok_or_else(|| LoaderError::InvalidConfig("source_path is required".to_string()))?;
        Self::open(path, config)
    }
}

impl<S: RecordSource> ExposureBatchExtractor<S> {
    /// Create an extractor reading from `source`
    pub fn with_source(source: S, config: &ExtractorConfig) -> Result<Self, LoaderError> {
        config.validate()?;
        let cursor = source.open()?;
        log::info!("opened exposure records from {}", source.describe());

        Ok(Self {
            source,
            processor: RecordProcessor::from_config(config),
            cursor: Some(cursor),
            records_read: 0,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cursor position, or `None` if a previous reset failed to reopen the store
    pub fn position(&self) -> Option<Position> {
        self.cursor.as_ref().map(|cursor| cursor.position())
    }

    /// Records read since the cursor was last opened, skipped ones included
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Close the cursor and reopen the store at its first record
    pub fn reset(&mut self) -> Result<(), LoaderError> {
        // The old cursor is released before the new one is acquired
        self.cursor = None;
        self.records_read = 0;
        self.cursor = Some(self.source.open()?);
        log::info!("rewound exposure records from {}", self.source.describe());
        Ok(())
    }

    /// Read records until `batch_size` of them are labeled or the store runs out.
    ///
    /// A short or empty batch means the store is exhausted. An invalid record
    /// aborts the call and discards everything gathered so far in it.
    pub fn get_next_batch(&mut self, batch_size: usize) -> Result<Batch, LoaderError> {
        if batch_size == 0 {
            return Err(LoaderError::InvalidBatchSize);
        }
        let cursor = self.cursor.as_mut().ok_or(LoaderError::NotOpen)?;

        let mut batch = Batch::with_capacity(batch_size);
        let mut skipped = 0usize;

        while batch.len() < batch_size {
            let position = cursor.position();
            if position.is_exhausted() {
                break;
            }
            let location = RecordLocation {
                index: self.records_read,
                offset: position.consumed,
            };

            let Some(record) = cursor.read_next()? else {
                break;
            };
            self.records_read += 1;

            match self.processor.process(&record, location) {
                Ok(labeled) => batch.push_record(labeled.features, labeled.label),
                Err(RecordRejection::Skip(reason)) => {
                    skipped += 1;
                    log::debug!(
                        "skipping agent {} at {}: {:?}",
                        record.agent_uuid,
                        location,
                        reason
                    );
                }
                Err(RecordRejection::Fatal(err)) => return Err(err.into()),
            }
        }

        log::debug!(
            "batch of {} records ({} exposures, {} skipped), {:.1}% of store consumed",
            batch.len(),
            batch.exposures.len(),
            skipped,
            cursor.position().fraction() * 100.0
        );
        Ok(batch)
    }

    /// Iterate over the remaining batches.
    ///
    /// Stops after the first short batch or the first error.
    pub fn batches(&mut self, batch_size: usize) -> Batches<'_, S> {
        Batches {
            extractor: self,
            batch_size,
            done: false,
        }
    }

    /// Visit every remaining record unfiltered, then rewind to the start.
    ///
    /// The extractor is rewound even when a read fails; the read error is
    /// returned in that case.
    pub fn for_each_record(
        &mut self,
        mut visit: impl FnMut(&ExposureResult),
    ) -> Result<u64, LoaderError> {
        let cursor = self.cursor.as_mut().ok_or(LoaderError::NotOpen)?;

        let mut visited = 0;
        let mut read_error = None;
        while !cursor.position().is_exhausted() {
            match cursor.read_next() {
                Ok(Some(record)) => {
                    visit(&record);
                    visited += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    read_error = Some(err);
                    break;
                }
            }
        }

        self.reset()?;
        match read_error {
            Some(err) => Err(err),
            None => Ok(visited),
        }
    }
}

/// Iterator returned by [`ExposureBatchExtractor::batches`]
pub struct Batches<'a, S: RecordSource> {
    extractor: &'a mut ExposureBatchExtractor<S>,
    batch_size: usize,
    done: bool,
}

impl<S: RecordSource> Iterator for Batches<'_, S> {
    type Item = Result<Batch, LoaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.extractor.get_next_batch(self.batch_size) {
            Ok(batch) if batch.is_empty() => {
                self.done = true;
                None
            }
            Ok(batch) => {
                self.done = batch.len() < self.batch_size;
                Some(Ok(batch))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
