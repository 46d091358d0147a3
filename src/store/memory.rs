//! In-memory record source

use std::sync::Arc;

use crate::error::LoaderError;
use crate::store::{Position, RecordCursor, RecordSource};
use crate::types::ExposureResult;

/// Records held in memory; cursors share the list and count positions in records
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Arc<Vec<ExposureResult>>,
}

impl MemorySource {
    pub fn new(records: Vec<ExposureResult>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<ExposureResult>> for MemorySource {
    fn from(records: Vec<ExposureResult>) -> Self {
        Self::new(records)
    }
}

impl RecordSource for MemorySource {
    type Cursor = MemoryCursor;

    fn open(&self) -> Result<MemoryCursor, LoaderError> {
        Ok(MemoryCursor {
            records: Arc::clone(&self.records),
            next: 0,
        })
    }

    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.len())
    }
}

#[derive(Debug)]
pub struct MemoryCursor {
    records: Arc<Vec<ExposureResult>>,
    next: usize,
}

impl RecordCursor for MemoryCursor {
    fn read_next(&mut self) -> Result<Option<ExposureResult>, LoaderError> {
        let record = self.records.get(self.next).cloned();
        if record.is_some() {
            self.next += 1;
        }
        Ok(record)
    }

    fn position(&self) -> Position {
        Position {
            consumed: self.next as u64,
            total: self.records.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TestOutcome;

    #[test]
    fn test_cursors_are_independent() {
        let source = MemorySource::new(vec![
            ExposureResult::new(1, TestOutcome::Positive),
            ExposureResult::new(2, TestOutcome::Negative),
        ]);

        let mut first = source.open().unwrap();
        assert_eq!(first.read_next().unwrap().unwrap().agent_uuid, 1);
        assert_eq!(first.position(), Position { consumed: 1, total: 2 });

        let mut second = source.open().unwrap();
        assert_eq!(second.read_next().unwrap().unwrap().agent_uuid, 1);

        assert_eq!(first.read_next().unwrap().unwrap().agent_uuid, 2);
        assert!(first.position().is_exhausted());
        assert_eq!(first.read_next().unwrap(), None);
    }
}
