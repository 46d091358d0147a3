//! Append-only writer for record files

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::LoaderError;
use crate::store::{FrameHeader, FILE_MAGIC};
use crate::types::ExposureResult;

/// Appends framed records to a record file
#[derive(Debug)]
pub struct RecordWriter {
    writer: BufWriter<File>,
    written: u64,
}

impl RecordWriter {
    /// Create (or truncate) a record file
    pub fn create(path: &Path) -> Result<Self, LoaderError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&FILE_MAGIC)?;
        log::debug!("created record file {}", path.display());
        Ok(Self { writer, written: 0 })
    }

    /// Open an existing record file to append more records
    pub fn append_to(path: &Path) -> Result<Self, LoaderError> {
        let mut magic = [0u8; FILE_MAGIC.len()];
        File::open(path)?.read_exact(&mut magic)?;
        if magic != FILE_MAGIC {
            return Err(LoaderError::CorruptStore(format!(
                "{} is not a record file (bad magic)",
                path.display()
            )));
        }

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn append(&mut self, record: &ExposureResult) -> Result<(), LoaderError> {
        let payload = serde_json::to_vec(record)?;
        let header = FrameHeader::for_payload(&payload)?;
        self.writer.write_all(&header.to_bytes())?;
        self.writer.write_all(&payload)?;
        self.written += 1;
        Ok(())
    }

    pub fn append_all<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a ExposureResult>,
    ) -> Result<(), LoaderError> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Records appended through this writer
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered frames to disk and return the number appended
    pub fn finish(mut self) -> Result<u64, LoaderError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RecordCursor, RecordReader};
    use crate::types::TestOutcome;

    #[test]
    fn test_append_to_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.rec");

        let mut writer = RecordWriter::create(&path).unwrap();
        writer
            .append(&ExposureResult::new(1, TestOutcome::Positive))
            .unwrap();
        assert_eq!(writer.finish().unwrap(), 1);

        let mut writer = RecordWriter::append_to(&path).unwrap();
        writer
            .append_all(&[
                ExposureResult::new(2, TestOutcome::Negative),
                ExposureResult::new(3, TestOutcome::Positive),
            ])
            .unwrap();
        assert_eq!(writer.written(), 2);
        writer.finish().unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        let mut uuids = Vec::new();
        while let Some(record) = reader.read_next().unwrap() {
            uuids.push(record.agent_uuid);
        }
        assert_eq!(uuids, vec![1, 2, 3]);
    }

    #[test]
    fn test_append_to_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello, world").unwrap();

        assert!(matches!(
            RecordWriter::append_to(&path),
            Err(LoaderError::CorruptStore(_))
        ));
    }
}
