//! Sequential reader for record files

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::LoaderError;
use crate::store::{
    FrameHeader, Position, RecordCursor, RecordSource, FILE_MAGIC, FRAME_HEADER_LEN,
    MAX_PAYLOAD_LEN,
};
use crate::types::ExposureResult;

/// A record file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for RecordFile {
    type Cursor = RecordReader;

    fn open(&self) -> Result<RecordReader, LoaderError> {
        RecordReader::open(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Cursor over a record file.
///
/// The file length is captured at open; the store is expected to be fully
/// written by then. Dropping the reader closes the file.
#[derive(Debug)]
pub struct RecordReader {
    reader: BufReader<File>,
    offset: u64,
    total: u64,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self, LoaderError> {
        let file = File::open(path)?;
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; FILE_MAGIC.len()];
        read_exact_or_corrupt(&mut reader, &mut magic, "file header", 0)?;
        if magic != FILE_MAGIC {
            return Err(LoaderError::CorruptStore(format!(
                "{} is not a record file (bad magic)",
                path.display()
            )));
        }

        Ok(Self {
            reader,
            offset: FILE_MAGIC.len() as u64,
            total,
        })
    }
}

impl RecordCursor for RecordReader {
    fn read_next(&mut self) -> Result<Option<ExposureResult>, LoaderError> {
        if self.offset >= self.total {
            return Ok(None);
        }

        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        read_exact_or_corrupt(&mut self.reader, &mut header_bytes, "frame header", self.offset)?;
        let header = FrameHeader::from_bytes(&header_bytes);

        let payload_start = self.offset + FRAME_HEADER_LEN as u64;
        if header.length > MAX_PAYLOAD_LEN
            || payload_start + u64::from(header.length) > self.total
        {
            return Err(LoaderError::CorruptStore(format!(
                "frame at offset {} claims {} bytes, past the end of the store",
                self.offset, header.length
            )));
        }

        let mut payload = vec![0u8; header.length as usize];
        read_exact_or_corrupt(&mut self.reader, &mut payload, "frame payload", payload_start)?;
        if !header.validate_crc(&payload) {
            return Err(LoaderError::CorruptStore(format!(
                "crc mismatch in frame at offset {}",
                self.offset
            )));
        }

        let record = serde_json::from_slice(&payload)?;
        self.offset = payload_start + u64::from(header.length);
        Ok(Some(record))
    }

    fn position(&self) -> Position {
        Position {
            consumed: self.offset,
            total: self.total,
        }
    }
}

fn read_exact_or_corrupt(
    reader: &mut impl Read,
    buf: &mut [u8],
    what: &str,
    offset: u64,
) -> Result<(), LoaderError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            LoaderError::CorruptStore(format!("truncated {what} at offset {offset}"))
        }
        _ => LoaderError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordWriter;
    use crate::types::TestOutcome;
    use std::io::Write;

    fn write_store(path: &Path, count: i64) {
        let mut writer = RecordWriter::create(path).unwrap();
        for uuid in 0..count {
            writer
                .append(&ExposureResult::new(uuid, TestOutcome::Negative))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_reads_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.rec");
        write_store(&path, 3);

        let mut reader = RecordFile::new(&path).open().unwrap();
        let mut uuids = Vec::new();
        while let Some(record) = reader.read_next().unwrap() {
            uuids.push(record.agent_uuid);
        }

        assert_eq!(uuids, vec![0, 1, 2]);
        assert!(reader.position().is_exhausted());
        assert_eq!(reader.read_next().unwrap(), None);
    }

    #[test]
    fn test_empty_store_is_exhausted_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.rec");
        write_store(&path, 0);

        let reader = RecordReader::open(&path).unwrap();
        assert_eq!(reader.position(), Position { consumed: 8, total: 8 });
        assert!(reader.position().is_exhausted());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.rec");
        std::fs::write(&path, b"not a record file").unwrap();

        assert!(matches!(
            RecordReader::open(&path),
            Err(LoaderError::CorruptStore(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RecordReader::open(&dir.path().join("missing.rec")),
            Err(LoaderError::Io(_))
        ));
    }

    #[test]
    fn test_truncated_frame_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.rec");
        write_store(&path, 2);

        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        assert!(matches!(
            reader.read_next(),
            Err(LoaderError::CorruptStore(_))
        ));
    }

    #[test]
    fn test_flipped_byte_fails_crc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flipped.rec");
        write_store(&path, 1);

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0x20;
        let mut file = File::create(&path).unwrap();
        file.write_all(&bytes).unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        let err = reader.read_next().unwrap_err();
        assert!(err.to_string().contains("crc mismatch"));
    }
}
