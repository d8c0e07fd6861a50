use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::counter::counter_errors::Result;
use crate::counter::CountRecord;

pub const COUNT_LOG_HEADER: &str = "vehicle_id, count, datetime";

/// Append-only count log: header line followed by one line per count record.
/// Every record is flushed immediately, so the log survives an abrupt stop.
pub struct CountLogWriter<W: Write> {
    writer: W,
    written: usize,
}

impl CountLogWriter<BufWriter<File>> {
    /// Creates (or truncates) the log file at `path` and writes the header
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        CountLogWriter::new(BufWriter::new(file))
    }
}

impl<W: Write> CountLogWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{}", COUNT_LOG_HEADER)?;
        writer.flush()?;
        Ok(CountLogWriter { writer, written: 0 })
    }
    pub fn write_record(&mut self, record: &CountRecord) -> Result<()> {
        writeln!(self.writer, "{}", record)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
    pub fn write_records(&mut self, records: &[CountRecord]) -> Result<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }
    /// Number of records written so far
    pub fn written(&self) -> usize {
        self.written
    }
    pub fn into_inner(self) -> W {
        self.writer
    }
}
