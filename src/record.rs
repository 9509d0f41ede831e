//! Output sinks for the per-step time series and the run summary.
//!
//! Layout written by [`CsvRecordSink`]:
//!
//! ```text
//! <output>/runs_index.csv          one row per finished run
//! <output>/<run_id>/timeseries.csv header + one line per step
//! <output>/<run_id>/summary.json   written once at run end
//! ```

use crate::stats::{RunSummary, StepRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const TIMESERIES_FILE: &str = "timeseries.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const INDEX_FILE: &str = "runs_index.csv";

/// Destination for run records
pub trait RecordSink {
    /// Prepare destinations for `run_id` and write the time-series header
    fn open(&mut self, run_id: &str, header: &str) -> Result<(), SinkError>;

    /// Append one time-series line, in step order
    fn append(&mut self, record: &StepRecord) -> Result<(), SinkError>;

    /// Push buffered lines to the destination
    fn flush(&mut self) -> Result<(), SinkError>;

    /// Flush, write the summary and the index row, then release the run
    fn finish(&mut self, summary: &RunSummary) -> Result<(), SinkError>;
}

/// Writes CSV/JSON files under an output directory
pub struct CsvRecordSink {
    output_dir: PathBuf,
    run_dir: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl CsvRecordSink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            run_dir: None,
            writer: None,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Folder of the currently open run
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    pub fn index_path(&self) -> PathBuf {
        self.output_dir.join(INDEX_FILE)
    }

    fn append_index(&self, summary: &RunSummary) -> Result<(), SinkError> {
        let path = self.index_path();
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(file, "{}", RunSummary::index_header())?;
        }
        writeln!(file, "{}", summary.to_index_line())?;
        Ok(())
    }
}

impl RecordSink for CsvRecordSink {
    fn open(&mut self, run_id: &str, header: &str) -> Result<(), SinkError> {
        let run_dir = self.output_dir.join(run_id);
        fs::create_dir_all(&run_dir)?;

        let file = File::create(run_dir.join(TIMESERIES_FILE))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", header)?;

        log::debug!("Recording to {}", run_dir.display());
        self.run_dir = Some(run_dir);
        self.writer = Some(writer);
        Ok(())
    }

    fn append(&mut self, record: &StepRecord) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::NotOpen)?;
        writeln!(writer, "{}", record.to_csv_line())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::NotOpen)?;
        writer.flush()?;
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), SinkError> {
        let mut writer = self.writer.take().ok_or(SinkError::NotOpen)?;
        writer.flush()?;
        drop(writer);

        let run_dir = self.run_dir.as_ref().ok_or(SinkError::NotOpen)?;
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(run_dir.join(SUMMARY_FILE), json)?;

        self.append_index(summary)
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    pub run_id: Option<String>,
    pub header: Option<String>,
    pub lines: Vec<String>,
    pub summaries: Vec<RunSummary>,
    pub index_rows: Vec<String>,
    open: bool,
    line_limit: Option<usize>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that rejects appends once `limit` lines are stored
    pub fn with_line_limit(limit: usize) -> Self {
        Self {
            line_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Header plus lines, as a CSV file would read
    pub fn contents(&self) -> String {
        let mut out = String::new();
        if let Some(header) = &self.header {
            out.push_str(header);
            out.push('\n');
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl RecordSink for MemoryRecordSink {
    fn open(&mut self, run_id: &str, header: &str) -> Result<(), SinkError> {
        self.run_id = Some(run_id.to_string());
        self.header = Some(header.to_string());
        self.lines.clear();
        self.open = true;
        Ok(())
    }

    fn append(&mut self, record: &StepRecord) -> Result<(), SinkError> {
        if !self.open {
            return Err(SinkError::NotOpen);
        }
        if self.line_limit.map_or(false, |limit| self.lines.len() >= limit) {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "line limit reached",
            )));
        }
        self.lines.push(record.to_csv_line());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.open {
            Ok(())
        } else {
            Err(SinkError::NotOpen)
        }
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), SinkError> {
        if !self.open {
            return Err(SinkError::NotOpen);
        }
        self.open = false;
        self.summaries.push(summary.clone());
        self.index_rows.push(summary.to_index_line());
        Ok(())
    }
}

/// Errors that can occur while writing records
#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    NotOpen,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::NotOpen => write!(f, "record sink is not open"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationMode, SummaryStatistic};
    use crate::run::EndReason;
    use crate::stats::Census;
    use tempfile::tempdir;

    fn record(step: u64) -> StepRecord {
        StepRecord {
            elapsed_secs: step as f64,
            clock: step as f64,
            census: Census {
                prey: 10.0,
                predators: 2.0,
                resources: 50.0,
                drought: 0.0,
            },
            memory_mb: None,
        }
    }

    fn summary(run_id: &str) -> RunSummary {
        RunSummary {
            run_id: run_id.to_string(),
            mode: SimulationMode::Grid,
            statistic: SummaryStatistic::Final,
            steps: 2,
            duration_secs: 2.0,
            prey: 10.0,
            predators: 2.0,
            resources: 50.0,
            drought: 0.0,
            seed: 42,
            memory_bytes: None,
            end_reason: EndReason::MaxSteps,
        }
    }

    #[test]
    fn test_csv_sink_writes_run_folder() {
        let dir = tempdir().unwrap();
        let mut sink = CsvRecordSink::new(dir.path());
        let header = StepRecord::csv_header(SimulationMode::Grid, false);

        sink.open("run-a", &header).unwrap();
        sink.append(&record(1)).unwrap();
        sink.append(&record(2)).unwrap();
        sink.finish(&summary("run-a")).unwrap();

        let series = fs::read_to_string(dir.path().join("run-a").join(TIMESERIES_FILE)).unwrap();
        let lines: Vec<&str> = series.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], header);
        assert_eq!(lines[1], "1.00,1.00,10.00,2.00,50.00,0.00");

        let json = fs::read_to_string(dir.path().join("run-a").join(SUMMARY_FILE)).unwrap();
        let loaded: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, summary("run-a"));
    }

    #[test]
    fn test_index_header_written_once() {
        let dir = tempdir().unwrap();
        let mut sink = CsvRecordSink::new(dir.path());
        for id in ["one", "two"] {
            sink.open(id, "h").unwrap();
            sink.finish(&summary(id)).unwrap();
        }

        let index = fs::read_to_string(sink.index_path()).unwrap();
        let lines: Vec<&str> = index.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], RunSummary::index_header());
        assert!(lines[1].starts_with("one,"));
        assert!(lines[2].starts_with("two,"));
    }

    #[test]
    fn test_closed_sink_rejects_writes() {
        let dir = tempdir().unwrap();
        let mut sink = CsvRecordSink::new(dir.path());
        assert!(matches!(sink.append(&record(1)), Err(SinkError::NotOpen)));

        sink.open("r", "h").unwrap();
        sink.finish(&summary("r")).unwrap();
        assert!(matches!(sink.finish(&summary("r")), Err(SinkError::NotOpen)));
    }

    #[test]
    fn test_unwritable_output_fails_open() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let mut sink = CsvRecordSink::new(&blocker);
        assert!(matches!(sink.open("r", "h"), Err(SinkError::Io(_))));
    }

    #[test]
    fn test_memory_sink_line_limit() {
        let mut sink = MemoryRecordSink::with_line_limit(1);
        sink.open("m", "h").unwrap();
        sink.append(&record(1)).unwrap();
        assert!(sink.append(&record(2)).is_err());
        assert_eq!(sink.contents(), "h\n1.00,1.00,10.00,2.00,50.00,0.00\n");
    }
}
