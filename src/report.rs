//! Durable CSV report, one row per sweep cell.
//!
//! Every appended row is flushed and synced to disk before `append_row`
//! returns, so a reader (or a restart after a crash) sees exactly the rows
//! that were acknowledged, in order, and never a torn row.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::accumulator::CellSummary;
use crate::config::{ReportLocale, SweepCell, SweepConfig};
use crate::error::{Error, Result};

pub const COLUMN_SOURCE_FILE_SIZE: &str = "SourceFileSize";
pub const COLUMN_COMPACT_LEVEL: &str = "CompactLevel";
pub const COLUMN_AVG_DEPTH: &str = "AvgDepth";
pub const COLUMN_AVG_SECONDS: &str = "AvgSeconds";
pub const COLUMN_TOTAL_CHUNKS: &str = "TotalChunks";

/// Finalized record of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub size_label: String,
    pub compaction_level: u16,
    pub average_depth: f64,
    pub average_seconds: f64,
    /// Only serialized when the report carries the chunk count column.
    pub total_chunks: Option<u64>,
}

impl ReportRow {
    pub fn from_summary(cell: &SweepCell, summary: &CellSummary) -> Self {
        Self {
            size_label: cell.size_label.clone(),
            compaction_level: cell.compaction_level,
            average_depth: summary.average_depth,
            average_seconds: summary.average_duration_secs,
            total_chunks: summary.total_chunks,
        }
    }
}

/// Shape and number formatting of the report file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportFormat {
    pub locale: ReportLocale,
    pub include_total_chunks: bool,
}

impl ReportFormat {
    pub const fn from_config(config: &SweepConfig) -> Self {
        Self {
            locale: config.locale,
            include_total_chunks: config.include_total_chunks,
        }
    }

    pub fn header(self) -> Vec<&'static str> {
        let mut header = vec![
            COLUMN_SOURCE_FILE_SIZE,
            COLUMN_COMPACT_LEVEL,
            COLUMN_AVG_DEPTH,
            COLUMN_AVG_SECONDS,
        ];
        if self.include_total_chunks {
            header.push(COLUMN_TOTAL_CHUNKS);
        }
        header
    }

    fn record(self, row: &ReportRow) -> Vec<String> {
        let mut record = vec![
            row.size_label.clone(),
            row.compaction_level.to_string(),
            self.locale.format_decimal(row.average_depth),
            self.locale.format_decimal(row.average_seconds),
        ];
        if self.include_total_chunks {
            record.push(row.total_chunks.map(|n| n.to_string()).unwrap_or_default());
        }
        record
    }
}

/// Destination of finalized rows.
pub trait ReportSink {
    /// Persist one row. The row must be durable once this returns `Ok`.
    fn append_row(&mut self, row: &ReportRow) -> Result<()>;
}

/// CSV file sink with a flush and `fsync` per row.
#[derive(Debug)]
pub struct CsvReportSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    format: ReportFormat,
    rows_written: u64,
}

impl CsvReportSink {
    /// Create or truncate `path` and write the header.
    pub fn open(path: impl AsRef<Path>, format: ReportFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(format.locale.delimiter())
            .from_writer(file);
        writer.write_record(format.header())?;

        let mut sink = Self {
            writer,
            path,
            format,
            rows_written: 0,
        };
        sink.sync()?;
        tracing::debug!(path = %sink.path.display(), "Opened report");
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Flush, `fsync` and release the file.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        tracing::debug!(
            path = %self.path.display(),
            rows = self.rows_written,
            "Closed report"
        );
        Ok(())
    }
}

impl ReportSink for CsvReportSink {
    fn append_row(&mut self, row: &ReportRow) -> Result<()> {
        self.writer.write_record(self.format.record(row))?;
        self.sync()?;
        self.rows_written += 1;
        Ok(())
    }
}

/// Read back a report written with `format`.
pub fn read_report(path: impl AsRef<Path>, format: ReportFormat) -> Result<Vec<ReportRow>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.locale.delimiter())
        .has_headers(true)
        .from_path(path)?;

    let expected_header = format.header();
    let header = reader.headers()?.clone();
    if header.iter().ne(expected_header.iter().copied()) {
        return Err(Error::validation(format!(
            "unexpected report header in {}: {:?}",
            path.display(),
            header.iter().collect::<Vec<_>>()
        )));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let bad = |column: &str| {
            Error::validation(format!(
                "malformed {column} in row {} of {}",
                line + 1,
                path.display()
            ))
        };

        let compaction_level = record
            .get(1)
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| bad(COLUMN_COMPACT_LEVEL))?;
        let average_depth = record
            .get(2)
            .and_then(|v| format.locale.parse_decimal(v))
            .ok_or_else(|| bad(COLUMN_AVG_DEPTH))?;
        let average_seconds = record
            .get(3)
            .and_then(|v| format.locale.parse_decimal(v))
            .ok_or_else(|| bad(COLUMN_AVG_SECONDS))?;
        let total_chunks = if format.include_total_chunks {
            match record.get(4).map(str::trim) {
                Some("") => None,
                Some(v) => Some(v.parse().map_err(|_| bad(COLUMN_TOTAL_CHUNKS))?),
                None => return Err(bad(COLUMN_TOTAL_CHUNKS)),
            }
        } else {
            None
        };

        rows.push(ReportRow {
            size_label: record.get(0).unwrap_or_default().to_string(),
            compaction_level,
            average_depth,
            average_seconds,
            total_chunks,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(label: &str, level: u16, depth: f64, seconds: f64) -> ReportRow {
        ReportRow {
            size_label: label.to_string(),
            compaction_level: level,
            average_depth: depth,
            average_seconds: seconds,
            total_chunks: None,
        }
    }

    #[test]
    fn open_writes_header_only() {
        let temp = TempDir::new().expect("create tempdir");
        let path = temp.path().join("report.csv");
        let sink = CsvReportSink::open(&path, ReportFormat::default()).expect("open");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "SourceFileSize,CompactLevel,AvgDepth,AvgSeconds\n"
        );
        sink.close().expect("close");
    }

    #[test]
    fn open_truncates_existing_report_and_creates_parent() {
        let temp = TempDir::new().expect("create tempdir");
        let path = temp.path().join("nested/dir/report.csv");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale,content\n1,2\n").unwrap();

        let sink = CsvReportSink::open(&path, ReportFormat::default()).expect("open");
        sink.close().expect("close");
        assert!(read_report(&path, ReportFormat::default()).unwrap().is_empty());

        let fresh = temp.path().join("other/report.csv");
        CsvReportSink::open(&fresh, ReportFormat::default())
            .expect("open")
            .close()
            .expect("close");
        assert!(fresh.exists());
    }

    #[test]
    fn invariant_rows_round_trip() {
        let temp = TempDir::new().expect("create tempdir");
        let path = temp.path().join("report.csv");
        let mut sink = CsvReportSink::open(&path, ReportFormat::default()).expect("open");
        sink.append_row(&row("1MB", 0, 18.0, 0.25)).expect("append");
        sink.append_row(&row("1MB", 1, 17.5, 1.125)).expect("append");
        assert_eq!(sink.rows_written(), 2);
        sink.close().expect("close");

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "SourceFileSize,CompactLevel,AvgDepth,AvgSeconds\n1MB,0,18,0.25\n1MB,1,17.5,1.125\n"
        );
        let rows = read_report(&path, ReportFormat::default()).expect("read");
        assert_eq!(rows, vec![row("1MB", 0, 18.0, 0.25), row("1MB", 1, 17.5, 1.125)]);
    }

    #[test]
    fn european_locale_uses_semicolons_and_decimal_commas() {
        let temp = TempDir::new().expect("create tempdir");
        let path = temp.path().join("report.csv");
        let format = ReportFormat {
            locale: ReportLocale::European,
            include_total_chunks: true,
        };
        let mut sink = CsvReportSink::open(&path, format).expect("open");
        let mut first = row("100MB", 65535, 18.5, 2.75);
        first.total_chunks = Some(25_803);
        sink.append_row(&first).expect("append");
        sink.close().expect("close");

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "SourceFileSize;CompactLevel;AvgDepth;AvgSeconds;TotalChunks\n100MB;65535;18,5;2,75;25803\n"
        );
        assert_eq!(read_report(&path, format).expect("read"), vec![first]);
    }

    #[test]
    fn rows_are_visible_before_close() {
        let temp = TempDir::new().expect("create tempdir");
        let path = temp.path().join("report.csv");
        let mut sink = CsvReportSink::open(&path, ReportFormat::default()).expect("open");
        for level in 0..3 {
            sink.append_row(&row("1MB", level, 17.0, 0.5)).expect("append");
            let seen = read_report(&path, ReportFormat::default()).expect("read");
            assert_eq!(seen.len(), usize::from(level) + 1);
        }
        // Simulate the process dying without a clean close.
        std::mem::forget(sink);
        assert_eq!(read_report(&path, ReportFormat::default()).unwrap().len(), 3);
    }

    #[test]
    fn read_rejects_mismatched_header() {
        let temp = TempDir::new().expect("create tempdir");
        let path = temp.path().join("report.csv");
        CsvReportSink::open(&path, ReportFormat::default())
            .expect("open")
            .close()
            .expect("close");
        let with_chunks = ReportFormat {
            include_total_chunks: true,
            ..ReportFormat::default()
        };
        assert!(matches!(
            read_report(&path, with_chunks),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn read_rejects_malformed_numbers() {
        let temp = TempDir::new().expect("create tempdir");
        let path = temp.path().join("report.csv");
        fs::write(
            &path,
            "SourceFileSize,CompactLevel,AvgDepth,AvgSeconds\n1MB,zero,18,0.5\n",
        )
        .unwrap();
        let err = read_report(&path, ReportFormat::default()).unwrap_err();
        assert!(err.to_string().contains(COLUMN_COMPACT_LEVEL));
    }
}
