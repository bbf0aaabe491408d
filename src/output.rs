// src/output.rs
use crate::types::{EventKind, OutputConfig, OutputFormat, ResolutionRecord, ScanEvent, SubprobeError};
use log::warn;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;

/// Console/file printer for a scan's event stream.
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Print events until the scan reports `done` or the channel closes.
    /// Returns the number of records written.
    pub async fn consume(&self, mut events: mpsc::UnboundedReceiver<ScanEvent>) -> Result<usize, SubprobeError> {
        let mut writer = self.open_writer()?;
        self.write_header(&mut writer)?;

        let mut written = 0;
        while let Some(event) = events.recv().await {
            if event.kind == EventKind::Done {
                break;
            }
            if matches!(event.kind, EventKind::Domain(_)) {
                written += 1;
            }
            self.write_event(&mut writer, &event)?;
            writer.flush().map_err(|e| SubprobeError::OutputError(e.to_string()))?;
        }

        if let Some(file_path) = &self.config.file {
            println!("Results written to: {}", file_path);
        }
        Ok(written)
    }

    fn open_writer(&self) -> Result<Box<dyn Write + Send>, SubprobeError> {
        let Some(file_path) = &self.config.file else {
            return Ok(Box::new(std::io::stdout()));
        };

        // Create directory if it doesn't exist
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SubprobeError::OutputError(format!("Failed to create directory: {}", e)))?;
        }

        let file = File::create(file_path)
            .map_err(|e| SubprobeError::OutputError(format!("Failed to create file: {}", e)))?;
        Ok(Box::new(file))
    }

    fn write_header<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), SubprobeError> {
        if self.config.format == OutputFormat::Csv {
            writeln!(writer, "ip,status,link_type,name,cname")
                .map_err(|e| SubprobeError::OutputError(e.to_string()))?;
        }
        Ok(())
    }

    pub fn write_event<W: Write + ?Sized>(&self, writer: &mut W, event: &ScanEvent) -> Result<(), SubprobeError> {
        match (&event.kind, self.config.format) {
            (_, OutputFormat::Json) => self.write_json_event(writer, event),
            (EventKind::Domain(record), OutputFormat::Text) => self.write_text_record(writer, record),
            (EventKind::Domain(record), OutputFormat::Csv) => self.write_csv_record(writer, record),
            (EventKind::Error(message), _) => {
                warn!("{}", message);
                Ok(())
            }
            (EventKind::Done, _) => Ok(()),
        }
    }

    fn write_text_record<W: Write + ?Sized>(&self, writer: &mut W, record: &ResolutionRecord) -> Result<(), SubprobeError> {
        if record.cname.is_empty() {
            writeln!(
                writer,
                "[{}] {:<3} {:<15} {}",
                record.link_type,
                record.status.to_string(),
                record.ip.to_string(),
                record.name
            )
        } else {
            writeln!(
                writer,
                "[{}] {:<3} {:<15} {} -> {}",
                record.link_type,
                record.status.to_string(),
                record.ip.to_string(),
                record.name,
                record.cname
            )
        }
        .map_err(|e| SubprobeError::OutputError(e.to_string()))
    }

    fn write_json_event<W: Write + ?Sized>(&self, writer: &mut W, event: &ScanEvent) -> Result<(), SubprobeError> {
        let json = serde_json::to_string(event)
            .map_err(|e| SubprobeError::OutputError(format!("Failed to serialize JSON: {}", e)))?;

        writeln!(writer, "{}", json).map_err(|e| SubprobeError::OutputError(e.to_string()))
    }

    fn write_csv_record<W: Write + ?Sized>(&self, writer: &mut W, record: &ResolutionRecord) -> Result<(), SubprobeError> {
        writeln!(
            writer,
            "{},{},{},{},{}",
            record.ip, record.status, record.link_type, record.name, record.cname
        )
        .map_err(|e| SubprobeError::OutputError(e.to_string()))
    }
}
