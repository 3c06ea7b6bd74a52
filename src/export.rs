use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::config::SurveyConfig;
use crate::error::{Result, SurveyError};
use crate::pipeline::{SurveyOutput, SurveyReport};
use crate::types::{Reading, SurveyInfo};

/// Column order of the CSV export
pub const CSV_HEADER: &str = "survey_id,carrier,cell_id,pci,tac,band,reading_timestamp,\
fwd_azimuth,bwd_azimuth,speed,file_idx,calculated,latitude,longitude";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyMetadata {
    pub survey_id: i64,
    pub network_id: i64,
    pub survey: SurveyInfo,
}

/// Complete survey export (JSON-serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyExport {
    pub metadata: SurveyMetadata,
    pub report: SurveyReport,
    pub rows: Vec<Reading>,
}

impl SurveyExport {
    pub fn new(config: &SurveyConfig, output: SurveyOutput) -> Self {
        SurveyExport {
            metadata: SurveyMetadata {
                survey_id: config.survey_id,
                network_id: config.network_id,
                survey: config.survey.clone(),
            },
            report: output.report,
            rows: output.rows,
        }
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One header line plus one line per row
    pub fn to_csv(&self) -> String {
        let mut csv = String::with_capacity(64 * (self.rows.len() + 1));
        csv.push_str(CSV_HEADER);
        csv.push('\n');
        for r in &self.rows {
            csv.push_str(&csv_line(r));
            csv.push('\n');
        }
        csv
    }

    /// Write by extension: `.csv`, `.gz` (gzip JSON) or plain JSON otherwise
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| SurveyError::io(path, e))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "csv" => {
                let mut w = BufWriter::new(file);
                w.write_all(self.to_csv().as_bytes())
                    .and_then(|_| w.flush())
                    .map_err(|e| SurveyError::io(path, e))?;
            }
            "gz" => {
                let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
                serde_json::to_writer_pretty(&mut gz, self).map_err(|e| SurveyError::json(path, e))?;
                gz.finish()
                    .and_then(|mut w| w.flush())
                    .map_err(|e| SurveyError::io(path, e))?;
            }
            _ => {
                let mut w = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut w, self).map_err(|e| SurveyError::json(path, e))?;
                w.flush().map_err(|e| SurveyError::io(path, e))?;
            }
        }

        log::info!("wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn coord(v: Option<f64>) -> String {
    v.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

/// Quote a text field when it would break the line apart
fn text(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_line(r: &Reading) -> String {
    let fields = [
        r.survey_id.to_string(),
        text(&r.carrier),
        opt(r.cell_id),
        opt(r.physical_cell_id),
        opt(r.tracking_area_code),
        opt(r.band),
        opt(r.reading_time.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
        opt(r.forward_azimuth),
        opt(r.backward_azimuth),
        opt(r.speed),
        opt(r.file_idx),
        r.calculated.to_string(),
        coord(r.latitude),
        coord(r.longitude),
    ];
    fields.join(",")
}
