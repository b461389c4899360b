//! The run-level report: per-lane barcode counts as JSON or TSV.

use std::{cmp::Ordering, io::Write, path::Path, str::FromStr};

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::run::LaneReport;

/// Barcodes seen fewer times than this are left out of the report by default
pub const DEFAULT_THRESHOLD: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(rename = "Sequencer")]
    pub sequencer: String,
    #[serde(rename = "BaseDir")]
    pub base_dir: String,
    #[serde(rename = "Mask")]
    pub mask: String,
    #[serde(rename = "Lanes")]
    pub lanes: Vec<LaneReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Tsv,
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "tsv" => Ok(ReportFormat::Tsv),
            other => Err(Error::InvalidParameter {
                parameter: "format".to_string(),
                reason: format!("expected json or tsv, got '{}'", other),
            }),
        }
    }
}

/// One line of the TSV report
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Row<'a> {
    pub lane: usize,
    pub barcode: &'a str,
    pub total: u64,
    pub pass: u64,
}

impl RunReport {
    pub fn new(sequencer: &str, base_dir: &Path, mask: &str, lanes: Vec<LaneReport>) -> Self {
        RunReport {
            sequencer: sequencer.to_string(),
            base_dir: base_dir.display().to_string(),
            mask: mask.to_string(),
            lanes,
        }
    }

    /// Drop barcodes seen fewer than `min_total` times. Lane totals are kept
    /// as they are, so they still cover every cluster.
    pub fn apply_threshold(&mut self, min_total: u64) {
        for lane in &mut self.lanes {
            let before = lane.counts.len();
            lane.counts.retain(|_, count| count.total >= min_total);
            debug!(
                "lane {}: kept {} of {} barcodes at threshold {}",
                lane.lane_index,
                lane.counts.len(),
                before,
                min_total
            );
        }
    }

    /// Every barcode of every lane, by lane, then most frequent first
    pub fn rows(&self) -> Vec<Row<'_>> {
        let mut rows: Vec<Row> = self
            .lanes
            .iter()
            .flat_map(|lane| {
                lane.counts.iter().map(move |(barcode, count)| Row {
                    lane: lane.lane_index,
                    barcode,
                    total: count.total,
                    pass: count.pass,
                })
            })
            .collect();

        rows.par_sort_by(|a, b| match a.lane.cmp(&b.lane) {
            Ordering::Equal => match b.total.cmp(&a.total) {
                Ordering::Equal => a.barcode.cmp(b.barcode),
                unequal => unequal,
            },
            unequal => unequal,
        });
        rows
    }

    pub fn write(&self, format: ReportFormat, wtr: impl Write) -> Result<()> {
        match format {
            ReportFormat::Json => self.write_json(wtr),
            ReportFormat::Tsv => self.write_tsv(wtr),
        }
    }

    pub fn write_json(&self, mut wtr: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut wtr, self)?;
        writeln!(wtr)?;
        Ok(())
    }

    pub fn write_tsv(&self, wtr: impl Write) -> Result<()> {
        let mut tsv = csv::WriterBuilder::new().delimiter(b'\t').from_writer(wtr);
        for row in self.rows() {
            tsv.serialize(row)?;
        }
        tsv.flush()?;
        Ok(())
    }
}
