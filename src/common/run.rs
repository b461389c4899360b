//! Count every lane of a run concurrently.

use std::thread;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::lane::{count_lane, LaneFiles};
use crate::stream::CancelToken;
use crate::tally::{totals, Count, Tally};

/// Result for one lane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneReport {
    /// 1-based, in the order lanes were given
    #[serde(rename = "LaneIndex")]
    pub lane_index: usize,
    /// clusters counted in this lane
    #[serde(rename = "Total")]
    pub total: u64,
    /// of those, clusters passing filter
    #[serde(rename = "Pass")]
    pub pass: u64,
    #[serde(rename = "Counts")]
    pub counts: Tally,
}

impl LaneReport {
    pub fn new(lane_index: usize, counts: Tally) -> Self {
        let Count { total, pass } = totals(&counts);
        LaneReport {
            lane_index,
            total,
            pass,
            counts,
        }
    }
}

/// Run one lane pipeline per entry of `lanes`, all at once, and collect the
/// results in lane order. The first lane to fail cancels the rest and its
/// error is returned; no report is produced for a failed run.
pub fn count_run(lanes: &[LaneFiles], config: &PipelineConfig) -> Result<Vec<LaneReport>> {
    config.validate()?;
    info!("counting {} lanes", lanes.len());

    let cancel = CancelToken::new();
    let results: Vec<Result<Tally>> = thread::scope(|scope| {
        let cancel = &cancel;
        let handles: Vec<_> = lanes
            .iter()
            .enumerate()
            .map(|(i, files)| {
                let lane = i + 1;
                thread::Builder::new()
                    .name(format!("lane{}", lane))
                    .spawn_scoped(scope, move || {
                        let result = count_lane(lane, files, config, cancel);
                        if matches!(&result, Err(e) if !e.is_secondary()) {
                            cancel.cancel();
                        }
                        result
                    })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(i, handle)| match handle {
                Ok(handle) => handle.join().unwrap_or(Err(Error::StagePanicked {
                    stage: format!("lane{}", i + 1),
                })),
                Err(e) => {
                    cancel.cancel();
                    Err(Error::Io(e))
                }
            })
            .collect()
    });

    let mut tallies = Vec::with_capacity(results.len());
    let mut cancelled = false;
    for result in results {
        match result {
            Ok(tally) => tallies.push(tally),
            Err(Error::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        return Err(Error::Cancelled);
    }

    let reports: Vec<LaneReport> = tallies
        .into_iter()
        .enumerate()
        .map(|(i, counts)| LaneReport::new(i + 1, counts))
        .collect();

    for report in &reports {
        info!(
            "lane {}: {} clusters, {} passing filter",
            report.lane_index, report.total, report.pass
        );
    }
    Ok(reports)
}
