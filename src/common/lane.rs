//! Wire up and run the counting pipeline for one lane.
//!
//! ```text
//! cycle_decoder -> base_decoder --\
//! cycle_decoder -> base_decoder ---> transposer --\
//!            ...                                   > synchronizer -> accumulate
//! filter_decoder ---------------------------------/
//! ```
//!
//! Every stage is a named thread; stages only talk through bounded channels.

use std::{
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    thread::{self, Scope, ScopedJoinHandle},
};

use crossbeam_channel::bounded;
use log::{debug, info};

use crate::base_decoder::base_decoder;
use crate::config::PipelineConfig;
use crate::cycle_decoder::cycle_decoder;
use crate::error::{Error, Result};
use crate::filter_decoder::filter_decoder;
use crate::stream::CancelToken;
use crate::sync::synchronizer;
use crate::tally::{accumulate, Tally};
use crate::transposer::transposer;

/// Input files for one lane. Each inner list of `cycles` is read as one
/// concatenated stream; the lists are in mask order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneFiles {
    pub cycles: Vec<Vec<PathBuf>>,
    pub filters: Vec<PathBuf>,
}

struct Stage<'scope, T> {
    name: String,
    handle: ScopedJoinHandle<'scope, Result<T>>,
}

impl<T> Stage<'_, T> {
    fn join(self) -> Result<T> {
        let name = self.name;
        self.handle
            .join()
            .unwrap_or(Err(Error::StagePanicked { stage: name }))
    }
}

/// Start `f` on its own thread. A failure that is not a consequence of some
/// other stage failing cancels the whole run.
fn spawn_stage<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    name: String,
    cancel: &'env CancelToken,
    f: F,
) -> Result<Stage<'scope, T>>
where
    T: Send + 'scope,
    F: FnOnce() -> Result<T> + Send + 'scope,
{
    let stage = name.clone();
    let spawned = thread::Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f))
                .unwrap_or(Err(Error::StagePanicked { stage }));
            if let Err(e) = &result {
                if !e.is_secondary() {
                    debug!("{}: {}", thread::current().name().unwrap_or("stage"), e);
                    cancel.cancel();
                }
            }
            result
        });

    match spawned {
        Ok(handle) => Ok(Stage { name, handle }),
        Err(e) => {
            cancel.cancel();
            Err(Error::Io(e))
        }
    }
}

/// Keeps the first root-cause error, in the order stages are joined
#[derive(Default)]
struct Outcome {
    root: Option<Error>,
    cancelled: bool,
}

impl Outcome {
    fn record<T>(&mut self, result: Result<T>) {
        match result {
            Ok(_) | Err(Error::Hangup) => {}
            Err(Error::Cancelled) => self.cancelled = true,
            Err(e) => {
                if self.root.is_none() {
                    self.root = Some(e);
                }
            }
        }
    }

    fn finish<T>(self, value: Option<T>) -> Result<T> {
        match (self.root, value) {
            (Some(e), _) => Err(e),
            (None, Some(value)) if !self.cancelled => Ok(value),
            _ => Err(Error::Cancelled),
        }
    }
}

/// Count barcodes for one lane. `lane` is only used to name threads and log
/// lines. Blocks until every stage has stopped; on failure returns the first
/// root-cause error and no tally.
pub fn count_lane(
    lane: usize,
    files: &LaneFiles,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Tally> {
    config.validate()?;
    if files.cycles.is_empty() {
        return Err(Error::InvalidParameter {
            parameter: "index cycles".to_string(),
            reason: format!("lane {} has none", lane),
        });
    }
    info!(
        "lane {}: counting {} index cycles",
        lane,
        files.cycles.len()
    );

    let depth = config.queue_depth;
    let tally = thread::scope(|scope| -> Result<Tally> {
        let mut decoders = Vec::with_capacity(files.cycles.len());
        let mut base_decoders = Vec::with_capacity(files.cycles.len());
        let mut base_streams = Vec::with_capacity(files.cycles.len());

        for (i, group) in files.cycles.iter().enumerate() {
            let (call_tx, call_rx) = bounded(depth);
            let (base_tx, base_rx) = bounded(depth);

            decoders.push(spawn_stage(
                scope,
                format!("L{}-cycle{}", lane, i + 1),
                cancel,
                move || cycle_decoder(group, call_tx, config, cancel).map(drop),
            )?);
            base_decoders.push(spawn_stage(
                scope,
                format!("L{}-bases{}", lane, i + 1),
                cancel,
                move || base_decoder(call_rx, base_tx, cancel),
            )?);
            base_streams.push(base_rx);
        }

        let (filter_tx, filter_rx) = bounded(depth);
        let filter_stage = spawn_stage(scope, format!("L{}-filter", lane), cancel, move || {
            filter_decoder(&files.filters, filter_tx, config.chunk_size, cancel).map(drop)
        })?;

        let (barcode_tx, barcode_rx) = bounded(depth);
        let transpose_stage = spawn_stage(scope, format!("L{}-transpose", lane), cancel, move || {
            transposer(base_streams, barcode_tx, cancel).map(drop)
        })?;

        let (matched_tx, matched_rx) = bounded(depth);
        let sync_stage = spawn_stage(scope, format!("L{}-sync", lane), cancel, move || {
            synchronizer(barcode_rx, filter_rx, matched_tx, cancel).map(drop)
        })?;

        let tally_stage = spawn_stage(scope, format!("L{}-tally", lane), cancel, move || {
            accumulate(matched_rx, cancel)
        })?;

        let mut outcome = Outcome::default();
        for stage in decoders
            .into_iter()
            .chain(base_decoders)
            .chain([filter_stage, transpose_stage, sync_stage])
        {
            outcome.record(stage.join());
        }

        let tally = match tally_stage.join() {
            Ok(tally) => Some(tally),
            Err(e) => {
                outcome.record::<()>(Err(e));
                None
            }
        };
        outcome.finish(tally)
    })?;

    info!("lane {}: {} distinct barcodes", lane, tally.len());
    Ok(tally)
}
