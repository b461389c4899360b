//! Line up the barcode stream with the filter stream.
//!
//! Both streams are in cluster order, but they come from different readers
//! with their own chunking, so the n-th barcode chunk rarely covers the same
//! clusters as the n-th filter chunk. The synchronizer re-cuts both into
//! pairs of equal length.

use crossbeam_channel::{Receiver, Sender};
use log::warn;

use crate::error::Result;
use crate::stream::{recv_chunk, send_chunk, CancelToken};

/// Barcodes and filter flags for the same run of clusters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedChunk {
    pub barcodes: Vec<String>,
    pub filters: Vec<u8>,
}

impl MatchedChunk {
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }
}

/// How many clusters were paired, and how many were left over on either side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub matched: u64,
    pub unmatched_barcodes: u64,
    pub unmatched_filters: u64,
}

/// Pair barcodes with filter flags until either stream runs out.
///
/// A new chunk is pulled from a side only once everything received from it
/// has been matched. Each round sends the longest pair both sides can fill
/// and keeps the tail of the longer side for the next round. Once a side
/// closes, the output closes and whatever is left on the other side is
/// counted and logged as unmatched. Those clusters are not tallied.
pub fn synchronizer(
    barcodes: Receiver<Vec<String>>,
    filters: Receiver<Vec<u8>>,
    output: Sender<MatchedChunk>,
    cancel: &CancelToken,
) -> Result<SyncSummary> {
    let mut pending_barcodes: Vec<String> = Vec::new();
    let mut pending_filters: Vec<u8> = Vec::new();
    let mut summary = SyncSummary::default();

    loop {
        if pending_barcodes.is_empty() {
            match recv_chunk(&barcodes, cancel)? {
                Some(chunk) => pending_barcodes = chunk,
                None => break,
            }
        }
        if pending_filters.is_empty() {
            match recv_chunk(&filters, cancel)? {
                Some(chunk) => pending_filters = chunk,
                None => break,
            }
        }

        let n = pending_barcodes.len().min(pending_filters.len());
        if n == 0 {
            continue;
        }

        let barcode_tail = pending_barcodes.split_off(n);
        let filter_tail = pending_filters.split_off(n);
        let matched = MatchedChunk {
            barcodes: std::mem::replace(&mut pending_barcodes, barcode_tail),
            filters: std::mem::replace(&mut pending_filters, filter_tail),
        };
        summary.matched += n as u64;
        send_chunk(&output, matched, cancel)?;
    }
    drop(output);

    summary.unmatched_barcodes = pending_barcodes.len() as u64 + drain(&barcodes, cancel)?;
    summary.unmatched_filters = pending_filters.len() as u64 + drain(&filters, cancel)?;

    if summary.unmatched_barcodes > 0 {
        warn!(
            "{} clusters have no filter flag and were not counted",
            summary.unmatched_barcodes
        );
    }
    if summary.unmatched_filters > 0 {
        warn!(
            "{} filter flags have no barcode and were ignored",
            summary.unmatched_filters
        );
    }

    Ok(summary)
}

/// Count what is left in a stream
fn drain<T>(rx: &Receiver<Vec<T>>, cancel: &CancelToken) -> Result<u64> {
    let mut n = 0;
    while let Some(chunk) = recv_chunk(rx, cancel)? {
        n += chunk.len() as u64;
    }
    Ok(n)
}
