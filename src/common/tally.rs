//! Per-barcode cluster counts for one lane.

use std::collections::HashMap;

use crossbeam_channel::Receiver;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stream::{recv_chunk, CancelToken};
use crate::sync::MatchedChunk;

/// Clusters seen with one barcode, and how many of them passed filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    #[serde(rename = "Total")]
    pub total: u64,
    #[serde(rename = "Pass")]
    pub pass: u64,
}

pub type Tally = HashMap<String, Count>;

/// Add one matched chunk to `tally`. Any nonzero flag is a single pass.
pub fn tally_chunk(tally: &mut Tally, chunk: MatchedChunk) {
    for (barcode, flag) in chunk.barcodes.into_iter().zip(chunk.filters) {
        let count = tally.entry(barcode).or_default();
        count.total += 1;
        count.pass += u64::from(flag != 0);
    }
}

/// Sum of (total, pass) over every barcode
pub fn totals(tally: &Tally) -> Count {
    tally
        .par_iter()
        .map(|(_, c)| *c)
        .reduce(Count::default, |a, b| Count {
            total: a.total + b.total,
            pass: a.pass + b.pass,
        })
}

/// Count every matched chunk until the synchronizer closes its output
pub fn accumulate(input: Receiver<MatchedChunk>, cancel: &CancelToken) -> Result<Tally> {
    let mut tally = Tally::new();
    while let Some(chunk) = recv_chunk(&input, cancel)? {
        tally_chunk(&mut tally, chunk);
    }
    Ok(tally)
}
