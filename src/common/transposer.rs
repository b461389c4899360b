//! Fan in the base streams of every index cycle and turn them into barcodes.

use crossbeam_channel::{Receiver, Sender};
use ndarray::{Array2, ArrayView1, Axis};

use crate::error::{Error, Result};
use crate::stream::{recv_chunk, send_chunk, CancelToken};

/// Build one barcode per cluster from one chunk of bases per index cycle,
/// given in mask order. Character `i` of barcode `c` is element `c` of
/// chunk `i`. The output is as long as the shortest chunk.
pub fn transpose(chunks: &[Vec<u8>]) -> Vec<String> {
    let n_clusters = chunks.iter().map(Vec::len).min().unwrap_or(0);

    // clusters x cycles, so that each row is one barcode
    let mut bases = Array2::<u8>::zeros((n_clusters, chunks.len()));
    for (mut column, chunk) in bases.axis_iter_mut(Axis(1)).zip(chunks) {
        column.assign(&ArrayView1::from(&chunk[..n_clusters]));
    }

    bases
        .axis_iter(Axis(0))
        .map(|row| row.iter().map(|&b| char::from(b)).collect())
        .collect()
}

/// Each round waits for one chunk from every input before emitting a chunk of
/// barcodes. All index cycles of a lane share one cluster count and one chunk
/// size, so every round must deliver equal lengths and the inputs must all
/// close in the same round. Anything else is [`Error::CyclesOutOfStep`].
///
/// Returns the number of barcodes sent.
pub fn transposer(
    inputs: Vec<Receiver<Vec<u8>>>,
    output: Sender<Vec<String>>,
    cancel: &CancelToken,
) -> Result<u64> {
    let n_inputs = inputs.len();
    let mut sent = 0;
    if n_inputs == 0 {
        return Ok(sent);
    }

    for round in 0u64.. {
        let mut chunks = Vec::with_capacity(n_inputs);
        for rx in &inputs {
            chunks.push(recv_chunk(rx, cancel)?);
        }

        let closed = chunks.iter().filter(|c| c.is_none()).count();
        if closed == n_inputs {
            break;
        }
        if closed > 0 {
            // a sibling failure closes inputs early too; report that instead
            cancel.check()?;
            return Err(Error::CyclesOutOfStep {
                round,
                reason: format!("{} of {} index cycles ended early", closed, n_inputs),
            });
        }

        let chunks: Vec<Vec<u8>> = chunks.into_iter().flatten().collect();
        let expected = chunks[0].len();
        if let Some((i, chunk)) = chunks.iter().enumerate().find(|(_, c)| c.len() != expected) {
            return Err(Error::CyclesOutOfStep {
                round,
                reason: format!(
                    "index cycle {} sent {} clusters but index cycle 1 sent {}",
                    i + 1,
                    chunk.len(),
                    expected
                ),
            });
        }

        let barcodes = transpose(&chunks);
        sent += barcodes.len() as u64;
        send_chunk(&output, barcodes, cancel)?;
    }

    Ok(sent)
}
