//! Stream pass/fail flags out of `*.filter` files.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, ReadBytesExt};
use crossbeam_channel::Sender;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::stream::{read_full, send_chunk, CancelToken};

/// Stream the flags of every file in `filter_paths`, concatenated, in chunks
/// of `chunk_size`. Each flag is one byte per cluster, `0` for fail and
/// anything else for pass, passed along untouched. Returns the number of flags sent.
///
/// Format of a `.filter` file:
///  1. `u64` of platform-specific metadata (ignored)
///  2. `u32` representing the number of clusters
///  3. `[u8; num_clusters]` of pass/fail values
pub fn filter_decoder(
    filter_paths: &[PathBuf],
    output: Sender<Vec<u8>>,
    chunk_size: usize,
    cancel: &CancelToken,
) -> Result<u64> {
    let mut sent = 0;
    for filter_path in filter_paths {
        cancel.check()?;
        sent += stream_filter(filter_path, &output, chunk_size, cancel)?;
    }
    Ok(sent)
}

fn stream_filter(
    filter_path: &Path,
    output: &Sender<Vec<u8>>,
    chunk_size: usize,
    cancel: &CancelToken,
) -> Result<u64> {
    let read_err = |e: std::io::Error| Error::reading(filter_path, e, false);

    let f = File::open(filter_path).map_err(|source| Error::Open {
        path: filter_path.to_path_buf(),
        source,
    })?;
    let mut rdr = BufReader::new(f);
    debug!("reading {}", filter_path.display());

    let _ = rdr.read_u64::<LittleEndian>().map_err(read_err)?;
    let num_clusters = rdr.read_u32::<LittleEndian>().map_err(read_err)? as u64;

    let mut found = 0u64;
    loop {
        let mut filters = vec![0u8; chunk_size.max(1)];
        let n = read_full(&mut rdr, &mut filters).map_err(read_err)?;
        if n == 0 {
            break;
        }
        filters.truncate(n);
        found += n as u64;
        send_chunk(output, filters, cancel)?;
    }

    if found != num_clusters {
        warn!(
            "{} declares {} clusters but holds {}",
            filter_path.display(),
            num_clusters,
            found
        );
    }

    Ok(found)
}
