//! Stream call codes out of per-cycle `.bcl` files.
//!
//! Format of a `.bcl` file (usually gzip or BGZF wrapped):
//!  1. `u32` number of clusters
//!  2. `[u8; num_clusters]` calls: `0` is a no-call, otherwise bits 0-1 are
//!     the base and bits 2-7 the quality

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::MultiGzDecoder;
use log::debug;

use crate::call_code::CallCode;
use crate::error::{Error, Result};
use crate::stream::{read_full, Sink};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open `path`, transparently inflating it if it starts with the gzip magic.
/// Also reports whether the stream is compressed, for error classification.
pub(crate) fn open_maybe_gzip(path: &Path) -> Result<(Box<dyn Read + Send>, bool)> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = BufReader::new(file);
    let gzipped = rdr
        .fill_buf()
        .map_err(|e| Error::reading(path, e, false))?
        .starts_with(&GZIP_MAGIC);

    if gzipped {
        Ok((Box::new(MultiGzDecoder::new(rdr)), true))
    } else {
        Ok((Box::new(rdr), false))
    }
}

/// Decode one `.bcl` file into `sink`, returning the number of clusters.
/// The number of call bytes must match the declared count exactly.
pub fn decode_bcl(path: &Path, sink: &mut impl Sink<CallCode>, buffer_size: usize) -> Result<u64> {
    let (rdr, compressed) = open_maybe_gzip(path)?;
    debug!("decoding {}", path.display());
    decode_bcl_stream(path, rdr, compressed, sink, buffer_size)
}

fn decode_bcl_stream(
    path: &Path,
    mut rdr: impl Read,
    compressed: bool,
    sink: &mut impl Sink<CallCode>,
    buffer_size: usize,
) -> Result<u64> {
    let expected = rdr
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::reading(path, e, compressed))? as u64;

    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut found = 0u64;
    loop {
        let n = read_full(&mut rdr, &mut buffer).map_err(|e| Error::reading(path, e, compressed))?;
        if n == 0 {
            break;
        }
        found += n as u64;
        for &byte in &buffer[..n] {
            sink.push(CallCode::from_bcl_byte(byte))?;
        }
    }

    if found != expected {
        return Err(Error::ClusterCountMismatch {
            path: path.to_path_buf(),
            expected,
            found,
        });
    }

    Ok(found)
}
