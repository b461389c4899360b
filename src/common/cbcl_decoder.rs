//! Extract and decompress the tiles of a `.cbcl` file, streaming one call code per cluster.

use std::{
    fs::File,
    io::{prelude::*, BufReader, SeekFrom},
    path::Path,
};

use flate2::read::MultiGzDecoder;
use log::{debug, warn};

use crate::call_code::CallCode;
use crate::cbcl_header_decoder::{CBCLHeader, TileRecord};
use crate::error::{Error, Result};
use crate::stream::{read_full, Sink};

/// Decode every tile of one `.cbcl` file into `sink`, in file order, and
/// return the number of clusters emitted. Tiles are concatenated: nothing in
/// the output marks where one tile stops and the next begins.
pub fn decode_cbcl(path: &Path, sink: &mut impl Sink<CallCode>, buffer_size: usize) -> Result<u64> {
    let mut cbcl = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let header = CBCLHeader::from_reader(path, BufReader::new(&mut cbcl))?;
    if header.non_pf_clusters_excluded {
        warn!(
            "{} only holds clusters passing filter; counts will not line up with the filter file",
            path.display()
        );
    }

    let mut emitted = 0;
    for (tile, start_pos) in header.tiles.iter().zip(header.tile_offsets()) {
        cbcl.seek(SeekFrom::Start(start_pos))
            .map_err(|e| Error::reading(path, e, false))?;

        // each tile is its own gzip stream
        let block = (&cbcl).take(tile.compressed_size as u64);
        let gz = MultiGzDecoder::new(BufReader::new(block));

        let n = decode_tile(path, tile, gz, sink, buffer_size)?;
        if !header.non_pf_clusters_excluded && n != tile.cluster_count as u64 {
            return Err(Error::ClusterCountMismatch {
                path: path.to_path_buf(),
                expected: tile.cluster_count as u64,
                found: n,
            });
        }
        debug!("{}: tile {} gave {} clusters", path.display(), tile.tile, n);
        emitted += n;
    }

    Ok(emitted)
}

/// Unpack one inflated tile. Each byte holds two clusters as `QQBB` nibbles,
/// the earlier cluster in the low nibble. At most `cluster_count` clusters are
/// emitted, which drops the padding nibble of a tile with an odd count.
fn decode_tile(
    path: &Path,
    tile: &TileRecord,
    mut rdr: impl Read,
    sink: &mut impl Sink<CallCode>,
    buffer_size: usize,
) -> Result<u64> {
    let mut buffer = vec![0u8; (buffer_size / 2).max(1)];
    let mut remaining = tile.cluster_count as u64;
    let mut inflated = 0u64;
    let mut emitted = 0u64;

    loop {
        let n = read_full(&mut rdr, &mut buffer).map_err(|e| Error::reading(path, e, true))?;
        if n == 0 {
            break;
        }
        inflated += n as u64;

        for &byte in &buffer[..n] {
            for nibble in [byte & 0x0f, byte >> 4] {
                if remaining == 0 {
                    break;
                }
                sink.push(CallCode::from_cbcl_nibble(nibble))?;
                remaining -= 1;
                emitted += 1;
            }
        }
    }

    if inflated != tile.uncompressed_size as u64 {
        return Err(Error::TileSizeMismatch {
            path: path.to_path_buf(),
            tile: tile.tile,
            expected: tile.uncompressed_size as u64,
            found: inflated,
        });
    }

    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_code::Nucleotide;
    use crate::testutil::{pack_nibbles, write_file, CbclFixture, TileFixture};
    use tempfile::TempDir;

    /// pack decoded calls back into nibbles, using quality bits `11` for calls
    fn repack(calls: &[CallCode]) -> Vec<u8> {
        let nibbles: Vec<u8> = calls
            .iter()
            .map(|c| match c {
                CallCode::NoCall => 0,
                CallCode::Called(n) => 0b1100 | n.bits(),
            })
            .collect();
        pack_nibbles(&nibbles)
    }

    #[test]
    fn decode_two_tiles() {
        let dir = TempDir::new().unwrap();
        let path = CbclFixture::new(vec![
            TileFixture { tile: 1101, nibbles: vec![0b1100, 0b0101, 0b0000, 0b1111] },
            TileFixture { tile: 1102, nibbles: vec![0b1010, 0b0110, 0b0011] },
        ])
        .write(dir.path(), "L001_1.cbcl");

        let mut calls = Vec::new();
        assert_eq!(decode_cbcl(&path, &mut calls, 4).unwrap(), 7);
        assert_eq!(
            calls,
            vec![
                CallCode::Called(Nucleotide::A),
                CallCode::Called(Nucleotide::C),
                CallCode::NoCall,
                CallCode::Called(Nucleotide::T),
                CallCode::Called(Nucleotide::G),
                CallCode::Called(Nucleotide::G),
                // base bits without quality are still a no-call
                CallCode::NoCall,
            ]
        );
    }

    #[test]
    fn repacking_reproduces_tiles() {
        let nibbles: Vec<u8> = (0..37u8)
            .map(|i| if i % 5 == 0 { 0 } else { 0b1100 | (i % 4) })
            .collect();
        let dir = TempDir::new().unwrap();
        let path = CbclFixture::new(vec![TileFixture { tile: 2101, nibbles: nibbles.clone() }])
            .write(dir.path(), "L001_2.cbcl");

        let mut calls = Vec::new();
        decode_cbcl(&path, &mut calls, 10).unwrap();

        // the odd trailing half-byte is dropped on decode and zero-padded on repack
        assert_eq!(calls.len(), 37);
        assert_eq!(repack(&calls), pack_nibbles(&nibbles));
    }

    #[test]
    fn chunking_does_not_depend_on_buffer_size() {
        let dir = TempDir::new().unwrap();
        let nibbles: Vec<u8> = (0..21u8).map(|i| 0b0100 | (i % 4)).collect();
        let path = CbclFixture::new(vec![
            TileFixture { tile: 1101, nibbles: nibbles.clone() },
            TileFixture { tile: 1102, nibbles },
        ])
        .write(dir.path(), "L001_1.cbcl");

        let mut small = Vec::new();
        let mut large = Vec::new();
        decode_cbcl(&path, &mut small, 1).unwrap();
        decode_cbcl(&path, &mut large, 40_000).unwrap();
        assert_eq!(small.len(), 42);
        assert_eq!(small, large);
    }

    #[test]
    fn unsupported_before_tiles() {
        let dir = TempDir::new().unwrap();
        let mut fixture = CbclFixture::new(vec![TileFixture { tile: 1101, nibbles: vec![0b0101; 4] }]);
        fixture.bits_per_basecall = 4;
        let mut data = fixture.to_bytes();
        // wreck the tile data; the header alone must be enough to fail
        let n = data.len();
        data[n - 8..].iter_mut().for_each(|b| *b = 0xff);
        let path = write_file(dir.path(), "L001_1.cbcl", &data);

        let mut calls = Vec::new();
        assert!(matches!(
            decode_cbcl(&path, &mut calls, 4),
            Err(Error::UnsupportedFormat { .. })
        ));
        assert!(calls.is_empty());
    }

    /// one tile of four clusters whose table entry claims ten
    fn overstated_tile(non_pf_clusters_excluded: bool) -> Vec<u8> {
        let mut fixture = CbclFixture::new(vec![TileFixture { tile: 1101, nibbles: vec![0b1101; 4] }]);
        fixture.non_pf_clusters_excluded = non_pf_clusters_excluded;
        let mut data = fixture.to_bytes();
        // fixed fields, four bins, tile count, then the tile number
        let cluster_count = 2 + 4 + 1 + 1 + 4 + 32 + 4 + 4;
        data[cluster_count..cluster_count + 4].copy_from_slice(&10u32.to_le_bytes());
        data
    }

    #[test]
    fn pf_only_tiles_may_hold_fewer_clusters() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "L001_1.cbcl", &overstated_tile(true));

        let mut calls = Vec::new();
        assert_eq!(decode_cbcl(&path, &mut calls, 4).unwrap(), 4);
        assert_eq!(calls, vec![CallCode::Called(Nucleotide::C); 4]);
    }

    #[test]
    fn short_tile_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "L001_1.cbcl", &overstated_tile(false));

        let mut calls = Vec::new();
        assert!(matches!(
            decode_cbcl(&path, &mut calls, 4),
            Err(Error::ClusterCountMismatch { expected: 10, found: 4, .. })
        ));
    }

    #[test]
    fn tile_size_mismatch() {
        let tile = TileRecord {
            tile: 1101,
            cluster_count: 6,
            uncompressed_size: 4,
            compressed_size: 0,
        };
        let mut calls = Vec::new();
        let packed = [0x55u8, 0x55, 0x55];
        assert!(matches!(
            decode_tile(Path::new("x.cbcl"), &tile, &packed[..], &mut calls, 8),
            Err(Error::TileSizeMismatch { expected: 4, found: 3, .. })
        ));
    }

    #[test]
    fn corrupt_tile() {
        let dir = TempDir::new().unwrap();
        let fixture = CbclFixture::new(vec![TileFixture { tile: 1101, nibbles: vec![0b0101; 8] }]);
        let mut data = fixture.to_bytes();
        let header_size = CBCLHeader::from_reader(Path::new("x"), &data[..]).unwrap().header_size;
        // first deflate block header of the tile: reserved block type
        data[header_size as usize + 10] = 0xff;
        let path = write_file(dir.path(), "L001_1.cbcl", &data);

        let mut calls = Vec::new();
        assert!(matches!(
            decode_cbcl(&path, &mut calls, 4),
            Err(Error::Decompress { .. })
        ));
    }
}
