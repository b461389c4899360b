//! Read the header from CBCL file and decode into a struct of useful information about
//! the file, to allow tile-by-tile extraction later.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// The only CBCL version this decoder understands
pub const CBCL_VERSION: u16 = 1;

/// One entry of the tile table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRecord {
    pub tile: u32,
    pub cluster_count: u32,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
}

#[derive(Debug, PartialEq)]
/// Represents the header information from a CBCL file
pub struct CBCLHeader {
    pub cbcl_path: PathBuf,
    pub version: u16,
    pub header_size: u32,
    pub bits_per_basecall: u8,
    pub bits_per_qscore: u8,
    pub number_of_bins: u32,
    /// quality score bins as (from, to) pairs. Not needed to call bases
    pub bins: Vec<[u32; 2]>,
    pub num_tile_records: u32,
    pub tiles: Vec<TileRecord>,
    pub non_pf_clusters_excluded: bool,
}

impl CBCLHeader {
    /// Reads the beginning of a CBCL file and stores the header information
    ///
    /// Structure of a CBCL header:
    ///  1. `u16` for file version
    ///  2. `u32` for header size, in bytes
    ///  3. `u8` for number of bits per basecall (must be 2)
    ///  4. `u8` for number of bits per quality score (must be 2)
    ///  5. `u32` for the number of quality score bins
    ///  6. `number_of_bins` pairs of `u32` (from, to) quality score bins
    ///  7. `u32` for number of tiles in the file
    ///  8. `num_tile_records` arrays of 4 `u32` values:
    ///     1. Tile number
    ///     2. Number of clusters in the tile
    ///     3. Uncompressed block size
    ///     4. Compressed block size
    ///  9. `u8` flag for whether this file is only reads that pass quality filtering,
    ///     when `header_size` leaves room for it
    ///
    /// The version and bit widths are checked before anything past them is read.
    pub fn from_reader(cbcl_path: &Path, mut rdr: impl Read) -> Result<Self> {
        let read_err = |e: std::io::Error| Error::reading(cbcl_path, e, false);

        let version = rdr.read_u16::<LittleEndian>().map_err(read_err)?;
        let header_size = rdr.read_u32::<LittleEndian>().map_err(read_err)?;
        let bits_per_basecall = rdr.read_u8().map_err(read_err)?;
        let bits_per_qscore = rdr.read_u8().map_err(read_err)?;

        if version != CBCL_VERSION {
            let reason = format!("version {} (expected {})", version, CBCL_VERSION);
            return Err(unsupported(cbcl_path, reason));
        }
        if bits_per_basecall != 2 {
            let reason = format!("{} bits per base call (expected 2)", bits_per_basecall);
            return Err(unsupported(cbcl_path, reason));
        }
        if bits_per_qscore != 2 {
            let reason = format!("{} bits per quality score (expected 2)", bits_per_qscore);
            return Err(unsupported(cbcl_path, reason));
        }

        // bins and tiles must fit in the declared header before any are read
        let number_of_bins = rdr.read_u32::<LittleEndian>().map_err(read_err)?;
        let bins_end = 16 + 8 * number_of_bins as u64;
        if bins_end > header_size as u64 {
            let reason = format!("header size {} too small for {} bins", header_size, number_of_bins);
            return Err(unsupported(cbcl_path, reason));
        }

        let mut bins = Vec::new();
        for _ in 0..number_of_bins {
            let from = rdr.read_u32::<LittleEndian>().map_err(read_err)?;
            let to = rdr.read_u32::<LittleEndian>().map_err(read_err)?;
            bins.push([from, to]);
        }

        let num_tile_records = rdr.read_u32::<LittleEndian>().map_err(read_err)?;
        let table_end = bins_end + 16 * num_tile_records as u64;
        if table_end > header_size as u64 {
            let reason = format!(
                "header size {} too small for {} bins and {} tiles",
                header_size, number_of_bins, num_tile_records
            );
            return Err(unsupported(cbcl_path, reason));
        }

        let mut tiles = Vec::new();
        for _ in 0..num_tile_records {
            let mut record = [0u32; 4];
            rdr.read_u32_into::<LittleEndian>(&mut record).map_err(read_err)?;
            tiles.push(TileRecord {
                tile: record[0],
                cluster_count: record[1],
                uncompressed_size: record[2],
                compressed_size: record[3],
            });
        }

        // older writers stop right after the tile table
        let non_pf_clusters_excluded = if header_size as u64 > table_end {
            rdr.read_u8().map_err(read_err)? != 0
        } else {
            false
        };

        Ok(CBCLHeader {
            cbcl_path: cbcl_path.to_path_buf(),
            version,
            header_size,
            bits_per_basecall,
            bits_per_qscore,
            number_of_bins,
            bins,
            num_tile_records,
            tiles,
            non_pf_clusters_excluded,
        })
    }

    /// Byte offset of each tile's compressed block, in file order
    pub fn tile_offsets(&self) -> Vec<u64> {
        self.tiles
            .iter()
            .scan(self.header_size as u64, |pos, t| {
                let start = *pos;
                *pos += t.compressed_size as u64;
                Some(start)
            })
            .collect()
    }
}

fn unsupported(path: &Path, reason: String) -> Error {
    Error::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CbclFixture, TileFixture};

    fn fixture() -> CbclFixture {
        CbclFixture::new(vec![
            TileFixture { tile: 1101, nibbles: vec![0b0101; 5] },
            TileFixture { tile: 1102, nibbles: vec![0b1010; 4] },
        ])
    }

    #[test]
    fn decode() {
        let path = Path::new("L001_1.cbcl");
        let data = fixture().to_bytes();
        let header = CBCLHeader::from_reader(path, &data[..]).unwrap();

        assert_eq!(header.version, 1);
        assert_eq!(header.header_size, 2 + 4 + 1 + 1 + 4 + 32 + 4 + 32 + 1);
        assert_eq!(header.bits_per_basecall, 2);
        assert_eq!(header.bits_per_qscore, 2);
        assert_eq!(header.number_of_bins, 4);
        assert_eq!(header.bins, vec![[0, 0], [1, 11], [2, 25], [3, 37]]);
        assert_eq!(header.num_tile_records, 2);
        assert_eq!(header.tiles[0].tile, 1101);
        assert_eq!(header.tiles[0].cluster_count, 5);
        assert_eq!(header.tiles[0].uncompressed_size, 3);
        assert_eq!(header.tiles[1].cluster_count, 4);
        assert_eq!(header.tiles[1].uncompressed_size, 2);
        assert!(!header.non_pf_clusters_excluded);

        let offsets = header.tile_offsets();
        assert_eq!(offsets[0], header.header_size as u64);
        assert_eq!(offsets[1], offsets[0] + header.tiles[0].compressed_size as u64);
    }

    #[test]
    fn pf_only_flag() {
        let mut fixture = fixture();
        fixture.non_pf_clusters_excluded = true;
        let data = fixture.to_bytes();
        let header = CBCLHeader::from_reader(Path::new("x.cbcl"), &data[..]).unwrap();
        assert!(header.non_pf_clusters_excluded);
    }

    #[test]
    fn four_bit_basecalls_are_unsupported() {
        let mut fixture = fixture();
        fixture.bits_per_basecall = 4;
        let data = fixture.to_bytes();
        // only the fixed fields are needed to reject the file
        let err = CBCLHeader::from_reader(Path::new("x.cbcl"), &data[..8]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "x.cbcl: unsupported CBCL format: 4 bits per base call (expected 2)"
        );
    }

    #[test]
    fn wrong_version() {
        let mut fixture = fixture();
        fixture.version = 2;
        let data = fixture.to_bytes();
        assert!(matches!(
            CBCLHeader::from_reader(Path::new("x.cbcl"), &data[..]),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn wrong_qscore_width() {
        let mut fixture = fixture();
        fixture.bits_per_qscore = 8;
        let data = fixture.to_bytes();
        assert!(matches!(
            CBCLHeader::from_reader(Path::new("x.cbcl"), &data[..]),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    /// fixed fields of a version 1 header, up to and including the bin count
    fn fixed_fields(header_size: u32, number_of_bins: u32) -> Vec<u8> {
        let mut data = vec![1u8, 0];
        data.extend_from_slice(&header_size.to_le_bytes());
        data.extend_from_slice(&[2, 2]);
        data.extend_from_slice(&number_of_bins.to_le_bytes());
        data
    }

    #[test]
    fn bin_count_larger_than_header() {
        let mut data = fixed_fields(100, u32::MAX);
        data.extend_from_slice(&[0u8; 16]);
        let err = CBCLHeader::from_reader(Path::new("x.cbcl"), &data[..]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "x.cbcl: unsupported CBCL format: header size 100 too small for 4294967295 bins"
        );
    }

    #[test]
    fn tile_count_larger_than_header() {
        let mut data = fixed_fields(49, 1);
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            CBCLHeader::from_reader(Path::new("x.cbcl"), &data[..]),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn header_size_counts_every_tile() {
        // one tile fits in 40 bytes, two do not
        let mut data = fixed_fields(40, 0);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 32]);
        let err = CBCLHeader::from_reader(Path::new("x.cbcl"), &data[..]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "x.cbcl: unsupported CBCL format: header size 40 too small for 0 bins and 2 tiles"
        );
    }

    #[test]
    #[should_panic(expected = "failed to fill whole buffer")]
    fn bad_file() {
        let data = [1u8, 0, 97, 0, 0, 0, 2, 2];
        CBCLHeader::from_reader(Path::new("bad_data_8.bin"), &data[..]).unwrap();
    }
}
