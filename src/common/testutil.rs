//! Writers for tiny synthetic BCL, CBCL and filter files used by the unit tests

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::{write::GzEncoder, Compression};

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(data).unwrap();
    path
}

/// BCL body: declared cluster count, then one byte per cluster
pub fn bcl_bytes(declared: u32, calls: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u32::<LittleEndian>(declared).unwrap();
    data.extend_from_slice(calls);
    data
}

/// gzipped BCL with a correct cluster count
pub fn write_bcl(dir: &Path, name: &str, calls: &[u8]) -> PathBuf {
    write_file(dir, name, &gzip(&bcl_bytes(calls.len() as u32, calls)))
}

/// filter file: 12 header bytes (zero, version, cluster count) then one byte per cluster
pub fn write_filter(dir: &Path, name: &str, flags: &[u8]) -> PathBuf {
    let mut data = Vec::new();
    data.write_u32::<LittleEndian>(0).unwrap();
    data.write_u32::<LittleEndian>(3).unwrap();
    data.write_u32::<LittleEndian>(flags.len() as u32).unwrap();
    data.extend_from_slice(flags);
    write_file(dir, name, &data)
}

/// pack `QQBB` nibbles two per byte, first cluster in the low nibble
pub fn pack_nibbles(nibbles: &[u8]) -> Vec<u8> {
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] & 0x0f) | (pair.get(1).copied().unwrap_or(0) << 4))
        .collect()
}

pub struct TileFixture {
    pub tile: u32,
    pub nibbles: Vec<u8>,
}

pub struct CbclFixture {
    pub version: u16,
    pub bits_per_basecall: u8,
    pub bits_per_qscore: u8,
    pub non_pf_clusters_excluded: bool,
    pub tiles: Vec<TileFixture>,
}

impl CbclFixture {
    pub fn new(tiles: Vec<TileFixture>) -> Self {
        CbclFixture {
            version: 1,
            bits_per_basecall: 2,
            bits_per_qscore: 2,
            non_pf_clusters_excluded: false,
            tiles,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let bins: [[u32; 2]; 4] = [[0, 0], [1, 11], [2, 25], [3, 37]];
        let blocks: Vec<(Vec<u8>, Vec<u8>)> = self
            .tiles
            .iter()
            .map(|t| {
                let packed = pack_nibbles(&t.nibbles);
                let compressed = gzip(&packed);
                (packed, compressed)
            })
            .collect();

        let header_size = 2 + 4 + 1 + 1 + 4 + 8 * bins.len() + 4 + 16 * self.tiles.len() + 1;

        let mut data = Vec::new();
        data.write_u16::<LittleEndian>(self.version).unwrap();
        data.write_u32::<LittleEndian>(header_size as u32).unwrap();
        data.write_u8(self.bits_per_basecall).unwrap();
        data.write_u8(self.bits_per_qscore).unwrap();
        data.write_u32::<LittleEndian>(bins.len() as u32).unwrap();
        for [from, to] in bins {
            data.write_u32::<LittleEndian>(from).unwrap();
            data.write_u32::<LittleEndian>(to).unwrap();
        }
        data.write_u32::<LittleEndian>(self.tiles.len() as u32).unwrap();
        for (tile, (packed, compressed)) in self.tiles.iter().zip(&blocks) {
            data.write_u32::<LittleEndian>(tile.tile).unwrap();
            data.write_u32::<LittleEndian>(tile.nibbles.len() as u32).unwrap();
            data.write_u32::<LittleEndian>(packed.len() as u32).unwrap();
            data.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
        }
        data.write_u8(self.non_pf_clusters_excluded as u8).unwrap();
        assert_eq!(data.len(), header_size);

        for (_, compressed) in &blocks {
            data.extend_from_slice(compressed);
        }
        data
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        write_file(dir, name, &self.to_bytes())
    }
}
