//! One logical stream of call codes per cycle, whatever the files look like on disk.

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use log::debug;

use crate::bcl_decoder::decode_bcl;
use crate::call_code::CallCode;
use crate::cbcl_decoder::decode_cbcl;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::stream::{CancelToken, ChunkSender, Sink};

/// Container format of one base-call file, decided by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleFormat {
    /// `.bcl`, `.bcl.gz` or `.bcl.bgzf`: one file per cycle (and maybe per tile)
    Bcl,
    /// `.cbcl`: bit-packed, several gzipped tiles per file
    Cbcl,
}

impl CycleFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext == "cbcl" => CycleFormat::Cbcl,
            _ => CycleFormat::Bcl,
        }
    }
}

/// Decode one file of either format into `sink`
pub fn decode_file(path: &Path, sink: &mut impl Sink<CallCode>, buffer_size: usize) -> Result<u64> {
    match CycleFormat::from_path(path) {
        CycleFormat::Bcl => decode_bcl(path, sink, buffer_size),
        CycleFormat::Cbcl => decode_cbcl(path, sink, buffer_size),
    }
}

/// Stream the call codes of one cycle. `files` are read in order and
/// concatenated; chunks run across file and tile boundaries so that every
/// cycle of a lane is chunked identically. The output closes after the last
/// chunk. Returns the number of clusters sent.
pub fn cycle_decoder(
    files: &[PathBuf],
    output: Sender<Vec<CallCode>>,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<u64> {
    let mut sink = ChunkSender::new(output, config.chunk_size, cancel.clone());
    for path in files {
        cancel.check()?;
        let n = decode_file(path, &mut sink, config.chunk_size)?;
        debug!("{}: {} clusters", path.display(), n);
    }
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_code::Nucleotide;
    use crate::error::Error;
    use crate::testutil::{gzip, bcl_bytes, write_bcl, write_file, CbclFixture, TileFixture};
    use crossbeam_channel::bounded;
    use tempfile::TempDir;

    #[test]
    fn format_from_suffix() {
        assert_eq!(CycleFormat::from_path(Path::new("L001/C1.1/L001_1.cbcl")), CycleFormat::Cbcl);
        assert_eq!(CycleFormat::from_path(Path::new("L001/0001.bcl.bgzf")), CycleFormat::Bcl);
        assert_eq!(CycleFormat::from_path(Path::new("C1.1/s_1_1101.bcl.gz")), CycleFormat::Bcl);
        assert_eq!(CycleFormat::from_path(Path::new("C1.1/s_1_1101.bcl")), CycleFormat::Bcl);
    }

    #[test]
    fn chunks_span_files() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_bcl(dir.path(), "s_1_1101.bcl.gz", &[1, 2, 3]),
            write_bcl(dir.path(), "s_1_1102.bcl.gz", &[0, 1]),
        ];
        let config = PipelineConfig::default().with_chunk_size(2);

        let (tx, rx) = bounded(10);
        assert_eq!(cycle_decoder(&files, tx, &config, &CancelToken::new()).unwrap(), 5);

        let lengths: Vec<usize> = rx.iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![2, 2, 1]);
    }

    #[test]
    fn mixed_formats() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            CbclFixture::new(vec![TileFixture { tile: 1101, nibbles: vec![0b1111, 0b0000, 0b1001] }])
                .write(dir.path(), "L001_1.cbcl"),
            write_bcl(dir.path(), "s_1_1101.bcl.gz", &[2]),
        ];
        let config = PipelineConfig::default();

        let (tx, rx) = bounded(10);
        cycle_decoder(&files, tx, &config, &CancelToken::new()).unwrap();

        let calls: Vec<CallCode> = rx.iter().flatten().collect();
        assert_eq!(
            calls,
            vec![
                CallCode::Called(Nucleotide::T),
                CallCode::NoCall,
                CallCode::Called(Nucleotide::C),
                CallCode::Called(Nucleotide::G),
            ]
        );
    }

    #[test]
    fn bad_file_stops_the_cycle() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_bcl(dir.path(), "s_1_1101.bcl.gz", &[1, 2]),
            write_file(dir.path(), "s_1_1102.bcl.gz", &gzip(&bcl_bytes(100, &[1; 99]))),
            write_bcl(dir.path(), "s_1_1103.bcl.gz", &[3]),
        ];
        let config = PipelineConfig::default();

        let (tx, _rx) = bounded(10);
        let err = cycle_decoder(&files, tx, &config, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::ClusterCountMismatch { expected: 100, found: 99, .. }));
    }
}
