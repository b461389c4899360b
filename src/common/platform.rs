//! Where each sequencer puts its base calls, and how to tell that a run is
//! far enough along to count its index reads.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use glob::Pattern;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::lane::LaneFiles;
use crate::mask::{index_cycles, last_index_read};

/// Finds the input files of a run and checks whether it is ready
pub trait FileFinder {
    /// Sequencer name, as written in the report
    fn name(&self) -> &'static str;
    /// One entry per lane, in lane order
    fn lane_files(&self) -> Result<Vec<LaneFiles>>;
    fn is_ready(&self) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequencer {
    MiniSeq,
    NextSeq,
    HiSeq,
    HiSeq4000,
    NovaSeq,
}

impl Sequencer {
    pub fn name(self) -> &'static str {
        match self {
            Sequencer::MiniSeq => "MiniSeq",
            Sequencer::NextSeq => "NextSeq",
            Sequencer::HiSeq => "HiSeq",
            Sequencer::HiSeq4000 => "HiSeq 4000",
            Sequencer::NovaSeq => "NovaSeq",
        }
    }

    pub fn finder(self, base_dir: &Path, mask: &str) -> Box<dyn FileFinder> {
        let base_dir = base_dir.to_path_buf();
        let mask = mask.to_string();
        match self {
            Sequencer::MiniSeq | Sequencer::NextSeq => Box::new(NextSeqFinder {
                base_dir,
                mask,
                lanes: if self == Sequencer::MiniSeq { 1 } else { 4 },
                name: self.name(),
            }),
            Sequencer::HiSeq => Box::new(HiSeqFinder { base_dir, mask, four_thousand: false }),
            Sequencer::HiSeq4000 => Box::new(HiSeqFinder { base_dir, mask, four_thousand: true }),
            Sequencer::NovaSeq => Box::new(NovaSeqFinder { base_dir, mask }),
        }
    }
}

impl fmt::Display for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sequencer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "miniseq" => Ok(Sequencer::MiniSeq),
            "nextseq" => Ok(Sequencer::NextSeq),
            "hiseq" => Ok(Sequencer::HiSeq),
            "hiseq4k" | "hiseq4000" => Ok(Sequencer::HiSeq4000),
            "novaseq" => Ok(Sequencer::NovaSeq),
            other => Err(Error::InvalidParameter {
                parameter: "sequencer".to_string(),
                reason: format!("unknown sequencer '{}'", other),
            }),
        }
    }
}

fn base_calls(base_dir: &Path) -> PathBuf {
    base_dir.join("Data").join("Intensities").join("BaseCalls")
}

fn lane_dir(base_dir: &Path, lane: usize) -> PathBuf {
    base_calls(base_dir).join(format!("L{:03}", lane))
}

/// Sorted matches of `pattern` inside `dir`. `dir` itself is matched literally.
fn glob_sorted(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), pattern);
    let mut paths = glob::glob(&full)?
        .map(|entry| entry.map_err(|e| Error::Io(e.into_error())))
        .collect::<Result<Vec<_>>>()?;
    paths.sort();
    debug!("{}: {} matches", full, paths.len());
    Ok(paths)
}

fn non_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// NextSeq and MiniSeq write one BGZF file per cycle per lane. All lanes are
/// read as one logical lane: each cycle concatenates its files over the lanes,
/// and so do the filters.
pub struct NextSeqFinder {
    base_dir: PathBuf,
    mask: String,
    lanes: usize,
    name: &'static str,
}

impl FileFinder for NextSeqFinder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn lane_files(&self) -> Result<Vec<LaneFiles>> {
        let cycles = index_cycles(&self.mask)?;
        let lanes = 1..=self.lanes;

        let cycles: Vec<Vec<PathBuf>> = cycles
            .iter()
            .map(|c| {
                lanes
                    .clone()
                    .map(|l| lane_dir(&self.base_dir, l).join(format!("{:04}.bcl.bgzf", c)))
                    .collect()
            })
            .collect();
        let filters: Vec<PathBuf> = lanes
            .map(|l| lane_dir(&self.base_dir, l).join(format!("s_{}.filter", l)))
            .collect();

        Ok(vec![LaneFiles { cycles, filters }])
    }

    /// Ready once every input file is there and has something in it
    fn is_ready(&self) -> Result<bool> {
        Ok(self.lane_files()?.iter().all(|lane| {
            lane.cycles.iter().flatten().chain(&lane.filters).all(|p| non_empty(p))
        }))
    }
}

/// HiSeq 2500 and 4000: one gzipped BCL per tile per cycle, in
/// `L00{lane}/C{cycle}.1/`, eight lanes
pub struct HiSeqFinder {
    base_dir: PathBuf,
    mask: String,
    four_thousand: bool,
}

impl HiSeqFinder {
    const LANES: usize = 8;

    fn ready_marker(&self) -> PathBuf {
        let read = last_index_read(&self.mask);
        let name = if self.four_thousand {
            format!("RTARead{}Complete.txt", read)
        } else {
            format!("Basecalling_Netcopy_complete_Read{}.txt", read)
        };
        self.base_dir.join(name)
    }
}

impl FileFinder for HiSeqFinder {
    fn name(&self) -> &'static str {
        if self.four_thousand {
            Sequencer::HiSeq4000.name()
        } else {
            Sequencer::HiSeq.name()
        }
    }

    fn lane_files(&self) -> Result<Vec<LaneFiles>> {
        let cycles = index_cycles(&self.mask)?;
        (1..=Self::LANES)
            .map(|l| per_cycle_dirs(&self.base_dir, l, &cycles, "s_*.bcl.gz"))
            .collect()
    }

    /// Ready once the instrument has finished the last read with an index in it
    fn is_ready(&self) -> Result<bool> {
        Ok(self.ready_marker().exists())
    }
}

/// NovaSeq: one CBCL per surface per cycle in `L00{lane}/C{cycle}.1/`, as
/// many lanes as there are lane directories
pub struct NovaSeqFinder {
    base_dir: PathBuf,
    mask: String,
}

impl FileFinder for NovaSeqFinder {
    fn name(&self) -> &'static str {
        Sequencer::NovaSeq.name()
    }

    fn lane_files(&self) -> Result<Vec<LaneFiles>> {
        let cycles = index_cycles(&self.mask)?;
        let n_lanes = glob_sorted(&base_calls(&self.base_dir), "L???")?.len();
        (1..=n_lanes)
            .map(|l| per_cycle_dirs(&self.base_dir, l, &cycles, "*.cbcl"))
            .collect()
    }

    fn is_ready(&self) -> Result<bool> {
        Ok(self.base_dir.join("RTAComplete.txt").exists())
    }
}

/// Files of one lane laid out as `C{cycle}.1/<pattern>`, filters as `s_*.filter`
fn per_cycle_dirs(base_dir: &Path, lane: usize, cycles: &[usize], pattern: &str) -> Result<LaneFiles> {
    let dir = lane_dir(base_dir, lane);
    let cycles = cycles
        .iter()
        .map(|c| {
            let files = glob_sorted(&dir.join(format!("C{}.1", c)), pattern)?;
            if files.is_empty() {
                warn!("lane {}: no base calls for cycle {}", lane, c);
            }
            Ok(files)
        })
        .collect::<Result<Vec<_>>>()?;
    let filters = glob_sorted(&dir, "s_*.filter")?;

    Ok(LaneFiles { cycles, filters })
}
