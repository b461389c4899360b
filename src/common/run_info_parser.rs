//! Deserializes the `RunInfo.xml` file at the top of a run folder into a
//! struct describing the run, mainly its read structure.

use std::{fs::File, io::BufReader, path::Path};

use serde::{de, Deserialize};
use serde_xml_rs::from_reader;

use crate::error::{Error, Result};

/// The top-level struct for the contents of RunInfo.xml
#[derive(Debug, PartialEq, Eq)]
pub struct RunInfo {
    /// Version number of this file (depends on the sequencer, absent on older ones)
    pub version: u32,
    /// Full run id string (date, instrument, number, flowcell)
    pub id: String,
    /// Number representing how many runs this instrument has performed
    pub number: u64,
    /// Flowcell serial number
    pub flowcell: String,
    /// Instrument serial number/identifier
    pub instrument: String,
    /// The date of the run, in whatever format the instrument writes
    pub date: String,
    /// Format of the run: number of reads, read lengths, and which are indexes
    pub reads: Vec<Read>,
}

/// Deserialize RunInfo, flattening the inner Run element into the top level
impl<'de> Deserialize<'de> for RunInfo {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Outer {
            #[serde(rename = "Version", default)]
            version: u32,
            #[serde(rename = "Run")]
            run: Inner,
        }

        #[derive(Deserialize)]
        struct Inner {
            #[serde(rename = "Id")]
            id: String,
            #[serde(rename = "Number")]
            number: u64,
            #[serde(rename = "Flowcell")]
            flowcell: String,
            #[serde(rename = "Instrument")]
            instrument: String,
            #[serde(rename = "Date")]
            date: String,
            #[serde(rename = "Reads")]
            reads: Reads,
        }

        #[derive(Deserialize)]
        struct Reads {
            #[serde(rename = "Read")]
            read: Vec<Read>,
        }

        let helper = Outer::deserialize(deserializer)?;

        Ok(RunInfo {
            version: helper.version,
            id: helper.run.id,
            number: helper.run.number,
            flowcell: helper.run.flowcell,
            instrument: helper.run.instrument,
            date: helper.run.date,
            reads: helper.run.reads.read,
        })
    }
}

/// One read of the run: a block of consecutive cycles
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Read {
    /// Which read this is
    #[serde(rename = "Number")]
    pub number: u64,
    /// How many cycles (e.g. bases) in the read
    #[serde(rename = "NumCycles")]
    pub num_cycles: usize,
    /// Whether or not it is an index read
    #[serde(rename = "IsIndexedRead", deserialize_with = "bool_from_string")]
    pub is_indexed_read: bool,
}

/// Convert from Y or N character to a boolean
fn bool_from_string<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: de::Deserializer<'de>,
{
    match String::deserialize(deserializer)?.as_ref() {
        "Y" => Ok(true),
        "N" => Ok(false),
        other => Err(de::Error::invalid_value(de::Unexpected::Str(other), &"Y or N")),
    }
}

/// Parse a `RunInfo.xml` file into a `RunInfo` struct
pub fn parse_run_info(run_info_path: &Path) -> Result<RunInfo> {
    let run_xml = File::open(run_info_path).map_err(|source| Error::Open {
        path: run_info_path.to_path_buf(),
        source,
    })?;

    Ok(from_reader(BufReader::new(run_xml))?)
}
