//! Read masks (`y36,i8,i8,y36`): which cycles of a run hold the index reads.

use itertools::Itertools;
use regex::Regex;

use crate::error::{Error, Result};
use crate::run_info_parser::RunInfo;

/// Mask used when neither `--mask` nor a RunInfo.xml is available
pub const DEFAULT_MASK: &str = "y36,i8,i8,y36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleKind {
    Read,
    Index,
    Skip,
}

/// Longest run a mask may describe
pub const MAX_CYCLES: usize = 100_000;

fn invalid(mask: &str, reason: String) -> Error {
    Error::InvalidMask {
        mask: mask.to_string(),
        reason,
    }
}

/// `[yin][0-9]*` tokens, case-insensitive. Anything else between tokens is
/// ignored, and a missing or zero count means one cycle.
fn tokens(mask: &str) -> Result<Vec<(CycleKind, usize)>> {
    let token_regex = Regex::new(r"(?i)([yin])([0-9]+)?")
        .map_err(|e| invalid(mask, format!("could not compile mask regex: {}", e)))?;

    let mut tokens = Vec::new();
    for captures in token_regex.captures_iter(mask) {
        let kind = match captures[1].to_ascii_lowercase().as_str() {
            "y" => CycleKind::Read,
            "i" => CycleKind::Index,
            _ => CycleKind::Skip,
        };
        let count = match captures.get(2) {
            Some(digits) => digits
                .as_str()
                .parse::<usize>()
                .map_err(|e| invalid(mask, format!("bad cycle count '{}': {}", digits.as_str(), e)))?,
            None => 1,
        };
        tokens.push((kind, count.max(1)));
    }

    Ok(tokens)
}

/// 1-based cycle numbers of every index cycle, in mask order
pub fn index_cycles(mask: &str) -> Result<Vec<usize>> {
    let mut cycles = Vec::new();
    let mut current = 1usize;
    for (kind, count) in tokens(mask)? {
        let next = current
            .checked_add(count)
            .filter(|&next| next <= MAX_CYCLES + 1)
            .ok_or_else(|| invalid(mask, format!("more than {} cycles", MAX_CYCLES)))?;
        if kind == CycleKind::Index {
            cycles.extend(current..next);
        }
        current = next;
    }

    if cycles.is_empty() {
        return Err(invalid(mask, "no index cycles".to_string()));
    }
    Ok(cycles)
}

/// 1-based number of the last read (comma-separated segment) holding an index
/// cycle, or 1 if there is none. Readiness markers on the HiSeq are per read.
pub fn last_index_read(mask: &str) -> usize {
    mask.to_ascii_lowercase()
        .split(',')
        .enumerate()
        .filter(|(_, read)| read.contains('i'))
        .map(|(i, _)| i + 1)
        .last()
        .unwrap_or(1)
}

/// Rebuild the mask the instrument ran with, e.g. `y151,i8,i8,y151`
pub fn mask_from_run_info(run_info: &RunInfo) -> String {
    run_info
        .reads
        .iter()
        .map(|r| format!("{}{}", if r.is_indexed_read { 'i' } else { 'y' }, r.num_cycles))
        .join(",")
}
