//! Count the index reads of an Illumina run, lane by lane, straight from the
//! base call files.
//!
//! Each lane runs as a pipeline of threads joined by bounded channels: one
//! decoder per index cycle feeds the [`transposer`], which builds barcodes
//! that the [`sync`] stage pairs with the lane's filter flags before they are
//! tallied. [`run::count_run`] runs every lane at once.

pub mod error;
pub mod config;
pub mod stream;

pub mod call_code;
pub mod bcl_decoder;
pub mod cbcl_header_decoder;
pub mod cbcl_decoder;
pub mod filter_decoder;

pub mod cycle_decoder;
pub mod base_decoder;
pub mod transposer;
pub mod sync;
pub mod tally;
pub mod lane;
pub mod run;

pub mod mask;
pub mod run_info_parser;
pub mod platform;
pub mod report;

#[cfg(test)]
mod testutil;
