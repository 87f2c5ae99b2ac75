//! ddpack command line: argument parsing, layout configuration files and
//! multi-segment archive handling on top of `ddpack_codec`.

pub mod archive;
pub mod cli;
pub mod config;

pub use archive::{decompress_archive, inspect, list_segments, ArchiveStats, SegmentSummary};
pub use config::LayoutConfig;
