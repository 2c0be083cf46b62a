//! Dataset file access: image listings, ground-truth poses and timestamps.
//!
//! Everything here except the image listing is optional ground truth. The
//! loaders degrade to empty results with a warning instead of failing, so a
//! sequence without poses or timestamps can still be played back.

pub mod frame_index;
pub mod timestamps;
pub mod trajectory;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::warn;

pub use frame_index::{FrameIndex, FrameRecord, Stream, list_image_files};
pub use timestamps::{load_timestamps, parse_timestamps};
pub use trajectory::{StereoTrajectory, Trajectory, TrajectoryLoader, parse_poses, rig_transform};

/// Malformed line in a pose or timestamp file.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

/// Open an optional ground-truth file, warning when it does not exist.
fn open_optional(path: &Path, what: &str) -> Option<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Some(BufReader::new(file)),
        Err(e) => {
            warn!("{} are not available for sequence ({:?}: {})", what, path, e);
            None
        }
    }
}

/// Parse whitespace-separated floats of one line.
fn parse_floats(line: &str, line_no: usize) -> Result<Vec<f64>, ParseError> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>().map_err(|e| ParseError {
                line: line_no,
                reason: format!("invalid number {:?}: {}", tok, e),
            })
        })
        .collect()
}

/// Non-blank lines with their 1-based numbers.
///
/// Line `i` of a per-frame file belongs to frame `i`, so a blank line between
/// entries would shift every later frame. Only trailing blank lines are
/// accepted.
fn frame_lines<R: BufRead>(reader: R) -> Result<Vec<(usize, String)>, ParseError> {
    let mut lines = Vec::new();
    let mut blank_at = None;
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| ParseError {
            line: line_no,
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            blank_at.get_or_insert(line_no);
            continue;
        }
        if let Some(blank) = blank_at {
            return Err(ParseError {
                line: blank,
                reason: "blank line between entries".to_string(),
            });
        }
        lines.push((line_no, line));
    }
    Ok(lines)
}
