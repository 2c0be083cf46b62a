//! Per-frame timestamps in seconds.

use std::io::BufRead;
use std::path::Path;

use tracing::{info, warn};

use super::{ParseError, frame_lines, open_optional, parse_floats};

/// Parse the first value of every line.
pub fn parse_timestamps<R: BufRead>(reader: R) -> Result<Vec<f64>, ParseError> {
    let mut timestamps = Vec::new();
    for (line_no, line) in frame_lines(reader)? {
        if let Some(&t) = parse_floats(&line, line_no)?.first() {
            timestamps.push(t);
        }
    }
    Ok(timestamps)
}

/// Load timestamps; a missing or malformed file yields an empty list.
///
/// Entry `i` belongs to frame `i`. No alignment against the image streams is
/// done here.
pub fn load_timestamps<P: AsRef<Path>>(path: P) -> Vec<f64> {
    let path = path.as_ref();
    let Some(reader) = open_optional(path, "Time stamps") else {
        return Vec::new();
    };
    match parse_timestamps(reader) {
        Ok(timestamps) => {
            info!("Loaded {} timestamps from {:?}", timestamps.len(), path);
            timestamps
        }
        Err(e) => {
            warn!("Ignoring timestamps in {:?}: {}", path, e);
            Vec::new()
        }
    }
}
