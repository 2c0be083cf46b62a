//! Frame cursor with optional selective sequencing.
//!
//! The cursor starts in sequential mode and walks `0, 1, 2, ...`. Handing it a
//! [`FrameRangeList`] switches it to controlled mode, where it only visits the
//! indices of the listed half-open ranges, in list order.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// Half-open interval `[start, end)` of frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[usize; 2]")]
pub struct FrameRange {
    pub start: usize,
    pub end: usize,
}

impl From<[usize; 2]> for FrameRange {
    fn from([start, end]: [usize; 2]) -> Self {
        Self { start, end }
    }
}

impl FrameRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Ordered frame ranges to visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameRangeList {
    ranges: Vec<FrameRange>,
}

/// Sequence control file layout.
#[derive(Debug, Deserialize)]
struct SequenceControl {
    critical_frames: Vec<FrameRange>,
}

impl FrameRangeList {
    pub fn new(ranges: Vec<FrameRange>) -> Self {
        for range in ranges.iter().filter(|r| r.is_empty()) {
            warn!("Frame range [{}, {}) is empty and will be skipped", range.start, range.end);
        }
        Self { ranges }
    }

    /// Parse a sequence control document: `{"critical_frames": [[start, end], ...]}`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let control: SequenceControl = serde_json::from_str(text)
            .map_err(|e| SessionError::Config(format!("invalid sequence control file: {}", e)))?;
        Ok(Self::new(control.critical_frames))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| SessionError::MissingFile(path.to_path_buf()))?;
        let control: SequenceControl =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                SessionError::Config(format!("invalid sequence control file {:?}: {}", path, e))
            })?;
        let list = Self::new(control.critical_frames);
        info!(
            "Loaded {} critical frame ranges ({} frames) from {:?}",
            list.ranges.len(),
            list.frame_indices().count(),
            path
        );
        Ok(list)
    }

    pub fn ranges(&self) -> &[FrameRange] {
        &self.ranges
    }

    /// All indices in visiting order.
    pub fn frame_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|r| r.start..r.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    Sequential,
    Controlled {
        ranges: FrameRangeList,
        queue: VecDeque<usize>,
    },
}

/// Position of the next frame to read.
///
/// `position` is `None` once a controlled queue has run dry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCursor {
    position: Option<usize>,
    state: CursorState,
}

impl Default for SequenceCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCursor {
    pub fn new() -> Self {
        Self {
            position: Some(0),
            state: CursorState::Sequential,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn is_controlled(&self) -> bool {
        matches!(self.state, CursorState::Controlled { .. })
    }

    /// Index the next read will materialize.
    pub fn current(&self) -> Option<usize> {
        self.position
    }

    /// Restrict traversal to `ranges`, starting at the first listed index.
    pub fn set_range_list(&mut self, ranges: FrameRangeList) {
        let mut queue: VecDeque<usize> = ranges.frame_indices().collect();
        self.position = queue.pop_front();
        debug!("Controlled sequencing with {} queued frames", queue.len());
        self.state = CursorState::Controlled { ranges, queue };
    }

    /// Back to sequential traversal from the first frame.
    pub fn clear_range_list(&mut self) {
        self.state = CursorState::Sequential;
        self.position = Some(0);
    }

    /// Successor of `current`: the next index in sequential mode, or the head
    /// of the queue in controlled mode (`None` once it is exhausted).
    pub fn next_index(&mut self, current: usize) -> Option<usize> {
        match &mut self.state {
            CursorState::Sequential => Some(current + 1),
            CursorState::Controlled { queue, .. } => queue.pop_front(),
        }
    }

    pub fn advance(&mut self) {
        if let Some(current) = self.position {
            self.position = self.next_index(current);
        }
        debug!("Cursor advanced to {:?}", self.position);
    }

    /// Seek to `idx`. The controlled queue is left untouched.
    pub fn jump(&mut self, idx: usize) {
        self.position = Some(idx);
    }

    /// Restart the traversal: frame 0, or the first listed frame.
    pub fn rewind(&mut self) {
        match &mut self.state {
            CursorState::Sequential => self.position = Some(0),
            CursorState::Controlled { ranges, queue } => {
                *queue = ranges.frame_indices().collect();
                self.position = queue.pop_front();
            }
        }
    }

    /// No more frames: the queue is exhausted or the end of the streams is
    /// reached.
    pub fn is_exhausted(&self, frame_count: usize) -> bool {
        match self.position {
            Some(idx) => idx >= frame_count,
            None => true,
        }
    }
}
