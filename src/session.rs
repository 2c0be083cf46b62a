//! Dataset playback: one [`FrameData`] per call, in cursor order.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::imgcodecs::{self, IMREAD_COLOR, IMREAD_GRAYSCALE, IMREAD_UNCHANGED};
use opencv::prelude::*;
use tracing::{debug, info, warn};

use crate::calibration::{CalibError, CalibrationParameters, CalibrationStore, CameraRole};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::geometry::SE3;
use crate::io::{FrameIndex, StereoTrajectory, TrajectoryLoader, load_timestamps};
use crate::sequence::{FrameRangeList, SequenceCursor};
use crate::source::{CalibrationSource, FrameSource, PoseSource, Side};
use crate::stereo::{DepthMap, DisparityMap, StereoDepthEngine};

/// Which raw images a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub gray: bool,
    pub color: bool,
}

impl Default for FrameRequest {
    fn default() -> Self {
        Self {
            gray: true,
            color: true,
        }
    }
}

impl FrameRequest {
    pub fn validate(&self) -> Result<()> {
        if !self.gray && !self.color {
            return Err(SessionError::InvalidRequest(
                "frame request must include gray or color images".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StereoImages {
    pub left: Mat,
    pub right: Mat,
}

/// Everything known about one frame index.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub index: usize,
    pub left_path: PathBuf,
    pub gray: Option<StereoImages>,
    pub color: Option<StereoImages>,
    pub label: Option<Mat>,
    /// Left camera pose in the world frame.
    pub abs_pose: Option<SE3>,
    pub abs_pose_right: Option<SE3>,
    /// Left camera motion since the previous frame index.
    pub rel_pose: Option<SE3>,
    pub rel_pose_right: Option<SE3>,
    /// Seconds since the start of the sequence.
    pub timestamp: Option<f64>,
}

pub struct DatasetSession {
    index: FrameIndex,
    calibration: Option<CalibrationStore>,
    depth_engine: Option<StereoDepthEngine>,
    trajectory: StereoTrajectory,
    timestamps: Vec<f64>,
    cursor: SequenceCursor,
    request: FrameRequest,
    closed: bool,
}

impl DatasetSession {
    pub fn init(config: &SessionConfig) -> Result<Self> {
        let request = config.request();
        request.validate()?;

        let (calibration, depth_engine) = match &config.calib_file {
            Some(path) => {
                let mut store = CalibrationStore::load(path)?;
                let base = store.set_base_camera_type(config.base_camera)?;
                info!(
                    "Base camera {}: fx {:.3}, baseline {:.4}",
                    config.base_camera, base.fx, base.baseline
                );
                let engine = StereoDepthEngine::new(
                    base,
                    config.disparity.sgbm(),
                    config.disparity.fill_policy(),
                );
                (Some(store), Some(engine))
            }
            None => {
                warn!("No calibration file; disparity and depth are not available");
                (None, None)
            }
        };

        let index = FrameIndex::build(
            &config.left_dir,
            &config.right_dir,
            config.label_dir.as_deref(),
        )?;

        let mut trajectory = match &config.pose_file {
            Some(path) => {
                let right_extrinsics = calibration
                    .as_ref()
                    .and_then(|store| store.get(CameraRole::RightGray).ok());
                TrajectoryLoader::load(path, right_extrinsics)
            }
            None => {
                warn!("Ground truth poses are not available for sequence");
                StereoTrajectory::default()
            }
        };
        if trajectory.left.len() > index.count() {
            warn!(
                "{} poses for {} frames; ignoring the extra poses",
                trajectory.left.len(),
                index.count()
            );
            trajectory.truncate(index.count());
        }

        let timestamps = match &config.timestamp_file {
            Some(path) => load_timestamps(path),
            None => {
                warn!("Time stamps are not available for sequence");
                Vec::new()
            }
        };
        if !timestamps.is_empty() && timestamps.len() != index.count() {
            warn!(
                "{} timestamps for {} frames; frames past the shorter list have no timestamp",
                timestamps.len(),
                index.count()
            );
        }

        let mut cursor = SequenceCursor::new();
        if let Some(path) = &config.sequence_control_file {
            cursor.set_range_list(FrameRangeList::from_json_file(path)?);
        }

        Ok(Self {
            index,
            calibration,
            depth_engine,
            trajectory,
            timestamps,
            cursor,
            request,
            closed: false,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.index.count()
    }

    /// Read the frame under the cursor and advance.
    pub fn next_frame(&mut self) -> Result<FrameData> {
        if self.closed {
            return Err(SessionError::EndOfSequence);
        }
        let idx = match self.cursor.current() {
            Some(idx) if idx < self.frame_count() => idx,
            _ => return Err(SessionError::EndOfSequence),
        };

        let frame = self.read_frame(idx)?;
        self.cursor.advance();
        debug!("Read frame {}", idx);
        Ok(frame)
    }

    pub fn jump_to(&mut self, idx: usize) -> Result<FrameData> {
        self.cursor.jump(idx);
        self.next_frame()
    }

    /// Reopen a closed session at the start of its traversal.
    pub fn open(&mut self) -> bool {
        self.closed = false;
        self.cursor.rewind();
        !self.index.is_empty()
    }

    pub fn close(&mut self) {
        if !self.closed {
            info!("Closing session at {:?}", self.cursor.current());
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_request(&mut self, request: FrameRequest) -> Result<()> {
        request.validate()?;
        self.request = request;
        Ok(())
    }

    pub fn request(&self) -> FrameRequest {
        self.request
    }

    pub fn set_range_list(&mut self, ranges: FrameRangeList) {
        self.cursor.set_range_list(ranges);
    }

    pub fn cursor(&self) -> &SequenceCursor {
        &self.cursor
    }

    pub fn frame_index(&self) -> &FrameIndex {
        &self.index
    }

    pub fn calibration_store(&self) -> Option<&CalibrationStore> {
        self.calibration.as_ref()
    }

    pub fn trajectory(&self) -> &StereoTrajectory {
        &self.trajectory
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn depth_engine(&self) -> Result<&StereoDepthEngine> {
        self.depth_engine
            .as_ref()
            .ok_or(SessionError::CalibrationUnavailable)
    }

    /// Disparity of the frame's stereo pair, filled when the engine's fill
    /// policy is enabled.
    pub fn disparity(&self, frame: &FrameData) -> Result<DisparityMap> {
        let engine = self.depth_engine()?;
        let pair = self.matching_pair(frame)?;
        engine.disparity(&pair.left, &pair.right, engine.fill_policy().enabled)
    }

    pub fn depth(&self, frame: &FrameData) -> Result<DepthMap> {
        let engine = self.depth_engine()?;
        let pair = self.matching_pair(frame)?;
        engine.depth_from_stereo(&pair.left, &pair.right, engine.fill_policy().enabled)
    }

    /// The pair of the base camera's kind, or the other one if it was not
    /// requested.
    fn matching_pair<'a>(&self, frame: &'a FrameData) -> Result<&'a StereoImages> {
        let base = self
            .calibration
            .as_ref()
            .and_then(CalibrationStore::base_camera_type)
            .ok_or(SessionError::CalibrationUnavailable)?;
        let (preferred, fallback) = match base {
            CameraRole::LeftGray | CameraRole::RightGray => (&frame.gray, &frame.color),
            CameraRole::LeftRgb | CameraRole::RightRgb => (&frame.color, &frame.gray),
        };
        preferred
            .as_ref()
            .or(fallback.as_ref())
            .ok_or_else(|| {
                SessionError::InvalidRequest(format!("frame {} has no images", frame.index))
            })
    }

    fn read_frame(&self, idx: usize) -> Result<FrameData> {
        let record = self.index.record(idx).ok_or(SessionError::EndOfSequence)?;

        let gray = if self.request.gray {
            Some(StereoImages {
                left: read_image(&record.left_path, IMREAD_GRAYSCALE)?,
                right: read_image(&record.right_path, IMREAD_GRAYSCALE)?,
            })
        } else {
            None
        };
        let color = if self.request.color {
            Some(StereoImages {
                left: read_image(&record.left_path, IMREAD_COLOR)?,
                right: read_image(&record.right_path, IMREAD_COLOR)?,
            })
        } else {
            None
        };
        let label = record
            .label_path
            .as_deref()
            .map(|path| read_image(path, IMREAD_UNCHANGED))
            .transpose()?;

        Ok(FrameData {
            index: idx,
            left_path: record.left_path,
            gray,
            color,
            label,
            abs_pose: self.trajectory.absolute_pose(idx, Side::Left),
            abs_pose_right: self.trajectory.absolute_pose(idx, Side::Right),
            rel_pose: self.trajectory.relative_pose(idx, Side::Left),
            rel_pose_right: self.trajectory.relative_pose(idx, Side::Right),
            timestamp: self.timestamps.get(idx).copied(),
        })
    }
}

fn read_image(path: &Path, flags: i32) -> Result<Mat> {
    let name = path
        .to_str()
        .ok_or_else(|| SessionError::ImageRead(path.to_path_buf()))?;
    let image = imgcodecs::imread(name, flags)?;
    if image.empty() {
        return Err(SessionError::ImageRead(path.to_path_buf()));
    }
    Ok(image)
}

impl CalibrationSource for DatasetSession {
    fn calibration(
        &self,
        role: CameraRole,
    ) -> std::result::Result<&CalibrationParameters, CalibError> {
        match &self.calibration {
            Some(store) => store.get(role),
            None => Err(CalibError::MissingRole(role)),
        }
    }
}

impl FrameSource for DatasetSession {
    fn open(&mut self) -> bool {
        DatasetSession::open(self)
    }

    fn fetch_next(&mut self) -> Result<FrameData> {
        self.next_frame()
    }

    fn jump_to(&mut self, idx: usize) -> Result<FrameData> {
        DatasetSession::jump_to(self, idx)
    }

    fn frame_count(&self) -> usize {
        DatasetSession::frame_count(self)
    }

    fn close(&mut self) {
        DatasetSession::close(self)
    }
}
