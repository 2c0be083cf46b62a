//! Capabilities a frame provider exposes to the capture loop.
//!
//! A recorded dataset ([`crate::session::DatasetSession`]) and a live stereo
//! camera both sit behind these traits. Calibration, poses and frames are
//! separate capabilities since a live camera has no ground truth.

use crate::calibration::{
    BasicCalibParams, CalibError, CalibrationParameters, CalibrationStore, CameraRole,
};
use crate::error::Result;
use crate::geometry::SE3;
use crate::io::StereoTrajectory;
use crate::session::FrameData;

pub trait CalibrationSource {
    fn calibration(
        &self,
        role: CameraRole,
    ) -> std::result::Result<&CalibrationParameters, CalibError>;

    /// Intrinsics of `role` plus the baseline to its stereo partner.
    fn basic_params(&self, role: CameraRole) -> std::result::Result<BasicCalibParams, CalibError> {
        let own = self.calibration(role)?;
        let partner = self.calibration(role.stereo_partner())?;
        Ok(BasicCalibParams::from_pair(own, partner))
    }
}

impl CalibrationSource for CalibrationStore {
    fn calibration(
        &self,
        role: CameraRole,
    ) -> std::result::Result<&CalibrationParameters, CalibError> {
        self.get(role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

pub trait PoseSource {
    /// Number of frames with a ground-truth pose.
    fn pose_count(&self) -> usize;

    fn absolute_pose(&self, idx: usize, side: Side) -> Option<SE3>;

    /// Motion since the previous frame; `None` for the first one.
    fn relative_pose(&self, idx: usize, side: Side) -> Option<SE3>;
}

impl PoseSource for StereoTrajectory {
    fn pose_count(&self) -> usize {
        self.left.len()
    }

    fn absolute_pose(&self, idx: usize, side: Side) -> Option<SE3> {
        match side {
            Side::Left => self.left.get(idx).copied(),
            Side::Right => self.right.get(idx).copied(),
        }
    }

    fn relative_pose(&self, idx: usize, side: Side) -> Option<SE3> {
        match side {
            Side::Left => self.left.relative(idx),
            Side::Right => self.right.relative(idx),
        }
    }
}

/// Pull-based frame provider driven by the capture loop.
pub trait FrameSource {
    /// Prepare for reading from the first frame. Returns `false` when there
    /// is nothing to read.
    fn open(&mut self) -> bool;

    /// Next frame, or [`crate::error::SessionError::EndOfSequence`].
    fn fetch_next(&mut self) -> Result<FrameData>;

    fn jump_to(&mut self, idx: usize) -> Result<FrameData>;

    fn frame_count(&self) -> usize;

    fn close(&mut self);
}
