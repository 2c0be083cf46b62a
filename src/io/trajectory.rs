//! Ground-truth trajectories for the left and right camera.

use std::io::BufRead;
use std::path::Path;

use nalgebra::Matrix3x4;
use tracing::{info, warn};

use super::{ParseError, frame_lines, open_optional, parse_floats};
use crate::calibration::CalibrationParameters;
use crate::geometry::SE3;

/// Values per pose line: a row-major 3x4 matrix, bottom row implied.
const POSE_LEN: usize = 12;

/// Absolute camera poses (`T_world_cam`), one per frame index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    poses: Vec<SE3>,
}

impl Trajectory {
    pub fn new(poses: Vec<SE3>) -> Self {
        Self { poses }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SE3> {
        self.poses.get(idx)
    }

    pub fn poses(&self) -> &[SE3] {
        &self.poses
    }

    /// Motion from frame `idx - 1` to frame `idx`: `inverse(T[idx-1]) * T[idx]`.
    ///
    /// There is no relative pose for the first frame.
    pub fn relative(&self, idx: usize) -> Option<SE3> {
        if idx == 0 {
            return None;
        }
        let prev = self.poses.get(idx - 1)?;
        let curr = self.poses.get(idx)?;
        Some(prev.inverse().compose(curr))
    }

    pub fn truncate(&mut self, len: usize) {
        self.poses.truncate(len);
    }
}

/// Left trajectory plus the right trajectory derived through the rig.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoTrajectory {
    pub left: Trajectory,
    pub right: Trajectory,
}

impl StereoTrajectory {
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Drop poses past the last frame so pose `i` always belongs to frame `i`.
    pub fn truncate(&mut self, len: usize) {
        self.left.truncate(len);
        self.right.truncate(len);
    }
}

pub struct TrajectoryLoader;

impl TrajectoryLoader {
    /// Load left-camera poses and derive the right-camera poses.
    ///
    /// A missing or malformed file yields empty trajectories with a warning.
    /// Without right extrinsics only the left trajectory is filled.
    pub fn load<P: AsRef<Path>>(
        pose_file: P,
        right_extrinsics: Option<&CalibrationParameters>,
    ) -> StereoTrajectory {
        let pose_file = pose_file.as_ref();
        let Some(reader) = open_optional(pose_file, "Ground truth poses") else {
            return StereoTrajectory::default();
        };

        let left = match parse_poses(reader) {
            Ok(poses) => Trajectory::new(poses),
            Err(e) => {
                warn!("Ignoring ground truth poses in {:?}: {}", pose_file, e);
                return StereoTrajectory::default();
            }
        };

        let right = match right_extrinsics {
            Some(extrinsics) => Self::derive_right(&left, extrinsics),
            None => {
                warn!("No right camera extrinsics; right camera poses are not available");
                Trajectory::default()
            }
        };

        info!("Loaded {} ground truth poses from {:?}", left.len(), pose_file);
        StereoTrajectory { left, right }
    }

    /// `right[i] = left[i] * T_left_right` with one static rig transform.
    pub fn derive_right(left: &Trajectory, right_extrinsics: &CalibrationParameters) -> Trajectory {
        let t_left_right = rig_transform(right_extrinsics);
        Trajectory::new(
            left.poses()
                .iter()
                .map(|pose| pose.compose(&t_left_right))
                .collect(),
        )
    }
}

/// Pose of the right camera in the left camera frame.
///
/// The right projection `K [R | t]` maps left-frame points into the right
/// camera, so the right camera pose is the inverse of `[R | t]`. The rig is
/// assumed rigid for the whole sequence.
pub fn rig_transform(right_extrinsics: &CalibrationParameters) -> SE3 {
    SE3::from_rt(right_extrinsics.r, right_extrinsics.t).inverse()
}

/// Parse one pose per line.
pub fn parse_poses<R: BufRead>(reader: R) -> Result<Vec<SE3>, ParseError> {
    let mut poses = Vec::new();
    for (line_no, line) in frame_lines(reader)? {
        let values = parse_floats(&line, line_no)?;
        if values.len() != POSE_LEN {
            return Err(ParseError {
                line: line_no,
                reason: format!("expected {} values, got {}", POSE_LEN, values.len()),
            });
        }
        poses.push(SE3::from_matrix3x4(&Matrix3x4::from_row_slice(&values)));
    }
    Ok(poses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
    use std::io::Cursor;

    fn pose_line(pose: &SE3) -> String {
        let m = pose.to_matrix();
        (0..3)
            .flat_map(|r| (0..4).map(move |c| (r, c)))
            .map(|(r, c)| format!("{:.15e}", m[(r, c)]))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn sample_poses(n: usize) -> Vec<SE3> {
        (0..n)
            .map(|i| {
                let a = i as f64 * 0.1;
                SE3::from_rt(
                    Rotation3::from_euler_angles(0.01 * a, a, -0.02 * a).into_inner(),
                    Vector3::new(a.sin() * 3.0, 0.05 * a, a * 2.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_parse_identity_pose() {
        let text = "1 0 0 0 0 1 0 0 0 0 1 0\n";
        let poses = parse_poses(Cursor::new(text)).unwrap();
        assert_eq!(poses.len(), 1);
        assert_relative_eq!(poses[0].to_matrix(), Matrix4::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_relative_poses_compose_to_last_pose() {
        let expected = sample_poses(8);
        let text: String = expected.iter().map(|p| pose_line(p) + "\n").collect();
        let traj = Trajectory::new(parse_poses(Cursor::new(text)).unwrap());

        assert!(traj.relative(0).is_none());

        let mut acc = *traj.get(0).unwrap();
        for i in 1..traj.len() {
            acc = acc.compose(&traj.relative(i).unwrap());
        }
        assert_relative_eq!(
            acc.to_matrix(),
            traj.get(traj.len() - 1).unwrap().to_matrix(),
            epsilon = 1e-9
        );
        assert!(traj.relative(traj.len()).is_none());
    }

    #[test]
    fn test_short_line_is_parse_error() {
        let text = "1 0 0 0 0 1 0 0 0 0 1 0\n1 0 0 0 0 1 0 0 0 0 1\n";
        let err = parse_poses(Cursor::new(text)).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_blank_line_between_poses_is_error() {
        let text = "1 0 0 0 0 1 0 0 0 0 1 0\n\n1 0 0 0 0 1 0 0 0 0 1 1\n\n";
        let err = parse_poses(Cursor::new(text)).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_right_trajectory_follows_rig_offset() {
        // Rectified rig: right camera sits 0.5 m to the right of the left one.
        let extrinsics = CalibrationParameters::from_intrinsics(
            700.0,
            700.0,
            600.0,
            180.0,
            Matrix3::identity(),
            Vector3::new(-0.5, 0.0, 0.0),
        );
        let left = Trajectory::new(vec![
            SE3::identity(),
            SE3::from_rt(
                Rotation3::from_euler_angles(0.0, std::f64::consts::FRAC_PI_2, 0.0).into_inner(),
                Vector3::new(0.0, 0.0, 1.0),
            ),
        ]);

        let right = TrajectoryLoader::derive_right(&left, &extrinsics);

        assert_relative_eq!(
            right.get(0).unwrap().translation,
            Vector3::new(0.5, 0.0, 0.0),
            epsilon = 1e-12
        );
        // After a 90 degree yaw the rig offset points along -z of the world.
        assert_relative_eq!(
            right.get(1).unwrap().translation,
            Vector3::new(0.0, 0.0, 0.5),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_missing_file_gives_empty_trajectories() {
        let traj = TrajectoryLoader::load("/nonexistent/poses.txt", None);
        assert!(traj.left.is_empty());
        assert!(traj.right.is_empty());
    }

    #[test]
    fn test_malformed_file_gives_empty_trajectories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.txt");
        std::fs::write(&path, "1 0 0 0 0 1 0 0 0 0 1 0\nnot a pose\n").unwrap();

        let traj = TrajectoryLoader::load(&path, None);
        assert!(traj.is_empty());
    }
}
