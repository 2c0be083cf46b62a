//! Camera calibration: per-role intrinsics/extrinsics and projection matrix
//! decomposition.
//!
//! A calibration file holds one 3x4 projection matrix per camera role. Each
//! matrix is factored into `K [R | t]` once at load time; the stereo depth
//! engine then only needs the reduced [`BasicCalibParams`] of one reference
//! role.

mod decompose;
mod store;

use std::fmt;
use std::path::PathBuf;

use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use thiserror::Error;

pub use decompose::{decompose_projection_matrix, rq_decompose};
pub use store::CalibrationStore;

/// Camera roles of a stereo rig with both gray and color pairs.
///
/// The declaration order is the line order of the calibration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum CameraRole {
    LeftGray,
    RightGray,
    LeftRgb,
    RightRgb,
}

impl CameraRole {
    pub const ALL: [CameraRole; 4] = [
        CameraRole::LeftGray,
        CameraRole::RightGray,
        CameraRole::LeftRgb,
        CameraRole::RightRgb,
    ];

    pub fn index(self) -> usize {
        match self {
            CameraRole::LeftGray => 0,
            CameraRole::RightGray => 1,
            CameraRole::LeftRgb => 2,
            CameraRole::RightRgb => 3,
        }
    }

    /// The other camera of the same stereo pair.
    pub fn stereo_partner(self) -> CameraRole {
        match self {
            CameraRole::LeftGray => CameraRole::RightGray,
            CameraRole::RightGray => CameraRole::LeftGray,
            CameraRole::LeftRgb => CameraRole::RightRgb,
            CameraRole::RightRgb => CameraRole::LeftRgb,
        }
    }
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraRole::LeftGray => "LEFT_GRAY",
            CameraRole::RightGray => "RIGHT_GRAY",
            CameraRole::LeftRgb => "LEFT_RGB",
            CameraRole::RightRgb => "RIGHT_RGB",
        };
        f.write_str(name)
    }
}

/// Decomposed camera: `P ~ K [R | t]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParameters {
    /// Upper-triangular intrinsics with `k[(2, 2)] == 1`.
    pub k: Matrix3<f64>,
    pub r: Matrix3<f64>,
    /// Euclidean translation (already divided by its homogeneous component).
    pub t: Vector3<f64>,
}

impl CalibrationParameters {
    /// Parameters for a camera whose firmware reports a pinhole model and
    /// rig extrinsics directly instead of a projection matrix.
    pub fn from_intrinsics(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        r: Matrix3<f64>,
        t: Vector3<f64>,
    ) -> Self {
        Self {
            k: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            r,
            t,
        }
    }
}

/// Pinhole intrinsics plus stereo baseline for one reference camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicCalibParams {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Distance between this camera and its stereo partner along x.
    pub baseline: f64,
}

impl BasicCalibParams {
    pub fn from_pair(own: &CalibrationParameters, partner: &CalibrationParameters) -> Self {
        Self {
            fx: own.k[(0, 0)],
            fy: own.k[(1, 1)],
            cx: own.k[(0, 2)],
            cy: own.k[(1, 2)],
            baseline: (partner.t.x - own.t.x).abs(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CalibError {
    #[error("calibration parse failure at line {line}: {reason}")]
    ParseFailure { line: usize, reason: String },

    #[error("cannot read calibration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("projection matrix has a singular leading 3x3 block")]
    Degenerate,

    #[error("no calibration parameters for camera {0}")]
    MissingRole(CameraRole),
}
