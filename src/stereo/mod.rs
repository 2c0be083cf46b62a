//! Dense disparity and metric depth for a rectified stereo pair.
//!
//! Disparity comes from OpenCV's semi-global block matcher. Depth follows
//! `Z = fx * baseline / d`, using the intrinsics of the configured base camera.

pub mod keypoints;

use nalgebra::DMatrix;
use opencv::calib3d::{self, StereoSGBM};
use opencv::core::{AlgorithmHint, CV_32F, CV_32FC1, Mat, Ptr};
use opencv::imgproc;
use opencv::prelude::*;
use tracing::debug;

use crate::calibration::{BasicCalibParams, CameraRole};
use crate::error::{Result, SessionError};
use crate::source::CalibrationSource;

/// Block matcher settings.
///
/// `num_disparities`, `P1` and `P2` all derive from `sad_window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgbmParams {
    pub sad_window: i32,
    pub block_size: i32,
    pub min_disparity: i32,
}

impl Default for SgbmParams {
    fn default() -> Self {
        Self {
            sad_window: 6,
            block_size: 11,
            min_disparity: 0,
        }
    }
}

impl SgbmParams {
    pub fn num_disparities(&self) -> i32 {
        16 * self.sad_window
    }

    /// Penalty for disparity changes of one pixel between neighbours.
    pub fn p1(&self) -> i32 {
        8 * 3 * self.sad_window * self.sad_window
    }

    /// Penalty for larger disparity jumps.
    pub fn p2(&self) -> i32 {
        32 * 3 * self.sad_window * self.sad_window
    }

    fn create_matcher(&self) -> Result<Ptr<StereoSGBM>> {
        if self.sad_window <= 0 || self.block_size <= 0 || self.block_size % 2 == 0 {
            return Err(SessionError::InvalidRequest(format!(
                "invalid block matcher settings: sad_window {} block_size {}",
                self.sad_window, self.block_size
            )));
        }
        let matcher = StereoSGBM::create(
            self.min_disparity,
            self.num_disparities(),
            self.block_size,
            self.p1(),
            self.p2(),
            0,
            0,
            0,
            0,
            0,
            calib3d::StereoSGBM_MODE_SGBM_3WAY,
        )?;
        Ok(matcher)
    }
}

/// Replacement of invalid disparities by a large sentinel, so that depth
/// stays finite (and close to zero) where matching failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisparityFill {
    /// Whether a session fills the disparities it computes. [`Self::apply`]
    /// fills regardless.
    pub enabled: bool,
    pub value: f32,
    /// Matcher outputs treated as "no match".
    pub invalid: [f32; 2],
}

impl Default for DisparityFill {
    fn default() -> Self {
        Self {
            enabled: true,
            value: 10000.0,
            invalid: [0.0, -1.0],
        }
    }
}

impl DisparityFill {
    pub fn apply(&self, disparity: &mut DisparityMap) {
        for d in disparity.data.iter_mut() {
            if self.invalid.contains(d) {
                *d = self.value;
            }
        }
    }
}

/// Per-pixel disparity in pixels. Rows follow the image height.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    data: DMatrix<f32>,
}

impl DisparityMap {
    pub fn new(data: DMatrix<f32>) -> Self {
        Self { data }
    }

    /// Copy a single-channel `CV_32F` matrix.
    pub fn from_mat(mat: &Mat) -> Result<Self> {
        Ok(Self::new(grid_from_mat(mat)?))
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.data.get((row, col)).copied()
    }

    pub fn as_matrix(&self) -> &DMatrix<f32> {
        &self.data
    }

    pub fn into_inner(self) -> DMatrix<f32> {
        self.data
    }
}

/// Per-pixel depth in the unit of the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    data: DMatrix<f32>,
}

impl DepthMap {
    pub fn new(data: DMatrix<f32>) -> Self {
        Self { data }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.data.get((row, col)).copied()
    }

    pub fn as_matrix(&self) -> &DMatrix<f32> {
        &self.data
    }

    pub fn into_inner(self) -> DMatrix<f32> {
        self.data
    }
}

/// Elementwise `fx * baseline / d`. Zero disparities give infinite depth.
pub fn depth_from_disparity(disparity: &DisparityMap, fx: f64, baseline: f64) -> DepthMap {
    let focal_baseline = (fx * baseline) as f32;
    DepthMap::new(disparity.data.map(|d| focal_baseline / d))
}

/// Like [`depth_from_disparity`] but rejects zero disparities, reporting the
/// first one in row-major order.
pub fn checked_depth_from_disparity(
    disparity: &DisparityMap,
    fx: f64,
    baseline: f64,
) -> Result<DepthMap> {
    let data = &disparity.data;
    for row in 0..data.nrows() {
        for col in 0..data.ncols() {
            if data[(row, col)] == 0.0 {
                return Err(SessionError::DivisionSingularity { row, col });
            }
        }
    }
    Ok(depth_from_disparity(disparity, fx, baseline))
}

/// Disparity and depth for one reference camera of a rectified pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoDepthEngine {
    calib: BasicCalibParams,
    sgbm: SgbmParams,
    fill: DisparityFill,
}

impl StereoDepthEngine {
    pub fn new(calib: BasicCalibParams, sgbm: SgbmParams, fill: DisparityFill) -> Self {
        debug!(
            "Stereo matcher: {} disparities, block {}, P1 {}, P2 {}",
            sgbm.num_disparities(),
            sgbm.block_size,
            sgbm.p1(),
            sgbm.p2()
        );
        Self { calib, sgbm, fill }
    }

    pub fn from_source<S: CalibrationSource + ?Sized>(
        source: &S,
        role: CameraRole,
        sgbm: SgbmParams,
        fill: DisparityFill,
    ) -> Result<Self> {
        let calib = source.basic_params(role)?;
        Ok(Self::new(calib, sgbm, fill))
    }

    pub fn calib(&self) -> &BasicCalibParams {
        &self.calib
    }

    pub fn sgbm_params(&self) -> &SgbmParams {
        &self.sgbm
    }

    pub fn fill_policy(&self) -> &DisparityFill {
        &self.fill
    }

    /// Disparity of `left` against `right`. Color images are matched in gray.
    ///
    /// With `fill` set, invalid matches are replaced by the fill sentinel.
    pub fn disparity(&self, left: &Mat, right: &Mat, fill: bool) -> Result<DisparityMap> {
        let (left_size, right_size) = (left.size()?, right.size()?);
        if left_size != right_size {
            return Err(SessionError::InvalidRequest(format!(
                "stereo images differ in size: {}x{} vs {}x{}",
                left_size.width, left_size.height, right_size.width, right_size.height
            )));
        }

        let left = to_gray(left)?;
        let right = to_gray(right)?;

        let mut matcher = self.sgbm.create_matcher()?;
        let mut fixed_point = Mat::default();
        matcher.compute(&left, &right, &mut fixed_point)?;

        // The matcher reports disparities with 4 fractional bits.
        let mut scaled = Mat::default();
        fixed_point.convert_to(&mut scaled, CV_32F, 1.0 / 16.0, 0.0)?;

        let mut disparity = DisparityMap::from_mat(&scaled)?;
        if fill {
            self.fill.apply(&mut disparity);
        }
        Ok(disparity)
    }

    pub fn depth(&self, disparity: &DisparityMap) -> DepthMap {
        depth_from_disparity(disparity, self.calib.fx, self.calib.baseline)
    }

    pub fn depth_from_stereo(&self, left: &Mat, right: &Mat, fill: bool) -> Result<DepthMap> {
        let disparity = self.disparity(left, right, fill)?;
        Ok(self.depth(&disparity))
    }
}

fn to_gray(image: &Mat) -> Result<Mat> {
    match image.channels() {
        1 => Ok(image.try_clone()?),
        3 => {
            let mut gray = Mat::default();
            imgproc::cvt_color(
                image,
                &mut gray,
                imgproc::COLOR_BGR2GRAY,
                0,
                AlgorithmHint::ALGO_HINT_DEFAULT,
            )?;
            Ok(gray)
        }
        n => Err(SessionError::InvalidRequest(format!(
            "unsupported image with {} channels",
            n
        ))),
    }
}

fn grid_from_mat(mat: &Mat) -> Result<DMatrix<f32>> {
    if mat.typ() != CV_32FC1 {
        return Err(SessionError::InvalidRequest(
            "expected a single-channel CV_32F matrix".to_string(),
        ));
    }
    let rows = mat.rows() as usize;
    let cols = mat.cols() as usize;
    if mat.is_continuous() {
        return Ok(DMatrix::from_row_slice(rows, cols, mat.data_typed::<f32>()?));
    }
    let mut grid = DMatrix::zeros(rows, cols);
    for r in 0..rows {
        for c in 0..cols {
            grid[(r, c)] = *mat.at_2d::<f32>(r as i32, c as i32)?;
        }
    }
    Ok(grid)
}
