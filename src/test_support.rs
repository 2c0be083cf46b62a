//! Fixtures shared by unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use opencv::core::{CV_8UC1, CV_8UC3, Mat, Scalar, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;

/// KITTI odometry sequence 00 calibration (P0..P3 plus the velodyne line).
pub(crate) const KITTI_CALIB: &str = "\
P0: 7.188560e+02 0.000000e+00 6.071928e+02 0.000000e+00 0.000000e+00 7.188560e+02 1.852157e+02 0.000000e+00 0.000000e+00 0.000000e+00 1.000000e+00 0.000000e+00
P1: 7.188560e+02 0.000000e+00 6.071928e+02 -3.861448e+02 0.000000e+00 7.188560e+02 1.852157e+02 0.000000e+00 0.000000e+00 0.000000e+00 1.000000e+00 0.000000e+00
P2: 7.188560e+02 0.000000e+00 6.071928e+02 4.538225e+01 0.000000e+00 7.188560e+02 1.852157e+02 -1.130887e-01 0.000000e+00 0.000000e+00 1.000000e+00 3.779761e-03
P3: 7.188560e+02 0.000000e+00 6.071928e+02 -3.372877e+02 0.000000e+00 7.188560e+02 1.852157e+02 2.369057e+00 0.000000e+00 0.000000e+00 1.000000e+00 4.915215e-03
Tr: 4.276802e-04 -9.999672e-01 -8.084491e-03 -1.198459e-02 -7.210626e-03 8.081198e-03 -9.999413e-01 -5.403984e-02 9.999738e-01 4.859485e-04 -7.206933e-03 -2.921968e-01
";

/// Deterministic texture value for pixel `(row, col)`.
pub(crate) fn texture(row: i32, col: i32) -> u8 {
    let h = (row as u32)
        .wrapping_mul(73_856_093)
        ^ (col as u32).wrapping_mul(19_349_663);
    (h.wrapping_mul(2_654_435_761) >> 24) as u8
}

/// Textured gray image whose content is moved `shift` pixels to the left,
/// i.e. the right view of a fronto-parallel plane at disparity `shift`.
pub(crate) fn textured_gray(rows: i32, cols: i32, shift: i32) -> Mat {
    let mut img = Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(0.0)).unwrap();
    for r in 0..rows {
        for c in 0..cols {
            *img.at_2d_mut::<u8>(r, c).unwrap() = texture(r, c + shift);
        }
    }
    img
}

pub(crate) fn flat_gray(rows: i32, cols: i32, value: f64) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(value)).unwrap()
}

pub(crate) fn flat_color(rows: i32, cols: i32, value: f64) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(value)).unwrap()
}

pub(crate) fn write_image(path: &Path, image: &Mat) {
    assert!(imgcodecs::imwrite(path.to_str().unwrap(), image, &Vector::new()).unwrap());
}

/// Minimal dataset on disk: `frames` stereo pairs, KITTI calibration,
/// poses and timestamps.
pub(crate) struct DatasetFixture {
    pub root: tempfile::TempDir,
    pub frames: usize,
}

impl DatasetFixture {
    pub fn new(frames: usize) -> Self {
        let root = tempfile::tempdir().unwrap();
        for dir in ["image_2", "image_3", "label"] {
            fs::create_dir(root.path().join(dir)).unwrap();
        }
        for i in 0..frames {
            let name = format!("{:06}.png", i);
            let value = (10 * i) as f64;
            write_image(&root.path().join("image_2").join(&name), &flat_color(16, 128, value));
            write_image(&root.path().join("image_3").join(&name), &flat_color(16, 128, value));
            write_image(&root.path().join("label").join(&name), &flat_gray(16, 128, value));
        }

        fs::write(root.path().join("calib.txt"), KITTI_CALIB).unwrap();

        let poses: String = (0..frames)
            .map(|i| format!("1 0 0 0 0 1 0 0 0 0 1 {}\n", i as f64 * 0.8))
            .collect();
        fs::write(root.path().join("poses.txt"), poses).unwrap();

        let times: String = (0..frames)
            .map(|i| format!("{:e}\n", i as f64 * 0.1))
            .collect();
        fs::write(root.path().join("times.txt"), times).unwrap();

        Self { root, frames }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }
}
