//! Sampling disparity and depth at sparse keypoints.

use nalgebra::{DMatrix, Point2};
use opencv::core::{CV_32F, Mat, Point2f, Size, absdiff, mean, no_array};
use opencv::imgproc;
use opencv::prelude::*;

use super::{DepthMap, DisparityMap};
use crate::error::{Result, SessionError};

/// Disparity under each keypoint; `None` outside the map.
pub fn disparity_at(keypoints: &[Point2<f64>], disparity: &DisparityMap) -> Vec<Option<f32>> {
    keypoints
        .iter()
        .map(|p| sample(disparity.as_matrix(), p))
        .collect()
}

/// Depth under each keypoint; `None` outside the map.
pub fn depth_at(keypoints: &[Point2<f64>], depth: &DepthMap) -> Vec<Option<f32>> {
    keypoints
        .iter()
        .map(|p| sample(depth.as_matrix(), p))
        .collect()
}

/// Predicted location of each left keypoint in the right image.
pub fn shift_by_disparity(
    keypoints: &[Point2<f64>],
    disparities: &[f32],
) -> Result<Vec<Point2<f64>>> {
    if keypoints.len() != disparities.len() {
        return Err(SessionError::InvalidRequest(format!(
            "{} keypoints but {} disparities",
            keypoints.len(),
            disparities.len()
        )));
    }
    Ok(keypoints
        .iter()
        .zip(disparities)
        .map(|(p, &d)| Point2::new(p.x - d as f64, p.y))
        .collect())
}

/// Mean absolute intensity difference between square patches centered on
/// each point pair, sampled with sub-pixel accuracy.
pub fn patch_l1_distance(
    pairs: &[(Point2<f64>, Point2<f64>)],
    img1: &Mat,
    img2: &Mat,
    patch_size: i32,
) -> Result<Vec<f64>> {
    if patch_size <= 0 {
        return Err(SessionError::InvalidRequest(format!(
            "patch size must be positive, got {}",
            patch_size
        )));
    }
    if img1.channels() != img2.channels() {
        return Err(SessionError::InvalidRequest(
            "patch comparison needs images with the same channel count".to_string(),
        ));
    }

    let size = Size::new(patch_size, patch_size);
    let channels = img1.channels().clamp(1, 4) as usize;
    let mut distances = Vec::with_capacity(pairs.len());
    for (p1, p2) in pairs {
        let a = patch(img1, p1, size)?;
        let b = patch(img2, p2, size)?;
        let mut diff = Mat::default();
        absdiff(&a, &b, &mut diff)?;
        let channel_means = mean(&diff, &no_array())?;
        distances.push((0..channels).map(|c| channel_means[c]).sum::<f64>() / channels as f64);
    }
    Ok(distances)
}

fn patch(image: &Mat, center: &Point2<f64>, size: Size) -> Result<Mat> {
    let mut out = Mat::default();
    imgproc::get_rect_sub_pix(
        image,
        size,
        Point2f::new(center.x as f32, center.y as f32),
        &mut out,
        CV_32F,
    )?;
    Ok(out)
}

/// Value at the truncated pixel coordinates of `p`.
fn sample(grid: &DMatrix<f32>, p: &Point2<f64>) -> Option<f32> {
    if !(p.x.is_finite() && p.y.is_finite()) || p.x < 0.0 || p.y < 0.0 {
        return None;
    }
    grid.get((p.y as usize, p.x as usize)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::test_support::{flat_color, flat_gray};

    fn disparity() -> DisparityMap {
        DisparityMap::new(DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
    }

    #[test]
    fn test_lookup_truncates_coordinates() {
        let points = [
            Point2::new(1.9, 0.2),
            Point2::new(2.0, 1.99),
            Point2::new(3.0, 0.0),
            Point2::new(-0.5, 0.0),
            Point2::new(f64::NAN, 1.0),
        ];
        assert_eq!(
            disparity_at(&points, &disparity()),
            vec![Some(2.0), Some(6.0), None, None, None]
        );

        let depth = DepthMap::new(disparity().into_inner().map(|d| 10.0 * d));
        assert_eq!(depth_at(&points[..2], &depth), vec![Some(20.0), Some(60.0)]);
    }

    #[test]
    fn test_shift_by_disparity() {
        let points = [Point2::new(100.0, 20.0), Point2::new(50.5, 7.0)];
        let shifted = shift_by_disparity(&points, &[10.0, 0.5]).unwrap();
        assert_eq!(shifted, vec![Point2::new(90.0, 20.0), Point2::new(50.0, 7.0)]);

        assert!(matches!(
            shift_by_disparity(&points, &[1.0]),
            Err(SessionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_patch_distance_between_flat_images() {
        let center = (Point2::new(10.0, 8.0), Point2::new(12.5, 8.0));

        let (a, b) = (flat_gray(20, 30, 50.0), flat_gray(20, 30, 50.0));
        let same = patch_l1_distance(&[center], &a, &b, 5).unwrap();
        assert_relative_eq!(same[0], 0.0, epsilon = 1e-9);

        let (a, b) = (flat_gray(20, 30, 10.0), flat_gray(20, 30, 30.0));
        let gray = patch_l1_distance(&[center], &a, &b, 5).unwrap();
        assert_relative_eq!(gray[0], 20.0, epsilon = 1e-4);

        let (a, b) = (flat_color(20, 30, 100.0), flat_color(20, 30, 40.0));
        let color = patch_l1_distance(&[center], &a, &b, 3).unwrap();
        assert_relative_eq!(color[0], 60.0, epsilon = 1e-4);
    }

    #[test]
    fn test_invalid_patch_size() {
        let img = flat_gray(4, 4, 0.0);
        assert!(matches!(
            patch_l1_distance(&[], &img, &img, 0),
            Err(SessionError::InvalidRequest(_))
        ));
    }
}
