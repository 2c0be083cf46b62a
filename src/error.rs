//! Session-level error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::calibration::CalibError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Calibration(#[from] CalibError),

    #[error("file not found: {0:?}")]
    MissingFile(PathBuf),

    /// No frames left to read. Expected at the end of playback.
    #[error("end of sequence")]
    EndOfSequence,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("zero disparity at row {row}, col {col} without a fill policy")]
    DivisionSingularity { row: usize, col: usize },

    #[error("left stream has {left} images but right stream has {right}")]
    StreamLengthMismatch { left: usize, right: usize },

    #[error("no calibration loaded; disparity and depth need a calibration file")]
    CalibrationUnavailable,

    #[error("failed to read image {0:?}")]
    ImageRead(PathBuf),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SessionError {
    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self, SessionError::EndOfSequence)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
