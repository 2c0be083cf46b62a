pub mod calibration;
pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod sequence;
pub mod session;
pub mod source;
pub mod stereo;

#[cfg(test)]
pub(crate) mod test_support;
