use std::fmt;
use std::fs;
use std::path::Path;

use nalgebra::Matrix3x4;
use tracing::{debug, info};

use super::{
    BasicCalibParams, CalibError, CalibrationParameters, CameraRole, decompose_projection_matrix,
};

/// Number of values in a row-major 3x4 projection matrix.
const PROJECTION_LEN: usize = 12;

/// Calibration of every camera role of the rig.
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    params: [Option<CalibrationParameters>; 4],
    base: Option<(CameraRole, BasicCalibParams)>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a calibration file holding one labelled projection matrix per
    /// line, in [`CameraRole::ALL`] order. Extra trailing lines are ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CalibError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::parse(&text)?;
        info!("Loaded calibration for {} cameras from {:?}", CameraRole::ALL.len(), path);
        Ok(store)
    }

    pub fn parse(text: &str) -> Result<Self, CalibError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let mut store = Self::new();
        for role in CameraRole::ALL {
            let (idx, line) = lines.next().ok_or_else(|| CalibError::ParseFailure {
                line: 0,
                reason: format!("missing projection matrix for {}", role),
            })?;
            let p = parse_projection_line(line, idx + 1)?;
            let params = decompose_projection_matrix(&p)?;
            debug!("Decomposed {} projection: t = {:?}", role, params.t.as_slice());
            store.set(role, params);
        }
        Ok(store)
    }

    /// Override one role, e.g. with values reported by camera firmware.
    ///
    /// Invalidates the cached base parameters if they depend on this role.
    pub fn set(&mut self, role: CameraRole, params: CalibrationParameters) {
        self.params[role.index()] = Some(params);
        if let Some((base, _)) = self.base {
            if base == role || base.stereo_partner() == role {
                self.base = None;
            }
        }
    }

    pub fn get(&self, role: CameraRole) -> Result<&CalibrationParameters, CalibError> {
        self.params[role.index()]
            .as_ref()
            .ok_or(CalibError::MissingRole(role))
    }

    pub fn contains(&self, role: CameraRole) -> bool {
        self.params[role.index()].is_some()
    }

    /// Intrinsics of `role` and its baseline to the stereo partner.
    pub fn basic_params(&self, role: CameraRole) -> Result<BasicCalibParams, CalibError> {
        let own = self.get(role)?;
        let partner = self.get(role.stereo_partner())?;
        Ok(BasicCalibParams::from_pair(own, partner))
    }

    /// Choose the reference camera for depth conversion and cache its
    /// parameters.
    pub fn set_base_camera_type(
        &mut self,
        role: CameraRole,
    ) -> Result<BasicCalibParams, CalibError> {
        let params = self.basic_params(role)?;
        self.base = Some((role, params));
        Ok(params)
    }

    pub fn base_camera_type(&self) -> Option<CameraRole> {
        self.base.map(|(role, _)| role)
    }

    pub fn base_params(&self) -> Option<&BasicCalibParams> {
        self.base.as_ref().map(|(_, params)| params)
    }
}

impl fmt::Display for CalibrationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for role in CameraRole::ALL {
            if let Ok(params) = self.get(role) {
                writeln!(f, "The intrinsics of the {} camera are {}", role, params.k)?;
                writeln!(f, "Rotation Matrix {}", params.r)?;
                writeln!(f, "Translation Vector {}", params.t)?;
            }
        }
        Ok(())
    }
}

/// Parse `<label> <12 floats>` into a projection matrix.
fn parse_projection_line(line: &str, line_no: usize) -> Result<Matrix3x4<f64>, CalibError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != PROJECTION_LEN + 1 {
        return Err(CalibError::ParseFailure {
            line: line_no,
            reason: format!(
                "expected a label and {} values, got {} tokens",
                PROJECTION_LEN,
                tokens.len()
            ),
        });
    }

    let values = tokens[1..]
        .iter()
        .map(|tok| {
            tok.parse::<f64>().map_err(|e| CalibError::ParseFailure {
                line: line_no,
                reason: format!("invalid number {:?}: {}", tok, e),
            })
        })
        .collect::<Result<Vec<f64>, CalibError>>()?;

    Ok(Matrix3x4::from_row_slice(&values))
}
