use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::Detector;

/// Calibration weights for one subdetector
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq)]
pub struct SubdetectorCalibration {
    /// Conversion from deposited energy in MeV to MIPs
    pub mev_to_mip: f64,
    #[serde(default = "one")]
    pub mip_weight: f64,
    #[serde(default = "one")]
    pub abs_weight: f64,
    #[serde(default = "one")]
    pub gev_weight: f64,
    #[serde(default)]
    pub gev_offset: f64,
}

fn one() -> f64 {
    1.
}

impl Default for SubdetectorCalibration {
    fn default() -> Self {
        Self {
            mev_to_mip: 1.,
            mip_weight: 1.,
            abs_weight: 1.,
            gev_weight: 1.,
            gev_offset: 0.,
        }
    }
}

impl std::fmt::Display for SubdetectorCalibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} MIPs per MeV, MIP weight {}, absorber weight {}, GeV weight {}, GeV offset {}",
            self.mev_to_mip,
            self.mip_weight,
            self.abs_weight,
            self.gev_weight,
            self.gev_offset
        )
    }
}

/// Calibration of a [Detector], one entry per subdetector
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Calibration(Vec<SubdetectorCalibration>);

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("Calibration has {ncalib} entries, but the detector has {nsubdet} subdetectors")]
pub struct CalibrationMismatch {
    pub ncalib: usize,
    pub nsubdet: usize,
}

impl Calibration {
    pub fn new(calib: Vec<SubdetectorCalibration>) -> Self {
        Self(calib)
    }

    /// Check that there is exactly one entry per subdetector
    pub fn check(&self, detector: &Detector) -> Result<(), CalibrationMismatch> {
        let nsubdet = detector.subdetectors().len();
        if self.0.len() == nsubdet {
            Ok(())
        } else {
            Err(CalibrationMismatch {
                ncalib: self.0.len(),
                nsubdet,
            })
        }
    }

    /// Calibration of the subdetector with the given index
    pub fn subdetector(&self, idx: usize) -> &SubdetectorCalibration {
        &self.0[idx]
    }

    /// Conversion factor from MeV to MIPs in the given layer
    pub fn mev_to_mip(&self, detector: &Detector, layer: usize) -> f64 {
        detector
            .subdetector_idx(layer)
            .map(|idx| self.0[idx].mev_to_mip)
            .unwrap_or_else(|| panic!("Layer {layer} is outside the detector"))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SubdetectorCalibration> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::tests::si_scint_detector;

    #[test]
    fn mev_to_mip() {
        let det = si_scint_detector();
        let calib = Calibration::new(vec![
            SubdetectorCalibration {
                mev_to_mip: 10.,
                ..Default::default()
            },
            SubdetectorCalibration {
                mev_to_mip: 2.,
                ..Default::default()
            },
        ]);
        calib.check(&det).unwrap();
        assert_eq!(calib.mev_to_mip(&det, 1), 10.);
        assert_eq!(calib.mev_to_mip(&det, 2), 2.);
    }

    #[test]
    fn display() {
        let calib = SubdetectorCalibration {
            mev_to_mip: 11.5,
            mip_weight: 0.5,
            abs_weight: 1.2,
            gev_weight: 2.,
            gev_offset: -0.25,
        };
        assert_eq!(
            calib.to_string(),
            "11.5 MIPs per MeV, MIP weight 0.5, absorber weight 1.2, GeV weight 2, GeV offset -0.25"
        );
    }

    #[test]
    fn mismatch() {
        let det = si_scint_detector();
        let calib = Calibration::new(vec![Default::default()]);
        assert_eq!(
            calib.check(&det),
            Err(CalibrationMismatch {
                ncalib: 1,
                nsubdet: 2
            })
        );
    }

    #[test]
    fn deserialise_defaults() {
        let calib: Calibration =
            serde_json::from_str(r#"[{"mev_to_mip": 3.5}]"#).unwrap();
        let c = calib.subdetector(0);
        assert_eq!(c.mev_to_mip, 3.5);
        assert_eq!(c.gev_weight, 1.);
        assert_eq!(c.gev_offset, 0.);
    }
}
