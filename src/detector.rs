use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Subdetector types
#[derive(
    Deserialize,
    Serialize,
    Copy,
    Clone,
    Debug,
    Display,
    EnumString,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
)]
#[strum(ascii_case_insensitive)]
pub enum SubdetectorType {
    /// Front electromagnetic calorimeter
    FECAL,
    /// Middle electromagnetic calorimeter
    MECAL,
    /// Back electromagnetic calorimeter
    BECAL,
    /// Front hadronic calorimeter
    FHCAL,
    /// Back hadronic calorimeter, first section
    BHCAL1,
    /// Back hadronic calorimeter, second section
    BHCAL2,
}

/// Sensor technology of a subdetector
#[derive(
    Deserialize,
    Serialize,
    Copy,
    Clone,
    Debug,
    Display,
    EnumString,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sensor {
    Silicon,
    Scintillator,
}

impl Sensor {
    pub fn is_si(self) -> bool {
        self == Sensor::Silicon
    }

    pub fn is_scint(self) -> bool {
        self == Sensor::Scintillator
    }
}

/// A contiguous range of layers with the same technology
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Subdetector {
    #[serde(rename = "type")]
    pub kind: SubdetectorType,
    pub sensor: Sensor,
    /// First layer belonging to this subdetector
    pub layer_id_min: usize,
    /// One past the last layer belonging to this subdetector
    pub layer_id_max: usize,
}

impl Subdetector {
    pub fn nlayers(&self) -> usize {
        self.layer_id_max - self.layer_id_min
    }

    pub fn contains(&self, layer: usize) -> bool {
        (self.layer_id_min..self.layer_id_max).contains(&layer)
    }
}

/// Layered detector description
///
/// Subdetectors are sorted and cover the layers `0..nlayers()` without
/// gaps.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(try_from = "Vec<Subdetector>", into = "Vec<Subdetector>")]
pub struct Detector {
    subdetectors: Vec<Subdetector>,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DetectorError {
    #[error("Detector has no subdetectors")]
    Empty,
    #[error("Subdetector {0} starts at layer {1}, expected layer {2}")]
    Gap(SubdetectorType, usize, usize),
    #[error("Subdetector {0} has no layers")]
    NoLayers(SubdetectorType),
}

impl Detector {
    pub fn new(subdetectors: Vec<Subdetector>) -> Result<Self, DetectorError> {
        use DetectorError::*;

        if subdetectors.is_empty() {
            return Err(Empty);
        }
        let mut expected_start = 0;
        for subdet in &subdetectors {
            if subdet.layer_id_min != expected_start {
                return Err(Gap(subdet.kind, subdet.layer_id_min, expected_start));
            }
            if subdet.layer_id_max <= subdet.layer_id_min {
                return Err(NoLayers(subdet.kind));
            }
            expected_start = subdet.layer_id_max;
        }
        Ok(Self { subdetectors })
    }

    pub fn nlayers(&self) -> usize {
        // guaranteed to be non-empty by construction
        self.subdetectors
            .last()
            .map(|s| s.layer_id_max)
            .unwrap_or_default()
    }

    pub fn subdetectors(&self) -> &[Subdetector] {
        &self.subdetectors
    }

    /// Index of the subdetector containing `layer`
    pub fn subdetector_idx(&self, layer: usize) -> Option<usize> {
        self.subdetectors.iter().position(|s| s.contains(layer))
    }

    /// The subdetector containing `layer`
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not smaller than `nlayers()`
    pub fn subdetector(&self, layer: usize) -> &Subdetector {
        let idx = self.subdetector_idx(layer).unwrap_or_else(|| {
            panic!("Layer {layer} is outside the detector")
        });
        &self.subdetectors[idx]
    }

    pub fn sensor(&self, layer: usize) -> Sensor {
        self.subdetector(layer).sensor
    }
}

impl TryFrom<Vec<Subdetector>> for Detector {
    type Error = DetectorError;

    fn try_from(subdetectors: Vec<Subdetector>) -> Result<Self, Self::Error> {
        Self::new(subdetectors)
    }
}

impl From<Detector> for Vec<Subdetector> {
    fn from(d: Detector) -> Self {
        d.subdetectors
    }
}
