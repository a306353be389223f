use jetty::PseudoJet;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::four_vector::FourVector;

/// A simulated energy deposit
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct SimHit {
    /// Deposited energy in MeV
    pub energy: f64,
    pub layer: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Time in ns
    pub time: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    #[serde(rename = "E")]
    pub e: f64,
}

impl SimHit {
    pub(crate) fn is_finite(&self) -> bool {
        [
            self.energy,
            self.x,
            self.y,
            self.z,
            self.time,
            self.px,
            self.py,
            self.pz,
            self.e,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Momentum of the particle that caused the deposit
    ///
    /// # Panics
    ///
    /// Panics if any momentum component is not finite
    pub fn momentum(&self) -> FourVector {
        [n64(self.e), n64(self.px), n64(self.py), n64(self.pz)].into()
    }
}

const SIDE_BITS: u32 = 1;
const CELL_BITS: u32 = 10;
const GRANULARITY_BITS: u32 = 8;

const X_SIDE_SHIFT: u32 = 0;
const X_CELL_SHIFT: u32 = X_SIDE_SHIFT + SIDE_BITS;
const Y_SIDE_SHIFT: u32 = X_CELL_SHIFT + CELL_BITS;
const Y_CELL_SHIFT: u32 = Y_SIDE_SHIFT + SIDE_BITS;
const GRANULARITY_SHIFT: u32 = Y_CELL_SHIFT + CELL_BITS;

const fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

/// Largest cell index that can be encoded
pub const MAX_CELL: u32 = mask(CELL_BITS);
/// Largest granularity that can be encoded
pub const MAX_GRANULARITY: u32 = mask(GRANULARITY_BITS);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum CellIdError {
    #[error("Cell index {0} exceeds the maximum of {}", MAX_CELL)]
    CellOutOfRange(u32),
    #[error("Granularity {0} exceeds the maximum of {}", MAX_GRANULARITY)]
    GranularityOutOfRange(u32),
}

/// Packed identifier of a readout cell within a layer
///
/// The layout, from the least significant bit, is
/// `x_side (1) | x_cell (10) | y_side (1) | y_cell (10) | granularity (8)`.
#[derive(
    Deserialize,
    Serialize,
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
)]
#[serde(transparent)]
pub struct CellId(u32);

impl CellId {
    /// Encode a cell
    ///
    /// `x_side` (`y_side`) is true for cells at positive `x` (`y`).
    pub fn encode(
        x_side: bool,
        y_side: bool,
        x_cell: u32,
        y_cell: u32,
        granularity: u32,
    ) -> Result<Self, CellIdError> {
        if let Some(&cell) = [x_cell, y_cell].iter().find(|&&c| c > MAX_CELL) {
            return Err(CellIdError::CellOutOfRange(cell));
        }
        if granularity > MAX_GRANULARITY {
            return Err(CellIdError::GranularityOutOfRange(granularity));
        }
        Ok(Self(
            (u32::from(x_side) << X_SIDE_SHIFT)
                | (x_cell << X_CELL_SHIFT)
                | (u32::from(y_side) << Y_SIDE_SHIFT)
                | (y_cell << Y_CELL_SHIFT)
                | (granularity << GRANULARITY_SHIFT),
        ))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn x_side(&self) -> bool {
        self.field(X_SIDE_SHIFT, SIDE_BITS) != 0
    }

    pub fn y_side(&self) -> bool {
        self.field(Y_SIDE_SHIFT, SIDE_BITS) != 0
    }

    pub fn x_cell(&self) -> u32 {
        self.field(X_CELL_SHIFT, CELL_BITS)
    }

    pub fn y_cell(&self) -> u32 {
        self.field(Y_CELL_SHIFT, CELL_BITS)
    }

    pub fn granularity(&self) -> u32 {
        self.field(GRANULARITY_SHIFT, GRANULARITY_BITS)
    }

    /// x coordinate of the cell centre for the given base cell size
    pub fn x(&self, cell_size: f64) -> f64 {
        centre(self.x_side(), self.x_cell(), cell_size * self.granularity() as f64)
    }

    /// y coordinate of the cell centre for the given base cell size
    pub fn y(&self, cell_size: f64) -> f64 {
        centre(self.y_side(), self.y_cell(), cell_size * self.granularity() as f64)
    }

    fn field(&self, shift: u32, bits: u32) -> u32 {
        (self.0 >> shift) & mask(bits)
    }
}

fn centre(positive: bool, cell: u32, width: f64) -> f64 {
    let c = (cell as f64 + 0.5) * width;
    if positive {
        c
    } else {
        -c
    }
}

/// A digitised hit
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct RecoHit {
    pub layer: usize,
    /// Energy in MIPs
    pub energy: f64,
    pub adc_counts: u32,
    pub zpos: f64,
    pub cell_id: CellId,
    /// Relative contribution of noise to the energy
    ///
    /// `-1` if the energy after adding noise is not positive and `1`
    /// if the noise exceeds the original energy.
    pub noise_fraction: f64,
}

impl RecoHit {
    pub fn x(&self, cell_size: f64) -> f64 {
        self.cell_id.x(cell_size)
    }

    pub fn y(&self, cell_size: f64) -> f64 {
        self.cell_id.y(cell_size)
    }
}

/// A reconstructed jet
#[derive(Deserialize, Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct Jet {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    #[serde(rename = "E")]
    pub e: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub n_constituents: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub area_error: Option<f64>,
}

impl Jet {
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }
}

impl From<&PseudoJet> for Jet {
    fn from(jet: &PseudoJet) -> Self {
        Self {
            px: jet.px().into(),
            py: jet.py().into(),
            pz: jet.pz().into(),
            e: jet.e().into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_id() {
        let id = CellId::encode(true, false, 3, 1023, 4).unwrap();
        assert!(id.x_side());
        assert!(!id.y_side());
        assert_eq!(id.x_cell(), 3);
        assert_eq!(id.y_cell(), 1023);
        assert_eq!(id.granularity(), 4);
        assert_eq!(id.x(0.5), 7.);
        assert_eq!(id.y(0.5), -2047.);

        let id = CellId::encode(false, true, 0, 0, 1).unwrap();
        assert_eq!(id.raw(), (1 << 11) | (1 << 22));
    }

    #[test]
    fn cell_id_overflow() {
        assert_eq!(
            CellId::encode(true, true, 1024, 0, 1),
            Err(CellIdError::CellOutOfRange(1024))
        );
        assert_eq!(
            CellId::encode(true, true, 0, 1024, 1),
            Err(CellIdError::CellOutOfRange(1024))
        );
        assert_eq!(
            CellId::encode(true, true, 0, 0, 300),
            Err(CellIdError::GranularityOutOfRange(300))
        );
        let id = CellId::encode(true, true, MAX_CELL, MAX_CELL, MAX_GRANULARITY)
            .unwrap();
        assert_eq!(id.raw(), u32::MAX >> 2);
    }

    #[test]
    fn hit_serialisation() {
        let hit = RecoHit {
            layer: 2,
            energy: 1.5,
            adc_counts: 75,
            zpos: 10.,
            cell_id: CellId::encode(true, true, 1, 2, 1).unwrap(),
            noise_fraction: 0.,
        };
        let json = serde_json::to_string(&hit).unwrap();
        assert!(json.contains(&format!("\"cell_id\":{}", hit.cell_id.raw())));
        let read: RecoHit = serde_json::from_str(&json).unwrap();
        assert_eq!(read, hit);
    }

    #[test]
    fn jet_optional_fields() {
        let jet = Jet {
            px: 3.,
            py: 4.,
            pz: 0.,
            e: 5.,
            ..Default::default()
        };
        assert_eq!(jet.pt(), 5.);
        let json = serde_json::to_string(&jet).unwrap();
        assert!(!json.contains("area"));
        assert!(!json.contains("n_constituents"));
    }
}
