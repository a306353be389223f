use log::{debug, trace};
use thiserror::Error;

use crate::{
    four_vector::FourVector,
    histogram::{Axis, Hist2D},
    hit::MAX_CELL,
};

/// Largest number of cells per axis
///
/// Each half of the axis can hold at most `MAX_CELL + 1` cells.
pub const MAX_BINS: usize = 2 * (MAX_CELL as usize + 1);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Cell size has to be a positive number, got {0}")]
    InvalidCellSize(f64),
    #[error("Transverse width has to be a positive number, got {0}")]
    InvalidWidth(f64),
    #[error(
        "Layer {layer} would need {nbins} cells per axis with cell size {cell_size}, the maximum is {}",
        MAX_BINS
    )]
    TooManyCells {
        layer: usize,
        nbins: usize,
        cell_size: f64,
    },
}

/// Content of a single spatial bin
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SpatialBin {
    pub ix: usize,
    pub iy: usize,
    /// Centre of the bin in x
    pub x: f64,
    /// Centre of the bin in y
    pub y: f64,
    /// Deposited energy in MIPs
    pub energy: f64,
    /// Sum of energy times time
    pub time_sum: f64,
    /// Sum of energy times z
    pub z_sum: f64,
    /// Sum of the momenta of all deposits in this bin
    pub momentum: FourVector,
}

/// Spatial accumulators of a single layer
#[derive(Clone, Debug, PartialEq)]
pub struct LayerHistograms {
    energy: Hist2D,
    time: Hist2D,
    z: Hist2D,
    momentum: Vec<FourVector>,
}

impl LayerHistograms {
    fn new(axis: Axis) -> Self {
        let energy = Hist2D::new(axis, axis);
        Self {
            time: energy.clone(),
            z: energy.clone(),
            energy,
            momentum: vec![FourVector::new(); axis.nbins() * axis.nbins()],
        }
    }

    pub fn nbins_x(&self) -> usize {
        self.energy.x_axis().nbins()
    }

    pub fn nbins_y(&self) -> usize {
        self.energy.y_axis().nbins()
    }

    /// Total number of bins
    pub fn nbins(&self) -> usize {
        self.nbins_x() * self.nbins_y()
    }

    pub fn bin(&self, ix: usize, iy: usize) -> SpatialBin {
        SpatialBin {
            ix,
            iy,
            x: self.energy.x_axis().bin_center(ix),
            y: self.energy.y_axis().bin_center(iy),
            energy: self.energy.bin_content(ix, iy),
            time_sum: self.time.bin_content(ix, iy),
            z_sum: self.z.bin_content(ix, iy),
            momentum: self.momentum[ix * self.nbins_y() + iy],
        }
    }

    fn fill(
        &mut self,
        energy: f64,
        time: f64,
        x: f64,
        y: f64,
        z: f64,
        momentum: FourVector,
    ) -> bool {
        let Some(bin) = self.energy.find_bin(x, y) else {
            return false;
        };
        self.energy.add(bin, energy);
        self.time.add(bin, energy * time);
        self.z.add(bin, energy * z);
        let (ix, iy) = bin;
        let ny = self.nbins_y();
        self.momentum[ix * ny + iy] += momentum;
        true
    }

    fn reset(&mut self) {
        self.energy.reset();
        self.time.reset();
        self.z.reset();
        self.momentum.iter_mut().for_each(|p| *p = FourVector::new());
    }
}

/// Spatial binning of sim hits for all layers
///
/// Each layer is covered by a square grid of cells of size
/// `cell_size * granularity`, centred on the beam axis. The number of
/// cells per axis is chosen such that the grid spans the transverse
/// width of the detector as closely as possible.
#[derive(Clone, Debug)]
pub struct GeometryConversion {
    cell_size: f64,
    xy_width: f64,
    granularity: Vec<u32>,
    layers: Vec<LayerHistograms>,
    z_sum: Vec<f64>,
    nfills: Vec<u64>,
}

impl GeometryConversion {
    pub fn new(
        cell_size: f64,
        xy_width: f64,
        granularity: &[u32],
    ) -> Result<Self, GeometryError> {
        check_cell_size(cell_size)?;
        if !(xy_width.is_finite() && xy_width > 0.) {
            return Err(GeometryError::InvalidWidth(xy_width));
        }
        let nlayers = granularity.len();
        let mut res = Self {
            cell_size,
            xy_width,
            granularity: granularity.to_owned(),
            layers: Vec::with_capacity(nlayers),
            z_sum: vec![0.; nlayers],
            nfills: vec![0; nlayers],
        };
        res.initialise_histos()?;
        Ok(res)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn xy_width(&self) -> f64 {
        self.xy_width
    }

    pub fn nlayers(&self) -> usize {
        self.layers.len()
    }

    /// Change the cell size and rebuild all histograms
    ///
    /// This discards the current histogram contents. On error, the
    /// geometry is left unchanged.
    pub fn set_cell_size(&mut self, cell_size: f64) -> Result<(), GeometryError> {
        check_cell_size(cell_size)?;
        let old = std::mem::replace(&mut self.cell_size, cell_size);
        if let Err(err) = self.initialise_histos() {
            self.cell_size = old;
            return Err(err);
        }
        Ok(())
    }

    fn initialise_histos(&mut self) -> Result<(), GeometryError> {
        let axes = self
            .granularity
            .iter()
            .enumerate()
            .map(|(layer, &g)| {
                let width = self.cell_size * g as f64;
                let nbins = ((self.xy_width / width).round() as usize).max(1);
                if nbins > MAX_BINS {
                    return Err(GeometryError::TooManyCells {
                        layer,
                        nbins,
                        cell_size: self.cell_size,
                    });
                }
                let half = 0.5 * nbins as f64 * width;
                Ok(Axis::new(nbins, -half, half))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.layers = axes.into_iter().map(LayerHistograms::new).collect();
        for (layer, hists) in self.layers.iter().enumerate() {
            debug!(
                "Layer {layer}: {}x{} cells of size {}",
                hists.nbins_x(),
                hists.nbins_y(),
                self.cell_size * self.granularity[layer] as f64
            );
        }
        Ok(())
    }

    /// Add an energy deposit
    ///
    /// `energy` should be given in MIPs. Returns `false` if the deposit
    /// lies outside the binned area, in which case it only enters the
    /// average layer position.
    #[allow(clippy::too_many_arguments)]
    pub fn fill(
        &mut self,
        layer: usize,
        energy: f64,
        time: f64,
        x: f64,
        y: f64,
        z: f64,
        momentum: FourVector,
    ) -> bool {
        self.z_sum[layer] += z;
        self.nfills[layer] += 1;
        let inside = self.layers[layer].fill(energy, time, x, y, z, momentum);
        if !inside {
            trace!("Deposit at ({x}, {y}) in layer {layer} outside binned area");
        }
        inside
    }

    /// Accumulators of the given layer
    pub fn layer(&self, layer: usize) -> &LayerHistograms {
        &self.layers[layer]
    }

    /// Average z position of all deposits seen so far in the given layer
    ///
    /// Returns zero if there have not been any deposits in the layer.
    pub fn average_z(&self, layer: usize) -> f64 {
        match self.nfills[layer] {
            0 => 0.,
            n => self.z_sum[layer] / n as f64,
        }
    }

    /// Clear all bins, keeping the average layer positions
    pub fn reset(&mut self) {
        self.layers.iter_mut().for_each(LayerHistograms::reset);
    }
}

fn check_cell_size(cell_size: f64) -> Result<(), GeometryError> {
    if cell_size.is_finite() && cell_size > 0. {
        Ok(())
    } else {
        Err(GeometryError::InvalidCellSize(cell_size))
    }
}
