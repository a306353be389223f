use derive_builder::Builder;
use itertools::iproduct;
use jetty::PseudoJet;
use log::trace;

use crate::{
    detector::{Detector, Sensor},
    geometry::{GeometryConversion, SpatialBin},
    histogram::Hist1D,
    hit::{CellId, CellIdError, RecoHit},
    layer_config::LayerConfig,
    traits::Digitise,
};

/// Name of the noise diagnostics histogram
pub const NOISE_HIST_NAME: &str = "noiseCheck";

fn noise_histogram() -> Hist1D {
    Hist1D::new(NOISE_HIST_NAME, 100, -5., 5.)
}

/// Result of digitising a single spatial bin
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Digitised {
    /// Rejected by the time cut
    OutOfTime,
    /// Digitised hit
    Hit {
        hit: RecoHit,
        above_threshold: bool,
    },
}

/// Hits produced while sweeping over all bins of an event
#[derive(Clone, Debug, Default)]
pub struct HitCollections {
    /// All digitised hits, only filled when saving all digis
    pub digi_hits: Vec<RecoHit>,
    /// Selected hits
    pub reco_hits: Vec<RecoHit>,
    /// Inputs for jet clustering
    pub jet_inputs: Vec<PseudoJet>,
}

/// Bin statistics of a sweep
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepStats {
    pub nbins: usize,
    pub nout_of_time: usize,
    pub nabove_threshold: usize,
}

/// Turns spatially binned sim hits into reco hits
///
/// For each bin, the engine
///
/// 1. rejects bins failing the time cut,
/// 2. converts scintillator energies to digitised energies,
/// 3. adds noise,
/// 4. converts silicon energies to ADC counts and back,
/// 5. applies the per-layer threshold.
///
/// Bins above threshold are emitted as reco hits. If all digis are
/// saved, all bins passing the time cut are emitted both as digi and as
/// reco hits.
#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct DigiEngine<D> {
    digitiser: D,
    config: LayerConfig,
    /// Emit all bins passing the time cut, regardless of threshold
    #[builder(default)]
    save_all_digis: bool,
    /// Collect inputs for jet clustering
    #[builder(default)]
    collect_jet_inputs: bool,
    #[builder(setter(skip), default = "noise_histogram()")]
    noise_hist: Hist1D,
}

impl<D: Digitise> DigiEngine<D> {
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn digitiser(&self) -> &D {
        &self.digitiser
    }

    /// Histogram of all noise values drawn so far
    pub fn noise_histogram(&self) -> &Hist1D {
        &self.noise_hist
    }

    /// Digitise all bins of all layers
    ///
    /// Layers are processed in increasing order, and within each layer
    /// bins are processed row by row in x. This order fixes the
    /// sequence of random numbers.
    pub fn sweep(
        &mut self,
        geometry: &GeometryConversion,
        detector: &Detector,
        out: &mut HitCollections,
    ) -> Result<SweepStats, CellIdError> {
        let mut stats = SweepStats::default();
        for layer in 0..geometry.nlayers() {
            let hists = geometry.layer(layer);
            let sensor = detector.sensor(layer);
            let mean_z = geometry.average_z(layer);
            stats.nbins += hists.nbins();
            if self.save_all_digis {
                out.digi_hits.reserve(hists.nbins());
            }
            for (ix, iy) in iproduct!(0..hists.nbins_x(), 0..hists.nbins_y()) {
                let bin = hists.bin(ix, iy);
                let res = self.digitise_bin(
                    layer,
                    sensor,
                    &bin,
                    geometry.cell_size(),
                    mean_z,
                )?;
                let Digitised::Hit { hit, above_threshold } = res else {
                    stats.nout_of_time += 1;
                    continue;
                };
                if above_threshold {
                    stats.nabove_threshold += 1;
                }
                if !(above_threshold || self.save_all_digis) {
                    continue;
                }
                if self.save_all_digis {
                    out.digi_hits.push(hit);
                }
                out.reco_hits.push(hit);
                if self.collect_jet_inputs
                    && hit.zpos > 0.
                    && !bin.momentum.is_null()
                {
                    out.jet_inputs.push(bin.momentum.into());
                }
            }
        }
        trace!("Sweep statistics: {stats:?}");
        Ok(stats)
    }

    /// Digitise a single spatial bin
    ///
    /// `cell_size` is the size of a cell with granularity one, `mean_z`
    /// the position assigned to bins without energy. Fails if the cell
    /// cannot be encoded in a [CellId].
    pub fn digitise_bin(
        &mut self,
        layer: usize,
        sensor: Sensor,
        bin: &SpatialBin,
        cell_size: f64,
        mean_z: f64,
    ) -> Result<Digitised, CellIdError> {
        let sim_e = bin.energy;
        let time = if sim_e > 0. { bin.time_sum / sim_e } else { 0. };
        if !self.digitiser.pass_time_cut(time, sensor) {
            return Ok(Digitised::OutOfTime);
        }
        let zpos = if sim_e > 0. { bin.z_sum / sim_e } else { mean_z };

        let mut digi_e = match sensor {
            Sensor::Silicon => sim_e,
            Sensor::Scintillator if sim_e > 0. => self.digitiser.digi_e(sim_e),
            Sensor::Scintillator => 0.,
        };
        let noise = self.digitiser.noise(self.config.noise(layer));
        self.noise_hist.fill(noise);
        let noise_fraction = noise_fraction(digi_e, noise);
        digi_e += noise;

        let mut adc = 0;
        if sensor.is_si() {
            adc = self.digitiser.adc_converter(digi_e, sensor);
            digi_e = self.digitiser.adc_to_mip(adc, sensor);
        }
        let threshold = self.config.threshold(layer);
        let above_threshold = match sensor {
            Sensor::Silicon => adc > threshold,
            Sensor::Scintillator => {
                digi_e
                    > threshold as f64 / self.digitiser.adc_to_mip(1, sensor)
            }
        };

        let granularity = self.config.granularity(layer);
        let width = cell_size * granularity as f64;
        let x_cell = (bin.x.abs() / width) as u32;
        let y_cell = (bin.y.abs() / width) as u32;
        let hit = RecoHit {
            layer,
            energy: digi_e,
            adc_counts: adc,
            zpos,
            cell_id: CellId::encode(
                bin.x > 0.,
                bin.y > 0.,
                x_cell,
                y_cell,
                granularity,
            )?,
            noise_fraction,
        };
        Ok(Digitised::Hit {
            hit,
            above_threshold,
        })
    }
}

/// Relative noise contribution to an energy
///
/// Returns `-1` if the energy including noise is not positive and `1`
/// if the noise is larger than the original energy.
pub fn noise_fraction(energy: f64, noise: f64) -> f64 {
    let new_e = energy + noise;
    if new_e <= 0. {
        -1.
    } else if noise.abs() < energy {
        noise / energy
    } else {
        1.
    }
}
