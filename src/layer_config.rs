use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    hit::MAX_GRANULARITY,
    parameter::{apply_layer_ranges, ParameterError},
};

/// Default cell merging factor
pub const DEFAULT_GRANULARITY: u32 = 1;
/// Default noise in MIPs
pub const DEFAULT_NOISE: f64 = 0.1;
/// Default threshold in ADC counts
pub const DEFAULT_THRESHOLD: u32 = 25;

/// Per-layer readout configuration
///
/// All three arrays always have one entry per detector layer.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct LayerConfig {
    granularity: Vec<u32>,
    noise: Vec<f64>,
    threshold: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerConfigError {
    #[error("Failed to parse granularities: {0}")]
    Granularity(ParameterError),
    #[error("Failed to parse noise: {0}")]
    Noise(ParameterError),
    #[error("Failed to parse thresholds: {0}")]
    Threshold(ParameterError),
    #[error("Granularity of layer {0} is zero")]
    ZeroGranularity(usize),
    #[error(
        "Granularity {granularity} of layer {layer} exceeds the maximum of {}",
        MAX_GRANULARITY
    )]
    GranularityTooLarge { layer: usize, granularity: u32 },
    #[error("Noise {noise} in layer {layer} is not a non-negative number")]
    InvalidNoise { layer: usize, noise: f64 },
}

impl LayerConfig {
    /// Default configuration for a detector with `nlayers` layers
    pub fn new(nlayers: usize) -> Self {
        Self {
            granularity: vec![DEFAULT_GRANULARITY; nlayers],
            noise: vec![DEFAULT_NOISE; nlayers],
            threshold: vec![DEFAULT_THRESHOLD; nlayers],
        }
    }

    /// Parse the configuration from per-layer parameter strings
    ///
    /// Layers not mentioned keep their default values.
    pub fn from_strs(
        nlayers: usize,
        granularity: &str,
        noise: &str,
        threshold: &str,
    ) -> Result<Self, LayerConfigError> {
        use LayerConfigError::*;

        let mut res = Self::new(nlayers);
        apply_layer_ranges(granularity, &mut res.granularity)
            .map_err(Granularity)?;
        apply_layer_ranges(noise, &mut res.noise).map_err(Noise)?;
        apply_layer_ranges(threshold, &mut res.threshold)
            .map_err(Threshold)?;

        if let Some(layer) = res.granularity.iter().position(|&g| g == 0) {
            return Err(ZeroGranularity(layer));
        }
        let too_large = res
            .granularity
            .iter()
            .enumerate()
            .find(|(_, g)| **g > MAX_GRANULARITY);
        if let Some((layer, &granularity)) = too_large {
            return Err(GranularityTooLarge { layer, granularity });
        }
        let bad_noise = res
            .noise
            .iter()
            .enumerate()
            .find(|(_, n)| !(n.is_finite() && **n >= 0.));
        if let Some((layer, &noise)) = bad_noise {
            return Err(InvalidNoise { layer, noise });
        }
        Ok(res)
    }

    pub fn nlayers(&self) -> usize {
        self.granularity.len()
    }

    pub fn granularity(&self, layer: usize) -> u32 {
        self.granularity[layer]
    }

    pub fn granularities(&self) -> &[u32] {
        &self.granularity
    }

    /// Noise in MIPs
    pub fn noise(&self, layer: usize) -> f64 {
        self.noise[layer]
    }

    /// Threshold in ADC counts
    pub fn threshold(&self, layer: usize) -> u32 {
        self.threshold[layer]
    }
}

impl std::fmt::Display for LayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for layer in 0..self.nlayers() {
            write!(
                f,
                "Layer {layer:2} : {}, {} mips, {} adc",
                self.granularity[layer], self.noise[layer], self.threshold[layer]
            )?;
            if layer % 5 == 4 || layer + 1 == self.nlayers() {
                writeln!(f)?;
            } else {
                write!(f, " - ")?;
            }
        }
        Ok(())
    }
}
