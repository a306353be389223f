use std::{fs::File, io::BufReader, path::Path};

use rand::Rng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{detector::Sensor, traits::Digitise};

/// A setting with separate values for each sensor technology
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq)]
pub struct PerSensor<T> {
    pub silicon: T,
    pub scintillator: T,
}

impl<T: Copy> PerSensor<T> {
    pub fn get(&self, sensor: Sensor) -> T {
        match sensor {
            Sensor::Silicon => self.silicon,
            Sensor::Scintillator => self.scintillator,
        }
    }

    fn both(value: T) -> Self {
        Self {
            silicon: value,
            scintillator: value,
        }
    }
}

/// Detector response settings
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DigitisationSettings {
    /// ADC counts corresponding to one MIP
    pub mip_to_adc: PerSensor<f64>,
    /// Largest ADC count, `None` for no saturation
    pub adc_saturation: Option<u32>,
    /// Upper limit on the mean time of arrival in ns
    pub time_cut: PerSensor<f64>,
    /// Mean number of photo-electrons per MIP in scintillators
    pub npe_per_mip: f64,
}

impl Default for DigitisationSettings {
    fn default() -> Self {
        Self {
            mip_to_adc: PerSensor::both(50.),
            adc_saturation: None,
            time_cut: PerSensor::both(20.),
            npe_per_mip: 20.,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to open settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0} has to be a positive number, got {1}")]
    NotPositive(&'static str, f64),
}

impl DigitisationSettings {
    /// Read settings from a YAML file
    ///
    /// Missing entries take their default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let file = BufReader::new(File::open(path)?);
        let settings: Self = serde_yaml::from_reader(file)?;
        settings.check()?;
        Ok(settings)
    }

    pub fn check(&self) -> Result<(), SettingsError> {
        use SettingsError::NotPositive;
        let positive = [
            ("silicon mip_to_adc", self.mip_to_adc.silicon),
            ("scintillator mip_to_adc", self.mip_to_adc.scintillator),
            ("npe_per_mip", self.npe_per_mip),
        ];
        for (name, val) in positive {
            if !(val.is_finite() && val > 0.) {
                return Err(NotPositive(name, val));
            }
        }
        Ok(())
    }
}

/// Detector response model driven by a single random number stream
///
/// The order in which random numbers are drawn is fully determined by
/// the order of calls, so the output is reproducible for a given seed.
#[derive(Clone, Debug)]
pub struct Digitiser<R> {
    settings: DigitisationSettings,
    rng: R,
}

impl<R> Digitiser<R> {
    pub fn new(settings: DigitisationSettings, rng: R) -> Self {
        Self { settings, rng }
    }

    pub fn settings(&self) -> &DigitisationSettings {
        &self.settings
    }
}

impl<R: Rng> Digitise for Digitiser<R> {
    fn pass_time_cut(&self, time: f64, sensor: Sensor) -> bool {
        time < self.settings.time_cut.get(sensor)
    }

    fn digi_e(&mut self, sim_e: f64) -> f64 {
        let npe_per_mip = self.settings.npe_per_mip;
        // Poisson requires a positive, finite mean
        match Poisson::new(sim_e * npe_per_mip) {
            Ok(npe) => npe.sample(&mut self.rng) / npe_per_mip,
            Err(_) => 0.,
        }
    }

    fn noise(&mut self, sigma: f64) -> f64 {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        sigma * z
    }

    fn adc_converter(&self, e_mip: f64, sensor: Sensor) -> u32 {
        let adc = (e_mip * self.settings.mip_to_adc.get(sensor)).floor();
        // float to int casts saturate, negative energies give 0 counts
        let adc = adc as u32;
        match self.settings.adc_saturation {
            Some(max) => adc.min(max),
            None => adc,
        }
    }

    fn adc_to_mip(&self, adc: u32, sensor: Sensor) -> f64 {
        adc as f64 / self.settings.mip_to_adc.get(sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn digitiser(seed: u64) -> Digitiser<Xoshiro256Plus> {
        Digitiser::new(
            Default::default(),
            Xoshiro256Plus::seed_from_u64(seed),
        )
    }

    #[test]
    fn adc_monotonic() {
        let mut d = digitiser(0);
        d.settings.adc_saturation = Some(1023);
        for sensor in [Sensor::Silicon, Sensor::Scintillator] {
            let mut last = 0;
            for i in -100..3000 {
                let e = i as f64 * 0.01;
                let adc = d.adc_converter(e, sensor);
                assert!(adc >= last);
                last = adc;
            }
            assert_eq!(last, 1023);
        }
    }

    #[test]
    fn adc_round_trip() {
        let d = digitiser(0);
        assert_eq!(d.adc_converter(2.0, Sensor::Silicon), 100);
        assert_eq!(d.adc_converter(2.019, Sensor::Silicon), 100);
        assert_eq!(d.adc_converter(-0.5, Sensor::Silicon), 0);
        assert_eq!(d.adc_to_mip(100, Sensor::Silicon), 2.0);
        assert_eq!(d.adc_to_mip(1, Sensor::Scintillator), 0.02);
    }

    #[test]
    fn time_cut() {
        let d = digitiser(0);
        assert!(d.pass_time_cut(0., Sensor::Silicon));
        assert!(d.pass_time_cut(19.9, Sensor::Scintillator));
        assert!(!d.pass_time_cut(20., Sensor::Silicon));
    }

    #[test]
    fn reproducible() {
        let mut d1 = digitiser(7);
        let mut d2 = digitiser(7);
        for _ in 0..100 {
            assert_eq!(d1.noise(0.5), d2.noise(0.5));
            assert_eq!(d1.digi_e(3.), d2.digi_e(3.));
        }
        assert_eq!(d1.noise(0.), 0.);
    }

    #[test]
    fn photo_electrons() {
        let mut d = digitiser(1);
        let npe = d.settings.npe_per_mip;
        let n = 2000;
        let mut sum = 0.;
        for _ in 0..n {
            let e = d.digi_e(1.5);
            // energies are quantised in units of photo-electrons
            assert!(((e * npe).round() - e * npe).abs() < 1e-9);
            sum += e;
        }
        let mean = sum / n as f64;
        assert!((mean - 1.5).abs() < 0.05);
    }

    #[test]
    fn settings() {
        let settings: DigitisationSettings = serde_yaml::from_str(
            "
mip_to_adc:
  silicon: 40
  scintillator: 10
adc_saturation: 4095
",
        )
        .unwrap();
        assert_eq!(settings.mip_to_adc.get(Sensor::Scintillator), 10.);
        assert_eq!(settings.adc_saturation, Some(4095));
        assert_eq!(settings.time_cut, PerSensor::both(20.));
        settings.check().unwrap();

        let bad = DigitisationSettings {
            npe_per_mip: 0.,
            ..Default::default()
        };
        assert!(matches!(bad.check(), Err(SettingsError::NotPositive(..))));
    }
}
