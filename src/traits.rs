use crate::{
    detector::Sensor,
    event::{DigiEvent, OutputHeader},
    histogram::Hist1D,
};

/// Response model of the readout electronics
pub trait Digitise {
    /// Whether a mean time of arrival is accepted by the readout
    fn pass_time_cut(&self, time: f64, sensor: Sensor) -> bool;

    /// Convert a simulated scintillator energy in MIPs to the digitised energy
    fn digi_e(&mut self, sim_e: f64) -> f64;

    /// Draw electronic noise in MIPs with standard deviation `sigma`
    fn noise(&mut self, sigma: f64) -> f64;

    /// Convert an energy in MIPs to ADC counts
    fn adc_converter(&self, e_mip: f64, sensor: Sensor) -> u32;

    /// Convert ADC counts to an energy in MIPs
    fn adc_to_mip(&self, adc: u32, sensor: Sensor) -> f64;
}

impl<D: Digitise + ?Sized> Digitise for &mut D {
    fn pass_time_cut(&self, time: f64, sensor: Sensor) -> bool {
        (**self).pass_time_cut(time, sensor)
    }

    fn digi_e(&mut self, sim_e: f64) -> f64 {
        (**self).digi_e(sim_e)
    }

    fn noise(&mut self, sigma: f64) -> f64 {
        (**self).noise(sigma)
    }

    fn adc_converter(&self, e_mip: f64, sensor: Sensor) -> u32 {
        (**self).adc_converter(e_mip, sensor)
    }

    fn adc_to_mip(&self, adc: u32, sensor: Sensor) -> f64 {
        (**self).adc_to_mip(adc, sensor)
    }
}

/// Sink for digitised events
pub trait WriteEvent {
    type Error;

    fn write_header(&mut self, header: &OutputHeader) -> Result<(), Self::Error>;

    fn write_event(&mut self, event: &DigiEvent<'_>) -> Result<(), Self::Error>;

    /// Write the noise diagnostics and flush all output
    fn finish(&mut self, noise: &Hist1D) -> Result<(), Self::Error>;
}

impl<W: WriteEvent + ?Sized> WriteEvent for &mut W {
    type Error = W::Error;

    fn write_header(&mut self, header: &OutputHeader) -> Result<(), Self::Error> {
        (**self).write_header(header)
    }

    fn write_event(&mut self, event: &DigiEvent<'_>) -> Result<(), Self::Error> {
        (**self).write_event(event)
    }

    fn finish(&mut self, noise: &Hist1D) -> Result<(), Self::Error> {
        (**self).finish(noise)
    }
}

/// Writer with trailing data that has to be written explicitly
pub trait FinishWrite: std::io::Write {
    /// Complete the output
    ///
    /// Further writes may fail afterwards.
    fn finish_write(&mut self) -> std::io::Result<()>;
}

impl FinishWrite for Vec<u8> {
    fn finish_write(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<W: FinishWrite + ?Sized> FinishWrite for &mut W {
    fn finish_write(&mut self) -> std::io::Result<()> {
        (**self).finish_write()
    }
}

/// Progress indicator
pub trait Progress {
    /// Advance progress by `i`
    fn inc(&self, i: u64);

    /// Finish progress
    fn finish(&self);
}
