use serde::{Deserialize, Serialize};

use crate::{
    calibration::Calibration,
    cluster::JetDefinition,
    detector::Detector,
    histogram::Hist1D,
    hit::{Jet, RecoHit, SimHit},
    layer_config::LayerConfig,
};

/// Description of a simulated run
///
/// This is the first record of every input file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RunHeader {
    pub detector: Detector,
    pub calibration: Calibration,
    /// Size of a cell with granularity one
    pub cell_size: f64,
    /// Transverse extent of the binned area
    pub xy_width: f64,
    /// Number of events in the file, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nevents: Option<usize>,
}

/// A simulated event
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct SimEvent {
    pub event_number: u64,
    pub cell_size: f64,
    #[serde(default)]
    pub sim_hits: Vec<SimHit>,
}

/// Description of a digitisation run
///
/// This is the first record of every output file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct OutputHeader {
    pub version: String,
    pub seed: u64,
    pub layer_config: LayerConfig,
    pub detector: Detector,
    pub calibration: Calibration,
    pub cell_size: f64,
    pub save_sim_hits: bool,
    pub save_digi_hits: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jet_definition: Option<JetDefinition>,
}

/// A digitised event
///
/// Collections that were not requested are `None` and do not appear
/// in the output.
#[derive(Serialize, Copy, Clone, Debug, PartialEq)]
pub struct DigiEvent<'a> {
    pub event_number: u64,
    pub cell_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_hits: Option<&'a [SimHit]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digi_hits: Option<&'a [RecoHit]>,
    pub reco_hits: &'a [RecoHit],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jets: Option<&'a [Jet]>,
}

/// Owned version of [DigiEvent], used when reading output back
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct OwnedDigiEvent {
    pub event_number: u64,
    pub cell_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_hits: Option<Vec<SimHit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digi_hits: Option<Vec<RecoHit>>,
    pub reco_hits: Vec<RecoHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jets: Option<Vec<Jet>>,
}

/// A single line of an output file
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "record", rename_all = "lowercase")]
pub enum OutputRecord<'a> {
    Header(&'a OutputHeader),
    Event(&'a DigiEvent<'a>),
    Histogram(&'a Hist1D),
}

/// Owned version of [OutputRecord]
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "record", rename_all = "lowercase")]
pub enum OwnedOutputRecord {
    Header(OutputHeader),
    Event(OwnedDigiEvent),
    Histogram(Hist1D),
}
