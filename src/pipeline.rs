use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::{
    calibration::{Calibration, CalibrationMismatch},
    cluster::{find_jets, JetDefinition},
    detector::Detector,
    engine::{DigiEngine, DigiEngineBuilder, DigiEngineBuilderError, HitCollections},
    event::{DigiEvent, OutputHeader, SimEvent},
    geometry::{GeometryConversion, GeometryError},
    hit::{CellIdError, Jet, SimHit},
    layer_config::LayerConfig,
    progress_bar::{Progress, ProgressBar},
    traits::{Digitise, WriteEvent},
};

/// Run-wide settings of a [DigiPipeline]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOptions {
    /// Maximum number of events to process, zero means all
    pub max_events: usize,
    /// Write the sim hits of each event
    pub save_sim_hits: bool,
    /// Write all digitised hits, ignoring thresholds
    pub save_digi_hits: bool,
    /// Cluster jets with the given definition
    pub jet_def: Option<JetDefinition>,
    /// Seed of the noise generator, only recorded in the output
    pub seed: u64,
    /// Number of events in the input, if known
    pub expected_events: Option<usize>,
}

/// Collect everything needed to set up a [DigiPipeline]
#[derive(Clone, Debug)]
pub struct DigiPipelineBuilder<R, W, D> {
    pub reader: R,
    pub writer: W,
    pub digitiser: D,
    pub detector: Detector,
    pub calibration: Calibration,
    pub layer_config: LayerConfig,
    /// Initial size of a cell with granularity one
    pub cell_size: f64,
    /// Transverse extent of the binned area
    pub xy_width: f64,
    pub options: RunOptions,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Inconsistent calibration: {0}")]
    Calibration(#[from] CalibrationMismatch),
    #[error("Configuration has {config} layers, but the detector has {detector}")]
    LayerCount { config: usize, detector: usize },
    #[error("Failed to set up digitisation: {0}")]
    Engine(#[from] DigiEngineBuilderError),
}

impl<R, W, D> DigiPipelineBuilder<R, W, D> {
    pub fn build(self) -> Result<DigiPipeline<R, W, D>, BuildError> {
        let nlayers = self.detector.nlayers();
        if self.layer_config.nlayers() != nlayers {
            return Err(BuildError::LayerCount {
                config: self.layer_config.nlayers(),
                detector: nlayers,
            });
        }
        self.calibration.check(&self.detector)?;
        let geometry = GeometryConversion::new(
            self.cell_size,
            self.xy_width,
            self.layer_config.granularities(),
        )?;
        let mev_to_mip = (0..nlayers)
            .map(|l| self.calibration.mev_to_mip(&self.detector, l))
            .collect();
        let engine = DigiEngineBuilder::default()
            .digitiser(self.digitiser)
            .config(self.layer_config)
            .save_all_digis(self.options.save_digi_hits)
            .collect_jet_inputs(self.options.jet_def.is_some())
            .build()?;
        Ok(DigiPipeline {
            reader: self.reader,
            writer: self.writer,
            engine,
            detector: self.detector,
            calibration: self.calibration,
            geometry,
            mev_to_mip,
            options: self.options,
            buffers: Buffers::default(),
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError<E1, E2> {
    #[error("Failed to read event: {0}")]
    ReadErr(E1),
    #[error("Failed to write output: {0}")]
    WriteErr(E2),
    #[error("Failed to adjust geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Sim hit in event {event} is in layer {layer}, but the detector only has {nlayers} layers")]
    LayerOutOfRange {
        event: u64,
        layer: usize,
        nlayers: usize,
    },
    #[error("Sim hit {hit} in event {event} has non-finite entries")]
    NonFiniteHit { event: u64, hit: usize },
    #[error("Failed to encode cell: {0}")]
    CellId(#[from] CellIdError),
}

/// Statistics of a completed run
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub nevents: usize,
    pub nreco_hits: usize,
    pub ndigi_hits: usize,
    pub njets: usize,
}

/// Capacity hint for an event buffer
///
/// The watermark never decreases and is doubled until it covers the
/// largest buffer size seen so far.
#[derive(Copy, Clone, Debug)]
struct Watermark {
    name: &'static str,
    value: usize,
}

impl Watermark {
    const fn new(name: &'static str, value: usize) -> Self {
        Self { name, value }
    }

    fn update(&mut self, len: usize) {
        if len <= self.value {
            return;
        }
        while self.value < len {
            self.value = std::cmp::max(2 * self.value, 1);
        }
        debug!("Increased {} buffer watermark to {}", self.name, self.value);
    }

    fn apply<T>(&mut self, buf: &mut Vec<T>) {
        self.update(buf.len());
        buf.clear();
        buf.reserve(self.value);
    }
}

/// Per-event buffers, cleared after each event
#[derive(Clone, Debug)]
struct Buffers {
    sim_hits: Vec<SimHit>,
    hits: HitCollections,
    jets: Vec<Jet>,
    marks: [Watermark; 5],
}

impl Default for Buffers {
    fn default() -> Self {
        Self {
            sim_hits: Vec::new(),
            hits: HitCollections::default(),
            jets: Vec::new(),
            marks: [
                Watermark::new("sim hit", 1000),
                Watermark::new("digi hit", 1000),
                Watermark::new("reco hit", 1000),
                Watermark::new("jet input", 100),
                Watermark::new("jet", 10),
            ],
        }
    }
}

impl Buffers {
    fn clear(&mut self) {
        let [sim, digi, reco, jet_inputs, jets] = &mut self.marks;
        sim.apply(&mut self.sim_hits);
        digi.apply(&mut self.hits.digi_hits);
        reco.apply(&mut self.hits.reco_hits);
        jet_inputs.apply(&mut self.hits.jet_inputs);
        jets.apply(&mut self.jets);
    }
}

/// Event loop of a digitisation run
///
/// For each event, the pipeline
///
/// 1. fills the sim hits into the per-layer spatial bins,
/// 2. digitises all bins,
/// 3. optionally clusters jets,
/// 4. writes the event.
pub struct DigiPipeline<R, W, D> {
    reader: R,
    writer: W,
    engine: DigiEngine<D>,
    detector: Detector,
    calibration: Calibration,
    geometry: GeometryConversion,
    mev_to_mip: Vec<f64>,
    options: RunOptions,
    buffers: Buffers,
}

impl<R, W, D, E> DigiPipeline<R, W, D>
where
    R: Iterator<Item = Result<SimEvent, E>>,
    W: WriteEvent,
    D: Digitise,
{
    /// Process all events
    pub fn run(&mut self) -> Result<RunSummary, PipelineError<E, W::Error>> {
        use PipelineError::*;

        self.writer
            .write_header(&self.output_header())
            .map_err(WriteErr)?;

        let limit = match self.options.max_events {
            0 => usize::MAX,
            n => n,
        };
        let expected = match (self.options.max_events, self.options.expected_events) {
            (0, expected) => expected,
            (max, Some(expected)) => Some(std::cmp::min(max, expected)),
            (max, None) => Some(max),
        };
        let progress = ProgressBar::new(expected.map(|n| n as u64), "Digitising events:");

        self.buffers.clear();
        let mut summary = RunSummary::default();
        while summary.nevents < limit {
            let Some(event) = self.reader.next() else {
                break;
            };
            let event = event.map_err(ReadErr)?;
            self.digitise(&event)?;
            self.write(&event).map_err(WriteErr)?;

            summary.nevents += 1;
            summary.nreco_hits += self.buffers.hits.reco_hits.len();
            summary.ndigi_hits += self.buffers.hits.digi_hits.len();
            summary.njets += self.buffers.jets.len();

            self.buffers.clear();
            self.geometry.reset();
            progress.inc(1);
        }
        progress.finish();
        if self.options.max_events > summary.nevents {
            debug!(
                "Requested {} events, but only {} are available",
                self.options.max_events, summary.nevents
            );
        }
        self.writer
            .finish(self.engine.noise_histogram())
            .map_err(WriteErr)?;
        info!(
            "Digitised {} events with {} reco hits",
            summary.nevents, summary.nreco_hits
        );
        Ok(summary)
    }

    fn digitise(
        &mut self,
        event: &SimEvent,
    ) -> Result<(), PipelineError<E, W::Error>> {
        if event.cell_size != self.geometry.cell_size() {
            warn!(
                "Cell size changed from {} to {} in event {}, reinitialising geometry",
                self.geometry.cell_size(),
                event.cell_size,
                event.event_number
            );
            self.geometry.set_cell_size(event.cell_size)?;
        }

        let nlayers = self.geometry.nlayers();
        for (nhit, hit) in event.sim_hits.iter().enumerate() {
            if hit.layer >= nlayers {
                return Err(PipelineError::LayerOutOfRange {
                    event: event.event_number,
                    layer: hit.layer,
                    nlayers,
                });
            }
            if !hit.is_finite() {
                return Err(PipelineError::NonFiniteHit {
                    event: event.event_number,
                    hit: nhit,
                });
            }
            let energy = hit.energy * self.mev_to_mip[hit.layer];
            self.geometry.fill(
                hit.layer,
                energy,
                hit.time,
                hit.x,
                hit.y,
                hit.z,
                hit.momentum(),
            );
            if self.options.save_sim_hits && hit.energy > 0. {
                self.buffers.sim_hits.push(*hit);
            }
        }

        let stats = self.engine.sweep(
            &self.geometry,
            &self.detector,
            &mut self.buffers.hits,
        )?;
        if let Some(jet_def) = &self.options.jet_def {
            let inputs = self.buffers.hits.jet_inputs.drain(..).collect();
            self.buffers.jets.extend(find_jets(inputs, jet_def));
        }
        debug!(
            "Event {}: {} sim hits, {} reco hits, {} jets",
            event.event_number,
            event.sim_hits.len(),
            self.buffers.hits.reco_hits.len(),
            self.buffers.jets.len()
        );
        trace!(
            "{} bins, {} out of time, {} above threshold",
            stats.nbins,
            stats.nout_of_time,
            stats.nabove_threshold
        );
        Ok(())
    }

    fn write(&mut self, event: &SimEvent) -> Result<(), W::Error> {
        let buffers = &self.buffers;
        let out = DigiEvent {
            event_number: event.event_number,
            cell_size: self.geometry.cell_size(),
            sim_hits: self
                .options
                .save_sim_hits
                .then_some(buffers.sim_hits.as_slice()),
            digi_hits: self
                .options
                .save_digi_hits
                .then_some(buffers.hits.digi_hits.as_slice()),
            reco_hits: &buffers.hits.reco_hits,
            jets: self
                .options
                .jet_def
                .is_some()
                .then_some(buffers.jets.as_slice()),
        };
        self.writer.write_event(&out)
    }

    fn output_header(&self) -> OutputHeader {
        OutputHeader {
            version: crate::VERSION.to_owned(),
            seed: self.options.seed,
            layer_config: self.engine.config().clone(),
            detector: self.detector.clone(),
            calibration: self.calibration.clone(),
            cell_size: self.geometry.cell_size(),
            save_sim_hits: self.options.save_sim_hits,
            save_digi_hits: self.options.save_digi_hits,
            jet_definition: self.options.jet_def,
        }
    }
}

impl<R, W, D> DigiPipeline<R, W, D> {
    /// Replace the output writer
    ///
    /// This allows validating the setup by building the pipeline
    /// before any output is created.
    pub fn with_writer<V>(self, writer: V) -> DigiPipeline<R, V, D> {
        DigiPipeline {
            reader: self.reader,
            writer,
            engine: self.engine,
            detector: self.detector,
            calibration: self.calibration,
            geometry: self.geometry,
            mev_to_mip: self.mev_to_mip,
            options: self.options,
            buffers: self.buffers,
        }
    }

    pub fn engine(&self) -> &DigiEngine<D> {
        &self.engine
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    use crate::{
        detector::tests::si_scint_detector,
        digitisation::{DigitisationSettings, Digitiser},
        event::OwnedOutputRecord,
        writer::JsonWriter,
    };

    fn sim_hit(layer: usize, energy: f64, x: f64, y: f64, z: f64) -> SimHit {
        SimHit {
            energy,
            layer,
            x,
            y,
            z,
            time: 1.,
            px: 1.,
            py: 0.,
            pz: 1.,
            e: 2.,
        }
    }

    fn events(n: u64, cell_size: f64) -> Vec<Result<SimEvent, Infallible>> {
        (0..n)
            .map(|event_number| {
                Ok(SimEvent {
                    event_number,
                    cell_size,
                    sim_hits: vec![
                        sim_hit(0, 2., 0.5, 0.5, 10.),
                        sim_hit(1, 0., -2.5, 0.5, 20.),
                        sim_hit(2, 80., 1.5, -3.5, 30.),
                    ],
                })
            })
            .collect()
    }

    fn run_raw(
        events: Vec<Result<SimEvent, Infallible>>,
        config: LayerConfig,
        options: RunOptions,
    ) -> (RunSummary, Vec<u8>) {
        let mut writer = JsonWriter::new(Vec::new());
        let detector = si_scint_detector();
        let summary = DigiPipelineBuilder {
            reader: events.into_iter(),
            writer: &mut writer,
            digitiser: Digitiser::new(
                DigitisationSettings::default(),
                Xoshiro256Plus::seed_from_u64(options.seed),
            ),
            calibration: Calibration::new(vec![Default::default(); 2]),
            detector,
            layer_config: config,
            cell_size: 1.,
            xy_width: 10.,
            options,
        }
        .build()
        .unwrap()
        .run()
        .unwrap();
        (summary, writer.into_inner())
    }

    fn run(
        events: Vec<Result<SimEvent, Infallible>>,
        config: LayerConfig,
        options: RunOptions,
    ) -> (RunSummary, Vec<OwnedOutputRecord>) {
        let (summary, out) = run_raw(events, config, options);
        let out = String::from_utf8(out).unwrap();
        let records = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (summary, records)
    }

    fn event_records(
        records: &[OwnedOutputRecord],
    ) -> Vec<&crate::event::OwnedDigiEvent> {
        records
            .iter()
            .filter_map(|r| match r {
                OwnedOutputRecord::Event(ev) => Some(ev),
                _ => None,
            })
            .collect()
    }

    fn noiseless(nlayers: usize) -> LayerConfig {
        LayerConfig::from_strs(nlayers, "", "0-2:0", "").unwrap()
    }

    #[test]
    fn single_silicon_hit() {
        let options = RunOptions {
            save_sim_hits: true,
            ..Default::default()
        };
        let (summary, records) = run(events(1, 1.), noiseless(3), options);
        assert_eq!(summary.nevents, 1);
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], OwnedOutputRecord::Header(_)));
        assert!(matches!(records[2], OwnedOutputRecord::Histogram(_)));
        let ev = event_records(&records)[0];
        // 80 MIPs in the scintillator are below 25 / (1/50) = 1250
        assert_eq!(ev.reco_hits.len(), 1);
        let hit = ev.reco_hits[0];
        assert_eq!(hit.layer, 0);
        assert_eq!(hit.adc_counts, 100);
        assert_eq!(hit.energy, 2.);
        assert_eq!(hit.zpos, 10.);
        assert_eq!(hit.cell_id.x_cell(), 0);
        assert!(hit.cell_id.x_side());
        // zero-energy sim hits are not stored
        assert_eq!(ev.sim_hits.as_ref().map(|h| h.len()), Some(2));
        assert!(ev.digi_hits.is_none());
        assert!(ev.jets.is_none());
    }

    #[test]
    fn event_limit() {
        let options = RunOptions {
            max_events: 2,
            ..Default::default()
        };
        let (summary, records) = run(events(5, 1.), noiseless(3), options);
        assert_eq!(summary.nevents, 2);
        assert_eq!(event_records(&records).len(), 2);

        let options = RunOptions {
            max_events: 10,
            ..Default::default()
        };
        let (summary, _) = run(events(5, 1.), noiseless(3), options);
        assert_eq!(summary.nevents, 5);

        let (summary, _) = run(events(5, 1.), noiseless(3), RunOptions::default());
        assert_eq!(summary.nevents, 5);
    }

    #[test]
    fn save_all_digis() {
        let options = RunOptions {
            save_digi_hits: true,
            ..Default::default()
        };
        let (summary, records) = run(events(2, 1.), LayerConfig::new(3), options);
        assert_eq!(summary.ndigi_hits, 600);
        for ev in event_records(&records) {
            let digis = ev.digi_hits.as_ref().unwrap();
            assert_eq!(digis.len(), 300);
            assert_eq!(digis, &ev.reco_hits);
            let mut cells: Vec<_> =
                digis.iter().map(|h| (h.layer, h.cell_id)).collect();
            cells.sort();
            cells.dedup();
            assert_eq!(cells.len(), 300);
            assert!(ev.sim_hits.is_none());
        }
    }

    #[test]
    fn deterministic() {
        let options = RunOptions {
            save_digi_hits: true,
            seed: 11,
            ..Default::default()
        };
        let (_, out1) = run_raw(events(3, 1.), LayerConfig::new(3), options.clone());
        let (_, out2) = run_raw(events(3, 1.), LayerConfig::new(3), options.clone());
        assert!(!out1.is_empty());
        assert_eq!(out1, out2);
        let options = RunOptions { seed: 12, ..options };
        let (_, out3) = run_raw(events(3, 1.), LayerConfig::new(3), options);
        assert_ne!(out1, out3);
    }

    #[test]
    fn cell_size_change() {
        let options = RunOptions {
            save_digi_hits: true,
            ..Default::default()
        };
        let mut input = events(1, 1.);
        input.extend(events(1, 2.));
        let (_, records) = run(input, noiseless(3), options);
        let evs = event_records(&records);
        assert_eq!(evs[0].cell_size, 1.);
        assert_eq!(evs[0].reco_hits.len(), 300);
        assert_eq!(evs[1].cell_size, 2.);
        assert_eq!(evs[1].reco_hits.len(), 75);
    }

    #[test]
    fn jets() {
        let options = RunOptions {
            jet_def: Some(JetDefinition::default()),
            ..Default::default()
        };
        let (summary, records) = run(events(1, 1.), noiseless(3), options);
        assert_eq!(summary.njets, 1);
        let jets = event_records(&records)[0].jets.clone().unwrap();
        assert_eq!(jets.len(), 1);
        assert_eq!(jets[0].e, 2.);
        assert_eq!(jets[0].px, 1.);
    }

    #[test]
    fn layer_out_of_range() {
        let mut writer = JsonWriter::new(Vec::new());
        let input: Vec<Result<SimEvent, Infallible>> = vec![Ok(SimEvent {
            event_number: 7,
            cell_size: 1.,
            sim_hits: vec![sim_hit(3, 1., 0., 0., 0.)],
        })];
        let res = DigiPipelineBuilder {
            reader: input.into_iter(),
            writer: &mut writer,
            digitiser: Digitiser::new(
                DigitisationSettings::default(),
                Xoshiro256Plus::seed_from_u64(0),
            ),
            calibration: Calibration::new(vec![Default::default(); 2]),
            detector: si_scint_detector(),
            layer_config: LayerConfig::new(3),
            cell_size: 1.,
            xy_width: 10.,
            options: RunOptions::default(),
        }
        .build()
        .unwrap()
        .run();
        assert!(matches!(
            res,
            Err(PipelineError::LayerOutOfRange { event: 7, layer: 3, nlayers: 3 })
        ));
    }

    #[test]
    fn deferred_writer() {
        let pipeline = DigiPipelineBuilder {
            reader: events(2, 1.).into_iter(),
            writer: (),
            digitiser: Digitiser::new(
                DigitisationSettings::default(),
                Xoshiro256Plus::seed_from_u64(0),
            ),
            calibration: Calibration::new(vec![Default::default(); 2]),
            detector: si_scint_detector(),
            layer_config: noiseless(3),
            cell_size: 1.,
            xy_width: 10.,
            options: RunOptions::default(),
        }
        .build()
        .unwrap();
        let mut writer = JsonWriter::new(Vec::new());
        let summary = pipeline.with_writer(&mut writer).run().unwrap();
        assert_eq!(summary.nevents, 2);
        assert_eq!(summary.nreco_hits, 2);
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn cell_size_too_small() {
        let mut writer = JsonWriter::new(Vec::new());
        let mut input = events(1, 1.);
        input.extend(events(1, 1e-6));
        let res = DigiPipelineBuilder {
            reader: input.into_iter(),
            writer: &mut writer,
            digitiser: Digitiser::new(
                DigitisationSettings::default(),
                Xoshiro256Plus::seed_from_u64(0),
            ),
            calibration: Calibration::new(vec![Default::default(); 2]),
            detector: si_scint_detector(),
            layer_config: LayerConfig::new(3),
            cell_size: 1.,
            xy_width: 10.,
            options: RunOptions::default(),
        }
        .build()
        .unwrap()
        .run();
        assert!(matches!(
            res,
            Err(PipelineError::Geometry(GeometryError::TooManyCells { layer: 0, .. }))
        ));
    }

    #[test]
    fn inconsistent_setup() {
        let builder = DigiPipelineBuilder {
            reader: Vec::<Result<SimEvent, Infallible>>::new().into_iter(),
            writer: JsonWriter::new(Vec::new()),
            digitiser: Digitiser::new(
                DigitisationSettings::default(),
                Xoshiro256Plus::seed_from_u64(0),
            ),
            calibration: Calibration::new(vec![Default::default(); 2]),
            detector: si_scint_detector(),
            layer_config: LayerConfig::new(4),
            cell_size: 1.,
            xy_width: 10.,
            options: RunOptions::default(),
        };
        assert!(matches!(
            builder.clone().build(),
            Err(BuildError::LayerCount { config: 4, detector: 3 })
        ));
        let builder = DigiPipelineBuilder {
            layer_config: LayerConfig::new(3),
            cell_size: -1.,
            ..builder
        };
        assert!(matches!(
            builder.clone().build(),
            Err(BuildError::Geometry(GeometryError::InvalidCellSize(_)))
        ));
        let builder = DigiPipelineBuilder {
            cell_size: 1e-3,
            ..builder
        };
        assert!(matches!(
            builder.build(),
            Err(BuildError::Geometry(GeometryError::TooManyCells { .. }))
        ));
    }
}
