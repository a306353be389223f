use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use audec::auto_decompress;
use log::debug;
use thiserror::Error;

use crate::{
    calibration::CalibrationMismatch,
    event::{RunHeader, SimEvent},
};

/// Reader for simulated events stored as JSON lines
///
/// The first non-empty line holds the [RunHeader], each following
/// non-empty line one [SimEvent].
pub struct EventReader<R> {
    source: R,
    header: RunHeader,
    line: String,
    line_nr: usize,
}

/// Reader for a possibly compressed event file
pub type FileReader = EventReader<Box<dyn BufRead>>;

impl FileReader {
    /// Open the event file at `path`
    ///
    /// Compressed files are detected automatically.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CreateError> {
        let path = path.as_ref();
        debug!("Reading events from {path:?}");
        let file = File::open(path)?;
        EventReader::new(auto_decompress(BufReader::new(file)))
    }
}

impl<R: BufRead> EventReader<R> {
    /// Construct a reader, parsing the run header
    pub fn new(mut source: R) -> Result<Self, CreateError> {
        let mut line = String::new();
        let mut line_nr = 0;
        loop {
            line.clear();
            if source.read_line(&mut line)? == 0 {
                return Err(CreateError::MissingHeader);
            }
            line_nr += 1;
            if !line.trim().is_empty() {
                break;
            }
        }
        let header: RunHeader = serde_json::from_str(&line)?;
        header.calibration.check(&header.detector)?;
        debug!(
            "Run with {} layers, cell size {}, transverse width {}",
            header.detector.nlayers(),
            header.cell_size,
            header.xy_width
        );
        Ok(Self {
            source,
            header,
            line,
            line_nr,
        })
    }

    /// The run header
    pub fn header(&self) -> &RunHeader {
        &self.header
    }

    fn read_event(&mut self) -> Result<Option<SimEvent>, EventReadError> {
        loop {
            self.line.clear();
            if self.source.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_nr += 1;
            if !self.line.trim().is_empty() {
                break;
            }
        }
        let line = self.line_nr;
        let event: SimEvent = serde_json::from_str(&self.line)
            .map_err(|err| EventReadError::Parse { line, err })?;
        if let Some(pos) = event.sim_hits.iter().position(|h| !h.is_finite()) {
            return Err(EventReadError::NonFinite {
                event: event.event_number,
                hit: pos,
            });
        }
        Ok(Some(event))
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<SimEvent, EventReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_event().transpose()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.header.nevents {
            Some(n) => (0, Some(n)),
            None => (0, None),
        }
    }
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Event file does not contain a run header")]
    MissingHeader,
    #[error("Failed to parse run header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("Inconsistent run header: {0}")]
    Calibration(#[from] CalibrationMismatch),
}

#[derive(Debug, Error)]
pub enum EventReadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse event in line {line}: {err}")]
    Parse { line: usize, err: serde_json::Error },
    #[error("Sim hit {hit} in event {event} has non-finite entries")]
    NonFinite { event: u64, hit: usize },
}
