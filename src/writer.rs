use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use log::debug;
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::{
    compression::{compress_writer, CompressWriter, Compression},
    event::{DigiEvent, OutputHeader, OutputRecord},
    histogram::Hist1D,
    traits::{FinishWrite, WriteEvent},
};

/// Base name of all output files
pub const OUTPUT_STEM: &str = "DigiPFcal";

/// Location and layout of the output file
#[derive(Debug, Clone, TypedBuilder)]
pub struct FileWriter {
    outdir: PathBuf,
    #[builder(default)]
    compression: Option<Compression>,
    #[builder(default)]
    save_digi_hits: bool,
    #[builder(default = true)]
    save_sim_hits: bool,
}

impl FileWriter {
    /// Full path of the output file
    ///
    /// The name encodes which optional collections are present, for
    /// example `DigiPFcal_withDigiHits_withoutSimHits.jsonl.gz`.
    pub fn filename(&self) -> PathBuf {
        let mut name = OUTPUT_STEM.to_owned();
        if self.save_digi_hits {
            name += "_withDigiHits";
        }
        if !self.save_sim_hits {
            name += "_withoutSimHits";
        }
        name += ".jsonl";
        if let Some(compression) = self.compression {
            name += ".";
            name += compression.extension();
        }
        self.outdir.join(name)
    }

    /// Create the output file
    pub fn create(
        &self,
    ) -> Result<JsonWriter<CompressWriter<BufWriter<File>>>, WriteError> {
        let filename = self.filename();
        debug!("Writing to {filename:?}");
        let file = File::create(&filename).map_err(|err| WriteError::Create {
            path: filename,
            err,
        })?;
        let writer = compress_writer(BufWriter::new(file), self.compression)?;
        Ok(JsonWriter::new(writer))
    }
}

/// Writes output records as JSON lines
#[derive(Clone, Debug)]
pub struct JsonWriter<W> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &OutputRecord<'_>) -> Result<(), WriteError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: FinishWrite> WriteEvent for JsonWriter<W> {
    type Error = WriteError;

    fn write_header(&mut self, header: &OutputHeader) -> Result<(), Self::Error> {
        self.write_record(&OutputRecord::Header(header))
    }

    fn write_event(&mut self, event: &DigiEvent<'_>) -> Result<(), Self::Error> {
        self.write_record(&OutputRecord::Event(event))
    }

    fn finish(&mut self, noise: &Hist1D) -> Result<(), Self::Error> {
        self.write_record(&OutputRecord::Histogram(noise))?;
        self.writer.finish_write()?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create output file {path:?}: {err}")]
    Create { path: PathBuf, err: std::io::Error },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to serialise record: {0}")]
    Serialise(#[from] serde_json::Error),
}
