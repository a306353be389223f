pub use crate::{
    cluster::JetDefinition,
    detector::Detector,
    engine::{DigiEngine, DigiEngineBuilder},
    pipeline::{DigiPipeline, DigiPipelineBuilder, RunOptions},
    reader::FileReader,
    traits::*,
    writer::FileWriter,
};
