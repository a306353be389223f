//! `calodigi` converts simulated energy deposits in a layered
//! high-granularity calorimeter into digitised detector readout.
//!
//! # How to use
//!
//! A run is set up with a [DigiPipelineBuilder](pipeline::DigiPipelineBuilder)
//! from an event reader, an output writer, and a
//! [Digitiser](digitisation::Digitiser) modelling the readout. For
//! each event, the sim hits are binned into cells of per-layer
//! granularity, and every cell is passed through time cut, noise, ADC
//! conversion, and threshold. Hits can optionally be clustered into jets.
//!
//! ## Most relevant modules
//!
//! - [prelude] exports a list of the most relevant classes and objects
//! - [pipeline] contains the event loop
//! - [engine] digitises the binned hits of a single event
//! - [layer_config] and [parameter] for the per-layer readout settings
//! - [reader] and [writer] for event files
//!

/// Detector calibration constants
pub mod calibration;
/// Jet clustering
pub mod cluster;
/// Output compression
pub mod compression;
/// Layer layout and sensor technologies
pub mod detector;
/// Detector response model
pub mod digitisation;
/// Per-cell digitisation
pub mod engine;
/// Input and output records
pub mod event;
/// Four-vector class
pub mod four_vector;
/// Spatial binning of sim hits
pub mod geometry;
/// Fixed-bin histograms
pub mod histogram;
/// Simulated and digitised hits
pub mod hit;
/// Per-layer readout configuration
pub mod layer_config;
/// Parser for per-layer parameter strings
pub mod parameter;
/// Event loop
pub mod pipeline;
/// Most important exports
pub mod prelude;
/// Progress bar
pub mod progress_bar;
/// Event reader
pub mod reader;
/// Common traits
pub mod traits;
/// Event writer
pub mod writer;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_REV: Option<&str> = option_env!("VERGEN_GIT_SHA");
pub const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");
