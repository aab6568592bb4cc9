//! SinoWealth ICP protocol decoder
//!
//! Decodes the In-Circuit Programming interface of SinoWealth 8051
//! microcontrollers from logic captures. The interface clocks each byte with
//! 9 TCK pulses: 8 data bits followed by a sync clock.
//!
//! # Architecture
//!
//! - **SampleSource**: supplies run-length encoded multi-wire samples
//!   (in-memory, crossbeam channel, or DSLogic `.dsl` capture files)
//! - **FallingEdges**: lazily turns samples into falling TCK edges
//! - **IcpDecoder**: assembles bytes, classifies commands and emits annotations
//! - **AnnotationSink**: receives the annotations (`Vec` or crossbeam channel)
//!
//! # Example
//!
//! ```no_run
//! use icp::{DslCapture, IcpDecoder, ProbeMap, Wire};
//!
//! let probes = ProbeMap::new().with(Wire::Tck, 0).with(Wire::Tdi, 1);
//! let mut capture = DslCapture::open("capture.dsl", probes)?;
//! let mut annotations: Vec<icp::Annotation> = Vec::new();
//! IcpDecoder::new().decode(&mut capture, &mut annotations)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

pub mod nodes;
pub mod runtime;

// Re-export decoder data types
pub use nodes::decoders::{Annotation, AnnotationClass, AnnotationRow, ByteFrame, Command};

// Re-export the decoder itself
pub use nodes::decoders::{ByteAssembler, IcpDecoder};

// Re-export capture file support
pub use nodes::{DslCapture, DslHeader, ProbeMap};

// Re-export runtime sources and sinks
pub use runtime::{
    AnnotationSink, ChannelSink, ChannelSource, ClockEdge, FallingEdges, MemorySource, Sample,
    SampleBlock, SampleSource, Wire, WireSet,
};

#[derive(Error, Debug)]
pub enum IcpError {
    #[error("{0} pin required.")]
    MissingChannel(Wire),

    #[error("Annotation sink closed")]
    SinkClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Header parsing error: {0}")]
    ParseHeader(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid probe number: {0}")]
    InvalidProbe(usize),

    #[error("Invalid block number: {0}")]
    InvalidBlock(u64),
}

pub type Result<T> = std::result::Result<T, IcpError>;
