//! Runtime support: samples, sources and sinks

pub mod sample;
pub mod sink;
pub mod source;

pub use sample::{Sample, SampleBlock, Wire, WireSet};
pub use sink::{AnnotationSink, ChannelSink};
pub use source::{ChannelSource, ClockEdge, FallingEdges, MemorySource, SampleSource};
