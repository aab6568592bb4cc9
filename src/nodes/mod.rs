//! Capture sources and protocol decoders
//!
//! - **DslCapture**: reads DSLogic `.dsl` captures as a [`SampleSource`](crate::SampleSource)
//! - **Decoders**: the SinoWealth ICP decoder
//!
//! # Examples
//!
//! ```ignore
//! use icp::{DslCapture, IcpDecoder, ProbeMap, Wire};
//!
//! let probes = ProbeMap::new().with(Wire::Tck, 0).with(Wire::Tdi, 1).with(Wire::Tdo, 2);
//! let mut capture = DslCapture::open("capture.dsl", probes)?;
//! let mut annotations: Vec<icp::Annotation> = Vec::new();
//! IcpDecoder::new().decode(&mut capture, &mut annotations)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod decoders;
mod dsl_file;

// Export DslCapture and related types for file I/O
pub use dsl_file::{DslCapture, DslHeader, ProbeMap};
