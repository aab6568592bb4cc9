//! Protocol decoder nodes
//!
//! The ICP decoder and the types it produces.

pub mod commands;
pub mod icp_decoder;
pub mod types;

// Re-export common types
pub use commands::Command;
pub use types::{Annotation, AnnotationClass, AnnotationRow, ByteFrame};

// Re-export decoders
pub use icp_decoder::{ByteAssembler, IcpDecoder};
