//! SinoWealth ICP decoder, edge-by-edge sequential design
//!
//! Processes the ICP signals one falling TCK edge at a time using
//! [`FallingEdges`], which pulls samples from a [`SampleSource`].
//!
//! Flow per byte:
//!   1. Edges 1..=8 carry data bits: TDI is shifted in MSB first, TDO (when
//!      connected) is OR-ed in LSB first
//!   2. Edge 9 is the sync clock and closes the byte
//!   3. The byte is emitted as TDI data, an optional command, optional TDO
//!      data and a sync marker, in that order
//!
//! There is no resynchronization. A capture that starts in the middle of a
//! byte, or a glitch that adds or drops a TCK edge, shifts every following
//! byte boundary and the decoder cannot notice.

use super::commands::Command;
use super::types::{Annotation, AnnotationClass, ByteFrame};
use crate::runtime::sample::{Wire, WireSet};
use crate::runtime::sink::AnnotationSink;
use crate::runtime::source::{FallingEdges, SampleSource};
use crate::{IcpError, Result};
use tracing::{debug, info, trace};

/// Data bits per byte; the next edge is the sync clock
const DATA_BITS: u8 = 8;

/// Shift register for one 9-clock byte
#[derive(Debug, Clone, Default)]
pub struct ByteAssembler {
    has_tdo: bool,
    /// Next bit slot, 0..=7 for data, 8 when the sync edge is due
    bit_slot: u8,
    data_in: u8,
    data_out: u8,
    start_position: u64,
}

impl ByteAssembler {
    /// Create an assembler; TDO bits are ignored unless `has_tdo` is set
    pub fn new(has_tdo: bool) -> Self {
        Self {
            has_tdo,
            ..Self::default()
        }
    }

    /// Current bit slot (0..=8)
    pub fn bit_slot(&self) -> u8 {
        self.bit_slot
    }

    /// Whether a byte is partially assembled
    pub fn in_frame(&self) -> bool {
        self.bit_slot != 0
    }

    /// Drop any partial byte
    pub fn reset(&mut self) {
        self.bit_slot = 0;
        self.data_in = 0;
        self.data_out = 0;
        self.start_position = 0;
    }

    /// Feed one falling TCK edge. Returns the byte when this edge is its sync clock.
    pub fn on_edge(&mut self, tdi: bool, tdo: bool, position: u64) -> Option<ByteFrame> {
        if self.bit_slot < DATA_BITS {
            if self.bit_slot == 0 {
                self.start_position = position;
                self.data_in = 0;
                self.data_out = 0;
            }

            self.data_in = (self.data_in << 1) | u8::from(tdi);

            let tdo = tdo && self.has_tdo;
            self.data_out |= u8::from(tdo) << self.bit_slot;

            trace!(
                "bit {}: TDI={} TDO={} at {}",
                self.bit_slot,
                u8::from(tdi),
                u8::from(tdo),
                position
            );
            self.bit_slot += 1;
            return None;
        }

        let frame = ByteFrame {
            start_position: self.start_position,
            end_position: position,
            data_in: self.data_in,
            data_out: self.data_out,
        };
        self.bit_slot = 0;
        self.data_in = 0;
        self.data_out = 0;
        Some(frame)
    }
}

/// ICP decoder
///
/// Inputs: TCK and TDI (required), TDO and TMS (optional)
/// Output: [`Annotation`]s, one burst per byte
#[derive(Debug, Clone)]
pub struct IcpDecoder {
    name: String,

    /// Wires configured in the current session
    wires: WireSet,
    samplerate: Option<f64>,
    assembler: ByteAssembler,

    /// Position of the most recent TCK falling edge
    last_edge: Option<u64>,

    /// Byte counter for logging.
    frame_count: u64,
}

impl Default for IcpDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl IcpDecoder {
    /// Create a new ICP decoder
    pub fn new() -> Self {
        Self {
            name: "icp_decoder".to_string(),
            wires: WireSet::empty(),
            samplerate: None,
            assembler: ByteAssembler::default(),
            last_edge: None,
            frame_count: 0,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return to the state before any capture was decoded
    pub fn reset(&mut self) {
        self.wires = WireSet::empty();
        self.samplerate = None;
        self.assembler = ByteAssembler::default();
        self.last_edge = None;
        self.frame_count = 0;
    }

    /// Sample rate reported by the last source, in Hz
    pub fn samplerate(&self) -> Option<f64> {
        self.samplerate
    }

    pub fn has_tdo(&self) -> bool {
        self.wires.contains(Wire::Tdo)
    }

    pub fn has_tms(&self) -> bool {
        self.wires.contains(Wire::Tms)
    }

    /// Position of the most recent TCK falling edge
    pub fn last_edge(&self) -> Option<u64> {
        self.last_edge
    }

    /// Bytes decoded in the current session
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Decode a whole capture.
    ///
    /// Starts a fresh session, pulls falling TCK edges until the source is
    /// exhausted and puts the annotations of every complete byte to `sink`.
    /// A partial byte at the end of the capture is dropped. Returns the number
    /// of bytes decoded.
    ///
    /// Fails with [`IcpError::MissingChannel`] before reading any sample when
    /// TCK or TDI is not configured; a warning annotation is put first.
    pub fn decode<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<u64>
    where
        S: SampleSource + ?Sized,
        K: AnnotationSink + ?Sized,
    {
        self.reset();
        self.start(source, sink)?;

        for edge in FallingEdges::new(source) {
            let edge = edge?;
            self.last_edge = Some(edge.position);
            if let Some(frame) = self.assembler.on_edge(edge.tdi, edge.tdo, edge.position) {
                self.frame_count += 1;
                debug!(
                    "[{}] #{}: TDI=0x{:02X} TDO=0x{:02X} at {}..{}",
                    self.name,
                    self.frame_count,
                    frame.data_in,
                    frame.data_out,
                    frame.start_position,
                    frame.end_position
                );
                self.put_frame(&frame, sink)?;
            }
        }

        if self.assembler.in_frame() {
            debug!(
                "[{}] Capture ended inside a byte ({}/{} bits), dropped",
                self.name,
                self.assembler.bit_slot(),
                DATA_BITS
            );
        }
        info!("[{}] Decoded {} bytes", self.name, self.frame_count);

        Ok(self.frame_count)
    }

    /// Check the required wires and record the session capabilities.
    fn start<S, K>(&mut self, source: &S, sink: &mut K) -> Result<()>
    where
        S: SampleSource + ?Sized,
        K: AnnotationSink + ?Sized,
    {
        for wire in [Wire::Tck, Wire::Tdi] {
            if !source.has_wire(wire) {
                let err = IcpError::MissingChannel(wire);
                sink.put(Annotation::new(0, 0, AnnotationClass::Warning, [err.to_string()]))?;
                return Err(err);
            }
        }

        self.wires = source.wires();
        self.samplerate = source.samplerate();
        self.assembler = ByteAssembler::new(self.has_tdo());

        info!(
            "[{}] Starting: TDO={}, TMS={}, samplerate={:?}",
            self.name,
            self.has_tdo(),
            self.has_tms(),
            self.samplerate
        );
        Ok(())
    }

    /// Put the annotations of one byte: TDI data, command, TDO data, sync.
    fn put_frame<K: AnnotationSink + ?Sized>(&self, frame: &ByteFrame, sink: &mut K) -> Result<()> {
        let (ss, es) = (frame.start_position, frame.end_position);

        sink.put(Annotation::new(
            ss,
            es,
            AnnotationClass::TdiData,
            [format!("@{:02X}", frame.data_in)],
        ))?;

        if let Some(command) = Command::from_opcode(frame.data_in) {
            sink.put(Annotation::new(
                ss,
                es,
                AnnotationClass::TdiCommand,
                command.display_texts(),
            ))?;
        }

        if self.has_tdo() {
            sink.put(Annotation::new(
                ss,
                es,
                AnnotationClass::TdoData,
                [format!("@{:02X}", frame.data_out)],
            ))?;
        }

        sink.put(Annotation::new(es, es, AnnotationClass::Sync, ["SYNC", "S"]))
    }
}
