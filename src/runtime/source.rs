//! Sample sources and falling-edge extraction
//!
//! A [`SampleSource`] is the decoder's view of a capture: it answers which
//! wires are configured and hands out [`Sample`]s in position order, one per
//! blocking pull. [`FallingEdges`] turns that pull interface into a lazy
//! iterator over falling TCK edges.

use super::sample::{Sample, Wire, WireSet};
use crate::Result;
use crossbeam_channel::{Receiver as CrossbeamReceiver, Sender as CrossbeamSender, bounded};
use std::collections::VecDeque;
use tracing::trace;

/// Source of multi-wire samples
pub trait SampleSource {
    /// Whether the given wire is connected in this capture
    fn has_wire(&self, wire: Wire) -> bool;

    /// Sample rate in Hz, if known
    fn samplerate(&self) -> Option<f64> {
        None
    }

    /// Pull the next sample. Returns `Ok(None)` once the capture is exhausted.
    fn next_sample(&mut self) -> Result<Option<Sample>>;

    /// Capability record of all configured wires
    fn wires(&self) -> WireSet {
        Wire::ALL
            .into_iter()
            .filter(|&wire| self.has_wire(wire))
            .collect()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn has_wire(&self, wire: Wire) -> bool {
        (**self).has_wire(wire)
    }

    fn samplerate(&self) -> Option<f64> {
        (**self).samplerate()
    }

    fn next_sample(&mut self) -> Result<Option<Sample>> {
        (**self).next_sample()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn has_wire(&self, wire: Wire) -> bool {
        (**self).has_wire(wire)
    }

    fn samplerate(&self) -> Option<f64> {
        (**self).samplerate()
    }

    fn next_sample(&mut self) -> Result<Option<Sample>> {
        (**self).next_sample()
    }
}

/// Source backed by an in-memory list of samples
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    wires: WireSet,
    samplerate: Option<f64>,
    samples: VecDeque<Sample>,
}

impl MemorySource {
    /// Create a source with the given configured wires
    pub fn new(wires: WireSet, samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            wires,
            samplerate: None,
            samples: samples.into_iter().collect(),
        }
    }

    /// Build a source with one sample per position from per-position levels
    pub fn from_levels(wires: WireSet, levels: impl IntoIterator<Item = WireSet>) -> Self {
        let samples = levels
            .into_iter()
            .enumerate()
            .map(|(position, levels)| Sample::new(levels, position as u64));
        Self::new(wires, samples)
    }

    /// With sample rate metadata
    pub fn with_samplerate(mut self, samplerate: f64) -> Self {
        self.samplerate = Some(samplerate);
        self
    }

    /// Number of samples not yet pulled
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl SampleSource for MemorySource {
    fn has_wire(&self, wire: Wire) -> bool {
        self.wires.contains(wire)
    }

    fn samplerate(&self) -> Option<f64> {
        self.samplerate
    }

    fn next_sample(&mut self) -> Result<Option<Sample>> {
        Ok(self.samples.pop_front())
    }
}

/// Source that blocks on a crossbeam channel
///
/// The stream ends when every producer has dropped its sender.
pub struct ChannelSource {
    wires: WireSet,
    samplerate: Option<f64>,
    receiver: CrossbeamReceiver<Sample>,
}

impl ChannelSource {
    /// Wrap an existing receiver
    pub fn new(wires: WireSet, receiver: CrossbeamReceiver<Sample>) -> Self {
        Self {
            wires,
            samplerate: None,
            receiver,
        }
    }

    /// Create a bounded channel and the source reading from it
    pub fn bounded(wires: WireSet, buffer_size: usize) -> (CrossbeamSender<Sample>, Self) {
        let (tx, rx) = bounded(buffer_size);
        (tx, Self::new(wires, rx))
    }

    /// With sample rate metadata
    pub fn with_samplerate(mut self, samplerate: f64) -> Self {
        self.samplerate = Some(samplerate);
        self
    }
}

impl SampleSource for ChannelSource {
    fn has_wire(&self, wire: Wire) -> bool {
        self.wires.contains(wire)
    }

    fn samplerate(&self) -> Option<f64> {
        self.samplerate
    }

    fn next_sample(&mut self) -> Result<Option<Sample>> {
        match self.receiver.recv() {
            Ok(sample) => Ok(Some(sample)),
            Err(_) => {
                tracing::debug!("ChannelSource::next_sample() - channel disconnected, end of stream");
                Ok(None)
            }
        }
    }
}

/// A falling TCK edge with the coincident levels of the other wires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockEdge {
    /// Position of the sample where TCK went low
    pub position: u64,
    pub tdi: bool,
    pub tdo: bool,
    pub tms: bool,
}

/// Lazy iterator over the falling TCK edges of a source
///
/// The first sample only establishes the initial TCK level; an edge needs a
/// high-to-low transition between two consecutive samples.
pub struct FallingEdges<'a, S: ?Sized> {
    source: &'a mut S,
    prev_tck: Option<bool>,
    exhausted: bool,
}

impl<'a, S: SampleSource + ?Sized> FallingEdges<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self {
            source,
            prev_tck: None,
            exhausted: false,
        }
    }
}

impl<S: SampleSource + ?Sized> Iterator for FallingEdges<'_, S> {
    type Item = Result<ClockEdge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        loop {
            let sample = match self.source.next_sample() {
                Ok(Some(sample)) => sample,
                Ok(None) => {
                    self.exhausted = true;
                    return None;
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            };

            let tck = sample.level(Wire::Tck);
            let was_high = self.prev_tck.replace(tck) == Some(true);
            if was_high && !tck {
                trace!("TCK falling edge at {}", sample.position);
                return Some(Ok(ClockEdge {
                    position: sample.position,
                    tdi: sample.level(Wire::Tdi),
                    tdo: sample.level(Wire::Tdo),
                    tms: sample.level(Wire::Tms),
                }));
            }
        }
    }
}
