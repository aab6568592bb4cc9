//! Core data types for signal processing

use std::fmt;
use std::sync::Arc;

/// Signal roles of the ICP interface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wire {
    /// Test clock, bits are sampled on its falling edge
    Tck,
    /// Test data in (programmer to target)
    Tdi,
    /// Test data out (target to programmer), optional
    Tdo,
    /// Test mode select, optional
    Tms,
}

impl Wire {
    pub const ALL: [Wire; 4] = [Wire::Tck, Wire::Tdi, Wire::Tdo, Wire::Tms];

    /// Position of this wire in [`Wire::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    fn mask(self) -> u8 {
        1 << (self as u8)
    }

    /// Short signal name as printed on programming headers
    pub fn name(self) -> &'static str {
        match self {
            Wire::Tck => "TCK",
            Wire::Tdi => "TDI",
            Wire::Tdo => "TDO",
            Wire::Tms => "TMS",
        }
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A small set of wires.
///
/// Used both as the capability record of a source (which wires are
/// configured) and as the logic levels carried by a [`Sample`] (which wires
/// are high).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WireSet(u8);

impl WireSet {
    /// The empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Set containing every wire
    pub fn all() -> Self {
        Wire::ALL.into_iter().collect()
    }

    /// Builder: add a wire
    pub fn with(mut self, wire: Wire) -> Self {
        self.insert(wire);
        self
    }

    pub fn insert(&mut self, wire: Wire) {
        self.0 |= wire.mask();
    }

    pub fn set(&mut self, wire: Wire, present: bool) {
        if present {
            self.0 |= wire.mask();
        } else {
            self.0 &= !wire.mask();
        }
    }

    pub fn contains(&self, wire: Wire) -> bool {
        self.0 & wire.mask() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Wire> for WireSet {
    fn from_iter<I: IntoIterator<Item = Wire>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), WireSet::with)
    }
}

/// Sample representing the levels of all wires at a specific position
///
/// This is a run-length encoded representation: a source may send a sample
/// only when some wire changes. The levels remain constant until the next
/// Sample arrives, so a falling TCK edge is always observed at the position
/// of the sample that carries it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    /// Wires at logic high
    pub levels: WireSet,
    /// Sample index where these levels start
    pub position: u64,
}

impl Sample {
    /// Create a new sample
    pub fn new(levels: WireSet, position: u64) -> Self {
        Self { levels, position }
    }

    /// Logic level of one wire
    #[inline]
    pub fn level(&self, wire: Wire) -> bool {
        self.levels.contains(wire)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sample[")?;
        for wire in Wire::ALL {
            write!(f, "{}={} ", wire, u8::from(self.level(wire)))?;
        }
        write!(f, "pos={}]", self.position)
    }
}

/// A block of packed-bit samples from a single probe
///
/// Carries raw packed-bit data directly from DSL file blocks, enabling O(1) bit
/// lookup. All probes in a DSL file share the same block structure, so the
/// blocks of the TCK/TDI/TDO/TMS probes for one block number cover exactly the
/// same positions and can be walked in lockstep.
///
/// ## Bit Packing Format
///
/// LSB-first within each byte: bit N is at `data[N/8] >> (N%8) & 1`.
/// This matches the DSLogic on-disk format.
#[derive(Clone, Debug)]
pub struct SampleBlock {
    /// Packed bit data (LSB-first)
    pub data: Arc<[u8]>,
    /// Position of the first sample in this block (0-based, global sample index)
    pub start_position: u64,
    /// Number of valid samples in this block (may be < capacity for the last block)
    pub num_samples: usize,
}

impl SampleBlock {
    /// Create a new SampleBlock
    pub fn new(data: Arc<[u8]>, start_position: u64, num_samples: usize) -> Self {
        Self {
            data,
            start_position,
            num_samples,
        }
    }

    /// O(1) bit lookup: get the boolean value at a given position within this block.
    ///
    /// `position` is a global sample index. Positions outside the packed data
    /// read as low.
    #[inline]
    pub fn get_bit(&self, position: u64) -> bool {
        let local = (position - self.start_position) as usize;
        let byte_index = local / 8;
        let bit_offset = local % 8;
        self.data
            .get(byte_index)
            .is_some_and(|byte| (byte >> bit_offset) & 1 == 1)
    }

    /// Whether `position` falls inside this block
    #[inline]
    pub fn contains(&self, position: u64) -> bool {
        position >= self.start_position && position < self.end_position()
    }

    /// The position one past the last valid sample in this block
    #[inline]
    pub fn end_position(&self) -> u64 {
        self.start_position + self.num_samples as u64
    }
}

impl fmt::Display for SampleBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SampleBlock[start={}, samples={}, bytes={}]",
            self.start_position,
            self.num_samples,
            self.data.len()
        )
    }
}
