//! DSL file source
//!
//! Provides `DslCapture` - a [`SampleSource`] that reads DSLogic .dsl capture files
//! and yields run-length encoded samples for the probes mapped to ICP wires.
//!
//! A .dsl file is a ZIP archive holding a textual `header` and one entry per
//! probe and block (`L-<probe>/<block>`) with LSB-first packed bits. Blocks are
//! loaded on demand, one block number at a time for every mapped probe, and
//! walked in lockstep.

use crate::runtime::sample::{Sample, SampleBlock, Wire, WireSet};
use crate::runtime::source::SampleSource;
use crate::{IcpError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use zip::ZipArchive;

/// Header information from a DSL file
#[derive(Debug, Clone)]
pub struct DslHeader {
    /// Total number of probes/channels
    pub total_probes: usize,
    /// Sample rate as a string (e.g., "50 MHz")
    pub samplerate: String,
    /// Sample rate in Hz
    pub samplerate_hz: f64,
    /// Sample period in seconds (1 / sample_rate)
    pub sample_period: f64,
    /// Total number of samples captured
    pub total_samples: u64,
    /// Total number of data blocks
    pub total_blocks: u64,
    /// Samples per block (calculated)
    pub samples_per_block: u64,
    /// Probe names indexed by probe number (0-based)
    pub probe_names: Vec<String>,
}

/// Assignment of ICP wires to capture probes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeMap {
    probes: [Option<usize>; 4],
}

impl ProbeMap {
    /// Map with no wires assigned
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `wire` to probe number `probe`
    pub fn with(mut self, wire: Wire, probe: usize) -> Self {
        self.probes[wire.index()] = Some(probe);
        self
    }

    /// Assign `wire` if a probe is given
    pub fn with_optional(self, wire: Wire, probe: Option<usize>) -> Self {
        match probe {
            Some(probe) => self.with(wire, probe),
            None => self,
        }
    }

    pub fn probe(&self, wire: Wire) -> Option<usize> {
        self.probes[wire.index()]
    }

    /// Wires with an assigned probe
    pub fn wires(&self) -> WireSet {
        Wire::ALL
            .into_iter()
            .filter(|&wire| self.probe(wire).is_some())
            .collect()
    }
}

/// Sample source reading a DSLogic .dsl capture file
///
/// Yields a [`Sample`] at position 0 and then only where one of the mapped
/// probes changes level.
///
/// # Example
/// ```ignore
/// let probes = ProbeMap::new().with(Wire::Tck, 0).with(Wire::Tdi, 1);
/// let capture = DslCapture::open("capture.dsl", probes)?;
/// ```
pub struct DslCapture<R = File> {
    name: String,
    archive: ZipArchive<R>,
    header: DslHeader,
    probes: ProbeMap,

    // Configuration
    max_samples: Option<u64>,

    // Walk state
    position: u64,
    current_block: Option<u64>,
    blocks: [Option<SampleBlock>; 4],
    last_levels: Option<WireSet>,
    samples_sent: u64,
    finished: bool,
}

impl DslCapture<File> {
    /// Open a capture file
    pub fn open<P: AsRef<Path>>(path: P, probes: ProbeMap) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, probes)
    }
}

impl<R: Read + Seek> DslCapture<R> {
    /// Read a capture from any seekable reader
    pub fn from_reader(reader: R, probes: ProbeMap) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let header = Self::parse_header(&mut archive)?;

        for wire in Wire::ALL {
            if let Some(probe) = probes.probe(wire)
                && probe >= header.total_probes
            {
                return Err(IcpError::InvalidProbe(probe));
            }
        }

        info!(
            "Capture: {} samples at {:.1} MHz, {} probes, {} blocks",
            header.total_samples,
            header.samplerate_hz / 1_000_000.0,
            header.total_probes,
            header.total_blocks
        );

        Ok(Self {
            name: "dsl_capture".to_string(),
            archive,
            header,
            probes,
            max_samples: None,
            position: 0,
            current_block: None,
            blocks: Default::default(),
            last_levels: None,
            samples_sent: 0,
            finished: false,
        })
    }

    fn parse_header(archive: &mut ZipArchive<R>) -> Result<DslHeader> {
        let mut header_file = archive
            .by_name("header")
            .map_err(|e| IcpError::ParseHeader(format!("Cannot find header file: {}", e)))?;

        let mut header_content = String::new();
        header_file.read_to_string(&mut header_content)?;
        drop(header_file); // Explicitly drop to release archive borrow

        let mut total_probes: Option<usize> = None;
        let mut samplerate: Option<String> = None;
        let mut total_samples: Option<u64> = None;
        let mut total_blocks: Option<u64> = None;
        let mut probe_names_map: HashMap<usize, String> = HashMap::new();

        for line in header_content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(value) = line.strip_prefix("total probes = ") {
                total_probes = value.parse().ok();
            } else if let Some(value) = line.strip_prefix("samplerate = ") {
                samplerate = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("total samples = ") {
                total_samples = value.parse().ok();
            } else if let Some(value) = line.strip_prefix("total blocks = ") {
                total_blocks = value.parse().ok();
            } else if line.starts_with("probe")
                && let Some((probe_part, name)) = line.split_once(" = ")
                && let Some(num_str) = probe_part.strip_prefix("probe")
                && let Ok(probe_num) = num_str.parse::<usize>()
            {
                probe_names_map.insert(probe_num, name.to_string());
            }
        }

        let total_probes =
            total_probes.ok_or_else(|| IcpError::MissingField("total probes".to_string()))?;
        let samplerate =
            samplerate.ok_or_else(|| IcpError::MissingField("samplerate".to_string()))?;
        let total_samples =
            total_samples.ok_or_else(|| IcpError::MissingField("total samples".to_string()))?;
        let total_blocks =
            total_blocks.ok_or_else(|| IcpError::MissingField("total blocks".to_string()))?;

        let samplerate_hz = parse_sample_rate(&samplerate)
            .ok_or_else(|| IcpError::ParseHeader(format!("Invalid sample rate: {}", samplerate)))?;
        let sample_period = 1.0 / samplerate_hz;

        // Blocks are fixed-size except the last, so the first one gives the block size
        let samples_per_block = {
            let mut file = archive
                .by_name("L-0/0")
                .map_err(|_| IcpError::ParseHeader("Could not read first block".to_string()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).map_err(|_| {
                IcpError::ParseHeader("Could not read first block data".to_string())
            })?;
            (buf.len() * 8) as u64
        };
        if samples_per_block == 0 && total_samples > 0 {
            return Err(IcpError::ParseHeader("First block is empty".to_string()));
        }

        debug!(
            "File has {} samples across {} blocks ({} samples/block standard size)",
            total_samples, total_blocks, samples_per_block
        );

        let probe_names = (0..total_probes)
            .map(|i| {
                probe_names_map
                    .get(&i)
                    .cloned()
                    .unwrap_or_else(|| format!("Probe{}", i))
            })
            .collect();

        Ok(DslHeader {
            total_probes,
            samplerate,
            samplerate_hz,
            sample_period,
            total_samples,
            total_blocks,
            samples_per_block,
            probe_names,
        })
    }

    /// Get the header information
    pub fn header(&self) -> &DslHeader {
        &self.header
    }

    /// Probe assignment of this capture
    pub fn probes(&self) -> ProbeMap {
        self.probes
    }

    /// Get the total capture duration in seconds
    pub fn capture_duration(&self) -> f64 {
        self.header.total_samples as f64 * self.header.sample_period
    }

    /// Set custom name (builder pattern)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set maximum number of samples to read from file
    pub fn with_max_samples(mut self, max_samples: Option<u64>) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Number of samples that will be walked
    fn sample_limit(&self) -> u64 {
        self.max_samples
            .unwrap_or(self.header.total_samples)
            .min(self.header.total_samples)
    }

    fn read_block(&mut self, probe: usize, block_num: u64) -> Result<Arc<[u8]>> {
        let block_name = format!("L-{}/{}", probe, block_num);
        let mut file = self
            .archive
            .by_name(&block_name)
            .map_err(|_| IcpError::InvalidBlock(block_num))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Arc::from(data))
    }

    /// Load block `block_num` of every mapped probe
    fn load_blocks(&mut self, block_num: u64) -> Result<()> {
        if block_num >= self.header.total_blocks {
            return Err(IcpError::InvalidBlock(block_num));
        }

        let start_position = block_num * self.header.samples_per_block;
        let num_samples = self
            .header
            .samples_per_block
            .min(self.sample_limit() - start_position) as usize;

        for wire in Wire::ALL {
            let block = match self.probes.probe(wire) {
                Some(probe) => Some(SampleBlock::new(
                    self.read_block(probe, block_num)?,
                    start_position,
                    num_samples,
                )),
                None => None,
            };
            self.blocks[wire.index()] = block;
        }
        self.current_block = Some(block_num);

        debug!(
            "[{}] Loaded block {} ({} samples from {})",
            self.name, block_num, num_samples, start_position
        );
        Ok(())
    }

    fn levels_at(&self, position: u64) -> WireSet {
        Wire::ALL
            .into_iter()
            .filter(|wire| {
                self.blocks[wire.index()]
                    .as_ref()
                    .is_some_and(|block| block.get_bit(position))
            })
            .collect()
    }
}

impl<R: Read + Seek> SampleSource for DslCapture<R> {
    fn has_wire(&self, wire: Wire) -> bool {
        self.probes.probe(wire).is_some()
    }

    fn samplerate(&self) -> Option<f64> {
        Some(self.header.samplerate_hz)
    }

    fn next_sample(&mut self) -> Result<Option<Sample>> {
        let limit = self.sample_limit();

        while self.position < limit {
            let position = self.position;
            let block_num = position / self.header.samples_per_block;
            if self.current_block != Some(block_num) {
                self.load_blocks(block_num)?;
            }

            let levels = self.levels_at(position);
            self.position += 1;

            if self.last_levels != Some(levels) {
                self.last_levels = Some(levels);
                self.samples_sent += 1;
                return Ok(Some(Sample::new(levels, position)));
            }
        }

        if !self.finished {
            self.finished = true;
            info!(
                "[{}] Capture complete: {} samples, {} level changes sent",
                self.name, self.position, self.samples_sent
            );
        }
        Ok(None)
    }
}

/// Parse a sample rate string (e.g., "50 MHz") into Hz
fn parse_sample_rate(samplerate: &str) -> Option<f64> {
    let parts: Vec<&str> = samplerate.split_whitespace().collect();
    if parts.len() >= 2
        && let Ok(value) = parts[0].parse::<f64>()
    {
        let multiplier = match parts[1] {
            "GHz" => 1_000_000_000.0,
            "MHz" => 1_000_000.0,
            "KHz" | "kHz" => 1_000.0,
            "Hz" => 1.0,
            _ => return None,
        };
        return Some(value * multiplier);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::decoders::{Annotation, AnnotationClass, IcpDecoder};
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    /// Build a .dsl archive in memory. `probes[i][n]` is probe i at position n.
    fn build_capture(samplerate: &str, probes: &[Vec<bool>], block_size: usize) -> Vec<u8> {
        let total = probes.first().map_or(0, Vec::len);
        let total_blocks = total.div_ceil(block_size);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        writer.start_file("header", options).unwrap();
        writeln!(writer, "[version]\nversion = 2\n\n[header]").unwrap();
        writeln!(writer, "driver = DSLogic U3Pro16").unwrap();
        writeln!(writer, "samplerate = {}", samplerate).unwrap();
        writeln!(writer, "total samples = {}", total).unwrap();
        writeln!(writer, "total probes = {}", probes.len()).unwrap();
        writeln!(writer, "total blocks = {}", total_blocks).unwrap();
        for i in 0..probes.len() {
            writeln!(writer, "probe{} = {}", i, ["TCK", "TDI", "TDO", "TMS"][i % 4]).unwrap();
        }

        for (probe, bits) in probes.iter().enumerate() {
            for (block, chunk) in bits.chunks(block_size).enumerate() {
                let mut bytes = vec![0u8; chunk.len().div_ceil(8)];
                for (i, &bit) in chunk.iter().enumerate() {
                    if bit {
                        bytes[i / 8] |= 1 << (i % 8);
                    }
                }
                writer
                    .start_file(format!("L-{}/{}", probe, block), options)
                    .unwrap();
                writer.write_all(&bytes).unwrap();
            }
        }

        writer.finish().unwrap().into_inner()
    }

    /// TCK/TDI/TDO probe traces for 9-clock bytes, two samples per clock
    fn icp_traces(bytes: &[(u8, u8)]) -> Vec<Vec<bool>> {
        let mut tck = vec![false];
        let mut tdi = vec![false];
        let mut tdo = vec![false];
        for &(din, dout) in bytes {
            for bit in 0..9u8 {
                let (i, o) = if bit < 8 {
                    ((din >> (7 - bit)) & 1 == 1, (dout >> bit) & 1 == 1)
                } else {
                    (false, false)
                };
                tck.extend([true, false]);
                tdi.extend([i, i]);
                tdo.extend([o, o]);
            }
        }
        vec![tck, tdi, tdo]
    }

    fn icp_probes() -> ProbeMap {
        ProbeMap::new()
            .with(Wire::Tck, 0)
            .with(Wire::Tdi, 1)
            .with(Wire::Tdo, 2)
    }

    #[test]
    fn test_parse_sample_rate_valid() {
        assert_eq!(parse_sample_rate("50 MHz"), Some(50_000_000.0));
        assert_eq!(parse_sample_rate("1 GHz"), Some(1_000_000_000.0));
        assert_eq!(parse_sample_rate("100 kHz"), Some(100_000.0));
        assert_eq!(parse_sample_rate("100 KHz"), Some(100_000.0));
        assert_eq!(parse_sample_rate("1000 Hz"), Some(1000.0));
        assert_eq!(parse_sample_rate("2.5 MHz"), Some(2_500_000.0));
    }

    #[test]
    fn test_parse_sample_rate_invalid() {
        assert_eq!(parse_sample_rate("invalid"), None);
        assert_eq!(parse_sample_rate("50"), None);
        assert_eq!(parse_sample_rate("MHz 50"), None);
        assert_eq!(parse_sample_rate("50 mhz"), None);
        assert_eq!(parse_sample_rate(""), None);
        assert_eq!(parse_sample_rate("abc MHz"), None);
    }

    #[test]
    fn test_probe_map() {
        let map = ProbeMap::new()
            .with(Wire::Tck, 3)
            .with_optional(Wire::Tdo, None)
            .with_optional(Wire::Tms, Some(7));
        assert_eq!(map.probe(Wire::Tck), Some(3));
        assert_eq!(map.probe(Wire::Tdi), None);
        assert_eq!(map.probe(Wire::Tdo), None);
        assert_eq!(map.probe(Wire::Tms), Some(7));
        assert_eq!(map.wires(), WireSet::empty().with(Wire::Tck).with(Wire::Tms));
    }

    #[test]
    fn test_header_fields() {
        let data = build_capture("24 MHz", &icp_traces(&[(0x49, 0)]), 16);
        let capture = DslCapture::from_reader(Cursor::new(data), icp_probes()).unwrap();
        let header = capture.header();

        assert_eq!(header.total_probes, 3);
        assert_eq!(header.total_samples, 19);
        assert_eq!(header.total_blocks, 2);
        assert_eq!(header.samples_per_block, 16);
        assert_eq!(header.samplerate, "24 MHz");
        assert_eq!(header.samplerate_hz, 24_000_000.0);
        assert_eq!(header.probe_names, vec!["TCK", "TDI", "TDO"]);
        assert!((capture.capture_duration() - 19.0 / 24_000_000.0).abs() < 1e-12);
        assert_eq!(capture.samplerate(), Some(24_000_000.0));
    }

    #[test]
    fn test_capabilities_follow_probe_map() {
        let data = build_capture("1 MHz", &icp_traces(&[]), 8);
        let probes = ProbeMap::new().with(Wire::Tck, 0).with(Wire::Tdi, 1);
        let capture = DslCapture::from_reader(Cursor::new(data), probes).unwrap();
        assert!(capture.has_wire(Wire::Tck));
        assert!(capture.has_wire(Wire::Tdi));
        assert!(!capture.has_wire(Wire::Tdo));
        assert!(!capture.has_wire(Wire::Tms));
    }

    #[test]
    fn test_invalid_probe() {
        let data = build_capture("1 MHz", &icp_traces(&[(1, 0)]), 8);
        let probes = icp_probes().with(Wire::Tms, 5);
        let result = DslCapture::from_reader(Cursor::new(data), probes);
        assert!(matches!(result, Err(IcpError::InvalidProbe(5))));
    }

    #[test]
    fn test_missing_header_field() {
        let options = SimpleFileOptions::default();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("header", options).unwrap();
        writeln!(writer, "samplerate = 1 MHz\ntotal probes = 1\ntotal blocks = 1").unwrap();
        writer.start_file("L-0/0", options).unwrap();
        writer.write_all(&[0u8]).unwrap();
        let data = writer.finish().unwrap().into_inner();

        let result = DslCapture::from_reader(Cursor::new(data), ProbeMap::new());
        match result {
            Err(IcpError::MissingField(field)) => assert_eq!(field, "total samples"),
            Err(e) => panic!("Expected MissingField error, got {:?}", e),
            Ok(_) => panic!("Expected MissingField error"),
        }
    }

    #[test]
    fn test_not_a_zip() {
        let result = DslCapture::from_reader(Cursor::new(b"not a capture".to_vec()), icp_probes());
        assert!(matches!(result, Err(IcpError::Zip(_))));
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icp.dsl");
        std::fs::write(&path, build_capture("10 MHz", &icp_traces(&[(0x42, 0)]), 16)).unwrap();

        let capture = DslCapture::open(&path, icp_probes()).unwrap().with_name("file");
        assert_eq!(capture.name(), "file");
        assert_eq!(capture.probes(), icp_probes());

        let result = DslCapture::open(dir.path().join("missing.dsl"), icp_probes());
        assert!(matches!(result, Err(IcpError::Io(_))));
    }

    #[test]
    fn test_samples_only_on_change() {
        // TCK 0 0 1 1 1 0 0 0, TDI constant
        let tck = vec![false, false, true, true, true, false, false, false];
        let data = build_capture("1 MHz", &[tck, vec![true; 8]], 8);
        let probes = ProbeMap::new().with(Wire::Tck, 0).with(Wire::Tdi, 1);
        let mut capture = DslCapture::from_reader(Cursor::new(data), probes).unwrap();

        let mut samples = Vec::new();
        while let Some(sample) = capture.next_sample().unwrap() {
            samples.push(sample);
        }
        let tdi = WireSet::empty().with(Wire::Tdi);
        assert_eq!(
            samples,
            vec![
                Sample::new(tdi, 0),
                Sample::new(tdi.with(Wire::Tck), 2),
                Sample::new(tdi, 5),
            ]
        );
        assert!(capture.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_walk_crosses_blocks() {
        // Toggle every sample across 3 blocks of 8
        let tck: Vec<bool> = (0..24).map(|i| i % 2 == 1).collect();
        let data = build_capture("1 MHz", &[tck, vec![false; 24]], 8);
        let probes = ProbeMap::new().with(Wire::Tck, 0).with(Wire::Tdi, 1);
        let mut capture = DslCapture::from_reader(Cursor::new(data), probes).unwrap();

        let mut positions = Vec::new();
        while let Some(sample) = capture.next_sample().unwrap() {
            positions.push(sample.position);
        }
        assert_eq!(positions, (0..24).collect::<Vec<u64>>());
    }

    #[test]
    fn test_max_samples_limits_walk() {
        let tck: Vec<bool> = (0..24).map(|i| i % 2 == 1).collect();
        let data = build_capture("1 MHz", &[tck, vec![false; 24]], 8);
        let probes = ProbeMap::new().with(Wire::Tck, 0).with(Wire::Tdi, 1);
        let mut capture = DslCapture::from_reader(Cursor::new(data), probes)
            .unwrap()
            .with_max_samples(Some(10));

        let mut count = 0;
        while capture.next_sample().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 10);
    }

    #[test]
    fn test_decode_capture_end_to_end() {
        let bytes = [(0x49, 0x00), (0x44, 0x5A), (0x12, 0xC3)];
        let data = build_capture("24 MHz", &icp_traces(&bytes), 16);
        let mut capture = DslCapture::from_reader(Cursor::new(data), icp_probes()).unwrap();

        let mut decoder = IcpDecoder::new();
        let mut out: Vec<Annotation> = Vec::new();
        assert_eq!(decoder.decode(&mut capture, &mut out).unwrap(), 3);
        assert_eq!(decoder.samplerate(), Some(24_000_000.0));

        let texts: Vec<(AnnotationClass, &str)> = out.iter().map(|a| (a.class, a.text())).collect();
        assert_eq!(
            texts,
            vec![
                (AnnotationClass::TdiData, "@49"),
                (AnnotationClass::TdiCommand, "PING (0x49)"),
                (AnnotationClass::TdoData, "@00"),
                (AnnotationClass::Sync, "SYNC"),
                (AnnotationClass::TdiData, "@44"),
                (AnnotationClass::TdiCommand, "READ_FLASH (0x44)"),
                (AnnotationClass::TdoData, "@5A"),
                (AnnotationClass::Sync, "SYNC"),
                (AnnotationClass::TdiData, "@12"),
                (AnnotationClass::TdoData, "@C3"),
                (AnnotationClass::Sync, "SYNC"),
            ]
        );
        assert_eq!((out[0].start, out[0].end), (2, 18));
    }
}
