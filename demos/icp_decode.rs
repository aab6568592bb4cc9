//! Example: SinoWealth ICP decoding
//!
//! Decodes ICP traffic from a DSL file and prints the annotations.
//!
//! Usage:
//!   cargo run --release --example icp_decode -- \
//!       --file flash.dsl \
//!       --tck 0 --tdi 1 --tdo 2 \
//!       -n 100
//!
//! With CSV output:
//!   cargo run --release --example icp_decode -- \
//!       --file flash.dsl \
//!       --tck 0 --tdi 1 \
//!       --csv-output output.csv

use clap::Parser;
use crossbeam_channel::Receiver;
use icp::{Annotation, AnnotationClass, ChannelSink, DslCapture, IcpDecoder, IcpError, ProbeMap, Wire};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to DSL file
    #[arg(short, long)]
    file: String,

    /// TCK (clock) probe
    #[arg(long)]
    tck: usize,

    /// TDI (data to target) probe
    #[arg(long)]
    tdi: usize,

    /// TDO (data from target) probe
    #[arg(long)]
    tdo: Option<usize>,

    /// TMS (mode select) probe
    #[arg(long)]
    tms: Option<usize>,

    /// Number of bytes to print (0 = unlimited)
    #[arg(short, long, default_value = "100")]
    n: usize,

    /// Only decode the first N samples of the capture
    #[arg(long)]
    max_samples: Option<u64>,

    /// CSV output file path (optional)
    #[arg(long)]
    csv_output: Option<String>,
}

/// Consumes annotations until `max_bytes` sync markers were seen.
///
/// Dropping the receiver on return stops the decoder at its next annotation.
fn print_annotations(
    rx: Receiver<Annotation>,
    max_bytes: usize,
    mut csv: Option<BufWriter<File>>,
) -> std::io::Result<usize> {
    if let Some(writer) = csv.as_mut() {
        writeln!(writer, "Id,Start,End,Class,Text")?;
    }

    let mut bytes = 0usize;
    let mut line = String::new();

    for (id, annotation) in rx.iter().enumerate() {
        if let Some(writer) = csv.as_mut() {
            writeln!(
                writer,
                "{},{},{},{},{}",
                id,
                annotation.start,
                annotation.end,
                annotation.class,
                annotation.text()
            )?;
        }

        match annotation.class {
            AnnotationClass::Sync => {
                bytes += 1;
                info!("#{} @{}: {}", bytes, annotation.end, line.trim_end());
                line.clear();
                if max_bytes > 0 && bytes >= max_bytes {
                    info!("Max bytes ({}) reached, stopping", max_bytes);
                    break;
                }
            }
            AnnotationClass::Warning => warn!("{}", annotation.text()),
            AnnotationClass::TdiData => line.push_str(&format!("TDI={} ", &annotation.text()[1..])),
            AnnotationClass::TdoData => line.push_str(&format!("TDO={} ", &annotation.text()[1..])),
            AnnotationClass::TdiCommand => line.push_str(&format!("[{}] ", annotation.texts[1])),
        }
    }

    if let Some(writer) = csv.as_mut() {
        writer.flush()?;
    }
    Ok(bytes)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("=== ICP Decode Example ===");
    info!("File: {}", args.file);
    info!(
        "ICP: TCK={}, TDI={}, TDO={:?}, TMS={:?}",
        args.tck, args.tdi, args.tdo, args.tms
    );

    let probes = ProbeMap::new()
        .with(Wire::Tck, args.tck)
        .with(Wire::Tdi, args.tdi)
        .with_optional(Wire::Tdo, args.tdo)
        .with_optional(Wire::Tms, args.tms);

    let mut capture = DslCapture::open(&args.file, probes)?.with_max_samples(args.max_samples);

    let csv = match &args.csv_output {
        Some(path) => {
            info!("CSV output: {}", path);
            Some(BufWriter::new(File::create(path)?))
        }
        None => None,
    };

    let (mut sink, rx) = ChannelSink::channel(Some(10_000));
    let max_bytes = args.n;
    let printer = thread::Builder::new()
        .name("icp_printer".to_string())
        .spawn(move || print_annotations(rx, max_bytes, csv))?;

    let mut decoder = IcpDecoder::new();
    match decoder.decode(&mut capture, &mut sink) {
        Ok(bytes) => info!("Decoder finished: {} bytes", bytes),
        Err(IcpError::SinkClosed) => info!("Printer stopped after {} bytes", decoder.frame_count()),
        Err(e) => return Err(e.into()),
    }
    drop(sink);

    match printer.join() {
        Ok(result) => {
            let printed = result?;
            info!("Printed {} bytes", printed);
        }
        Err(_) => warn!("Printer thread panicked"),
    }

    info!("Done!");

    Ok(())
}
