//! Inspect an index document or format descriptor
//!
//! Usage: inspect-index (--json <index> | --caps <descriptor>) [--location <data>] [--report-json]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use datarepo::index::{
    parser::parse_document, FormatDescriptor, IndexDocument, IndexMetadata, ParsedIndex,
};
use datarepo::layout::{OffsetTable, TensorLayout};
use datarepo::{ReaderConfig, RepoReader};

/// Print the resolved layout of a sample repository
#[derive(Parser, Debug)]
#[command(name = "inspect-index")]
#[command(version, about, long_about = None)]
struct Args {
    /// Index document (JSON, or YAML by extension)
    #[arg(short = 'j', long = "json")]
    json: Option<PathBuf>,

    /// Inline format descriptor
    #[arg(long = "caps")]
    caps: Option<String>,

    /// Data file to resolve offsets against
    #[arg(short = 'l', long = "location")]
    location: Option<PathBuf>,

    /// Number of sample offsets to list
    #[arg(short = 'n', long = "samples", default_value_t = 5)]
    samples: u64,

    /// Print a JSON report instead of text
    #[arg(long = "report-json")]
    report_json: bool,
}

#[derive(Serialize)]
struct TensorReport {
    index: usize,
    dimensions: String,
    element_type: &'static str,
    byte_size: Option<u64>,
    offset_in_sample: Option<u64>,
}

#[derive(Serialize)]
struct SpanReport {
    sample: u64,
    offset: u64,
    length: u64,
}

#[derive(Serialize)]
struct IndexReport {
    total_samples: u64,
    tensors_per_sample: u32,
    format: &'static str,
    framerate: String,
    sample_byte_size: Option<u64>,
    tensors: Vec<TensorReport>,
    declared_data_len: Option<u64>,
    spans: Vec<SpanReport>,
}

impl IndexReport {
    fn new(metadata: &IndexMetadata) -> Self {
        let static_layout = metadata
            .sample_byte_size()
            .filter(|_| !metadata.storage_format.needs_sample_lengths())
            .map(|_| TensorLayout::from_metadata(metadata));
        let tensors = metadata
            .tensors
            .iter()
            .enumerate()
            .map(|(index, t)| TensorReport {
                index,
                dimensions: t.dims_string(),
                element_type: t.element_type.as_str(),
                byte_size: t.byte_size(),
                offset_in_sample: static_layout
                    .as_ref()
                    .and_then(|l| l.slot(index))
                    .map(|s| s.offset),
            })
            .collect();
        Self {
            total_samples: metadata.total_samples,
            tensors_per_sample: metadata.tensors_per_sample,
            format: metadata.storage_format.as_str(),
            framerate: metadata.framerate.to_string(),
            sample_byte_size: static_layout.as_ref().map(|l| l.total_size),
            tensors,
            declared_data_len: None,
            spans: Vec::new(),
        }
    }

    fn add_table(&mut self, table: &OffsetTable, samples: u64) -> Result<()> {
        self.total_samples = table.total_samples();
        self.declared_data_len = Some(table.declared_len());
        for sample in 0..samples.min(table.total_samples()) {
            let span = table.resolve(sample)?;
            self.spans.push(SpanReport {
                sample,
                offset: span.offset,
                length: span.length,
            });
        }
        Ok(())
    }

    fn print(&self) {
        println!("Samples:            {}", self.total_samples);
        println!("Tensors per sample: {}", self.tensors_per_sample);
        println!("Format:             {}", self.format);
        println!("Framerate:          {}", self.framerate);
        if let Some(size) = self.sample_byte_size {
            println!("Sample size:        {} bytes", size);
        }
        println!("\n--- Tensors ---");
        for t in &self.tensors {
            let size = t.byte_size.map_or("-".to_string(), |s| s.to_string());
            let offset = t.offset_in_sample.map_or("-".to_string(), |o| o.to_string());
            println!(
                "  [{}] {:<8} dims={:<16} size={:<10} offset={}",
                t.index, t.element_type, t.dimensions, size, offset
            );
        }
        if let Some(len) = self.declared_data_len {
            println!("\n--- Offsets ---");
            println!("Declared data length: {} bytes", len);
            for s in &self.spans {
                println!("  sample {:>6}: offset={} length={}", s.sample, s.offset, s.length);
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let report = match args.location {
        Some(ref location) => {
            let mut config = ReaderConfig::default();
            config.set_location(location);
            config.set_index_path(args.json.clone());
            config.set_descriptor(args.caps.clone());
            let mut reader = RepoReader::new(config);
            reader.open()?;
            let (metadata, table) = match (reader.metadata(), reader.offset_table()) {
                (Some(m), Some(t)) => (m, t),
                _ => anyhow::bail!("reader did not open"),
            };
            let mut report = IndexReport::new(metadata);
            report.add_table(table, args.samples)?;
            report
        }
        None => {
            let metadata = match (&args.json, &args.caps) {
                (Some(path), _) => {
                    let ParsedIndex { metadata, .. } = parse_document(&IndexDocument::load(path)?)?;
                    metadata
                }
                (None, Some(caps)) => {
                    let desc = FormatDescriptor::parse(caps)?;
                    IndexMetadata {
                        total_samples: 0,
                        tensors_per_sample: desc.tensor_count(),
                        tensors: desc.tensors,
                        storage_format: desc.storage_format,
                        framerate: desc.framerate,
                    }
                }
                (None, None) => anyhow::bail!("either --json or --caps must be specified"),
            };
            IndexReport::new(&metadata)
        }
    };

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(())
}
