use crate::archive::{decompress_archive, inspect};
use crate::config::LayoutConfig;
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use ddpack_codec::{
    compress_file, decompress_file, interleave, read_binary_file, write_binary_file, BlockLayout,
    EncoderConfig, IdWidth, LookupStrategy, SensorStream,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ddpack")]
#[command(about = "Deduplicating archiver for fixed-layout sensor sample streams", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compress a block stream into one or more segment files
    #[command(group(ArgGroup::new("layout").required(true).args(["fields", "uniform_width", "config"])))]
    Compress {
        input: PathBuf,
        output: PathBuf,
        /// Field widths of one block, e.g. 2,2,2,4
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<u32>>,
        /// Deviation byte offsets; the low half of every field if omitted
        #[arg(long, value_delimiter = ',', requires = "fields")]
        dev_positions: Option<Vec<u32>>,
        /// Sample width of a single-sensor stream (1, 2, 4 or 8)
        #[arg(long, requires = "samples")]
        uniform_width: Option<u32>,
        /// Samples per block for a single-sensor stream
        #[arg(long, requires = "uniform_width")]
        samples: Option<u32>,
        /// Layout file (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Bytes per block id: 1, 2 or 4
        #[arg(long, value_parser = parse_id_width)]
        id_width: Option<IdWidth>,
        /// Dictionary lookup: linear or fingerprint
        #[arg(long, value_parser = parse_lookup)]
        lookup: Option<LookupStrategy>,
    },
    /// Decompress a single segment file (format detected from its magic)
    Decompress { input: PathBuf, output: PathBuf },
    /// Decompress every segment of an archive into one file
    DecompressArchive { base: PathBuf, output: PathBuf },
    /// Print the segment headers of an archive as JSON
    Inspect { base: PathBuf },
    /// Interleave raw single-sensor files into one block stream
    Pack {
        /// Input stream as PATH:SAMPLE_WIDTH, repeatable
        #[arg(long = "stream", required = true)]
        streams: Vec<String>,
        /// Per-block stream order, e.g. 0,1,2,3,2,3
        #[arg(long, value_delimiter = ',', required = true)]
        slots: Vec<usize>,
        output: PathBuf,
    },
}

fn parse_id_width(s: &str) -> Result<IdWidth, String> {
    s.parse::<u8>()
        .ok()
        .and_then(IdWidth::from_bytes)
        .ok_or_else(|| format!("id width must be 1, 2 or 4, got {}", s))
}

fn parse_lookup(s: &str) -> Result<LookupStrategy, String> {
    match s.to_lowercase().as_str() {
        "linear" => Ok(LookupStrategy::Linear),
        "fingerprint" => Ok(LookupStrategy::Fingerprint),
        _ => Err(format!("lookup must be linear or fingerprint, got {}", s)),
    }
}

/// Split `PATH:WIDTH` at the last colon.
fn parse_stream_spec(spec: &str) -> Result<(PathBuf, u32)> {
    let (path, width) = spec
        .rsplit_once(':')
        .with_context(|| format!("stream {} is not PATH:WIDTH", spec))?;
    let width = width
        .parse::<u32>()
        .with_context(|| format!("invalid sample width in stream {}", spec))?;
    Ok((PathBuf::from(path), width))
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Compress {
                input,
                output,
                fields,
                dev_positions,
                uniform_width,
                samples,
                config,
                id_width,
                lookup,
            } => {
                let (layout, mut encoder) = match (fields, uniform_width.zip(samples), config) {
                    (Some(fields), _, _) => {
                        let config = LayoutConfig::new(fields, dev_positions);
                        (config.layout()?, config.encoder_config())
                    }
                    (None, Some((width, samples)), _) => {
                        (BlockLayout::uniform(width, samples)?, EncoderConfig::default())
                    }
                    (None, None, Some(path)) => {
                        let config = LayoutConfig::from_file(&path)
                            .with_context(|| format!("loading layout {}", path.display()))?;
                        (config.layout()?, config.encoder_config())
                    }
                    (None, None, None) => anyhow::bail!("No block layout given"),
                };
                if let Some(id_width) = id_width {
                    encoder.id_width = id_width;
                }
                if let Some(lookup) = lookup {
                    encoder.lookup = lookup;
                }
                compress(input, output, layout, encoder)
            }
            Command::Decompress { input, output } => {
                let stats = decompress_file(&input, &output)?;
                println!(
                    "Decompressed {:?}: {} blocks, dict_size={}, {} bytes -> {}",
                    stats.variant,
                    stats.blocks,
                    stats.dict_size,
                    stats.output_bytes,
                    output.display()
                );
                Ok(())
            }
            Command::DecompressArchive { base, output } => {
                let stats = decompress_archive(&base, &output)?;
                println!(
                    "Decompressed {} segments: {} blocks, {} bytes -> {}",
                    stats.segments,
                    stats.blocks,
                    stats.output_bytes,
                    output.display()
                );
                Ok(())
            }
            Command::Inspect { base } => {
                let summaries = inspect(&base)?;
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                Ok(())
            }
            Command::Pack {
                streams,
                slots,
                output,
            } => pack(&streams, &slots, output),
        }
    }
}

fn compress(
    input: PathBuf,
    output: PathBuf,
    layout: BlockLayout,
    encoder: EncoderConfig,
) -> Result<()> {
    let stats = compress_file(&input, &output, &layout, &encoder)?;
    println!(
        "Compressed {} blocks of {} bytes into {} segment(s): dict entries={}, {} -> {} bytes",
        stats.blocks,
        layout.block_bytes(),
        stats.segments,
        stats.distinct_blocks,
        stats.used_bytes,
        stats.output_bytes
    );
    if stats.discarded_bytes > 0 {
        println!(
            "Ignored last {} bytes (not enough to fill a block)",
            stats.discarded_bytes
        );
    }
    Ok(())
}

fn pack(specs: &[String], slots: &[usize], output: PathBuf) -> Result<()> {
    let streams = specs
        .iter()
        .map(|spec| {
            let (path, sample_width) = parse_stream_spec(spec)?;
            let data = read_binary_file(&path)?;
            Ok(SensorStream { sample_width, data })
        })
        .collect::<Result<Vec<_>>>()?;

    let packed = interleave(&streams, slots)?;
    write_binary_file(&output, &packed.data)?;

    let fields: Vec<String> = packed.field_sizes.iter().map(|w| w.to_string()).collect();
    println!(
        "Packed {} blocks into {} (fields: {})",
        packed.blocks,
        output.display(),
        fields.join(",")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compress_with_fields() {
        let cli = Cli::try_parse_from([
            "ddpack", "compress", "in.bin", "out.ddp", "--fields", "2,2,2,4", "--dev-positions",
            "0,2,4", "--id-width", "2",
        ])
        .unwrap();
        match cli.command {
            Command::Compress {
                fields,
                dev_positions,
                id_width,
                ..
            } => {
                assert_eq!(fields, Some(vec![2, 2, 2, 4]));
                assert_eq!(dev_positions, Some(vec![0, 2, 4]));
                assert_eq!(id_width, Some(IdWidth::Two));
            }
            _ => panic!("expected compress"),
        }
    }

    #[test]
    fn compress_requires_a_layout() {
        assert!(Cli::try_parse_from(["ddpack", "compress", "in.bin", "out.ddp"]).is_err());
    }

    #[test]
    fn layouts_are_mutually_exclusive() {
        assert!(Cli::try_parse_from([
            "ddpack", "compress", "in", "out", "--fields", "2", "--uniform-width", "2",
            "--samples", "4",
        ])
        .is_err());
    }

    #[test]
    fn rejects_bad_id_width() {
        assert!(Cli::try_parse_from([
            "ddpack", "compress", "in", "out", "--fields", "2", "--id-width", "3",
        ])
        .is_err());
    }

    #[test]
    fn parses_pack() {
        let cli = Cli::try_parse_from([
            "ddpack", "pack", "--stream", "t.bin:2", "--stream", "p.bin:4", "--slots", "0,1,0",
            "combined.bin",
        ])
        .unwrap();
        match cli.command {
            Command::Pack { streams, slots, .. } => {
                assert_eq!(streams, vec!["t.bin:2", "p.bin:4"]);
                assert_eq!(slots, vec![0, 1, 0]);
            }
            _ => panic!("expected pack"),
        }
    }

    #[test]
    fn stream_spec_splits_on_last_colon() {
        let (path, width) = parse_stream_spec("C:/data/t.bin:2").unwrap();
        assert_eq!(path, PathBuf::from("C:/data/t.bin"));
        assert_eq!(width, 2);
        assert!(parse_stream_spec("t.bin").is_err());
        assert!(parse_stream_spec("t.bin:x").is_err());
    }
}
