use std::path::Path;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use fusmerge::config::MergeConfig;
use fusmerge::input::AlignmentStore;
use fusmerge::output::{DedupOutput, OutputCollector};
use fusmerge::report::FusionReport;

#[derive(Parser)]
#[command(name = "fusmerge")]
#[command(
    about = "Collapse near-duplicate gene fusion calls",
    long_about = "Reads a FusionMap fusion report and removes calls that repeat an earlier call: same chromosome pair, same gene pair and a highly similar junction sequence."
)]
struct Cli {
    /// Log verbosity level
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,
    /// Write log output to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,
    /// Append to log file instead of truncating
    #[arg(long, global = true)]
    append_log: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Deduplicate a fusion report
    Merge {
        /// FusionMap report (tab-separated, one header line).
        #[arg(long, required = true)]
        report: String,
        /// BAM/CRAM file with the fusion-supporting reads (optional).
        #[arg(long)]
        bam: Option<String>,
        /// Indexed reference FASTA (optional; also used to decode CRAM).
        #[arg(long)]
        ref_fasta: Option<String>,
        /// Configuration JSON file (merge thresholds).
        #[arg(long)]
        config: Option<String>,
        /// Junction similarity that must be exceeded to merge two calls (overrides config).
        #[arg(long)]
        threshold: Option<f64>,
        /// Prefix for output files. Writes <prefix>.dedup.tsv and <prefix>.dedup.json.
        #[arg(long, required = true)]
        out_prefix: String,
        /// Force overwrite of existing output files.
        #[arg(short, long)]
        force: bool,
    },
    /// List the alignments of a fusion-reads BAM/CRAM
    Reads {
        /// BAM/CRAM file with the fusion-supporting reads.
        #[arg(long, required = true)]
        bam: String,
        /// Reference FASTA (required for reference-compressed CRAM).
        #[arg(long)]
        ref_fasta: Option<String>,
        /// Only print alignments of this read.
        #[arg(long)]
        name: Option<String>,
    },
    /// Print JSON Schema for the dedup output format
    Schema {
        /// Write schema to file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

// Helper to check output paths and create directories
fn check_output_paths(
    prefix: &str,
    suffixes: &[&str],
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(prefix);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }

    if !force {
        for suffix in suffixes {
            let p = format!("{}{}", prefix, suffix);
            if Path::new(&p).exists() {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "Output file {} already exists. Use --force to overwrite.",
                        p
                    ),
                )));
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>, threshold: Option<f64>) -> fusmerge::Result<MergeConfig> {
    let config = match path {
        Some(p) => MergeConfig::load(p)?,
        None => MergeConfig::default(),
    };
    match threshold {
        Some(t) => config.with_min_similarity(t),
        None => Ok(config),
    }
}

fn run(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Merge {
            report,
            bam,
            ref_fasta,
            config,
            threshold,
            out_prefix,
            force,
        } => {
            check_output_paths(out_prefix, &[".dedup.tsv", ".dedup.json"], *force)
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            let merge_config = load_config(config.as_deref(), *threshold)?;
            info!("Merging with similarity threshold {}", merge_config.min_similarity());

            let fusion_report = FusionReport::load_with_config(
                report,
                bam.as_deref(),
                ref_fasta.as_deref(),
                &merge_config,
            )?;

            OutputCollector::new()
                .with_report(&fusion_report)
                .write_to_prefix(out_prefix)?;
            info!(
                "Wrote {} fusion calls to {}.dedup.tsv",
                fusion_report.fusions().len(),
                out_prefix
            );
        }
        Commands::Reads { bam, ref_fasta, name } => {
            let store = AlignmentStore::open(bam, ref_fasta.as_deref())?;
            let reads = match name {
                Some(n) => store.get(n),
                None => store.iter().collect(),
            };
            println!("name\treference\tposition\tcigar\tmate_position\tflag");
            for read in reads {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    read.name,
                    read.reference_name.as_deref().unwrap_or("*"),
                    read.position,
                    read.cigar,
                    read.mate_position,
                    read.flag
                );
            }
        }
        Commands::Schema { output } => {
            let schema = serde_json::to_string_pretty(DedupOutput::json_schema())?;
            if let Some(path) = output {
                std::fs::write(path, &schema)?;
                info!("Schema written to {}", path);
            } else {
                println!("{}", schema);
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let mut log_builder = env_logger::Builder::from_default_env();
    log_builder
        .filter_level(cli.log_level.to_level_filter())
        .format_module_path(false);
    if let Some(ref path) = cli.log_file {
        let file = if cli.append_log {
            std::fs::File::options().create(true).append(true).open(path)
        } else {
            std::fs::File::create(path)
        };
        match file {
            Ok(f) => {
                log_builder.target(env_logger::Target::Pipe(Box::new(f)));
            }
            Err(e) => {
                eprintln!("Could not open log file '{}': {}", path, e);
                std::process::exit(2);
            }
        }
    }
    log_builder.init();

    let start = std::time::Instant::now();
    if let Err(e) = run(&cli.command) {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Elapsed time: {:.2?}", start.elapsed());
}
