use clap::{Parser, Subcommand};
use hkxtag::{DecodeOptions, Tagfile};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hkxtag", about = "Inspect Havok binary packfiles")]
struct Cli {
    /// Log decoder progress (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Fail on classes without a decoder instead of skipping them
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header fields, sections and object counts
    Info {
        input: PathBuf,
    },
    /// List the class-name table
    Classes {
        input: PathBuf,
    },
    /// List decoded objects with a one-line summary
    Objects {
        input: PathBuf,
    },
    /// Print the decoded object table as JSON
    Dump {
        input: PathBuf,
        #[arg(short, long)]
        pretty: bool,
    },
    /// Decode every file and report OK or the error
    Check {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let opts = DecodeOptions { strict_classes: cli.strict, ..DecodeOptions::default() };

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let file = open(&input, &opts)?;
            let header = file.header();

            println!("── Havok packfile ───────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Version        {}", header.version.name());
            println!("  File version   {}", header.file_version);
            println!("  User tag       {:#010x}", header.user_tag);
            println!("  Flags          {:#010x}", header.flags);
            println!("  Layout rules   {:?}", header.layout_rules);
            println!("  Sections ({}):", header.sections.len());
            for (i, s) in header.sections.iter().enumerate() {
                println!("    [{i}] {:<16} start={:#08x} end=+{:#x}",
                    s.name, s.absolute_data_start, s.end_offset);
            }
            println!("  Relocations    {}", file.fixups().len());
            println!("  Objects        {}", file.object_table().len());
            for (kind, count) in file.count_by_kind() {
                println!("    {kind:<20} {count}");
            }
            if !file.skipped().is_empty() {
                println!("  Skipped        {}", file.skipped().len());
            }
        }

        // ── Classes ──────────────────────────────────────────────────────────
        Commands::Classes { input } => {
            let file = open(&input, &opts)?;
            println!("{:>8}  {:<40} Decoder", "Offset", "Class");
            for (offset, name) in file.class_names().iter() {
                let supported = if hkxtag::registry::is_supported(name) { "yes" } else { "no" };
                println!("{offset:>#8x}  {name:<40} {supported}");
            }
        }

        // ── Objects ──────────────────────────────────────────────────────────
        Commands::Objects { input } => {
            let file = open(&input, &opts)?;
            println!("{:>10}  {:<20} Summary", "Address", "Kind");
            for (address, object) in file.objects() {
                println!("{address:>#10x}  {:<20} {}", object.kind(), object.summary());
            }
            for s in file.skipped() {
                println!("{:>#10x}  {:<20} ({})", s.address, "skipped", s.class_name);
            }
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, pretty } => {
            let file = open(&input, &opts)?;
            let json = if pretty {
                serde_json::to_string_pretty(file.object_table())?
            } else {
                serde_json::to_string(file.object_table())?
            };
            println!("{json}");
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { inputs } => {
            let results = check_all(&inputs, &opts);
            let mut failed = 0;
            for (path, result) in inputs.iter().zip(results) {
                match result {
                    Ok(summary) => println!("OK    {}  {summary}", path.display()),
                    Err(e) => {
                        failed += 1;
                        println!("FAIL  {}  {e}", path.display());
                    }
                }
            }
            if failed > 0 {
                return Err(format!("{failed} of {} file(s) failed to decode", inputs.len()).into());
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn open(path: &Path, opts: &DecodeOptions) -> Result<Tagfile, Box<dyn std::error::Error>> {
    let data = std::fs::read(path)?;
    Ok(Tagfile::with_options(&data, opts.clone())?)
}

fn check_one(path: &Path, opts: &DecodeOptions) -> Result<String, String> {
    let file = open(path, opts).map_err(|e| e.to_string())?;
    Ok(format!(
        "{} objects, {} skipped",
        file.object_table().len(),
        file.skipped().len()
    ))
}

#[cfg(feature = "parallel")]
fn check_all(inputs: &[PathBuf], opts: &DecodeOptions) -> Vec<Result<String, String>> {
    use rayon::prelude::*;
    inputs.par_iter().map(|p| check_one(p, opts)).collect()
}

#[cfg(not(feature = "parallel"))]
fn check_all(inputs: &[PathBuf], opts: &DecodeOptions) -> Vec<Result<String, String>> {
    inputs.iter().map(|p| check_one(p, opts)).collect()
}
